use alloc::{boxed::Box, vec::Vec};
use bitvec::{prelude::Msb0, slice::BitSlice, vec::BitVec};

use crate::error::CodecError;

use super::DEFAULT_CAPACITY;

pub(crate) type BitOut = BitVec<u8, Msb0>;

type FlushCallback<'a> = Box<dyn FnMut(&[u8]) -> Result<(), CodecError> + 'a>;

/// Bit-addressable output buffer.
///
/// Without a flush callback the writer collects everything it is given
/// and hands it out through [`Writer::finish`]. With a callback, complete
/// bytes are pushed out whenever `capacity` bytes are buffered and on
/// every explicit [`Writer::flush`].
pub struct Writer<'a> {
    bits: BitOut,
    capacity: usize,
    flushed: usize,
    offset: isize,
    collected: Vec<u8>,
    on_flush: Option<FlushCallback<'a>>,
}

impl Default for Writer<'_> {
    fn default() -> Self {
        Writer::new()
    }
}

impl<'a> Writer<'a> {
    pub fn new() -> Self {
        Writer {
            bits: BitOut::new(),
            capacity: DEFAULT_CAPACITY,
            flushed: 0,
            offset: 0,
            collected: Vec::new(),
            on_flush: None,
        }
    }

    /// Creates a writer that streams its output to `on_flush`.
    /// * `capacity` - number of buffered bytes that triggers a flush
    /// * `on_flush` - receives each flushed run of bytes
    pub fn with_flush(
        capacity: usize,
        on_flush: impl FnMut(&[u8]) -> Result<(), CodecError> + 'a,
    ) -> Self {
        Writer {
            capacity: capacity.max(1),
            on_flush: Some(Box::new(on_flush)),
            ..Writer::new()
        }
    }

    pub fn write_bit(&mut self, bit: bool) -> Result<(), CodecError> {
        self.bits.push(bit);
        self.flush_if_full()
    }

    /// Writes the `n` low bits of `value`, most significant first.
    pub fn write_bits(&mut self, n: usize, value: u64) -> Result<(), CodecError> {
        debug_assert!(n <= 64);
        self.bits
            .extend((0..n).rev().map(|shift| (value >> shift) & 1 != 0));
        self.flush_if_full()
    }

    pub fn write_bit_slice(&mut self, bits: &BitSlice<u8, Msb0>) -> Result<(), CodecError> {
        self.bits.extend_from_bitslice(bits);
        self.flush_if_full()
    }

    /// Pads to the next byte boundary, then writes `byte`.
    pub fn write_byte(&mut self, byte: u8) -> Result<(), CodecError> {
        self.pad_to_byte_boundary();
        self.write_bits(8, byte.into())
    }

    /// Pads to the next byte boundary, then writes `bytes`.
    pub fn write_buffer(&mut self, bytes: &[u8]) -> Result<(), CodecError> {
        self.pad_to_byte_boundary();
        self.bits.extend_from_raw_slice(bytes);
        self.flush_if_full()
    }

    pub fn pad_to_byte_boundary(&mut self) {
        let missing_bits = (8 - self.bits.len() % 8) % 8;
        self.bits.resize(self.bits.len() + missing_bits, false);
    }

    pub fn is_byte_aligned(&self) -> bool {
        self.bits.len() % 8 == 0
    }

    /// Logical number of bits written since creation.
    pub fn bit_position(&self) -> usize {
        self.flushed * 8 + self.bits.len()
    }

    /// Logical byte position, including any rebasing through
    /// [`Writer::set_position`].
    pub fn position(&self) -> usize {
        ((self.bit_position() / 8) as isize + self.offset) as usize
    }

    /// Rebases the logical position. The written bytes stay untouched.
    pub fn set_position(&mut self, position: usize) {
        self.offset = position as isize - (self.bit_position() / 8) as isize;
    }

    /// Hands all complete bytes to the flush callback. Without a
    /// callback the bytes move to the collected output.
    pub fn flush(&mut self) -> Result<(), CodecError> {
        let whole = self.bits.len() / 8;
        if whole == 0 {
            return Ok(());
        }
        self.bits.set_uninitialized(false);
        let bytes = &self.bits.as_raw_slice()[..whole];
        match self.on_flush.as_mut() {
            Some(callback) => callback(bytes)?,
            None => self.collected.extend_from_slice(bytes),
        }
        let rest: BitOut = self.bits[whole * 8..].iter().by_vals().collect();
        self.bits = rest;
        self.flushed += whole;
        Ok(())
    }

    /// Pads, flushes and returns the collected output, leaving the writer
    /// empty for reuse.
    pub fn take(&mut self) -> Result<Vec<u8>, CodecError> {
        self.pad_to_byte_boundary();
        self.flush()?;
        self.flushed = 0;
        self.offset = 0;
        Ok(core::mem::take(&mut self.collected))
    }

    /// Pads, flushes and returns the collected output. A streaming writer
    /// returns an empty buffer.
    pub fn finish(mut self) -> Result<Vec<u8>, CodecError> {
        self.take()
    }

    fn flush_if_full(&mut self) -> Result<(), CodecError> {
        if self.on_flush.is_some() && self.bits.len() >= self.capacity * 8 {
            self.flush()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::rc::Rc;
    use bitvec::bitvec;
    use core::cell::RefCell;

    #[test]
    fn writes_bits_high_first() {
        let mut writer = Writer::new();
        writer.write_bit(true).unwrap();
        writer.write_bits(3, 0b010).unwrap();
        writer.write_bits(6, 0b111111).unwrap();
        assert_eq!(writer.bit_position(), 10);
        assert_eq!(writer.finish().unwrap(), vec![0b1010_1111, 0b1100_0000]);
    }

    #[test]
    fn pads_before_bytes() {
        let mut writer = Writer::new();
        writer.write_bits(2, 0b11).unwrap();
        writer.write_byte(0xAB).unwrap();
        writer.write_buffer(&[1, 2]).unwrap();
        writer
            .write_bit_slice(&bitvec![u8, Msb0; 1, 0, 1])
            .unwrap();
        assert!(!writer.is_byte_aligned());
        assert_eq!(writer.finish().unwrap(), vec![0xC0, 0xAB, 1, 2, 0xA0]);
    }

    #[test]
    fn streams_to_callback() {
        let sink = Rc::new(RefCell::new(Vec::new()));
        let target = sink.clone();
        let mut writer = Writer::with_flush(2, move |bytes: &[u8]| {
            target.borrow_mut().extend_from_slice(bytes);
            Ok(())
        });
        writer.write_buffer(&[1, 2, 3]).unwrap();
        assert_eq!(*sink.borrow(), vec![1, 2, 3]);
        writer.write_bits(4, 0xF).unwrap();
        assert_eq!(writer.position(), 3);
        assert_eq!(writer.finish().unwrap(), Vec::<u8>::new());
        assert_eq!(*sink.borrow(), vec![1, 2, 3, 0xF0]);
    }

    #[test]
    fn rebases_logical_position() {
        let mut writer = Writer::new();
        writer.write_buffer(&[0; 4]).unwrap();
        writer.set_position(100);
        writer.write_byte(7).unwrap();
        assert_eq!(writer.position(), 101);
        assert_eq!(writer.finish().unwrap(), vec![0, 0, 0, 0, 7]);
    }
}
