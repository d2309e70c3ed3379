use alloc::{boxed::Box, vec, vec::Vec};
use nom::IResult;

use crate::error::CodecError;

use super::DEFAULT_CAPACITY;

type RefillCallback<'a> = Box<dyn FnMut(&mut [u8]) -> Result<usize, CodecError> + 'a>;

/// Bit-addressable input buffer with optional pull-style refill.
///
/// The reader keeps a window of the input. Reading past the window slides
/// the unread bytes to the front and asks the refill callback for more;
/// a callback that returns `0` ends the input.
pub struct Reader<'a> {
    buffer: Vec<u8>,
    pointer: usize,
    bits_left: u8,
    base: usize,
    capacity: usize,
    on_refill: Option<RefillCallback<'a>>,
}

impl<'a> Reader<'a> {
    /// Reads from a complete input.
    pub fn new(input: &[u8]) -> Self {
        Reader {
            buffer: input.to_vec(),
            pointer: 0,
            bits_left: 8,
            base: 0,
            capacity: DEFAULT_CAPACITY,
            on_refill: None,
        }
    }

    /// Reads from a source that delivers its bytes in pieces.
    /// * `capacity` - number of bytes requested per refill
    /// * `on_refill` - fills the given slice and returns the number of
    /// bytes written, `0` at the end of the input
    pub fn with_refill(
        capacity: usize,
        on_refill: impl FnMut(&mut [u8]) -> Result<usize, CodecError> + 'a,
    ) -> Self {
        Reader {
            buffer: Vec::new(),
            pointer: 0,
            bits_left: 8,
            base: 0,
            capacity: capacity.max(1),
            on_refill: Some(Box::new(on_refill)),
        }
    }

    /// Slides unread bytes to the front of the window and appends what the
    /// refill callback delivers. Returns `false` when no more input exists.
    pub fn refill(&mut self) -> Result<bool, CodecError> {
        let Some(callback) = self.on_refill.as_mut() else {
            return Ok(false);
        };
        if self.pointer > 0 {
            self.buffer.drain(..self.pointer);
            self.base += self.pointer;
            self.pointer = 0;
        }
        let mut chunk = vec![0; self.capacity];
        let received = callback(&mut chunk)?.min(self.capacity);
        self.buffer.extend_from_slice(&chunk[..received]);
        Ok(received > 0)
    }

    fn available_bits(&self) -> usize {
        (self.buffer.len() - self.pointer) * 8 - (8 - self.bits_left as usize)
    }

    fn ensure_bits(&mut self, n: usize) -> Result<(), CodecError> {
        while self.available_bits() < n {
            if !self.refill()? {
                return Err(CodecError::truncated("Input ended before the requested bits."));
            }
        }
        Ok(())
    }

    /// Whether the input holds no further bytes.
    pub fn is_exhausted(&mut self) -> Result<bool, CodecError> {
        while self.available_bits() == 0 {
            if !self.refill()? {
                return Ok(true);
            }
        }
        Ok(false)
    }

    pub fn read_bit(&mut self) -> Result<bool, CodecError> {
        self.read_bits(1).map(|bit| bit == 1)
    }

    pub fn peek_bit(&mut self) -> Result<bool, CodecError> {
        self.peek_bits(1).map(|bit| bit == 1)
    }

    /// Reads `n` bits, most significant first.
    pub fn read_bits(&mut self, n: usize) -> Result<u64, CodecError> {
        debug_assert!(n <= 64);
        self.ensure_bits(n)?;
        let mut value = 0u64;
        let mut remaining = n;
        while remaining > 0 {
            let take = remaining.min(self.bits_left as usize);
            let byte = u64::from(self.buffer[self.pointer]);
            let chunk = (byte >> (self.bits_left as usize - take)) & ((1 << take) - 1);
            value = (value << take) | chunk;
            self.bits_left -= take as u8;
            if self.bits_left == 0 {
                self.pointer += 1;
                self.bits_left = 8;
            }
            remaining -= take;
        }
        Ok(value)
    }

    pub fn peek_bits(&mut self, n: usize) -> Result<u64, CodecError> {
        self.ensure_bits(n)?;
        let (pointer, bits_left) = (self.pointer, self.bits_left);
        let value = self.read_bits(n);
        self.pointer = pointer;
        self.bits_left = bits_left;
        value
    }

    pub fn skip(&mut self, n_bits: usize) -> Result<(), CodecError> {
        self.ensure_bits(n_bits)?;
        let absolute = self.pointer * 8 + (8 - self.bits_left as usize) + n_bits;
        self.pointer = absolute / 8;
        self.bits_left = 8 - (absolute % 8) as u8;
        Ok(())
    }

    pub fn skip_to_byte_boundary(&mut self) {
        if self.bits_left != 8 {
            self.pointer += 1;
            self.bits_left = 8;
        }
    }

    pub fn is_byte_aligned(&self) -> bool {
        self.bits_left == 8
    }

    /// Skips to the next byte boundary, then reads one byte.
    pub fn read_byte(&mut self) -> Result<u8, CodecError> {
        self.skip_to_byte_boundary();
        self.read_bits(8).map(|b| b as u8)
    }

    /// Returns the byte [`Reader::read_byte`] would read, without moving.
    pub fn peek_byte(&mut self) -> Result<u8, CodecError> {
        let padding = if self.is_byte_aligned() {
            0
        } else {
            self.bits_left as usize
        };
        self.peek_bits(padding + 8).map(|bits| bits as u8)
    }

    /// Skips to the next byte boundary, then reads `length` bytes.
    pub fn read_buffer(&mut self, length: usize) -> Result<Vec<u8>, CodecError> {
        self.skip_to_byte_boundary();
        self.ensure_bits(length.saturating_mul(8))?;
        let bytes = self.buffer[self.pointer..self.pointer + length].to_vec();
        self.pointer += length;
        Ok(bytes)
    }

    /// Absolute byte offset of the next byte to read.
    pub fn position(&self) -> usize {
        self.base + self.pointer
    }

    /// Moves back or forth within the buffered window.
    pub fn set_position(&mut self, position: usize) -> Result<(), CodecError> {
        if position < self.base || position > self.base + self.buffer.len() {
            return Err(CodecError::unsupported(
                "Position lies outside the buffered input window.",
            ));
        }
        self.pointer = position - self.base;
        self.bits_left = 8;
        Ok(())
    }

    /// Runs a streaming `nom` parser on the unread bytes without consuming
    /// them, refilling while the parser reports incomplete input. Returns
    /// the parser output and the number of bytes it consumed.
    pub(crate) fn peek_with<O, P>(&mut self, parser: P) -> Result<(O, usize), CodecError>
    where
        P: Fn(&[u8]) -> IResult<&[u8], O>,
    {
        self.skip_to_byte_boundary();
        loop {
            let unread = &self.buffer[self.pointer..];
            match parser(unread) {
                Ok((rest, output)) => return Ok((output, unread.len() - rest.len())),
                Err(nom::Err::Incomplete(_)) => {}
                Err(e) => return Err(e.into()),
            }
            if !self.refill()? {
                return Err(CodecError::truncated("Input ended inside an element header."));
            }
        }
    }

    /// Like [`Reader::peek_with`], but consumes the parsed bytes.
    pub(crate) fn read_with<O, P>(&mut self, parser: P) -> Result<O, CodecError>
    where
        P: Fn(&[u8]) -> IResult<&[u8], O>,
    {
        let (output, consumed) = self.peek_with(parser)?;
        self.pointer += consumed;
        Ok(output)
    }
}
