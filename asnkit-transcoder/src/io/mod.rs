//! Bit- and byte-addressable streaming buffers shared by all codecs.
use alloc::vec::Vec;

use crate::error::CodecError;

mod reader;
mod writer;

pub use reader::Reader;
pub use writer::Writer;
pub(crate) use writer::BitOut;

/// Default window size of readers and writers, in bytes.
pub const DEFAULT_CAPACITY: usize = 4096;

/// A codec that owns a stack of scratch writers, used to encode a
/// nested value before the length that precedes it is known.
pub(crate) trait ScratchWriters: Sized {
    fn scratch(&mut self) -> &mut Vec<Writer<'static>>;

    /// Runs `f` against a pooled scratch writer and returns what it wrote,
    /// padded to whole bytes.
    fn nested<F>(&mut self, f: F) -> Result<Vec<u8>, CodecError>
    where
        F: FnOnce(&mut Self, &mut Writer<'static>) -> Result<(), CodecError>,
    {
        let mut writer = self.scratch().pop().unwrap_or_default();
        let result = f(self, &mut writer);
        let written = writer.take();
        self.scratch().push(writer);
        result?;
        written
    }
}
