use std::fmt;
use std::io;

use crate::status::{SeekBasis, StreamStatus};
use crate::vtable::{InputStreamBuilder, Slot, VTable};

/// An input stream whose behavior is supplied by five late-bound handlers.
///
/// Each operation dispatches synchronously into the bound handler and
/// normalizes the result before returning. Operations are not reentrant and
/// must not run concurrently on the same handle; a consumer that needs
/// sharing must serialize calls itself.
///
/// The handle tracks end-of-stream: a read that reports zero bytes sets it,
/// a successful seek clears it. `destroy` runs the destroy handler exactly
/// once, whether invoked explicitly or by `Drop`.
pub struct InputStream {
    /// `None` once destroyed. Taking the vtable is the one-shot guard.
    vtable: Option<VTable>,
    end_of_stream: bool,
}

#[derive(Debug, thiserror::Error)]
#[error("`{op}` called on a destroyed stream handle")]
pub struct UseAfterDestroyError {
    pub op: Slot,
}

#[derive(Debug, thiserror::Error)]
pub enum SeekError {
    #[error("seek handler reported failure")]
    HandlerFailed,

    #[error(transparent)]
    Destroyed(#[from] UseAfterDestroyError),
}

/// Handler misbehavior splits into two variants: a negative byte count gets
/// `NegativeCount`, a count larger than the buffer gets `HandlerFailed`.
/// Either way the buffer contents must not be trusted, and the handle stays
/// usable.
#[derive(Debug, thiserror::Error)]
pub enum ReadError {
    #[error("read handler reported a negative byte count ({count})")]
    NegativeCount { count: isize },

    #[error("read handler reported {reported} bytes for a {capacity}-byte buffer")]
    HandlerFailed { reported: usize, capacity: usize },

    #[error(transparent)]
    Destroyed(#[from] UseAfterDestroyError),
}

#[derive(Debug, thiserror::Error)]
pub enum LengthError {
    #[error("length handler cannot determine the stream length")]
    Unsupported,

    #[error("length handler reported a negative length ({length})")]
    HandlerFailed { length: i64 },

    #[error(transparent)]
    Destroyed(#[from] UseAfterDestroyError),
}

impl InputStream {
    pub(crate) fn new(vtable: VTable) -> Self {
        Self {
            vtable: Some(vtable),
            end_of_stream: false,
        }
    }

    pub fn builder() -> InputStreamBuilder {
        InputStreamBuilder::new()
    }

    /// Repositions the stream to `offset` relative to `basis`.
    ///
    /// A successful seek clears the remembered end-of-stream condition.
    pub fn seek(&mut self, offset: i64, basis: SeekBasis) -> Result<(), SeekError> {
        let vtable = self.vtable_mut(Slot::Seek)?;
        if !(vtable.seek)(offset, basis) {
            return Err(SeekError::HandlerFailed);
        }
        self.end_of_stream = false;
        Ok(())
    }

    /// Fills `dest` with up to `dest.len()` bytes and returns the count.
    ///
    /// A short read is success. A count of zero marks end-of-stream. On
    /// error the buffer contents must not be trusted; the handle itself
    /// stays usable.
    pub fn read(&mut self, dest: &mut [u8]) -> Result<usize, ReadError> {
        // A zero-capacity read could only ever report 0, which must not be
        // mistaken for end-of-stream.
        if dest.is_empty() {
            self.vtable_mut(Slot::Read)?;
            return Ok(0);
        }

        let capacity = dest.len();
        let count = {
            let vtable = self.vtable_mut(Slot::Read)?;
            (vtable.read)(dest)
        };

        if count < 0 {
            return Err(ReadError::NegativeCount { count });
        }
        let count = count as usize;
        if count > capacity {
            return Err(ReadError::HandlerFailed {
                reported: count,
                capacity,
            });
        }

        if count == 0 {
            self.end_of_stream = true;
        }
        Ok(count)
    }

    /// Total stream length, when the handler can determine it.
    pub fn length(&mut self) -> Result<i64, LengthError> {
        let vtable = self.vtable_mut(Slot::Length)?;
        match (vtable.length)() {
            None => Err(LengthError::Unsupported),
            Some(length) if length < 0 => Err(LengthError::HandlerFailed { length }),
            Some(length) => Ok(length),
        }
    }

    /// Runs the status hook, then snapshots the handle's state.
    ///
    /// End-of-stream in the snapshot comes from the handle's own tracking,
    /// never from the handler.
    pub fn status(&mut self) -> Result<StreamStatus, UseAfterDestroyError> {
        let vtable = self.vtable_mut(Slot::Status)?;
        (vtable.status)();
        Ok(StreamStatus {
            is_valid: true,
            is_end_of_stream: self.end_of_stream,
        })
    }

    /// Runs the destroy handler and releases all handler slots.
    ///
    /// Idempotent: a second call (or the implicit one from `Drop`) is a
    /// no-op. Every later operation fails with `UseAfterDestroyError`.
    pub fn destroy(&mut self) {
        if let Some(vtable) = self.vtable.take() {
            (vtable.destroy)();
        }
    }

    pub fn is_destroyed(&self) -> bool {
        self.vtable.is_none()
    }

    fn vtable_mut(&mut self, op: Slot) -> Result<&mut VTable, UseAfterDestroyError> {
        self.vtable.as_mut().ok_or(UseAfterDestroyError { op })
    }
}

/// Manual impl: the vtable holds opaque closures.
impl fmt::Debug for InputStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InputStream")
            .field("destroyed", &self.is_destroyed())
            .field("end_of_stream", &self.end_of_stream)
            .finish_non_exhaustive()
    }
}

impl Drop for InputStream {
    fn drop(&mut self) {
        self.destroy();
    }
}

/// Lets std consumers (e.g. an upload pipeline using `io::copy`) drive the
/// handle directly.
impl io::Read for InputStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        InputStream::read(self, buf).map_err(io::Error::other)
    }
}
