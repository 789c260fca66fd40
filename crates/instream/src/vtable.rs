use std::fmt;

use crate::handle::InputStream;
use crate::status::SeekBasis;

/// Repositions the stream. Returns `false` when the reposition failed.
pub type SeekHandler = Box<dyn FnMut(i64, SeekBasis) -> bool + Send>;

/// Fills `dest` with up to `dest.len()` bytes and reports how many were
/// written. Negative means failure, 0 means end-of-stream.
pub type ReadHandler = Box<dyn FnMut(&mut [u8]) -> isize + Send>;

/// Reports the total stream length, or `None` when it cannot be determined.
pub type LengthHandler = Box<dyn FnMut() -> Option<i64> + Send>;

/// Side-effecting status refresh hook. End-of-stream is tracked by the
/// handle itself, so this returns nothing.
pub type StatusHandler = Box<dyn FnMut() + Send>;

/// Releases handler-side resources. Invoked exactly once.
pub type DestroyHandler = Box<dyn FnOnce() + Send>;

/// One operation slot of the vtable, used in construction errors.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Slot {
    Seek,
    Read,
    Length,
    Status,
    Destroy,
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Slot::Seek => "seek",
            Slot::Read => "read",
            Slot::Length => "length",
            Slot::Status => "status",
            Slot::Destroy => "destroy",
        };
        f.write_str(name)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConstructionError {
    /// The registered handler is not invocable.
    ///
    /// Typed setters rule this out at compile time; late-bound registration
    /// surfaces (e.g. a C caller passing a null function pointer) raise it.
    #[error("`{slot}` handler is not invocable")]
    InvalidHandler { slot: Slot },

    #[error("vtable is missing a `{slot}` handler")]
    IncompleteVTable { slot: Slot },
}

/// The bound set of five operation handlers backing one stream.
///
/// Owned exclusively by its `InputStream` (one handle, one vtable) and
/// immutable once built.
pub(crate) struct VTable {
    pub(crate) seek: SeekHandler,
    pub(crate) read: ReadHandler,
    pub(crate) length: LengthHandler,
    pub(crate) status: StatusHandler,
    pub(crate) destroy: DestroyHandler,
}

/// Incremental vtable construction. Each `with_*` call installs exactly one
/// handler; re-setting a slot replaces the previous handler (last write
/// wins). `build` consumes the builder and rejects any empty slot.
#[derive(Default)]
pub struct InputStreamBuilder {
    seek: Option<SeekHandler>,
    read: Option<ReadHandler>,
    length: Option<LengthHandler>,
    status: Option<StatusHandler>,
    destroy: Option<DestroyHandler>,
}

impl InputStreamBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_seek(mut self, handler: impl FnMut(i64, SeekBasis) -> bool + Send + 'static) -> Self {
        self.seek = Some(Box::new(handler));
        self
    }

    pub fn with_read(mut self, handler: impl FnMut(&mut [u8]) -> isize + Send + 'static) -> Self {
        self.read = Some(Box::new(handler));
        self
    }

    pub fn with_length(mut self, handler: impl FnMut() -> Option<i64> + Send + 'static) -> Self {
        self.length = Some(Box::new(handler));
        self
    }

    pub fn with_status(mut self, handler: impl FnMut() + Send + 'static) -> Self {
        self.status = Some(Box::new(handler));
        self
    }

    pub fn with_destroy(mut self, handler: impl FnOnce() + Send + 'static) -> Self {
        self.destroy = Some(Box::new(handler));
        self
    }

    /// First empty slot, in operation order, if any. Lets a caller check
    /// completeness without giving up the builder.
    pub fn missing_slot(&self) -> Option<Slot> {
        if self.seek.is_none() {
            return Some(Slot::Seek);
        }
        if self.read.is_none() {
            return Some(Slot::Read);
        }
        if self.length.is_none() {
            return Some(Slot::Length);
        }
        if self.status.is_none() {
            return Some(Slot::Status);
        }
        if self.destroy.is_none() {
            return Some(Slot::Destroy);
        }
        None
    }

    pub fn build(self) -> Result<InputStream, ConstructionError> {
        let missing = |slot| ConstructionError::IncompleteVTable { slot };

        let vtable = VTable {
            seek: self.seek.ok_or(missing(Slot::Seek))?,
            read: self.read.ok_or(missing(Slot::Read))?,
            length: self.length.ok_or(missing(Slot::Length))?,
            status: self.status.ok_or(missing(Slot::Status))?,
            destroy: self.destroy.ok_or(missing(Slot::Destroy))?,
        };
        Ok(InputStream::new(vtable))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn complete_builder() -> InputStreamBuilder {
        InputStreamBuilder::new()
            .with_seek(|_, _| true)
            .with_read(|_| 0)
            .with_length(|| None)
            .with_status(|| {})
            .with_destroy(|| {})
    }

    #[test]
    fn build_with_all_slots_succeeds() {
        complete_builder().build().unwrap();
    }

    #[test]
    fn build_reports_first_missing_slot() {
        let err = InputStreamBuilder::new().build().unwrap_err();
        assert!(matches!(
            err,
            ConstructionError::IncompleteVTable { slot: Slot::Seek }
        ));

        let err = InputStreamBuilder::new()
            .with_seek(|_, _| true)
            .with_read(|_| 0)
            .build()
            .unwrap_err();
        assert!(matches!(
            err,
            ConstructionError::IncompleteVTable { slot: Slot::Length }
        ));
        assert_eq!(err.to_string(), "vtable is missing a `length` handler");
    }

    #[test]
    fn missing_slot_agrees_with_build() {
        let builder = InputStreamBuilder::new().with_seek(|_, _| true);
        assert_eq!(builder.missing_slot(), Some(Slot::Read));
        assert!(matches!(
            builder.build().unwrap_err(),
            ConstructionError::IncompleteVTable { slot: Slot::Read }
        ));

        assert_eq!(complete_builder().missing_slot(), None);
    }

    #[test]
    fn resetting_a_slot_replaces_the_handler() {
        let mut stream = complete_builder()
            .with_read(|dest| {
                dest[0] = b'x';
                1
            })
            .build()
            .unwrap();

        let mut buf = [0_u8; 1];
        assert_eq!(stream.read(&mut buf).unwrap(), 1);
        assert_eq!(&buf, b"x");
    }
}
