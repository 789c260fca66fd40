use std::sync::{Arc, Mutex, MutexGuard};

use crate::handle::InputStream;
use crate::status::SeekBasis;
use crate::vtable::VTable;

/// The five stream operations as a single implementation seam.
///
/// Exists so a provider can supply one object instead of five closures; the
/// methods are fanned out into the vtable slots by
/// [`InputStream::from_source`]. Return conventions match the handler
/// signatures: `seek` reports success, `read` reports a byte count (negative
/// means failure, 0 means end-of-stream), `length` reports `None` when the
/// length cannot be determined.
pub trait StreamSource: Send + 'static {
    fn seek(&mut self, offset: i64, basis: SeekBasis) -> bool;

    fn read(&mut self, dest: &mut [u8]) -> isize;

    fn length(&mut self) -> Option<i64> {
        None
    }

    /// Side-effecting status refresh hook.
    fn refresh_status(&mut self) {}

    /// Releases provider-side resources. Called exactly once.
    fn destroy(&mut self) {}
}

impl InputStream {
    /// Builds a stream whose five handlers all dispatch into `source`.
    ///
    /// The source is shared across the slots behind a mutex; the handle's
    /// contract already serializes operations, so the lock is never
    /// contended.
    pub fn from_source(source: impl StreamSource) -> Self {
        let source = Arc::new(Mutex::new(source));

        let seek_source = Arc::clone(&source);
        let read_source = Arc::clone(&source);
        let length_source = Arc::clone(&source);
        let status_source = Arc::clone(&source);
        let destroy_source = source;

        InputStream::new(VTable {
            seek: Box::new(move |offset, basis| lock(&seek_source).seek(offset, basis)),
            read: Box::new(move |dest| lock(&read_source).read(dest)),
            length: Box::new(move || lock(&length_source).length()),
            status: Box::new(move || lock(&status_source).refresh_status()),
            destroy: Box::new(move || lock(&destroy_source).destroy()),
        })
    }
}

fn lock<S>(source: &Mutex<S>) -> MutexGuard<'_, S> {
    match source.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Counting {
        reads: usize,
        destroys: usize,
        probe: Arc<Mutex<usize>>,
    }

    impl StreamSource for Counting {
        fn seek(&mut self, offset: i64, _basis: SeekBasis) -> bool {
            offset >= 0
        }

        fn read(&mut self, dest: &mut [u8]) -> isize {
            self.reads += 1;
            if self.reads > 2 {
                return 0;
            }
            dest[0] = b'0' + self.reads as u8;
            1
        }

        fn length(&mut self) -> Option<i64> {
            Some(2)
        }

        fn destroy(&mut self) {
            self.destroys += 1;
            *lock(&self.probe) = self.destroys;
        }
    }

    #[test]
    fn source_methods_back_all_five_operations() {
        let probe = Arc::new(Mutex::new(0));
        let mut stream = InputStream::from_source(Counting {
            reads: 0,
            destroys: 0,
            probe: Arc::clone(&probe),
        });

        let mut buf = [0_u8; 1];
        assert_eq!(stream.read(&mut buf).unwrap(), 1);
        assert_eq!(&buf, b"1");
        assert_eq!(stream.read(&mut buf).unwrap(), 1);
        assert_eq!(&buf, b"2");
        assert_eq!(stream.read(&mut buf).unwrap(), 0);
        assert!(stream.status().unwrap().is_end_of_stream);

        assert_eq!(stream.length().unwrap(), 2);
        assert!(stream.seek(0, SeekBasis::Start).is_ok());
        assert!(stream.seek(-1, SeekBasis::Current).is_err());

        stream.destroy();
        stream.destroy();
        assert_eq!(*lock(&probe), 1);
    }
}
