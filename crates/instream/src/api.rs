pub use crate::adapter::ReadSeekSource;
pub use crate::handle::{InputStream, LengthError, ReadError, SeekError, UseAfterDestroyError};
pub use crate::source::StreamSource;
pub use crate::status::{SeekBasis, StreamStatus};
pub use crate::vtable::{ConstructionError, InputStreamBuilder, Slot};
