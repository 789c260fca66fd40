#![forbid(unsafe_code)]

//! Pluggable input-stream core.
//!
//! A consumer drives an arbitrary user-supplied stream implementation
//! through a fixed five-operation contract (seek, read, length, status,
//! destroy). The behavior behind each operation is bound at construction
//! time and immutable afterwards; the handle normalizes results and tracks
//! end-of-stream on behalf of the consumer.

mod adapter;
mod handle;
mod source;
mod status;
mod vtable;

pub mod api;

pub use api::{
    ConstructionError, InputStream, InputStreamBuilder, LengthError, ReadError, ReadSeekSource,
    SeekBasis, SeekError, Slot, StreamSource, StreamStatus, UseAfterDestroyError,
};
