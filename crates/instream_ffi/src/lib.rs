use std::cell::RefCell;
use std::ffi::CString;
use std::os::raw::{c_char, c_int, c_void};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::slice;

use instream::{
    ConstructionError, InputStream, InputStreamBuilder, LengthError, ReadError, SeekBasis,
    SeekError, Slot,
};

pub const IS_OK: c_int = 0;
pub const IS_INVALID_ARGUMENT: c_int = 1;
pub const IS_HANDLER_FAILED: c_int = 2;
pub const IS_UNSUPPORTED: c_int = 3;
pub const IS_DESTROYED: c_int = 4;
pub const IS_INTERNAL: c_int = 5;

pub const IS_SEEK_BASIS_START: c_int = 0;
pub const IS_SEEK_BASIS_CURRENT: c_int = 1;

/// Repositions the stream. Nonzero means success.
pub type IsSeekFn =
    Option<unsafe extern "C" fn(user_data: *mut c_void, offset: i64, basis: c_int) -> c_int>;

/// Fills up to `dest_len` bytes and reports the count written. Negative
/// means failure, 0 means end-of-stream.
pub type IsReadFn =
    Option<unsafe extern "C" fn(user_data: *mut c_void, dest: *mut u8, dest_len: usize) -> isize>;

/// Writes the total length to `out_length` and returns nonzero, or returns 0
/// when the length cannot be determined.
pub type IsLengthFn =
    Option<unsafe extern "C" fn(user_data: *mut c_void, out_length: *mut i64) -> c_int>;

/// Side-effecting status refresh hook.
pub type IsStatusFn = Option<unsafe extern "C" fn(user_data: *mut c_void)>;

/// Releases caller-side resources. Invoked exactly once per stream.
pub type IsDestroyFn = Option<unsafe extern "C" fn(user_data: *mut c_void)>;

#[repr(C)]
#[derive(Clone, Copy)]
pub struct IsStreamStatus {
    pub is_valid: bool,
    pub is_end_of_stream: bool,
}

pub enum IsBuilder {}
pub enum IsStream {}

struct BuilderHandle {
    /// Taken by `is_builder_build`; the handle itself is freed separately.
    inner: Option<InputStreamBuilder>,
}

struct StreamHandle {
    inner: InputStream,
}

/// Caller-provided context pointer threaded into every callback. The caller
/// promises it is usable from whichever single thread drives the stream.
#[derive(Clone, Copy)]
struct UserData(*mut c_void);

unsafe impl Send for UserData {}

impl UserData {
    /// Closures must go through this accessor: naming the field directly
    /// would make them capture the raw pointer instead of the `Send`
    /// wrapper (Rust 2021 captures disjoint fields).
    fn get(self) -> *mut c_void {
        self.0
    }
}

thread_local! {
    static LAST_ERROR: RefCell<Option<CString>> = const { RefCell::new(None) };
}

fn clear_last_error() {
    LAST_ERROR.with(|cell| {
        *cell.borrow_mut() = None;
    });
}

fn set_last_error(message: impl AsRef<str>) {
    let msg = message.as_ref();
    let c = CString::new(msg).unwrap_or_else(|_| CString::new("error").expect("CString"));
    LAST_ERROR.with(|cell| {
        *cell.borrow_mut() = Some(c);
    });
}

fn last_error_ptr() -> *const c_char {
    static EMPTY: &[u8] = b"\0";
    LAST_ERROR.with(|cell| match cell.borrow().as_ref() {
        Some(s) => s.as_ptr(),
        None => EMPTY.as_ptr() as *const c_char,
    })
}

fn with_boundary<F>(f: F) -> c_int
where
    F: FnOnce() -> Result<(), c_int>,
{
    clear_last_error();
    match catch_unwind(AssertUnwindSafe(f)) {
        Ok(Ok(())) => IS_OK,
        Ok(Err(code)) => code,
        Err(_) => {
            set_last_error("panic across FFI boundary");
            IS_INTERNAL
        }
    }
}

fn invalid_handler(slot: Slot) -> c_int {
    set_last_error(ConstructionError::InvalidHandler { slot }.to_string());
    IS_INVALID_ARGUMENT
}

fn map_seek(err: SeekError) -> c_int {
    set_last_error(err.to_string());
    match err {
        SeekError::HandlerFailed => IS_HANDLER_FAILED,
        SeekError::Destroyed(_) => IS_DESTROYED,
    }
}

fn map_read(err: ReadError) -> c_int {
    set_last_error(err.to_string());
    match err {
        ReadError::NegativeCount { .. } | ReadError::HandlerFailed { .. } => IS_HANDLER_FAILED,
        ReadError::Destroyed(_) => IS_DESTROYED,
    }
}

fn map_length(err: LengthError) -> c_int {
    set_last_error(err.to_string());
    match err {
        LengthError::Unsupported => IS_UNSUPPORTED,
        LengthError::HandlerFailed { .. } => IS_HANDLER_FAILED,
        LengthError::Destroyed(_) => IS_DESTROYED,
    }
}

#[no_mangle]
pub extern "C" fn is_last_error_message() -> *const c_char {
    last_error_ptr()
}

#[no_mangle]
pub extern "C" fn is_clear_last_error() {
    clear_last_error();
}

#[no_mangle]
/// # Safety
/// - `out_builder` must be non-null and writable.
/// - On success, `*out_builder` must be released with `is_builder_free`
///   exactly once.
pub unsafe extern "C" fn is_builder_new(out_builder: *mut *mut IsBuilder) -> c_int {
    with_boundary(|| {
        if out_builder.is_null() {
            set_last_error("out_builder is null");
            return Err(IS_INVALID_ARGUMENT);
        }
        let boxed = Box::new(BuilderHandle {
            inner: Some(InputStreamBuilder::new()),
        });
        unsafe { *out_builder = Box::into_raw(boxed) as *mut IsBuilder };
        Ok(())
    })
}

#[no_mangle]
/// # Safety
/// - `builder` must be a pointer returned by `is_builder_new` (or null).
/// - `builder` must not be used after this call, and not freed twice.
pub unsafe extern "C" fn is_builder_free(builder: *mut IsBuilder) {
    clear_last_error();
    if builder.is_null() {
        return;
    }
    let _ = catch_unwind(AssertUnwindSafe(|| unsafe {
        drop(Box::from_raw(builder as *mut BuilderHandle));
    }));
}

fn live_builder<'a>(builder: *mut IsBuilder) -> Result<&'a mut BuilderHandle, c_int> {
    if builder.is_null() {
        set_last_error("builder is null");
        return Err(IS_INVALID_ARGUMENT);
    }
    let handle = unsafe { &mut *(builder as *mut BuilderHandle) };
    if handle.inner.is_none() {
        set_last_error("builder was already consumed by is_builder_build");
        return Err(IS_INVALID_ARGUMENT);
    }
    Ok(handle)
}

/// Applies a rebinding step to a live builder. `inner` is always `Some`
/// here; `live_builder` rejects consumed handles.
fn rebind(
    builder: *mut IsBuilder,
    apply: impl FnOnce(InputStreamBuilder) -> InputStreamBuilder,
) -> Result<(), c_int> {
    let handle = live_builder(builder)?;
    if let Some(inner) = handle.inner.take() {
        handle.inner = Some(apply(inner));
    }
    Ok(())
}

#[no_mangle]
/// # Safety
/// - `builder` must be a live pointer returned by `is_builder_new`.
/// - `f` must remain callable, and `user_data` valid, for the lifetime of
///   any stream built from this builder.
pub unsafe extern "C" fn is_builder_set_seek(
    builder: *mut IsBuilder,
    f: IsSeekFn,
    user_data: *mut c_void,
) -> c_int {
    with_boundary(|| {
        let Some(f) = f else {
            return Err(invalid_handler(Slot::Seek));
        };
        let user_data = UserData(user_data);
        rebind(builder, move |b| {
            b.with_seek(move |offset, basis| {
                let basis = match basis {
                    SeekBasis::Start => IS_SEEK_BASIS_START,
                    SeekBasis::Current => IS_SEEK_BASIS_CURRENT,
                };
                unsafe { f(user_data.get(), offset, basis) != 0 }
            })
        })
    })
}

#[no_mangle]
/// # Safety
/// - `builder` must be a live pointer returned by `is_builder_new`.
/// - `f` must remain callable, and `user_data` valid, for the lifetime of
///   any stream built from this builder.
pub unsafe extern "C" fn is_builder_set_read(
    builder: *mut IsBuilder,
    f: IsReadFn,
    user_data: *mut c_void,
) -> c_int {
    with_boundary(|| {
        let Some(f) = f else {
            return Err(invalid_handler(Slot::Read));
        };
        let user_data = UserData(user_data);
        rebind(builder, move |b| {
            b.with_read(move |dest| unsafe { f(user_data.get(), dest.as_mut_ptr(), dest.len()) })
        })
    })
}

#[no_mangle]
/// # Safety
/// - `builder` must be a live pointer returned by `is_builder_new`.
/// - `f` must remain callable, and `user_data` valid, for the lifetime of
///   any stream built from this builder.
pub unsafe extern "C" fn is_builder_set_length(
    builder: *mut IsBuilder,
    f: IsLengthFn,
    user_data: *mut c_void,
) -> c_int {
    with_boundary(|| {
        let Some(f) = f else {
            return Err(invalid_handler(Slot::Length));
        };
        let user_data = UserData(user_data);
        rebind(builder, move |b| {
            b.with_length(move || {
                let mut length = 0_i64;
                let supported = unsafe { f(user_data.get(), &mut length) != 0 };
                supported.then_some(length)
            })
        })
    })
}

#[no_mangle]
/// # Safety
/// - `builder` must be a live pointer returned by `is_builder_new`.
/// - `f` must remain callable, and `user_data` valid, for the lifetime of
///   any stream built from this builder.
pub unsafe extern "C" fn is_builder_set_status(
    builder: *mut IsBuilder,
    f: IsStatusFn,
    user_data: *mut c_void,
) -> c_int {
    with_boundary(|| {
        let Some(f) = f else {
            return Err(invalid_handler(Slot::Status));
        };
        let user_data = UserData(user_data);
        rebind(builder, move |b| {
            b.with_status(move || unsafe { f(user_data.get()) })
        })
    })
}

#[no_mangle]
/// # Safety
/// - `builder` must be a live pointer returned by `is_builder_new`.
/// - `f` must remain callable, and `user_data` valid, until the stream built
///   from this builder has been released.
pub unsafe extern "C" fn is_builder_set_destroy(
    builder: *mut IsBuilder,
    f: IsDestroyFn,
    user_data: *mut c_void,
) -> c_int {
    with_boundary(|| {
        let Some(f) = f else {
            return Err(invalid_handler(Slot::Destroy));
        };
        let user_data = UserData(user_data);
        rebind(builder, move |b| {
            b.with_destroy(move || unsafe { f(user_data.get()) })
        })
    })
}

#[no_mangle]
/// # Safety
/// - `builder` must be a live pointer returned by `is_builder_new`; a
///   successful build consumes it, but it must still be released with
///   `is_builder_free`. After a failed build the builder stays usable.
/// - `out_stream` must be non-null and writable.
/// - On success, `*out_stream` must be released with `is_stream_release`
///   exactly once.
pub unsafe extern "C" fn is_builder_build(
    builder: *mut IsBuilder,
    out_stream: *mut *mut IsStream,
) -> c_int {
    with_boundary(|| {
        if out_stream.is_null() {
            set_last_error("out_stream is null");
            return Err(IS_INVALID_ARGUMENT);
        }
        let handle = live_builder(builder)?;

        // Reject an incomplete vtable before consuming the builder, so the
        // caller can install the missing slot and retry.
        let missing = handle.inner.as_ref().and_then(|b| b.missing_slot());
        if let Some(slot) = missing {
            set_last_error(ConstructionError::IncompleteVTable { slot }.to_string());
            return Err(IS_INVALID_ARGUMENT);
        }

        let Some(inner) = handle.inner.take() else {
            // live_builder already rejected consumed handles.
            return Err(IS_INTERNAL);
        };

        let stream = inner.build().map_err(|e| {
            set_last_error(e.to_string());
            IS_INVALID_ARGUMENT
        })?;

        let boxed = Box::new(StreamHandle { inner: stream });
        unsafe { *out_stream = Box::into_raw(boxed) as *mut IsStream };
        Ok(())
    })
}

fn live_stream<'a>(stream: *mut IsStream) -> Result<&'a mut StreamHandle, c_int> {
    if stream.is_null() {
        set_last_error("stream is null");
        return Err(IS_INVALID_ARGUMENT);
    }
    Ok(unsafe { &mut *(stream as *mut StreamHandle) })
}

#[no_mangle]
/// # Safety
/// - `stream` must be a pointer returned by `is_builder_build`.
/// - No other call on `stream` may be in flight.
pub unsafe extern "C" fn is_stream_seek(stream: *mut IsStream, offset: i64, basis: c_int) -> c_int {
    with_boundary(|| {
        let handle = live_stream(stream)?;
        let basis = match basis {
            IS_SEEK_BASIS_START => SeekBasis::Start,
            IS_SEEK_BASIS_CURRENT => SeekBasis::Current,
            other => {
                set_last_error(format!("unknown seek basis: {other}"));
                return Err(IS_INVALID_ARGUMENT);
            }
        };
        handle.inner.seek(offset, basis).map_err(map_seek)
    })
}

#[no_mangle]
/// # Safety
/// - `stream` must be a pointer returned by `is_builder_build`.
/// - `dest` must be valid for writes of `dest_len` bytes for the duration of
///   the call (it is not retained).
/// - `out_read` must be non-null and writable.
/// - No other call on `stream` may be in flight.
pub unsafe extern "C" fn is_stream_read(
    stream: *mut IsStream,
    dest: *mut u8,
    dest_len: usize,
    out_read: *mut usize,
) -> c_int {
    with_boundary(|| {
        if out_read.is_null() {
            set_last_error("out_read is null");
            return Err(IS_INVALID_ARGUMENT);
        }
        if dest.is_null() && dest_len > 0 {
            set_last_error("dest is null");
            return Err(IS_INVALID_ARGUMENT);
        }

        let handle = live_stream(stream)?;
        let buf: &mut [u8] = if dest_len == 0 {
            &mut []
        } else {
            unsafe { slice::from_raw_parts_mut(dest, dest_len) }
        };

        let n = handle.inner.read(buf).map_err(map_read)?;
        unsafe { *out_read = n };
        Ok(())
    })
}

#[no_mangle]
/// # Safety
/// - `stream` must be a pointer returned by `is_builder_build`.
/// - `out_length` must be non-null and writable.
/// - No other call on `stream` may be in flight.
pub unsafe extern "C" fn is_stream_get_length(stream: *mut IsStream, out_length: *mut i64) -> c_int {
    with_boundary(|| {
        if out_length.is_null() {
            set_last_error("out_length is null");
            return Err(IS_INVALID_ARGUMENT);
        }
        let handle = live_stream(stream)?;
        let length = handle.inner.length().map_err(map_length)?;
        unsafe { *out_length = length };
        Ok(())
    })
}

#[no_mangle]
/// # Safety
/// - `stream` must be a pointer returned by `is_builder_build`.
/// - `out_status` must be non-null and writable.
/// - No other call on `stream` may be in flight.
pub unsafe extern "C" fn is_stream_get_status(
    stream: *mut IsStream,
    out_status: *mut IsStreamStatus,
) -> c_int {
    with_boundary(|| {
        if out_status.is_null() {
            set_last_error("out_status is null");
            return Err(IS_INVALID_ARGUMENT);
        }
        let handle = live_stream(stream)?;
        let status = handle.inner.status().map_err(|e| {
            set_last_error(e.to_string());
            IS_DESTROYED
        })?;
        unsafe {
            *out_status = IsStreamStatus {
                is_valid: status.is_valid,
                is_end_of_stream: status.is_end_of_stream,
            }
        };
        Ok(())
    })
}

#[no_mangle]
/// # Safety
/// - `stream` must be a pointer returned by `is_builder_build` (or null).
/// - `stream` must not be used after this call, and not released twice.
///
/// Releasing the last reference runs the bound destroy handler exactly once.
pub unsafe extern "C" fn is_stream_release(stream: *mut IsStream) {
    clear_last_error();
    if stream.is_null() {
        return;
    }
    let _ = catch_unwind(AssertUnwindSafe(|| unsafe {
        drop(Box::from_raw(stream as *mut StreamHandle));
    }));
}
