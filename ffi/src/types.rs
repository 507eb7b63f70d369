//! `#[repr(C)]` types for the FFI boundary.
//!
//! # Design
//! Response bytes cross the boundary as pointer + length, never as a C
//! string, because a response body may contain NUL bytes. Error messages are
//! C strings. Every heap value handed to C is released through the matching
//! `fetch_free_*` function in `lib.rs`.

use std::ffi::CString;
use std::os::raw::c_char;

use fetch_core::{FetchError, FetchHandle, Outcome};

/// Opaque handle to an in-flight fetch. C callers receive a pointer to this
/// and pass it back into `fetch_poll`, `fetch_wait`, `fetch_on_complete`,
/// `fetch_cancel` and finally `fetch_handle_free`.
pub struct FfiFetchHandle {
    /// `None` once the outcome has been handed out.
    pub(crate) inner: Option<FetchHandle>,
}

/// Error codes returned in `FfiFetchResult`.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FfiErrorCode {
    Ok = 0,
    Resolution = 1,
    NoAddresses = 2,
    AllConnectionsFailed = 3,
    Send = 4,
    Cancelled = 5,
    Abandoned = 6,
    AlreadyTaken = 7,
    Panic = 8,
    NullArg = 9,
    /// `fetch_wait` was called on a runtime thread; the outcome is still
    /// available to a later call.
    WouldBlockRuntime = 10,
}

impl From<&FetchError> for FfiErrorCode {
    fn from(err: &FetchError) -> Self {
        match err {
            FetchError::Resolution { .. } => FfiErrorCode::Resolution,
            FetchError::NoAddresses { .. } => FfiErrorCode::NoAddresses,
            FetchError::AllConnectionsFailed { .. } => FfiErrorCode::AllConnectionsFailed,
            FetchError::Send(_) => FfiErrorCode::Send,
            FetchError::Cancelled => FfiErrorCode::Cancelled,
            FetchError::Abandoned => FfiErrorCode::Abandoned,
        }
    }
}

/// Outcome of one fetch.
///
/// On success `error_code` is `Ok`, `error_message` is null and
/// `data`/`len` hold the raw response (`data` is null when `len` is 0).
/// On failure `error_code` says why, `error_message` is a human-readable C
/// string and `data` is null.
#[repr(C)]
pub struct FfiFetchResult {
    pub error_code: FfiErrorCode,
    pub error_message: *mut c_char,
    pub data: *mut u8,
    pub len: usize,
}

impl FfiFetchResult {
    pub(crate) fn from_outcome(outcome: Outcome) -> *mut Self {
        match outcome {
            Ok(bytes) => Self::ok(bytes),
            Err(err) => Self::error(FfiErrorCode::from(&err), &err.to_string()),
        }
    }

    fn ok(bytes: Vec<u8>) -> *mut Self {
        let len = bytes.len();
        let data = if len == 0 {
            std::ptr::null_mut()
        } else {
            Box::into_raw(bytes.into_boxed_slice()) as *mut u8
        };
        Box::into_raw(Box::new(FfiFetchResult {
            error_code: FfiErrorCode::Ok,
            error_message: std::ptr::null_mut(),
            data,
            len,
        }))
    }

    pub(crate) fn error(error_code: FfiErrorCode, msg: &str) -> *mut Self {
        Box::into_raw(Box::new(FfiFetchResult {
            error_code,
            error_message: CString::new(msg).unwrap_or_default().into_raw(),
            data: std::ptr::null_mut(),
            len: 0,
        }))
    }

    /// Build an error result for a null argument.
    pub(crate) fn null_arg(name: &str) -> *mut Self {
        Self::error(FfiErrorCode::NullArg, &format!("null argument: {name}"))
    }

    /// Build an error result for a handle whose outcome was already taken.
    pub(crate) fn already_taken() -> *mut Self {
        Self::error(FfiErrorCode::AlreadyTaken, "outcome already taken from this handle")
    }

    pub(crate) fn would_block_runtime() -> *mut Self {
        Self::error(
            FfiErrorCode::WouldBlockRuntime,
            "fetch_wait cannot block a runtime thread",
        )
    }

    /// Build an error result for a caught panic.
    pub(crate) fn panic(msg: &str) -> *mut Self {
        Self::error(FfiErrorCode::Panic, msg)
    }
}
