//! C-ABI wrapper around `fetch-core`.
//!
//! # Overview
//! Lets any language with a C FFI start a fetch and collect its outcome from
//! whatever thread it likes, by polling, blocking, or registering a
//! callback, without knowing anything about tokio.
//!
//! # Design
//! - Every `extern "C"` function wraps its body in `catch_unwind` so panics
//!   never cross the FFI boundary.
//! - Fetches run on one process-wide multi-threaded runtime, created on the
//!   first `fetch_start`.
//! - The outcome of a handle is handed out once, as an `FfiFetchResult`,
//!   through `fetch_poll`, `fetch_wait` or `fetch_on_complete`. Later calls
//!   report `AlreadyTaken`.
//! - The C caller owns all returned pointers and must release them with
//!   `fetch_handle_free` and `fetch_free_result`.

pub mod types;

use std::ffi::{c_void, CStr, CString};
use std::os::raw::c_char;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::OnceLock;

use fetch_core::{FetchConfig, Fetcher};
use tokio::runtime::Runtime;

use types::*;

/// Completion callback. Receives ownership of the result (free it with
/// `fetch_free_result`) and the `user_data` given at registration. Runs on
/// a runtime worker thread.
pub type FetchCallback = extern "C" fn(result: *mut FfiFetchResult, user_data: *mut c_void);

static RUNTIME: OnceLock<Option<Runtime>> = OnceLock::new();

fn runtime() -> Option<&'static Runtime> {
    RUNTIME
        .get_or_init(|| {
            tokio::runtime::Builder::new_multi_thread()
                .thread_name("fetch-ffi")
                .enable_all()
                .build()
                .map_err(|err| tracing::error!("failed to start fetch runtime: {err}"))
                .ok()
        })
        .as_ref()
}

// ---------------------------------------------------------------------------
// Fetch lifecycle
// ---------------------------------------------------------------------------

/// Start fetching `/` from `host` on `port` (80 for plain HTTP).
///
/// Returns immediately. Returns null if `host` is null or not UTF-8, if the
/// runtime could not be started, or if an internal panic occurs.
/// The caller must free the returned pointer with `fetch_handle_free`.
#[unsafe(no_mangle)]
pub extern "C" fn fetch_start(host: *const c_char, port: u16) -> *mut FfiFetchHandle {
    catch_unwind(|| {
        if host.is_null() {
            return std::ptr::null_mut();
        }
        let Ok(host) = unsafe { CStr::from_ptr(host) }.to_str() else {
            return std::ptr::null_mut();
        };
        let Some(runtime) = runtime() else {
            return std::ptr::null_mut();
        };
        let config = FetchConfig {
            port,
            ..FetchConfig::default()
        };
        let handle = Fetcher::new(runtime.handle().clone())
            .with_config(config)
            .fetch(host);
        Box::into_raw(Box::new(FfiFetchHandle {
            inner: Some(handle),
        }))
    })
    .unwrap_or(std::ptr::null_mut())
}

/// Non-blocking check for the outcome.
///
/// Returns null while the fetch is still running. Once the outcome is
/// available it is returned exactly once; the caller frees it with
/// `fetch_free_result`.
#[unsafe(no_mangle)]
pub extern "C" fn fetch_poll(handle: *mut FfiFetchHandle) -> *mut FfiFetchResult {
    catch_unwind(AssertUnwindSafe(|| {
        if handle.is_null() {
            return FfiFetchResult::null_arg("handle");
        }
        let handle = unsafe { &mut *handle };
        let Some(inner) = handle.inner.as_mut() else {
            return FfiFetchResult::already_taken();
        };
        match inner.try_take() {
            Some(outcome) => {
                handle.inner = None;
                FfiFetchResult::from_outcome(outcome)
            }
            None => std::ptr::null_mut(),
        }
    }))
    .unwrap_or_else(|_| FfiFetchResult::panic("panic in fetch_poll"))
}

/// Block the calling thread until the outcome is available.
///
/// Called from a runtime thread (for example inside a callback registered
/// with `fetch_on_complete`) it returns `WouldBlockRuntime` and leaves the
/// outcome in the handle. The caller frees the result with
/// `fetch_free_result`.
#[unsafe(no_mangle)]
pub extern "C" fn fetch_wait(handle: *mut FfiFetchHandle) -> *mut FfiFetchResult {
    catch_unwind(AssertUnwindSafe(|| {
        if handle.is_null() {
            return FfiFetchResult::null_arg("handle");
        }
        if tokio::runtime::Handle::try_current().is_ok() {
            return FfiFetchResult::would_block_runtime();
        }
        let handle = unsafe { &mut *handle };
        match handle.inner.take() {
            Some(inner) => FfiFetchResult::from_outcome(inner.wait()),
            None => FfiFetchResult::already_taken(),
        }
    }))
    .unwrap_or_else(|_| FfiFetchResult::panic("panic in fetch_wait"))
}

/// Pointer supplied by the C caller, passed back untouched to its callback.
struct UserData(*mut c_void);

// The pointer is never dereferenced on the Rust side; thread-safety of what
// it points to is the C caller's contract.
unsafe impl Send for UserData {}

impl UserData {
    fn into_raw(self) -> *mut c_void {
        self.0
    }
}

/// Register `callback` to receive the outcome. It runs exactly once, on a
/// runtime worker thread.
///
/// Returns false (and never calls `callback`) if `handle` or `callback` is
/// null or the outcome was already taken. The handle itself must still be
/// freed with `fetch_handle_free`; freeing it does not unregister the
/// callback.
#[unsafe(no_mangle)]
pub extern "C" fn fetch_on_complete(
    handle: *mut FfiFetchHandle,
    callback: Option<FetchCallback>,
    user_data: *mut c_void,
) -> bool {
    catch_unwind(AssertUnwindSafe(|| {
        let Some(callback) = callback else {
            return false;
        };
        if handle.is_null() {
            return false;
        }
        let handle = unsafe { &mut *handle };
        let Some(inner) = handle.inner.take() else {
            return false;
        };
        let user_data = UserData(user_data);
        inner.on_complete(move |outcome| {
            let user_data = user_data.into_raw();
            callback(FfiFetchResult::from_outcome(outcome), user_data);
        });
        true
    }))
    .unwrap_or(false)
}

/// Ask the fetch to stop. Its outcome becomes `Cancelled` unless it had
/// already completed. Safe to call with null or after the outcome was taken.
#[unsafe(no_mangle)]
pub extern "C" fn fetch_cancel(handle: *const FfiFetchHandle) {
    if handle.is_null() {
        return;
    }
    let _ = catch_unwind(AssertUnwindSafe(|| {
        let handle = unsafe { &*handle };
        if let Some(inner) = handle.inner.as_ref() {
            inner.cancel();
        }
    }));
}

// ---------------------------------------------------------------------------
// Free functions
// ---------------------------------------------------------------------------

/// Free a handle returned by `fetch_start`. Safe to call with null. A fetch
/// still in flight keeps running; its outcome is discarded.
#[unsafe(no_mangle)]
pub extern "C" fn fetch_handle_free(handle: *mut FfiFetchHandle) {
    if !handle.is_null() {
        let _ = catch_unwind(AssertUnwindSafe(|| {
            drop(unsafe { Box::from_raw(handle) });
        }));
    }
}

/// Free a result returned by `fetch_poll`, `fetch_wait` or passed to a
/// completion callback. Safe to call with null.
#[unsafe(no_mangle)]
pub extern "C" fn fetch_free_result(result: *mut FfiFetchResult) {
    if result.is_null() {
        return;
    }
    let _ = catch_unwind(AssertUnwindSafe(|| {
        let result = unsafe { Box::from_raw(result) };
        if !result.error_message.is_null() {
            drop(unsafe { CString::from_raw(result.error_message) });
        }
        if !result.data.is_null() {
            let data = std::ptr::slice_from_raw_parts_mut(result.data, result.len);
            drop(unsafe { Box::from_raw(data) });
        }
    }));
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::SocketAddr;
    use std::time::Duration;

    /// Serve the mock app on a background thread with its own runtime.
    fn start_mock_server() -> SocketAddr {
        let std_listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = std_listener.local_addr().unwrap();
        std_listener.set_nonblocking(true).unwrap();

        std::thread::spawn(move || {
            let rt = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .unwrap();
            rt.block_on(async {
                let listener = tokio::net::TcpListener::from_std(std_listener).unwrap();
                mock_server::run(listener).await
            })
            .unwrap();
        });

        addr
    }

    fn start(host: &str, port: u16) -> *mut FfiFetchHandle {
        let host = CString::new(host).unwrap();
        let handle = fetch_start(host.as_ptr(), port);
        assert!(!handle.is_null());
        handle
    }

    fn result_bytes(result: *mut FfiFetchResult) -> Vec<u8> {
        let r = unsafe { &*result };
        assert_eq!(r.error_code, FfiErrorCode::Ok);
        assert!(r.error_message.is_null());
        unsafe { std::slice::from_raw_parts(r.data, r.len) }.to_vec()
    }

    fn result_message(result: *mut FfiFetchResult) -> String {
        let r = unsafe { &*result };
        unsafe { CStr::from_ptr(r.error_message) }
            .to_str()
            .unwrap()
            .to_string()
    }

    #[test]
    fn start_null_host_returns_null() {
        assert!(fetch_start(std::ptr::null(), 80).is_null());
    }

    #[test]
    fn wait_returns_response_bytes() {
        let addr = start_mock_server();
        let handle = start("127.0.0.1", addr.port());

        let result = fetch_wait(handle);
        let bytes = result_bytes(result);
        let text = String::from_utf8(bytes).unwrap();
        assert!(text.starts_with("HTTP/1.1 200 OK\r\n"), "{text}");
        assert!(text.ends_with(mock_server::GREETING), "{text}");

        fetch_free_result(result);
        fetch_handle_free(handle);
    }

    #[test]
    fn outcome_is_taken_once() {
        let addr = start_mock_server();
        let handle = start("127.0.0.1", addr.port());

        let first = fetch_wait(handle);
        assert_eq!(unsafe { &*first }.error_code, FfiErrorCode::Ok);
        let second = fetch_wait(handle);
        assert_eq!(unsafe { &*second }.error_code, FfiErrorCode::AlreadyTaken);
        let polled = fetch_poll(handle);
        assert_eq!(unsafe { &*polled }.error_code, FfiErrorCode::AlreadyTaken);

        fetch_free_result(first);
        fetch_free_result(second);
        fetch_free_result(polled);
        fetch_handle_free(handle);
    }

    #[test]
    fn wait_on_runtime_thread_keeps_outcome() {
        let addr = start_mock_server();
        let handle = start("127.0.0.1", addr.port());

        let rt = tokio::runtime::Builder::new_current_thread()
            .build()
            .unwrap();
        let refused = rt.block_on(async { fetch_wait(handle) });
        assert_eq!(unsafe { &*refused }.error_code, FfiErrorCode::WouldBlockRuntime);

        let result = fetch_wait(handle);
        assert!(result_bytes(result).ends_with(mock_server::GREETING.as_bytes()));

        fetch_free_result(refused);
        fetch_free_result(result);
        fetch_handle_free(handle);
    }

    #[test]
    fn poll_until_ready() {
        let addr = start_mock_server();
        let handle = start("127.0.0.1", addr.port());

        let result = loop {
            let result = fetch_poll(handle);
            if !result.is_null() {
                break result;
            }
            std::thread::sleep(Duration::from_millis(5));
        };
        assert!(result_bytes(result).ends_with(mock_server::GREETING.as_bytes()));

        fetch_free_result(result);
        fetch_handle_free(handle);
    }

    #[test]
    fn refused_connection_reports_error_code() {
        let port = mock_server::refused_addr().unwrap().port();
        let handle = start("127.0.0.1", port);

        let result = fetch_wait(handle);
        assert_eq!(unsafe { &*result }.error_code, FfiErrorCode::AllConnectionsFailed);
        assert!(unsafe { &*result }.data.is_null());
        assert!(result_message(result).contains("127.0.0.1"));

        fetch_free_result(result);
        fetch_handle_free(handle);
    }

    extern "C" fn record_len(result: *mut FfiFetchResult, user_data: *mut c_void) {
        let tx = unsafe { &*(user_data as *const std::sync::mpsc::Sender<usize>) };
        let len = unsafe { &*result }.len;
        fetch_free_result(result);
        tx.send(len).unwrap();
    }

    #[test]
    fn callback_receives_outcome() {
        let addr = start_mock_server();
        let handle = start("127.0.0.1", addr.port());
        let (tx, rx) = std::sync::mpsc::channel::<usize>();
        let tx = Box::new(tx);
        let user_data = &*tx as *const std::sync::mpsc::Sender<usize> as *mut c_void;

        assert!(fetch_on_complete(handle, Some(record_len), user_data));
        let len = rx.recv_timeout(Duration::from_secs(10)).unwrap();
        assert!(len > mock_server::GREETING.len());

        // Outcome went to the callback.
        let result = fetch_poll(handle);
        assert_eq!(unsafe { &*result }.error_code, FfiErrorCode::AlreadyTaken);
        fetch_free_result(result);
        fetch_handle_free(handle);
    }

    #[test]
    fn on_complete_rejects_missing_callback() {
        let handle = start("127.0.0.1", mock_server::refused_addr().unwrap().port());
        assert!(!fetch_on_complete(handle, None, std::ptr::null_mut()));
        assert!(!fetch_on_complete(std::ptr::null_mut(), Some(record_len), std::ptr::null_mut()));
        fetch_handle_free(handle);
    }

    #[test]
    fn cancel_unanswered_fetch() {
        // Accepts connections into the backlog but never answers.
        let silent = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let handle = start("127.0.0.1", silent.local_addr().unwrap().port());

        std::thread::sleep(Duration::from_millis(50));
        fetch_cancel(handle);
        let result = fetch_wait(handle);
        assert_eq!(unsafe { &*result }.error_code, FfiErrorCode::Cancelled);

        fetch_free_result(result);
        fetch_handle_free(handle);
        drop(silent);
    }

    #[test]
    fn null_arguments_are_reported() {
        let result = fetch_poll(std::ptr::null_mut());
        assert_eq!(unsafe { &*result }.error_code, FfiErrorCode::NullArg);
        assert_eq!(result_message(result), "null argument: handle");
        fetch_free_result(result);

        let result = fetch_wait(std::ptr::null_mut());
        assert_eq!(unsafe { &*result }.error_code, FfiErrorCode::NullArg);
        fetch_free_result(result);
    }

    #[test]
    fn free_and_cancel_null_are_safe() {
        fetch_cancel(std::ptr::null());
        fetch_handle_free(std::ptr::null_mut());
        fetch_free_result(std::ptr::null_mut());
    }
}
