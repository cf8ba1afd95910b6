//! Panic payload formatting and location capture.
//!
//! `catch_unwind` hands back only the payload. The hook installed by
//! [`install_hook`] also remembers where the last panic on each thread
//! happened, so a caught panic can be recorded with its location.

use std::any::Any;
use std::cell::RefCell;
use std::sync::Once;
use storyline_schema::story::ErrorInfo;

thread_local! {
    static LAST_PANIC: RefCell<Option<ErrorInfo>> = const { RefCell::new(None) };
}

static HOOK: Once = Once::new();

/// Text of a `panic!` payload.
///
/// `String` and `&'static str` payloads are returned as-is; anything else
/// falls back to a fixed description.
pub fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = payload.downcast_ref::<&'static str>() {
        (*s).to_string()
    } else {
        "step panicked with a non-string payload".to_string()
    }
}

/// Chain a hook that records each panic's message and location on the
/// panicking thread. Idempotent; the previous hook still runs.
pub fn install_hook() {
    HOOK.call_once(|| {
        let previous = std::panic::take_hook();
        std::panic::set_hook(Box::new(move |info| {
            let mut error = ErrorInfo::new(panic_message(info.payload()));
            if let Some(location) = info.location() {
                error = error.with_stack(format!("at {location}"));
            }
            LAST_PANIC.with(|slot| *slot.borrow_mut() = Some(error));
            previous(info);
        }));
    });
}

/// Take the panic last seen on this thread, if any.
pub fn take_last_panic() -> Option<ErrorInfo> {
    LAST_PANIC.with(|slot| slot.borrow_mut().take())
}

/// Failure for a caught `payload`, with the location the hook saw for it.
///
/// The remembered panic is left in place: a resumed unwind is not reported
/// to the hook again, so outer handlers need the same location.
pub fn panic_error(payload: &(dyn Any + Send)) -> ErrorInfo {
    let message = panic_message(payload);
    LAST_PANIC
        .with(|slot| slot.borrow().clone())
        .filter(|seen| seen.message == message)
        .unwrap_or_else(|| ErrorInfo::new(message))
}
