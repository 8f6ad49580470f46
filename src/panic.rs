//! Panic containment for background threads.
//!
//! The throttle worker runs user-visible connection code on its own thread.
//! A panic there must not vanish silently, so the worker body runs through
//! [`catch_logged`], which reports the payload and lets the caller react.

use std::{
    any::Any,
    fmt,
    panic::{self, AssertUnwindSafe},
};

use tracing::error;

/// Display adapter for a panic payload.
///
/// `String` and `&'static str` payloads print as-is; anything else prints a
/// placeholder.
///
/// ```
/// use chatnet::panic::format_panic;
/// assert_eq!(format_panic(&"boom").to_string(), "boom");
/// assert_eq!(format_panic(&String::from("boom")).to_string(), "boom");
/// ```
#[must_use]
pub struct PanicMessage<'a>(&'a (dyn Any + Send));

impl fmt::Display for PanicMessage<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(message) = self.0.downcast_ref::<String>() {
            f.write_str(message)
        } else if let Some(message) = self.0.downcast_ref::<&'static str>() {
            f.write_str(message)
        } else {
            f.write_str("non-string panic payload")
        }
    }
}

pub fn format_panic(payload: &(dyn Any + Send)) -> PanicMessage<'_> { PanicMessage(payload) }

/// Run `body`, logging and swallowing any panic it raises.
///
/// Returns `None` if `body` panicked.
pub fn catch_logged<T>(task: &str, body: impl FnOnce() -> T) -> Option<T> {
    match panic::catch_unwind(AssertUnwindSafe(body)) {
        Ok(value) => Some(value),
        Err(payload) => {
            error!(task, panic = %format_panic(payload.as_ref()), "background task panicked");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn returns_the_value_when_no_panic_occurs() {
        assert_eq!(catch_logged("sum", || 2 + 2), Some(4));
    }

    #[test]
    fn swallows_panics() {
        let outcome = catch_logged("explode", || -> u8 { panic!("boom") });
        assert_eq!(outcome, None);
    }

    #[test]
    fn non_string_payloads_are_described() {
        let payload: Box<dyn Any + Send> = Box::new(7_u32);
        assert_eq!(
            format_panic(payload.as_ref()).to_string(),
            "non-string panic payload"
        );
    }
}
