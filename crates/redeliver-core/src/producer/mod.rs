//! Producer-side failure observation

mod send_error;

pub use send_error::{
    truncate_for_display, LoggingSendErrorObserver, SendErrorObserver, Utf8Lossy,
    DEFAULT_MAX_CONTENT_LOGGED,
};
