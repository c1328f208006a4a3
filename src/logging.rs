//! Crate-internal `error!`..`trace!` macros.
//!
//! All of them funnel into [`__log!`](crate::__log), which emits a `tracing` event under the
//! `event_supervisor` target (`RUST_LOG=event_supervisor=debug`). Without the `tracing` feature
//! the event is dropped at compile time; field expressions are still borrowed so call sites do
//! not warn about unused bindings.

#[allow(unused_macros)]
macro_rules! error {
    ($($arg:tt)*) => { $crate::__log!(ERROR, $($arg)*) };
}

#[allow(unused_macros)]
macro_rules! warn {
    ($($arg:tt)*) => { $crate::__log!(WARN, $($arg)*) };
}

#[allow(unused_macros)]
macro_rules! info {
    ($($arg:tt)*) => { $crate::__log!(INFO, $($arg)*) };
}

#[allow(unused_macros)]
macro_rules! debug {
    ($($arg:tt)*) => { $crate::__log!(DEBUG, $($arg)*) };
}

#[allow(unused_macros)]
macro_rules! trace {
    ($($arg:tt)*) => { $crate::__log!(TRACE, $($arg)*) };
}

#[doc(hidden)]
#[macro_export]
#[cfg(feature = "tracing")]
macro_rules! __log {
    ($level:ident, $($arg:tt)*) => {
        ::tracing::event!(target: "event_supervisor", ::tracing::Level::$level, $($arg)*)
    };
}

#[doc(hidden)]
#[macro_export]
#[cfg(not(feature = "tracing"))]
macro_rules! __log {
    ($level:ident, $($arg:tt)*) => {
        $crate::__log!(@fields $($arg)*)
    };
    (@fields $field:ident = % $value:expr, $($rest:tt)*) => {
        { let _ = &$value; $crate::__log!(@fields $($rest)*); }
    };
    (@fields $field:ident = ? $value:expr, $($rest:tt)*) => {
        { let _ = &$value; $crate::__log!(@fields $($rest)*); }
    };
    (@fields $field:ident = $value:expr, $($rest:tt)*) => {
        { let _ = &$value; $crate::__log!(@fields $($rest)*); }
    };
    (@fields % $field:ident, $($rest:tt)*) => {
        { let _ = &$field; $crate::__log!(@fields $($rest)*); }
    };
    (@fields ? $field:ident, $($rest:tt)*) => {
        { let _ = &$field; $crate::__log!(@fields $($rest)*); }
    };
    (@fields $field:ident, $($rest:tt)*) => {
        { let _ = &$field; $crate::__log!(@fields $($rest)*); }
    };
    (@fields $message:literal $(, $arg:expr)* $(,)?) => {
        { $(let _ = &$arg;)* }
    };
    (@fields) => {};
}
