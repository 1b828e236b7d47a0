//! Internal logging shim.
//!
//! Every diagnostic in the crate goes through [`heap_log!`]. With the `log`
//! feature enabled it forwards to the `log` facade. Without it the arguments
//! are still type-checked, but nothing is emitted and nothing allocates, so
//! the heap can back `#[global_allocator]` without re-entering itself.

macro_rules! heap_log {
  ($level:ident, $($arg:tt)+) => {{
    #[cfg(feature = "log")]
    ::log::$level!($($arg)+);
    #[cfg(not(feature = "log"))]
    let _ = format_args!($($arg)+);
  }};
}

pub(crate) use heap_log;
