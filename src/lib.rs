//! smsh - a small job-control shell
//!
//! Reads a line, splits it into a pipeline, runs it in the foreground or the
//! background and keeps the prompt safe from interrupts and child
//! notifications.

#![warn(
    missing_debug_implementations,
    trivial_casts,
    trivial_numeric_casts,
    unused_import_braces,
    unused_qualifications
)]

#[macro_use]
extern crate error_chain;
#[cfg(test)]
#[macro_use]
extern crate lazy_static;

/// Logs `$result` at error level if it is an `Err`.
macro_rules! log_if_err {
    ($result:expr, $fmt:expr) => {{
        if let Err(e) = $result {
            log::error!("{}: {}", $fmt, e);
        }
    }};
    ($result:expr, $fmt:expr, $($arg:tt)+) => {{
        if let Err(e) = $result {
            log::error!("{}: {}", format_args!($fmt, $($arg)+), e);
        }
    }};
}

pub mod core;
mod editor;
pub mod errors;
pub mod shell;
mod util;

pub use crate::shell::{Shell, ShellConfig};
pub use crate::util::SmshExitStatusExt;
