//! Component logging on top of the `log` facade.
//!
//! Records look like `[12.345 DEBUG coordinator] message`: simulated time, level and the component name, which is
//! also used as the record target so `RUST_LOG=coordinator=debug` selects a single component.

use atty::Stream;
use colored::{Color, ColoredString, Colorize};
use log::{error, Level};
use serde_json::json;
use serde_type_name::type_name;

use crate::event::Event;

#[doc(hidden)]
pub use log as __log;

/// Colors the string unless stderr is redirected.
pub fn get_colored(s: &str, color: Color) -> ColoredString {
    if atty::is(Stream::Stderr) {
        s.color(color)
    } else {
        s.normal()
    }
}

#[doc(hidden)]
pub fn level_label(level: Level) -> ColoredString {
    let (label, color) = match level {
        Level::Error => ("ERROR", Color::Red),
        Level::Warn => ("WARN ", Color::Yellow),
        Level::Info => ("INFO ", Color::Green),
        Level::Debug => ("DEBUG", Color::Blue),
        Level::Trace => ("TRACE", Color::Cyan),
    };
    get_colored(label, color)
}

#[doc(hidden)]
#[macro_export]
macro_rules! __log_with_ctx {
    ($level:expr, $ctx:expr, $($arg:tt)+) => {
        $crate::log::__log::log!(
            target: $ctx.name(),
            $level,
            "[{:.3} {} {}] {}",
            $ctx.time(),
            $crate::log::level_label($level),
            $ctx.name(),
            format_args!($($arg)+)
        )
    };
}

/// Logs an info record for the component owning the context.
///
/// ```rust
/// use edgesim_core::{log_info, Simulation};
///
/// let mut sim = Simulation::new();
/// let ctx = sim.create_context("orchestrator");
/// log_info!(ctx, "placement policy: {}", "LEAST_LOADED");
/// ```
#[macro_export]
macro_rules! log_info {
    ($ctx:expr, $($arg:tt)+) => ($crate::__log_with_ctx!($crate::log::__log::Level::Info, $ctx, $($arg)+));
}

/// Same as [`log_info!`](crate::log_info!) at the warn level.
#[macro_export]
macro_rules! log_warn {
    ($ctx:expr, $($arg:tt)+) => ($crate::__log_with_ctx!($crate::log::__log::Level::Warn, $ctx, $($arg)+));
}

/// Same as [`log_info!`](crate::log_info!) at the debug level.
#[macro_export]
macro_rules! log_debug {
    ($ctx:expr, $($arg:tt)+) => ($crate::__log_with_ctx!($crate::log::__log::Level::Debug, $ctx, $($arg)+));
}

/// Same as [`log_info!`](crate::log_info!) at the error level.
#[macro_export]
macro_rules! log_error {
    ($ctx:expr, $($arg:tt)+) => ($crate::__log_with_ctx!($crate::log::__log::Level::Error, $ctx, $($arg)+));
}

fn log_dropped(reason: &str, event: &Event) {
    error!(
        target: "simulation",
        "[{:.3} {} simulation] {} event: {}",
        event.time,
        level_label(Level::Error),
        reason,
        json!({"type": type_name(&event.data).unwrap_or("?"), "data": event.data, "src": event.src, "dest": event.dest})
    );
}

/// Reports an event whose payload matched no arm of [`cast!`](crate::cast!).
pub fn log_unhandled_event(event: Event) {
    log_dropped("Unhandled", &event);
}

pub(crate) fn log_undelivered_event(event: Event) {
    log_dropped("Undelivered", &event);
}
