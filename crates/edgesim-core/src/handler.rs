//! Event handling.

use crate::event::Event;

/// Trait implemented by components that receive events.
pub trait EventHandler {
    /// Processes a delivered event.
    fn on(&mut self, event: Event);
}

/// Matches the event payload against a list of concrete types and destructures the first match.
///
/// Payloads of other types are logged as unhandled.
///
/// # Examples
///
/// ```rust
/// use serde::Serialize;
/// use edgesim_core::{cast, Event, EventHandler};
///
/// #[derive(Serialize)]
/// pub struct Ping {
///     seq: u32,
/// }
///
/// pub struct Component {
///     received: u32,
/// }
///
/// impl EventHandler for Component {
///     fn on(&mut self, event: Event) {
///         cast!(match event.data {
///             Ping { seq } => {
///                 self.received = seq;
///             }
///         })
///     }
/// }
/// ```
#[macro_export]
macro_rules! cast {
    ( match $event:ident.data { $( $type:ident { $($tt:tt)* } => { $($expr:tt)* } )+ } ) => {
        $(
            if $event.data.is::<$type>() {
                if let Ok(__value) = $event.data.downcast::<$type>() {
                    let $type { $($tt)* } = *__value;
                    $($expr)*
                }
            } else
        )*
        {
            $crate::log::log_unhandled_event($event);
        }
    }
}
