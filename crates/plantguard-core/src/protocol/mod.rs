//! Wire formats: the serial line framer and the relay's JSON event envelope.

pub mod events;
pub mod framing;

pub use events::{ClientEvent, HubEvent};
pub use framing::{Delimiter, DelimiterError, LineFramer};
