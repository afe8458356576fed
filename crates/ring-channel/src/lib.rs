//! Lock-free primitives shared by the rest of the screensaver substrate:
//! a bounded SPSC ring buffer (§4.A) and a latest-value triple buffer
//! (§4.B).

pub mod error;
mod spsc;
mod triple;

pub use error::Error;
pub use spsc::{ring_channel, RingReceiver, RingSender};
pub use triple::{triple_buffer, Publisher, Subscriber};
