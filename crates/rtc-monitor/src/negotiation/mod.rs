//! Session negotiation.
//!
//! A single offer/answer round trip over plain HTTP brings the transport
//! online. There is no trickle ICE: the offer carries every locally gathered
//! candidate because no second message is ever exchanged.

pub mod description;
pub mod negotiator;
pub mod signaling;

pub use description::{decode, encode, SdpKind, SessionDescription};
pub use negotiator::SessionNegotiator;
pub use signaling::SignalingClient;
