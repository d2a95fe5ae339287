//! Session bridge between the meeting media relay and the realtime speech service.
//!
//! Each accepted upgrade on the bridge route becomes one [`Session`] pairing the
//! inbound relay connection with a freshly opened upstream connection.

pub mod acceptor;
pub mod envelope;
pub mod liveness;
pub mod upstream;
mod server;
mod session;

use std::fmt;

pub use liveness::LivenessMonitor;
pub use server::BridgeServer;
pub use session::{Session, SessionState};

/// One of the two connections owned by a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Leg {
    /// Client-facing connection from the media relay.
    Inbound,
    /// Service-facing connection to the speech model.
    Outbound,
}

impl Leg {
    pub fn peer(self) -> Leg {
        match self {
            Leg::Inbound => Leg::Outbound,
            Leg::Outbound => Leg::Inbound,
        }
    }
}

impl fmt::Display for Leg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Leg::Inbound => f.write_str("inbound"),
            Leg::Outbound => f.write_str("outbound"),
        }
    }
}
