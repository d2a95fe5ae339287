//! Client for the third-party meeting bot API.
//!
//! Bots are created pointing their real-time media stream at this service's
//! bridge route and their lifecycle events at the webhook endpoint.

mod client;

pub use client::{BotClient, BotResponse, CredentialScheme};
