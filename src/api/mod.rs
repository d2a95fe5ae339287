//! HTTP collaborator layer: webhook sink and meeting bot control.

mod handlers;

pub use handlers::{configure, create_bot, end_bot, list_bots, webhook, CreateBotRequest};
