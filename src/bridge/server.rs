use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tracing::{error, info, warn};

use super::acceptor::{self, Decision};
use super::upstream;
use super::Session;
use crate::config::Settings;

pub struct BridgeServer {
    settings: Arc<Settings>,
}

impl BridgeServer {
    pub fn new(settings: Arc<Settings>) -> Self {
        Self { settings }
    }

    /// Accepts connections until the listener fails. Each connection runs on
    /// its own task and nothing is shared between sessions except settings.
    pub async fn serve(self: Arc<Self>, listener: TcpListener) {
        match listener.local_addr() {
            Ok(addr) => info!(
                "Bridge listening at ws://{}{}",
                addr, self.settings.bridge.route
            ),
            Err(e) => warn!("Bridge listener address unavailable: {}", e),
        }

        loop {
            match listener.accept().await {
                Ok((stream, addr)) => {
                    let server = self.clone();
                    tokio::spawn(async move {
                        server.handle_connection(stream, addr).await;
                    });
                }
                Err(e) => {
                    error!("Error accepting bridge connection: {}", e);
                }
            }
        }
    }

    pub async fn handle_connection(self: Arc<Self>, raw_stream: TcpStream, addr: SocketAddr) {
        let target = match acceptor::peek_request_target(&raw_stream).await {
            Ok(target) => target,
            Err(e) => {
                warn!("Failed to read request from {}: {}", addr, e);
                return;
            }
        };

        let decision = target
            .as_deref()
            .map(|target| acceptor::route_decision(target, &self.settings.bridge.route))
            .unwrap_or(Decision::Reject);
        if decision == Decision::Reject {
            info!("Rejected upgrade from {} for {:?}", addr, target);
            // Dropping the socket closes it without writing a response.
            drop(raw_stream);
            return;
        }

        let ws_stream = match acceptor::accept(raw_stream).await {
            Ok(ws) => ws,
            Err(e) => {
                error!("Inbound connection from {} dropped: {}", addr, e);
                return;
            }
        };

        let session = Session::new(self.settings.clone());
        let id = session.id();
        info!("Session {} started for {}", id, addr);

        let settings = self.settings.clone();
        let state = session
            .run(ws_stream, async move { upstream::connect(&settings.realtime).await })
            .await;
        info!("Session {} finished in state {:?}", id, state);
    }
}
