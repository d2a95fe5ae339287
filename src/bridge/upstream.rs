use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::handshake::client::Request;
use tokio_tungstenite::tungstenite::http::header::{HeaderName, HeaderValue, AUTHORIZATION};
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info};
use url::Url;

use crate::config::RealtimeConfig;
use crate::error::BridgeError;

pub type UpstreamStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

const BETA_HEADER: &str = "openai-beta";

/// Builds the upstream handshake request carrying model, credential and beta header.
pub fn build_request(config: &RealtimeConfig) -> Result<Request, BridgeError> {
    let mut url = Url::parse(&config.url)
        .map_err(|e| BridgeError::UpstreamConnectFailed(format!("invalid upstream url: {}", e)))?;
    url.query_pairs_mut().append_pair("model", &config.model);

    let mut request = url
        .as_str()
        .into_client_request()
        .map_err(|e| BridgeError::UpstreamConnectFailed(e.to_string()))?;

    let bearer = HeaderValue::from_str(&format!("Bearer {}", config.api_key))
        .map_err(|e| BridgeError::UpstreamConnectFailed(format!("invalid api key header: {}", e)))?;
    let beta = HeaderValue::from_str(&config.beta_header)
        .map_err(|e| BridgeError::UpstreamConnectFailed(format!("invalid beta header: {}", e)))?;

    let headers = request.headers_mut();
    headers.insert(AUTHORIZATION, bearer);
    headers.insert(HeaderName::from_static(BETA_HEADER), beta);

    Ok(request)
}

/// Opens the outbound leg. Not retried: a failure here ends the session.
pub async fn connect(config: &RealtimeConfig) -> Result<UpstreamStream, BridgeError> {
    let request = build_request(config)?;
    debug!("Connecting upstream to {}", request.uri());

    let (stream, response) = connect_async(request)
        .await
        .map_err(|e| BridgeError::UpstreamConnectFailed(e.to_string()))?;

    info!("Upstream handshake complete (status {})", response.status());
    Ok(stream)
}
