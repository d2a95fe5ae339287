use reqwest::header::AUTHORIZATION;
use reqwest::{Client, Method, Response, StatusCode};
use serde_json::{json, Value};
use tracing::{info, warn};
use url::Url;

use crate::config::Settings;
use crate::error::BotApiError;

/// How the API key is presented in the `Authorization` header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialScheme {
    /// `Authorization: Token <key>`
    Token,
    /// `Authorization: Bearer <key>`
    Bearer,
}

impl CredentialScheme {
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "token" => Some(CredentialScheme::Token),
            "bearer" => Some(CredentialScheme::Bearer),
            _ => None,
        }
    }

    pub fn header_value(self, api_key: &str) -> String {
        match self {
            CredentialScheme::Token => format!("Token {}", api_key),
            CredentialScheme::Bearer => format!("Bearer {}", api_key),
        }
    }
}

/// Status and JSON body relayed back from the bot API.
#[derive(Debug, Clone, PartialEq)]
pub struct BotResponse {
    pub status: u16,
    pub body: Value,
}

impl BotResponse {
    async fn read(response: Response) -> Result<Self, BotApiError> {
        let status = response.status().as_u16();
        let bytes = response.bytes().await?;
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes)
                .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
        };
        Ok(Self { status, body })
    }
}

pub struct BotClient {
    http: Client,
    api_base: Url,
    api_key: String,
    schemes: Vec<CredentialScheme>,
    bot_name: String,
    webhook_url: Url,
    media_url: Url,
}

impl BotClient {
    pub fn new(settings: &Settings) -> Result<Self, BotApiError> {
        let schemes = settings
            .bot
            .credential_schemes
            .iter()
            .filter_map(|name| {
                let scheme = CredentialScheme::parse(name);
                if scheme.is_none() {
                    warn!("Ignoring unknown credential scheme {:?}", name);
                }
                scheme
            })
            .collect::<Vec<_>>();
        if schemes.is_empty() {
            return Err(BotApiError::NoCredentialSchemes);
        }

        let webhook_url = with_trailing_slash(&settings.bot.public_base_url)?.join("webhook")?;
        let media_url = Url::parse(&settings.bot.public_bridge_url)?.join(&settings.bridge.route)?;

        Ok(Self {
            http: Client::new(),
            api_base: with_trailing_slash(&settings.bot.api_base)?,
            api_key: settings.bot.api_key.clone(),
            schemes,
            bot_name: settings.realtime.agent_name.clone(),
            webhook_url,
            media_url,
        })
    }

    pub fn schemes(&self) -> &[CredentialScheme] {
        &self.schemes
    }

    pub async fn list_bots(&self) -> Result<BotResponse, BotApiError> {
        let response = self.send_with_fallback(Method::GET, "bot/", None).await?;
        BotResponse::read(response).await
    }

    pub async fn create_bot(&self, meeting_url: &str) -> Result<BotResponse, BotApiError> {
        let payload = self.create_payload(meeting_url);
        let response = self
            .send_with_fallback(Method::POST, "bot/", Some(&payload))
            .await?;
        let response = BotResponse::read(response).await?;
        info!("Bot create for {} returned {}", meeting_url, response.status);
        Ok(response)
    }

    /// Asks the bot to leave the call, deleting it instead when the API no longer
    /// knows it as an active bot.
    pub async fn end_bot(&self, bot_id: &str) -> Result<BotResponse, BotApiError> {
        validate_bot_id(bot_id)?;

        let stop = self
            .send_with_fallback(Method::POST, &format!("bot/{}/leave_call/", bot_id), None)
            .await?;
        if stop.status() != StatusCode::NOT_FOUND {
            return BotResponse::read(stop).await;
        }

        info!("Bot {} not found for leave_call, deleting instead", bot_id);
        let delete = self
            .send_with_fallback(Method::DELETE, &format!("bot/{}/", bot_id), None)
            .await?;
        BotResponse::read(delete).await
    }

    pub fn create_payload(&self, meeting_url: &str) -> Value {
        json!({
            "meeting_url": meeting_url,
            "bot_name": self.bot_name,
            "webhook_url": self.webhook_url.as_str(),
            "real_time_media": {
                "websocket_audio_destination_url": self.media_url.as_str(),
            },
        })
    }

    /// Sends the request once per credential scheme, in order, moving on only
    /// when the API answers 401. Fails with `Unauthorized` once every scheme
    /// has been rejected.
    async fn send_with_fallback(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> Result<Response, BotApiError> {
        if self.schemes.is_empty() {
            return Err(BotApiError::NoCredentialSchemes);
        }
        let url = self.api_base.join(path)?;

        for scheme in &self.schemes {
            let mut request = self
                .http
                .request(method.clone(), url.clone())
                .header(AUTHORIZATION, scheme.header_value(&self.api_key));
            if let Some(body) = body {
                request = request.json(body);
            }

            let response = request.send().await?;
            if response.status() != StatusCode::UNAUTHORIZED {
                return Ok(response);
            }
            warn!("{} {} rejected with {:?} credentials", method, url, scheme);
        }

        Err(BotApiError::Unauthorized)
    }
}

fn with_trailing_slash(raw: &str) -> Result<Url, BotApiError> {
    if raw.ends_with('/') {
        Ok(Url::parse(raw)?)
    } else {
        Ok(Url::parse(&format!("{}/", raw))?)
    }
}

fn validate_bot_id(bot_id: &str) -> Result<(), BotApiError> {
    let valid = !bot_id.is_empty()
        && bot_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if valid {
        Ok(())
    } else {
        Err(BotApiError::InvalidUrl(format!("invalid bot id {:?}", bot_id)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> Settings {
        let mut settings = Settings::defaults().unwrap();
        settings.bot.api_base = "https://bots.example.com/api/v1".into();
        settings.bot.public_base_url = "https://voice.example.com".into();
        settings.bot.public_bridge_url = "wss://voice.example.com".into();
        settings.realtime.agent_name = "Juniper".into();
        settings
    }

    #[test]
    fn test_scheme_parsing() {
        assert_eq!(CredentialScheme::parse("Token"), Some(CredentialScheme::Token));
        assert_eq!(CredentialScheme::parse(" bearer "), Some(CredentialScheme::Bearer));
        assert_eq!(CredentialScheme::parse("basic"), None);
        assert_eq!(CredentialScheme::Token.header_value("k"), "Token k");
        assert_eq!(CredentialScheme::Bearer.header_value("k"), "Bearer k");
    }

    #[test]
    fn test_schemes_keep_configured_order() {
        let mut settings = settings();
        settings.bot.credential_schemes = vec!["bearer".into(), "nope".into(), "token".into()];
        let client = BotClient::new(&settings).unwrap();
        assert_eq!(
            client.schemes(),
            &[CredentialScheme::Bearer, CredentialScheme::Token]
        );
    }

    #[test]
    fn test_no_usable_schemes_is_an_error() {
        let mut settings = settings();
        settings.bot.credential_schemes = vec!["basic".into()];
        assert!(matches!(
            BotClient::new(&settings),
            Err(BotApiError::NoCredentialSchemes)
        ));
    }

    #[test]
    fn test_create_payload_targets_bridge_and_webhook() {
        let client = BotClient::new(&settings()).unwrap();
        let payload = client.create_payload("https://meet.example.com/abc-defg-hij");
        assert_eq!(payload["meeting_url"], "https://meet.example.com/abc-defg-hij");
        assert_eq!(payload["bot_name"], "Juniper");
        assert_eq!(payload["webhook_url"], "https://voice.example.com/webhook");
        assert_eq!(
            payload["real_time_media"]["websocket_audio_destination_url"],
            "wss://voice.example.com/bridge"
        );
    }

    #[test]
    fn test_bot_id_validation() {
        assert!(validate_bot_id("3f1c-9a_b").is_ok());
        assert!(validate_bot_id("").is_err());
        assert!(validate_bot_id("../admin").is_err());
        assert!(validate_bot_id("a/b").is_err());
    }
}
