use config::{Config, ConfigBuilder, ConfigError, Environment, File};
use config::builder::DefaultState;
use serde::Deserialize;
use std::env;
use std::time::Duration;

const DEFAULT_PERSONA_PROMPT: &str = "You are a friendly voice assistant taking part in a video meeting. \
Keep your answers short and conversational, and speak only when addressed. Your name is ";

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub workers: u32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct BridgeConfig {
    pub host: String,
    pub port: u16,
    pub route: String,
    pub ping_interval_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct RealtimeConfig {
    pub url: String,
    pub model: String,
    pub api_key: String,
    pub beta_header: String,
    pub voice: String,
    pub persona_prompt: String,
    pub agent_name: String,
}

impl RealtimeConfig {
    /// Instruction text sent in the one-time `session.update` message.
    pub fn instructions(&self) -> String {
        format!("{}{}", self.persona_prompt, self.agent_name)
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct CorsConfig {
    pub allowed_origins: Vec<String>,
}

impl CorsConfig {
    pub fn allows_any_origin(&self) -> bool {
        self.allowed_origins.iter().any(|origin| origin == "*")
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct BotConfig {
    pub api_base: String,
    pub api_key: String,
    /// Authorization schemes tried in order, e.g. `["token", "bearer"]`.
    pub credential_schemes: Vec<String>,
    /// Externally reachable base URL of the HTTP API, used for the webhook target.
    pub public_base_url: String,
    /// Externally reachable `ws://`/`wss://` base of the bridge listener.
    pub public_bridge_url: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    pub environment: String,
    pub server: ServerConfig,
    pub bridge: BridgeConfig,
    pub realtime: RealtimeConfig,
    pub cors: CorsConfig,
    pub bot: BotConfig,
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        Self::builder_with_defaults()?
            // Add in settings from the config file if it exists
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", run_mode)).required(false))
            // E.g., `APP_REALTIME__API_KEY=sk-...` would set `Settings.realtime.api_key`
            .add_source(
                Environment::with_prefix("app")
                    .prefix_separator("_")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("cors.allowed_origins")
                    .with_list_parse_key("bot.credential_schemes")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize::<Self>()?
            .validated()
    }

    /// Built-in defaults only, without config files or environment overrides.
    pub fn defaults() -> Result<Self, ConfigError> {
        Self::builder_with_defaults()?
            .build()?
            .try_deserialize::<Self>()?
            .validated()
    }

    fn validated(self) -> Result<Self, ConfigError> {
        if self.bridge.ping_interval_secs == 0 {
            return Err(ConfigError::Message(
                "bridge.ping_interval_secs must be at least 1".into(),
            ));
        }
        Ok(self)
    }

    fn builder_with_defaults() -> Result<ConfigBuilder<DefaultState>, ConfigError> {
        Config::builder()
            .set_default("environment", "development")?
            .set_default("server.host", "127.0.0.1")?
            .set_default("server.port", 8080)?
            .set_default("server.workers", num_cpus::get() as i64)?
            .set_default("bridge.host", "127.0.0.1")?
            .set_default("bridge.port", 8081)?
            .set_default("bridge.route", "/bridge")?
            .set_default("bridge.ping_interval_secs", 25)?
            .set_default("realtime.url", "wss://api.openai.com/v1/realtime")?
            .set_default("realtime.model", "gpt-4o-realtime-preview-2024-12-17")?
            .set_default("realtime.api_key", "")?
            .set_default("realtime.beta_header", "realtime=v1")?
            .set_default("realtime.voice", "alloy")?
            .set_default("realtime.persona_prompt", DEFAULT_PERSONA_PROMPT)?
            .set_default("realtime.agent_name", "Meeting Assistant")?
            .set_default("cors.allowed_origins", vec!["*"])?
            .set_default("bot.api_base", "https://us-east-1.recall.ai/api/v1/")?
            .set_default("bot.api_key", "")?
            .set_default("bot.credential_schemes", vec!["token", "bearer"])?
            .set_default("bot.public_base_url", "http://localhost:8080")?
            .set_default("bot.public_bridge_url", "ws://localhost:8081")
    }

    pub fn bridge_ping_interval(&self) -> Duration {
        Duration::from_secs(self.bridge.ping_interval_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;

    fn cleanup_env() {
        env::remove_var("APP_BRIDGE__PORT");
        env::remove_var("APP_BRIDGE__ROUTE");
        env::remove_var("APP_REALTIME__VOICE");
        env::remove_var("APP_CORS__ALLOWED_ORIGINS");
    }

    #[test]
    fn test_settings_defaults() {
        let settings = Settings::defaults().expect("Failed to load settings");
        assert_eq!(settings.environment, "development");
        assert_eq!(settings.server.port, 8080);
        assert_eq!(settings.server.workers as usize, num_cpus::get());
        assert_eq!(settings.bridge.route, "/bridge");
        assert_eq!(settings.bridge_ping_interval(), Duration::from_secs(25));
        assert_eq!(settings.realtime.voice, "alloy");
        assert_eq!(settings.bot.credential_schemes, vec!["token", "bearer"]);
        assert!(settings.cors.allows_any_origin());
    }

    #[test]
    fn test_instructions_append_agent_name() {
        let mut settings = Settings::defaults().unwrap();
        settings.realtime.persona_prompt = "You are ".to_string();
        settings.realtime.agent_name = "Ada".to_string();
        assert_eq!(settings.realtime.instructions(), "You are Ada");
    }

    #[test]
    fn test_environment_override() {
        cleanup_env();

        env::set_var("APP_BRIDGE__PORT", "9100");
        env::set_var("APP_BRIDGE__ROUTE", "/media");
        env::set_var("APP_REALTIME__VOICE", "verse");
        env::set_var("APP_CORS__ALLOWED_ORIGINS", "https://a.example,https://b.example");

        let settings = Settings::new().expect("Failed to load settings");

        assert_eq!(settings.bridge.port, 9100);
        assert_eq!(settings.bridge.route, "/media");
        assert_eq!(settings.realtime.voice, "verse");
        assert_eq!(
            settings.cors.allowed_origins,
            vec!["https://a.example".to_string(), "https://b.example".to_string()]
        );
        assert!(!settings.cors.allows_any_origin());

        cleanup_env();
    }

    #[test]
    fn test_zero_ping_interval_rejected() {
        let mut settings = Settings::defaults().unwrap();
        settings.bridge.ping_interval_secs = 0;

        let err = settings.validated().unwrap_err();
        assert!(err.to_string().contains("ping_interval_secs"));
    }
}
