use anyhow::Result;

/// Default outbound topic when `PUBSUB_TOPIC` is unset.
pub const DEFAULT_TOPIC: &str = "raw_events";

/// Application configuration loaded from environment variables.
/// Contains only secrets and deployment-specific values; pacing, batch sizes
/// and the default source set live in the TOML `CollectorSettings`.
#[derive(Debug, Clone, Default)]
pub struct AppConfig {
    // Outbound stream
    pub project_id: Option<String>,
    pub topic: String,
    pub pubsub_access_token: Option<String>,
    pub pubsub_emulator_host: Option<String>,

    // Source credentials
    pub noaa_api_key: Option<String>,
    pub gdelt_api_key: Option<String>,
    pub marinetraffic_api_key: Option<String>,
    pub fred_api_key: Option<String>,
    pub twitter_bearer_token: Option<String>,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let config = Self {
            project_id: non_empty_var("GOOGLE_CLOUD_PROJECT"),
            topic: non_empty_var("PUBSUB_TOPIC").unwrap_or_else(|| DEFAULT_TOPIC.to_string()),
            pubsub_access_token: non_empty_var("PUBSUB_ACCESS_TOKEN"),
            pubsub_emulator_host: non_empty_var("PUBSUB_EMULATOR_HOST"),
            noaa_api_key: non_empty_var("NOAA_API_KEY"),
            gdelt_api_key: non_empty_var("GDELT_API_KEY"),
            marinetraffic_api_key: non_empty_var("MARINETRAFFIC_API_KEY"),
            fred_api_key: non_empty_var("FRED_API_KEY"),
            twitter_bearer_token: non_empty_var("TWITTER_BEARER_TOKEN"),
        };

        config.log_keys();
        Ok(config)
    }

    /// True when enough is set to build a stream publisher.
    pub fn has_stream(&self) -> bool {
        self.project_id.is_some()
            && (self.pubsub_emulator_host.is_some() || self.pubsub_access_token.is_some())
    }

    fn log_keys(&self) {
        tracing::info!("Config loaded:");
        tracing::info!("  GOOGLE_CLOUD_PROJECT: {}", plain_opt(&self.project_id));
        tracing::info!("  PUBSUB_TOPIC: {}", self.topic);
        tracing::info!("  PUBSUB_ACCESS_TOKEN: {}", preview_opt(&self.pubsub_access_token));
        tracing::info!("  PUBSUB_EMULATOR_HOST: {}", plain_opt(&self.pubsub_emulator_host));
        tracing::info!("  NOAA_API_KEY: {}", preview_opt(&self.noaa_api_key));
        tracing::info!("  GDELT_API_KEY: {}", preview_opt(&self.gdelt_api_key));
        tracing::info!("  MARINETRAFFIC_API_KEY: {}", preview_opt(&self.marinetraffic_api_key));
        tracing::info!("  FRED_API_KEY: {}", preview_opt(&self.fred_api_key));
        tracing::info!("  TWITTER_BEARER_TOKEN: {}", preview_opt(&self.twitter_bearer_token));
    }
}

fn non_empty_var(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Redacted preview of a secret: first five characters plus the length.
pub fn preview(val: &str) -> String {
    let head: String = val.chars().take(5).collect();
    format!("{}...({} chars)", head, val.chars().count())
}

fn preview_opt(val: &Option<String>) -> String {
    match val {
        Some(v) if !v.is_empty() => preview(v),
        _ => "<not set>".to_string(),
    }
}

fn plain_opt(val: &Option<String>) -> String {
    val.clone().unwrap_or_else(|| "<not set>".to_string())
}
