use serde::Deserialize;

/// Client configuration: defaults, overlaid by an optional `voicelink.toml`
/// and `VOICELINK_*` environment variables.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct Config {
    pub service: ServiceConfig,
    pub session: SessionConfig,
    pub audio: AudioConfig,
}

/// Request/response API endpoint.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServiceConfig {
    pub base_url: String,
    pub api_key: String,
    /// Chat/generation model name sent with each request.
    pub model: String,
}

/// Live voice session endpoint.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct SessionConfig {
    pub ws_url: String,
    pub api_key: String,
    /// Handshake deadline in seconds; expiry ends the attempt with an error.
    pub connect_timeout_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct AudioConfig {
    /// ALSA capture device name (e.g. "default", "plughw:0,0")
    pub capture_device: String,
    /// ALSA playback device name
    pub playback_device: String,
    /// Capture rate; outbound chunks are labeled with this rate.
    pub capture_sample_rate: u32,
    /// Samples per capture window. Smaller windows lower latency but raise
    /// per-chunk transport overhead.
    pub capture_window: usize,
    /// Outbound windows buffered toward the session before capture starts
    /// dropping.
    pub outbound_queue: usize,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.example-ai.dev/v1".to_string(),
            api_key: String::new(),
            model: "aria-2-flash".to_string(),
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            ws_url: "wss://api.example-ai.dev/v1/live".to_string(),
            api_key: String::new(),
            connect_timeout_secs: 10,
        }
    }
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            capture_device: "default".to_string(),
            playback_device: "default".to_string(),
            capture_sample_rate: crate::protocol::INPUT_SAMPLE_RATE,
            capture_window: 4096,
            outbound_queue: 32,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            service: ServiceConfig::default(),
            session: SessionConfig::default(),
            audio: AudioConfig::default(),
        }
    }
}

impl Config {
    /// Load from `voicelink.toml` (if present) and `VOICELINK_*` environment
    /// variables on top of the defaults.
    pub fn load(path: &str) -> anyhow::Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(path).required(false))
            .add_source(config::Environment::with_prefix("VOICELINK").separator("__"))
            .build()?;

        Ok(settings.try_deserialize()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_wire_contract() {
        let config = Config::default();
        assert_eq!(config.audio.capture_sample_rate, 16000);
        assert_eq!(config.audio.capture_window, 4096);
        assert_eq!(config.session.connect_timeout_secs, 10);
    }
}
