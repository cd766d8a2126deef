//! Gateway configuration, deserialized by `gateway-app` from YAML but
//! defined here since the call state machine is the component that actually
//! reads every field at decision time.
//!
//! Grounded on `original_source/src/app/Config.h`/`.cpp`; field names and
//! defaults match spec.md §6 exactly. The original's gRPC mode variant is
//! gone (Open Question i, resolved against removing it).

use serde::Deserialize;

/// Which media pipeline a call gets: a local echo, or a bridge to a TCP
/// audio-socket backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GatewayMode {
    Echo,
    AudioSocket,
}

impl Default for GatewayMode {
    fn default() -> Self {
        GatewayMode::Echo
    }
}

fn deserialize_mode<'de, D>(deserializer: D) -> Result<GatewayMode, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    Ok(match raw.as_str() {
        "audiosocket" | "tcp" => GatewayMode::AudioSocket,
        _ => GatewayMode::Echo,
    })
}

fn default_bind_ip() -> String {
    "0.0.0.0".to_string()
}
fn default_sip_port() -> u16 {
    5060
}
fn default_rtp_port_start() -> u16 {
    10000
}
fn default_rtp_port_end() -> u16 {
    20000
}
fn default_max_calls() -> usize {
    100
}
fn default_codec_preference() -> Vec<String> {
    vec!["PCMU".to_string(), "PCMA".to_string()]
}
fn default_recording_path() -> String {
    "./recordings".to_string()
}
fn default_log_level() -> String {
    "INFO".to_string()
}

/// The gateway's full configuration, loaded once at startup.
#[derive(Debug, Clone, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_bind_ip")]
    pub bind_ip: String,
    #[serde(default = "default_sip_port")]
    pub sip_port: u16,
    #[serde(default = "default_rtp_port_start")]
    pub rtp_port_start: u16,
    #[serde(default = "default_rtp_port_end")]
    pub rtp_port_end: u16,
    #[serde(default = "default_max_calls")]
    pub max_calls: usize,
    #[serde(default = "default_codec_preference")]
    pub codec_preference: Vec<String>,
    #[serde(default, deserialize_with = "deserialize_mode")]
    pub mode: GatewayMode,
    #[serde(default)]
    pub audiosocket_target: String,
    /// false = split-raw, true = mixed-WAV (spec.md §6). Recording itself is
    /// always on; this only picks the on-disk format.
    #[serde(default)]
    pub recording_mode: bool,
    #[serde(default = "default_recording_path")]
    pub recording_path: String,
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        GatewayConfig {
            bind_ip: default_bind_ip(),
            sip_port: default_sip_port(),
            rtp_port_start: default_rtp_port_start(),
            rtp_port_end: default_rtp_port_end(),
            max_calls: default_max_calls(),
            codec_preference: default_codec_preference(),
            mode: GatewayMode::default(),
            audiosocket_target: String::new(),
            recording_mode: false,
            recording_path: default_recording_path(),
            log_level: default_log_level(),
        }
    }
}

impl GatewayConfig {
    /// `0.0.0.0`/empty binds mean "any"; media endpoints need a concrete
    /// address to put in SDP, so fall back to loopback exactly as the
    /// original does.
    pub fn effective_bind_ip(&self) -> &str {
        if self.bind_ip.is_empty() || self.bind_ip == "0.0.0.0" {
            "127.0.0.1"
        } else {
            &self.bind_ip
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn effective_bind_ip_falls_back_to_loopback() {
        let mut config = GatewayConfig::default();
        config.bind_ip = "0.0.0.0".to_string();
        assert_eq!(config.effective_bind_ip(), "127.0.0.1");
        config.bind_ip = "10.0.0.5".to_string();
        assert_eq!(config.effective_bind_ip(), "10.0.0.5");
    }

    #[test]
    fn defaults_match_spec() {
        let config = GatewayConfig::default();
        assert_eq!(config.sip_port, 5060);
        assert_eq!(config.rtp_port_start, 10000);
        assert_eq!(config.rtp_port_end, 20000);
        assert_eq!(config.max_calls, 100);
        assert_eq!(config.codec_preference, vec!["PCMU", "PCMA"]);
        assert_eq!(config.mode, GatewayMode::Echo);
        assert!(!config.recording_mode);
    }
}
