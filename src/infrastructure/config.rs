use crate::domain::position::GeoBounds;
use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub telemetry: TelemetrySettings,
    #[serde(default)]
    pub bounds: GeoBounds,
    #[serde(default)]
    pub server: ServerSettings,
}

#[derive(Debug, Deserialize, Clone)]
pub struct TelemetrySettings {
    pub transport: TransportKind,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_broker_addr")]
    pub broker_addr: String,
    pub collar_ids: Vec<String>,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    Poll,
    Stream,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerSettings {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
        }
    }
}

fn default_base_url() -> String {
    "http://localhost:8080/api/v1".to_string()
}

fn default_broker_addr() -> String {
    "localhost:61613".to_string()
}

fn default_bind_addr() -> String {
    "0.0.0.0:9090".to_string()
}

pub fn load_app_config() -> anyhow::Result<AppConfig> {
    let settings = config::Config::builder()
        .add_source(config::File::with_name("config/straywatch"))
        .build()?;

    Ok(settings.try_deserialize()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use config::FileFormat;

    #[test]
    fn test_minimal_config_gets_defaults() {
        let raw = r#"
            [telemetry]
            transport = "poll"
            collar_ids = ["dog-001"]
        "#;
        let cfg: AppConfig = config::Config::builder()
            .add_source(config::File::from_str(raw, FileFormat::Toml))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();

        assert_eq!(cfg.telemetry.transport, TransportKind::Poll);
        assert_eq!(cfg.telemetry.base_url, "http://localhost:8080/api/v1");
        assert_eq!(cfg.server.bind_addr, "0.0.0.0:9090");
        assert_eq!(cfg.bounds.min_lat, 38.2460);
    }

    #[test]
    fn test_stream_transport_and_overrides() {
        let raw = r#"
            [telemetry]
            transport = "stream"
            broker_addr = "broker.internal:61613"
            collar_ids = ["dog-001", "dog-002"]

            [server]
            bind_addr = "127.0.0.1:7000"
        "#;
        let cfg: AppConfig = config::Config::builder()
            .add_source(config::File::from_str(raw, FileFormat::Toml))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();

        assert_eq!(cfg.telemetry.transport, TransportKind::Stream);
        assert_eq!(cfg.telemetry.broker_addr, "broker.internal:61613");
        assert_eq!(cfg.telemetry.collar_ids.len(), 2);
        assert_eq!(cfg.server.bind_addr, "127.0.0.1:7000");
    }
}
