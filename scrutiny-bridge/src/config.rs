use serde::{Deserialize, Serialize};
use std::path::Path;
use tokio::fs;
use tracing::error;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct BridgeConfig {
    #[serde(default)]
    pub connections: Vec<ConnectionConf>,
    #[serde(default)]
    pub mqtt: Option<MqttConf>,
    #[serde(default)]
    pub http: HttpConf,
}

/// Une connexion vers une instance Scrutiny. Immuable après création ;
/// l'URL de base normalisée sert de clé d'unicité.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ConnectionConf {
    pub base_url: String,
    #[serde(default = "default_verify_ssl")]
    pub verify_ssl: bool,
    #[serde(default = "default_scan_interval")]
    pub scan_interval_minutes: u64,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct MqttConf {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct HttpConf {
    #[serde(default = "default_http_port")]
    pub port: u16,
}

fn default_verify_ssl() -> bool {
    true
}

fn default_scan_interval() -> u64 {
    15
}

fn default_http_port() -> u16 {
    8080
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            connections: Vec::new(),
            mqtt: None,
            http: HttpConf::default(),
        }
    }
}

impl Default for HttpConf {
    fn default() -> Self {
        Self { port: default_http_port() }
    }
}

impl ConnectionConf {
    /// URL de base sans slash final, utilisée partout (requêtes + dédup)
    pub fn normalized_base_url(&self) -> String {
        self.base_url.trim_end_matches('/').to_string()
    }

    pub fn scan_interval(&self) -> std::time::Duration {
        // tokio::time::interval refuse une période nulle
        std::time::Duration::from_secs(self.scan_interval_minutes.max(1) * 60)
    }
}

pub async fn load_config() -> BridgeConfig {
    let path = std::env::var("SCRUTINY_BRIDGE_CONFIG").unwrap_or_else(|_| "bridge.yaml".into());
    load_config_from(&path).await
}

pub async fn load_config_from(path: &str) -> BridgeConfig {
    if Path::new(path).exists() {
        let txt = fs::read_to_string(path).await.unwrap_or_default();
        if txt.trim().is_empty() {
            return BridgeConfig::default();
        }
        serde_yaml::from_str(&txt).unwrap_or_else(|e| {
            error!("config invalide ({path}): {e}");
            BridgeConfig::default()
        })
    } else {
        error!("pas de {path}, usage config par défaut");
        BridgeConfig::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = BridgeConfig::default();
        assert!(config.connections.is_empty());
        assert!(config.mqtt.is_none());
        assert_eq!(config.http.port, 8080);
    }

    #[test]
    fn test_connection_defaults() {
        let conf: ConnectionConf =
            serde_yaml::from_str("base_url: http://scrutiny.lan:8080").unwrap();
        assert!(conf.verify_ssl);
        assert_eq!(conf.scan_interval_minutes, 15);
        assert_eq!(conf.scan_interval(), std::time::Duration::from_secs(15 * 60));
    }

    #[test]
    fn test_normalized_base_url_strips_trailing_slash() {
        let conf = ConnectionConf {
            base_url: "https://scrutiny.lan:8080/".to_string(),
            verify_ssl: true,
            scan_interval_minutes: 15,
        };
        assert_eq!(conf.normalized_base_url(), "https://scrutiny.lan:8080");

        let no_slash = ConnectionConf { base_url: "https://scrutiny.lan:8080".to_string(), ..conf };
        assert_eq!(no_slash.normalized_base_url(), "https://scrutiny.lan:8080");
    }

    #[tokio::test]
    async fn test_load_config_from_yaml() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "connections:\n  - base_url: http://scrutiny.lan:8080/\n    verify_ssl: false\n    scan_interval_minutes: 5\nmqtt:\n  host: broker.lan\n  port: 1883\nhttp:\n  port: 9090\n"
        )
        .unwrap();

        let config = load_config_from(file.path().to_str().unwrap()).await;
        assert_eq!(config.connections.len(), 1);
        assert!(!config.connections[0].verify_ssl);
        assert_eq!(config.connections[0].scan_interval_minutes, 5);
        assert_eq!(config.mqtt.as_ref().unwrap().host, "broker.lan");
        assert_eq!(config.http.port, 9090);
    }

    #[tokio::test]
    async fn test_load_config_missing_file_falls_back_to_default() {
        let config = load_config_from("/nonexistent/bridge.yaml").await;
        assert!(config.connections.is_empty());
        assert_eq!(config.http.port, 8080);
    }

    #[tokio::test]
    async fn test_load_config_invalid_yaml_falls_back_to_default() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "connections: {{ not a list").unwrap();
        let config = load_config_from(file.path().to_str().unwrap()).await;
        assert!(config.connections.is_empty());
    }
}
