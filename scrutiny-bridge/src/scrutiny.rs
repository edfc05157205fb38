use crate::models::{DeviceDetails, SummaryResponse};
use serde::de::DeserializeOwned;

/// Erreurs possibles lors d'un appel à l'API Scrutiny
#[derive(Debug, thiserror::Error)]
pub enum ScrutinyError {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("HTTP {status} from {url}")]
    Status { url: String, status: reqwest::StatusCode },
    #[error("malformed response from {url}: {source}")]
    Malformed {
        url: String,
        #[source]
        source: reqwest::Error,
    },
}

/// Client HTTP d'une instance Scrutiny. Un client par connexion ;
/// le mode de vérification TLS est fixé à la construction et s'applique
/// identiquement aux deux endpoints.
#[derive(Debug, Clone)]
pub struct ScrutinyClient {
    base_url: String,
    http: reqwest::Client,
}

impl ScrutinyClient {
    pub fn new(base_url: &str, verify_ssl: bool) -> Result<Self, ScrutinyError> {
        let http = reqwest::Client::builder()
            .danger_accept_invalid_certs(!verify_ssl)
            .build()?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// GET /api/summary (listing léger des disques surveillés)
    pub async fn summary(&self) -> Result<SummaryResponse, ScrutinyError> {
        self.get_json(format!("{}/api/summary", self.base_url)).await
    }

    /// GET /api/device/{wwn}/details (fiche santé complète d'un disque)
    pub async fn device_details(&self, wwn: &str) -> Result<DeviceDetails, ScrutinyError> {
        self.get_json(format!("{}/api/device/{}/details", self.base_url, wwn))
            .await
    }

    async fn get_json<T: DeserializeOwned>(&self, url: String) -> Result<T, ScrutinyError> {
        let resp = self.http.get(&url).send().await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(ScrutinyError::Status { url, status });
        }
        resp.json::<T>()
            .await
            .map_err(|source| ScrutinyError::Malformed { url, source })
    }
}
