use serde::{Deserialize, Serialize};
use std::collections::HashMap;

// Structures basées sur les réponses JSON de l'API Scrutiny.
// Tous les champs sont optionnels : un corps partiel se parse comme "absent",
// jamais comme une erreur.

/// GET /api/summary → { data: { summary: { <wwn>: {...} } } }
/// Seul le jeu de clés de `data.summary` est exploité par le poller.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SummaryResponse {
    #[serde(default)]
    pub data: SummaryData,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SummaryData {
    #[serde(default)]
    pub summary: HashMap<String, serde_json::Value>,
}

/// GET /api/device/{wwn}/details → fiche complète d'un disque :
/// device + historique SMART + métadonnées d'affichage des attributs.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeviceDetails {
    #[serde(default)]
    pub data: DetailsData,
    #[serde(default)]
    pub metadata: HashMap<String, AttributeMeta>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DetailsData {
    #[serde(default)]
    pub device: Device,
    /// Snapshots SMART ordonnés du plus récent au plus ancien
    #[serde(default)]
    pub smart_results: Vec<SmartResult>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Device {
    pub wwn: Option<String>,
    pub host_id: Option<String>,
    pub serial_number: Option<String>,
    pub device_status: Option<serde_json::Value>,
    pub model_name: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SmartResult {
    pub date: Option<String>,
    pub temp: Option<f64>,
    pub power_on_hours: Option<i64>,
    #[serde(default)]
    pub attrs: HashMap<String, SmartAttribute>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SmartAttribute {
    pub status: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AttributeMeta {
    pub display_name: Option<String>,
}

/// Résultat agrégé d'un cycle de polling : wwn → fiche complète.
/// Reconstruit de zéro à chaque tick, remplacé atomiquement.
pub type DevicesMap = HashMap<String, DeviceDetails>;
