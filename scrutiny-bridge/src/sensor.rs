/**
 * SENSOR VIEWS - Projection lecture seule d'un disque du résultat agrégé
 *
 * RÔLE : Transformer l'entrée d'un disque (fiche Scrutiny) en lecture capteur :
 * température + attributs descriptifs + disponibilité.
 *
 * FONCTIONNEMENT : L'identité de la vue (nom, unique_id, regroupement device)
 * est figée à la construction et ne bouge plus, même si le serveur renvoie
 * ensuite un autre model_name pour le même wwn. Les lectures sont calculées
 * à la demande depuis le dernier résultat agrégé, jamais stockées.
 */

use crate::models::{DeviceDetails, DevicesMap};
use serde::Serialize;
use serde_json::{Map, Value};

/// Regroupement device exposé au host (dashboard, plateforme domotique)
#[derive(Debug, Clone, Serialize)]
pub struct DriveInfo {
    pub manufacturer: String,
    pub model: String,
    pub configuration_url: String,
}

#[derive(Debug, Clone)]
pub struct DriveSensor {
    wwn: String,
    name: String,
    unique_id: String,
    info: DriveInfo,
}

impl DriveSensor {
    /// Capture l'identité une fois pour toutes depuis la fiche courante
    pub fn new(wwn: &str, details: &DeviceDetails, base_url: &str) -> Self {
        let name = details
            .data
            .device
            .model_name
            .clone()
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| format!("Drive {wwn}"));

        Self {
            wwn: wwn.to_string(),
            name: name.clone(),
            unique_id: format!("scrutiny_{wwn}"),
            info: DriveInfo {
                manufacturer: "Scrutiny".to_string(),
                model: name,
                configuration_url: format!("{base_url}/web/device/{wwn}"),
            },
        }
    }

    pub fn wwn(&self) -> &str {
        &self.wwn
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn unique_id(&self) -> &str {
        &self.unique_id
    }

    pub fn info(&self) -> &DriveInfo {
        &self.info
    }

    /// Température (°C) du snapshot SMART le plus récent ; None si le disque
    /// est absent du résultat ou sans snapshot
    pub fn temperature(&self, devices: &DevicesMap) -> Option<f64> {
        devices
            .get(&self.wwn)?
            .data
            .smart_results
            .first()?
            .temp
    }

    /// Attributs descriptifs : champs fixes du device + dernier snapshot,
    /// puis un attribut SMART par entrée du snapshot, nommé via les
    /// métadonnées du serveur. Map vide si le disque est absent.
    pub fn attributes(&self, devices: &DevicesMap) -> Map<String, Value> {
        let mut attributes = Map::new();
        let Some(details) = devices.get(&self.wwn) else {
            return attributes;
        };

        let device = &details.data.device;
        let latest = details.data.smart_results.first();

        attributes.insert("WWN".to_string(), Value::String(self.wwn.clone()));
        attributes.insert("Host ID".to_string(), opt_string(device.host_id.as_deref()));
        attributes.insert(
            "Serial Number".to_string(),
            opt_string(device.serial_number.as_deref()),
        );
        attributes.insert(
            "Device Status".to_string(),
            device.device_status.clone().unwrap_or(Value::Null),
        );
        attributes.insert(
            "Power On Hours".to_string(),
            latest
                .and_then(|s| s.power_on_hours)
                .map(Value::from)
                .unwrap_or(Value::Null),
        );

        if let Some(snapshot) = latest {
            for (attr_id, attr) in &snapshot.attrs {
                let display_name = details
                    .metadata
                    .get(attr_id)
                    .and_then(|meta| meta.display_name.clone())
                    .filter(|n| !n.is_empty())
                    .unwrap_or_else(|| format!("Unknown Attribute {attr_id}"));

                attributes.insert(display_name, attr.status.clone().unwrap_or(Value::Null));
            }
        }

        attributes
    }

    /// Disponible ssi le dernier refresh a réussi ET que le wwn figure
    /// dans le résultat agrégé
    pub fn is_available(&self, devices: &DevicesMap, last_refresh_ok: bool) -> bool {
        last_refresh_ok && devices.contains_key(&self.wwn)
    }
}

fn opt_string(value: Option<&str>) -> Value {
    value.map(|v| Value::String(v.to_string())).unwrap_or(Value::Null)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn details(body: Value) -> DeviceDetails {
        serde_json::from_value(body).unwrap()
    }

    fn full_details() -> DeviceDetails {
        details(json!({
            "data": {
                "device": {
                    "wwn": "WWN1",
                    "host_id": "nas",
                    "serial_number": "ZA123456",
                    "device_status": 0,
                    "model_name": "ST8000DM004"
                },
                "smart_results": [
                    { "temp": 38, "power_on_hours": 12345,
                      "attrs": {
                          "5": { "status": "OK" },
                          "194": { "status": 0 }
                      } },
                    { "temp": 45, "power_on_hours": 12000, "attrs": {} }
                ]
            },
            "metadata": { "194": { "display_name": "Temperature Celsius" } }
        }))
    }

    fn map_with(wwn: &str, body: DeviceDetails) -> DevicesMap {
        DevicesMap::from([(wwn.to_string(), body)])
    }

    #[test]
    fn test_identity_from_model_name() {
        let body = full_details();
        let sensor = DriveSensor::new("WWN1", &body, "http://scrutiny.lan:8080");
        assert_eq!(sensor.name(), "ST8000DM004");
        assert_eq!(sensor.unique_id(), "scrutiny_WWN1");
        assert_eq!(sensor.info().manufacturer, "Scrutiny");
        assert_eq!(
            sensor.info().configuration_url,
            "http://scrutiny.lan:8080/web/device/WWN1"
        );
    }

    #[test]
    fn test_identity_fallback_without_model_name() {
        let body = details(json!({ "data": { "device": { "wwn": "WWN1" } } }));
        let sensor = DriveSensor::new("WWN1", &body, "http://scrutiny.lan:8080");
        assert_eq!(sensor.name(), "Drive WWN1");
        assert_eq!(sensor.info().model, "Drive WWN1");
    }

    #[test]
    fn test_identity_is_fixed_at_creation() {
        let sensor = DriveSensor::new("WWN1", &full_details(), "http://scrutiny.lan:8080");

        // Le serveur renvoie ensuite un autre model_name : l'identité ne bouge pas
        let renamed = details(json!({
            "data": { "device": { "wwn": "WWN1", "model_name": "WD80EFAX" } }
        }));
        let _devices = map_with("WWN1", renamed);
        assert_eq!(sensor.name(), "ST8000DM004");
    }

    #[test]
    fn test_temperature_reads_most_recent_snapshot() {
        let sensor = DriveSensor::new("WWN1", &full_details(), "http://scrutiny.lan:8080");
        let devices = map_with("WWN1", full_details());
        assert_eq!(sensor.temperature(&devices), Some(38.0));
    }

    #[test]
    fn test_temperature_absent_without_snapshots_or_device() {
        let sensor = DriveSensor::new("WWN1", &full_details(), "http://scrutiny.lan:8080");

        let empty_snapshots = details(json!({ "data": { "device": { "wwn": "WWN1" } } }));
        assert_eq!(sensor.temperature(&map_with("WWN1", empty_snapshots)), None);
        assert_eq!(sensor.temperature(&DevicesMap::new()), None);
    }

    #[test]
    fn test_attributes_fixed_fields_and_display_names() {
        let sensor = DriveSensor::new("WWN1", &full_details(), "http://scrutiny.lan:8080");
        let attributes = sensor.attributes(&map_with("WWN1", full_details()));

        assert_eq!(attributes["WWN"], json!("WWN1"));
        assert_eq!(attributes["Host ID"], json!("nas"));
        assert_eq!(attributes["Serial Number"], json!("ZA123456"));
        assert_eq!(attributes["Device Status"], json!(0));
        assert_eq!(attributes["Power On Hours"], json!(12345));
        // display_name configuré → utilisé ; absent → label synthétisé
        assert_eq!(attributes["Temperature Celsius"], json!(0));
        assert_eq!(attributes["Unknown Attribute 5"], json!("OK"));
    }

    #[test]
    fn test_attributes_unknown_fallback_with_empty_metadata_entry() {
        // metadata {"5": {}} + attrs {"5": {"status": "OK"}}
        let body = details(json!({
            "data": {
                "device": { "wwn": "WWN1" },
                "smart_results": [ { "attrs": { "5": { "status": "OK" } } } ]
            },
            "metadata": { "5": {} }
        }));
        let sensor = DriveSensor::new("WWN1", &body, "http://scrutiny.lan:8080");
        let attributes = sensor.attributes(&map_with("WWN1", body));
        assert_eq!(attributes["Unknown Attribute 5"], json!("OK"));
    }

    #[test]
    fn test_view_goes_unavailable_when_drive_disappears() {
        let sensor = DriveSensor::new("WWN1", &full_details(), "http://scrutiny.lan:8080");
        let with_drive = map_with("WWN1", full_details());
        assert!(sensor.is_available(&with_drive, true));

        // Cycle suivant : WWN1 a disparu du résultat agrégé
        let without_drive = DevicesMap::new();
        assert!(!sensor.is_available(&without_drive, true));
        assert!(sensor.attributes(&without_drive).is_empty());
    }

    #[test]
    fn test_unavailable_after_failed_refresh_even_if_present() {
        let sensor = DriveSensor::new("WWN1", &full_details(), "http://scrutiny.lan:8080");
        let devices = map_with("WWN1", full_details());
        assert!(!sensor.is_available(&devices, false));
    }
}
