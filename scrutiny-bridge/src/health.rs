use crate::registry::ConnectionSnapshot;
use serde::{Deserialize, Serialize};
use std::time::Instant;

#[derive(Debug, Serialize, Deserialize)]
pub struct BridgeHealth {
    pub uptime_seconds: u64,
    pub connections: u32,
    pub drives_tracked: u32,
    pub refresh_ok: u64,
    pub refresh_failed: u64,
    pub mqtt_status: String,
    pub mqtt_reconnects: u32,
}

#[derive(Clone)]
pub struct HealthTracker {
    start_time: Instant,
    mqtt_reconnects: std::sync::Arc<std::sync::atomic::AtomicU32>,
    mqtt_status: std::sync::Arc<parking_lot::Mutex<String>>,
}

impl HealthTracker {
    pub fn new() -> Self {
        Self {
            start_time: Instant::now(),
            mqtt_reconnects: std::sync::Arc::new(std::sync::atomic::AtomicU32::new(0)),
            mqtt_status: std::sync::Arc::new(parking_lot::Mutex::new("disabled".to_string())),
        }
    }

    pub fn mark_mqtt_connecting(&self) {
        *self.mqtt_status.lock() = "connecting".to_string();
    }

    pub fn mark_mqtt_connected(&self) {
        *self.mqtt_status.lock() = "connected".to_string();
    }

    pub fn increment_reconnects(&self) {
        self.mqtt_reconnects.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
        *self.mqtt_status.lock() = "reconnecting".to_string();
    }

    pub fn get_health(&self, snapshots: &[ConnectionSnapshot]) -> BridgeHealth {
        let uptime = self.start_time.elapsed().as_secs();
        let drives: usize = snapshots.iter().map(|s| s.devices.len()).sum();
        let refresh_ok: u64 = snapshots.iter().map(|s| s.stats.refresh_ok).sum();
        let refresh_failed: u64 = snapshots.iter().map(|s| s.stats.refresh_failed).sum();
        let mqtt_status = self.mqtt_status.lock().clone();
        let reconnects = self.mqtt_reconnects.load(std::sync::atomic::Ordering::Relaxed);

        BridgeHealth {
            uptime_seconds: uptime,
            connections: snapshots.len() as u32,
            drives_tracked: drives as u32,
            refresh_ok,
            refresh_failed,
            mqtt_status,
            mqtt_reconnects: reconnects,
        }
    }
}

impl Default for HealthTracker {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coordinator::RefreshStats;
    use crate::models::DevicesMap;

    fn snapshot(drives: usize, refresh_ok: u64, refresh_failed: u64) -> ConnectionSnapshot {
        let mut devices = DevicesMap::new();
        for i in 0..drives {
            devices.insert(format!("WWN{i}"), Default::default());
        }
        ConnectionSnapshot {
            base_url: "http://scrutiny.lan:8080".to_string(),
            scan_interval_minutes: 15,
            stats: RefreshStats {
                last_refresh_ok: true,
                refresh_ok,
                refresh_failed,
                last_failure: None,
                last_refresh: None,
            },
            devices,
            sensors: Vec::new(),
        }
    }

    #[test]
    fn test_health_aggregates_connections() {
        let tracker = HealthTracker::new();
        let snapshots = vec![snapshot(2, 10, 1), snapshot(3, 5, 0)];

        let health = tracker.get_health(&snapshots);
        assert_eq!(health.connections, 2);
        assert_eq!(health.drives_tracked, 5);
        assert_eq!(health.refresh_ok, 15);
        assert_eq!(health.refresh_failed, 1);
        assert_eq!(health.mqtt_status, "disabled");
    }

    #[test]
    fn test_mqtt_status_transitions() {
        let tracker = HealthTracker::new();
        tracker.mark_mqtt_connecting();
        tracker.mark_mqtt_connected();
        assert_eq!(tracker.get_health(&[]).mqtt_status, "connected");

        tracker.increment_reconnects();
        let health = tracker.get_health(&[]);
        assert_eq!(health.mqtt_status, "reconnecting");
        assert_eq!(health.mqtt_reconnects, 1);
    }
}
