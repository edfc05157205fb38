/**
 * MQTT PUBLISHER - Publication des états capteurs vers le bus domotique
 *
 * RÔLE : Pousser après chaque refresh réussi l'état de chaque disque
 * (retained, un topic par wwn) et l'état de santé du bridge toutes les 30s.
 *
 * FONCTIONNEMENT : Un seul client MQTT par bridge ; les topics sont versionnés
 * (…@v1). Un refresh en échec ne publie rien : les consommateurs conservent
 * le dernier état retained. La connectivité MQTT alimente le health tracker.
 */

use crate::config::MqttConf;
use crate::health::HealthTracker;
use crate::registry::{ConnectionSnapshot, SharedRegistry};
use rumqttc::{AsyncClient, Event, Incoming, MqttOptions, QoS};
use serde_json::json;
use std::collections::HashMap;
use std::time::Duration;
use time::OffsetDateTime;
use tokio::task;
use tracing::{debug, warn};

pub fn spawn_state_publisher(registry: SharedRegistry, conf: MqttConf, health_tracker: HealthTracker) {
    task::spawn(async move {
        let mut opts = MqttOptions::new("scrutiny-bridge", &conf.host, conf.port);
        opts.set_keep_alive(Duration::from_secs(15));

        let (client, mut eventloop) = AsyncClient::new(opts, 10);
        health_tracker.mark_mqtt_connecting();

        let mut health_interval = tokio::time::interval(Duration::from_secs(30));
        let mut state_interval = tokio::time::interval(Duration::from_secs(10));
        // par connexion : horodatage du dernier refresh déjà publié
        let mut published_through: HashMap<String, OffsetDateTime> = HashMap::new();

        loop {
            tokio::select! {
                _ = health_interval.tick() => {
                    let snapshots = registry.snapshots().await;
                    let health = health_tracker.get_health(&snapshots);
                    if let Ok(payload) = serde_json::to_string(&health) {
                        if let Err(e) = client.publish("scrutiny/bridge/health@v1", QoS::AtLeastOnce, false, payload).await {
                            warn!("failed to publish bridge health: {e:?}");
                        }
                    }
                },
                _ = state_interval.tick() => {
                    let snapshots = registry.snapshots().await;
                    publish_drive_states(&client, &snapshots, &mut published_through).await;
                },
                event = eventloop.poll() => {
                    match event {
                        Ok(Event::Incoming(Incoming::ConnAck(_))) => health_tracker.mark_mqtt_connected(),
                        Ok(_) => {},
                        Err(e) => {
                            warn!("MQTT error: {e:?}");
                            health_tracker.increment_reconnects();
                            tokio::time::sleep(Duration::from_secs(2)).await;
                        }
                    }
                }
            }
        }
    });
}

/// Publie l'état des disques des connexions dont le dernier refresh réussi
/// n'a pas encore été poussé. Un refresh en échec est ignoré.
async fn publish_drive_states(
    client: &AsyncClient,
    snapshots: &[ConnectionSnapshot],
    published_through: &mut HashMap<String, OffsetDateTime>,
) {
    for snapshot in snapshots {
        if !snapshot.stats.last_refresh_ok {
            continue;
        }
        let Some(refreshed_at) = snapshot.stats.last_refresh else {
            continue;
        };
        if published_through
            .get(&snapshot.base_url)
            .is_some_and(|published| *published >= refreshed_at)
        {
            continue;
        }

        for sensor in &snapshot.sensors {
            let state = json!({
                "wwn": sensor.wwn(),
                "name": sensor.name(),
                "unique_id": sensor.unique_id(),
                "available": sensor.is_available(&snapshot.devices, snapshot.stats.last_refresh_ok),
                "temperature_celsius": sensor.temperature(&snapshot.devices),
                "attributes": sensor.attributes(&snapshot.devices),
                "device": sensor.info(),
                "source": snapshot.base_url,
            });

            let topic = format!("scrutiny/drive/{}/state@v1", sensor.wwn());
            match serde_json::to_string(&state) {
                Ok(payload) => {
                    // retained : les consommateurs voient le dernier état connu
                    if let Err(e) = client.publish(topic.as_str(), QoS::AtLeastOnce, true, payload).await {
                        warn!("failed to publish {topic}: {e:?}");
                    }
                }
                Err(e) => warn!("failed to serialize drive state for {}: {e}", sensor.wwn()),
            }
        }

        debug!(
            "published {} drive states for {}",
            snapshot.sensors.len(),
            snapshot.base_url
        );
        published_through.insert(snapshot.base_url.clone(), refreshed_at);
    }
}
