/**
 * SCRUTINY BRIDGE - Point d'entrée principal du daemon
 *
 * RÔLE : Orchestration de tous les modules : config, registre de connexions,
 * polling Scrutiny, API REST, publication MQTT, health.
 *
 * ARCHITECTURE : Un coordinateur de polling par connexion Scrutiny (fan-out
 * détails en parallèle, résultat agrégé partagé) + adaptateurs REST/MQTT
 * en lecture seule par-dessus.
 * UTILITÉ : Exposer la santé disque (température, SMART) aux plateformes
 * domotiques sans toucher au service Scrutiny lui-même.
 */

mod config;
mod coordinator;
mod health;
mod http;
mod models;
mod mqtt;
mod registry;
mod scrutiny;
mod sensor;
mod state;

use crate::config::load_config;
use crate::health::HealthTracker;
use crate::http::AppState;
use crate::registry::{ConnectionRegistry, SharedRegistry};

use anyhow::Context;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Charger les variables d'environnement depuis .env (si présent)
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| "scrutiny_bridge=info".into()),
        )
        .init();

    let cfg = load_config().await;
    if cfg.connections.is_empty() {
        warn!("aucune connexion Scrutiny configurée, le bridge démarre à vide");
    }

    let health_tracker = HealthTracker::new();
    let registry: SharedRegistry = Arc::new(ConnectionRegistry::new());

    // Setup des connexions : premier refresh obligatoire avant enregistrement ;
    // une connexion en échec est ignorée, les autres continuent
    for conn in cfg.connections.iter().cloned() {
        let url = conn.normalized_base_url();
        match registry.add_connection(conn).await {
            Ok(()) => {}
            Err(e) => error!("failed to set up connection {url}: {e}"),
        }
    }

    // Publication MQTT optionnelle des états capteurs
    if let Some(mqtt_conf) = cfg.mqtt.clone() {
        mqtt::spawn_state_publisher(registry.clone(), mqtt_conf, health_tracker.clone());
    }

    // fabrique l'état unique pour Axum
    let app_state = AppState {
        registry,
        health_tracker,
    };
    let app = http::build_router(app_state);

    let addr = SocketAddr::from(([0, 0, 0, 0], cfg.http.port));
    info!("listening on http://{addr}");
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    axum::serve(listener, app).await.context("HTTP server exited")?;
    Ok(())
}
