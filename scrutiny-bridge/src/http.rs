/**
 * API REST BRIDGE - Surface HTTP du scrutiny-bridge
 *
 * RÔLE :
 * Exposer les vues capteurs par disque et l'état du bridge pour les
 * plateformes domotiques, dashboards et outils d'administration.
 *
 * FONCTIONNEMENT :
 * - Serveur Axum, routes : /health, /system/health, /connections, /drives
 * - Sérialisation JSON automatique des réponses, 404 sur disque inconnu
 * - Header x-api-key obligatoire sur toutes les routes sauf /health
 *
 * SÉCURITÉ :
 * - Clé attendue dans SCRUTINY_BRIDGE_API_KEY ; accès refusé si absente
 * - Validation côté middleware avant traitement métier
 */

use crate::health::{BridgeHealth, HealthTracker};
use crate::registry::{ConnectionSnapshot, SharedRegistry};
use crate::sensor::{DriveInfo, DriveSensor};
use axum::extract::{Path, Request, State};
use axum::http::StatusCode;
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;
use serde_json::{Map, Value};
use time::format_description::well_known::Rfc3339;

/// Vue d'un disque pour l'API : identité figée + lectures du dernier cycle
#[derive(Debug, Serialize)]
pub struct DriveView {
    wwn: String,
    name: String,
    unique_id: String,
    available: bool,
    temperature_celsius: Option<f64>,
    attributes: Map<String, Value>,
    device: DriveInfo,
    source: String, // URL de base de la connexion d'origine
}

fn to_view(sensor: &DriveSensor, snapshot: &ConnectionSnapshot) -> DriveView {
    DriveView {
        wwn: sensor.wwn().to_string(),
        name: sensor.name().to_string(),
        unique_id: sensor.unique_id().to_string(),
        available: sensor.is_available(&snapshot.devices, snapshot.stats.last_refresh_ok),
        temperature_celsius: sensor.temperature(&snapshot.devices),
        attributes: sensor.attributes(&snapshot.devices),
        device: sensor.info().clone(),
        source: snapshot.base_url.clone(),
    }
}

#[derive(Debug, Serialize)]
struct ConnectionView {
    base_url: String,
    scan_interval_minutes: u64,
    drives: usize,
    last_refresh_ok: bool,
    refresh_ok: u64,
    refresh_failed: u64,
    last_failure: Option<String>,
    last_refresh: Option<String>, // format RFC3339 pour l'API
}

fn to_connection_view(snapshot: &ConnectionSnapshot) -> ConnectionView {
    ConnectionView {
        base_url: snapshot.base_url.clone(),
        scan_interval_minutes: snapshot.scan_interval_minutes,
        drives: snapshot.devices.len(),
        last_refresh_ok: snapshot.stats.last_refresh_ok,
        refresh_ok: snapshot.stats.refresh_ok,
        refresh_failed: snapshot.stats.refresh_failed,
        last_failure: snapshot.stats.last_failure.clone(),
        last_refresh: snapshot
            .stats
            .last_refresh
            .and_then(|ts| ts.format(&Rfc3339).ok()),
    }
}

async fn require_api_key(req: Request, next: Next) -> Result<Response, StatusCode> {
    let path = req.uri().path();

    // Health check toujours accessible
    if path.starts_with("/health") {
        return Ok(next.run(req).await);
    }

    let expected = std::env::var("SCRUTINY_BRIDGE_API_KEY").unwrap_or_default();
    if expected.is_empty() {
        tracing::error!("SECURITY: SCRUTINY_BRIDGE_API_KEY not set - API access denied");
        return Err(StatusCode::UNAUTHORIZED);
    }

    let ok = req
        .headers()
        .get("x-api-key")
        .and_then(|v| v.to_str().ok())
        .map(|v| v == expected)
        .unwrap_or(false);

    if !ok {
        return Err(StatusCode::UNAUTHORIZED);
    }
    Ok(next.run(req).await)
}

#[derive(Clone)]
pub struct AppState {
    pub registry: SharedRegistry,
    pub health_tracker: HealthTracker,
}

pub fn build_router(app_state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/system/health", get(get_system_health))
        .route("/connections", get(get_connections))
        .route("/drives", get(get_drives))
        .route("/drives/{wwn}", get(get_drive))
        .with_state(app_state)
        .layer(middleware::from_fn(require_api_key))
}

// GET /system/health (état du bridge)
async fn get_system_health(State(app): State<AppState>) -> Json<BridgeHealth> {
    let snapshots = app.registry.snapshots().await;
    Json(app.health_tracker.get_health(&snapshots))
}

// GET /connections (liste des connexions et leur état de polling)
async fn get_connections(State(app): State<AppState>) -> Json<Vec<ConnectionView>> {
    let snapshots = app.registry.snapshots().await;
    Json(snapshots.iter().map(to_connection_view).collect())
}

// GET /drives (liste, toutes connexions confondues)
async fn get_drives(State(app): State<AppState>) -> Json<Vec<DriveView>> {
    let snapshots = app.registry.snapshots().await;
    let views = snapshots
        .iter()
        .flat_map(|snapshot| snapshot.sensors.iter().map(move |s| to_view(s, snapshot)))
        .collect();
    Json(views)
}

// GET /drives/:wwn (détail)
async fn get_drive(
    State(app): State<AppState>,
    Path(wwn): Path<String>,
) -> Result<Json<DriveView>, StatusCode> {
    let snapshots = app.registry.snapshots().await;
    for snapshot in &snapshots {
        if let Some(sensor) = snapshot.sensors.iter().find(|s| s.wwn() == wwn) {
            return Ok(Json(to_view(sensor, snapshot)));
        }
    }
    Err(StatusCode::NOT_FOUND)
}
