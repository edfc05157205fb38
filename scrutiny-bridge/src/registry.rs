/**
 * CONNECTION REGISTRY - Cycle de vie des connexions Scrutiny du bridge
 *
 * RÔLE : Mapping explicite URL de base normalisée → connexion en cours
 * (coordinateur + boucle de polling). Pas d'état global ambiant : le registre
 * appartient au process du bridge.
 *
 * FONCTIONNEMENT :
 * - add : refus des doublons (clé = URL normalisée), premier refresh obligatoire
 *   avant enregistrement (la connexion n'est "prête" qu'avec un résultat)
 * - remove : abort de la boucle de polling, cycle en vol abandonné
 * - set_interval : changement d'options = destruction + re-création complète
 *   du poller avec le nouvel intervalle
 */

use crate::config::ConnectionConf;
use crate::coordinator::{spawn_poll_loop, PollCoordinator, PollFailure, RefreshStats, SharedCoordinator};
use crate::models::DevicesMap;
use crate::scrutiny::{ScrutinyClient, ScrutinyError};
use crate::sensor::DriveSensor;
use crate::state::{new_state, Shared};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::info;

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("connection already configured: {0}")]
    AlreadyConfigured(String),
    #[error("connection not found: {0}")]
    NotFound(String),
    #[error("failed to build Scrutiny client: {0}")]
    Client(#[from] ScrutinyError),
    #[error("initial refresh failed: {0}")]
    FirstRefresh(#[from] PollFailure),
}

/// Une connexion enregistrée : sa conf, son coordinateur et sa boucle de polling.
/// Les vues capteurs sont créées à la première apparition d'un wwn et
/// conservées ensuite (identité figée, vue "unavailable" si le disque disparaît).
pub struct Connection {
    conf: ConnectionConf,
    coordinator: SharedCoordinator,
    sensors: Shared<HashMap<String, DriveSensor>>,
    poll_task: tokio::task::JoinHandle<()>,
}

impl Connection {
    fn new(conf: ConnectionConf, coordinator: SharedCoordinator, first: &DevicesMap) -> Self {
        let base_url = conf.normalized_base_url();
        let sensors: HashMap<String, DriveSensor> = first
            .iter()
            .map(|(wwn, details)| (wwn.clone(), DriveSensor::new(wwn, details, &base_url)))
            .collect();

        let poll_task = spawn_poll_loop(coordinator.clone(), conf.scan_interval());

        Self {
            conf,
            coordinator,
            sensors: new_state(sensors),
            poll_task,
        }
    }

    /// Instantané cohérent de la connexion pour les adaptateurs (REST, MQTT).
    /// Les disques apparus depuis le dernier instantané reçoivent leur vue ici.
    fn snapshot(&self) -> ConnectionSnapshot {
        let devices = self.coordinator.devices();
        let stats = self.coordinator.stats();
        let base_url = self.conf.normalized_base_url();

        let mut sensors = self.sensors.lock();
        for (wwn, details) in &devices {
            sensors
                .entry(wwn.clone())
                .or_insert_with(|| DriveSensor::new(wwn, details, &base_url));
        }

        ConnectionSnapshot {
            base_url,
            scan_interval_minutes: self.conf.scan_interval_minutes,
            stats,
            devices,
            sensors: sensors.values().cloned().collect(),
        }
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        // teardown : le cycle en vol est abandonné, rien n'est persisté
        self.poll_task.abort();
    }
}

#[derive(Debug, Clone)]
pub struct ConnectionSnapshot {
    pub base_url: String,
    pub scan_interval_minutes: u64,
    pub stats: RefreshStats,
    pub devices: DevicesMap,
    pub sensors: Vec<DriveSensor>,
}

pub struct ConnectionRegistry {
    connections: RwLock<HashMap<String, Connection>>,
}

pub type SharedRegistry = Arc<ConnectionRegistry>;

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self {
            connections: RwLock::new(HashMap::new()),
        }
    }

    /// Enregistre une connexion : client, premier refresh (bloquant pour la
    /// readiness), puis boucle de polling. Doublon d'URL de base → refus.
    pub async fn add_connection(&self, conf: ConnectionConf) -> Result<(), RegistryError> {
        let key = conf.normalized_base_url();

        {
            let connections = self.connections.read().await;
            if connections.contains_key(&key) {
                return Err(RegistryError::AlreadyConfigured(key));
            }
        }

        let client = ScrutinyClient::new(&key, conf.verify_ssl)?;
        let coordinator: SharedCoordinator = Arc::new(PollCoordinator::new(client));
        let first = coordinator.refresh().await?;

        let connection = Connection::new(conf, coordinator, &first);

        let mut connections = self.connections.write().await;
        // re-vérification : un add concurrent a pu s'intercaler pendant le refresh
        if connections.contains_key(&key) {
            return Err(RegistryError::AlreadyConfigured(key));
        }
        info!("registered connection {} ({} drives)", key, first.len());
        connections.insert(key, connection);
        Ok(())
    }

    /// Détruit une connexion ; sa boucle de polling est stoppée immédiatement
    pub async fn remove_connection(&self, base_url: &str) -> Result<(), RegistryError> {
        let key = base_url.trim_end_matches('/');
        let mut connections = self.connections.write().await;
        match connections.remove(key) {
            Some(_) => {
                info!("removed connection {key}");
                Ok(())
            }
            None => Err(RegistryError::NotFound(key.to_string())),
        }
    }

    /// Changement d'options : le poller est entièrement re-créé avec le
    /// nouvel intervalle (nouveau coordinateur, nouveau premier refresh)
    pub async fn set_interval(&self, base_url: &str, minutes: u64) -> Result<(), RegistryError> {
        let key = base_url.trim_end_matches('/');

        let mut conf = {
            let mut connections = self.connections.write().await;
            match connections.remove(key) {
                Some(connection) => connection.conf.clone(),
                None => return Err(RegistryError::NotFound(key.to_string())),
            }
        };

        conf.scan_interval_minutes = minutes;
        info!("recreating poller for {key} (interval: {minutes}min)");
        self.add_connection(conf).await
    }

    pub async fn snapshots(&self) -> Vec<ConnectionSnapshot> {
        let connections = self.connections.read().await;
        connections.values().map(Connection::snapshot).collect()
    }

    pub async fn connection_count(&self) -> usize {
        self.connections.read().await.len()
    }
}

impl Default for ConnectionRegistry {
    fn default() -> Self {
        Self::new()
    }
}
