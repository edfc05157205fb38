/**
 * POLL COORDINATOR - Cœur du bridge : polling + agrégation des données Scrutiny
 *
 * RÔLE : Produire à intervalle fixe un résultat agrégé frais (wwn → fiche disque),
 * ou signaler un échec typé en conservant le dernier résultat valide.
 *
 * FONCTIONNEMENT :
 * - 1 GET summary pour découvrir les wwn, puis 1 GET détails par wwn en parallèle
 * - Fan-out tout-ou-rien : un seul fetch détails en échec fait échouer tout le cycle
 * - Timeout global de 30s couvrant le cycle complet (pas par requête)
 * - Remplacement atomique de la map partagée ; un seul écrivain, lecteurs multiples
 * - Les ticks ne se chevauchent jamais (tick manqué ignoré, pas mis en file)
 */

use crate::models::DevicesMap;
use crate::scrutiny::{ScrutinyClient, ScrutinyError};
use crate::state::{new_state, Shared};
use futures::future::try_join_all;
use std::sync::Arc;
use std::time::Duration;
use time::OffsetDateTime;
use tokio::time::MissedTickBehavior;
use tracing::{debug, warn};

/// Budget de temps d'un cycle de refresh complet (summary + fan-out détails)
pub const REFRESH_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, thiserror::Error)]
pub enum PollError {
    #[error(transparent)]
    Api(#[from] ScrutinyError),
    #[error("refresh timed out after {}s", REFRESH_TIMEOUT.as_secs())]
    Timeout,
}

/// Échec d'un cycle complet, exposé au host avec le détail de l'erreur amont
#[derive(Debug, thiserror::Error)]
#[error("error communicating with Scrutiny at {base_url}: {source}")]
pub struct PollFailure {
    pub base_url: String,
    #[source]
    pub source: PollError,
}

/// État observable du polling d'une connexion
#[derive(Debug, Clone, Default)]
pub struct RefreshStats {
    pub last_refresh_ok: bool,
    pub refresh_ok: u64,
    pub refresh_failed: u64,
    pub last_failure: Option<String>,
    pub last_refresh: Option<OffsetDateTime>,
}

pub struct PollCoordinator {
    client: ScrutinyClient,
    devices: Shared<DevicesMap>,
    stats: Shared<RefreshStats>,
}

pub type SharedCoordinator = Arc<PollCoordinator>;

impl PollCoordinator {
    pub fn new(client: ScrutinyClient) -> Self {
        Self {
            client,
            devices: new_state(DevicesMap::new()),
            stats: new_state(RefreshStats::default()),
        }
    }

    pub fn base_url(&self) -> &str {
        self.client.base_url()
    }

    /// Dernier résultat agrégé connu (copie ; la map partagée reste verrouillée
    /// le temps du clone uniquement)
    pub fn devices(&self) -> DevicesMap {
        self.devices.lock().clone()
    }

    pub fn stats(&self) -> RefreshStats {
        self.stats.lock().clone()
    }

    /// Un cycle complet : summary, fan-out détails, remplacement atomique.
    /// En cas d'échec la map précédente est conservée telle quelle.
    pub async fn refresh(&self) -> Result<DevicesMap, PollFailure> {
        let outcome = match tokio::time::timeout(REFRESH_TIMEOUT, self.fetch_all()).await {
            Ok(result) => result.map_err(PollError::from),
            Err(_) => Err(PollError::Timeout),
        };

        match outcome {
            Ok(fresh) => {
                *self.devices.lock() = fresh.clone();
                let mut stats = self.stats.lock();
                stats.last_refresh_ok = true;
                stats.refresh_ok += 1;
                stats.last_failure = None;
                stats.last_refresh = Some(OffsetDateTime::now_utc());
                Ok(fresh)
            }
            Err(source) => {
                let failure = PollFailure {
                    base_url: self.client.base_url().to_string(),
                    source,
                };
                let mut stats = self.stats.lock();
                stats.last_refresh_ok = false;
                stats.refresh_failed += 1;
                stats.last_failure = Some(failure.to_string());
                Err(failure)
            }
        }
    }

    async fn fetch_all(&self) -> Result<DevicesMap, ScrutinyError> {
        let summary = self.client.summary().await?;
        let wwns: Vec<String> = summary.data.summary.keys().cloned().collect();
        if wwns.is_empty() {
            // État valide : aucun disque configuré côté Scrutiny
            warn!("summary from {} returned no devices", self.client.base_url());
            return Ok(DevicesMap::new());
        }

        // Fan-out concurrent ; la première erreur annule les fetches restants
        let responses = try_join_all(wwns.iter().map(|wwn| self.client.device_details(wwn))).await?;

        let mut devices = DevicesMap::new();
        for details in responses {
            // La clé vient du corps de la réponse, pas du wwn demandé ;
            // un corps sans wwn est écarté silencieusement
            match details.data.device.wwn.clone() {
                Some(wwn) => {
                    devices.insert(wwn, details);
                }
                None => debug!("device details without wwn in body, dropped"),
            }
        }
        Ok(devices)
    }
}

/// Boucle de polling d'une connexion. Le refresh est attendu dans la boucle,
/// donc deux cycles ne tournent jamais en même temps ; un tick arrivé pendant
/// un cycle encore en vol est sauté.
pub fn spawn_poll_loop(coordinator: SharedCoordinator, every: Duration) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        // premier tick immédiat déjà couvert par le refresh initial du setup
        ticker.tick().await;

        loop {
            ticker.tick().await;
            match coordinator.refresh().await {
                Ok(devices) => {
                    debug!("refreshed {} ({} drives)", coordinator.base_url(), devices.len())
                }
                Err(e) => warn!("{e}"),
            }
        }
    })
}
