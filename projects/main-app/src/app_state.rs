use std::sync::Arc;

use tokio::sync::{Mutex, watch};
use tracing::{info, warn};

use crate::{
    camera::{
        gate::{AccessOutcome, GateOptions, PermissionGate},
        traits::MediaPlatform,
    },
    config::AppConfig,
};

pub type SharedGate = Mutex<PermissionGate<dyn MediaPlatform>>;

pub struct AppState {
    pub config: AppConfig,
    pub gate: SharedGate,
    outcome_rx: watch::Receiver<Option<AccessOutcome>>,
}

impl AppState {
    /// Builds the gate with an outcome handler that logs and publishes every
    /// completion. The gate is not mounted yet.
    pub fn new(config: AppConfig, platform: Arc<dyn MediaPlatform>) -> Self {
        let (outcome_tx, outcome_rx) = watch::channel(None);
        let app_name = config.app_name.clone();
        let handler = move |outcome: &AccessOutcome| {
            match outcome {
                AccessOutcome::Granted => info!("{app_name}: camera access granted"),
                AccessOutcome::Denied(err) => warn!("{app_name}: camera access denied: {err}"),
            }
            outcome_tx.send_replace(Some(outcome.clone()));
        };

        let options = GateOptions {
            notify_on_denied_query: config.notify_on_denied_query,
        };
        Self {
            config,
            gate: Mutex::new(PermissionGate::new(platform, handler, options)),
            outcome_rx,
        }
    }

    pub async fn mount_gate(&self) {
        let mut gate = self.gate.lock().await;
        gate.mount().await;
    }

    pub fn latest_outcome(&self) -> Option<AccessOutcome> {
        self.outcome_rx.borrow().clone()
    }
}
