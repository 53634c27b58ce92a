//! Asynchronous activation of saved netplan documents
//!
//! `schedule_apply` hands a request to a small actor task and returns at
//! once. The actor starts every activation as its own detached task: two
//! changes submitted back to back may activate concurrently, and a failed
//! activation is not retried. Outcomes are published on a broadcast channel
//! for anyone interested; the request that triggered them never sees them.

use crate::command;
use crate::config::ActivationSettings;
use crate::error::{NetplanError, NetplanResult};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};
use tokio::time::sleep;
use tracing::{error, info, warn};

/// Makes the saved documents take effect
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Activator: Send + Sync {
    async fn activate(&self) -> NetplanResult<()>;
}

/// `sync`, settle, then `netplan apply` (or the configured command)
pub struct NetplanApply {
    settle_delay: Duration,
    command: Vec<String>,
}

impl NetplanApply {
    pub fn new(settings: &ActivationSettings) -> Self {
        Self {
            settle_delay: settings.settle_delay(),
            command: settings.apply_command.clone(),
        }
    }
}

#[async_trait]
impl Activator for NetplanApply {
    async fn activate(&self) -> NetplanResult<()> {
        command::run("sync", &[]).await?;
        sleep(self.settle_delay).await;

        let (program, args) = self
            .command
            .split_first()
            .ok_or_else(|| NetplanError::ConfigError("empty apply command".to_string()))?;
        let args: Vec<&str> = args.iter().map(String::as_str).collect();

        command::run(program, &args)
            .await
            .map_err(|e| NetplanError::ActivationFailed(e.to_string()))?;
        Ok(())
    }
}

/// Result of one activation
#[derive(Debug, Clone, Serialize)]
pub struct ActivationOutcome {
    pub id: u64,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub finished_at: DateTime<Utc>,
}

/// Handle for scheduling activations
pub struct ActivationTrigger {
    requests: mpsc::UnboundedSender<u64>,
    outcomes: broadcast::Sender<ActivationOutcome>,
    next_id: AtomicU64,
}

impl ActivationTrigger {
    /// Start the activation actor. Must be called inside a tokio runtime.
    pub fn spawn(activator: Arc<dyn Activator>) -> Self {
        let (requests, rx) = mpsc::unbounded_channel();
        let (outcomes, _) = broadcast::channel(32);

        tokio::spawn(Self::run(activator, rx, outcomes.clone()));

        Self {
            requests,
            outcomes,
            next_id: AtomicU64::new(1),
        }
    }

    /// Queue one best-effort activation and return its id without waiting.
    pub fn schedule_apply(&self) -> u64 {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        if self.requests.send(id).is_err() {
            warn!("Activation actor is gone, activation {} dropped", id);
        } else {
            info!("Activation {} scheduled", id);
        }
        id
    }

    /// Subscribe to activation outcomes
    pub fn subscribe(&self) -> broadcast::Receiver<ActivationOutcome> {
        self.outcomes.subscribe()
    }

    async fn run(
        activator: Arc<dyn Activator>,
        mut requests: mpsc::UnboundedReceiver<u64>,
        outcomes: broadcast::Sender<ActivationOutcome>,
    ) {
        while let Some(id) = requests.recv().await {
            let activator = activator.clone();
            let outcomes = outcomes.clone();

            tokio::spawn(async move {
                let result = activator.activate().await;
                match &result {
                    Ok(()) => info!("Activation {} applied", id),
                    Err(e) => error!("Activation {} failed: {}", id, e),
                }

                // No subscribers is fine
                let _ = outcomes.send(ActivationOutcome {
                    id,
                    success: result.is_ok(),
                    error: result.err().map(|e| e.to_string()),
                    finished_at: Utc::now(),
                });
            });
        }
    }
}
