//! Reconciler
//!
//! Drives a [`RecordSetEngine`] from a list of declared record sets.
//!
//! ## Event Flow
//!
//! 1. For each declared record set, look up its identity
//! 2. No identity: create it
//! 3. Identity with a different zone, name or TTL: delete, then create
//! 4. Otherwise: update (a no-op exchange plus verification when unchanged)
//! 5. Identities no longer declared are deleted
//! 6. Every outcome is emitted on a bounded event channel
//!
//! A failing record set is logged and reported; the pass continues with the
//! next one.

use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio_stream::StreamExt;
use tokio_stream::wrappers::IntervalStream;
use tracing::{debug, error, info, warn};

use crate::config::{NsupdateConfig, RecordSetConfig};
use crate::engine::RecordSetEngine;
use crate::error::{Error, Result};
use crate::resource::RecordSet;

/// Events emitted by the Reconciler
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileEvent {
    /// Reconciler started
    Started {
        records_count: usize,
    },

    /// Record set created and verified
    Created {
        fqdn: String,
        addresses: Vec<String>,
    },

    /// Record set updated and verified
    Updated {
        fqdn: String,
        removed: Vec<String>,
        added: Vec<String>,
    },

    /// Record set already matched; verified without sending an update
    Unchanged {
        fqdn: String,
    },

    /// Record set removed from the server
    Deleted {
        fqdn: String,
    },

    /// Read-back found the server out of line; the identity was cleared
    Drifted {
        fqdn: String,
    },

    /// Operation on a record set failed
    Failed {
        fqdn: String,
        error: String,
        /// The declaration itself is invalid; retrying will not help
        invalid_input: bool,
    },

    /// Reconciler stopped
    Stopped {
        reason: String,
    },
}

/// Summary of one reconciliation pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PassSummary {
    pub created: usize,
    pub updated: usize,
    pub unchanged: usize,
    pub deleted: usize,
    pub failed: usize,
}

impl PassSummary {
    /// Whether every record set in the pass succeeded
    pub fn is_clean(&self) -> bool {
        self.failed == 0
    }
}

/// Declarative driver over a [`RecordSetEngine`]
pub struct Reconciler {
    engine: RecordSetEngine,
    records: Vec<RecordSetConfig>,
    interval: Duration,
    event_tx: mpsc::Sender<ReconcileEvent>,
}

impl Reconciler {
    /// Create a reconciler
    ///
    /// # Returns
    ///
    /// A tuple of (reconciler, event_receiver)
    pub fn new(
        engine: RecordSetEngine,
        config: &NsupdateConfig,
    ) -> Result<(Self, mpsc::Receiver<ReconcileEvent>)> {
        config.validate()?;

        let (tx, rx) = mpsc::channel(config.reconciler.event_channel_capacity);

        let reconciler = Self {
            engine,
            records: config.records.clone(),
            interval: Duration::from_secs(config.reconciler.interval_secs),
            event_tx: tx,
        };

        Ok((reconciler, rx))
    }

    /// Underlying engine
    pub fn engine(&self) -> &RecordSetEngine {
        &self.engine
    }

    /// Apply every declared record set and delete undeclared identities
    pub async fn apply_all(&self) -> Result<PassSummary> {
        let mut summary = PassSummary::default();

        for config in &self.records {
            let fqdn = config.fqdn();
            match self.apply_one(config).await {
                Ok(outcome) => {
                    match outcome {
                        ReconcileEvent::Created { .. } => summary.created += 1,
                        ReconcileEvent::Updated { .. } => summary.updated += 1,
                        _ => summary.unchanged += 1,
                    }
                    self.emit_event(outcome);
                }
                Err(e) => {
                    error!("Failed to apply {}: {}", fqdn, e);
                    summary.failed += 1;
                    self.emit_failure(&fqdn, &e);
                }
            }
        }

        let declared: Vec<String> = self.records.iter().map(RecordSetConfig::fqdn).collect();
        for fqdn in self.engine.state_store().list_records().await? {
            if declared.contains(&fqdn) {
                continue;
            }
            debug!("{} is no longer declared", fqdn);
            match self.delete_identity(&fqdn).await {
                Ok(()) => summary.deleted += 1,
                Err(e) => {
                    error!("Failed to delete {}: {}", fqdn, e);
                    summary.failed += 1;
                    self.emit_failure(&fqdn, &e);
                }
            }
        }

        info!(
            "Apply pass complete: {} created, {} updated, {} unchanged, {} deleted, {} failed",
            summary.created, summary.updated, summary.unchanged, summary.deleted, summary.failed
        );
        Ok(summary)
    }

    /// Verify every tracked identity against the server
    ///
    /// Mismatching identities are cleared and recreated by the next apply.
    pub async fn refresh_all(&self) -> Result<PassSummary> {
        let mut summary = PassSummary::default();

        for fqdn in self.engine.state_store().list_records().await? {
            let Some(recorded) = self.engine.identity(&fqdn).await? else {
                continue;
            };
            let record_set = RecordSet::from_state(&recorded);

            match self.engine.read(&record_set).await {
                Ok(()) => summary.unchanged += 1,
                Err(e @ Error::RecordMismatch { .. }) => {
                    warn!("{}", e);
                    summary.failed += 1;
                    self.emit_event(ReconcileEvent::Drifted { fqdn });
                }
                Err(e) => {
                    error!("Failed to read {}: {}", fqdn, e);
                    summary.failed += 1;
                    self.emit_failure(&fqdn, &e);
                }
            }
        }

        Ok(summary)
    }

    /// Delete every tracked identity
    pub async fn destroy_all(&self) -> Result<PassSummary> {
        let mut summary = PassSummary::default();

        for fqdn in self.engine.state_store().list_records().await? {
            match self.delete_identity(&fqdn).await {
                Ok(()) => summary.deleted += 1,
                Err(e) => {
                    error!("Failed to delete {}: {}", fqdn, e);
                    summary.failed += 1;
                    self.emit_failure(&fqdn, &e);
                }
            }
        }

        self.engine.state_store().flush().await?;
        info!(
            "Destroy pass complete: {} deleted, {} failed",
            summary.deleted, summary.failed
        );
        Ok(summary)
    }

    /// Run until Ctrl-C
    pub async fn run(&self) -> Result<()> {
        self.run_internal(None).await
    }

    /// Run until `shutdown_rx` fires (or Ctrl-C when `None`)
    ///
    /// Applies once; with a non-zero interval, re-applies on every tick.
    pub async fn run_with_shutdown(&self, shutdown_rx: Option<oneshot::Receiver<()>>) -> Result<()> {
        self.run_internal(shutdown_rx).await
    }

    async fn run_internal(&self, shutdown_rx: Option<oneshot::Receiver<()>>) -> Result<()> {
        self.emit_event(ReconcileEvent::Started {
            records_count: self.records.len(),
        });

        if self.interval.is_zero() {
            self.apply_all().await?;
            self.stop("Single pass complete").await?;
            return Ok(());
        }

        info!("Reconciling every {:?}", self.interval);
        // The first tick completes immediately and performs the initial apply
        let mut ticks = IntervalStream::new(tokio::time::interval(self.interval));

        let shutdown = async move {
            match shutdown_rx {
                Some(rx) => {
                    let _ = rx.await;
                }
                None => {
                    if let Err(e) = tokio::signal::ctrl_c().await {
                        error!("Failed to listen for shutdown signal: {}", e);
                    }
                }
            }
        };
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                Some(_) = ticks.next() => {
                    if let Err(e) = self.apply_all().await {
                        error!("Apply pass failed: {}", e);
                    }
                }

                _ = &mut shutdown => {
                    info!("Shutdown signal received");
                    break;
                }
            }
        }

        self.stop("Shutdown signal").await
    }

    async fn stop(&self, reason: &str) -> Result<()> {
        self.engine.state_store().flush().await?;
        info!("State flushed, reconciler stopped");
        self.emit_event(ReconcileEvent::Stopped {
            reason: reason.to_string(),
        });
        Ok(())
    }

    async fn apply_one(&self, config: &RecordSetConfig) -> Result<ReconcileEvent> {
        let record_set = RecordSet::from_config(config)?;
        let fqdn = record_set.fqdn();

        if let Some(recorded) = self.engine.identity(&fqdn).await? {
            if !record_set.forces_new(&recorded) {
                let delta = self.engine.update(&record_set).await?;
                return Ok(if delta.is_empty() {
                    ReconcileEvent::Unchanged { fqdn }
                } else {
                    ReconcileEvent::Updated {
                        fqdn,
                        removed: delta.to_remove,
                        added: delta.to_add,
                    }
                });
            }

            info!("{} changed an immutable field, replacing", fqdn);
            self.engine
                .delete(&RecordSet::from_state(&recorded))
                .await?;
        }

        let fqdn = self.engine.create(&record_set).await?;
        Ok(ReconcileEvent::Created {
            fqdn,
            addresses: record_set.addresses.to_vec(),
        })
    }

    async fn delete_identity(&self, fqdn: &str) -> Result<()> {
        let Some(recorded) = self.engine.identity(fqdn).await? else {
            return Ok(());
        };
        self.engine.delete(&RecordSet::from_state(&recorded)).await?;
        self.emit_event(ReconcileEvent::Deleted {
            fqdn: fqdn.to_string(),
        });
        Ok(())
    }

    fn emit_failure(&self, fqdn: &str, error: &Error) {
        self.emit_event(ReconcileEvent::Failed {
            fqdn: fqdn.to_string(),
            error: error.to_string(),
            invalid_input: error.is_input_error(),
        });
    }

    fn emit_event(&self, event: ReconcileEvent) {
        match self.event_tx.try_send(event) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!("Event channel full, dropping event. Consider increasing event_channel_capacity.");
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                debug!("Event receiver dropped, discarding event");
            }
        }
    }
}
