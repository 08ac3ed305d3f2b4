//! Record set engine
//!
//! The RecordSetEngine is responsible for:
//! - Validating the zone before anything touches the network
//! - Diffing the declared address set against the last applied one
//! - Building, signing and sending an UPDATE for the delta only
//! - Verifying the server state by read-back query
//! - Tracking the resource identity in the StateStore
//!
//! ## Architecture
//!
//! ```text
//!                        ┌────────────────┐
//!   RecordSet ─────────▶ │ RecordSetEngine│
//!                        └────────────────┘
//!                                 │
//!        ┌────────────────────────┼────────────────────────┐
//!        │                        │                        │
//!        ▼                        ▼                        ▼
//! ┌─────────────┐       ┌───────────────────┐     ┌────────────────┐
//! │ StateStore  │       │ TransactionSigner │     │   Transport    │
//! │ (identity)  │       │ (optional TSIG)   │     │ (UPDATE/query) │
//! └─────────────┘       └───────────────────┘     └────────────────┘
//! ```
//!
//! ## Identity lifecycle
//!
//! ```text
//! Absent ──create──▶ Pending ──update+verify──▶ Present
//!   ▲                   │                          │
//!   └───── exchange failure / mismatch / delete ───┘
//! ```

pub mod verify;

use hickory_proto::op::{Message, ResponseCode};
use tracing::{debug, error, info, warn};

use crate::config::UpdateServerConfig;
use crate::diff::{AddressDelta, diff};
use crate::error::{Error, Operation, Result};
use crate::name;
use crate::resource::RecordSet;
use crate::traits::{StateRecord, StateStore, Transport};
use crate::transaction::UpdateTransaction;
use crate::tsig::TransactionSigner;

/// Drives create/read/update/delete of A record sets against one server
///
/// Transport, server address and signing key are fixed at construction and
/// read-only afterwards.
pub struct RecordSetEngine {
    transport: Box<dyn Transport>,
    server: String,
    signer: Option<TransactionSigner>,
    state_store: Box<dyn StateStore>,
}

impl std::fmt::Debug for RecordSetEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordSetEngine")
            .field("transport", &self.transport.transport_name())
            .field("server", &self.server)
            .field("signer", &self.signer)
            .finish_non_exhaustive()
    }
}

impl RecordSetEngine {
    /// Create an engine sending to `server` (`host:port`)
    pub fn new(
        transport: Box<dyn Transport>,
        server: impl Into<String>,
        signer: Option<TransactionSigner>,
        state_store: Box<dyn StateStore>,
    ) -> Self {
        Self {
            transport,
            server: server.into(),
            signer,
            state_store,
        }
    }

    /// Create an engine from the update server configuration
    pub fn from_config(
        transport: Box<dyn Transport>,
        config: &UpdateServerConfig,
        state_store: Box<dyn StateStore>,
    ) -> Result<Self> {
        config.validate()?;

        let signer = match &config.key {
            Some(key) => TransactionSigner::from_config(key)?,
            None => None,
        };
        if let Some(signer) = &signer {
            info!(
                "Signing transactions with TSIG key {} ({})",
                signer.key_name(),
                signer.algorithm()
            );
        }

        Ok(Self::new(transport, config.address(), signer, state_store))
    }

    /// Server address the engine talks to
    pub fn server(&self) -> &str {
        &self.server
    }

    /// Backing state store
    pub fn state_store(&self) -> &dyn StateStore {
        self.state_store.as_ref()
    }

    /// Current identity record for `fqdn`, if any
    pub async fn identity(&self, fqdn: &str) -> Result<Option<StateRecord>> {
        self.state_store.get_record(fqdn).await
    }

    /// Create the record set and return its identity
    ///
    /// Fails with [`Error::InvalidZone`] before any exchange when the zone is
    /// not fully qualified.
    pub async fn create(&self, record_set: &RecordSet) -> Result<String> {
        name::validate_zone(&record_set.zone, Operation::Create)?;

        let fqdn = record_set.fqdn();
        info!("Creating {} with {}", fqdn, record_set.addresses);

        self.state_store
            .set_record(&fqdn, &StateRecord::pending(record_set))
            .await?;

        self.update(record_set).await?;
        Ok(fqdn)
    }

    /// Bring the server in line with the declared address set, then verify
    ///
    /// Only the delta against the last applied address set is sent; an
    /// unchanged set sends nothing and goes straight to verification.
    /// Returns the delta that was applied.
    pub async fn update(&self, record_set: &RecordSet) -> Result<AddressDelta> {
        name::validate_zone(&record_set.zone, Operation::Update)?;

        let fqdn = record_set.fqdn();
        let recorded = self
            .state_store
            .get_record(&fqdn)
            .await?
            .unwrap_or_else(|| StateRecord::pending(record_set));

        let delta = diff(&recorded.addresses, &record_set.addresses);
        if delta.is_empty() {
            debug!("{} unchanged, no update sent", fqdn);
        } else {
            let transaction =
                UpdateTransaction::for_delta(&record_set.zone, &fqdn, record_set.ttl, &delta)?;
            debug!(
                "Updating {}: removing {:?}, adding {:?}",
                fqdn, delta.to_remove, delta.to_add
            );

            if let Err(e) = self.execute(&transaction, Operation::Update).await {
                if matches!(e, Error::Transport { .. } | Error::ServerStatus { .. }) {
                    warn!("Update of {} failed, clearing identity: {}", fqdn, e);
                    if let Err(store_err) = self.state_store.delete_record(&fqdn).await {
                        error!("Failed to clear identity of {}: {}", fqdn, store_err);
                    }
                }
                return Err(e);
            }

            info!(
                "Updated {}: {} removed, {} added",
                fqdn,
                delta.to_remove.len(),
                delta.to_add.len()
            );
        }

        self.state_store
            .set_record(&fqdn, &recorded.applied(record_set.addresses.clone()))
            .await?;

        self.read(record_set).await?;
        Ok(delta)
    }

    /// Verify that the server serves exactly the declared address set
    ///
    /// A mismatch clears the identity and fails with
    /// [`Error::RecordMismatch`]. Query failures are reported without
    /// touching the identity.
    pub async fn read(&self, record_set: &RecordSet) -> Result<()> {
        name::validate_zone(&record_set.zone, Operation::Read)?;

        let fqdn = record_set.fqdn();
        let query = verify::build_query(&fqdn)?;
        let response = self.exchange(query, Operation::Read).await?;
        let found = verify::extract_addresses(&response)?;

        if found != record_set.addresses {
            warn!(
                "{} does not match: expected {}, found {}; clearing identity",
                fqdn, record_set.addresses, found
            );
            self.state_store.delete_record(&fqdn).await?;
            return Err(Error::RecordMismatch {
                fqdn,
                expected: record_set.addresses.to_vec(),
                found: found.to_vec(),
            });
        }

        if let Some(recorded) = self.state_store.get_record(&fqdn).await? {
            self.state_store.set_record(&fqdn, &recorded.verified()).await?;
        }

        debug!("{} verified: {}", fqdn, found);
        Ok(())
    }

    /// Remove the whole A record set
    ///
    /// Not verified afterwards. The identity is kept when the exchange fails.
    pub async fn delete(&self, record_set: &RecordSet) -> Result<()> {
        name::validate_zone(&record_set.zone, Operation::Delete)?;

        let fqdn = record_set.fqdn();
        let transaction = UpdateTransaction::remove_rrset(&record_set.zone, &fqdn);
        self.execute(&transaction, Operation::Delete).await?;

        self.state_store.delete_record(&fqdn).await?;
        info!("Deleted {}", fqdn);
        Ok(())
    }

    async fn execute(&self, transaction: &UpdateTransaction, operation: Operation) -> Result<()> {
        let mut message = transaction.to_message()?;
        if let Some(signer) = &self.signer {
            signer.sign(&mut message, chrono::Utc::now().timestamp())?;
        }
        self.exchange(message, operation).await.map(|_| ())
    }

    async fn exchange(&self, message: Message, operation: Operation) -> Result<Message> {
        debug!(
            "Sending {:?} message {} to {} via {}",
            message.op_code(),
            message.id(),
            self.server,
            self.transport.transport_name()
        );

        let response = self
            .transport
            .exchange(message, &self.server)
            .await
            .map_err(|e| Error::transport(operation, e))?;

        match response.response_code() {
            ResponseCode::NoError => Ok(response),
            code => Err(Error::server_status(operation, code)),
        }
    }
}
