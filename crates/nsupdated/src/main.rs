// # nsupdated - RFC 2136 Record Set Daemon
//
// The nsupdated daemon is a thin integration layer:
// 1. Reading configuration from environment variables
// 2. Initializing logging and the runtime
// 3. Wiring transport, state store, engine and reconciler
// 4. Applying (once or periodically) or destroying the declared record sets
//
// All DNS logic lives in nsupdate-core.
//
// ## Configuration
//
// All configuration is done via environment variables:
//
// ### Server
// - `NSUPDATE_SERVER`: Authoritative server host or address (required)
// - `NSUPDATE_PORT`: Server port (default 53)
// - `NSUPDATE_TRANSPORT`: udp or tcp (default udp)
// - `NSUPDATE_TIMEOUT_SECS`: Per-exchange timeout (default 10)
//
// ### TSIG
// - `NSUPDATE_KEY_NAME`: Key name; unset or empty sends unsigned updates
// - `NSUPDATE_KEY_ALGORITHM`: HMAC algorithm (default hmac-sha256)
// - `NSUPDATE_KEY_SECRET`: Base64 secret
//
// ### Records
// - `NSUPDATE_RECORDS`: JSON array of record sets, e.g.
//   `[{"zone":"example.com.","name":"www","addresses":["10.0.0.1"],"ttl":300}]`
//
// ### State Store
// - `NSUPDATE_STATE_STORE_TYPE`: file or memory (default file)
// - `NSUPDATE_STATE_STORE_PATH`: Path to state file (for file store)
//
// ### Run mode
// - `NSUPDATE_ACTION`: apply or destroy (default apply)
// - `NSUPDATE_INTERVAL_SECS`: Re-apply interval; 0 applies once (default 0)
// - `NSUPDATE_LOG_LEVEL`: trace, debug, info, warn, error (default info)
//
// ## Example
//
// ```bash
// export NSUPDATE_SERVER=ns1.example.com
// export NSUPDATE_KEY_NAME=update-key
// export NSUPDATE_KEY_SECRET=MDEyMzQ1Njc4OWFiY2RlZjAxMjM0NTY3ODlhYmNkZWY=
// export NSUPDATE_RECORDS='[{"zone":"example.com.","name":"www","addresses":["10.0.0.1"]}]'
// export NSUPDATE_STATE_STORE_PATH=/var/lib/nsupdate/state.json
//
// nsupdated
// ```

use anyhow::{Context, Result};
use std::env;
use std::process::ExitCode;
use std::str::FromStr;
use tracing::{Level, debug, error, info};
use tracing_subscriber::FmtSubscriber;

use nsupdate_core::config::{
    NsupdateConfig, ReconcilerConfig, RecordSetConfig, SigningKeyConfig, StateStoreConfig,
    TransportProtocol, UpdateServerConfig,
};
use nsupdate_core::{RecordSetEngine, Reconciler};
use nsupdate_transport::DnsTransport;

#[cfg(unix)]
use tokio::signal::unix::{SignalKind, signal};

/// Exit codes for different termination scenarios
///
/// These codes follow systemd conventions:
/// - 0: Clean shutdown
/// - 1: Configuration or startup error
/// - 2: Runtime error (unexpected)
#[derive(Debug, Clone, Copy)]
enum NsupdateExitCode {
    /// Clean shutdown (normal exit)
    CleanShutdown = 0,
    /// Configuration error or startup failure
    ConfigError = 1,
    /// Runtime error (unexpected failure)
    RuntimeError = 2,
}

impl From<NsupdateExitCode> for ExitCode {
    fn from(code: NsupdateExitCode) -> Self {
        ExitCode::from(code as u8)
    }
}

/// What the daemon does with the declared record sets
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Action {
    Apply,
    Destroy,
}

impl FromStr for Action {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "apply" => Ok(Self::Apply),
            "destroy" => Ok(Self::Destroy),
            other => anyhow::bail!(
                "NSUPDATE_ACTION '{}' is not valid. Valid actions: apply, destroy",
                other
            ),
        }
    }
}

/// Application configuration
struct Config {
    server: String,
    port: Option<u16>,
    transport: Option<String>,
    timeout_secs: Option<u64>,
    key_name: Option<String>,
    key_algorithm: Option<String>,
    key_secret: Option<String>,
    records: Vec<RecordSetConfig>,
    state_store_type: String,
    state_store_path: Option<String>,
    interval_secs: u64,
    action: String,
    log_level: String,
}

impl Config {
    /// Load configuration from environment variables
    fn from_env() -> Result<Self> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Load configuration through `lookup` (variable name → value)
    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let records = match lookup("NSUPDATE_RECORDS") {
            Some(json) if !json.trim().is_empty() => serde_json::from_str(&json)
                .context("NSUPDATE_RECORDS must be a JSON array of record sets")?,
            _ => Vec::new(),
        };

        Ok(Self {
            server: lookup("NSUPDATE_SERVER").unwrap_or_default(),
            port: parse_var(&lookup, "NSUPDATE_PORT")?,
            transport: lookup("NSUPDATE_TRANSPORT"),
            timeout_secs: parse_var(&lookup, "NSUPDATE_TIMEOUT_SECS")?,
            key_name: lookup("NSUPDATE_KEY_NAME"),
            key_algorithm: lookup("NSUPDATE_KEY_ALGORITHM"),
            key_secret: lookup("NSUPDATE_KEY_SECRET"),
            records,
            state_store_type: lookup("NSUPDATE_STATE_STORE_TYPE")
                .unwrap_or_else(|| "file".to_string()),
            state_store_path: lookup("NSUPDATE_STATE_STORE_PATH"),
            interval_secs: parse_var(&lookup, "NSUPDATE_INTERVAL_SECS")?.unwrap_or(0),
            action: lookup("NSUPDATE_ACTION").unwrap_or_else(|| "apply".to_string()),
            log_level: lookup("NSUPDATE_LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
        })
    }

    /// Validate the configuration
    fn validate(&self) -> Result<()> {
        if self.server.trim().is_empty() {
            anyhow::bail!(
                "NSUPDATE_SERVER is required. \
                Set it via: export NSUPDATE_SERVER=ns1.example.com"
            );
        }

        let action = self.action()?;
        if action == Action::Apply && self.records.is_empty() {
            anyhow::bail!(
                "NSUPDATE_RECORDS must contain at least one record set when NSUPDATE_ACTION=apply"
            );
        }

        match self.state_store_type.as_str() {
            "file" => {
                if self.state_store_path.as_ref().is_none_or(|p| p.is_empty()) {
                    anyhow::bail!(
                        "NSUPDATE_STATE_STORE_PATH is required when NSUPDATE_STATE_STORE_TYPE=file. \
                        Set it via: export NSUPDATE_STATE_STORE_PATH=/var/lib/nsupdate/state.json"
                    );
                }
            }
            "memory" => {
                if action == Action::Destroy {
                    anyhow::bail!(
                        "NSUPDATE_ACTION=destroy needs a persistent state store. \
                        A memory store has no record sets to destroy."
                    );
                }
            }
            other => anyhow::bail!(
                "NSUPDATE_STATE_STORE_TYPE '{}' is not supported. \
                Supported types: file, memory",
                other
            ),
        }

        if self.key_name.as_ref().is_some_and(|n| !n.trim().is_empty())
            && self.key_secret.as_ref().is_none_or(|s| s.trim().is_empty())
        {
            anyhow::bail!("NSUPDATE_KEY_SECRET is required when NSUPDATE_KEY_NAME is set");
        }

        self.log_level()?;
        self.to_core()?.validate()?;

        Ok(())
    }

    fn action(&self) -> Result<Action> {
        self.action.parse()
    }

    fn log_level(&self) -> Result<Level> {
        match self.log_level.to_lowercase().as_str() {
            "trace" => Ok(Level::TRACE),
            "debug" => Ok(Level::DEBUG),
            "info" => Ok(Level::INFO),
            "warn" => Ok(Level::WARN),
            "error" => Ok(Level::ERROR),
            _ => anyhow::bail!(
                "NSUPDATE_LOG_LEVEL '{}' is not valid. \
                Valid levels: trace, debug, info, warn, error",
                self.log_level
            ),
        }
    }

    /// Assemble the library configuration
    fn to_core(&self) -> Result<NsupdateConfig> {
        let mut server = UpdateServerConfig::new(self.server.trim());
        if let Some(port) = self.port {
            server.port = port;
        }
        if let Some(transport) = &self.transport {
            server.transport = TransportProtocol::from_str(transport)?;
        }
        if let Some(timeout_secs) = self.timeout_secs {
            server.timeout_secs = timeout_secs;
        }
        if let Some(name) = self.key_name.as_ref().filter(|n| !n.trim().is_empty()) {
            server.key = Some(SigningKeyConfig::new(
                name.trim(),
                self.key_algorithm
                    .clone()
                    .unwrap_or_else(|| "hmac-sha256".to_string()),
                self.key_secret.clone().unwrap_or_default(),
            ));
        }

        let state_store = match self.state_store_type.as_str() {
            "memory" => StateStoreConfig::Memory,
            _ => StateStoreConfig::File {
                path: self.state_store_path.clone().unwrap_or_default(),
            },
        };

        Ok(NsupdateConfig {
            server,
            state_store,
            records: self.records.clone(),
            reconciler: ReconcilerConfig {
                interval_secs: self.interval_secs,
                ..ReconcilerConfig::default()
            },
        })
    }
}

/// Parse an optional environment variable
fn parse_var<T>(lookup: &impl Fn(&str) -> Option<String>, name: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(name) {
        Some(value) if !value.trim().is_empty() => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|e| anyhow::anyhow!("{} has invalid value '{}': {}", name, value, e)),
        _ => Ok(None),
    }
}

fn main() -> ExitCode {
    let config = match Config::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration error: {:#}", e);
            return NsupdateExitCode::ConfigError.into();
        }
    };

    if let Err(e) = config.validate() {
        eprintln!("Configuration validation error: {:#}", e);
        return NsupdateExitCode::ConfigError.into();
    }

    let log_level = config.log_level().unwrap_or(Level::INFO);
    let subscriber = FmtSubscriber::builder().with_max_level(log_level).finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
        return NsupdateExitCode::ConfigError.into();
    }

    info!("Starting nsupdated daemon");
    info!("Configuration loaded: {} record set(s)", config.records.len());

    let rt = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to create tokio runtime: {}", e);
            return NsupdateExitCode::RuntimeError.into();
        }
    };

    let result = rt.block_on(async {
        if let Err(e) = run_daemon(config).await {
            error!("Daemon error: {:#}", e);
            NsupdateExitCode::RuntimeError
        } else {
            NsupdateExitCode::CleanShutdown
        }
    });

    result.into()
}

/// Run the daemon
async fn run_daemon(config: Config) -> Result<()> {
    let action = config.action()?;
    let core = config.to_core()?;

    let transport = DnsTransport::from_config(&core.server);
    let state_store = nsupdate_core::state::open(&core.state_store).await?;
    let engine = RecordSetEngine::from_config(Box::new(transport), &core.server, state_store)?;
    info!("Sending updates to {}", engine.server());

    let (reconciler, mut events) = Reconciler::new(engine, &core)?;
    let event_log = tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            debug!("Event: {:?}", event);
        }
    });

    let outcome = match action {
        Action::Destroy => {
            let summary = reconciler.destroy_all().await?;
            if summary.is_clean() {
                Ok(())
            } else {
                Err(anyhow::anyhow!("{} record set(s) could not be deleted", summary.failed))
            }
        }
        Action::Apply if core.reconciler.interval_secs == 0 => {
            let summary = reconciler.apply_all().await?;
            reconciler.engine().state_store().flush().await?;
            if summary.is_clean() {
                Ok(())
            } else {
                Err(anyhow::anyhow!("{} record set(s) failed to apply", summary.failed))
            }
        }
        Action::Apply => {
            let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();
            tokio::spawn(async move {
                match wait_for_shutdown().await {
                    Ok(signal) => info!("Received shutdown signal: {}", signal),
                    Err(e) => error!("Shutdown error: {:#}", e),
                }
                let _ = shutdown_tx.send(());
            });

            reconciler
                .run_with_shutdown(Some(shutdown_rx))
                .await
                .map_err(anyhow::Error::from)
        }
    };

    drop(reconciler);
    let _ = event_log.await;

    outcome?;
    info!("Shutting down daemon");
    Ok(())
}

/// Wait for shutdown signals (SIGTERM, SIGINT)
#[cfg(unix)]
async fn wait_for_shutdown() -> Result<&'static str> {
    let mut sigterm = signal(SignalKind::terminate())
        .map_err(|e| anyhow::anyhow!("Failed to setup SIGTERM handler: {}", e))?;
    let mut sigint = signal(SignalKind::interrupt())
        .map_err(|e| anyhow::anyhow!("Failed to setup SIGINT handler: {}", e))?;

    let signal = tokio::select! {
        _ = sigterm.recv() => "SIGTERM",
        _ = sigint.recv() => "SIGINT",
    };
    Ok(signal)
}

/// Wait for shutdown signals (SIGINT only)
///
/// Fallback implementation for non-Unix platforms.
#[cfg(not(unix))]
async fn wait_for_shutdown() -> Result<&'static str> {
    tokio::signal::ctrl_c()
        .await
        .map_err(|e| anyhow::anyhow!("Failed to wait for CTRL-C: {}", e))?;
    Ok("SIGINT")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    const RECORDS: &str =
        r#"[{"zone":"example.com.","name":"www","addresses":["10.0.0.1"],"ttl":300}]"#;

    fn config(vars: &[(&str, &str)]) -> Result<Config> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn test_minimal_memory_config() {
        let config = config(&[
            ("NSUPDATE_SERVER", "127.0.0.1"),
            ("NSUPDATE_RECORDS", RECORDS),
            ("NSUPDATE_STATE_STORE_TYPE", "memory"),
        ])
        .unwrap();
        config.validate().unwrap();

        let core = config.to_core().unwrap();
        assert_eq!(core.server.address(), "127.0.0.1:53");
        assert!(core.server.key.is_none());
        assert_eq!(core.records[0].ttl, 300);
        assert_eq!(config.action().unwrap(), Action::Apply);
    }

    #[test]
    fn test_key_and_transport_settings() {
        let config = config(&[
            ("NSUPDATE_SERVER", "ns1.example.com"),
            ("NSUPDATE_PORT", "5353"),
            ("NSUPDATE_TRANSPORT", "tcp"),
            ("NSUPDATE_KEY_NAME", "update-key"),
            ("NSUPDATE_KEY_SECRET", "MDEyMzQ1Njc4OWFiY2RlZjAxMjM0NTY3ODlhYmNkZWY="),
            ("NSUPDATE_RECORDS", RECORDS),
            ("NSUPDATE_STATE_STORE_PATH", "/tmp/nsupdate-state.json"),
        ])
        .unwrap();
        config.validate().unwrap();

        let core = config.to_core().unwrap();
        assert_eq!(core.server.address(), "ns1.example.com:5353");
        assert_eq!(core.server.transport, TransportProtocol::Tcp);
        let key = core.server.key.unwrap();
        assert_eq!(key.name, "update-key");
        assert_eq!(key.algorithm, "hmac-sha256");
    }

    #[test]
    fn test_missing_server_rejected() {
        let config = config(&[("NSUPDATE_RECORDS", RECORDS)]).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_file_store_requires_path() {
        let config = config(&[
            ("NSUPDATE_SERVER", "127.0.0.1"),
            ("NSUPDATE_RECORDS", RECORDS),
        ])
        .unwrap();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("NSUPDATE_STATE_STORE_PATH"));
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(config(&[("NSUPDATE_PORT", "port")]).is_err());
        assert!(config(&[("NSUPDATE_RECORDS", "www.example.com")]).is_err());

        let bad_level = config(&[
            ("NSUPDATE_SERVER", "127.0.0.1"),
            ("NSUPDATE_RECORDS", RECORDS),
            ("NSUPDATE_STATE_STORE_TYPE", "memory"),
            ("NSUPDATE_LOG_LEVEL", "loud"),
        ])
        .unwrap();
        assert!(bad_level.validate().is_err());
    }

    #[test]
    fn test_unqualified_zone_rejected() {
        let config = config(&[
            ("NSUPDATE_SERVER", "127.0.0.1"),
            (
                "NSUPDATE_RECORDS",
                r#"[{"zone":"example.com","name":"www","addresses":["10.0.0.1"]}]"#,
            ),
            ("NSUPDATE_STATE_STORE_TYPE", "memory"),
        ])
        .unwrap();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("should be an FQDN"));
    }

    #[test]
    fn test_destroy_needs_persistent_store() {
        let config = config(&[
            ("NSUPDATE_SERVER", "127.0.0.1"),
            ("NSUPDATE_ACTION", "destroy"),
            ("NSUPDATE_STATE_STORE_TYPE", "memory"),
        ])
        .unwrap();
        assert!(config.validate().is_err());
    }
}
