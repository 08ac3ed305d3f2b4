//! Transaction authenticator (TSIG, RFC 8945)
//!
//! Signing runs after every operation has been added to the message and
//! right before transmission, since the MAC covers the final message.

use std::fmt;

use base64::{Engine, engine::general_purpose::STANDARD as BASE64};
use hickory_proto::op::Message;
use hickory_proto::rr::Name;
use hickory_proto::rr::dnssec::rdata::tsig::TsigAlgorithm;
use hickory_proto::rr::dnssec::tsig::TSigner;

use crate::config::SigningKeyConfig;
use crate::error::{Error, Result};
use crate::name;

/// Validity window around the signing time, in seconds
pub const TSIG_FUDGE_SECS: u16 = 300;

/// Parse a TSIG algorithm name
///
/// Accepts the usual spellings case-insensitively, with or without the
/// trailing dot (`hmac-sha256`, `HMAC-SHA256.`, `hmac-md5.sig-alg.reg.int.`).
pub fn parse_algorithm(name: &str) -> Result<TsigAlgorithm> {
    let normalized = name.trim().trim_end_matches('.').to_ascii_lowercase();
    let algorithm = match normalized.as_str() {
        "hmac-md5" | "hmac-md5.sig-alg.reg.int" => TsigAlgorithm::HmacMd5,
        "hmac-sha1" => TsigAlgorithm::HmacSha1,
        "hmac-sha224" => TsigAlgorithm::HmacSha224,
        "hmac-sha256" => TsigAlgorithm::HmacSha256,
        "hmac-sha384" => TsigAlgorithm::HmacSha384,
        "hmac-sha512" => TsigAlgorithm::HmacSha512,
        _ => {
            return Err(Error::config(format!(
                "Unsupported TSIG algorithm {name:?}. \
                Supported: hmac-sha1, hmac-sha224, hmac-sha256, hmac-sha384, hmac-sha512"
            )));
        }
    };
    Ok(algorithm)
}

/// Signs update transactions with a shared secret
///
/// The `Debug` output never includes the secret.
pub struct TransactionSigner {
    key_name: String,
    algorithm: String,
    signer: TSigner,
}

impl fmt::Debug for TransactionSigner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransactionSigner")
            .field("key_name", &self.key_name)
            .field("algorithm", &self.algorithm)
            .field("secret", &"<REDACTED>")
            .finish()
    }
}

impl TransactionSigner {
    /// Build a signer from a key name, algorithm name and base64 secret
    ///
    /// The key name is qualified with a trailing dot when missing.
    pub fn new(key_name: &str, algorithm: &str, secret_base64: &str) -> Result<Self> {
        let key_name = name::fqdn(key_name.trim());
        let tsig_algorithm = parse_algorithm(algorithm)?;

        let secret = BASE64
            .decode(secret_base64.trim())
            .map_err(|e| Error::config(format!("TSIG secret is not valid base64: {e}")))?;
        if secret.is_empty() {
            return Err(Error::config("TSIG secret cannot be empty"));
        }

        let signer_name = Name::from_ascii(&key_name)
            .map_err(|e| Error::config(format!("Invalid TSIG key name {key_name:?}: {e}")))?;

        let signer = TSigner::new(secret, tsig_algorithm, signer_name, TSIG_FUDGE_SECS)
            .map_err(|e| Error::config(format!("Cannot use TSIG algorithm {algorithm:?}: {e}")))?;

        Ok(Self {
            key_name,
            algorithm: algorithm.trim().to_string(),
            signer,
        })
    }

    /// Build a signer from configuration
    ///
    /// Returns `Ok(None)` when the key name is empty: transactions are then
    /// sent unsigned.
    pub fn from_config(config: &SigningKeyConfig) -> Result<Option<Self>> {
        if config.name.trim().is_empty() {
            return Ok(None);
        }
        Self::new(&config.name, &config.algorithm, &config.secret).map(Some)
    }

    pub fn key_name(&self) -> &str {
        &self.key_name
    }

    pub fn algorithm(&self) -> &str {
        &self.algorithm
    }

    /// Attach a TSIG record to `message`, signed at `signed_at` (Unix seconds)
    pub fn sign(&self, message: &mut Message, signed_at: i64) -> Result<()> {
        let inception = u32::try_from(signed_at)
            .map_err(|_| Error::signing(format!("signing time {signed_at} out of range")))?;
        message
            .finalize(&self.signer, inception)
            .map_err(|e| Error::signing(e.to_string()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transaction::UpdateTransaction;
    use hickory_proto::rr::RecordType;

    // base64("0123456789abcdef0123456789abcdef")
    const SECRET: &str = "MDEyMzQ1Njc4OWFiY2RlZjAxMjM0NTY3ODlhYmNkZWY=";

    #[test]
    fn test_algorithm_spellings() {
        assert_eq!(parse_algorithm("hmac-sha256.").unwrap(), TsigAlgorithm::HmacSha256);
        assert_eq!(parse_algorithm("HMAC-SHA512").unwrap(), TsigAlgorithm::HmacSha512);
        assert_eq!(
            parse_algorithm("hmac-md5.sig-alg.reg.int.").unwrap(),
            TsigAlgorithm::HmacMd5
        );
        assert!(matches!(parse_algorithm("rsa"), Err(Error::Config(_))));
    }

    #[test]
    fn test_key_name_is_qualified() {
        let signer = TransactionSigner::new("update-key", "hmac-sha256", SECRET).unwrap();
        assert_eq!(signer.key_name(), "update-key.");
    }

    #[test]
    fn test_bad_secret_rejected() {
        let err = TransactionSigner::new("key.", "hmac-sha256", "not base64!").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_empty_key_name_means_unsigned() {
        let config = SigningKeyConfig {
            name: String::new(),
            algorithm: "hmac-sha256".to_string(),
            secret: String::new(),
        };
        assert!(TransactionSigner::from_config(&config).unwrap().is_none());
    }

    #[test]
    fn test_sign_appends_tsig_record() {
        let signer = TransactionSigner::new("key.", "hmac-sha256", SECRET).unwrap();
        let mut message = UpdateTransaction::remove_rrset("example.com.", "www.example.com.")
            .to_message()
            .unwrap();
        assert!(message.signature().is_empty());

        signer.sign(&mut message, 1_700_000_000).unwrap();

        assert_eq!(message.signature().len(), 1);
        assert_eq!(message.signature()[0].record_type(), RecordType::TSIG);
    }

    #[test]
    fn test_negative_time_rejected() {
        let signer = TransactionSigner::new("key.", "hmac-sha256", SECRET).unwrap();
        let mut message = UpdateTransaction::remove_rrset("example.com.", "www.example.com.")
            .to_message()
            .unwrap();
        assert!(matches!(signer.sign(&mut message, -1), Err(Error::Signing(_))));
    }

    #[test]
    fn test_debug_redacts_secret() {
        let signer = TransactionSigner::new("key.", "hmac-sha256", SECRET).unwrap();
        let debug = format!("{signer:?}");
        assert!(debug.contains("<REDACTED>"));
        assert!(!debug.contains(SECRET));
    }
}
