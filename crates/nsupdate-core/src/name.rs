//! Zone validation and FQDN composition
//!
//! A zone is accepted only when it is already fully qualified, i.e. the
//! canonical FQDN transformation leaves it unchanged.

use crate::error::{Error, Operation, Result};

/// Check whether `name` ends with an unescaped root separator
///
/// `"example.com."` is fully qualified, `"example.com\\."` is not (the final
/// dot is part of the last label).
pub fn is_fqdn(name: &str) -> bool {
    let Some(body) = name.strip_suffix('.') else {
        return false;
    };
    let escapes = body.bytes().rev().take_while(|b| *b == b'\\').count();
    escapes % 2 == 0
}

/// Canonical FQDN transformation: append the root separator when missing
pub fn fqdn(name: &str) -> String {
    if is_fqdn(name) {
        name.to_string()
    } else {
        format!("{name}.")
    }
}

/// Validate that `zone` is fully qualified
///
/// Must run at the start of every create/read/update/delete path, before any
/// FQDN is composed.
pub fn validate_zone(zone: &str, operation: Operation) -> Result<()> {
    if zone != fqdn(zone) {
        return Err(Error::invalid_zone(operation, zone));
    }
    Ok(())
}

/// Join a relative record name and an absolute zone
pub fn compose_fqdn(name: &str, zone: &str) -> String {
    format!("{name}.{zone}")
}
