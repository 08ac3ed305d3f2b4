//! Address normalization and the normalized address set
//!
//! Addresses are compared by their canonical text form, so `192.168.001.001`
//! and `192.168.1.1` are the same member of an [`AddressSet`].

use std::collections::BTreeSet;
use std::fmt;
use std::net::{IpAddr, Ipv4Addr};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Parse `text` as an IP address and return its canonical text form
///
/// Dotted-quad octets may carry leading zeros. IPv6 is rendered in its
/// compressed lowercase form; IPv4-mapped IPv6 addresses render as IPv4.
pub fn normalize_address(text: &str) -> Result<String> {
    parse_address(text)
        .map(|ip| ip.to_string())
        .ok_or_else(|| Error::invalid_address(text))
}

fn parse_address(text: &str) -> Option<IpAddr> {
    if let Some(v4) = parse_dotted_quad(text) {
        return Some(IpAddr::V4(v4));
    }
    match text.parse::<IpAddr>().ok()? {
        IpAddr::V6(v6) => Some(match v6.to_ipv4_mapped() {
            Some(v4) => IpAddr::V4(v4),
            None => IpAddr::V6(v6),
        }),
        v4 => Some(v4),
    }
}

// std rejects leading zeros in octets; they are decimal here.
fn parse_dotted_quad(text: &str) -> Option<Ipv4Addr> {
    let mut octets = [0u8; 4];
    let mut parts = text.split('.');
    for octet in octets.iter_mut() {
        let part = parts.next()?;
        if part.is_empty() || part.len() > 3 || !part.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        *octet = part.parse().ok()?;
    }
    if parts.next().is_some() {
        return None;
    }
    Some(Ipv4Addr::from(octets))
}

/// An unordered set of normalized IP address strings
///
/// Members are normalized on insertion, so equality is independent of how
/// the addresses were written. Iteration order is sorted and deterministic.
/// Deserialization goes through the same normalization.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<String>", into = "Vec<String>")]
pub struct AddressSet(BTreeSet<String>);

impl AddressSet {
    /// Create an empty set
    pub fn new() -> Self {
        Self::default()
    }

    /// Normalize every address and collect the results
    ///
    /// Fails on the first address that does not parse.
    pub fn parse<I, S>(addresses: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut set = Self::new();
        for address in addresses {
            set.insert(address.as_ref())?;
        }
        Ok(set)
    }

    /// Normalize and insert an address, returning whether it was new
    pub fn insert(&mut self, address: &str) -> Result<bool> {
        Ok(self.0.insert(normalize_address(address)?))
    }

    /// Whether the (normalized) address is a member
    pub fn contains(&self, address: &str) -> bool {
        match normalize_address(address) {
            Ok(normalized) => self.0.contains(&normalized),
            Err(_) => false,
        }
    }

    /// Members in sorted order
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    /// Members of `self` that are not in `other`, sorted
    pub fn difference(&self, other: &AddressSet) -> Vec<String> {
        self.0.difference(&other.0).cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Members as an owned, sorted vector
    pub fn to_vec(&self) -> Vec<String> {
        self.0.iter().cloned().collect()
    }
}

impl TryFrom<Vec<String>> for AddressSet {
    type Error = Error;

    fn try_from(addresses: Vec<String>) -> Result<Self> {
        Self::parse(addresses)
    }
}

impl From<AddressSet> for Vec<String> {
    fn from(set: AddressSet) -> Self {
        set.0.into_iter().collect()
    }
}

impl fmt::Display for AddressSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (i, address) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            f.write_str(address)?;
        }
        write!(f, "}}")
    }
}
