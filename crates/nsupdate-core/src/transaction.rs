//! Update transaction builder
//!
//! An [`UpdateTransaction`] is the engine's typed view of an RFC 2136 UPDATE:
//! an ordered list of insert/remove/remove-all operations scoped to one zone.
//! It is lowered to a wire [`Message`] only right before signing.
//!
//! Encoding per RFC 2136 §2.5:
//!
//! | operation  | class | TTL   | RDATA   |
//! |------------|-------|-------|---------|
//! | insert     | IN    | given | address |
//! | remove     | NONE  | 0     | address |
//! | remove-all | ANY   | 0     | empty   |

use std::fmt;
use std::net::Ipv4Addr;

use hickory_proto::op::{Message, MessageType, OpCode, Query, UpdateMessage};
use hickory_proto::rr::rdata::A;
use hickory_proto::rr::{DNSClass, Name, RData, Record, RecordType};

use crate::address::normalize_address;
use crate::diff::AddressDelta;
use crate::error::{Error, Result};

/// An A record carried by an insert or remove operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddressRecord {
    fqdn: String,
    ttl: u32,
    address: Ipv4Addr,
}

impl AddressRecord {
    /// Build an A record from its textual parts
    ///
    /// The address is normalized first, so leading-zero octets are
    /// accepted. Fails with [`Error::RecordEncoding`] when `address` is not
    /// an IPv4 address, since only A records are written.
    pub fn new(fqdn: impl Into<String>, ttl: u32, address: &str) -> Result<Self> {
        let fqdn = fqdn.into();
        let address = normalize_address(address)
            .and_then(|normalized| {
                normalized
                    .parse::<Ipv4Addr>()
                    .map_err(|_| Error::invalid_address(address))
            })
            .map_err(|e| Error::record_encoding(format!("{fqdn} {ttl} A {address}"), e))?;
        Ok(Self { fqdn, ttl, address })
    }

    pub fn fqdn(&self) -> &str {
        &self.fqdn
    }

    pub fn ttl(&self) -> u32 {
        self.ttl
    }

    pub fn address(&self) -> Ipv4Addr {
        self.address
    }
}

impl fmt::Display for AddressRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} A {}", self.fqdn, self.ttl, self.address)
    }
}

/// A single operation inside an update transaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateOperation {
    /// Add the record to its RRset
    Insert(AddressRecord),
    /// Delete the record from its RRset
    Remove(AddressRecord),
    /// Delete the whole A RRset at the name
    RemoveAll {
        /// Owner name of the RRset
        fqdn: String,
    },
}

impl fmt::Display for UpdateOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UpdateOperation::Insert(record) => write!(f, "insert {record}"),
            UpdateOperation::Remove(record) => write!(f, "remove {record}"),
            UpdateOperation::RemoveAll { fqdn } => write!(f, "remove-all {fqdn} 0 A"),
        }
    }
}

/// Ordered update operations scoped to one zone
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateTransaction {
    zone: String,
    operations: Vec<UpdateOperation>,
}

impl UpdateTransaction {
    /// Start an empty transaction for `zone`
    pub fn new(zone: impl Into<String>) -> Self {
        Self {
            zone: zone.into(),
            operations: Vec::new(),
        }
    }

    /// Build the transaction applying `delta` to the A RRset at `fqdn`
    ///
    /// Removals come first, then insertions, each in the delta's order.
    pub fn for_delta(zone: &str, fqdn: &str, ttl: u32, delta: &AddressDelta) -> Result<Self> {
        let mut transaction = Self::new(zone);
        for address in &delta.to_remove {
            transaction.remove(AddressRecord::new(fqdn, ttl, address)?);
        }
        for address in &delta.to_add {
            transaction.insert(AddressRecord::new(fqdn, ttl, address)?);
        }
        Ok(transaction)
    }

    /// Build the transaction removing the whole A RRset at `fqdn`
    pub fn remove_rrset(zone: &str, fqdn: &str) -> Self {
        let mut transaction = Self::new(zone);
        transaction.remove_all(fqdn);
        transaction
    }

    pub fn insert(&mut self, record: AddressRecord) -> &mut Self {
        self.operations.push(UpdateOperation::Insert(record));
        self
    }

    pub fn remove(&mut self, record: AddressRecord) -> &mut Self {
        self.operations.push(UpdateOperation::Remove(record));
        self
    }

    pub fn remove_all(&mut self, fqdn: impl Into<String>) -> &mut Self {
        self.operations
            .push(UpdateOperation::RemoveAll { fqdn: fqdn.into() });
        self
    }

    pub fn zone(&self) -> &str {
        &self.zone
    }

    pub fn operations(&self) -> &[UpdateOperation] {
        &self.operations
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    /// Number of insert operations
    pub fn inserts(&self) -> usize {
        self.operations
            .iter()
            .filter(|op| matches!(op, UpdateOperation::Insert(_)))
            .count()
    }

    /// Number of single-record remove operations
    pub fn removes(&self) -> usize {
        self.operations
            .iter()
            .filter(|op| matches!(op, UpdateOperation::Remove(_)))
            .count()
    }

    /// Lower the transaction to an unsigned UPDATE message
    pub fn to_message(&self) -> Result<Message> {
        let mut zone = Query::new();
        zone.set_name(parse_name(&self.zone)?)
            .set_query_class(DNSClass::IN)
            .set_query_type(RecordType::SOA);

        let mut message = Message::new();
        message
            .set_id(rand::random())
            .set_message_type(MessageType::Query)
            .set_op_code(OpCode::Update)
            .set_recursion_desired(false);
        message.add_zone(zone);

        for operation in &self.operations {
            message.add_update(encode_operation(operation)?);
        }

        Ok(message)
    }
}

fn encode_operation(operation: &UpdateOperation) -> Result<Record> {
    let record = match operation {
        UpdateOperation::Insert(record) => {
            let mut rr = Record::from_rdata(
                parse_name(record.fqdn())?,
                record.ttl(),
                RData::A(A(record.address())),
            );
            rr.set_dns_class(DNSClass::IN);
            rr
        }
        UpdateOperation::Remove(record) => {
            let mut rr = Record::from_rdata(
                parse_name(record.fqdn())?,
                0,
                RData::A(A(record.address())),
            );
            rr.set_dns_class(DNSClass::NONE);
            rr
        }
        UpdateOperation::RemoveAll { fqdn } => {
            let mut rr = Record::with(parse_name(fqdn)?, RecordType::A, 0);
            rr.set_dns_class(DNSClass::ANY);
            rr
        }
    };
    Ok(record)
}

fn parse_name(text: &str) -> Result<Name> {
    Name::from_ascii(text).map_err(|e| Error::record_encoding(text, e))
}
