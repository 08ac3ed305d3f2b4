//! Test doubles and common utilities for engine contract tests
//!
//! [`ZoneTransport`] is an in-process authoritative server: it applies
//! RFC 2136 updates to an in-memory zone and answers A queries from it.
//! Clones share the zone and counters, so a test keeps one clone for
//! inspection and hands another to the engine.

#![allow(dead_code)]

use std::collections::{BTreeMap, BTreeSet};
use std::net::Ipv4Addr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use hickory_proto::op::{Message, MessageType, OpCode, ResponseCode, UpdateMessage};
use hickory_proto::rr::rdata::A;
use hickory_proto::rr::{DNSClass, Name, RData, Record};
use nsupdate_core::config::{
    NsupdateConfig, ReconcilerConfig, RecordSetConfig, StateStoreConfig, UpdateServerConfig,
};
use nsupdate_core::state::MemoryStateStore;
use nsupdate_core::traits::{StateRecord, StateStore, Transport, TransportError};
use nsupdate_core::{Error, RecordSet, RecordSetEngine};

pub const ZONE: &str = "example.com.";
pub const SERVER: &str = "127.0.0.1:53";

// base64("0123456789abcdef0123456789abcdef")
pub const SECRET: &str = "MDEyMzQ1Njc4OWFiY2RlZjAxMjM0NTY3ODlhYmNkZWY=";

#[derive(Debug)]
struct ZoneState {
    records: BTreeMap<String, BTreeSet<Ipv4Addr>>,
    updates: Vec<Message>,
    queries: Vec<Message>,
    update_rcode: ResponseCode,
    query_rcode: ResponseCode,
    fail_updates: bool,
    fail_queries: bool,
    ignore_updates: bool,
}

/// In-memory authoritative zone speaking the Transport trait
#[derive(Debug, Clone)]
pub struct ZoneTransport {
    state: Arc<Mutex<ZoneState>>,
    update_count: Arc<AtomicUsize>,
    query_count: Arc<AtomicUsize>,
}

impl ZoneTransport {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(ZoneState {
                records: BTreeMap::new(),
                updates: Vec::new(),
                queries: Vec::new(),
                update_rcode: ResponseCode::NoError,
                query_rcode: ResponseCode::NoError,
                fail_updates: false,
                fail_queries: false,
                ignore_updates: false,
            })),
            update_count: Arc::new(AtomicUsize::new(0)),
            query_count: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Number of UPDATE exchanges attempted
    pub fn update_count(&self) -> usize {
        self.update_count.load(Ordering::SeqCst)
    }

    /// Number of query exchanges attempted
    pub fn query_count(&self) -> usize {
        self.query_count.load(Ordering::SeqCst)
    }

    /// Addresses currently served for `fqdn`
    pub fn addresses(&self, fqdn: &str) -> Vec<String> {
        let state = self.state.lock().unwrap();
        state
            .records
            .get(&fqdn.to_ascii_lowercase())
            .map(|set| set.iter().map(ToString::to_string).collect())
            .unwrap_or_default()
    }

    /// Change the zone out of band
    pub fn set_addresses(&self, fqdn: &str, addresses: &[&str]) {
        let mut state = self.state.lock().unwrap();
        let set = addresses.iter().map(|a| a.parse().unwrap()).collect();
        state.records.insert(fqdn.to_ascii_lowercase(), set);
    }

    /// Every UPDATE message received, in order
    pub fn sent_updates(&self) -> Vec<Message> {
        self.state.lock().unwrap().updates.clone()
    }

    /// Every query message received, in order
    pub fn sent_queries(&self) -> Vec<Message> {
        self.state.lock().unwrap().queries.clone()
    }

    pub fn last_update(&self) -> Message {
        self.sent_updates().pop().expect("an update was sent")
    }

    /// Answer future updates with `code` without applying them
    pub fn set_update_rcode(&self, code: ResponseCode) {
        self.state.lock().unwrap().update_rcode = code;
    }

    /// Answer future queries with `code`
    pub fn set_query_rcode(&self, code: ResponseCode) {
        self.state.lock().unwrap().query_rcode = code;
    }

    /// Fail future update exchanges at the transport level
    pub fn fail_updates(&self, fail: bool) {
        self.state.lock().unwrap().fail_updates = fail;
    }

    /// Fail future query exchanges at the transport level
    pub fn fail_queries(&self, fail: bool) {
        self.state.lock().unwrap().fail_queries = fail;
    }

    /// Acknowledge future updates with NOERROR but do not apply them
    pub fn ignore_updates(&self, ignore: bool) {
        self.state.lock().unwrap().ignore_updates = ignore;
    }

    fn apply_update(state: &mut ZoneState, message: &Message) {
        for record in message.updates() {
            let name = record.name().to_string().to_ascii_lowercase();
            let address = match record.data() {
                Some(RData::A(a)) => Some(a.0),
                _ => None,
            };

            match (record.dns_class(), address) {
                (DNSClass::IN, Some(address)) => {
                    state.records.entry(name).or_default().insert(address);
                }
                (DNSClass::NONE, Some(address)) => {
                    if let Some(set) = state.records.get_mut(&name) {
                        set.remove(&address);
                        if set.is_empty() {
                            state.records.remove(&name);
                        }
                    }
                }
                (DNSClass::ANY, _) => {
                    state.records.remove(&name);
                }
                other => panic!("unexpected update record {record:?} ({other:?})"),
            }
        }
    }

    fn answer(state: &ZoneState, request: &Message) -> Vec<Record> {
        let mut answers = Vec::new();
        for query in request.queries() {
            let key = query.name().to_string().to_ascii_lowercase();
            if let Some(set) = state.records.get(&key) {
                for address in set {
                    answers.push(Record::from_rdata(
                        Name::from_ascii(&key).unwrap(),
                        300,
                        RData::A(A(*address)),
                    ));
                }
            }
        }
        answers
    }
}

fn response_to(request: &Message, code: ResponseCode) -> Message {
    let mut response = Message::new();
    response
        .set_id(request.id())
        .set_message_type(MessageType::Response)
        .set_op_code(request.op_code())
        .set_response_code(code);
    response
}

#[async_trait::async_trait]
impl Transport for ZoneTransport {
    async fn exchange(&self, message: Message, _server: &str) -> Result<Message, TransportError> {
        let mut state = self.state.lock().unwrap();

        if message.op_code() == OpCode::Update {
            self.update_count.fetch_add(1, Ordering::SeqCst);
            state.updates.push(message.clone());
            if state.fail_updates {
                return Err(TransportError::Other("connection refused".into()));
            }
            let code = state.update_rcode;
            if code == ResponseCode::NoError && !state.ignore_updates {
                Self::apply_update(&mut state, &message);
            }
            return Ok(response_to(&message, code));
        }

        self.query_count.fetch_add(1, Ordering::SeqCst);
        state.queries.push(message.clone());
        if state.fail_queries {
            return Err(TransportError::Other("connection refused".into()));
        }
        let code = state.query_rcode;
        let mut response = response_to(&message, code);
        if code == ResponseCode::NoError {
            for answer in Self::answer(&state, &message) {
                response.add_answer(answer);
            }
        }
        Ok(response)
    }

    fn transport_name(&self) -> &'static str {
        "zone-fake"
    }
}

/// Record set in the test zone with TTL 300
pub fn record_set(name: &str, addresses: &[&str]) -> RecordSet {
    RecordSet::new(ZONE, name, addresses.iter().copied(), 300).expect("valid record set")
}

/// Engine over `zone` with a fresh memory store
pub fn engine(zone: &ZoneTransport) -> (RecordSetEngine, MemoryStateStore) {
    let store = MemoryStateStore::new();
    (engine_with_store(zone, Box::new(store.clone())), store)
}

/// Engine over `zone` with the given store, unsigned
pub fn engine_with_store(zone: &ZoneTransport, store: Box<dyn StateStore>) -> RecordSetEngine {
    RecordSetEngine::new(Box::new(zone.clone()), SERVER, None, store)
}

/// Daemon-shaped configuration for `records`
pub fn config_for(records: Vec<RecordSetConfig>) -> NsupdateConfig {
    NsupdateConfig {
        server: UpdateServerConfig::new("127.0.0.1"),
        state_store: StateStoreConfig::Memory,
        records,
        reconciler: ReconcilerConfig::default(),
    }
}

/// Memory store whose deletes always fail
#[derive(Debug, Clone, Default)]
pub struct StickyStateStore {
    inner: MemoryStateStore,
}

impl StickyStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn inner(&self) -> &MemoryStateStore {
        &self.inner
    }
}

#[async_trait::async_trait]
impl StateStore for StickyStateStore {
    async fn get_record(&self, fqdn: &str) -> Result<Option<StateRecord>, Error> {
        self.inner.get_record(fqdn).await
    }

    async fn set_record(&self, fqdn: &str, record: &StateRecord) -> Result<(), Error> {
        self.inner.set_record(fqdn, record).await
    }

    async fn delete_record(&self, fqdn: &str) -> Result<(), Error> {
        Err(Error::state_store(format!("cannot delete {fqdn}")))
    }

    async fn list_records(&self) -> Result<Vec<String>, Error> {
        self.inner.list_records().await
    }

    async fn flush(&self) -> Result<(), Error> {
        self.inner.flush().await
    }
}
