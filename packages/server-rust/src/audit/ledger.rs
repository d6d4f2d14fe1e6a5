//! Correlation-keyed audit ledger.
//!
//! Every call's lifecycle is recorded under a unique correlation key:
//! `start` inserts a record and emits a `REQUEST-BEGIN` line, the matching
//! `finish` closes it and emits `REQUEST-END` with the full record. The
//! table is a `DashMap`, so concurrent starts and finishes on distinct keys
//! never interfere; keys are call-unique, so no cross-call locking exists.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use chrono::{DateTime, TimeDelta, Utc};
use dashmap::DashMap;
use parking_lot::Mutex;
use serde::Serialize;
use serde_json::{json, Value};
use sha2::{Digest, Sha256};
use tracing::{info, warn};

use super::log::AuditLog;

/// Opaque identifier linking one call's begin and end audit events.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct CorrelationKey(String);

impl CorrelationKey {
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for CorrelationKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
impl CorrelationKey {
    /// Fixed key for tests that exercise handlers without a ledger.
    pub(crate) fn test_key(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Elapsed call time decomposed into minutes, residual seconds, and residual
/// milliseconds. Three independent integers, not a single scalar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DurationParts {
    pub minutes: u64,
    pub seconds: u64,
    pub millis: u64,
}

impl DurationParts {
    #[must_use]
    pub fn from_elapsed_ms(total_ms: u64) -> Self {
        Self {
            minutes: total_ms / 60_000,
            seconds: (total_ms / 1000) % 60,
            millis: total_ms % 1000,
        }
    }
}

impl std::fmt::Display for DurationParts {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}m{}s{}ms", self.minutes, self.seconds, self.millis)
    }
}

/// Lifecycle record for one call.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditRecord {
    pub request_key: String,
    pub operation: String,
    /// Input parameter snapshot taken at `start`.
    pub input: Value,
    pub begin_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<DurationParts>,
    /// Output result snapshot, set by the matching `finish`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<Value>,
    /// Monotonic begin instant; duration math never trusts wall clocks.
    #[serde(skip)]
    begin_instant: Instant,
}

/// In-memory table of audit records plus the line-oriented event stream.
///
/// Records are never deleted by a call's own lifecycle; retention is the
/// `max_records` cap, which evicts the oldest *finished* records once the
/// table grows past it. Unfinished records are never evicted.
pub struct AuditLedger {
    records: DashMap<String, AuditRecord>,
    /// Insertion order of keys, consulted for eviction.
    order: Mutex<VecDeque<String>>,
    /// Process-local sequence folded into key derivation so that identical
    /// payloads arriving in the same millisecond still get distinct keys.
    seq: AtomicU64,
    log: AuditLog,
    max_records: usize,
}

impl AuditLedger {
    #[must_use]
    pub fn new(log: AuditLog, max_records: usize) -> Self {
        Self {
            records: DashMap::new(),
            order: Mutex::new(VecDeque::new()),
            seq: AtomicU64::new(0),
            log,
            max_records,
        }
    }

    /// Opens a record for a new call and returns its correlation key.
    ///
    /// The key is a SHA-256 digest over a canonical JSON serialization of
    /// (operation name, input snapshot, begin epoch millis, sequence number).
    pub fn start(&self, operation: &str, input: &Value) -> CorrelationKey {
        let begin_at = Utc::now();
        let begin_instant = Instant::now();
        let seq = self.seq.fetch_add(1, Ordering::Relaxed);
        let key = derive_key(operation, input, begin_at.timestamp_millis(), seq);

        let record = AuditRecord {
            request_key: key.0.clone(),
            operation: operation.to_string(),
            input: input.clone(),
            begin_at,
            end_at: None,
            duration: None,
            output: None,
            begin_instant,
        };

        self.log.append("REQUEST-BEGIN", &record);
        info!(target: "audit", key = %key, operation, "request begin");

        self.records.insert(key.0.clone(), record);
        self.order.lock().push_back(key.0.clone());
        key
    }

    /// Closes the record for `key`: sets the end timestamp, decomposes the
    /// elapsed time, stores the output snapshot, and emits the end event.
    ///
    /// The orchestrator guarantees `start` precedes every `finish`; an
    /// unknown key is logged and ignored.
    pub fn finish(&self, key: &CorrelationKey, output: Value) {
        let snapshot = {
            let Some(mut record) = self.records.get_mut(key.as_str()) else {
                warn!(target: "audit", key = %key, "finish for unknown correlation key");
                return;
            };
            let elapsed_ms =
                u64::try_from(record.begin_instant.elapsed().as_millis()).unwrap_or(u64::MAX);
            let delta = TimeDelta::milliseconds(i64::try_from(elapsed_ms).unwrap_or(i64::MAX));
            record.end_at = Some(record.begin_at + delta);
            record.duration = Some(DurationParts::from_elapsed_ms(elapsed_ms));
            record.output = Some(output);
            record.clone()
        };

        self.log.append("REQUEST-END", &snapshot);
        if let Some(duration) = snapshot.duration {
            info!(
                target: "audit",
                key = %key,
                operation = %snapshot.operation,
                duration = %duration,
                "request end"
            );
        }

        self.evict_finished();
    }

    /// Snapshot of the record for `key`, if it exists.
    #[must_use]
    pub fn get(&self, key: &CorrelationKey) -> Option<AuditRecord> {
        self.records.get(key.as_str()).map(|r| r.clone())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Evicts the oldest finished records while the table exceeds the cap.
    fn evict_finished(&self) {
        if self.max_records == 0 {
            return;
        }
        let mut order = self.order.lock();
        let mut idx = 0;
        while self.records.len() > self.max_records && idx < order.len() {
            let finished = order
                .get(idx)
                .and_then(|k| self.records.get(k))
                .is_none_or(|r| r.end_at.is_some());
            if finished {
                if let Some(k) = order.remove(idx) {
                    self.records.remove(&k);
                }
            } else {
                idx += 1;
            }
        }
    }
}

/// Canonical key derivation. `json!` maps serialize with sorted keys, so the
/// hashed material is deterministic for a given (operation, input, ms, seq).
fn derive_key(operation: &str, input: &Value, begin_ms: i64, seq: u64) -> CorrelationKey {
    let material = json!({
        "operation": operation,
        "input": input,
        "beginMs": begin_ms,
        "seq": seq,
    })
    .to_string();
    CorrelationKey(hex::encode(Sha256::digest(material.as_bytes())))
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::sync::Arc;
    use std::time::Duration;

    use serde_json::json;

    use super::*;

    fn ledger() -> AuditLedger {
        AuditLedger::new(AuditLog::disabled(), 0)
    }

    #[test]
    fn start_inserts_an_open_record() {
        let ledger = ledger();
        let key = ledger.start("createUser", &json!({ "email": "a@b.co" }));

        let record = ledger.get(&key).unwrap();
        assert_eq!(record.operation, "createUser");
        assert_eq!(record.input, json!({ "email": "a@b.co" }));
        assert!(record.end_at.is_none());
        assert!(record.duration.is_none());
        assert!(record.output.is_none());
    }

    #[test]
    fn finish_closes_the_record_with_nonnegative_duration() {
        let ledger = ledger();
        let key = ledger.start("createUser", &json!({ "email": "a@b.co" }));
        std::thread::sleep(Duration::from_millis(15));
        ledger.finish(&key, json!({ "status": "OK" }));

        let record = ledger.get(&key).unwrap();
        let end = record.end_at.unwrap();
        assert!(end >= record.begin_at);

        let parts = record.duration.unwrap();
        assert_eq!(parts.minutes, 0);
        assert_eq!(parts.seconds, 0);
        assert!(parts.millis >= 10);
        assert_eq!(record.output, Some(json!({ "status": "OK" })));
    }

    #[test]
    fn duration_parts_decompose_independently() {
        let parts = DurationParts::from_elapsed_ms(61_230);
        assert_eq!(parts.minutes, 1);
        assert_eq!(parts.seconds, 1);
        assert_eq!(parts.millis, 230);
        assert_eq!(parts.to_string(), "1m1s230ms");

        let zero = DurationParts::from_elapsed_ms(0);
        assert_eq!((zero.minutes, zero.seconds, zero.millis), (0, 0, 0));
    }

    #[test]
    fn distinct_payloads_yield_distinct_keys() {
        let ledger = ledger();
        let k1 = ledger.start("op", &json!({ "n": 1 }));
        let k2 = ledger.start("op", &json!({ "n": 2 }));
        assert_ne!(k1, k2);
    }

    #[test]
    fn identical_payloads_yield_distinct_keys() {
        // Same operation, same input, potentially same millisecond: the
        // sequence component must still separate them.
        let ledger = ledger();
        let k1 = ledger.start("op", &json!({ "n": 1 }));
        let k2 = ledger.start("op", &json!({ "n": 1 }));
        assert_ne!(k1, k2);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn concurrent_starts_never_collide() {
        let ledger = Arc::new(ledger());
        let mut tasks = Vec::new();
        for i in 0..64 {
            let ledger = Arc::clone(&ledger);
            tasks.push(tokio::spawn(async move {
                ledger.start("op", &json!({ "i": i }))
            }));
        }

        let mut keys = HashSet::new();
        for task in tasks {
            keys.insert(task.await.unwrap());
        }
        assert_eq!(keys.len(), 64);
        assert_eq!(ledger.len(), 64);
    }

    #[test]
    fn finish_for_unknown_key_is_ignored() {
        let ledger = ledger();
        let key = CorrelationKey("deadbeef".to_string());
        ledger.finish(&key, json!({ "status": "OK" }));
        assert!(ledger.is_empty());
    }

    #[test]
    fn retention_evicts_oldest_finished_records() {
        let ledger = AuditLedger::new(AuditLog::disabled(), 2);
        let mut keys = Vec::new();
        for i in 0..5 {
            let key = ledger.start("op", &json!({ "i": i }));
            ledger.finish(&key, json!({ "status": "OK" }));
            keys.push(key);
        }

        assert_eq!(ledger.len(), 2);
        // The oldest records are gone, the newest survive.
        assert!(ledger.get(&keys[0]).is_none());
        assert!(ledger.get(&keys[4]).is_some());
    }

    #[test]
    fn retention_never_evicts_unfinished_records() {
        let ledger = AuditLedger::new(AuditLog::disabled(), 1);
        let open1 = ledger.start("op", &json!({ "i": 1 }));
        let open2 = ledger.start("op", &json!({ "i": 2 }));
        let closed = ledger.start("op", &json!({ "i": 3 }));
        ledger.finish(&closed, json!({ "status": "OK" }));

        // Only the finished record was evictable.
        assert!(ledger.get(&open1).is_some());
        assert!(ledger.get(&open2).is_some());
        assert!(ledger.get(&closed).is_none());
    }

    #[test]
    fn zero_cap_means_unbounded() {
        let ledger = AuditLedger::new(AuditLog::disabled(), 0);
        for i in 0..100 {
            let key = ledger.start("op", &json!({ "i": i }));
            ledger.finish(&key, json!({}));
        }
        assert_eq!(ledger.len(), 100);
    }

    #[test]
    fn end_events_reach_the_line_sink() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("audit.log");
        let ledger = AuditLedger::new(AuditLog::open(&path).unwrap(), 0);

        let key = ledger.start("createUser", &json!({ "email": "a@b.co" }));
        ledger.finish(&key, json!({ "status": "OK" }));

        let contents = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<_> = contents.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains("[REQUEST-BEGIN]"));
        assert!(lines[1].contains("[REQUEST-END]"));
        assert!(lines[1].contains(key.as_str()));
        assert!(lines[1].contains(r#""duration""#));
    }
}
