//! Pending request ledger.
//!
//! Maps request ids to the local intent that produced them so that
//! acknowledgements and streamed events, which may arrive late, out of
//! order, repeatedly or never, can be attributed to a label and a device.

use std::collections::{HashMap, VecDeque};

use crate::catalog::Catalog;

/// Device id used when an event cannot be attributed to any device.
pub const UNKNOWN_DEVICE: &str = "unknown";

/// Label used when nothing better is known.
pub const GENERIC_LABEL: &str = "task";

/// How many settled requests are remembered for late acknowledgements.
pub const SETTLED_CAPACITY: usize = 32;

/// Generate a fresh request id.
pub fn new_request_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// A locally issued request awaiting its remote outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingRequest {
    pub request_id: String,
    pub device_id: Option<String>,
    /// Task id or command text.
    pub subject: String,
    pub issued_at_ms: u64,
    /// Set once any ack or event references this request.
    pub acknowledged: bool,
    /// Whether streamed events will follow the acknowledgement. Requests
    /// that only expect an ack are dropped once it arrives.
    pub awaits_events: bool,
}

#[derive(Debug, Default)]
pub struct PendingLedger {
    entries: HashMap<String, PendingRequest>,
    /// Recently settled entries, oldest first.
    settled: VecDeque<PendingRequest>,
}

impl PendingLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a request. A reused id replaces the earlier entry.
    pub fn record(
        &mut self,
        request_id: &str,
        device_id: Option<&str>,
        subject: &str,
        issued_at_ms: u64,
    ) -> Option<PendingRequest> {
        self.insert(PendingRequest {
            request_id: request_id.to_string(),
            device_id: device_id.map(str::to_string),
            subject: subject.to_string(),
            issued_at_ms,
            acknowledged: false,
            awaits_events: true,
        })
    }

    /// Record a fully built entry. Returns the entry it replaced, if any.
    pub fn insert(&mut self, request: PendingRequest) -> Option<PendingRequest> {
        let previous = self.entries.insert(request.request_id.clone(), request);
        if let Some(ref prev) = previous {
            log::warn!(
                "request id {} reused before it resolved; dropping '{}'",
                prev.request_id,
                prev.subject
            );
        }
        previous
    }

    pub fn resolve(&self, request_id: &str) -> Option<&PendingRequest> {
        self.entries.get(request_id)
    }

    pub fn forget(&mut self, request_id: &str) -> Option<PendingRequest> {
        self.entries.remove(request_id)
    }

    /// Remove an entry after its terminal event, keeping it in the
    /// settled record so a late acknowledgement can still be attributed.
    pub fn settle(&mut self, request_id: &str) -> Option<PendingRequest> {
        let entry = self.entries.remove(request_id)?;
        self.settled.retain(|e| e.request_id != entry.request_id);
        if self.settled.len() == SETTLED_CAPACITY {
            self.settled.pop_front();
        }
        self.settled.push_back(entry.clone());
        Some(entry)
    }

    /// A recently settled entry, if it is still remembered.
    pub fn settled(&self, request_id: &str) -> Option<&PendingRequest> {
        self.settled.iter().rev().find(|e| e.request_id == request_id)
    }

    /// Move an entry to the id the remote side assigned to it. Returns
    /// `false` when `from` is not pending.
    pub fn rekey(&mut self, from: &str, to: &str) -> bool {
        if from == to {
            return self.entries.contains_key(from);
        }
        let Some(mut entry) = self.entries.remove(from) else {
            return false;
        };
        log::debug!("request {from} is known remotely as {to}");
        entry.request_id = to.to_string();
        self.insert(entry);
        true
    }

    /// Flag an entry as heard from. Returns `false` for unknown ids.
    pub fn mark_acknowledged(&mut self, request_id: &str) -> bool {
        match self.entries.get_mut(request_id) {
            Some(entry) => {
                entry.acknowledged = true;
                true
            },
            None => false,
        }
    }

    /// Drop every entry, returning how many were outstanding. The settled
    /// record is dropped too.
    pub fn clear(&mut self) -> usize {
        let n = self.entries.len();
        self.entries.clear();
        self.settled.clear();
        n
    }

    /// Ids of unacknowledged entries issued at least `timeout_ms` ago,
    /// oldest first.
    pub fn expired(&self, now_ms: u64, timeout_ms: u64) -> Vec<String> {
        let mut stale: Vec<&PendingRequest> = self
            .entries
            .values()
            .filter(|e| !e.acknowledged && now_ms.saturating_sub(e.issued_at_ms) >= timeout_ms)
            .collect();
        stale.sort_by(|a, b| {
            a.issued_at_ms
                .cmp(&b.issued_at_ms)
                .then_with(|| a.request_id.cmp(&b.request_id))
        });
        stale.into_iter().map(|e| e.request_id.clone()).collect()
    }

    /// Ids of acknowledged entries issued at least `lifetime_ms` ago whose
    /// terminal event never arrived, oldest first.
    pub fn outlived(&self, now_ms: u64, lifetime_ms: u64) -> Vec<String> {
        let mut stale: Vec<&PendingRequest> = self
            .entries
            .values()
            .filter(|e| e.acknowledged && now_ms.saturating_sub(e.issued_at_ms) >= lifetime_ms)
            .collect();
        stale.sort_by(|a, b| {
            a.issued_at_ms
                .cmp(&b.issued_at_ms)
                .then_with(|| a.request_id.cmp(&b.request_id))
        });
        stale.into_iter().map(|e| e.request_id.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Pick the label for a remote event.
///
/// Precedence: catalog label of the pending subject, the pending subject
/// itself, the payload label, the payload id, then a generic placeholder.
pub fn resolve_label(
    pending: Option<&PendingRequest>,
    catalog: &Catalog,
    payload_label: Option<&str>,
    payload_id: Option<&str>,
) -> String {
    if let Some(entry) = pending {
        if let Some(label) = catalog.task_label(&entry.subject) {
            return label.to_string();
        }
        if !entry.subject.is_empty() {
            return entry.subject.clone();
        }
    }
    payload_label
        .filter(|s| !s.is_empty())
        .or(payload_id.filter(|s| !s.is_empty()))
        .unwrap_or(GENERIC_LABEL)
        .to_string()
}

/// Pick the device for a remote event: pending entry, then payload, then
/// [`UNKNOWN_DEVICE`].
pub fn resolve_device(pending: Option<&PendingRequest>, payload_device: Option<&str>) -> String {
    pending
        .and_then(|e| e.device_id.as_deref())
        .or(payload_device.filter(|s| !s.is_empty()))
        .unwrap_or(UNKNOWN_DEVICE)
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::TaskEntry;

    fn catalog_with(id: &str, label: &str) -> Catalog {
        let mut c = Catalog::new();
        c.replace_tasks(vec![TaskEntry {
            id: id.into(),
            label: Some(label.into()),
            description: None,
            command_preview: None,
        }]);
        c
    }

    #[test]
    fn record_then_resolve_then_forget() {
        let mut ledger = PendingLedger::new();
        ledger.record("r1", Some("dev1"), "taskA", 0);
        let entry = ledger.resolve("r1").unwrap();
        assert_eq!(entry.device_id.as_deref(), Some("dev1"));
        assert_eq!(entry.subject, "taskA");
        assert!(ledger.forget("r1").is_some());
        assert!(ledger.resolve("r1").is_none());
        assert!(ledger.forget("r1").is_none());
    }

    #[test]
    fn reused_id_is_last_writer_wins() {
        let mut ledger = PendingLedger::new();
        assert!(ledger.record("r1", Some("dev1"), "first", 0).is_none());
        let prev = ledger.record("r1", Some("dev2"), "second", 5).unwrap();
        assert_eq!(prev.subject, "first");
        assert_eq!(ledger.len(), 1);
        assert_eq!(ledger.resolve("r1").unwrap().subject, "second");
    }

    #[test]
    fn mark_acknowledged_unknown_is_false() {
        let mut ledger = PendingLedger::new();
        assert!(!ledger.mark_acknowledged("nope"));
        ledger.record("r1", None, "x", 0);
        assert!(ledger.mark_acknowledged("r1"));
        assert!(ledger.resolve("r1").unwrap().acknowledged);
    }

    #[test]
    fn expired_skips_acknowledged_and_fresh() {
        let mut ledger = PendingLedger::new();
        ledger.record("old", None, "a", 0);
        ledger.record("acked", None, "b", 0);
        ledger.record("fresh", None, "c", 9_000);
        ledger.mark_acknowledged("acked");
        assert_eq!(ledger.expired(10_000, 5_000), vec!["old".to_string()]);
        assert!(ledger.expired(1_000, 5_000).is_empty());
    }

    #[test]
    fn expired_is_oldest_first() {
        let mut ledger = PendingLedger::new();
        ledger.record("b", None, "x", 200);
        ledger.record("a", None, "x", 100);
        assert_eq!(ledger.expired(10_000, 1), vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn clear_reports_count() {
        let mut ledger = PendingLedger::new();
        ledger.record("a", None, "x", 0);
        ledger.record("b", None, "y", 0);
        assert_eq!(ledger.clear(), 2);
        assert!(ledger.is_empty());
        assert_eq!(ledger.clear(), 0);
    }

    #[test]
    fn settled_entries_are_remembered_and_bounded() {
        let mut ledger = PendingLedger::new();
        ledger.record("r1", Some("dev1"), "taskA", 0);
        let entry = ledger.settle("r1").unwrap();
        assert_eq!(entry.subject, "taskA");
        assert!(ledger.resolve("r1").is_none());
        assert_eq!(ledger.settled("r1").unwrap().device_id.as_deref(), Some("dev1"));
        assert!(ledger.settle("r1").is_none());

        for i in 0..SETTLED_CAPACITY {
            let id = format!("n{i}");
            ledger.record(&id, None, "x", 0);
            ledger.settle(&id);
        }
        assert!(ledger.settled("r1").is_none());
        assert!(ledger.settled("n0").is_some());
        assert_eq!(ledger.clear(), 0);
        assert!(ledger.settled("n0").is_none());
    }

    #[test]
    fn rekey_moves_entry_to_remote_id() {
        let mut ledger = PendingLedger::new();
        ledger.record("local", Some("dev1"), "taskA", 0);
        assert!(ledger.rekey("local", "server"));
        assert!(ledger.resolve("local").is_none());
        assert_eq!(ledger.resolve("server").unwrap().request_id, "server");
        assert!(!ledger.rekey("local", "other"));
        assert!(ledger.rekey("server", "server"));
        assert_eq!(ledger.len(), 1);
    }

    #[test]
    fn outlived_only_reports_acknowledged() {
        let mut ledger = PendingLedger::new();
        ledger.record("waiting", None, "a", 0);
        ledger.record("acked", None, "b", 0);
        ledger.record("recent", None, "c", 9_000);
        ledger.mark_acknowledged("acked");
        ledger.mark_acknowledged("recent");
        assert_eq!(ledger.outlived(10_000, 5_000), vec!["acked".to_string()]);
        assert!(ledger.outlived(4_000, 5_000).is_empty());
    }

    #[test]
    fn catalog_label_beats_payload_label() {
        let mut ledger = PendingLedger::new();
        ledger.record("r1", Some("dev1"), "taskA", 0);
        let catalog = catalog_with("taskA", "Task Alpha");
        let label = resolve_label(
            ledger.resolve("r1"),
            &catalog,
            Some("payload label"),
            Some("taskA"),
        );
        assert_eq!(label, "Task Alpha");
    }

    #[test]
    fn pending_subject_without_catalog_entry() {
        let mut ledger = PendingLedger::new();
        ledger.record("r1", Some("dev1"), "taskA", 0);
        let label = resolve_label(ledger.resolve("r1"), &Catalog::new(), Some("other"), None);
        assert_eq!(label, "taskA");
    }

    #[test]
    fn payload_fallbacks_in_order() {
        let c = Catalog::new();
        assert_eq!(resolve_label(None, &c, Some("Lbl"), Some("id")), "Lbl");
        assert_eq!(resolve_label(None, &c, None, Some("id")), "id");
        assert_eq!(resolve_label(None, &c, Some(""), Some("id")), "id");
        assert_eq!(resolve_label(None, &c, None, None), GENERIC_LABEL);
    }

    #[test]
    fn device_resolution_order() {
        let mut ledger = PendingLedger::new();
        ledger.record("r1", Some("dev1"), "t", 0);
        ledger.record("r2", None, "t", 0);
        assert_eq!(resolve_device(ledger.resolve("r1"), Some("devX")), "dev1");
        assert_eq!(resolve_device(ledger.resolve("r2"), Some("devX")), "devX");
        assert_eq!(resolve_device(None, None), UNKNOWN_DEVICE);
        assert_eq!(resolve_device(None, Some("")), UNKNOWN_DEVICE);
    }

    #[test]
    fn request_ids_are_unique() {
        let a = new_request_id();
        let b = new_request_id();
        assert_ne!(a, b);
        assert_eq!(a.len(), 36);
    }
}
