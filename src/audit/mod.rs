// `TransactionLog` and the in-memory `AuditJournal`, persisted alongside the
// catalog (`spec.md` §3, §4.3). Grounded on the `TransactionLog` record
// described in `spec.md` §3; the `tracing`-backed logging discipline is
// carried from `examples/harborgrid-justin-rusty-db/src/audit/audit_logger.rs`.

use crate::rbac::model::PermOp;
use serde::{Deserialize, Serialize};

/// A single audited action and its outcome.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionLog {
    pub event_time: chrono::DateTime<chrono::Utc>,
    pub action_type: PermOp,
    pub action_scope: String,
    pub blame: String,
    pub success: bool,
    pub payload: String,
}

/// In-memory, append-only audit journal.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuditJournal {
    entries: Vec<TransactionLog>,
}

impl AuditJournal {
    pub fn new() -> Self {
        Self { entries: Vec::new() }
    }

    pub fn record(
        &mut self,
        action_type: PermOp,
        action_scope: impl Into<String>,
        blame: impl Into<String>,
        success: bool,
        payload: impl Into<String>,
    ) {
        let entry = TransactionLog {
            event_time: chrono::Utc::now(),
            action_type,
            action_scope: action_scope.into(),
            blame: blame.into(),
            success,
            payload: payload.into(),
        };

        if success {
            tracing::info!(scope = %entry.action_scope, blame = %entry.blame, "audited action allowed");
        } else {
            tracing::warn!(scope = %entry.action_scope, blame = %entry.blame, "audited action denied");
        }

        self.entries.push(entry);
    }

    pub fn entries(&self) -> &[TransactionLog] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}
