//! Audit trail and notification emission
use chrono::Utc;
use std::sync::Mutex;

use crate::entitlement::LedgerSnapshot;
use crate::request::ApproverRole;
use crate::types::{EmployeeId, TimeStamp};

#[derive(Debug, Clone, Copy, PartialEq, Eq, minicbor::Encode, minicbor::Decode)]
pub enum AuditAction {
    #[n(0)]
    Submit,
    #[n(1)]
    Approve,
    #[n(2)]
    Reject,
    #[n(3)]
    Cancel,
    #[n(4)]
    Override,
    #[n(5)]
    Adjustment,
    #[n(6)]
    Accrual,
    #[n(7)]
    CarryForward,
    #[n(8)]
    Expiry,
    #[n(9)]
    Amend,
    #[n(10)]
    FlowReplaced,
    #[n(11)]
    Reopen,
    #[n(12)]
    Grant,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, minicbor::Encode, minicbor::Decode)]
pub enum NotificationKind {
    #[n(0)]
    AwaitingApproval,
    #[n(1)]
    Approved,
    #[n(2)]
    Rejected,
    #[n(3)]
    Cancelled,
    #[n(4)]
    Reopened,
    #[n(5)]
    Escalation,
}

/// Side effects requested by a state machine transition. The state machine never performs
/// them itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LeaveEvent {
    Audit {
        action: AuditAction,
        actor: EmployeeId,
        reason: Option<String>,
    },
    NotifyEmployee {
        kind: NotificationKind,
        title: String,
        message: String,
    },
    NotifyApprovers {
        role: ApproverRole,
        kind: NotificationKind,
        title: String,
        message: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub recipient: EmployeeId,
    pub kind: NotificationKind,
    pub title: String,
    pub message: String,
    pub related_id: Option<String>,
}

/// Delivery is owned by another system. Failures are logged by the caller and never undo the
/// transition that produced the notification.
pub trait Notifier: Send + Sync {
    fn notify(&self, notification: &Notification) -> anyhow::Result<()>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, n: &Notification) -> anyhow::Result<()> {
        tracing::info!(recipient = %n.recipient, kind = ?n.kind, related = ?n.related_id, "{}", n.title);
        Ok(())
    }
}

/// Keeps every notification in memory.
#[derive(Debug, Default)]
pub struct MemoryNotifier {
    sent: Mutex<Vec<Notification>>,
}

impl MemoryNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> Vec<Notification> {
        match self.sent.lock() {
            Ok(sent) => sent.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn sent_to(&self, recipient: &str) -> Vec<Notification> {
        self.sent()
            .into_iter()
            .filter(|n| n.recipient == recipient)
            .collect()
    }
}

impl Notifier for MemoryNotifier {
    fn notify(&self, notification: &Notification) -> anyhow::Result<()> {
        self.sent
            .lock()
            .map_err(|_| anyhow::anyhow!("notification log poisoned"))?
            .push(notification.clone());
        Ok(())
    }
}

/// One immutable entry of the audit trail.
///
/// Entries of the same entity form a chain: `prev_digest` is the digest of the previous entry
/// and `digest` the sha256 of this entry's CBOR encoding with `digest` left empty.
#[derive(Debug, Clone, PartialEq, Eq, minicbor::Encode, minicbor::Decode)]
pub struct AuditEntry {
    #[n(0)]
    pub entity_id: String,
    #[n(1)]
    pub action: AuditAction,
    #[n(2)]
    pub previous: Option<LedgerSnapshot>,
    #[n(3)]
    pub current: Option<LedgerSnapshot>,
    #[n(4)]
    pub actor: EmployeeId,
    #[n(5)]
    pub timestamp: TimeStamp<Utc>,
    #[n(6)]
    pub reason: Option<String>,
    #[n(7)]
    pub prev_digest: Option<String>,
    #[n(8)]
    pub digest: String,
}

impl AuditEntry {
    pub fn new(
        entity_id: &str,
        action: AuditAction,
        previous: Option<LedgerSnapshot>,
        current: Option<LedgerSnapshot>,
        actor: &str,
        reason: Option<String>,
        timestamp: TimeStamp<Utc>,
    ) -> Self {
        Self {
            entity_id: entity_id.to_string(),
            action,
            previous,
            current,
            actor: actor.to_string(),
            timestamp,
            reason,
            prev_digest: None,
            digest: String::new(),
        }
    }

    /// Links the entry after `prev_digest` and seals it.
    pub fn seal(mut self, prev_digest: Option<String>) -> anyhow::Result<Self> {
        self.prev_digest = prev_digest;
        self.digest = String::new();
        let cbor = minicbor::to_vec(&self)?;
        self.digest = sha256::digest(&cbor);
        Ok(self)
    }

    pub fn verify(&self) -> bool {
        let mut unsealed = self.clone();
        unsealed.digest = String::new();
        match minicbor::to_vec(&unsealed) {
            Ok(cbor) => sha256::digest(&cbor) == self.digest,
            Err(_) => false,
        }
    }
}

/// Checks every entry's digest and that each links to its predecessor.
pub fn verify_chain(entries: &[AuditEntry]) -> bool {
    let mut prev: Option<&str> = None;
    for entry in entries {
        if !entry.verify() || entry.prev_digest.as_deref() != prev {
            return false;
        }
        prev = Some(entry.digest.as_str());
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(action: AuditAction) -> AuditEntry {
        AuditEntry::new(
            "leave_1",
            action,
            None,
            None,
            "hr",
            Some("because".into()),
            TimeStamp::new(),
        )
    }

    #[test]
    fn sealed_chain_verifies() {
        let first = entry(AuditAction::Submit).seal(None).unwrap();
        let second = entry(AuditAction::Approve)
            .seal(Some(first.digest.clone()))
            .unwrap();
        assert!(verify_chain(&[first.clone(), second.clone()]));
        assert!(!verify_chain(&[second, first]));
    }

    #[test]
    fn tampering_breaks_digest() {
        let mut sealed = entry(AuditAction::Override).seal(None).unwrap();
        assert!(sealed.verify());
        sealed.reason = Some("edited".into());
        assert!(!sealed.verify());
    }

    #[test]
    fn memory_notifier_records() {
        let notifier = MemoryNotifier::new();
        notifier
            .notify(&Notification {
                recipient: "emp".into(),
                kind: NotificationKind::Approved,
                title: "t".into(),
                message: "m".into(),
                related_id: None,
            })
            .unwrap();
        assert_eq!(notifier.sent_to("emp").len(), 1);
        assert!(notifier.sent_to("other").is_empty());
    }
}
