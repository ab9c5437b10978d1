//! Leave request lifecycle.
//!
//! A request carries an ordered approval flow, one step per required role. Its status is never
//! stored; [`derive_status`] computes it from the flow, and every transition below returns a
//! [`Transition`] describing the ledger movements and the audit/notification events it causes.
//! Persisting those effects is left to the caller.
use chrono::Utc;
use std::collections::HashSet;
use std::fmt;

use crate::audit::{AuditAction, LeaveEvent, NotificationKind};
use crate::entitlement::LedgerOp;
use crate::error::{LeaveError, LeaveResult, ValidationError};
use crate::types::{DateRange, Days, EmployeeId, LeaveTypeId, RequestId, TimeStamp, cbor_days};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, minicbor::Encode, minicbor::Decode)]
pub enum ApproverRole {
    #[n(0)]
    Manager,
    #[n(1)]
    DepartmentHead,
    #[n(2)]
    Hr,
}

impl fmt::Display for ApproverRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApproverRole::Manager => write!(f, "manager"),
            ApproverRole::DepartmentHead => write!(f, "department head"),
            ApproverRole::Hr => write!(f, "hr"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, minicbor::Encode, minicbor::Decode)]
pub enum StepStatus {
    #[n(0)]
    Pending,
    #[n(1)]
    Approved,
    #[n(2)]
    Rejected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, minicbor::Encode, minicbor::Decode)]
pub enum Decision {
    #[n(0)]
    Approved,
    #[n(1)]
    Rejected,
}

impl From<Decision> for StepStatus {
    fn from(value: Decision) -> Self {
        match value {
            Decision::Approved => StepStatus::Approved,
            Decision::Rejected => StepStatus::Rejected,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, minicbor::Encode, minicbor::Decode)]
pub enum LeaveStatus {
    #[n(0)]
    Pending,
    #[n(1)]
    Approved,
    #[n(2)]
    Rejected,
    #[n(3)]
    Cancelled,
}

impl LeaveStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, LeaveStatus::Pending)
    }
    /// Pending and approved requests hold days on the ledger.
    pub fn holds_balance(&self) -> bool {
        matches!(self, LeaveStatus::Pending | LeaveStatus::Approved)
    }
}

impl fmt::Display for LeaveStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LeaveStatus::Pending => write!(f, "pending"),
            LeaveStatus::Approved => write!(f, "approved"),
            LeaveStatus::Rejected => write!(f, "rejected"),
            LeaveStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, minicbor::Encode, minicbor::Decode)]
pub struct ApprovalStep {
    #[n(0)]
    pub role: ApproverRole,
    #[n(1)]
    pub status: StepStatus,
    #[n(2)]
    pub decided_by: Option<EmployeeId>,
    #[n(3)]
    pub decided_at: Option<TimeStamp<Utc>>,
}

impl ApprovalStep {
    pub fn pending(role: ApproverRole) -> Self {
        Self {
            role,
            status: StepStatus::Pending,
            decided_by: None,
            decided_at: None,
        }
    }

    pub fn decided(role: ApproverRole, decision: Decision, by: &str, at: TimeStamp<Utc>) -> Self {
        Self {
            role,
            status: decision.into(),
            decided_by: Some(by.to_string()),
            decided_at: Some(at),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, minicbor::Encode, minicbor::Decode)]
pub struct OverrideRecord {
    #[n(0)]
    pub hr_admin_id: EmployeeId,
    #[n(1)]
    pub decision: Decision,
    #[n(2)]
    pub justification: String,
    #[n(3)]
    pub at: TimeStamp<Utc>,
}

/// Any rejected step rejects the request; it is approved only once every step is approved.
/// An empty flow is never approved.
pub fn derive_status(flow: &[ApprovalStep]) -> LeaveStatus {
    if flow.iter().any(|s| s.status == StepStatus::Rejected) {
        LeaveStatus::Rejected
    } else if !flow.is_empty() && flow.iter().all(|s| s.status == StepStatus::Approved) {
        LeaveStatus::Approved
    } else {
        LeaveStatus::Pending
    }
}

/// Ledger movements that take a request holding `days` from one resolved state to another.
pub fn ledger_delta(from: LeaveStatus, to: LeaveStatus, days: Days) -> Vec<LedgerOp> {
    use LeaveStatus::*;
    match (from, to) {
        (Pending, Approved) => vec![LedgerOp::Commit(days)],
        (Pending, Rejected) | (Pending, Cancelled) => vec![LedgerOp::Release(days)],
        (Approved, Pending) => vec![LedgerOp::Uncommit(days)],
        (Approved, Rejected) | (Approved, Cancelled) => {
            vec![LedgerOp::Uncommit(days), LedgerOp::Release(days)]
        }
        (Rejected, Pending) | (Cancelled, Pending) => vec![LedgerOp::Reserve(days)],
        (Rejected, Approved) | (Cancelled, Approved) => {
            vec![LedgerOp::Reserve(days), LedgerOp::Commit(days)]
        }
        _ => vec![],
    }
}

/// Effects of one state machine step.
#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    pub from: LeaveStatus,
    pub to: LeaveStatus,
    pub ledger: Vec<LedgerOp>,
    pub events: Vec<LeaveEvent>,
}

impl Transition {
    pub fn is_resolution(&self) -> bool {
        self.from == LeaveStatus::Pending && self.to.is_terminal()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, minicbor::Encode, minicbor::Decode)]
pub struct LeaveRequest {
    #[n(0)]
    pub id: RequestId,
    #[n(1)]
    pub employee_id: EmployeeId,
    #[n(2)]
    pub leave_type_id: LeaveTypeId,
    #[n(3)]
    pub dates: DateRange,
    /// Net working days, holidays and weekends excluded.
    #[n(4)]
    #[cbor(with = "cbor_days")]
    pub duration_days: Days,
    /// Year of the ledger row holding this request's days.
    #[n(5)]
    pub entitlement_year: i32,
    #[n(6)]
    pub justification: Option<String>,
    #[n(7)]
    pub attachment_id: Option<String>,
    #[n(8)]
    pub approval_flow: Vec<ApprovalStep>,
    #[n(9)]
    pub cancelled_at: Option<TimeStamp<Utc>>,
    #[n(10)]
    pub override_record: Option<OverrideRecord>,
    #[n(11)]
    pub irregular_pattern_flag: bool,
    #[n(12)]
    pub escalated_at: Option<TimeStamp<Utc>>,
    #[n(13)]
    pub created_at: TimeStamp<Utc>,
    #[n(14)]
    pub updated_at: TimeStamp<Utc>,
}

/// Everything needed to open a request once validation has passed.
#[derive(Debug, Clone)]
pub struct NewLeaveRequest {
    pub id: RequestId,
    pub employee_id: EmployeeId,
    pub leave_type_id: LeaveTypeId,
    pub dates: DateRange,
    pub duration_days: Days,
    pub entitlement_year: i32,
    pub justification: Option<String>,
    pub attachment_id: Option<String>,
}

impl LeaveRequest {
    /// Opens a pending request with every step of `roles` undecided and reserves its days.
    pub fn submit(
        new: NewLeaveRequest,
        roles: &[ApproverRole],
        at: TimeStamp<Utc>,
    ) -> (Self, Transition) {
        let request = Self {
            id: new.id,
            employee_id: new.employee_id.clone(),
            leave_type_id: new.leave_type_id,
            dates: new.dates,
            duration_days: new.duration_days,
            entitlement_year: new.entitlement_year,
            justification: new.justification,
            attachment_id: new.attachment_id,
            approval_flow: roles.iter().copied().map(ApprovalStep::pending).collect(),
            cancelled_at: None,
            override_record: None,
            irregular_pattern_flag: false,
            escalated_at: None,
            created_at: at.clone(),
            updated_at: at,
        };

        let mut events = vec![LeaveEvent::Audit {
            action: AuditAction::Submit,
            actor: new.employee_id,
            reason: request.justification.clone(),
        }];
        if let Some(role) = request.next_pending_role() {
            events.push(LeaveEvent::NotifyApprovers {
                role,
                kind: NotificationKind::AwaitingApproval,
                title: "Leave request awaiting approval".into(),
                message: format!(
                    "{} requested {} days from {} to {}",
                    request.employee_id, request.duration_days, request.dates.from, request.dates.to
                ),
            });
        }

        let transition = Transition {
            from: LeaveStatus::Pending,
            to: LeaveStatus::Pending,
            ledger: vec![LedgerOp::Reserve(request.duration_days)],
            events,
        };
        (request, transition)
    }

    pub fn status(&self) -> LeaveStatus {
        if self.cancelled_at.is_some() {
            return LeaveStatus::Cancelled;
        }
        derive_status(&self.approval_flow)
    }

    pub fn step(&self, role: ApproverRole) -> Option<&ApprovalStep> {
        self.approval_flow.iter().find(|s| s.role == role)
    }

    pub fn next_pending_role(&self) -> Option<ApproverRole> {
        self.approval_flow
            .iter()
            .find(|s| s.status == StepStatus::Pending)
            .map(|s| s.role)
    }

    fn ensure_pending(&self) -> LeaveResult<()> {
        let status = self.status();
        if status != LeaveStatus::Pending {
            return Err(LeaveError::Conflict(format!(
                "request {} is already {}",
                self.id, status
            )));
        }
        Ok(())
    }

    /// Records one reviewer's decision on the step for `role`.
    ///
    /// A step that is no longer pending is never overwritten; the second of two racing
    /// reviewers gets a conflict.
    pub fn decide_step(
        &mut self,
        role: ApproverRole,
        decided_by: &str,
        decision: Decision,
        at: TimeStamp<Utc>,
        enforce_order: bool,
    ) -> LeaveResult<Transition> {
        self.ensure_pending()?;

        let idx = self
            .approval_flow
            .iter()
            .position(|s| s.role == role)
            .ok_or_else(|| {
                LeaveError::NotFound(format!("request {} has no {} step", self.id, role))
            })?;

        if self.approval_flow[idx].status != StepStatus::Pending {
            return Err(LeaveError::Conflict(format!(
                "{} step of request {} already decided",
                role, self.id
            )));
        }

        if enforce_order {
            if let Some(earlier) = self.approval_flow[..idx]
                .iter()
                .find(|s| s.status != StepStatus::Approved)
            {
                return Err(LeaveError::Conflict(format!(
                    "request {} is awaiting the {} decision",
                    self.id, earlier.role
                )));
            }
        }

        let from = self.status();
        self.approval_flow[idx] = ApprovalStep::decided(role, decision, decided_by, at.clone());
        self.updated_at = at;
        let to = self.status();

        let mut transition = self.resolve(from, to, decided_by, None);
        if to == LeaveStatus::Pending {
            if let Some(next) = self.next_pending_role() {
                transition.events.push(LeaveEvent::NotifyApprovers {
                    role: next,
                    kind: NotificationKind::AwaitingApproval,
                    title: "Leave request awaiting approval".into(),
                    message: format!("{} approved request {}", role, self.id),
                });
            }
        }
        Ok(transition)
    }

    /// Employee withdraws their own still-pending request.
    pub fn cancel(&mut self, employee_id: &str, at: TimeStamp<Utc>) -> LeaveResult<Transition> {
        if self.employee_id != employee_id {
            return Err(LeaveError::Forbidden(format!(
                "only the owner may cancel request {}",
                self.id
            )));
        }
        self.ensure_pending()?;

        self.cancelled_at = Some(at.clone());
        self.updated_at = at;
        Ok(self.resolve(LeaveStatus::Pending, LeaveStatus::Cancelled, employee_id, None))
    }

    /// HR forces the outcome of a pending request. Every step takes the forced decision.
    pub fn apply_override(
        &mut self,
        decision: Decision,
        justification: &str,
        hr_admin_id: &str,
        at: TimeStamp<Utc>,
    ) -> LeaveResult<Transition> {
        if justification.trim().is_empty() {
            return Err(ValidationError::EmptyJustification.into());
        }
        self.ensure_pending()?;

        for step in self.approval_flow.iter_mut() {
            *step = ApprovalStep::decided(step.role, decision, hr_admin_id, at.clone());
        }
        self.override_record = Some(OverrideRecord {
            hr_admin_id: hr_admin_id.to_string(),
            decision,
            justification: justification.to_string(),
            at: at.clone(),
        });
        self.updated_at = at;

        let to = self.status();
        let mut transition =
            self.resolve(LeaveStatus::Pending, to, hr_admin_id, Some(justification.to_string()));
        for event in transition.events.iter_mut() {
            if let LeaveEvent::Audit { action, .. } = event {
                *action = AuditAction::Override;
            }
        }
        Ok(transition)
    }

    /// Privileged replacement of the whole approval flow. The ledger moves by the difference
    /// between the old and new derived status.
    pub fn replace_flow(
        &mut self,
        flow: Vec<ApprovalStep>,
        actor: &str,
        at: TimeStamp<Utc>,
    ) -> LeaveResult<Transition> {
        validate_flow(&flow)?;
        if self.cancelled_at.is_some() {
            return Err(LeaveError::Conflict(format!(
                "request {} was cancelled",
                self.id
            )));
        }
        if self.override_record.is_some() {
            return Err(LeaveError::Conflict(format!(
                "request {} was resolved by override",
                self.id
            )));
        }

        let from = self.status();
        self.approval_flow = flow;
        self.updated_at = at;
        let to = self.status();

        let mut transition = self.resolve(from, to, actor, None);
        // flow replacement is always recorded, even when the status holds
        transition.events.retain(|e| !matches!(e, LeaveEvent::Audit { .. }));
        transition.events.insert(
            0,
            LeaveEvent::Audit {
                action: AuditAction::FlowReplaced,
                actor: actor.to_string(),
                reason: Some(format!("{} -> {}", from, to)),
            },
        );
        Ok(transition)
    }

    /// Edit-in-place of a pending request nobody has decided on yet. The caller has already
    /// revalidated the new dates.
    pub fn amend(
        &mut self,
        employee_id: &str,
        dates: DateRange,
        duration_days: Days,
        justification: Option<String>,
        attachment_id: Option<String>,
        at: TimeStamp<Utc>,
    ) -> LeaveResult<Transition> {
        if self.employee_id != employee_id {
            return Err(LeaveError::Forbidden(format!(
                "only the owner may amend request {}",
                self.id
            )));
        }
        self.ensure_pending()?;
        if self
            .approval_flow
            .iter()
            .any(|s| s.status != StepStatus::Pending)
        {
            return Err(LeaveError::Conflict(format!(
                "request {} has decisions recorded and can no longer be amended",
                self.id
            )));
        }

        let released = self.duration_days;
        self.dates = dates;
        self.duration_days = duration_days;
        if justification.is_some() {
            self.justification = justification;
        }
        if attachment_id.is_some() {
            self.attachment_id = attachment_id;
        }
        self.updated_at = at;

        Ok(Transition {
            from: LeaveStatus::Pending,
            to: LeaveStatus::Pending,
            ledger: vec![LedgerOp::Release(released), LedgerOp::Reserve(duration_days)],
            events: vec![LeaveEvent::Audit {
                action: AuditAction::Amend,
                actor: employee_id.to_string(),
                reason: Some(format!("{} -> {} days", released, duration_days)),
            }],
        })
    }

    /// Marks a stale pending request for expedited attention. Status is untouched.
    pub fn escalate(&mut self, at: TimeStamp<Utc>) -> LeaveResult<Transition> {
        self.ensure_pending()?;
        if self.escalated_at.is_some() {
            return Err(LeaveError::Conflict(format!(
                "request {} already escalated",
                self.id
            )));
        }
        let role = self.next_pending_role().ok_or_else(|| {
            LeaveError::Conflict(format!("request {} has no pending step", self.id))
        })?;
        self.escalated_at = Some(at);

        Ok(Transition {
            from: LeaveStatus::Pending,
            to: LeaveStatus::Pending,
            ledger: vec![],
            events: vec![LeaveEvent::NotifyApprovers {
                role,
                kind: NotificationKind::Escalation,
                title: "Leave request awaiting action".into(),
                message: format!(
                    "Request {} from {} has been pending since {}",
                    self.id,
                    self.employee_id,
                    self.created_at.date()
                ),
            }],
        })
    }

    fn resolve(
        &self,
        from: LeaveStatus,
        to: LeaveStatus,
        actor: &str,
        reason: Option<String>,
    ) -> Transition {
        let ledger = ledger_delta(from, to, self.duration_days);
        let mut events = Vec::new();
        if from != to {
            let (action, kind) = match to {
                LeaveStatus::Approved => (AuditAction::Approve, NotificationKind::Approved),
                LeaveStatus::Rejected => (AuditAction::Reject, NotificationKind::Rejected),
                LeaveStatus::Cancelled => (AuditAction::Cancel, NotificationKind::Cancelled),
                LeaveStatus::Pending => (AuditAction::Reopen, NotificationKind::Reopened),
            };
            events.push(LeaveEvent::Audit {
                action,
                actor: actor.to_string(),
                reason,
            });
            events.push(LeaveEvent::NotifyEmployee {
                kind,
                title: format!("Leave request {}", to),
                message: format!(
                    "Your leave from {} to {} is now {}",
                    self.dates.from, self.dates.to, to
                ),
            });
        }
        Transition {
            from,
            to,
            ledger,
            events,
        }
    }
}

/// Rejects flows the engine could not reason about.
pub fn validate_flow(flow: &[ApprovalStep]) -> Result<(), ValidationError> {
    if flow.is_empty() {
        return Err(ValidationError::MalformedFlow("flow has no steps".into()));
    }
    let mut seen = HashSet::new();
    for step in flow {
        if !seen.insert(step.role) {
            return Err(ValidationError::MalformedFlow(format!(
                "duplicate {} step",
                step.role
            )));
        }
        let decided = step.status != StepStatus::Pending;
        if decided && (step.decided_by.is_none() || step.decided_at.is_none()) {
            return Err(ValidationError::MalformedFlow(format!(
                "{} step is decided but has no decider",
                step.role
            )));
        }
        if !decided && (step.decided_by.is_some() || step.decided_at.is_some()) {
            return Err(ValidationError::MalformedFlow(format!(
                "{} step is pending but carries a decision",
                step.role
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;

    const FLOW: [ApproverRole; 2] = [ApproverRole::Manager, ApproverRole::Hr];

    fn pending_request() -> LeaveRequest {
        let d = |day| NaiveDate::from_ymd_opt(2025, 6, day).unwrap();
        let (request, _) = LeaveRequest::submit(
            NewLeaveRequest {
                id: "leave_test".into(),
                employee_id: "emp".into(),
                leave_type_id: "annual".into(),
                dates: DateRange::new(d(2), d(6)),
                duration_days: dec!(5),
                entitlement_year: 2025,
                justification: None,
                attachment_id: None,
            },
            &FLOW,
            TimeStamp::new(),
        );
        request
    }

    #[test]
    fn submit_reserves_and_starts_pending() {
        let request = pending_request();
        assert_eq!(request.status(), LeaveStatus::Pending);
        assert_eq!(request.approval_flow.len(), 2);
        assert_eq!(request.next_pending_role(), Some(ApproverRole::Manager));
    }

    #[test]
    fn both_approvals_commit() {
        let mut r = pending_request();
        let t = r
            .decide_step(ApproverRole::Manager, "mgr", Decision::Approved, TimeStamp::new(), true)
            .unwrap();
        assert_eq!(t.to, LeaveStatus::Pending);
        assert!(t.ledger.is_empty());

        let t = r
            .decide_step(ApproverRole::Hr, "hr", Decision::Approved, TimeStamp::new(), true)
            .unwrap();
        assert_eq!(t.to, LeaveStatus::Approved);
        assert_eq!(t.ledger, vec![LedgerOp::Commit(dec!(5))]);
        assert!(t.is_resolution());
    }

    #[test]
    fn manager_rejection_is_terminal() {
        let mut r = pending_request();
        let t = r
            .decide_step(ApproverRole::Manager, "mgr", Decision::Rejected, TimeStamp::new(), true)
            .unwrap();
        assert_eq!(t.to, LeaveStatus::Rejected);
        assert_eq!(t.ledger, vec![LedgerOp::Release(dec!(5))]);

        let err = r
            .decide_step(ApproverRole::Hr, "hr", Decision::Approved, TimeStamp::new(), true)
            .unwrap_err();
        assert!(err.is_conflict());
    }

    #[test]
    fn step_order_is_enforced() {
        let mut r = pending_request();
        let err = r
            .decide_step(ApproverRole::Hr, "hr", Decision::Approved, TimeStamp::new(), true)
            .unwrap_err();
        assert!(err.is_conflict());
        assert!(
            r.decide_step(ApproverRole::Hr, "hr", Decision::Approved, TimeStamp::new(), false)
                .is_ok()
        );
    }

    #[test]
    fn deciding_twice_conflicts() {
        let mut r = pending_request();
        r.decide_step(ApproverRole::Manager, "mgr", Decision::Approved, TimeStamp::new(), true)
            .unwrap();
        let err = r
            .decide_step(ApproverRole::Manager, "mgr2", Decision::Rejected, TimeStamp::new(), true)
            .unwrap_err();
        assert!(err.is_conflict());
        assert_eq!(r.step(ApproverRole::Manager).unwrap().decided_by.as_deref(), Some("mgr"));
    }

    #[test]
    fn only_owner_cancels() {
        let mut r = pending_request();
        assert!(matches!(
            r.cancel("someone", TimeStamp::new()),
            Err(LeaveError::Forbidden(_))
        ));
        let t = r.cancel("emp", TimeStamp::new()).unwrap();
        assert_eq!(t.to, LeaveStatus::Cancelled);
        assert_eq!(t.ledger, vec![LedgerOp::Release(dec!(5))]);
        assert!(r.cancel("emp", TimeStamp::new()).unwrap_err().is_conflict());
    }

    #[test]
    fn override_needs_justification() {
        let mut r = pending_request();
        let before = r.clone();
        let err = r
            .apply_override(Decision::Approved, "  ", "hr", TimeStamp::new())
            .unwrap_err();
        assert!(matches!(
            err,
            LeaveError::Validation(ValidationError::EmptyJustification)
        ));
        assert_eq!(r, before);

        let t = r
            .apply_override(Decision::Approved, "urgent family matter", "hr", TimeStamp::new())
            .unwrap();
        assert_eq!(t.to, LeaveStatus::Approved);
        assert!(t.events.iter().any(|e| matches!(
            e,
            LeaveEvent::Audit {
                action: AuditAction::Override,
                ..
            }
        )));
        assert!(r
            .apply_override(Decision::Rejected, "changed mind", "hr", TimeStamp::new())
            .unwrap_err()
            .is_conflict());
    }

    #[test]
    fn replacing_flow_reverses_approval() {
        let mut r = pending_request();
        r.decide_step(ApproverRole::Manager, "mgr", Decision::Approved, TimeStamp::new(), true)
            .unwrap();
        r.decide_step(ApproverRole::Hr, "hr", Decision::Approved, TimeStamp::new(), true)
            .unwrap();

        let flow = vec![
            ApprovalStep::decided(ApproverRole::Manager, Decision::Approved, "mgr", TimeStamp::new()),
            ApprovalStep::decided(ApproverRole::Hr, Decision::Rejected, "hr", TimeStamp::new()),
        ];
        let t = r.replace_flow(flow, "hr", TimeStamp::new()).unwrap();
        assert_eq!(t.from, LeaveStatus::Approved);
        assert_eq!(t.to, LeaveStatus::Rejected);
        assert_eq!(
            t.ledger,
            vec![LedgerOp::Uncommit(dec!(5)), LedgerOp::Release(dec!(5))]
        );
    }

    #[test]
    fn malformed_flows_are_rejected() {
        assert!(validate_flow(&[]).is_err());
        let dup = [
            ApprovalStep::pending(ApproverRole::Hr),
            ApprovalStep::pending(ApproverRole::Hr),
        ];
        assert!(validate_flow(&dup).is_err());
        let undecided = [ApprovalStep {
            role: ApproverRole::Manager,
            status: StepStatus::Approved,
            decided_by: None,
            decided_at: None,
        }];
        assert!(validate_flow(&undecided).is_err());
    }

    #[test]
    fn amend_swaps_reservation() {
        let mut r = pending_request();
        let d = |day| NaiveDate::from_ymd_opt(2025, 6, day).unwrap();
        let t = r
            .amend("emp", DateRange::new(d(2), d(3)), dec!(2), None, None, TimeStamp::new())
            .unwrap();
        assert_eq!(
            t.ledger,
            vec![LedgerOp::Release(dec!(5)), LedgerOp::Reserve(dec!(2))]
        );
        assert_eq!(r.duration_days, dec!(2));
    }
}
