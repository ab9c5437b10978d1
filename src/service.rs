//! Service layer API for leave request and balance operations
use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use sled::Transactional;
use sled::transaction::TransactionalTree;
use std::sync::Arc;

use crate::audit::{AuditAction, AuditEntry, LeaveEvent, Notification, Notifier, TracingNotifier};
use crate::calendar::Calendar;
use crate::clock::{Clock, SystemClock};
use crate::config::EngineConfig;
use crate::directory::OrgDirectory;
use crate::entitlement::{
    AdjustmentType, BalanceSummary, LeaveAdjustment, LeaveEntitlement, entitlement_key,
};
use crate::error::{LeaveError, LeaveResult, ValidationError};
use crate::policy::LeavePolicy;
use crate::request::{
    ApprovalStep, ApproverRole, Decision, LeaveRequest, NewLeaveRequest, Transition,
    derive_status,
};
use crate::store::{
    Store, TxResult, abort, adjustment_key, employee_index_key, tx_advance_version,
    tx_append_audit, tx_get, tx_put,
};
use crate::types::{DateRange, Days, EmployeeId, LeaveTypeId, TimeStamp, new_id};
use crate::validation::{LeaveApplication, Validator};

#[derive(Debug, Clone)]
pub struct SubmitLeaveRequest {
    pub employee_id: EmployeeId,
    pub leave_type_id: LeaveTypeId,
    pub from: NaiveDate,
    pub to: NaiveDate,
    pub justification: Option<String>,
    pub attachment_id: Option<String>,
    /// HR user filing through the override path, allowed to cover blocked periods.
    pub hr_override_by: Option<EmployeeId>,
}

impl SubmitLeaveRequest {
    pub fn new(employee_id: &str, leave_type_id: &str, from: NaiveDate, to: NaiveDate) -> Self {
        Self {
            employee_id: employee_id.to_string(),
            leave_type_id: leave_type_id.to_string(),
            from,
            to,
            justification: None,
            attachment_id: None,
            hr_override_by: None,
        }
    }
    pub fn set_justification(mut self, justification: &str) -> Self {
        self.justification = Some(justification.to_string());
        self
    }
    pub fn set_attachment(mut self, attachment_id: &str) -> Self {
        self.attachment_id = Some(attachment_id.to_string());
        self
    }
    pub fn set_hr_override(mut self, hr_user_id: &str) -> Self {
        self.hr_override_by = Some(hr_user_id.to_string());
        self
    }
}

#[derive(Debug, Clone)]
pub struct AmendLeaveRequest {
    pub from: NaiveDate,
    pub to: NaiveDate,
    pub justification: Option<String>,
    pub attachment_id: Option<String>,
}

#[derive(Debug, Clone)]
pub struct AdjustmentRequest {
    pub employee_id: EmployeeId,
    pub leave_type_id: LeaveTypeId,
    pub year: i32,
    pub adjustment_type: AdjustmentType,
    pub amount: Days,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchFailure {
    pub id: String,
    pub reason: String,
}

/// Outcome of a job that processes items independently.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchSummary {
    pub success_count: usize,
    pub failed_count: usize,
    pub failures: Vec<BatchFailure>,
}

impl BatchSummary {
    pub fn succeeded(&mut self) {
        self.success_count += 1;
    }
    pub fn failed(&mut self, id: &str, err: &LeaveError) {
        tracing::warn!(id, error = %err, "batch item failed");
        self.failed_count += 1;
        self.failures.push(BatchFailure {
            id: id.to_string(),
            reason: err.to_string(),
        });
    }
    pub fn merge(&mut self, other: BatchSummary) {
        self.success_count += other.success_count;
        self.failed_count += other.failed_count;
        self.failures.extend(other.failures);
    }
}

pub struct LeaveService {
    pub(crate) store: Store,
    pub(crate) directory: Arc<dyn OrgDirectory>,
    pub(crate) notifier: Arc<dyn Notifier>,
    pub(crate) clock: Arc<dyn Clock>,
    pub(crate) config: EngineConfig,
}

impl LeaveService {
    pub fn new(instance: Arc<sled::Db>, directory: Arc<dyn OrgDirectory>) -> LeaveResult<Self> {
        Ok(Self {
            store: Store::open(instance)?,
            directory,
            notifier: Arc::new(TracingNotifier),
            clock: Arc::new(SystemClock),
            config: EngineConfig::default(),
        })
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub(crate) fn now(&self) -> TimeStamp<Utc> {
        self.clock.now().into()
    }

    fn require_hr(&self, user: &str) -> LeaveResult<()> {
        if !self.directory.has_hr_role(user) {
            return Err(LeaveError::Forbidden(format!("{} does not hold the HR role", user)));
        }
        Ok(())
    }

    fn load_request(&self, request_id: &str) -> LeaveResult<LeaveRequest> {
        self.store
            .get_request(request_id)?
            .ok_or_else(|| LeaveError::NotFound(format!("leave request {}", request_id)))
    }

    /// Validate, persist and reserve a new request.
    pub fn submit_leave_request(&self, submission: SubmitLeaveRequest) -> LeaveResult<LeaveRequest> {
        if let Some(hr) = &submission.hr_override_by {
            self.require_hr(hr)?;
        }
        let application = LeaveApplication {
            employee_id: submission.employee_id.clone(),
            leave_type_id: submission.leave_type_id.clone(),
            dates: DateRange::new(submission.from, submission.to),
            attachment_present: submission.attachment_id.is_some(),
            exclude_request_id: None,
            allow_blocked_period: submission.hr_override_by.is_some(),
        };

        for _ in 0..STALE_RETRIES {
            let validated = Validator::new(&self.store, self.directory.as_ref(), &self.config)
                .validate(&application, self.clock.today())?;

            let now = self.now();
            let (request, transition) = LeaveRequest::submit(
                NewLeaveRequest {
                    id: new_id("leave_")?,
                    employee_id: submission.employee_id.clone(),
                    leave_type_id: submission.leave_type_id.clone(),
                    dates: application.dates,
                    duration_days: validated.duration_days,
                    entitlement_year: validated.year,
                    justification: submission.justification.clone(),
                    attachment_id: submission.attachment_id.clone(),
                },
                &self.config.approval_flow,
                now.clone(),
            );

            let store = &self.store;
            let committed = (
                &store.requests,
                &store.requests_by_employee,
                &store.employee_versions,
                &store.entitlements,
                &store.audit,
            )
                .transaction(|(requests, by_employee, versions, ledger, audit)| -> TxResult<bool> {
                    if !tx_advance_version(versions, &request.employee_id, validated.employee_version)? {
                        return Ok(false);
                    }
                    // reservation re-checks the balance inside the transaction
                    apply_effects(ledger, audit, &request, &transition, &now)?;
                    tx_put(requests, request.id.as_bytes(), &request)?;
                    by_employee.insert(
                        employee_index_key(&request.employee_id, &request.id),
                        Vec::<u8>::new(),
                    )?;
                    Ok(true)
                })?;
            if !committed {
                tracing::debug!(employee = %application.employee_id, "requests changed during validation, revalidating");
                continue;
            }

            tracing::info!(
                request_id = %request.id,
                employee = %request.employee_id,
                leave_type = %request.leave_type_id,
                days = %request.duration_days,
                "leave request submitted"
            );
            self.deliver(&request, &transition.events);
            return Ok(request);
        }
        Err(stale(&application.employee_id))
    }

    /// Load a request, run `mutate` on it and persist the request, ledger movement and audit
    /// entries atomically. Notifications go out after the commit.
    pub(crate) fn transition<F>(&self, request_id: &str, mutate: F) -> LeaveResult<LeaveRequest>
    where
        F: Fn(&mut LeaveRequest) -> LeaveResult<Transition>,
    {
        self.guarded_transition(request_id, None, mutate)?
            .ok_or_else(|| LeaveError::Conflict(format!("leave request {} changed concurrently", request_id)))
    }

    /// Like [`Self::transition`], but when `guard` carries the employee version the caller
    /// validated against, commits only if that version still holds. `Ok(None)` means it moved
    /// and the caller should revalidate. A transition that puts days back on hold is only
    /// accepted under a guard.
    fn guarded_transition<F>(
        &self,
        request_id: &str,
        guard: Option<(&str, u64)>,
        mutate: F,
    ) -> LeaveResult<Option<LeaveRequest>>
    where
        F: Fn(&mut LeaveRequest) -> LeaveResult<Transition>,
    {
        let now = self.now();
        let store = &self.store;
        let committed = (
            &store.requests,
            &store.employee_versions,
            &store.entitlements,
            &store.audit,
        )
            .transaction(
                |(requests, versions, ledger, audit)| -> TxResult<Option<(LeaveRequest, Transition)>> {
                    let mut request: LeaveRequest = match tx_get(requests, request_id.as_bytes())? {
                        Some(request) => request,
                        None => {
                            return abort(LeaveError::NotFound(format!("leave request {}", request_id)));
                        }
                    };
                    if let Some((employee_id, seen)) = guard {
                        if !tx_advance_version(versions, employee_id, seen)? {
                            return Ok(None);
                        }
                    }
                    let transition = match mutate(&mut request) {
                        Ok(t) => t,
                        Err(e) => return abort(e),
                    };
                    if guard.is_none() && !transition.from.holds_balance() && transition.to.holds_balance() {
                        return Ok(None);
                    }
                    apply_effects(ledger, audit, &request, &transition, &now)?;
                    tx_put(requests, request.id.as_bytes(), &request)?;
                    Ok(Some((request, transition)))
                },
            )?;
        let Some((request, transition)) = committed else {
            return Ok(None);
        };

        if transition.from != transition.to {
            tracing::info!(
                request_id = %request.id,
                from = %transition.from,
                to = %transition.to,
                "leave request transitioned"
            );
        }
        self.deliver(&request, &transition.events);
        Ok(Some(request))
    }

    /// Best effort: delivery failures are logged and never surface.
    fn deliver(&self, request: &LeaveRequest, events: &[LeaveEvent]) {
        for event in events {
            let notifications: Vec<Notification> = match event {
                LeaveEvent::Audit { .. } => continue,
                LeaveEvent::NotifyEmployee {
                    kind,
                    title,
                    message,
                } => vec![Notification {
                    recipient: request.employee_id.clone(),
                    kind: *kind,
                    title: title.clone(),
                    message: message.clone(),
                    related_id: Some(request.id.clone()),
                }],
                LeaveEvent::NotifyApprovers {
                    role,
                    kind,
                    title,
                    message,
                } => self
                    .directory
                    .approvers_for(*role, &request.employee_id)
                    .into_iter()
                    .map(|recipient| Notification {
                        recipient,
                        kind: *kind,
                        title: title.clone(),
                        message: message.clone(),
                        related_id: Some(request.id.clone()),
                    })
                    .collect(),
            };
            for notification in notifications {
                if let Err(e) = self.notifier.notify(&notification) {
                    tracing::warn!(
                        request_id = %request.id,
                        recipient = %notification.recipient,
                        error = %e,
                        "failed to deliver notification"
                    );
                }
            }
        }
    }

    pub fn decide_approval_step(
        &self,
        request_id: &str,
        role: ApproverRole,
        acting_user_id: &str,
        decision: Decision,
    ) -> LeaveResult<LeaveRequest> {
        let current = self.load_request(request_id)?;
        if !self
            .directory
            .can_decide(role, acting_user_id, &current.employee_id)
        {
            return Err(LeaveError::Forbidden(format!(
                "{} may not decide the {} step of request {}",
                acting_user_id, role, request_id
            )));
        }
        let at = self.now();
        let enforce = self.config.enforce_step_order;
        self.transition(request_id, |r| {
            r.decide_step(role, acting_user_id, decision, at.clone(), enforce)
        })
    }

    pub fn cancel_request(&self, request_id: &str, employee_id: &str) -> LeaveResult<LeaveRequest> {
        let at = self.now();
        self.transition(request_id, |r| r.cancel(employee_id, at.clone()))
    }

    pub fn override_request(
        &self,
        request_id: &str,
        decision: Decision,
        justification: &str,
        acting_hr_user_id: &str,
    ) -> LeaveResult<LeaveRequest> {
        if justification.trim().is_empty() {
            return Err(ValidationError::EmptyJustification.into());
        }
        self.require_hr(acting_hr_user_id)?;
        let at = self.now();
        self.transition(request_id, |r| {
            r.apply_override(decision, justification, acting_hr_user_id, at.clone())
        })
    }

    /// Applies the HR decision to each id on its own. One failure never rolls back another.
    pub fn bulk_update(
        &self,
        request_ids: &[String],
        decision: Decision,
        acting_user_id: &str,
    ) -> BatchSummary {
        let mut summary = BatchSummary::default();
        for id in request_ids {
            match self.decide_approval_step(id, ApproverRole::Hr, acting_user_id, decision) {
                Ok(_) => summary.succeeded(),
                Err(e) => summary.failed(id, &e),
            }
        }
        summary
    }

    pub fn update_approval_flow(
        &self,
        request_id: &str,
        new_flow: Vec<ApprovalStep>,
        acting_user_id: &str,
    ) -> LeaveResult<LeaveRequest> {
        self.require_hr(acting_user_id)?;
        crate::request::validate_flow(&new_flow)?;
        let at = self.now();
        let reactivates = derive_status(&new_flow).holds_balance();
        for _ in 0..STALE_RETRIES {
            let current = self.load_request(request_id)?;
            // days released by a rejection may have been claimed since
            let locked = current.cancelled_at.is_some() || current.override_record.is_some();
            let guard = if reactivates && !locked && !current.status().holds_balance() {
                let version = self.store.employee_version(&current.employee_id)?;
                Validator::new(&self.store, self.directory.as_ref(), &self.config).check_overlap(
                    &current.employee_id,
                    &current.dates,
                    Some(&current.id),
                )?;
                Some(version)
            } else {
                None
            };
            let replaced = self.guarded_transition(
                request_id,
                guard.map(|version| (current.employee_id.as_str(), version)),
                |r| r.replace_flow(new_flow.clone(), acting_user_id, at.clone()),
            )?;
            if let Some(request) = replaced {
                return Ok(request);
            }
        }
        Err(stale(request_id))
    }

    /// Edit the dates of a pending request nobody has decided on yet.
    pub fn amend_request(
        &self,
        request_id: &str,
        employee_id: &str,
        amendment: AmendLeaveRequest,
    ) -> LeaveResult<LeaveRequest> {
        let current = self.load_request(request_id)?;
        if current.employee_id != employee_id {
            return Err(LeaveError::Forbidden(format!(
                "only the owner may amend request {}",
                request_id
            )));
        }
        let application = LeaveApplication {
            employee_id: employee_id.to_string(),
            leave_type_id: current.leave_type_id.clone(),
            dates: DateRange::new(amendment.from, amendment.to),
            attachment_present: amendment.attachment_id.is_some() || current.attachment_id.is_some(),
            exclude_request_id: Some(current.id.clone()),
            allow_blocked_period: false,
        };
        let at = self.now();
        for _ in 0..STALE_RETRIES {
            let validated = Validator::new(&self.store, self.directory.as_ref(), &self.config)
                .validate(&application, self.clock.today())?;
            if validated.year != current.entitlement_year {
                return Err(ValidationError::CrossesYearBoundary.into());
            }
            let amended = self.guarded_transition(
                request_id,
                Some((employee_id, validated.employee_version)),
                |r| {
                    r.amend(
                        employee_id,
                        application.dates,
                        validated.duration_days,
                        amendment.justification.clone(),
                        amendment.attachment_id.clone(),
                        at.clone(),
                    )
                },
            )?;
            if let Some(request) = amended {
                return Ok(request);
            }
        }
        Err(stale(employee_id))
    }

    /// Reviewers mark a request whose pattern looks unusual. Status is unaffected.
    pub fn flag_irregular_pattern(
        &self,
        request_id: &str,
        reviewer_id: &str,
        flag: bool,
    ) -> LeaveResult<LeaveRequest> {
        let current = self.load_request(request_id)?;
        let authorized = self.directory.has_hr_role(reviewer_id)
            || current
                .approval_flow
                .iter()
                .any(|s| self.directory.can_decide(s.role, reviewer_id, &current.employee_id));
        if !authorized {
            return Err(LeaveError::Forbidden(format!(
                "{} does not review request {}",
                reviewer_id, request_id
            )));
        }
        let at = self.now();
        self.transition(request_id, |r| {
            r.irregular_pattern_flag = flag;
            r.updated_at = at.clone();
            let status = r.status();
            Ok(Transition {
                from: status,
                to: status,
                ledger: vec![],
                events: vec![],
            })
        })
    }

    pub fn get_request(&self, request_id: &str) -> LeaveResult<LeaveRequest> {
        self.load_request(request_id)
    }

    pub fn list_requests_for_employee(&self, employee_id: &str) -> LeaveResult<Vec<LeaveRequest>> {
        let mut requests = self.store.requests_for_employee(employee_id)?;
        requests.sort_by(|a, b| a.dates.from.cmp(&b.dates.from));
        Ok(requests)
    }

    /// Balance for the current year.
    pub fn get_balance_summary(
        &self,
        employee_id: &str,
        leave_type_id: &str,
    ) -> LeaveResult<BalanceSummary> {
        let year = chrono::Datelike::year(&self.clock.today());
        self.get_entitlement(employee_id, leave_type_id, year)
            .map(|e| e.snapshot())
    }

    pub fn get_entitlement(
        &self,
        employee_id: &str,
        leave_type_id: &str,
        year: i32,
    ) -> LeaveResult<LeaveEntitlement> {
        self.store
            .get_entitlement(employee_id, leave_type_id, year)?
            .ok_or_else(|| {
                LeaveError::NotFound(format!(
                    "entitlement {}",
                    entitlement_key(employee_id, leave_type_id, year)
                ))
            })
    }

    /// Creates the ledger row or sets a new yearly grant on an existing one.
    pub fn grant_entitlement(
        &self,
        employee_id: &str,
        leave_type_id: &str,
        year: i32,
        yearly_entitlement: Days,
        acting_hr_user_id: &str,
    ) -> LeaveResult<LeaveEntitlement> {
        self.require_hr(acting_hr_user_id)?;
        if yearly_entitlement < Decimal::ZERO {
            return Err(ValidationError::NonPositiveAmount.into());
        }
        let key = entitlement_key(employee_id, leave_type_id, year);
        let now = self.now();
        let store = &self.store;
        let row = (&store.entitlements, &store.audit).transaction(
            |(ledger, audit)| -> TxResult<LeaveEntitlement> {
                let existing: Option<LeaveEntitlement> = tx_get(ledger, key.as_bytes())?;
                let previous = existing.as_ref().map(|e| e.snapshot());
                let mut row = existing.unwrap_or_else(|| {
                    LeaveEntitlement::new(employee_id, leave_type_id, year, Decimal::ZERO)
                });
                row.yearly_entitlement = yearly_entitlement;
                if row.remaining() < Decimal::ZERO {
                    return abort(LeaveError::LedgerInvariant(format!(
                        "grant of {} days is below the {} days already taken or pending",
                        yearly_entitlement,
                        row.taken + row.pending
                    )));
                }
                tx_put(ledger, key.as_bytes(), &row)?;
                tx_append_audit(
                    audit,
                    AuditEntry::new(
                        &key,
                        AuditAction::Grant,
                        previous,
                        Some(row.snapshot()),
                        acting_hr_user_id,
                        None,
                        now.clone(),
                    ),
                )?;
                Ok(row)
            },
        )?;
        tracing::info!(
            entitlement = %key,
            days = %yearly_entitlement,
            by = acting_hr_user_id,
            "entitlement granted"
        );
        Ok(row)
    }

    /// Manual HR correction of a ledger row. Appends a [`LeaveAdjustment`].
    pub fn apply_adjustment(
        &self,
        input: AdjustmentRequest,
        acting_hr_user_id: &str,
    ) -> LeaveResult<LeaveAdjustment> {
        self.require_hr(acting_hr_user_id)?;
        if input.reason.trim().is_empty() {
            return Err(ValidationError::EmptyReason.into());
        }
        if input.amount <= Decimal::ZERO {
            return Err(ValidationError::NonPositiveAmount.into());
        }

        let adjustment = LeaveAdjustment {
            id: new_id("adj_")?,
            employee_id: input.employee_id,
            leave_type_id: input.leave_type_id,
            year: input.year,
            adjustment_type: input.adjustment_type,
            amount: input.amount,
            reason: input.reason,
            acting_hr_user_id: acting_hr_user_id.to_string(),
            timestamp: self.now(),
        };
        let key = entitlement_key(&adjustment.employee_id, &adjustment.leave_type_id, adjustment.year);
        let record_key = adjustment_key(&adjustment.employee_id, &adjustment.id);

        let store = &self.store;
        (&store.entitlements, &store.adjustments, &store.audit).transaction(
            |(ledger, adjustments, audit)| -> TxResult<()> {
                let mut row: LeaveEntitlement = match tx_get(ledger, key.as_bytes())? {
                    Some(row) => row,
                    None => return abort(LeaveError::NotFound(format!("entitlement {}", key))),
                };
                let previous = row.snapshot();
                if let Err(e) = row.apply_adjustment(adjustment.adjustment_type, adjustment.amount) {
                    return abort(e);
                }
                tx_put(ledger, key.as_bytes(), &row)?;
                tx_put(adjustments, &record_key, &adjustment)?;
                tx_append_audit(
                    audit,
                    AuditEntry::new(
                        &key,
                        AuditAction::Adjustment,
                        Some(previous),
                        Some(row.snapshot()),
                        acting_hr_user_id,
                        Some(adjustment.reason.clone()),
                        adjustment.timestamp.clone(),
                    ),
                )?;
                Ok(())
            },
        )?;

        tracing::info!(
            entitlement = %key,
            kind = ?adjustment.adjustment_type,
            amount = %adjustment.amount,
            by = acting_hr_user_id,
            "ledger adjusted"
        );
        Ok(adjustment)
    }

    pub fn list_adjustments(&self, employee_id: &str) -> LeaveResult<Vec<LeaveAdjustment>> {
        self.store.adjustments_for(employee_id)
    }

    pub fn audit_trail(&self, entity_id: &str) -> LeaveResult<Vec<AuditEntry>> {
        self.store.audit_trail(entity_id)
    }

    pub fn put_calendar(&self, calendar: &Calendar) -> LeaveResult<()> {
        self.store.put_calendar(calendar)
    }

    pub fn get_calendar(&self, year: i32) -> LeaveResult<Option<Calendar>> {
        self.store.get_calendar(year)
    }

    pub fn put_policy(&self, policy: &LeavePolicy) -> LeaveResult<()> {
        self.store.put_policy(policy)
    }

    pub fn get_policy(&self, leave_type_id: &str) -> LeaveResult<Option<LeavePolicy>> {
        self.store.get_policy(leave_type_id)
    }
}

/// Attempts at validate-then-commit before giving up. Each retry means another write for the
/// same employee committed in between.
const STALE_RETRIES: usize = 16;

fn stale(id: &str) -> LeaveError {
    LeaveError::Conflict(format!("{} kept changing during validation, try again", id))
}

/// Applies the ledger movement of `transition` to the request's ledger row and writes one
/// audit entry per audit event, all inside the caller's transaction.
fn apply_effects(
    ledger: &TransactionalTree,
    audit: &TransactionalTree,
    request: &LeaveRequest,
    transition: &Transition,
    at: &TimeStamp<Utc>,
) -> TxResult<()> {
    let has_audit = transition
        .events
        .iter()
        .any(|e| matches!(e, LeaveEvent::Audit { .. }));
    if transition.ledger.is_empty() && !has_audit {
        return Ok(());
    }

    let key = entitlement_key(
        &request.employee_id,
        &request.leave_type_id,
        request.entitlement_year,
    );
    let mut row: Option<LeaveEntitlement> = tx_get(ledger, key.as_bytes())?;
    let previous = row.as_ref().map(|r| r.snapshot());

    if !transition.ledger.is_empty() {
        let Some(row) = row.as_mut() else {
            return abort(ValidationError::NoEntitlement {
                leave_type_id: request.leave_type_id.clone(),
                year: request.entitlement_year,
            });
        };
        if let Err(e) = row.apply_all(&transition.ledger) {
            return abort(e);
        }
        tx_put(ledger, key.as_bytes(), &*row)?;
    }

    let current = row.as_ref().map(|r| r.snapshot());
    for event in &transition.events {
        if let LeaveEvent::Audit {
            action,
            actor,
            reason,
        } = event
        {
            tx_append_audit(
                audit,
                AuditEntry::new(
                    &request.id,
                    *action,
                    previous.clone(),
                    current.clone(),
                    actor,
                    reason.clone(),
                    at.clone(),
                ),
            )?;
        }
    }
    Ok(())
}
