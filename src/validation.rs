//! Pre-submission checks. Nothing here mutates state.
use chrono::{Datelike, NaiveDate};
use rust_decimal::Decimal;

use crate::calendar::{WorkingDays, working_days};
use crate::config::EngineConfig;
use crate::directory::OrgDirectory;
use crate::error::{LeaveError, LeaveResult, ValidationError};
use crate::policy::{Eligibility, LeavePolicy};
use crate::request::LeaveStatus;
use crate::store::Store;
use crate::types::{DateRange, Days, EmployeeId, LeaveTypeId, RequestId};

#[derive(Debug, Clone)]
pub struct LeaveApplication {
    pub employee_id: EmployeeId,
    pub leave_type_id: LeaveTypeId,
    pub dates: DateRange,
    pub attachment_present: bool,
    /// Request being edited in place; its own dates and days are ignored.
    pub exclude_request_id: Option<RequestId>,
    /// Only honoured for HR acting through the override path.
    pub allow_blocked_period: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedLeave {
    pub duration_days: Days,
    pub year: i32,
    pub working_days: WorkingDays,
    pub policy: LeavePolicy,
    /// Employee request version read before the overlap scan.
    pub employee_version: u64,
}

pub struct Validator<'a> {
    store: &'a Store,
    directory: &'a dyn OrgDirectory,
    config: &'a EngineConfig,
}

impl<'a> Validator<'a> {
    pub fn new(store: &'a Store, directory: &'a dyn OrgDirectory, config: &'a EngineConfig) -> Self {
        Self {
            store,
            directory,
            config,
        }
    }

    /// Runs every check in order and stops at the first failure.
    pub fn validate(&self, app: &LeaveApplication, today: NaiveDate) -> LeaveResult<ValidatedLeave> {
        // 1. range
        if !app.dates.is_sane() {
            return Err(ValidationError::InvalidDates.into());
        }
        if app.dates.from.year() != app.dates.to.year() {
            return Err(ValidationError::CrossesYearBoundary.into());
        }
        let year = app.dates.from.year();
        let calendar = self.store.get_calendar(year)?;
        if calendar.is_none() {
            tracing::debug!(year, "no calendar for year, holidays not excluded");
        }

        // 2. overlap
        let employee_version = self.store.employee_version(&app.employee_id)?;
        self.check_overlap(&app.employee_id, &app.dates, app.exclude_request_id.as_deref())?;
        let excluded_days = match app.exclude_request_id.as_deref() {
            Some(id) => self
                .store
                .get_request(id)?
                .filter(|other| {
                    other.status() == LeaveStatus::Pending
                        && other.leave_type_id == app.leave_type_id
                        && other.entitlement_year == year
                })
                .map_or(Decimal::ZERO, |other| other.duration_days),
            None => Decimal::ZERO,
        };

        // 3. blocked periods and working days
        if let Some(period) = calendar.as_ref().and_then(|c| c.blocking(&app.dates)) {
            if !app.allow_blocked_period {
                return Err(ValidationError::BlockedPeriod(period.reason.clone()).into());
            }
        }
        let working = working_days(&app.dates, calendar.as_ref(), &self.config.weekend);

        // 4. duration
        let duration_days = Decimal::from(working.net);
        if duration_days <= Decimal::ZERO {
            return Err(ValidationError::ZeroDuration.into());
        }

        // 5. balance
        let entitlement = self
            .store
            .get_entitlement(&app.employee_id, &app.leave_type_id, year)?
            .ok_or_else(|| ValidationError::NoEntitlement {
                leave_type_id: app.leave_type_id.clone(),
                year,
            })?;
        let available = entitlement.remaining() + excluded_days;
        if available < duration_days {
            return Err(LeaveError::InsufficientBalance {
                requested: duration_days,
                remaining: available,
            });
        }

        // 6. policy
        let policy = self
            .store
            .get_policy(&app.leave_type_id)?
            .ok_or_else(|| LeaveError::PolicyMissing(app.leave_type_id.clone()))?;
        let notice = (app.dates.from - today).num_days();
        if notice < i64::from(policy.min_notice_days) {
            return Err(ValidationError::InsufficientNotice {
                required: policy.min_notice_days,
                given: notice,
            }
            .into());
        }
        if let Some(max) = policy.max_consecutive_days {
            if duration_days > max {
                return Err(ValidationError::ExceedsMaxConsecutive {
                    requested: duration_days,
                    max,
                }
                .into());
            }
        }
        if policy.eligibility != Eligibility::default() {
            let profile = self.directory.profile(&app.employee_id).ok_or_else(|| {
                ValidationError::NotEligible("no employee profile on record".into())
            })?;
            policy
                .eligibility
                .check(&profile, app.dates.from)
                .map_err(ValidationError::NotEligible)?;
        }

        // 7. attachment
        if policy.requires_attachment
            && duration_days > policy.attachment_threshold_days
            && !app.attachment_present
        {
            return Err(ValidationError::AttachmentRequired(policy.attachment_threshold_days).into());
        }

        Ok(ValidatedLeave {
            duration_days,
            year,
            working_days: working,
            policy,
            employee_version,
        })
    }

    /// Fails when another of the employee's requests holding days shares a date with `dates`.
    pub fn check_overlap(
        &self,
        employee_id: &str,
        dates: &DateRange,
        exclude_request_id: Option<&str>,
    ) -> LeaveResult<()> {
        for other in self.store.requests_for_employee(employee_id)? {
            if exclude_request_id == Some(other.id.as_str()) {
                continue;
            }
            if other.status().holds_balance() && other.dates.overlaps(dates) {
                return Err(ValidationError::Overlap(other.id).into());
            }
        }
        Ok(())
    }
}
