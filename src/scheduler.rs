//! Periodic ledger jobs: accrual, year-end carry-forward, carry-forward expiry and escalation.
//!
//! Every row is processed in its own transaction. A failing row is reported in the returned
//! [`BatchSummary`] and never blocks the others.
use chrono::{Datelike, Duration, Months, NaiveDate};
use rust_decimal::Decimal;
use sled::Transactional;

use crate::audit::{AuditAction, AuditEntry};
use crate::entitlement::{LeaveEntitlement, entitlement_key};
use crate::error::{LeaveError, LeaveResult};
use crate::policy::{AccrualMethod, LeavePolicy, months_between};
use crate::request::LeaveStatus;
use crate::service::{BatchSummary, LeaveService};
use crate::store::{TxResult, abort, tx_append_audit, tx_get, tx_put};

/// Days earned by `row` between its watermark and `today`, and the new watermark.
///
/// Only whole accrual periods count; the watermark advances by exactly those periods so a
/// partial period is picked up by a later run. Accrual stops at the end of the row's year.
pub fn pending_accrual(
    row: &LeaveEntitlement,
    policy: &LeavePolicy,
    today: NaiveDate,
) -> LeaveResult<Option<(Decimal, NaiveDate)>> {
    let Some(period_months) = policy.accrual_method.months() else {
        return Ok(None);
    };
    let (Some(year_start), Some(year_end)) = (row.starts_on(), row.ends_on()) else {
        return Err(LeaveError::LedgerInvariant(format!("invalid ledger year {}", row.year)));
    };
    let start = row.last_accrual_date.unwrap_or(year_start);
    let end = today.min(year_end + Duration::days(1));

    let periods = months_between(start, end) / period_months;
    if periods == 0 {
        return Ok(None);
    }
    let amount = policy
        .accrual_for(periods)
        .ok_or_else(|| LeaveError::PolicyMissing(format!("{} has no accrual rate", policy.leave_type_id)))?;
    let through = start
        .checked_add_months(Months::new(periods * period_months))
        .ok_or_else(|| LeaveError::LedgerInvariant("accrual watermark overflow".into()))?;
    Ok(Some((amount, through)))
}

impl LeaveService {
    /// Accrues every row whose policy uses `period`. Re-running with an unchanged watermark
    /// accrues nothing.
    pub fn run_accrual(&self, period: AccrualMethod) -> BatchSummary {
        let mut summary = BatchSummary::default();
        if period == AccrualMethod::None {
            return summary;
        }
        let today = self.clock.today();

        for (key, row) in self.store.all_entitlements() {
            let result = row.and_then(|row| {
                let policy = self
                    .store
                    .get_policy(&row.leave_type_id)?
                    .ok_or_else(|| LeaveError::PolicyMissing(row.leave_type_id.clone()))?;
                if policy.accrual_method != period {
                    return Ok(false);
                }
                self.accrue_row(&key, &policy, today).map(|_| true)
            });
            match result {
                Ok(true) => summary.succeeded(),
                Ok(false) => {}
                Err(e) => summary.failed(&key, &e),
            }
        }
        tracing::info!(
            period = ?period,
            processed = summary.success_count,
            failed = summary.failed_count,
            "accrual run finished"
        );
        summary
    }

    fn accrue_row(&self, key: &str, policy: &LeavePolicy, today: NaiveDate) -> LeaveResult<()> {
        let now = self.now();
        let store = &self.store;
        (&store.entitlements, &store.audit).transaction(|(ledger, audit)| -> TxResult<()> {
            let mut row: LeaveEntitlement = match tx_get(ledger, key.as_bytes())? {
                Some(row) => row,
                None => return abort(LeaveError::NotFound(format!("entitlement {}", key))),
            };
            let (amount, through) = match pending_accrual(&row, policy, today) {
                Ok(Some(accrual)) => accrual,
                Ok(None) => return Ok(()),
                Err(e) => return abort(e),
            };
            let previous = row.snapshot();
            row.accrue(amount, policy.rounding, through);
            tx_put(ledger, key.as_bytes(), &row)?;
            tx_append_audit(
                audit,
                AuditEntry::new(
                    key,
                    AuditAction::Accrual,
                    Some(previous),
                    Some(row.snapshot()),
                    "scheduler",
                    Some(format!("accrued {} days through {}", amount, through)),
                    now.clone(),
                ),
            )?;
            Ok(())
        })?;
        Ok(())
    }

    /// Year-end job for the year that just closed, followed by carry-forward expiry.
    pub fn run_carry_forward(&self) -> BatchSummary {
        let closing_year = self.clock.today().year() - 1;
        let mut summary = self.run_carry_forward_for(closing_year);
        summary.merge(self.run_carry_forward_expiry());
        summary
    }

    /// Rolls every unrolled row of `closing_year` into the next year. Unused days up to the
    /// policy cap become next year's carry-forward; the rest is forfeited.
    pub fn run_carry_forward_for(&self, closing_year: i32) -> BatchSummary {
        let mut summary = BatchSummary::default();
        for (key, row) in self.store.all_entitlements() {
            let result = row.and_then(|row| {
                if row.year != closing_year || row.rolled_over {
                    return Ok(false);
                }
                let policy = self
                    .store
                    .get_policy(&row.leave_type_id)?
                    .ok_or_else(|| LeaveError::PolicyMissing(row.leave_type_id.clone()))?;
                self.roll_over_row(&key, &policy).map(|_| true)
            });
            match result {
                Ok(true) => summary.succeeded(),
                Ok(false) => {}
                Err(e) => summary.failed(&key, &e),
            }
        }
        tracing::info!(
            closing_year,
            processed = summary.success_count,
            failed = summary.failed_count,
            "carry-forward run finished"
        );
        summary
    }

    fn roll_over_row(&self, key: &str, policy: &LeavePolicy) -> LeaveResult<()> {
        let now = self.now();
        let store = &self.store;
        (&store.entitlements, &store.audit).transaction(|(ledger, audit)| -> TxResult<()> {
            let mut row: LeaveEntitlement = match tx_get(ledger, key.as_bytes())? {
                Some(row) => row,
                None => return abort(LeaveError::NotFound(format!("entitlement {}", key))),
            };
            if row.rolled_over {
                return Ok(());
            }
            let unused = row.remaining().max(Decimal::ZERO);
            let carried = if policy.carry_forward_allowed {
                unused.min(policy.max_carry_forward)
            } else {
                Decimal::ZERO
            };
            let forfeited = unused - carried;

            let next_key = entitlement_key(&row.employee_id, &row.leave_type_id, row.year + 1);
            let existing: Option<LeaveEntitlement> = tx_get(ledger, next_key.as_bytes())?;
            let previous = existing.as_ref().map(|e| e.snapshot());
            let mut next = existing.unwrap_or_else(|| {
                LeaveEntitlement::new(
                    &row.employee_id,
                    &row.leave_type_id,
                    row.year + 1,
                    policy.yearly_entitlement,
                )
            });
            next.open_carry_forward(carried, policy.expiry_after_months);
            row.rolled_over = true;

            tx_put(ledger, key.as_bytes(), &row)?;
            tx_put(ledger, next_key.as_bytes(), &next)?;
            tx_append_audit(
                audit,
                AuditEntry::new(
                    &next_key,
                    AuditAction::CarryForward,
                    previous,
                    Some(next.snapshot()),
                    "scheduler",
                    Some(format!(
                        "carried {} days from {}, forfeited {}",
                        carried, row.year, forfeited
                    )),
                    now.clone(),
                ),
            )?;
            Ok(())
        })?;
        Ok(())
    }

    /// Forfeits carried-forward days past their expiry date that no leave consumed.
    pub fn run_carry_forward_expiry(&self) -> BatchSummary {
        let mut summary = BatchSummary::default();
        let today = self.clock.today();
        for (key, row) in self.store.all_entitlements() {
            let result = row.and_then(|row| match row.carry_forward_expires_on {
                Some(expiry) if expiry <= today => self.expire_row(&key, today).map(|_| true),
                _ => Ok(false),
            });
            match result {
                Ok(true) => summary.succeeded(),
                Ok(false) => {}
                Err(e) => summary.failed(&key, &e),
            }
        }
        summary
    }

    fn expire_row(&self, key: &str, today: NaiveDate) -> LeaveResult<()> {
        let now = self.now();
        let store = &self.store;
        (&store.entitlements, &store.audit).transaction(|(ledger, audit)| -> TxResult<()> {
            let mut row: LeaveEntitlement = match tx_get(ledger, key.as_bytes())? {
                Some(row) => row,
                None => return abort(LeaveError::NotFound(format!("entitlement {}", key))),
            };
            if !row.carry_forward_expires_on.is_some_and(|d| d <= today) {
                return Ok(());
            }
            let previous = row.snapshot();
            let forfeited = row.expire_carry_forward();
            tx_put(ledger, key.as_bytes(), &row)?;
            tx_append_audit(
                audit,
                AuditEntry::new(
                    key,
                    AuditAction::Expiry,
                    Some(previous),
                    Some(row.snapshot()),
                    "scheduler",
                    Some(format!("forfeited {} carried-forward days", forfeited)),
                    now.clone(),
                ),
            )?;
            Ok(())
        })?;
        Ok(())
    }

    /// Flags pending requests older than the configured threshold and notifies the approvers
    /// of their first pending step. Request status never changes.
    pub fn escalate_stale_requests(&self) -> BatchSummary {
        let mut summary = BatchSummary::default();
        let now = self.clock.now();
        let threshold = Duration::days(self.config.escalation_after_days);

        let stale: Vec<String> = self
            .store
            .all_requests()
            .filter_map(|r| match r {
                Ok(r) => Some(r),
                Err(e) => {
                    tracing::warn!(error = %e, "skipping unreadable request");
                    None
                }
            })
            .filter(|r| {
                r.status() == LeaveStatus::Pending
                    && r.escalated_at.is_none()
                    && now - r.created_at.to_datetime_utc() >= threshold
            })
            .map(|r| r.id)
            .collect();

        let at = self.now();
        for id in stale {
            match self.transition(&id, |r| r.escalate(at.clone())) {
                Ok(_) => summary.succeeded(),
                Err(e) => summary.failed(&id, &e),
            }
        }
        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn accrues_whole_months_only() {
        let policy = LeavePolicy::new("annual").set_monthly_accrual(dec!(2));
        let row = LeaveEntitlement::new("emp", "annual", 2025, dec!(0));
        let (amount, through) = pending_accrual(&row, &policy, d(2025, 3, 20)).unwrap().unwrap();
        assert_eq!(amount, dec!(4));
        assert_eq!(through, d(2025, 3, 1));
    }

    #[test]
    fn same_watermark_accrues_nothing() {
        let policy = LeavePolicy::new("annual").set_monthly_accrual(dec!(2));
        let mut row = LeaveEntitlement::new("emp", "annual", 2025, dec!(0));
        row.last_accrual_date = Some(d(2025, 3, 1));
        assert!(pending_accrual(&row, &policy, d(2025, 3, 31)).unwrap().is_none());
    }

    #[test]
    fn accrual_stops_at_year_end() {
        let policy = LeavePolicy::new("annual").set_quarterly_accrual(dec!(1));
        let row = LeaveEntitlement::new("emp", "annual", 2024, dec!(0));
        let (amount, through) = pending_accrual(&row, &policy, d(2025, 8, 1)).unwrap().unwrap();
        assert_eq!(amount, dec!(12));
        assert_eq!(through, d(2025, 1, 1));
    }

    #[test]
    fn missing_rate_is_reported() {
        let mut policy = LeavePolicy::new("annual");
        policy.accrual_method = AccrualMethod::Monthly;
        let row = LeaveEntitlement::new("emp", "annual", 2025, dec!(0));
        assert!(matches!(
            pending_accrual(&row, &policy, d(2025, 6, 1)),
            Err(LeaveError::PolicyMissing(_))
        ));
    }
}
