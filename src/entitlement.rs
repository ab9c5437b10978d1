//! Entitlement ledger rows and manual adjustments
use chrono::{Months, NaiveDate, Utc};
use rust_decimal::Decimal;

use crate::error::{LeaveError, LeaveResult};
use crate::types::{Days, EmployeeId, LeaveTypeId, TimeStamp, cbor_days, cbor_opt_date};

/// Balance of one employee for one leave type in one year.
///
/// `remaining` is never stored; it is derived from the counters on every read.
#[derive(Debug, Clone, PartialEq, Eq, minicbor::Encode, minicbor::Decode)]
pub struct LeaveEntitlement {
    #[n(0)]
    pub employee_id: EmployeeId,
    #[n(1)]
    pub leave_type_id: LeaveTypeId,
    #[n(2)]
    pub year: i32,
    #[n(3)]
    #[cbor(with = "cbor_days")]
    pub yearly_entitlement: Days,
    #[n(4)]
    #[cbor(with = "cbor_days")]
    pub accrued_actual: Days,
    #[n(5)]
    #[cbor(with = "cbor_days")]
    pub accrued_rounded: Days,
    #[n(6)]
    #[cbor(with = "cbor_days")]
    pub carry_forward: Days,
    #[n(7)]
    #[cbor(with = "cbor_days")]
    pub taken: Days,
    #[n(8)]
    #[cbor(with = "cbor_days")]
    pub pending: Days,
    #[n(9)]
    #[cbor(with = "cbor_opt_date")]
    pub last_accrual_date: Option<NaiveDate>,
    /// Carried-forward days not consumed by this date are forfeited.
    #[n(10)]
    #[cbor(with = "cbor_opt_date")]
    pub carry_forward_expires_on: Option<NaiveDate>,
    /// Set once the year-end job has rolled this row into the next year.
    #[n(11)]
    pub rolled_over: bool,
}

/// Ledger movements produced by request transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LedgerOp {
    Reserve(Days),
    Release(Days),
    /// pending -> taken
    Commit(Days),
    /// taken -> pending, reversing a commit
    Uncommit(Days),
}

/// Counter values captured before and after a mutation, for the audit trail.
#[derive(Debug, Clone, PartialEq, Eq, minicbor::Encode, minicbor::Decode)]
pub struct LedgerSnapshot {
    #[n(0)]
    #[cbor(with = "cbor_days")]
    pub yearly_entitlement: Days,
    #[n(1)]
    #[cbor(with = "cbor_days")]
    pub accrued: Days,
    #[n(2)]
    #[cbor(with = "cbor_days")]
    pub carry_forward: Days,
    #[n(3)]
    #[cbor(with = "cbor_days")]
    pub taken: Days,
    #[n(4)]
    #[cbor(with = "cbor_days")]
    pub pending: Days,
    #[n(5)]
    #[cbor(with = "cbor_days")]
    pub remaining: Days,
}

pub type BalanceSummary = LedgerSnapshot;

impl LeaveEntitlement {
    pub fn new(employee_id: &str, leave_type_id: &str, year: i32, yearly_entitlement: Days) -> Self {
        Self {
            employee_id: employee_id.to_string(),
            leave_type_id: leave_type_id.to_string(),
            year,
            yearly_entitlement,
            accrued_actual: Decimal::ZERO,
            accrued_rounded: Decimal::ZERO,
            carry_forward: Decimal::ZERO,
            taken: Decimal::ZERO,
            pending: Decimal::ZERO,
            last_accrual_date: None,
            carry_forward_expires_on: None,
            rolled_over: false,
        }
    }

    pub fn remaining(&self) -> Days {
        self.yearly_entitlement + self.carry_forward + self.accrued_rounded
            - self.taken
            - self.pending
    }

    pub fn snapshot(&self) -> LedgerSnapshot {
        LedgerSnapshot {
            yearly_entitlement: self.yearly_entitlement,
            accrued: self.accrued_rounded,
            carry_forward: self.carry_forward,
            taken: self.taken,
            pending: self.pending,
            remaining: self.remaining(),
        }
    }

    pub fn reserve(&mut self, days: Days) -> LeaveResult<()> {
        check_positive(days)?;
        let remaining = self.remaining();
        if remaining < days {
            return Err(LeaveError::InsufficientBalance {
                requested: days,
                remaining,
            });
        }
        self.pending += days;
        Ok(())
    }

    pub fn release(&mut self, days: Days) -> LeaveResult<()> {
        check_positive(days)?;
        if self.pending < days {
            return Err(LeaveError::LedgerInvariant(format!(
                "cannot release {} days, only {} pending",
                days, self.pending
            )));
        }
        self.pending -= days;
        Ok(())
    }

    pub fn commit(&mut self, days: Days) -> LeaveResult<()> {
        check_positive(days)?;
        if self.pending < days {
            return Err(LeaveError::LedgerInvariant(format!(
                "cannot commit {} days, only {} pending",
                days, self.pending
            )));
        }
        self.pending -= days;
        self.taken += days;
        Ok(())
    }

    pub fn uncommit(&mut self, days: Days) -> LeaveResult<()> {
        check_positive(days)?;
        if self.taken < days {
            return Err(LeaveError::LedgerInvariant(format!(
                "cannot reverse {} days, only {} taken",
                days, self.taken
            )));
        }
        self.taken -= days;
        self.pending += days;
        Ok(())
    }

    pub fn apply(&mut self, op: LedgerOp) -> LeaveResult<()> {
        match op {
            LedgerOp::Reserve(d) => self.reserve(d),
            LedgerOp::Release(d) => self.release(d),
            LedgerOp::Commit(d) => self.commit(d),
            LedgerOp::Uncommit(d) => self.uncommit(d),
        }
    }

    /// Applies `ops` in order. On error the row is left untouched.
    pub fn apply_all(&mut self, ops: &[LedgerOp]) -> LeaveResult<()> {
        let mut next = self.clone();
        for op in ops {
            next.apply(*op)?;
        }
        *self = next;
        Ok(())
    }

    pub fn apply_adjustment(&mut self, kind: AdjustmentType, amount: Days) -> LeaveResult<()> {
        if amount <= Decimal::ZERO {
            return Err(crate::error::ValidationError::NonPositiveAmount.into());
        }
        match kind {
            AdjustmentType::Add => self.yearly_entitlement += amount,
            AdjustmentType::Deduct | AdjustmentType::Encashment => {
                let remaining = self.remaining();
                if remaining < amount {
                    return Err(LeaveError::InsufficientBalance {
                        requested: amount,
                        remaining,
                    });
                }
                if kind == AdjustmentType::Deduct {
                    self.yearly_entitlement -= amount;
                } else {
                    self.taken += amount;
                }
            }
        }
        Ok(())
    }

    /// Adds freshly earned days. `accrued_rounded` is recomputed from the running total so
    /// rounding never compounds.
    pub fn accrue(&mut self, amount: Days, rounding: crate::policy::RoundingRule, through: NaiveDate) {
        self.accrued_actual += amount;
        self.accrued_rounded = rounding.apply(self.accrued_actual);
        self.last_accrual_date = Some(through);
    }

    /// Forfeits carried-forward days that no taken or pending leave has consumed.
    /// Returns the forfeited amount.
    pub fn expire_carry_forward(&mut self) -> Days {
        let consumed = self.carry_forward.min(self.taken + self.pending);
        let forfeited = self.carry_forward - consumed;
        self.carry_forward = consumed;
        self.carry_forward_expires_on = None;
        forfeited
    }

    /// Sets the carried-forward balance opened by the year-end job.
    pub fn open_carry_forward(&mut self, days: Days, expiry_after_months: Option<u32>) {
        self.carry_forward = days;
        self.carry_forward_expires_on = match expiry_after_months {
            Some(months) if days > Decimal::ZERO => NaiveDate::from_ymd_opt(self.year, 1, 1)
                .and_then(|start| start.checked_add_months(Months::new(months))),
            _ => None,
        };
    }

    pub fn starts_on(&self) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(self.year, 1, 1)
    }

    pub fn ends_on(&self) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(self.year, 12, 31)
    }
}

pub fn entitlement_key(employee_id: &str, leave_type_id: &str, year: i32) -> String {
    format!("{}/{}/{:04}", employee_id, leave_type_id, year)
}

fn check_positive(days: Days) -> LeaveResult<()> {
    if days <= Decimal::ZERO {
        return Err(LeaveError::LedgerInvariant(format!(
            "ledger movements must be positive, got {}",
            days
        )));
    }
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, minicbor::Encode, minicbor::Decode)]
pub enum AdjustmentType {
    #[n(0)]
    Add,
    #[n(1)]
    Deduct,
    #[n(2)]
    Encashment,
}

/// Manual ledger correction. Append-only.
#[derive(Debug, Clone, PartialEq, Eq, minicbor::Encode, minicbor::Decode)]
pub struct LeaveAdjustment {
    #[n(0)]
    pub id: String,
    #[n(1)]
    pub employee_id: EmployeeId,
    #[n(2)]
    pub leave_type_id: LeaveTypeId,
    #[n(3)]
    pub year: i32,
    #[n(4)]
    pub adjustment_type: AdjustmentType,
    #[n(5)]
    #[cbor(with = "cbor_days")]
    pub amount: Days,
    #[n(6)]
    pub reason: String,
    #[n(7)]
    pub acting_hr_user_id: EmployeeId,
    #[n(8)]
    pub timestamp: TimeStamp<Utc>,
}
