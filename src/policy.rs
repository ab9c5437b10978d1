//! Per leave type accrual, carry-forward and request rules
use chrono::{Datelike, NaiveDate};
use rust_decimal::{Decimal, RoundingStrategy};

use crate::directory::{ContractType, EmployeeProfile};
use crate::types::{Days, LeaveTypeId, cbor_days, cbor_opt_days};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, minicbor::Encode, minicbor::Decode)]
pub enum AccrualMethod {
    #[n(0)]
    None,
    #[n(1)]
    Monthly,
    #[n(2)]
    Quarterly,
    #[n(3)]
    Yearly,
}

impl AccrualMethod {
    /// Length of one accrual period in months.
    pub fn months(&self) -> Option<u32> {
        match self {
            AccrualMethod::None => None,
            AccrualMethod::Monthly => Some(1),
            AccrualMethod::Quarterly => Some(3),
            AccrualMethod::Yearly => Some(12),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, minicbor::Encode, minicbor::Decode)]
pub enum RoundingRule {
    #[n(0)]
    None,
    #[n(1)]
    Round,
    #[n(2)]
    Up,
    #[n(3)]
    Down,
}

impl RoundingRule {
    /// Rounds to whole days.
    pub fn apply(&self, value: Decimal) -> Decimal {
        match self {
            RoundingRule::None => value,
            RoundingRule::Round => value.round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero),
            RoundingRule::Up => value.round_dp_with_strategy(0, RoundingStrategy::AwayFromZero),
            RoundingRule::Down => value.round_dp_with_strategy(0, RoundingStrategy::ToZero),
        }
    }
}

/// Who may take a leave type. Empty lists admit everyone.
#[derive(Debug, Clone, Default, PartialEq, Eq, minicbor::Encode, minicbor::Decode)]
pub struct Eligibility {
    #[n(0)]
    pub min_tenure_months: Option<u32>,
    #[n(1)]
    pub positions: Vec<String>,
    #[n(2)]
    pub contract_types: Vec<ContractType>,
}

impl Eligibility {
    /// Returns the reason the employee is not eligible, if any.
    pub fn check(&self, profile: &EmployeeProfile, on: NaiveDate) -> Result<(), String> {
        if let Some(min) = self.min_tenure_months {
            let tenure = months_between(profile.hire_date, on);
            if tenure < min {
                return Err(format!("requires {} months tenure, has {}", min, tenure));
            }
        }
        if !self.positions.is_empty() && !self.positions.contains(&profile.position) {
            return Err(format!("position '{}' not eligible", profile.position));
        }
        if !self.contract_types.is_empty() && !self.contract_types.contains(&profile.contract_type)
        {
            return Err(format!("contract type {:?} not eligible", profile.contract_type));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, minicbor::Encode, minicbor::Decode)]
pub struct LeavePolicy {
    #[n(0)]
    pub leave_type_id: LeaveTypeId,
    #[n(1)]
    pub accrual_method: AccrualMethod,
    #[n(2)]
    #[cbor(with = "cbor_opt_days")]
    pub monthly_rate: Option<Days>,
    #[n(3)]
    #[cbor(with = "cbor_opt_days")]
    pub yearly_rate: Option<Days>,
    #[n(4)]
    pub carry_forward_allowed: bool,
    #[n(5)]
    #[cbor(with = "cbor_days")]
    pub max_carry_forward: Days,
    #[n(6)]
    pub expiry_after_months: Option<u32>,
    #[n(7)]
    pub rounding: RoundingRule,
    #[n(8)]
    pub min_notice_days: u32,
    #[n(9)]
    #[cbor(with = "cbor_opt_days")]
    pub max_consecutive_days: Option<Days>,
    #[n(10)]
    pub requires_attachment: bool,
    /// Requests longer than this need an attachment when `requires_attachment` is set.
    #[n(11)]
    #[cbor(with = "cbor_days")]
    pub attachment_threshold_days: Days,
    #[n(12)]
    pub eligibility: Eligibility,
    /// Grant used when the year-end job opens next year's ledger row.
    #[n(13)]
    #[cbor(with = "cbor_days")]
    pub yearly_entitlement: Days,
}

impl LeavePolicy {
    /// A policy with no accrual, no carry-forward and no request restrictions.
    pub fn new(leave_type_id: &str) -> Self {
        Self {
            leave_type_id: leave_type_id.to_string(),
            accrual_method: AccrualMethod::None,
            monthly_rate: None,
            yearly_rate: None,
            carry_forward_allowed: false,
            max_carry_forward: Decimal::ZERO,
            expiry_after_months: None,
            rounding: RoundingRule::None,
            min_notice_days: 0,
            max_consecutive_days: None,
            requires_attachment: false,
            attachment_threshold_days: Decimal::ZERO,
            eligibility: Eligibility::default(),
            yearly_entitlement: Decimal::ZERO,
        }
    }
    pub fn set_monthly_accrual(mut self, rate: Days) -> Self {
        self.accrual_method = AccrualMethod::Monthly;
        self.monthly_rate = Some(rate);
        self
    }
    pub fn set_quarterly_accrual(mut self, monthly_rate: Days) -> Self {
        self.accrual_method = AccrualMethod::Quarterly;
        self.monthly_rate = Some(monthly_rate);
        self
    }
    pub fn set_yearly_accrual(mut self, rate: Days) -> Self {
        self.accrual_method = AccrualMethod::Yearly;
        self.yearly_rate = Some(rate);
        self
    }
    pub fn set_rounding(mut self, rounding: RoundingRule) -> Self {
        self.rounding = rounding;
        self
    }
    pub fn set_carry_forward(mut self, max: Days, expiry_after_months: Option<u32>) -> Self {
        self.carry_forward_allowed = true;
        self.max_carry_forward = max;
        self.expiry_after_months = expiry_after_months;
        self
    }
    pub fn set_min_notice_days(mut self, days: u32) -> Self {
        self.min_notice_days = days;
        self
    }
    pub fn set_max_consecutive_days(mut self, days: Days) -> Self {
        self.max_consecutive_days = Some(days);
        self
    }
    pub fn set_attachment_required_above(mut self, days: Days) -> Self {
        self.requires_attachment = true;
        self.attachment_threshold_days = days;
        self
    }
    pub fn set_eligibility(mut self, eligibility: Eligibility) -> Self {
        self.eligibility = eligibility;
        self
    }
    pub fn set_yearly_entitlement(mut self, days: Days) -> Self {
        self.yearly_entitlement = days;
        self
    }

    /// Days earned over `periods` whole accrual periods.
    ///
    /// Quarterly accrual uses three months of the monthly rate, falling back to a quarter of
    /// the yearly rate.
    pub fn accrual_for(&self, periods: u32) -> Option<Days> {
        let periods = Decimal::from(periods);
        match self.accrual_method {
            AccrualMethod::None => None,
            AccrualMethod::Monthly => self.monthly_rate.map(|r| r * periods),
            AccrualMethod::Quarterly => self
                .monthly_rate
                .map(|r| r * Decimal::from(3))
                .or(self.yearly_rate.map(|r| r / Decimal::from(4)))
                .map(|r| r * periods),
            AccrualMethod::Yearly => self
                .yearly_rate
                .or(self.monthly_rate.map(|r| r * Decimal::from(12)))
                .map(|r| r * periods),
        }
    }
}

/// Whole months elapsed from `from` to `to`; zero when `to` precedes `from`.
pub fn months_between(from: NaiveDate, to: NaiveDate) -> u32 {
    if to <= from {
        return 0;
    }
    let mut months = (to.year() - from.year()) * 12 + to.month() as i32 - from.month() as i32;
    if to.day() < from.day() {
        months -= 1;
    }
    months.max(0) as u32
}
