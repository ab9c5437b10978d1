//! Accrual, carry-forward and expiry jobs.
mod common;

use rust_decimal_macros::dec;

use common::*;
use leave_engine::audit::{AuditAction, verify_chain};
use leave_engine::entitlement::{AdjustmentType, entitlement_key};
use leave_engine::policy::{AccrualMethod, LeavePolicy, RoundingRule};
use leave_engine::request::{ApproverRole, Decision};
use leave_engine::service::{AdjustmentRequest, SubmitLeaveRequest};

#[test]
fn accrual_is_idempotent_per_watermark() -> anyhow::Result<()> {
    let h = bare_harness()?;
    h.service
        .put_policy(&LeavePolicy::new(ANNUAL).set_monthly_accrual(dec!(1.5)))?;
    h.service.grant_entitlement(EMPLOYEE, ANNUAL, 2025, dec!(0), HR)?;
    h.clock.set_date(d(2025, 4, 15));

    let summary = h.service.run_accrual(AccrualMethod::Monthly);
    assert_eq!(summary.failed_count, 0);
    let row = h.service.get_entitlement(EMPLOYEE, ANNUAL, 2025)?;
    assert_eq!(row.accrued_rounded, dec!(4.5));
    assert_eq!(row.last_accrual_date, Some(d(2025, 4, 1)));

    h.service.run_accrual(AccrualMethod::Monthly);
    assert_eq!(
        h.service.get_entitlement(EMPLOYEE, ANNUAL, 2025)?.accrued_rounded,
        dec!(4.5)
    );

    h.clock.set_date(d(2025, 5, 1));
    h.service.run_accrual(AccrualMethod::Monthly);
    let balance = h.service.get_balance_summary(EMPLOYEE, ANNUAL)?;
    assert_eq!(balance.accrued, dec!(6.0));
    assert_eq!(balance.remaining, dec!(6.0));

    let trail = h.service.audit_trail(&entitlement_key(EMPLOYEE, ANNUAL, 2025))?;
    let actions: Vec<AuditAction> = trail.iter().map(|e| e.action).collect();
    assert_eq!(
        actions,
        vec![AuditAction::Grant, AuditAction::Accrual, AuditAction::Accrual]
    );
    assert!(verify_chain(&trail));
    Ok(())
}

#[test]
fn accrual_rounds_the_running_total() -> anyhow::Result<()> {
    let h = bare_harness()?;
    h.service.put_policy(
        &LeavePolicy::new(ANNUAL)
            .set_monthly_accrual(dec!(1.25))
            .set_rounding(RoundingRule::Round),
    )?;
    h.service.grant_entitlement(EMPLOYEE, ANNUAL, 2025, dec!(0), HR)?;
    h.clock.set_date(d(2025, 4, 2));

    h.service.run_accrual(AccrualMethod::Monthly);
    let row = h.service.get_entitlement(EMPLOYEE, ANNUAL, 2025)?;
    assert_eq!(row.accrued_actual, dec!(3.75));
    assert_eq!(row.accrued_rounded, dec!(4));
    Ok(())
}

#[test]
fn accrual_reports_missing_policy_per_row() -> anyhow::Result<()> {
    let h = bare_harness()?;
    h.service
        .put_policy(&LeavePolicy::new(ANNUAL).set_monthly_accrual(dec!(2)))?;
    h.service.grant_entitlement(EMPLOYEE, ANNUAL, 2025, dec!(0), HR)?;
    h.service.grant_entitlement(EMPLOYEE, "sabbatical", 2025, dec!(0), HR)?;
    h.clock.set_date(d(2025, 3, 1));

    let summary = h.service.run_accrual(AccrualMethod::Monthly);
    assert_eq!(summary.success_count, 1);
    assert_eq!(summary.failed_count, 1);
    assert_eq!(
        summary.failures[0].id,
        entitlement_key(EMPLOYEE, "sabbatical", 2025)
    );
    assert_eq!(
        h.service.get_entitlement(EMPLOYEE, ANNUAL, 2025)?.accrued_rounded,
        dec!(4)
    );

    // rows on another cadence are left alone
    let quarterly = h.service.run_accrual(AccrualMethod::Quarterly);
    assert_eq!(quarterly.success_count, 0);
    Ok(())
}

#[test]
fn carry_forward_caps_and_expires_unused_days() -> anyhow::Result<()> {
    let h = bare_harness()?;
    h.service.put_policy(
        &LeavePolicy::new(ANNUAL)
            .set_yearly_entitlement(dec!(12))
            .set_carry_forward(dec!(5), Some(3)),
    )?;
    h.service.put_policy(&LeavePolicy::new("sick"))?;
    h.service.grant_entitlement(EMPLOYEE, ANNUAL, 2024, dec!(10), HR)?;
    h.service.grant_entitlement(EMPLOYEE, "sick", 2024, dec!(5), HR)?;
    h.service.apply_adjustment(
        AdjustmentRequest {
            employee_id: EMPLOYEE.into(),
            leave_type_id: ANNUAL.into(),
            year: 2024,
            adjustment_type: AdjustmentType::Encashment,
            amount: dec!(2),
            reason: "paid out".into(),
        },
        HR,
    )?;

    h.clock.set_date(d(2025, 1, 2));
    let summary = h.service.run_carry_forward();
    assert_eq!(summary.success_count, 2);
    assert_eq!(summary.failed_count, 0);

    let next = h.service.get_entitlement(EMPLOYEE, ANNUAL, 2025)?;
    assert_eq!(next.yearly_entitlement, dec!(12));
    assert_eq!(next.carry_forward, dec!(5));
    assert_eq!(next.carry_forward_expires_on, Some(d(2025, 4, 1)));
    assert_eq!(next.remaining(), dec!(17));
    assert!(h.service.get_entitlement(EMPLOYEE, ANNUAL, 2024)?.rolled_over);

    let sick = h.service.get_entitlement(EMPLOYEE, "sick", 2025)?;
    assert_eq!(sick.carry_forward, dec!(0));
    assert_eq!(sick.carry_forward_expires_on, None);

    // a second run finds nothing left to roll
    assert_eq!(h.service.run_carry_forward().success_count, 0);
    assert_eq!(
        h.service.get_entitlement(EMPLOYEE, ANNUAL, 2025)?.carry_forward,
        dec!(5)
    );

    // Monday and Tuesday in February consume two carried days
    let request = h.service.submit_leave_request(SubmitLeaveRequest::new(
        EMPLOYEE,
        ANNUAL,
        d(2025, 2, 3),
        d(2025, 2, 4),
    ))?;
    h.service
        .decide_approval_step(&request.id, ApproverRole::Manager, MANAGER, Decision::Approved)?;
    h.service
        .decide_approval_step(&request.id, ApproverRole::Hr, HR, Decision::Approved)?;

    h.clock.set_date(d(2025, 4, 2));
    let expiry = h.service.run_carry_forward_expiry();
    assert_eq!(expiry.success_count, 1);

    let row = h.service.get_entitlement(EMPLOYEE, ANNUAL, 2025)?;
    assert_eq!(row.carry_forward, dec!(2));
    assert_eq!(row.taken, dec!(2));
    assert_eq!(row.remaining(), dec!(12));
    assert_eq!(row.carry_forward_expires_on, None);

    let actions: Vec<AuditAction> = h
        .service
        .audit_trail(&entitlement_key(EMPLOYEE, ANNUAL, 2025))?
        .into_iter()
        .map(|e| e.action)
        .collect();
    assert_eq!(actions, vec![AuditAction::CarryForward, AuditAction::Expiry]);
    Ok(())
}

#[test]
fn carry_forward_tops_up_an_existing_row() -> anyhow::Result<()> {
    let h = bare_harness()?;
    h.service.put_policy(
        &LeavePolicy::new(ANNUAL)
            .set_yearly_entitlement(dec!(12))
            .set_carry_forward(dec!(5), None),
    )?;
    h.service.grant_entitlement(EMPLOYEE, ANNUAL, 2024, dec!(3), HR)?;
    h.service.grant_entitlement(EMPLOYEE, ANNUAL, 2025, dec!(20), HR)?;

    let summary = h.service.run_carry_forward_for(2024);
    assert_eq!(summary.success_count, 1);

    let next = h.service.get_entitlement(EMPLOYEE, ANNUAL, 2025)?;
    assert_eq!(next.yearly_entitlement, dec!(20));
    assert_eq!(next.carry_forward, dec!(3));
    assert_eq!(next.carry_forward_expires_on, None);
    Ok(())
}
