//! Racing reviewers and racing submissions against one database.
mod common;

use rust_decimal_macros::dec;
use std::sync::{Arc, Barrier};
use std::thread;

use common::*;
use leave_engine::error::{LeaveError, ValidationError};
use leave_engine::request::{ApproverRole, Decision, LeaveStatus};
use leave_engine::service::SubmitLeaveRequest;

#[test]
fn only_one_of_two_racing_reviewers_wins() -> anyhow::Result<()> {
    let h = harness()?;
    let request = h.service.submit_leave_request(SubmitLeaveRequest::new(
        EMPLOYEE,
        ANNUAL,
        d(2025, 6, 2),
        d(2025, 6, 6),
    ))?;

    let service = Arc::new(h.service);
    let barrier = Arc::new(Barrier::new(2));
    let handles: Vec<_> = [(MANAGER, Decision::Approved), (DEPT_HEAD, Decision::Rejected)]
        .into_iter()
        .map(|(reviewer, decision)| {
            let service = Arc::clone(&service);
            let barrier = Arc::clone(&barrier);
            let id = request.id.clone();
            thread::spawn(move || {
                barrier.wait();
                service.decide_approval_step(&id, ApproverRole::Manager, reviewer, decision)
            })
        })
        .collect();

    let results: Vec<_> = handles
        .into_iter()
        .map(|h| h.join().expect("reviewer thread panicked"))
        .collect();
    let wins = results.iter().filter(|r| r.is_ok()).count();
    let conflicts = results
        .iter()
        .filter(|r| matches!(r, Err(e) if e.is_conflict()))
        .count();
    assert_eq!(wins, 1);
    assert_eq!(conflicts, 1);

    // the ledger reflects exactly the winning decision
    let stored = service.get_request(&request.id)?;
    let balance = service.get_balance_summary(EMPLOYEE, ANNUAL)?;
    match stored.status() {
        LeaveStatus::Pending => assert_eq!(balance.pending, dec!(4)),
        LeaveStatus::Rejected => assert_eq!(balance.pending, dec!(0)),
        other => panic!("unexpected status {}", other),
    }
    Ok(())
}

#[test]
fn concurrent_submissions_never_overdraw() -> anyhow::Result<()> {
    let h = bare_harness()?;
    h.service
        .put_policy(&leave_engine::policy::LeavePolicy::new(ANNUAL))?;
    h.service.grant_entitlement(EMPLOYEE, ANNUAL, 2025, dec!(10), HR)?;

    let service = Arc::new(h.service);
    let barrier = Arc::new(Barrier::new(8));
    let handles: Vec<_> = (0..8u32)
        .map(|week| {
            let service = Arc::clone(&service);
            let barrier = Arc::clone(&barrier);
            // a Monday and Tuesday in a different week per thread
            let monday = d(2025, 6, 2) + chrono::Duration::weeks(i64::from(week));
            thread::spawn(move || {
                barrier.wait();
                service.submit_leave_request(SubmitLeaveRequest::new(
                    EMPLOYEE,
                    ANNUAL,
                    monday,
                    monday + chrono::Duration::days(1),
                ))
            })
        })
        .collect();

    let results: Vec<_> = handles
        .into_iter()
        .map(|h| h.join().expect("submitter thread panicked"))
        .collect();
    let accepted = results.iter().filter(|r| r.is_ok()).count();
    assert_eq!(accepted, 5);
    assert!(
        results
            .iter()
            .filter_map(|r| r.as_ref().err())
            .all(|e| matches!(e, LeaveError::InsufficientBalance { .. }))
    );

    let balance = service.get_balance_summary(EMPLOYEE, ANNUAL)?;
    assert_eq!(balance.pending, dec!(10));
    assert_eq!(balance.remaining, dec!(0));
    assert_eq!(service.list_requests_for_employee(EMPLOYEE)?.len(), 5);
    Ok(())
}

#[test]
fn racing_submissions_for_the_same_days_book_them_once() -> anyhow::Result<()> {
    let h = bare_harness()?;
    h.service
        .put_policy(&leave_engine::policy::LeavePolicy::new(ANNUAL))?;
    h.service.grant_entitlement(EMPLOYEE, ANNUAL, 2025, dec!(10), HR)?;

    let service = Arc::new(h.service);
    let barrier = Arc::new(Barrier::new(4));
    let handles: Vec<_> = (0..4)
        .map(|_| {
            let service = Arc::clone(&service);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                service.submit_leave_request(SubmitLeaveRequest::new(
                    EMPLOYEE,
                    ANNUAL,
                    d(2025, 6, 9),
                    d(2025, 6, 10),
                ))
            })
        })
        .collect();

    let results: Vec<_> = handles
        .into_iter()
        .map(|h| h.join().expect("submitter thread panicked"))
        .collect();
    let accepted: Vec<_> = results.iter().filter_map(|r| r.as_ref().ok()).collect();
    assert_eq!(accepted.len(), 1);
    let winner = &accepted[0].id;
    for err in results.iter().filter_map(|r| r.as_ref().err()) {
        match err {
            LeaveError::Validation(ValidationError::Overlap(id)) => assert_eq!(id, winner),
            other => panic!("expected an overlap, got {}", other),
        }
    }

    let balance = service.get_balance_summary(EMPLOYEE, ANNUAL)?;
    assert_eq!(balance.pending, dec!(2));
    assert_eq!(balance.remaining, dec!(8));
    assert_eq!(service.list_requests_for_employee(EMPLOYEE)?.len(), 1);
    Ok(())
}
