//! Shared fixtures for the integration tests.
//!
//! Every test opens its own sled database in a temp dir; sled locks the directory so tests
//! can't share one.
#![allow(dead_code)]

use chrono::NaiveDate;
use rust_decimal_macros::dec;
use sled::open;
use std::sync::Arc;
use tempfile::{TempDir, tempdir};

use leave_engine::audit::MemoryNotifier;
use leave_engine::calendar::Calendar;
use leave_engine::clock::FixedClock;
use leave_engine::directory::StaticDirectory;
use leave_engine::policy::LeavePolicy;
use leave_engine::service::LeaveService;

pub const EMPLOYEE: &str = "alice";
pub const MANAGER: &str = "bob";
pub const DEPT_HEAD: &str = "dora";
pub const HR: &str = "hana";
pub const ANNUAL: &str = "annual";

pub fn d(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).unwrap()
}

pub struct Harness {
    // held so the database outlives the test body
    pub _dir: TempDir,
    pub service: LeaveService,
    pub clock: Arc<FixedClock>,
    pub notifier: Arc<MemoryNotifier>,
}

pub fn directory() -> StaticDirectory {
    StaticDirectory::new()
        .with_manager(EMPLOYEE, MANAGER)
        .with_manager("carl", MANAGER)
        .with_department_head(EMPLOYEE, DEPT_HEAD)
        .with_hr(HR)
}

/// Fresh engine on 2025-05-01 with an empty ledger.
pub fn bare_harness() -> anyhow::Result<Harness> {
    bare_harness_with(directory())
}

pub fn bare_harness_with(directory: StaticDirectory) -> anyhow::Result<Harness> {
    let dir = tempdir()?;
    let db = Arc::new(open(dir.path().join("leave.db"))?);
    let clock = Arc::new(FixedClock::on(d(2025, 5, 1)));
    let notifier = Arc::new(MemoryNotifier::new());
    let service = LeaveService::new(db, Arc::new(directory))?
        .with_clock(clock.clone())
        .with_notifier(notifier.clone());
    Ok(Harness {
        _dir: dir,
        service,
        clock,
        notifier,
    })
}

/// Engine with an annual leave policy, 10 days granted to alice for 2025 and a public
/// holiday on Wednesday 2025-06-04.
pub fn harness() -> anyhow::Result<Harness> {
    let h = bare_harness()?;
    h.service
        .put_policy(&LeavePolicy::new(ANNUAL).set_yearly_entitlement(dec!(10)))?;
    h.service
        .put_calendar(&Calendar::new(2025).add_holiday(d(2025, 6, 4), "Founders Day"))?;
    h.service.grant_entitlement(EMPLOYEE, ANNUAL, 2025, dec!(10), HR)?;
    Ok(h)
}
