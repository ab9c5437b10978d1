//! Leave request lifecycle and entitlement ledger.
//!
//! Requests move through a multi-step approval flow whose derived status drives the
//! pending/taken counters of the matching ledger row. Every balance-affecting change is
//! persisted atomically in sled together with a hash-chained audit entry.

pub mod audit;
pub mod calendar;
pub mod clock;
pub mod config;
pub mod directory;
pub mod entitlement;
pub mod error;
pub mod policy;
pub mod request;
pub mod scheduler;
pub mod service;
pub mod store;
pub mod types;
pub mod validation;

pub use error::{LeaveError, LeaveResult, ValidationError};
pub use request::{ApprovalStep, ApproverRole, Decision, LeaveRequest, LeaveStatus};
pub use service::{BatchSummary, LeaveService, SubmitLeaveRequest};
