//! Employee identity, roles and reporting lines, as seen by the leave engine.
//!
//! The organisation structure lives outside this crate. [`OrgDirectory`] is the seam through
//! which step authorization, eligibility checks and escalation notices resolve people.
use chrono::NaiveDate;
use std::collections::{HashMap, HashSet};

use crate::request::ApproverRole;
use crate::types::EmployeeId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, minicbor::Encode, minicbor::Decode)]
pub enum ContractType {
    #[n(0)]
    FullTime,
    #[n(1)]
    PartTime,
    #[n(2)]
    Contractor,
    #[n(3)]
    Intern,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmployeeProfile {
    pub hire_date: NaiveDate,
    pub position: String,
    pub contract_type: ContractType,
}

pub trait OrgDirectory: Send + Sync {
    /// True when `approver` manages `employee` directly or further up the chain.
    fn is_in_reporting_chain(&self, approver: &str, employee: &str) -> bool;
    fn is_department_head_of(&self, approver: &str, employee: &str) -> bool;
    fn has_hr_role(&self, user: &str) -> bool;
    /// People able to decide `role` for `employee`.
    fn approvers_for(&self, role: ApproverRole, employee: &str) -> Vec<EmployeeId>;
    fn profile(&self, employee: &str) -> Option<EmployeeProfile>;

    fn can_decide(&self, role: ApproverRole, approver: &str, employee: &str) -> bool {
        if approver == employee {
            return false;
        }
        match role {
            ApproverRole::Manager => {
                self.is_in_reporting_chain(approver, employee)
                    || self.is_department_head_of(approver, employee)
            }
            ApproverRole::DepartmentHead => self.is_department_head_of(approver, employee),
            ApproverRole::Hr => self.has_hr_role(approver),
        }
    }
}

/// In-memory directory assembled with builder calls.
#[derive(Debug, Default, Clone)]
pub struct StaticDirectory {
    managers: HashMap<EmployeeId, EmployeeId>,
    department_heads: HashMap<EmployeeId, EmployeeId>,
    hr: HashSet<EmployeeId>,
    profiles: HashMap<EmployeeId, EmployeeProfile>,
}

impl StaticDirectory {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn with_manager(mut self, employee: &str, manager: &str) -> Self {
        self.managers.insert(employee.to_string(), manager.to_string());
        self
    }
    pub fn with_department_head(mut self, employee: &str, head: &str) -> Self {
        self.department_heads
            .insert(employee.to_string(), head.to_string());
        self
    }
    pub fn with_hr(mut self, user: &str) -> Self {
        self.hr.insert(user.to_string());
        self
    }
    pub fn with_profile(mut self, employee: &str, profile: EmployeeProfile) -> Self {
        self.profiles.insert(employee.to_string(), profile);
        self
    }

    fn chain_of(&self, employee: &str) -> Vec<EmployeeId> {
        let mut chain = Vec::new();
        let mut current = employee;
        while let Some(manager) = self.managers.get(current) {
            // guard against cycles in badly entered data
            if chain.contains(manager) || manager == employee {
                break;
            }
            chain.push(manager.clone());
            current = manager;
        }
        chain
    }
}

impl OrgDirectory for StaticDirectory {
    fn is_in_reporting_chain(&self, approver: &str, employee: &str) -> bool {
        self.chain_of(employee).iter().any(|m| m == approver)
    }

    fn is_department_head_of(&self, approver: &str, employee: &str) -> bool {
        self.department_heads
            .get(employee)
            .is_some_and(|head| head == approver)
    }

    fn has_hr_role(&self, user: &str) -> bool {
        self.hr.contains(user)
    }

    fn approvers_for(&self, role: ApproverRole, employee: &str) -> Vec<EmployeeId> {
        match role {
            ApproverRole::Manager => self.managers.get(employee).cloned().into_iter().collect(),
            ApproverRole::DepartmentHead => self
                .department_heads
                .get(employee)
                .cloned()
                .into_iter()
                .collect(),
            ApproverRole::Hr => {
                let mut hr: Vec<_> = self.hr.iter().cloned().collect();
                hr.sort();
                hr
            }
        }
    }

    fn profile(&self, employee: &str) -> Option<EmployeeProfile> {
        self.profiles.get(employee).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reporting_chain_is_transitive() {
        let dir = StaticDirectory::new()
            .with_manager("alice", "bob")
            .with_manager("bob", "carol")
            .with_hr("hana");

        assert!(dir.can_decide(ApproverRole::Manager, "bob", "alice"));
        assert!(dir.can_decide(ApproverRole::Manager, "carol", "alice"));
        assert!(!dir.can_decide(ApproverRole::Manager, "alice", "bob"));
        assert!(dir.can_decide(ApproverRole::Hr, "hana", "alice"));
        assert!(!dir.can_decide(ApproverRole::Hr, "bob", "alice"));
    }

    #[test]
    fn nobody_decides_their_own_request() {
        let dir = StaticDirectory::new().with_hr("hana");
        assert!(!dir.can_decide(ApproverRole::Hr, "hana", "hana"));
    }

    #[test]
    fn cyclic_chain_terminates() {
        let dir = StaticDirectory::new()
            .with_manager("a", "b")
            .with_manager("b", "a");
        assert!(dir.is_in_reporting_chain("b", "a"));
        assert!(!dir.is_in_reporting_chain("c", "a"));
    }
}
