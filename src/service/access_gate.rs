//! Role-based authorization decisions.
//!
//! Every check here is a pure function of (role, operation). Row visibility
//! for listings is handed to the aggregation engine as a [`RoleVisibility`]
//! rather than being baked into its query.

use std::fmt;

use crate::db::models::{Role, SubjectId};
use crate::error::RegistryError;

/// An authenticated caller: who is acting, and under which role.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Caller {
    pub id: SubjectId,
    pub role: Role,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    ListAccounts,
    Register,
    UpdateAccount,
    ReadAccount,
    UpdatePersonal,
    ConfirmPassword,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Operation::ListAccounts => "list accounts",
            Operation::Register => "register subjects",
            Operation::UpdateAccount => "update accounts",
            Operation::ReadAccount => "read accounts",
            Operation::UpdatePersonal => "update personal details",
            Operation::ConfirmPassword => "confirm passwords",
        };
        f.write_str(s)
    }
}

/// Set of subject roles a listing may surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoleVisibility {
    admin: bool,
    staff: bool,
    student: bool,
}

impl RoleVisibility {
    pub fn all() -> Self {
        Self {
            admin: true,
            staff: true,
            student: true,
        }
    }

    pub fn excluding(role: Role) -> Self {
        let mut v = Self::all();
        match role {
            Role::Admin => v.admin = false,
            Role::Staff => v.staff = false,
            Role::Student => v.student = false,
        }
        v
    }

    pub fn permits(&self, role: Role) -> bool {
        match role {
            Role::Admin => self.admin,
            Role::Staff => self.staff,
            Role::Student => self.student,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct AccessGate {
    restrict_account_read: bool,
}

impl AccessGate {
    pub fn new(restrict_account_read: bool) -> Self {
        Self {
            restrict_account_read,
        }
    }

    pub fn allows(&self, role: Role, op: Operation) -> bool {
        match op {
            Operation::ListAccounts => true,
            Operation::Register | Operation::UpdateAccount | Operation::UpdatePersonal => {
                role == Role::Admin
            }
            // Open unless an operator opts in to hardening.
            Operation::ReadAccount => !self.restrict_account_read || role == Role::Admin,
            Operation::ConfirmPassword => role != Role::Student,
        }
    }

    pub fn authorize(&self, role: Role, op: Operation) -> Result<(), RegistryError> {
        if self.allows(role, op) {
            Ok(())
        } else {
            tracing::debug!(role = %role, operation = %op, "access denied");
            Err(RegistryError::Forbidden(op))
        }
    }

    /// Subjects visible in aggregated account listings, whatever the caller's role.
    pub fn listing_visibility(&self) -> RoleVisibility {
        RoleVisibility::excluding(Role::Student)
    }
}
