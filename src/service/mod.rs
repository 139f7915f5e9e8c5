pub mod access_gate;
pub mod aggregation;
pub mod password;
pub mod reauth;
pub mod reconciliation;

pub use access_gate::{AccessGate, Caller, Operation, RoleVisibility};
pub use aggregation::{AggregationEngine, SubjectSummary};
pub use password::{Argon2Config, PasswordService};
pub use reauth::ReauthService;
pub use reconciliation::ReconciliationEngine;
