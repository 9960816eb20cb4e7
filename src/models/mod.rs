pub mod account;
pub mod audit_event;

pub use account::{
    Account, AccountStatus, ActivityStats, AdminTier, LockoutState, Role, SanitizedAccount,
};
pub use audit_event::{AuditCategory, AuditEvent, AuditSeverity};
