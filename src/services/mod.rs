//! Services layer: business logic for authentication and authorization.

mod audit;
mod auth;
mod email;
mod lockout;
pub mod token;
mod two_factor;

pub use audit::AuditRecorder;
pub use auth::{AuthService, AuthSuccess};
pub use email::{EmailProvider, MockMailer, SmtpMailer};
pub use lockout::LockoutTracker;
pub use token::{ResetClaims, SessionClaims, TokenService};
pub use two_factor::{TwoFactor, TwoFactorDisabled, TwoFactorEnrollment};
