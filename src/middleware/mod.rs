pub mod auth;
pub mod rate_limit;

pub use auth::{
    auth_middleware, bearer_token, permission_gate, tier_gate, AuthAccount, AuthContext,
    PermissionPolicy, TierPolicy, SESSION_COOKIE,
};
pub use rate_limit::{client_origin, rate_limit_middleware, SlidingWindowLimiter};
