//! Auth & Sessions (C9): token validation, session lifecycle, role-based
//! permissions, and per-client rate limiting.

pub mod permission;
pub mod rate_limit;
pub mod session;
pub mod token;

pub use permission::PermissionTable;
pub use rate_limit::{ClientRateInfo, RateLimiter};
pub use session::{Session, SessionStore};
pub use token::{Claims, Role, TokenCodec};
