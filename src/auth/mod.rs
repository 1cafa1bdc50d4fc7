pub mod access;
pub mod middleware;
pub mod token;

pub use access::{AccessFilter, CallerContext};
pub use middleware::require_auth;
pub use token::{Claims, TokenError, TokenService};
