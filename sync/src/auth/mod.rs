//! Authentication for the local API.

mod middleware;

pub use middleware::AuthUser;
