pub mod auth;
pub mod cors;

pub use auth::{AuthMiddleware, get_identity, require_admin, require_identity};
pub use cors::create_cors;
