pub mod admin;
pub mod auth;
pub mod products;
pub mod redeem;
pub mod users;

pub use admin::admin_config;
pub use auth::auth_config;
pub use products::products_config;
pub use redeem::redeem_config;
pub use users::users_config;
