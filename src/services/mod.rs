pub mod allocation_engine;
pub mod auth_service;
pub mod prize_service;
pub mod product_service;
pub mod redemption_service;
pub mod user_service;

pub use allocation_engine::*;
pub use auth_service::*;
pub use prize_service::*;
pub use product_service::*;
pub use redemption_service::*;
pub use user_service::*;
