pub mod common;
pub mod pagination;
pub mod prize;
pub mod product;
pub mod redeem;
pub mod redeem_code;
pub mod user;

pub use common::*;
pub use pagination::*;
pub use prize::*;
pub use product::*;
pub use redeem::*;
pub use redeem_code::*;
pub use user::*;
