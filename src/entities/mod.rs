pub mod prizes;
pub mod products;
pub mod redeem_codes;
pub mod users;

pub use prizes as prize_entity;
pub use products as product_entity;
pub use redeem_codes as redeem_code_entity;
pub use redeem_codes::RedeemStateKind;
pub use users as user_entity;
