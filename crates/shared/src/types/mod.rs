//! Common types used across the application.

pub mod id;
pub mod money;
pub mod pagination;

pub use id::*;
pub use money::{Currency, MONEY_SCALE, fits_money_scale};
pub use pagination::ListLimit;
