//! Core types for Partshop.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod email;
pub mod id;
pub mod price;
pub mod status;
pub mod user_id;

pub use email::{Email, EmailError};
pub use id::*;
pub use price::{CHECKOUT_DISCOUNT_RATE, discounted_price, line_total, round_money, sum_money};
pub use status::*;
pub use user_id::{UserId, UserIdError};
