//! Core domain types and utilities for the brigade platform.
//!
//! This crate provides the identifier types and the error handling alias
//! shared by the restaurant-operations assistant crates.

pub mod error;
pub mod id;

pub use error::Result;
pub use id::{AdminId, MessageId, ParseIdError, RestaurantId, TurnId};
