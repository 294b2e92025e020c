//! Core domain entities
//!
//! All business entities are defined here. These are pure data structures
//! with validation logic - no I/O or external dependencies.

pub mod result;
pub mod rule;
mod transaction;

pub use rule::{NewRule, Rule, RuleUpdate};
pub use transaction::{SearchField, Transaction};
