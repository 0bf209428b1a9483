//! Data model shared by the API handlers and the collaborator traits:
//! - [`labels`] - Sorted label sets
//! - [`matcher`] - Label matchers
//! - [`selector`] - Metric selector parsing
//! - [`value`] - Query result values

pub mod labels;
pub mod matcher;
pub mod selector;
pub mod value;
