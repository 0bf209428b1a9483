//! Reference query engine.
//!
//! - [`selector`] - Evaluates number literals, string literals and bare
//!   metric selectors
//!
//! Full expression evaluation is provided by whatever [`QueryEngine`]
//! the server is assembled with; this one is enough to serve raw series.
//!
//! [`QueryEngine`]: crate::provider::QueryEngine

pub mod selector;

pub use selector::{SelectorEngine, DEFAULT_LOOKBACK};
