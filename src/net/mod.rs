//! Networking helpers shared by the HTTP layer.
//!
//! - [`cors`] - Origin matching and CORS response headers
//! - [`gate`] - Bounded admission for expensive requests

pub mod cors;
pub mod gate;
