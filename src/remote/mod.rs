//! Remote-read protocol:
//! - [`proto`] - Wire messages
//! - [`codec`] - Snappy-compressed protobuf bodies
//! - [`labels`] - External-label rewrite and merge
//! - [`read`] - Request handler

pub mod codec;
pub mod labels;
pub mod proto;
pub mod read;

pub use read::{RemoteReadError, RemoteReadHandler};
