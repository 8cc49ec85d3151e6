//! Access paths to dashboard data
//!
//! - [`DirectReader`]: reads straight from the document store
//! - [`ApiClient`]: backend HTTP API, all writes and the fallback reads

pub mod api;
pub mod direct;

pub use api::{ApiClient, Envelope};
pub use direct::DirectReader;
