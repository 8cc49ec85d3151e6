//! ClawdBot Dashboard Data Access
//!
//! Reads and writes the bot's configuration, predictions, trades and
//! metrics for the operator dashboard.
//!
//! ## Architecture
//!
//! ```text
//!                        ┌→ DirectReader → DocumentStore (Firestore REST)
//! Dashboard → DataAccess ┤       (first)
//!                        └→ ApiClient → Backend API  {success, data|id}
//!                                (fallback reads, all writes)
//! ```

pub mod client;
pub mod config;
pub mod dashboard;
pub mod error;
pub mod fallback;
pub mod store;
pub mod testing;
pub mod types;

#[cfg(test)]
mod fallback_tests;
