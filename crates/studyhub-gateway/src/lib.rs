//! studyhub-gateway - HTTP front for the study feature services
//!
//! Thin axum routes over [`studyhub_core::StudyAssistant`]. Handlers validate
//! input, call one service operation and shape the JSON reply; provider
//! names and raw errors never reach the client beyond a short `details` string.

pub mod routes;
pub mod server;

pub use server::{GatewayServer, GatewayState};

#[cfg(test)]
pub(crate) mod test_support;
