//! Consumption Prediction Control Server
//!
//! HTTP boundary over [`consumption_core::ControlApi`]. The binary in
//! `main.rs` only parses flags, sets up logging and serves [`router`].

pub mod context;
pub mod render;
pub mod routes;

pub use context::AppState;
pub use routes::router;
