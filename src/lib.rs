//! Alif · Arabic alphabet trainer backend.
//!
//! Library half of the crate: the binary only wires tracing, state and the listener,
//! so integration tests can drive the same router in-process.

pub mod auth;
pub mod catalog;
pub mod config;
pub mod domain;
pub mod error;
pub mod gating;
pub mod logic;
pub mod openai;
pub mod protocol;
pub mod quiz;
pub mod quran;
pub mod review;
pub mod routes;
pub mod session;
pub mod state;
pub mod store;
pub mod telemetry;
pub mod tts;
pub mod tutor;
pub mod util;

pub use routes::build_router;
pub use state::AppState;
