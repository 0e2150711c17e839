//! # xopay-notify-server
//!
//! Process wiring for the XOPay notify service: configuration loading,
//! tracing setup, the admin HTTP surface and the startup/shutdown
//! choreography of the queue consumer, the notification engine and the
//! currency daemon.

pub mod admin;
pub mod config;
pub mod observability;
pub mod server;

pub use config::AppConfig;
pub use observability::init_tracing;
pub use server::{Server, ServerError};
