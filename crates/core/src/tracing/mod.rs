//! Shared tracing setup for the Edificio client

pub mod config;
pub mod init;

pub use config::InstrumentationConfig;
pub use init::init_tracing;
