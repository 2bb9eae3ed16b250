//! Core types module

mod config;


pub use config::{DebugLevel, SessionConfig, SessionConfigBuilder, TICK};
