//! Engine core: configuration, assembly and lifecycle.
//!
//! The public API from this module is [`HealthCheckEngine`] (with its
//! [`EngineBuilder`]), [`Config`] / [`load_config`] and [`Switches`].
//!
//! Internal modules:
//! - [`config`]: settings, TOML loading and runtime switches;
//! - [`builder`]: wires bus, metadata, responsibility, checkers and chains;
//! - [`engine`]: beats, client lifecycle, on-demand checks, teardown;
//! - [`shutdown`]: cross-platform shutdown signal handling.

mod builder;
mod config;
mod engine;
mod shutdown;

pub use builder::EngineBuilder;
pub use config::{Config, Switches, load_config};
pub use engine::HealthCheckEngine;
