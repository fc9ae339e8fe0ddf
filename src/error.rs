//! Error types used by the event bus, the health-check engine and config loading.
//!
//! This module defines three error enums:
//!
//! - [`BusError`]: routing and lifecycle failures of the [`EventBus`](crate::EventBus).
//! - [`HealthCheckError`]: failures of a single beat or check task.
//! - [`ConfigError`]: failures while loading a [`Config`](crate::Config).
//!
//! Each type provides `as_label` (stable snake_case label for logs/metrics);
//! `BusError` and `HealthCheckError` also provide `as_message`.

use std::any::Any;
use std::io;

use thiserror::Error;

use crate::events::EventType;

/// # Errors produced by the event bus.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BusError {
    /// Publish for a type that was never registered (configuration error).
    #[error("no publisher registered for event type '{event_type}'")]
    NoPublisher {
        /// The unregistered event type.
        event_type: EventType,
    },

    /// The bus was shut down; no further publishing.
    #[error("event bus is closed")]
    Closed,

    /// The publisher for this type was shut down or deregistered.
    #[error("publisher for '{event_type}' is shut down")]
    PublisherShutdown {
        /// Type served by the stopped publisher.
        event_type: EventType,
    },

    /// A publisher loop had to be started outside a Tokio runtime.
    #[error("no tokio runtime to start the publisher for '{event_type}'")]
    NoRuntime {
        /// Type whose publisher could not be started.
        event_type: EventType,
    },
}

impl BusError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use beatvisor::{BusError, EventType};
    ///
    /// let err = BusError::NoPublisher { event_type: EventType::ClientChanged };
    /// assert_eq!(err.as_label(), "bus_no_publisher");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            BusError::NoPublisher { .. } => "bus_no_publisher",
            BusError::Closed => "bus_closed",
            BusError::PublisherShutdown { .. } => "bus_publisher_shutdown",
            BusError::NoRuntime { .. } => "bus_no_runtime",
        }
    }

    /// Returns a human-readable message with details about the error.
    pub fn as_message(&self) -> String {
        match self {
            BusError::NoPublisher { event_type } => format!("no publisher: {event_type}"),
            BusError::Closed => "bus closed".to_string(),
            BusError::PublisherShutdown { event_type } => {
                format!("publisher shut down: {event_type}")
            }
            BusError::NoRuntime { event_type } => format!("no runtime for: {event_type}"),
        }
    }
}

/// # Errors produced by beat ingestion and check tasks.
///
/// A check task that fails leaves its instance untouched; the error is logged
/// at the task boundary and does not affect other tasks.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum HealthCheckError {
    /// No client is registered under this id.
    #[error("client '{client_id}' not found")]
    ClientNotFound {
        /// The unknown client id.
        client_id: String,
    },

    /// The client does not publish an instance for this service/address.
    #[error("instance {ip}:{port} of '{service}' not found")]
    InstanceNotFound {
        /// Grouped service name.
        service: String,
        /// Requested ip.
        ip: String,
        /// Requested port.
        port: u16,
    },

    /// A metadata override could not be parsed.
    #[error("invalid metadata value for '{key}': '{value}'")]
    InvalidMetadata {
        /// Metadata key.
        key: String,
        /// Raw value.
        value: String,
    },

    /// Publishing a transition event failed.
    #[error("event bus failure: {0}")]
    Bus(#[from] BusError),

    /// A checker or interceptor panicked.
    #[error("check task panicked: {info}")]
    Panicked {
        /// Panic payload rendered as text.
        info: String,
    },
}

impl HealthCheckError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use beatvisor::HealthCheckError;
    ///
    /// let err = HealthCheckError::ClientNotFound { client_id: "c1".into() };
    /// assert_eq!(err.as_label(), "check_client_not_found");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            HealthCheckError::ClientNotFound { .. } => "check_client_not_found",
            HealthCheckError::InstanceNotFound { .. } => "check_instance_not_found",
            HealthCheckError::InvalidMetadata { .. } => "check_invalid_metadata",
            HealthCheckError::Bus(_) => "check_bus_failure",
            HealthCheckError::Panicked { .. } => "check_panicked",
        }
    }

    /// Returns a human-readable message with details about the error.
    pub fn as_message(&self) -> String {
        match self {
            HealthCheckError::ClientNotFound { client_id } => format!("client: {client_id}"),
            HealthCheckError::InstanceNotFound { service, ip, port } => {
                format!("instance: {service} {ip}:{port}")
            }
            HealthCheckError::InvalidMetadata { key, value } => format!("{key}={value}"),
            HealthCheckError::Bus(err) => err.as_message(),
            HealthCheckError::Panicked { info } => format!("panic: {info}"),
        }
    }
}

/// # Errors produced while loading configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("failed to read config file: {0}")]
    IoError(#[from] io::Error),

    /// The configuration file is not valid TOML for [`Config`](crate::Config).
    #[error("failed to parse config file: {0}")]
    ParseError(#[from] toml::de::Error),
}

impl ConfigError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            ConfigError::IoError(_) => "config_io",
            ConfigError::ParseError(_) => "config_parse",
        }
    }
}

/// Renders a caught panic payload.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&'static str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bus_error_wraps_into_check_error() {
        let err: HealthCheckError = BusError::Closed.into();
        assert_eq!(err.as_label(), "check_bus_failure");
        assert_eq!(err.as_message(), "bus closed");
    }

    #[test]
    fn test_panic_message_formats_payloads() {
        let s: Box<dyn Any + Send> = Box::new("boom");
        assert_eq!(panic_message(s.as_ref()), "boom");
        let s: Box<dyn Any + Send> = Box::new(String::from("owned"));
        assert_eq!(panic_message(s.as_ref()), "owned");
        let s: Box<dyn Any + Send> = Box::new(7u8);
        assert_eq!(panic_message(s.as_ref()), "unknown panic");
    }
}
