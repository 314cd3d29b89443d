//! Layered error definitions
//!
//! Categorized by source: config / transport / decode / resource api

use thiserror::Error;

/// Unified error type
#[derive(Debug, Error)]
pub enum ContractError {
    // ===== Configuration Errors =====
    /// Configuration parse error
    #[error("config parse error: {message}")]
    ConfigParse {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Configuration validation error
    #[error("config validation error at '{field}': {message}")]
    ConfigValidation { field: String, message: String },

    // ===== Transport Errors =====
    /// Pub/sub transport error
    #[error("transport error: {message}")]
    Transport { message: String },

    // ===== Decode Errors =====
    /// Inbound payload could not be decoded into a telemetry event
    #[error("payload decode error: {message}")]
    Decode { message: String },

    // ===== Resource API Errors =====
    /// Resource API request failed
    #[error("resource api {operation} failed for '{href}': {message}")]
    ResourceApi {
        operation: &'static str,
        href: String,
        message: String,
    },

    /// Resource does not expose the requested relation
    #[error("resource '{href}' has no relation '{relation}'")]
    MissingRelation { href: String, relation: String },

    /// Response body is not a usable hypermedia document
    #[error("malformed hypermedia document from '{href}': {message}")]
    MalformedDocument { href: String, message: String },

    // ===== General Errors =====
    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl ContractError {
    /// Create configuration parse error
    pub fn config_parse(message: impl Into<String>) -> Self {
        Self::ConfigParse {
            message: message.into(),
            source: None,
        }
    }

    /// Create configuration validation error
    pub fn config_validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ConfigValidation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create transport error
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
        }
    }

    /// Create payload decode error
    pub fn decode(message: impl Into<String>) -> Self {
        Self::Decode {
            message: message.into(),
        }
    }

    /// Create resource API error
    pub fn resource_api(
        operation: &'static str,
        href: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::ResourceApi {
            operation,
            href: href.into(),
            message: message.into(),
        }
    }

    /// Create missing relation error
    pub fn missing_relation(href: impl Into<String>, relation: impl Into<String>) -> Self {
        Self::MissingRelation {
            href: href.into(),
            relation: relation.into(),
        }
    }

    /// Create malformed document error
    pub fn malformed(href: impl Into<String>, message: impl Into<String>) -> Self {
        Self::MalformedDocument {
            href: href.into(),
            message: message.into(),
        }
    }
}
