//! Configuration validation
//!
//! Rules:
//! - field-level constraints declared on the config structs (`Validate` derive)
//! - resource API URL uses http or https
//! - broker URL splits into host and numeric port
//! - subscription topic is a well-formed MQTT topic filter

use ::validator::{Validate, ValidationErrors, ValidationErrorsKind};
use contracts::{CollectorConfig, ContractError};

/// Validate a CollectorConfig
///
/// Returns the first error encountered, or Ok(()).
pub fn validate(config: &CollectorConfig) -> Result<(), ContractError> {
    validate_fields(config)?;
    validate_resource_api_url(config)?;
    validate_broker_url(config)?;
    validate_topic_filter(&config.transport.topic)?;
    Ok(())
}

/// Run the declarative field constraints
fn validate_fields(config: &CollectorConfig) -> Result<(), ContractError> {
    match config.validate() {
        Ok(()) => Ok(()),
        Err(errors) => {
            let (field, message) = first_violation(&errors, "")
                .unwrap_or_else(|| ("config".to_string(), errors.to_string()));
            Err(ContractError::config_validation(field, message))
        }
    }
}

/// Depth-first search for the first violated field, as a dotted path
///
/// Keys are visited in sorted order so the reported field is stable.
fn first_violation(errors: &ValidationErrors, prefix: &str) -> Option<(String, String)> {
    let mut entries: Vec<_> = errors.errors().iter().collect();
    entries.sort_by(|a, b| a.0.cmp(b.0));

    for (field, kind) in entries {
        let path = if prefix.is_empty() {
            field.to_string()
        } else {
            format!("{prefix}.{field}")
        };
        let found = match kind {
            ValidationErrorsKind::Field(violations) => violations
                .first()
                .map(|v| (path.clone(), format!("failed '{}' check", v.code))),
            ValidationErrorsKind::Struct(nested) => first_violation(nested, &path),
            ValidationErrorsKind::List(items) => items
                .iter()
                .find_map(|(idx, nested)| first_violation(nested, &format!("{path}[{idx}]"))),
        };
        if found.is_some() {
            return found;
        }
    }
    None
}

/// Validate the resource API URL scheme
fn validate_resource_api_url(config: &CollectorConfig) -> Result<(), ContractError> {
    let url = config.resource_api.url.trim();
    if url.starts_with("http://") || url.starts_with("https://") {
        Ok(())
    } else {
        Err(ContractError::config_validation(
            "resource_api.url",
            format!("url must use http or https, got '{url}'"),
        ))
    }
}

/// Validate the broker address
fn validate_broker_url(config: &CollectorConfig) -> Result<(), ContractError> {
    config.transport.broker_address().map(|_| ())
}

/// Validate the subscription topic filter
///
/// `+` must fill a whole level; `#` must fill the last level.
fn validate_topic_filter(filter: &str) -> Result<(), ContractError> {
    let invalid = |message: String| Err(ContractError::config_validation("transport.topic", message));

    if filter.is_empty() {
        return invalid("topic filter must not be empty".to_string());
    }
    if filter.contains('\0') {
        return invalid("topic filter must not contain NUL".to_string());
    }

    let levels: Vec<&str> = filter.split('/').collect();
    let last = levels.len() - 1;
    for (idx, level) in levels.iter().enumerate() {
        if level.contains('#') && (*level != "#" || idx != last) {
            return invalid(format!("'#' must be the whole last level in '{filter}'"));
        }
        if level.contains('+') && *level != "+" {
            return invalid(format!("'+' must be a whole level in '{filter}'"));
        }
    }
    Ok(())
}
