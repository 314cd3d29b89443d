//! # Classifier
//!
//! Data-driven field classification for telemetry payloads.
//!
//! Two ordered, first-match-wins tables:
//! - the ignore table decides which fields never become sensors
//! - the unit table maps a metric name to its physical unit
//!
//! ```
//! use classifier::FieldClassifier;
//!
//! let classifier = FieldClassifier::standard().unwrap();
//! assert!(classifier.should_ignore("dev_temp"));
//! assert_eq!(classifier.lookup_unit("env_temp"), "°C");
//! ```

mod matcher;
mod tables;

pub use matcher::{ClassifierError, FieldMatcher, RuleSpec};
pub use tables::{STANDARD_IGNORE_RULES, STANDARD_UNIT_RULES, UNKNOWN_UNIT};

/// Ordered ignore and unit tables
#[derive(Debug, Clone)]
pub struct FieldClassifier {
    ignore_rules: Vec<FieldMatcher>,
    unit_rules: Vec<(FieldMatcher, String)>,
}

impl FieldClassifier {
    /// Compile a classifier from rule specifications
    ///
    /// # Errors
    /// Returns an error if any pattern rule is not a valid regex.
    pub fn compile(
        ignore_rules: &[RuleSpec<'_>],
        unit_rules: &[(RuleSpec<'_>, &str)],
    ) -> Result<Self, ClassifierError> {
        let ignore_rules = ignore_rules
            .iter()
            .map(FieldMatcher::compile)
            .collect::<Result<Vec<_>, _>>()?;
        let unit_rules = unit_rules
            .iter()
            .map(|(spec, unit)| Ok((FieldMatcher::compile(spec)?, unit.to_string())))
            .collect::<Result<Vec<_>, ClassifierError>>()?;

        Ok(Self {
            ignore_rules,
            unit_rules,
        })
    }

    /// Classifier with the built-in tables
    pub fn standard() -> Result<Self, ClassifierError> {
        Self::compile(STANDARD_IGNORE_RULES, STANDARD_UNIT_RULES)
    }

    /// Whether a field must not be stored as a sensor
    pub fn should_ignore(&self, field_name: &str) -> bool {
        self.ignore_rules.iter().any(|rule| rule.matches(field_name))
    }

    /// Physical unit for a metric, `"unknown"` when no rule matches
    pub fn lookup_unit(&self, metric_name: &str) -> &str {
        self.unit_rules
            .iter()
            .find(|(rule, _)| rule.matches(metric_name))
            .map(|(_, unit)| unit.as_str())
            .unwrap_or(UNKNOWN_UNIT)
    }
}
