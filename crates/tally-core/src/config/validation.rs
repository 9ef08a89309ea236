//! Configuration validation utilities and rules

use regex::Regex;
use std::fmt;

use crate::TallyError;

/// Configuration validation errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Value is required but missing
    Required { field: String },
    /// Value is below the accepted minimum
    TooSmall { field: String, min: u64, actual: u64 },
    /// Value is not a usable pattern
    InvalidPattern { field: String, reason: String },
    /// Custom validation failed
    Custom { field: String, message: String },
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationError::Required { field } => {
                write!(f, "Field '{field}' is required but missing")
            }
            ValidationError::TooSmall { field, min, actual } => {
                write!(f, "Field '{field}' must be at least {min} (got {actual})")
            }
            ValidationError::InvalidPattern { field, reason } => {
                write!(f, "Field '{field}' is not a valid pattern: {reason}")
            }
            ValidationError::Custom { field, message } => {
                write!(f, "Field '{field}': {message}")
            }
        }
    }
}

impl std::error::Error for ValidationError {}

impl From<ValidationError> for TallyError {
    fn from(err: ValidationError) -> Self {
        TallyError::configuration(err.to_string())
    }
}

/// Configuration validator that accumulates validation rules
#[derive(Debug, Default)]
pub struct ConfigValidator {
    errors: Vec<ValidationError>,
    field_prefix: String,
}

impl ConfigValidator {
    /// Create a new validator
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a validator for a nested section
    pub fn for_field(&self, field_name: &str) -> Self {
        Self {
            errors: Vec::new(),
            field_prefix: self.full_field_name(field_name),
        }
    }

    /// Validate that a string is present and non-blank
    pub fn required(&mut self, field_name: &str, value: &str) -> &mut Self {
        if value.trim().is_empty() {
            self.errors.push(ValidationError::Required {
                field: self.full_field_name(field_name),
            });
        }
        self
    }

    /// Validate a lower bound
    pub fn at_least(&mut self, field_name: &str, value: u64, min: u64) -> &mut Self {
        if value < min {
            self.errors.push(ValidationError::TooSmall {
                field: self.full_field_name(field_name),
                min,
                actual: value,
            });
        }
        self
    }

    /// Validate that a pattern compiles and has at least one capture group.
    /// An empty pattern is accepted when `optional` is set.
    pub fn capture_pattern(&mut self, field_name: &str, pattern: &str, optional: bool) -> &mut Self {
        if pattern.is_empty() {
            if !optional {
                self.errors.push(ValidationError::Required {
                    field: self.full_field_name(field_name),
                });
            }
            return self;
        }
        match Regex::new(pattern) {
            Ok(re) if re.captures_len() < 2 => {
                self.errors.push(ValidationError::InvalidPattern {
                    field: self.full_field_name(field_name),
                    reason: "pattern needs a capture group for the value".to_string(),
                });
            }
            Ok(_) => {}
            Err(e) => {
                self.errors.push(ValidationError::InvalidPattern {
                    field: self.full_field_name(field_name),
                    reason: e.to_string(),
                });
            }
        }
        self
    }

    /// Validate using a custom predicate
    pub fn custom<T, F>(&mut self, field_name: &str, value: &T, predicate: F, message: &str) -> &mut Self
    where
        F: FnOnce(&T) -> bool,
    {
        if !predicate(value) {
            self.errors.push(ValidationError::Custom {
                field: self.full_field_name(field_name),
                message: message.to_string(),
            });
        }
        self
    }

    /// Merge errors from another validator
    pub fn merge(&mut self, other: ConfigValidator) {
        self.errors.extend(other.errors);
    }

    /// All errors joined into one configuration error
    pub fn finish(self) -> Result<(), TallyError> {
        if self.errors.is_empty() {
            return Ok(());
        }
        let joined = self
            .errors
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("; ");
        Err(TallyError::configuration(joined))
    }

    /// Get all validation errors
    pub fn all_errors(self) -> Vec<ValidationError> {
        self.errors
    }

    fn full_field_name(&self, field_name: &str) -> String {
        if self.field_prefix.is_empty() {
            field_name.to_string()
        } else {
            format!("{}.{}", self.field_prefix, field_name)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nested_field_names() {
        let root = ConfigValidator::new();
        let mut section = root.for_field("sync");
        section.at_least("max_concurrent_events", 0, 1);
        let errors = section.all_errors();
        assert_eq!(
            errors,
            vec![ValidationError::TooSmall {
                field: "sync.max_concurrent_events".into(),
                min: 1,
                actual: 0
            }]
        );
    }

    #[test]
    fn test_capture_pattern_rules() {
        let mut v = ConfigValidator::new();
        v.capture_pattern("a", r"total (\d+)", false)
            .capture_pattern("b", "", true)
            .capture_pattern("c", r"total \d+", false)
            .capture_pattern("d", r"(unclosed", false)
            .capture_pattern("e", "", false);
        assert_eq!(v.all_errors().len(), 3);
    }

    #[test]
    fn test_finish_joins_errors() {
        let mut v = ConfigValidator::new();
        v.required("inbox.user", " ").at_least("x", 0, 1);
        let err = v.finish().unwrap_err();
        assert!(err.to_string().contains("inbox.user"));
        assert!(err.to_string().contains("'x'"));
    }
}
