//! # Error Handling
//!
//! This module defines the centralized error handling mechanism for
//! `stagewright`. It uses the `thiserror` library to create a single `Error`
//! enum covering every anticipated failure mode, with messages that name the
//! variant, field, or instruction involved.
//!
//! ## Key Components
//!
//! - **`Error`**: The main enum that represents all possible errors. Each
//!   variant corresponds to one failure family and carries the context needed
//!   to act on it.
//!
//! - **`ValidationErrors`**: A batch of field-addressed configuration
//!   problems. Validation never stops at the first problem, so the user sees
//!   everything that is wrong in one pass.
//!
//! - **`Result<T>`**: A type alias for `std::result::Result<T, Error>`.
//!
//! ## Error Families
//!
//! - Configuration parsing and validation errors.
//! - Cycles in the `includes` or `copies` reference graphs.
//! - Instruction compilation and named-context resolution errors.
//! - Compilation errors wrapped with the variant being compiled.
//! - Errors raised by an external build-graph engine, passed through as-is.
//! - Cancellation and lock poisoning.
//! - Wrapped I/O, YAML, JSON, regex, and URL errors.
//!
//! Compilation failures are memoized and handed to every waiter of the
//! failing variant, so `Compilation` and `External` hold their payloads
//! behind an `Arc` and can be cheaply duplicated with [`Error::shared`].

use std::fmt;
use std::sync::Arc;

use thiserror::Error;

/// A single field-addressed configuration problem.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    /// Dotted path of the offending field, e.g. `variants.prod.includes[1]`.
    pub field: String,
    /// Human-readable description of the problem.
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// An ordered batch of [`FieldError`]s.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationErrors {
    errors: Vec<FieldError>,
}

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.errors.push(FieldError::new(field, message));
    }

    pub fn extend(&mut self, other: ValidationErrors) {
        self.errors.extend(other.errors);
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &FieldError> {
        self.errors.iter()
    }

    /// Converts the batch into `Ok(())` when empty, or a `Validation` error.
    pub fn into_result(self) -> Result<()> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(Error::Validation(self))
        }
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let lines: Vec<String> = self.errors.iter().map(ToString::to_string).collect();
        write!(f, "{}", lines.join("\n"))
    }
}

/// Main error type for stagewright operations
#[derive(Error, Debug)]
pub enum Error {
    /// The configuration document could not be parsed into the schema.
    ///
    /// Optionally carries a hint about how to fix the document.
    #[error("Configuration parsing error: {message}{}", hint.as_ref().map(|h| format!("\n  hint: {}", h)).unwrap_or_default())]
    ConfigParse {
        message: String,
        /// Optional hint for how to fix the configuration issue
        hint: Option<String>,
    },

    /// One or more configuration fields failed validation.
    #[error("Configuration validation failed:\n{0}")]
    Validation(ValidationErrors),

    /// A circular reference was found in the `includes` or `copies` graph.
    #[error("Cycle detected in variant dependencies: {cycle}")]
    CycleDetected { cycle: String },

    /// A variant was requested or referenced but is not defined.
    #[error("Unknown variant: {name}")]
    UnknownVariant { name: String },

    /// An instruction could not be turned into build-graph operations.
    #[error("Instruction compilation error: {instruction} - {message}")]
    Instruction { instruction: String, message: String },

    /// A named context (variant, image, or client context) could not be
    /// resolved.
    #[error("Named context error: {name} - {message}")]
    NamedContext { name: String, message: String },

    /// Compiling a variant failed. The originating error is kept as the source.
    #[error("Failed to compile variant \"{variant}\": {source}")]
    Compilation {
        variant: String,
        #[source]
        source: Arc<Error>,
    },

    /// An error raised by the external build-graph engine or a client
    /// provided context resolver.
    #[error("{0}")]
    External(Arc<dyn std::error::Error + Send + Sync>),

    /// Compilation was cancelled before the variant finished compiling.
    #[error("Compilation of variant \"{variant}\" was cancelled")]
    Cancelled { variant: String },

    /// A shared compilation result that does not fit the other families.
    #[error(transparent)]
    Shared(Arc<Error>),

    /// An error indicating that a mutex or other lock has been poisoned.
    #[error("Lock poisoned: {context}")]
    LockPoisoned { context: String },

    /// An I/O error, wrapped from `std::io::Error`.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A YAML parsing error, wrapped from `serde_yaml::Error`.
    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// A JSON error, wrapped from `serde_json::Error`.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A regular expression error, wrapped from `regex::Error`.
    #[error("Regex error: {0}")]
    Regex(#[from] regex::Error),

    /// A URL parsing error, wrapped from `url::ParseError`.
    #[error("URL parsing error: {0}")]
    UrlParse(#[from] url::ParseError),
}

impl Error {
    /// Wraps an external engine error so it is passed through unmodified.
    pub fn external<E>(error: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Error::External(Arc::new(error))
    }

    /// Attaches the name of the variant being compiled.
    ///
    /// External and cancellation errors already identify themselves and are
    /// returned untouched.
    pub fn in_variant(self, variant: &str) -> Self {
        match self {
            Error::External(_) | Error::Cancelled { .. } => self,
            other => Error::Compilation {
                variant: variant.to_string(),
                source: Arc::new(other),
            },
        }
    }

    /// Produces an owned copy of a memoized error.
    pub fn shared(error: &Arc<Error>) -> Self {
        match error.as_ref() {
            Error::Compilation { variant, source } => Error::Compilation {
                variant: variant.clone(),
                source: Arc::clone(source),
            },
            Error::External(inner) => Error::External(Arc::clone(inner)),
            Error::Cancelled { variant } => Error::Cancelled {
                variant: variant.clone(),
            },
            _ => Error::Shared(Arc::clone(error)),
        }
    }

    /// Returns the innermost error, looking through compilation wrappers.
    pub fn root_cause(&self) -> &Error {
        match self {
            Error::Compilation { source, .. } | Error::Shared(source) => source.root_cause(),
            other => other,
        }
    }
}

/// A convenient type alias for `Result<T, Error>`.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct EngineFailure;

    impl fmt::Display for EngineFailure {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "solver exploded")
        }
    }

    impl std::error::Error for EngineFailure {}

    #[test]
    fn test_error_display_config_parse() {
        let error = Error::ConfigParse {
            message: "Invalid YAML".to_string(),
            hint: None,
        };
        let display = format!("{}", error);
        assert!(display.contains("Configuration parsing error"));
        assert!(display.contains("Invalid YAML"));
    }

    #[test]
    fn test_error_display_config_parse_with_hint() {
        let error = Error::ConfigParse {
            message: "variants must be a mapping".to_string(),
            hint: Some("Use `variants: {name: {...}}`".to_string()),
        };
        let display = format!("{}", error);
        assert!(display.contains("hint:"));
        assert!(display.contains("variants: {name"));
    }

    #[test]
    fn test_error_display_cycle_detected() {
        let error = Error::CycleDetected {
            cycle: "build -> test -> build".to_string(),
        };
        let display = format!("{}", error);
        assert!(display.contains("Cycle detected"));
        assert!(display.contains("build -> test -> build"));
    }

    #[test]
    fn test_validation_errors_display_one_per_line() {
        let mut errors = ValidationErrors::new();
        errors.push("variants", "contains a bad variant name");
        errors.push("lives.in", "\"/\" is not a valid absolute non-root path");

        assert_eq!(
            errors.to_string(),
            "variants: contains a bad variant name\nlives.in: \"/\" is not a valid absolute non-root path"
        );
        assert_eq!(errors.len(), 2);
    }

    #[test]
    fn test_validation_errors_into_result() {
        assert!(ValidationErrors::new().into_result().is_ok());

        let mut errors = ValidationErrors::new();
        errors.push("version", "is required");
        match errors.into_result() {
            Err(Error::Validation(batch)) => assert_eq!(batch.len(), 1),
            other => panic!("Expected Validation error, got {:?}", other),
        }
    }

    #[test]
    fn test_in_variant_wraps_with_name() {
        let error = Error::UnknownVariant {
            name: "missing".to_string(),
        }
        .in_variant("prod");
        let display = error.to_string();
        assert!(display.contains("\"prod\""));
        assert!(display.contains("Unknown variant: missing"));
        match error.root_cause() {
            Error::UnknownVariant { name } => assert_eq!(name, "missing"),
            other => panic!("Expected UnknownVariant, got {:?}", other),
        }
    }

    #[test]
    fn test_in_variant_passes_external_through() {
        let error = Error::external(EngineFailure).in_variant("prod");
        match &error {
            Error::External(_) => {}
            other => panic!("Expected External error, got {:?}", other),
        }
        assert_eq!(error.to_string(), "solver exploded");
    }

    #[test]
    fn test_shared_clones_compilation() {
        let original = Arc::new(
            Error::Instruction {
                instruction: "Run".to_string(),
                message: "bad".to_string(),
            }
            .in_variant("build"),
        );
        let first = Error::shared(&original);
        let second = Error::shared(&original);
        assert_eq!(first.to_string(), second.to_string());
        match (&first, original.as_ref()) {
            (
                Error::Compilation { source: a, .. },
                Error::Compilation { source: b, .. },
            ) => assert!(Arc::ptr_eq(a, b)),
            other => panic!("Expected Compilation errors, got {:?}", other),
        }
    }

    #[test]
    fn test_error_from_yaml_error() {
        let yaml_error = serde_yaml::from_str::<serde_yaml::Value>("invalid: [unclosed").unwrap_err();
        let error: Error = yaml_error.into();
        assert!(format!("{}", error).contains("YAML parsing error"));
    }

    #[test]
    fn test_error_from_io_error() {
        let io_error = std::io::Error::new(std::io::ErrorKind::NotFound, "File not found");
        let error: Error = io_error.into();
        let display = format!("{}", error);
        assert!(display.contains("I/O error"));
        assert!(display.contains("File not found"));
    }
}
