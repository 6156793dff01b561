use crate::config::ConfigError;
use std::fmt;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AnnogenError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("expected at most 1 @{kind} annotation, but got: {count}")]
    Cardinality { kind: String, count: usize },

    #[error("@{kind} must annotate a {expected}, found {found} `{name}`")]
    ShapeMismatch {
        kind: String,
        expected: String,
        found: String,
        name: String,
    },

    #[error("unable to resolve package name for \"{import_path}\" from {file}: {reason}")]
    NameResolution {
        import_path: String,
        file: String,
        reason: String,
    },

    /// Non-fatal: callers fall back to the import-path heuristic.
    #[error("no module provides package \"{0}\"")]
    ModuleNotFound(String),

    #[error("generator {generator} failed: {reason}")]
    Generator { generator: String, reason: String },

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Environment error: {0}")]
    Environment(String),

    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    #[error(transparent)]
    Aggregate(AggregateError),
}

impl AnnogenError {
    pub fn generator(generator: impl Into<String>, reason: impl Into<String>) -> Self {
        AnnogenError::Generator {
            generator: generator.into(),
            reason: reason.into(),
        }
    }

    pub fn is_module_not_found(&self) -> bool {
        matches!(self, AnnogenError::ModuleNotFound(_))
    }

    /// Flattens nested aggregates into their leaf failures.
    pub fn into_leaves(self) -> Vec<AnnogenError> {
        match self {
            AnnogenError::Aggregate(agg) => agg
                .errors
                .into_iter()
                .flat_map(AnnogenError::into_leaves)
                .collect(),
            other => vec![other],
        }
    }
}

pub type Result<T> = std::result::Result<T, AnnogenError>;

/// Independent failures collected into one value instead of stopping at the
/// first one.
#[derive(Debug, Default)]
pub struct AggregateError {
    errors: Vec<AnnogenError>,
}

impl AggregateError {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, error: AnnogenError) {
        match error {
            AnnogenError::Aggregate(inner) => self.errors.extend(inner.errors),
            other => self.errors.push(other),
        }
    }

    /// Records the error of a failed result, discarding the success value.
    pub fn record<T>(&mut self, result: Result<T>) -> Option<T> {
        match result {
            Ok(value) => Some(value),
            Err(e) => {
                self.push(e);
                None
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn errors(&self) -> &[AnnogenError] {
        &self.errors
    }

    pub fn into_errors(self) -> Vec<AnnogenError> {
        self.errors
    }

    /// `Ok` when nothing failed, the lone error when exactly one did, the
    /// aggregate otherwise.
    pub fn into_result(mut self) -> Result<()> {
        match self.errors.len() {
            0 => Ok(()),
            1 => Err(self.errors.remove(0)),
            _ => Err(AnnogenError::Aggregate(self)),
        }
    }
}

impl Extend<AnnogenError> for AggregateError {
    fn extend<I: IntoIterator<Item = AnnogenError>>(&mut self, iter: I) {
        for error in iter {
            self.push(error);
        }
    }
}

impl FromIterator<AnnogenError> for AggregateError {
    fn from_iter<I: IntoIterator<Item = AnnogenError>>(iter: I) -> Self {
        let mut agg = AggregateError::new();
        agg.extend(iter);
        agg
    }
}

impl fmt::Display for AggregateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} failures:", self.errors.len())?;
        for error in &self.errors {
            write!(f, "\n  - {}", error)?;
        }
        Ok(())
    }
}

impl std::error::Error for AggregateError {}
