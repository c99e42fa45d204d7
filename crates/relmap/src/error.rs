//! Error types for relmap

use thiserror::Error;

/// Result type alias for relmap operations
pub type OrmResult<T> = Result<T, OrmError>;

/// Error types for mapping and database operations
#[derive(Debug, Error)]
pub enum OrmError {
    /// Database connection error
    #[error("Connection error: {0}")]
    Connection(String),

    /// Query execution error
    #[error("Query error: {0}")]
    Query(#[from] tokio_postgres::Error),

    /// Row not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// More rows than the operation allows
    #[error("Too many rows: expected at most {expected}, got {got}")]
    TooMany { expected: usize, got: usize },

    /// Unique constraint violation
    #[error("Unique constraint violation: {0}")]
    UniqueViolation(String),

    /// Foreign key constraint violation
    #[error("Foreign key violation: {0}")]
    ForeignKeyViolation(String),

    /// Check constraint violation
    #[error("Check constraint violation: {0}")]
    CheckViolation(String),

    /// Driver value could not be read from a result column
    #[error("Decode error on column '{column}': {message}")]
    Decode { column: String, message: String },

    /// Malformed metadata, nesting depth exceeded, invalid identifiers
    #[error("Configuration error: {0}")]
    Config(String),

    /// The builder cannot run the requested operation in its current state
    #[error("Invalid builder state: {reason}")]
    InvalidState { reason: String },

    /// Unknown property path on a record type
    #[error("Property '{property}' not found on {entity}")]
    PropertyNotFound { entity: String, property: String },

    /// No converter path exists between two types
    #[error("No converter from {from} to {to}")]
    ConversionNotFound { from: String, to: String },

    /// A converter rejected a value
    #[error("Cannot convert {value} from {from} to {to}: {reason}")]
    ConversionFailed {
        from: String,
        to: String,
        value: String,
        reason: String,
    },

    /// Pool error
    #[cfg(feature = "pool")]
    #[error("Pool error: {0}")]
    Pool(String),

    /// Other errors
    #[error("{0}")]
    Other(String),
}

impl OrmError {
    /// Create a decode error for a specific column
    pub fn decode(column: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Decode {
            column: column.into(),
            message: message.into(),
        }
    }

    /// Create a not found error
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create an invalid-state error
    pub fn invalid_state(reason: impl Into<String>) -> Self {
        Self::InvalidState {
            reason: reason.into(),
        }
    }

    pub fn too_many(expected: usize, got: usize) -> Self {
        Self::TooMany { expected, got }
    }

    pub fn property_not_found(entity: impl Into<String>, property: impl Into<String>) -> Self {
        Self::PropertyNotFound {
            entity: entity.into(),
            property: property.into(),
        }
    }

    /// Check if this is a unique violation error
    pub fn is_unique_violation(&self) -> bool {
        matches!(self, Self::UniqueViolation(_))
    }

    /// Check if this is a not found error
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    /// Check if this is a conversion error (missing converter or rejected value)
    pub fn is_conversion(&self) -> bool {
        matches!(
            self,
            Self::ConversionFailed { .. } | Self::ConversionNotFound { .. }
        )
    }

    /// Parse a tokio_postgres error into a more specific OrmError
    pub fn from_db_error(err: tokio_postgres::Error) -> Self {
        if let Some(db_err) = err.as_db_error() {
            let constraint = db_err.constraint().unwrap_or("unknown");
            let message = db_err.message();

            match db_err.code().code() {
                "23505" => return Self::UniqueViolation(format!("{}: {}", constraint, message)),
                "23503" => {
                    return Self::ForeignKeyViolation(format!("{}: {}", constraint, message));
                }
                "23514" => return Self::CheckViolation(format!("{}: {}", constraint, message)),
                _ => {}
            }
        }
        Self::Query(err)
    }
}

#[cfg(feature = "pool")]
impl From<deadpool_postgres::PoolError> for OrmError {
    fn from(err: deadpool_postgres::PoolError) -> Self {
        Self::Pool(err.to_string())
    }
}
