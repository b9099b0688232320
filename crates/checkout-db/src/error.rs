//! # Database Error Types
//!
//! Storage errors, and the checkout error that separates user-facing
//! rejections from commit failures.
//!
//! ## Error Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Error Propagation                                    │
//! │                                                                         │
//! │  SQLite Error (sqlx::Error)          Rule violation (CoreError)         │
//! │       │                                   │                             │
//! │       ▼                                   │                             │
//! │  DbError ← Adds categorization            │                             │
//! │       │                                   │                             │
//! │       ▼                                   ▼                             │
//! │  CheckoutError::Commit            CheckoutError::Domain                 │
//! │       │                                   │                             │
//! │       └─────────────┬─────────────────────┘                             │
//! │                     ▼                                                   │
//! │  Rejection { kind, message } ← Serialized for the storefront            │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use checkout_core::{CoreError, DiscountRejection, ErrorKind, Rejection, ValidationError};
use thiserror::Error;

/// Database operation errors.
///
/// These errors wrap sqlx errors and provide additional context
/// for debugging and user feedback.
#[derive(Debug, Error)]
pub enum DbError {
    /// Entity not found in database.
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// Unique constraint violation.
    ///
    /// ## When This Occurs
    /// - Creating a discount code that already exists
    /// - Inserting a duplicate SKU
    /// - A second cart for the same owner
    #[error("Duplicate {field}: '{value}' already exists")]
    UniqueViolation { field: String, value: String },

    /// Foreign key constraint violation.
    #[error("Foreign key violation: {message}")]
    ForeignKeyViolation { message: String },

    /// A CHECK constraint rejected the row (negative stock, bad quantity).
    #[error("Constraint violation: {0}")]
    ConstraintViolation(String),

    /// Input rejected before reaching SQL.
    #[error("Invalid input: {0}")]
    Invalid(#[from] ValidationError),

    /// Database connection failed.
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Migration failed.
    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    /// Query execution failed.
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// The database stayed locked past the busy timeout.
    #[error("Database is busy")]
    Busy,

    /// Pool exhausted (all connections in use).
    #[error("Connection pool exhausted")]
    PoolExhausted,

    /// Internal database error.
    #[error("Internal database error: {0}")]
    Internal(String),
}

impl DbError {
    /// Creates a NotFound error for a given entity type and ID.
    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        DbError::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }

    /// Creates a UniqueViolation error.
    pub fn duplicate(field: impl Into<String>, value: impl Into<String>) -> Self {
        DbError::UniqueViolation {
            field: field.into(),
            value: value.into(),
        }
    }

    /// Transient failures that may succeed when retried unchanged.
    pub fn is_transient(&self) -> bool {
        matches!(self, DbError::Busy | DbError::PoolExhausted)
    }
}

/// Convert sqlx errors to DbError.
///
/// ## Error Mapping
/// ```text
/// sqlx::Error::RowNotFound    → DbError::NotFound
/// sqlx::Error::Database       → Analyze message for constraint type
/// sqlx::Error::PoolTimedOut   → DbError::PoolExhausted
/// Other                       → DbError::Internal
/// ```
impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => DbError::not_found("Record", "unknown"),

            sqlx::Error::Database(db_err) => {
                let msg = db_err.message();

                // SQLite reports constraints as text:
                // "UNIQUE constraint failed: <table>.<column>"
                // "FOREIGN KEY constraint failed"
                // "CHECK constraint failed: <expr>"
                if let Some(field) = msg.strip_prefix("UNIQUE constraint failed: ") {
                    DbError::UniqueViolation {
                        field: field.to_string(),
                        value: "unknown".to_string(),
                    }
                } else if msg.contains("FOREIGN KEY constraint failed") {
                    DbError::ForeignKeyViolation {
                        message: msg.to_string(),
                    }
                } else if msg.contains("CHECK constraint failed") {
                    DbError::ConstraintViolation(msg.to_string())
                } else if msg.contains("database is locked") {
                    DbError::Busy
                } else {
                    DbError::QueryFailed(msg.to_string())
                }
            }

            sqlx::Error::PoolTimedOut => DbError::PoolExhausted,

            sqlx::Error::PoolClosed => DbError::ConnectionFailed("Pool is closed".to_string()),

            _ => DbError::Internal(err.to_string()),
        }
    }
}

impl From<sqlx::migrate::MigrateError> for DbError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        DbError::MigrationFailed(err.to_string())
    }
}

/// Result type for database operations.
pub type DbResult<T> = Result<T, DbError>;

// =============================================================================
// Checkout Error
// =============================================================================

/// Errors from operations that apply business rules against stored state.
///
/// ## Retry Semantics
/// ```text
/// Preview path   → read-only, any error is safe to retry as-is
/// Commit path    → Domain: re-fetch cart and catalog before retrying
///                  Commit(Busy | PoolExhausted): retry as-is
///                  Commit(other): nothing was persisted, report failure
/// ```
#[derive(Debug, Error)]
pub enum CheckoutError {
    /// A business rule rejected the request.
    #[error(transparent)]
    Domain(#[from] CoreError),

    /// Storage failed. The transaction was rolled back.
    #[error("Commit failed: {0}")]
    Commit(#[from] DbError),
}

impl From<sqlx::Error> for CheckoutError {
    fn from(err: sqlx::Error) -> Self {
        CheckoutError::Commit(err.into())
    }
}

impl From<ValidationError> for CheckoutError {
    fn from(err: ValidationError) -> Self {
        CheckoutError::Domain(err.into())
    }
}

impl CheckoutError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            CheckoutError::Domain(err) => err.kind(),
            CheckoutError::Commit(_) => ErrorKind::CommitFailed,
        }
    }

    /// The rejection handed to the storefront.
    ///
    /// Storage details stay in the logs; the shopper gets a generic message.
    pub fn to_rejection(&self) -> Rejection {
        match self {
            CheckoutError::Domain(err) => err.to_rejection(),
            CheckoutError::Commit(_) => Rejection {
                kind: ErrorKind::CommitFailed,
                message: "The order could not be placed. Nothing was charged or reserved."
                    .to_string(),
            },
        }
    }

    /// Whether resubmitting the exact same commit request can succeed.
    pub fn is_retryable_as_is(&self) -> bool {
        match self {
            CheckoutError::Domain(_) => false,
            CheckoutError::Commit(err) => err.is_transient(),
        }
    }

    /// The domain error, if this is a rule rejection.
    pub fn as_domain(&self) -> Option<&CoreError> {
        match self {
            CheckoutError::Domain(err) => Some(err),
            CheckoutError::Commit(_) => None,
        }
    }

    /// True when a discount code ran out of uses between preview and commit.
    pub fn is_exhausted_discount(&self) -> bool {
        matches!(
            self.as_domain(),
            Some(CoreError::DiscountInvalid {
                reason: DiscountRejection::Exhausted,
                ..
            })
        )
    }
}

/// Result type for checkout operations.
pub type CheckoutResult<T> = Result<T, CheckoutError>;
