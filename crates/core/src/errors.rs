//! Error types shared by the reconciliation core and its storage backends.

use thiserror::Error;

/// Result type alias for incid synchronisation operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error for every save, bulk update and split path.
#[derive(Debug, Error)]
pub enum Error {
    /// Connection, pool, migration or query failure in the relational store
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    /// A precondition was not met; nothing was written
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// A single statement against a named table failed or touched nothing it should have
    #[error("Statement failed on '{table}' ({operation}): {message}")]
    Statement {
        table: String,
        operation: String,
        message: String,
    },

    /// The external GIS layer returned nothing or reported a failure
    #[error("GIS error: {0}")]
    Gis(#[from] GisError),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Invalid settings
    #[error("Configuration error: {0}")]
    Config(String),
}

#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Pool creation failed: {0}")]
    PoolCreationFailed(String),

    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    #[error("Query failed: {0}")]
    QueryFailed(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Precondition failures reported to the user before any mutation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("No features are selected")]
    EmptySelection,

    #[error("Selection spans {0} incids; select features of a single incid")]
    MultipleIncids(usize),

    #[error("Selection covers every feature of incid {0}; nothing to split off")]
    WholeIncidSelected(String),

    #[error("Selected features of incid {0} cannot be split")]
    NotSplittable(String),

    #[error("A reason must be given for the change")]
    MissingReason,

    #[error("A process must be given for the change")]
    MissingProcess,

    #[error("No operation code is defined for '{0}'")]
    MissingOperationCode(String),

    #[error("Operation '{0}' maps to more than one operation code")]
    AmbiguousOperationCode(String),

    #[error("Incid {incid} has more than one priority habitat row with code '{code}'")]
    DuplicateBapCode { incid: String, code: String },

    #[error("'{0}' is not a valid incid")]
    InvalidIncid(String),

    #[error("Incid {0} does not exist")]
    UnknownIncid(String),

    #[error("Site {0} has no incid numbers left")]
    IncidNumbersExhausted(String),

    #[error("Save is not allowed while the edit session is {0}")]
    InvalidSessionState(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GisError {
    #[error("{operation} returned no result")]
    NoResult { operation: String },

    #[error("{operation} did not update any features")]
    NoFeaturesUpdated { operation: String },

    #[error("Split produced {count} feature(s); at least 2 are required")]
    InsufficientSplitFeatures { count: usize },

    #[error("GIS adapter failure: {0}")]
    Adapter(String),
}

impl Error {
    /// Create a statement error for the given table and operation
    pub fn statement(
        table: impl Into<String>,
        operation: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::Statement {
            table: table.into(),
            operation: operation.into(),
            message: message.into(),
        }
    }

    /// Create an internal database error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Database(DatabaseError::Internal(message.into()))
    }

    /// True when the operation was refused before anything was written.
    pub fn is_precondition(&self) -> bool {
        matches!(self, Self::Validation(_) | Self::Config(_))
    }

    /// True for failures raised at the GIS boundary.
    pub fn is_external(&self) -> bool {
        matches!(self, Self::Gis(_))
    }
}
