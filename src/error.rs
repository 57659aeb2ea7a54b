use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("No record found for {dmp_id} at version {version}")]
    NotFound { dmp_id: String, version: String },

    #[error("Record {dmp_id} already has a latest version")]
    Conflict { dmp_id: String },

    #[error("Stale write for {dmp_id}: incoming modified {incoming} is not newer than {current}")]
    StaleWrite {
        dmp_id: String,
        incoming: String,
        current: String,
    },

    #[error("Record {dmp_id} has been tombstoned")]
    Tombstoned { dmp_id: String },

    #[error("Precondition failed for {dmp_id}: {message}")]
    Precondition { dmp_id: String, message: String },

    #[error("Validation error: {message}")]
    Validation { message: String },

    #[error("Backing store failure during {operation} for {dmp_id} at version {version}: {source}")]
    BackingStore {
        operation: String,
        dmp_id: String,
        version: String,
        #[source]
        source: crate::adapter::AdapterError,
    },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, StoreError>;

impl StoreError {
    pub fn not_found(dmp_id: impl Into<String>, version: impl Into<String>) -> Self {
        Self::NotFound {
            dmp_id: dmp_id.into(),
            version: version.into(),
        }
    }

    pub fn conflict(dmp_id: impl Into<String>) -> Self {
        Self::Conflict {
            dmp_id: dmp_id.into(),
        }
    }

    pub fn stale_write(
        dmp_id: impl Into<String>,
        incoming: impl Into<String>,
        current: impl Into<String>,
    ) -> Self {
        Self::StaleWrite {
            dmp_id: dmp_id.into(),
            incoming: incoming.into(),
            current: current.into(),
        }
    }

    pub fn tombstoned(dmp_id: impl Into<String>) -> Self {
        Self::Tombstoned {
            dmp_id: dmp_id.into(),
        }
    }

    pub fn precondition(dmp_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Precondition {
            dmp_id: dmp_id.into(),
            message: message.into(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    pub fn backing_store(
        operation: impl Into<String>,
        dmp_id: impl Into<String>,
        version: impl Into<String>,
        source: crate::adapter::AdapterError,
    ) -> Self {
        Self::BackingStore {
            operation: operation.into(),
            dmp_id: dmp_id.into(),
            version: version.into(),
            source,
        }
    }
}
