//! Error types for the optimizer.

use thiserror::Error;

use crate::domain::{CollectorError, JobError, Location};

/// Optimizer error type.
#[derive(Error, Debug)]
pub enum OptimizerError {
    /// A model was already set on this builder
    #[error("model has already been set")]
    ModelAlreadySet,

    /// A result schema was already set on this builder
    #[error("result data model has already been set")]
    SchemaAlreadySet,

    /// Result schema without any field
    #[error("result data model cannot be empty")]
    EmptySchema,

    /// Two attachments share the same file stem
    #[error("{0} already attached")]
    DuplicateAttachment(String),

    /// Model fragment list given but empty
    #[error("model fragment list cannot be empty")]
    EmptyModelArgument,

    /// Both locations and literal text given for one model
    #[error("model source takes either locations or text, not both")]
    AmbiguousModelSource,

    /// Materializing a model that has no fragments
    #[error("model source is empty")]
    EmptyModel,

    /// Solving without a model
    #[error("a model must be provided to the optimizer")]
    NoModelAttached,

    /// Opening a model fragment or data attachment failed
    #[error("cannot open {location}: {source}")]
    Attachment {
        location: Location,
        #[source]
        source: std::io::Error,
    },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Input or result (de)serialization error
    #[error("Collector error: {0}")]
    Collector(#[from] CollectorError),

    /// Solve service error
    #[error("Job error: {0}")]
    Job(#[from] JobError),
}

/// Result type for optimizer operations.
pub type Result<T> = std::result::Result<T, OptimizerError>;
