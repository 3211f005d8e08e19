// Domain layer: Job, collector and status models, and the solve service port
pub mod domain;

// Application layer: Model composition and solve orchestration
pub mod application;

// Infrastructure layer: External concerns (gRPC transport, configuration, logging)
pub mod infrastructure;

pub mod error;

// Re-export commonly used types
pub use domain::{
    Collector, CollectorError, DataValue, ExecutionStatus, FieldType, InputData, JobClient,
    JobError, JobInput, JobOptions, JobRequest, JobResponse, Location, ResultSchema,
    SolveOutcome, SolveStatus,
};

pub use application::{LocationOpener, ModelSource, Optimizer, OptimizerBuilder, ResourceOpener};

pub use error::{OptimizerError, Result};

pub use infrastructure::{init_tracing, ClientConfig, Credentials, GrpcJobClient};
