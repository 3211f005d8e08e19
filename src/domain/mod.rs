// Domain module: Business logic and models

pub mod collector;
pub mod job_client;
pub mod models;
pub mod value_objects;

pub use collector::{Collector, CollectorError, DataValue, FieldType, InputData, ResultSchema, Row};
pub use job_client::{JobClient, JobError};
pub use models::*;
pub use value_objects::*;
