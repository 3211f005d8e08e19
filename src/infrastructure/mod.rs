// Infrastructure module: transport, configuration and logging

pub mod config;
pub mod grpc_client;
pub mod logging;
pub mod mappers;

pub use config::{ClientConfig, ConfigError, Credentials};
pub use grpc_client::GrpcJobClient;
pub use logging::init_tracing;
