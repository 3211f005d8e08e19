// Application module: model composition and job orchestration

pub mod model_source;
pub mod optimizer;
pub mod resources;

pub use model_source::{Fragments, ModelSource};
pub use optimizer::{Optimizer, OptimizerBuilder};
pub use resources::{LocationOpener, RemoteJobGuard, ResourceOpener, StreamRegistry, StreamRole};
