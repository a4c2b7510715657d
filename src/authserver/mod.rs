pub mod registry;

pub use registry::{AuthServerRegistry, FailureKind};
