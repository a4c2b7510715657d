pub mod classify;
pub mod iterative;

pub use classify::{classify_response, Classification};
pub use iterative::{resolve, ResolveOutcome};
