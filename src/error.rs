use crate::step::StepName;
use std::time::Duration;
use thiserror::Error;

/// Errors that abort a graph run or its construction.
///
/// These are the fatal channel: a missing entry point, a step name that was
/// routed to but never registered, or the caller-side deadline expiring.
/// Faults a step records about its own work are not represented here; they
/// live in the state's error sequence and the run continues or stops as the
/// routing functions decide.
///
/// # Non-Exhaustive
///
/// This enum is marked `#[non_exhaustive]` to allow adding new variants
/// in future versions without breaking downstream code. When matching
/// on this error, always include a wildcard pattern:
///
/// ```
/// use ayatori::{GraphError, StepName};
///
/// fn handle_error(error: GraphError) {
///     match error {
///         GraphError::Configuration(msg) => {
///             eprintln!("Configuration error: {}", msg);
///         }
///         GraphError::StepNotFound(name) => {
///             eprintln!("Step {} not found", name);
///         }
///         GraphError::DeadlineExceeded(budget) => {
///             eprintln!("Run exceeded its {:?} budget", budget);
///         }
///         _ => eprintln!("Unknown error: {}", error),
///     }
/// }
/// ```
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum GraphError {
    /// The graph configuration is invalid.
    ///
    /// Returned by `compile()` when the entry point is missing or the
    /// reserved terminal name was registered as a step.
    #[error("Invalid graph configuration: {0}")]
    Configuration(String),

    /// A referenced step was not found in the registry.
    ///
    /// This error occurs when:
    /// - The entry point passed to `compile()` was never registered
    /// - An edge or decision routed to a name that isn't registered
    #[error("Step not found: {0}")]
    StepNotFound(StepName),

    /// The caller-side wall-clock budget expired before the run finished.
    ///
    /// Returned by the runner, never by `invoke` itself: the engine has no
    /// internal timeout. No final state is available when this fires.
    #[error("Graph run exceeded deadline of {0:?}")]
    DeadlineExceeded(Duration),
}
