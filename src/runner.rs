use crate::error::GraphError;
use crate::graph::{Graph, RunResult};
use crate::state::GraphState;
use std::time::Duration;
use tokio::time::timeout;
use tracing::warn;

/// Races a full graph run against a wall-clock budget.
///
/// The engine itself has no internal timeout; this is the caller-side
/// deadline. When the budget expires the call returns
/// [`GraphError::DeadlineExceeded`] with no final state: in-flight step work
/// is not interrupted, the caller just stops waiting for it.
pub async fn run_with_deadline<S: GraphState>(
    graph: &Graph<S>,
    initial: S,
    budget: Duration,
) -> Result<RunResult<S>, GraphError> {
    match timeout(budget, graph.invoke(initial)).await {
        Ok(result) => result,
        Err(_) => {
            warn!("graph run exceeded its {:?} budget", budget);
            Err(GraphError::DeadlineExceeded(budget))
        }
    }
}
