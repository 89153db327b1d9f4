use crate::error::GraphError;
use crate::state::GraphState;
use crate::step::{Step, StepName};
use std::collections::HashMap;
use std::fmt;
use tracing::{info, warn};

/// Default bound on how many steps a single run may execute.
///
/// The ceiling is the only guard against a mis-wired graph cycling forever;
/// reaching it records a truncation diagnostic and ends the run.
pub const DEFAULT_MAX_ITERATIONS: u32 = 20;

/// Synchronous routing policy: inspects the post-merge state and returns a
/// decision key, resolved through the edge's lookup table.
pub type DecisionFn<S> = Box<dyn Fn(&S) -> String + Send + Sync>;

/// Observability callback invoked on run transitions.
pub type ObserverFn = Box<dyn Fn(GraphEvent<'_>) + Send + Sync>;

/// Transition notifications delivered to the observer hook.
#[derive(Debug)]
pub enum GraphEvent<'a> {
    StepStarted { step: &'a StepName, iteration: u32 },
    StepCompleted { step: &'a StepName },
    StepFailed { step: &'a StepName, details: &'a str },
    Routed {
        from: &'a StepName,
        to: &'a StepName,
        conditional: bool,
    },
}

struct ConditionalEdge<S> {
    decision: DecisionFn<S>,
    table: HashMap<String, StepName>,
}

/// Final state plus per-run diagnostics from one `invoke`.
#[derive(Debug)]
pub struct RunResult<S> {
    pub state: S,
    /// Steps actually executed, in order. The terminal name never appears.
    pub trace: Vec<StepName>,
    pub iterations: u32,
}

/// A compiled workflow graph: step registry, edges, and the execution driver.
///
/// Immutable once built. Construct one per pipeline with [`Graph::builder`],
/// then call [`invoke`](Graph::invoke) once per request with a fresh initial
/// state.
pub struct Graph<S: GraphState> {
    steps: HashMap<String, Box<dyn Step<S>>>,
    edges: HashMap<String, StepName>,
    conditional_edges: HashMap<String, ConditionalEdge<S>>,
    entry_point: StepName,
    max_iterations: u32,
    observer: Option<ObserverFn>,
}

impl<S: GraphState> fmt::Debug for Graph<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Graph")
            .field("steps", &self.steps.keys().collect::<Vec<_>>())
            .field("entry_point", &self.entry_point)
            .field("max_iterations", &self.max_iterations)
            .finish()
    }
}

impl<S: GraphState> Graph<S> {
    pub fn builder() -> GraphBuilder<S> {
        GraphBuilder::new()
    }

    /// Runs the graph to completion from `initial` and returns the final
    /// merged state with the visited-step trace.
    ///
    /// One step is in flight at a time: the driver awaits each step, merges
    /// its update, then resolves the next step from the conditional edge (if
    /// one is registered for the current step) or the unconditional edge,
    /// defaulting to the terminal name.
    ///
    /// # Errors
    ///
    /// [`GraphError::StepNotFound`] if routing reaches a name with no
    /// registered step. This aborts the whole run; it is not contained the
    /// way an escaped step fault is.
    pub async fn invoke(&self, initial: S) -> Result<RunResult<S>, GraphError> {
        let mut state = initial;
        let mut node = self.entry_point.clone();
        let mut trace: Vec<StepName> = Vec::new();
        let mut iterations = 0u32;

        while !node.is_end() && iterations < self.max_iterations {
            iterations += 1;
            trace.push(node.clone());

            let step = self
                .steps
                .get(node.as_str())
                .ok_or_else(|| GraphError::StepNotFound(node.clone()))?;

            self.emit(GraphEvent::StepStarted {
                step: &node,
                iteration: iterations,
            });

            match step.run(&state).await {
                Ok(update) => {
                    state = state.apply(update);
                    info!("step '{}' completed (iteration {})", node, iterations);
                    self.emit(GraphEvent::StepCompleted { step: &node });

                    let (next, conditional) = self.next_node(&node, &state);
                    self.emit(GraphEvent::Routed {
                        from: &node,
                        to: &next,
                        conditional,
                    });
                    node = next;
                }
                Err(err) => {
                    // Backstop for faults the step did not catch itself:
                    // record one diagnostic and end the run.
                    let details = err.to_string();
                    warn!("step '{}' failed: {}", node, details);
                    self.emit(GraphEvent::StepFailed {
                        step: &node,
                        details: &details,
                    });
                    state = state.apply(S::error_update(format!(
                        "step \"{}\" failed: {}",
                        node, details
                    )));
                    node = StepName::end();
                }
            }
        }

        if !node.is_end() && iterations >= self.max_iterations {
            warn!(
                "graph execution exceeded {} iterations, terminating",
                self.max_iterations
            );
            state = state.apply(S::error_update(format!(
                "graph execution exceeded {} iterations",
                self.max_iterations
            )));
        }

        Ok(RunResult {
            state,
            trace,
            iterations,
        })
    }

    fn next_node(&self, node: &StepName, state: &S) -> (StepName, bool) {
        if let Some(edge) = self.conditional_edges.get(node.as_str()) {
            let key = (edge.decision)(state);
            // Table lookup first; an unmapped key is taken as a literal
            // step name, so decisions may name their destination directly.
            let dest = edge
                .table
                .get(&key)
                .cloned()
                .unwrap_or_else(|| StepName::new(key));
            (dest, true)
        } else {
            let dest = self
                .edges
                .get(node.as_str())
                .cloned()
                .unwrap_or_else(StepName::end);
            (dest, false)
        }
    }

    fn emit(&self, event: GraphEvent<'_>) {
        if let Some(hook) = &self.observer {
            hook(event);
        }
    }
}

/// Builder for a [`Graph`]. One instance per pipeline; no process-wide state.
pub struct GraphBuilder<S: GraphState> {
    steps: HashMap<String, Box<dyn Step<S>>>,
    edges: HashMap<String, StepName>,
    conditional_edges: HashMap<String, ConditionalEdge<S>>,
    entry_point: Option<StepName>,
    max_iterations: u32,
    observer: Option<ObserverFn>,
}

impl<S: GraphState> Default for GraphBuilder<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: GraphState> GraphBuilder<S> {
    pub fn new() -> Self {
        Self {
            steps: HashMap::new(),
            edges: HashMap::new(),
            conditional_edges: HashMap::new(),
            entry_point: None,
            max_iterations: DEFAULT_MAX_ITERATIONS,
            observer: None,
        }
    }

    /// Registers a step under an explicit name.
    ///
    /// Registering the same name twice overwrites the earlier binding; last
    /// write wins.
    pub fn add_step(mut self, name: impl Into<String>, step: impl Step<S> + 'static) -> Self {
        self.steps.insert(name.into(), Box::new(step));
        self
    }

    /// Registers a step under its type name.
    pub fn add<P: Step<S> + Default + 'static>(mut self) -> Self {
        let step = P::default();
        let name = step.name();
        self.steps.insert(name.as_str().to_string(), Box::new(step));
        self
    }

    /// Designates the single entry step. Required before `compile()`.
    pub fn set_entry_point(mut self, name: impl Into<StepName>) -> Self {
        self.entry_point = Some(name.into());
        self
    }

    /// Adds an unconditional edge. At most one per source; a later call for
    /// the same source replaces the earlier destination.
    pub fn add_edge(mut self, from: impl Into<String>, to: impl Into<StepName>) -> Self {
        self.edges.insert(from.into(), to.into());
        self
    }

    /// Adds a conditional edge: after `from` completes, `decision` inspects
    /// the merged state and its key is resolved through `table` (or used as a
    /// literal step name when absent). Takes precedence over an unconditional
    /// edge registered for the same source.
    pub fn add_conditional_edges<D, T, K, V>(
        mut self,
        from: impl Into<String>,
        decision: D,
        table: T,
    ) -> Self
    where
        D: Fn(&S) -> String + Send + Sync + 'static,
        T: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<StepName>,
    {
        let table = table
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        self.conditional_edges.insert(
            from.into(),
            ConditionalEdge {
                decision: Box::new(decision),
                table,
            },
        );
        self
    }

    /// Overrides the iteration ceiling (default [`DEFAULT_MAX_ITERATIONS`]).
    pub fn max_iterations(mut self, ceiling: u32) -> Self {
        self.max_iterations = ceiling;
        self
    }

    /// Installs an observability hook invoked on every run transition.
    pub fn observe(mut self, hook: impl Fn(GraphEvent<'_>) + Send + Sync + 'static) -> Self {
        self.observer = Some(Box::new(hook));
        self
    }

    /// Finalizes the graph.
    ///
    /// Validates that an entry point was set, that it is registered, and that
    /// the reserved terminal name was not registered as a step. Edge targets
    /// are deliberately not validated; an unknown destination faults when the
    /// run reaches it.
    pub fn compile(self) -> Result<Graph<S>, GraphError> {
        let entry_point = self.entry_point.ok_or_else(|| {
            GraphError::Configuration("entry point must be specified".to_string())
        })?;

        if !self.steps.contains_key(entry_point.as_str()) {
            return Err(GraphError::StepNotFound(entry_point));
        }

        if self.steps.contains_key(crate::step::END) {
            return Err(GraphError::Configuration(
                "the terminal name cannot be registered as a step".to_string(),
            ));
        }

        Ok(Graph {
            steps: self.steps,
            edges: self.edges,
            conditional_edges: self.conditional_edges,
            entry_point,
            max_iterations: self.max_iterations,
            observer: self.observer,
        })
    }
}
