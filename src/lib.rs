//! # Ayatori (綾取り)
//!
//! A lightweight state-graph workflow engine for Rust.
//!
//! The name "Ayatori" (綾取り) is the Japanese string-figure game (cat's
//! cradle), representing how this engine threads a single piece of state
//! through a figure of named steps and edges.
//!
//! ## Features
//!
//! - **State by merge**: steps return partial updates; the state's reducer
//!   appends to accumulating sequences and overwrites replace fields
//! - **Conditional routing**: decision functions inspect the merged state and
//!   pick the next step, with a literal-name fallback for unmapped keys
//! - **Fault containment**: a step that returns `Err` ends the run with one
//!   recorded diagnostic; anticipated faults are data and routing decides
//! - **Bounded execution**: a configurable iteration ceiling (default 20)
//!   guards against mis-wired cycles
//! - **Async First**: built with `async-trait`; one step in flight at a time
//! - **Lightweight**: minimal dependencies, focused on the graph core
//!
//! ## Quick Start
//!
//! ```rust
//! use ayatori::prelude::*;
//! use async_trait::async_trait;
//! use serde_json::json;
//!
//! define_step!(ParseSubject);
//!
//! #[async_trait]
//! impl Step<PipelineState> for ParseSubject {
//!     async fn run(&self, state: &PipelineState) -> Result<StateUpdate, StepError> {
//!         Ok(StateUpdate {
//!             parsed_subject: state.raw_subject.clone(),
//!             ..Default::default()
//!         })
//!     }
//! }
//!
//! # #[tokio::main]
//! # async fn main() {
//! let graph = Graph::builder()
//!     .add_step("parse", ParseSubject)
//!     .set_entry_point("parse")
//!     .compile()
//!     .expect("valid graph");
//!
//! let initial = PipelineState::new("subject-1", json!({"name": "Vitamin C Serum"}));
//! let result = graph.invoke(initial).await.expect("run failed");
//!
//! assert!(result.state.parsed_subject.is_some());
//! assert_eq!(result.trace, vec![StepName::new("parse")]);
//! # }
//! ```
//!
//! ## Conditional Routing
//!
//! A decision function runs after its step's update has been merged and
//! returns a key. The key is resolved through the edge's lookup table; a key
//! with no table entry is taken as a literal step name, so a decision may
//! name its destination directly.
//!
//! ```rust
//! use ayatori::prelude::*;
//! use async_trait::async_trait;
//!
//! define_step!(Validate);
//! define_step!(Publish);
//!
//! #[async_trait]
//! impl Step<PipelineState> for Validate {
//!     async fn run(&self, state: &PipelineState) -> Result<StateUpdate, StepError> {
//!         Ok(StateUpdate {
//!             parsed_subject: state.raw_subject.clone(),
//!             ..Default::default()
//!         })
//!     }
//! }
//!
//! #[async_trait]
//! impl Step<PipelineState> for Publish {
//!     async fn run(&self, _state: &PipelineState) -> Result<StateUpdate, StepError> {
//!         Ok(StateUpdate::default())
//!     }
//! }
//!
//! # #[tokio::main]
//! # async fn main() {
//! let graph = Graph::builder()
//!     .add_step("validate", Validate)
//!     .add_step("publish", Publish)
//!     .set_entry_point("validate")
//!     .add_conditional_edges(
//!         "validate",
//!         |state: &PipelineState| {
//!             if state.parsed_subject.is_some() {
//!                 "publish".to_string()
//!             } else {
//!                 "END".to_string()
//!             }
//!         },
//!         [("publish", "publish"), ("END", "END")],
//!     )
//!     .compile()
//!     .expect("valid graph");
//!
//! let initial = PipelineState::new("subject-1", serde_json::json!({"ok": true}));
//! let result = graph.invoke(initial).await.expect("run failed");
//! assert_eq!(result.trace.len(), 2);
//! # }
//! ```
//!
//! ## Fault Containment
//!
//! Steps are expected to catch anticipated failures themselves and report
//! them as data: an error entry, a [`StepLog`] with `status: Error`, and a
//! bumped retry counter for the routing functions to inspect. An `Err`
//! escaping a step is the backstop path: the driver records one diagnostic
//! naming the step and ends the run.
//!
//! ```rust
//! use ayatori::prelude::*;
//! use async_trait::async_trait;
//!
//! define_step!(Flaky);
//!
//! #[async_trait]
//! impl Step<PipelineState> for Flaky {
//!     async fn run(&self, _state: &PipelineState) -> Result<StateUpdate, StepError> {
//!         Err("connection reset".into())
//!     }
//! }
//!
//! # #[tokio::main]
//! # async fn main() {
//! let graph = Graph::builder()
//!     .add_step("flaky", Flaky)
//!     .set_entry_point("flaky")
//!     .compile()
//!     .expect("valid graph");
//!
//! let initial = PipelineState::new("subject-1", serde_json::json!({}));
//! let result = graph.invoke(initial).await.expect("run failed");
//! assert_eq!(result.state.errors, vec!["step \"flaky\" failed: connection reset"]);
//! # }
//! ```

mod error;
mod graph;
mod runner;
mod state;
mod step;

pub mod pipeline;
pub mod prelude;

pub use error::GraphError;
pub use graph::{
    DecisionFn, Graph, GraphBuilder, GraphEvent, ObserverFn, RunResult, DEFAULT_MAX_ITERATIONS,
};
pub use runner::run_with_deadline;
pub use state::{
    Answer, GraphState, PipelineState, Question, StateUpdate, StepLog, StepStatus,
};
pub use step::{Step, StepError, StepName, END};

/// Macro to define a step with minimal boilerplate
///
/// This macro creates a step struct with:
/// - `const NAME: &'static str` - compile-time step name
/// - `Debug` derive
/// - `Default` implementation
///
/// # Example
///
/// ```rust
/// use ayatori::define_step;
///
/// define_step!(ParseSubject);
/// assert_eq!(ParseSubject::NAME, "ParseSubject");
/// ```
#[macro_export]
macro_rules! define_step {
    ($name:ident) => {
        #[derive(Debug)]
        pub struct $name;

        impl $name {
            /// Step name as a compile-time constant
            #[allow(dead_code)]
            pub const NAME: &'static str = stringify!($name);
        }

        impl Default for $name {
            fn default() -> Self {
                Self
            }
        }
    };
}
