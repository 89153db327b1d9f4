//! Commonly used types and traits

pub use crate::define_step;
pub use crate::error::GraphError;
pub use crate::graph::{Graph, GraphEvent, RunResult};
pub use crate::state::{
    Answer, GraphState, PipelineState, Question, StateUpdate, StepLog, StepStatus,
};
pub use crate::step::{Step, StepError, StepName, END};
