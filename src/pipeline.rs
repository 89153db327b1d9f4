//! Content-generation pipeline assembly.
//!
//! Wires the seven-step content graph (parse, generate questions, derive
//! answers, render three page templates, persist) and provides the routing
//! policy between its stages plus a caller-facing run summary. The step
//! implementations themselves are injected: the pipeline only cares that each
//! one satisfies the [`Step`] contract.

use crate::error::GraphError;
use crate::graph::{Graph, RunResult};
use crate::runner::run_with_deadline;
use crate::state::{PipelineState, StepLog};
use crate::step::{Step, END};
use serde::Serialize;
use std::time::{Duration, Instant};
use tracing::info;

/// Registered names of the pipeline steps.
pub mod names {
    pub const DATA_PARSER: &str = "data_parser";
    pub const QUESTION_GENERATOR: &str = "question_generator";
    pub const ANSWER_GENERATOR: &str = "answer_generator";
    pub const FAQ_TEMPLATE: &str = "faq_template";
    pub const SUBJECT_TEMPLATE: &str = "subject_template";
    pub const COMPARISON_TEMPLATE: &str = "comparison_template";
    pub const PERSISTENCE: &str = "persistence";
}

/// Recorded-fault threshold at which the routing functions give up.
///
/// Steps bump `retry_count` when they record a fault; once errors exist and
/// the counter reaches this limit, routing stops the run. The engine never
/// retries a step on its own.
pub const RETRY_LIMIT: u32 = 3;

/// Routing policy after the parse stage: stop when faults have piled up past
/// [`RETRY_LIMIT`] or no parsed subject was produced, otherwise continue into
/// question generation.
pub fn route_after_parser(state: &PipelineState) -> String {
    if state.has_errors() && state.retry_count >= RETRY_LIMIT {
        return END.to_string();
    }
    if state.parsed_subject.is_none() {
        return END.to_string();
    }
    names::QUESTION_GENERATOR.to_string()
}

/// Routing policy after answer derivation: same fault threshold, and stop
/// when no answers were produced, otherwise continue into page templating.
pub fn route_after_answers(state: &PipelineState) -> String {
    if state.has_errors() && state.retry_count >= RETRY_LIMIT {
        return END.to_string();
    }
    if state.answers.is_empty() {
        return END.to_string();
    }
    names::FAQ_TEMPLATE.to_string()
}

/// The seven collaborator steps the content graph is wired from.
pub struct ContentSteps {
    pub parser: Box<dyn Step<PipelineState>>,
    pub question_generator: Box<dyn Step<PipelineState>>,
    pub answer_generator: Box<dyn Step<PipelineState>>,
    pub faq_template: Box<dyn Step<PipelineState>>,
    pub subject_template: Box<dyn Step<PipelineState>>,
    pub comparison_template: Box<dyn Step<PipelineState>>,
    pub persistence: Box<dyn Step<PipelineState>>,
}

/// Builds the content-generation graph.
///
/// Entry is the parser; conditional edges guard the expensive stages behind
/// [`route_after_parser`] and [`route_after_answers`]; the three templates
/// and persistence run in sequence.
pub fn content_graph(steps: ContentSteps) -> Result<Graph<PipelineState>, GraphError> {
    Graph::builder()
        .add_step(names::DATA_PARSER, steps.parser)
        .add_step(names::QUESTION_GENERATOR, steps.question_generator)
        .add_step(names::ANSWER_GENERATOR, steps.answer_generator)
        .add_step(names::FAQ_TEMPLATE, steps.faq_template)
        .add_step(names::SUBJECT_TEMPLATE, steps.subject_template)
        .add_step(names::COMPARISON_TEMPLATE, steps.comparison_template)
        .add_step(names::PERSISTENCE, steps.persistence)
        .set_entry_point(names::DATA_PARSER)
        .add_conditional_edges(
            names::DATA_PARSER,
            route_after_parser,
            [
                (names::QUESTION_GENERATOR, names::QUESTION_GENERATOR),
                (END, END),
            ],
        )
        .add_edge(names::QUESTION_GENERATOR, names::ANSWER_GENERATOR)
        .add_conditional_edges(
            names::ANSWER_GENERATOR,
            route_after_answers,
            [(names::FAQ_TEMPLATE, names::FAQ_TEMPLATE), (END, END)],
        )
        .add_edge(names::FAQ_TEMPLATE, names::SUBJECT_TEMPLATE)
        .add_edge(names::SUBJECT_TEMPLATE, names::COMPARISON_TEMPLATE)
        .add_edge(names::COMPARISON_TEMPLATE, names::PERSISTENCE)
        .add_edge(names::PERSISTENCE, END)
        .compile()
}

/// Which page artifacts a run produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PageResults {
    pub faq: bool,
    pub subject: bool,
    pub comparison: bool,
}

/// Caller-facing outcome of one pipeline run.
///
/// Always well-formed: a run that recorded faults, a run aborted by the
/// engine, and a run that hit the deadline all produce a summary. `success`
/// means no faults were recorded, or at least one page was still produced.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub success: bool,
    pub execution_id: String,
    pub elapsed_ms: u64,
    pub questions_generated: usize,
    pub answers_generated: usize,
    pub pages: PageResults,
    pub errors: Vec<String>,
    pub step_logs: Vec<StepLog>,
    /// Steps visited, in order. Empty when the run never produced a state.
    pub trace: Vec<String>,
}

/// Runs the content pipeline under a wall-clock budget and summarizes the
/// outcome.
pub async fn run_content_pipeline(
    graph: &Graph<PipelineState>,
    initial: PipelineState,
    budget: Duration,
) -> RunSummary {
    let execution_id = initial.execution_id.clone();
    let started = Instant::now();

    match run_with_deadline(graph, initial, budget).await {
        Ok(RunResult { state, trace, .. }) => {
            let success = !state.has_errors() || state.any_page();
            info!(
                execution_id = %state.execution_id,
                errors = state.errors.len(),
                questions = state.questions.len(),
                answers = state.answers.len(),
                success,
                "content pipeline run complete"
            );
            RunSummary {
                success,
                execution_id: state.execution_id,
                elapsed_ms: started.elapsed().as_millis() as u64,
                questions_generated: state.questions.len(),
                answers_generated: state.answers.len(),
                pages: PageResults {
                    faq: state.faq_page.is_some(),
                    subject: state.subject_page.is_some(),
                    comparison: state.comparison_page.is_some(),
                },
                errors: state.errors,
                step_logs: state.step_logs,
                trace: trace.into_iter().map(|name| name.to_string()).collect(),
            }
        }
        Err(err) => {
            info!(execution_id = %execution_id, error = %err, "content pipeline run aborted");
            RunSummary {
                success: false,
                execution_id,
                elapsed_ms: started.elapsed().as_millis() as u64,
                questions_generated: 0,
                answers_generated: 0,
                pages: PageResults {
                    faq: false,
                    subject: false,
                    comparison: false,
                },
                errors: vec![err.to_string()],
                step_logs: Vec::new(),
                trace: Vec::new(),
            }
        }
    }
}
