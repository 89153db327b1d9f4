use async_trait::async_trait;
use ayatori::pipeline::{self, content_graph, names, run_content_pipeline, ContentSteps};
use ayatori::prelude::*;
use serde_json::json;
use std::time::Duration;

fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

/// Collaborator stub returning a fixed update.
struct Fixed(StateUpdate);

#[async_trait]
impl Step<PipelineState> for Fixed {
    async fn run(&self, _state: &PipelineState) -> Result<StateUpdate, StepError> {
        Ok(self.0.clone())
    }
}

fn boxed(update: StateUpdate) -> Box<dyn Step<PipelineState>> {
    Box::new(Fixed(update))
}

fn content_steps() -> ContentSteps {
    ContentSteps {
        parser: boxed(StateUpdate {
            parsed_subject: Some(json!({"name": "Vitamin C Serum", "concentration": "15%"})),
            step_logs: vec![StepLog::success(
                names::DATA_PARSER,
                "Data Validation & Normalization",
                210,
                950,
            )],
            memory: [("subject_validated".to_string(), json!(true))]
                .into_iter()
                .collect(),
            ..Default::default()
        }),
        question_generator: boxed(StateUpdate {
            questions: vec![
                Question {
                    id: "q1".into(),
                    category: "usage".into(),
                    question: "How often should it be applied?".into(),
                    answer: None,
                },
                Question {
                    id: "q2".into(),
                    category: "safety".into(),
                    question: "Any known side effects?".into(),
                    answer: None,
                },
            ],
            step_logs: vec![StepLog::success(
                names::QUESTION_GENERATOR,
                "Question Generation",
                540,
                1400,
            )],
            ..Default::default()
        }),
        answer_generator: boxed(StateUpdate {
            answers: vec![
                Answer {
                    question: "How often should it be applied?".into(),
                    answer: "Once daily in the morning.".into(),
                    category: "usage".into(),
                },
                Answer {
                    question: "Any known side effects?".into(),
                    answer: "Mild tingling on sensitive skin.".into(),
                    category: "safety".into(),
                },
            ],
            step_logs: vec![StepLog::success(
                names::ANSWER_GENERATOR,
                "Answer Generation",
                880,
                2100,
            )],
            ..Default::default()
        }),
        faq_template: boxed(StateUpdate {
            faq_page: Some(json!({"title": "FAQ", "faqs": []})),
            ..Default::default()
        }),
        subject_template: boxed(StateUpdate {
            subject_page: Some(json!({"title": "Vitamin C Serum"})),
            ..Default::default()
        }),
        comparison_template: boxed(StateUpdate {
            comparison_page: Some(json!({"title": "Comparison"})),
            competitor_subject: Some(json!({"name": "Competitor Serum"})),
            ..Default::default()
        }),
        persistence: boxed(StateUpdate {
            memory: [("rows_written".to_string(), json!(3))].into_iter().collect(),
            step_logs: vec![StepLog::success(names::PERSISTENCE, "Persistence", 0, 120)],
            ..Default::default()
        }),
    }
}

#[tokio::test]
async fn test_complete_content_pipeline() {
    init_tracing();

    let graph = content_graph(content_steps()).unwrap();
    let initial = PipelineState::new("subject-1", json!({"name": "Vitamin C Serum"}));
    let execution_id = initial.execution_id.clone();

    let summary = run_content_pipeline(&graph, initial, Duration::from_secs(30)).await;

    assert!(summary.success);
    assert_eq!(summary.execution_id, execution_id);
    assert_eq!(summary.questions_generated, 2);
    assert_eq!(summary.answers_generated, 2);
    assert!(summary.pages.faq && summary.pages.subject && summary.pages.comparison);
    assert!(summary.errors.is_empty());
    assert_eq!(
        summary.trace,
        vec![
            names::DATA_PARSER,
            names::QUESTION_GENERATOR,
            names::ANSWER_GENERATOR,
            names::FAQ_TEMPLATE,
            names::SUBJECT_TEMPLATE,
            names::COMPARISON_TEMPLATE,
            names::PERSISTENCE,
        ]
    );

    // Log contributions arrive in execution order.
    let logged: Vec<&str> = summary.step_logs.iter().map(|l| l.step.as_str()).collect();
    assert_eq!(
        logged,
        vec![
            names::DATA_PARSER,
            names::QUESTION_GENERATOR,
            names::ANSWER_GENERATOR,
            names::PERSISTENCE,
        ]
    );

    // Downstream consumers render the summary as JSON.
    let rendered = serde_json::to_value(&summary).unwrap();
    assert_eq!(rendered["success"], json!(true));
    assert_eq!(rendered["pages"]["faq"], json!(true));
    assert_eq!(rendered["questions_generated"], json!(2));
}

/// A step that records its own failure and bumps the retry counter; the
/// conditional edge loops back to it until the counter hits the limit. The
/// engine itself never retries, the routing policy drives the loop.
struct FlakyFetch;

#[async_trait]
impl Step<PipelineState> for FlakyFetch {
    async fn run(&self, state: &PipelineState) -> Result<StateUpdate, StepError> {
        Ok(StateUpdate {
            errors: vec!["fetch: upstream timeout".to_string()],
            retry_count: Some(state.retry_count + 1),
            step_logs: vec![StepLog::failure(
                "fetch",
                "Subject Fetch",
                15,
                "upstream timeout",
            )],
            ..Default::default()
        })
    }
}

#[tokio::test]
async fn test_retry_counter_as_circuit_breaker() {
    init_tracing();

    let graph = Graph::builder()
        .add_step("fetch", FlakyFetch)
        .set_entry_point("fetch")
        .add_conditional_edges(
            "fetch",
            |state: &PipelineState| {
                if state.has_errors() && state.retry_count >= pipeline::RETRY_LIMIT {
                    END.to_string()
                } else {
                    "fetch".to_string()
                }
            },
            [("fetch", "fetch"), (END, END)],
        )
        .compile()
        .unwrap();

    let result = graph
        .invoke(PipelineState::new("subject-1", json!({})))
        .await
        .unwrap();

    assert_eq!(result.iterations, pipeline::RETRY_LIMIT);
    assert_eq!(result.trace.len(), 3);
    assert_eq!(result.state.errors.len(), 3);
    assert_eq!(result.state.retry_count, 3);
    assert!(result
        .state
        .step_logs
        .iter()
        .all(|log| log.status == StepStatus::Error));
}

#[tokio::test]
async fn test_deadline_produces_failed_summary() {
    init_tracing();

    struct Stall;

    #[async_trait]
    impl Step<PipelineState> for Stall {
        async fn run(&self, _state: &PipelineState) -> Result<StateUpdate, StepError> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(StateUpdate::default())
        }
    }

    let mut steps = content_steps();
    steps.parser = Box::new(Stall);

    let graph = content_graph(steps).unwrap();
    let initial = PipelineState::new("subject-1", json!({}));
    let execution_id = initial.execution_id.clone();

    let summary = run_content_pipeline(&graph, initial, Duration::from_millis(50)).await;

    // Well-formed even though the run never finished: no trace, no state, but
    // the outcome is distinguishable from an in-run recorded fault.
    assert!(!summary.success);
    assert_eq!(summary.execution_id, execution_id);
    assert!(summary.trace.is_empty());
    assert_eq!(summary.errors.len(), 1);
    assert!(summary.errors[0].contains("deadline"));
}
