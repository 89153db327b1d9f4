use crate::state::GraphState;
use async_trait::async_trait;
use std::fmt;

/// Reserved terminal name. Routing to it ends the run; it can never be
/// registered as a step.
pub const END: &str = "END";

/// Type-safe step name wrapper.
///
/// Provides compile-time safety for step identifiers, preventing
/// typos and mismatched step names at the API level.
///
/// # Examples
///
/// ```
/// use ayatori::StepName;
///
/// let name = StepName::new("data_parser");
/// assert_eq!(name.as_str(), "data_parser");
///
/// // From trait for ergonomic conversion
/// let name: StepName = "question_generator".into();
/// assert!(!name.is_end());
/// assert!(StepName::end().is_end());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StepName(String);

impl StepName {
    /// Creates a new StepName
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// The reserved terminal name.
    pub fn end() -> Self {
        Self(END.to_string())
    }

    /// True if this is the reserved terminal name.
    pub fn is_end(&self) -> bool {
        self.0 == END
    }

    /// Creates a StepName from a type's name (extracts last segment)
    pub fn from_type_name<T: ?Sized>() -> Self {
        let full_name = std::any::type_name::<T>();
        let short_name = full_name.split("::").last().unwrap_or("UnknownStep");
        Self::new(short_name)
    }

    /// Returns the step name as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StepName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for StepName {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for StepName {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl AsRef<str> for StepName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::borrow::Borrow<str> for StepName {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// Error escaping a step implementation.
///
/// Steps are expected to catch anticipated failures themselves and report
/// them through their returned update; returning `Err` is the backstop for
/// genuinely unexpected faults, which the driver contains by recording one
/// diagnostic and ending the run.
pub type StepError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// A unit of work registered in a graph.
///
/// A step is a pure function of the current state to a partial state update:
/// it receives the state by shared reference (so it cannot retain and later
/// mutate a snapshot) and returns the update the driver merges via
/// [`GraphState::apply`]. Where the run goes next is decided by the graph's
/// edges and decision functions, never by the step itself.
///
/// # Examples
///
/// ```
/// use ayatori::prelude::*;
/// use async_trait::async_trait;
///
/// define_step!(ParseSubject);
///
/// #[async_trait]
/// impl Step<PipelineState> for ParseSubject {
///     async fn run(&self, state: &PipelineState) -> Result<StateUpdate, StepError> {
///         Ok(StateUpdate {
///             parsed_subject: state.raw_subject.clone(),
///             step_logs: vec![StepLog::success("parse_subject", "Validation", 0, 1)],
///             ..Default::default()
///         })
///     }
/// }
/// ```
#[async_trait]
pub trait Step<S: GraphState>: Send + Sync {
    /// Executes the step against the current state.
    ///
    /// # Returns
    ///
    /// - `Ok(update)` - partial update to merge into the state
    /// - `Err(error)` - an escaped fault; the driver records it and ends the run
    async fn run(&self, state: &S) -> Result<S::Update, StepError>;

    /// Returns the step name.
    ///
    /// By default, uses the type name. Override to provide a custom name.
    fn name(&self) -> StepName {
        StepName::from_type_name::<Self>()
    }

    /// Returns the default step name from the type.
    ///
    /// Used by the builder when registering steps by type.
    fn default_name() -> StepName
    where
        Self: Sized,
    {
        StepName::from_type_name::<Self>()
    }
}

#[async_trait]
impl<S: GraphState> Step<S> for Box<dyn Step<S>> {
    async fn run(&self, state: &S) -> Result<S::Update, StepError> {
        (**self).run(state).await
    }

    fn name(&self) -> StepName {
        (**self).name()
    }
}
