//! Declarative dialog construction.
//!
//! [`DialogBuilder`] assembles a fixed sequence of steps into a
//! [`DialogHandler`] without writing one by hand: each step is a query
//! plus an optional validator, and an optional finalizer runs once after
//! the last step with every response in step order. A rejected response
//! sends the validator's message to the user and asks the same step again.
//!
//! Step names are produced by a [`StepNamer`]; the default names steps
//! `Q0`, `Q1`, ... by position.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::BoxFuture;

use crate::error::{BotError, Result, ValidationError};
use crate::handler::{Attachment, DialogHandler, DialogTurn, Step};
use crate::query::{Query, QueryKind};

type ValidationResult = std::result::Result<(), ValidationError>;

type TextValidator = Box<dyn Fn(&str) -> ValidationResult + Send + Sync>;
type SingleValidator = Box<dyn Fn(usize) -> ValidationResult + Send + Sync>;
type MultiValidator = Box<dyn Fn(&[usize]) -> ValidationResult + Send + Sync>;
type FileValidator =
    Box<dyn for<'a> Fn(&'a Attachment) -> BoxFuture<'a, ValidationResult> + Send + Sync>;
type HistoryValidator =
    Box<dyn Fn(&StepResponse, &[StepResponse]) -> ValidationResult + Send + Sync>;

/// Maps step positions to query names and back.
///
/// Names end up in callback payloads and persisted sessions, so a namer
/// must be stable across process restarts for dialogs to survive them.
pub trait StepNamer: Send + Sync {
    /// Query name for the step at `index`.
    fn name(&self, index: usize) -> String;

    /// Step index for a query name, `None` if the name is foreign.
    fn index(&self, name: &str) -> Option<usize>;
}

/// Default namer: `Q0`, `Q1`, ...
#[derive(Debug, Clone, Copy, Default)]
pub struct IndexNamer;

impl StepNamer for IndexNamer {
    fn name(&self, index: usize) -> String {
        format!("Q{index}")
    }

    fn index(&self, name: &str) -> Option<usize> {
        name.strip_prefix('Q')?.parse().ok()
    }
}

/// One collected response, shaped by its step's kind.
#[derive(Debug, Clone)]
pub enum StepResponse {
    /// Response to a text step.
    Text(String),
    /// Response to a single-choice step.
    Choice(usize),
    /// Response to a multi-choice step, ascending.
    Choices(Vec<usize>),
    /// Response to a file step.
    File(Attachment),
}

impl StepResponse {
    /// The text, for text steps.
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            _ => None,
        }
    }

    /// The chosen index, for single-choice steps.
    #[must_use]
    pub fn as_choice(&self) -> Option<usize> {
        match self {
            Self::Choice(index) => Some(*index),
            _ => None,
        }
    }

    /// The chosen indices, for multi-choice steps.
    #[must_use]
    pub fn as_choices(&self) -> Option<&[usize]> {
        match self {
            Self::Choices(indices) => Some(indices),
            _ => None,
        }
    }

    /// The attachment, for file steps.
    #[must_use]
    pub fn as_file(&self) -> Option<&Attachment> {
        match self {
            Self::File(attachment) => Some(attachment),
            _ => None,
        }
    }
}

/// Runs once when every step of a built dialog has a valid response.
#[async_trait]
pub trait Finalize: Send + Sync {
    /// Consume the responses, in step order.
    async fn finish(&self, turn: &mut DialogTurn<'_>, responses: Vec<StepResponse>)
    -> Result<()>;
}

struct FnFinalizer<F>(F);

#[async_trait]
impl<F> Finalize for FnFinalizer<F>
where
    F: Fn(&mut DialogTurn<'_>, Vec<StepResponse>) -> Result<()> + Send + Sync,
{
    async fn finish(
        &self,
        turn: &mut DialogTurn<'_>,
        responses: Vec<StepResponse>,
    ) -> Result<()> {
        (self.0)(turn, responses)
    }
}

enum StepValidator {
    None,
    Text(TextValidator),
    Single(SingleValidator),
    Multi(MultiValidator),
    File(FileValidator),
}

struct StepSpec {
    prompt: String,
    kind: QueryKind,
    choices: Vec<String>,
    validator: StepValidator,
    history: Option<HistoryValidator>,
}

/// Builds a step-sequence dialog.
#[must_use]
pub struct DialogBuilder {
    steps: Vec<StepSpec>,
    namer: Arc<dyn StepNamer>,
    finalizer: Option<Box<dyn Finalize>>,
}

impl DialogBuilder {
    /// Create an empty builder with the default step namer.
    pub fn new() -> Self {
        Self {
            steps: Vec::new(),
            namer: Arc::new(IndexNamer),
            finalizer: None,
        }
    }

    /// Append a free-text step.
    pub fn ask_text(self, prompt: impl Into<String>) -> Self {
        self.push(prompt, QueryKind::TextInput, Vec::new(), StepValidator::None)
    }

    /// Append a free-text step with a validator.
    pub fn ask_text_validated<F>(self, prompt: impl Into<String>, validator: F) -> Self
    where
        F: Fn(&str) -> ValidationResult + Send + Sync + 'static,
    {
        self.push(
            prompt,
            QueryKind::TextInput,
            Vec::new(),
            StepValidator::Text(Box::new(validator)),
        )
    }

    /// Append a single-choice step.
    ///
    /// # Panics
    ///
    /// Panics if `choices` is empty.
    pub fn ask_single_choice<I, S>(self, prompt: impl Into<String>, choices: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let choices = collect_choices(choices);
        self.push(prompt, QueryKind::SingleChoice, choices, StepValidator::None)
    }

    /// Append a single-choice step with a validator over the chosen index.
    ///
    /// # Panics
    ///
    /// Panics if `choices` is empty.
    pub fn ask_single_choice_validated<I, S, F>(
        self,
        prompt: impl Into<String>,
        choices: I,
        validator: F,
    ) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
        F: Fn(usize) -> ValidationResult + Send + Sync + 'static,
    {
        let choices = collect_choices(choices);
        self.push(
            prompt,
            QueryKind::SingleChoice,
            choices,
            StepValidator::Single(Box::new(validator)),
        )
    }

    /// Append a multi-choice step.
    ///
    /// # Panics
    ///
    /// Panics if `choices` is empty.
    pub fn ask_multi_choice<I, S>(self, prompt: impl Into<String>, choices: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let choices = collect_choices(choices);
        self.push(prompt, QueryKind::MultiChoice, choices, StepValidator::None)
    }

    /// Append a multi-choice step with a validator over the chosen indices.
    ///
    /// # Panics
    ///
    /// Panics if `choices` is empty.
    pub fn ask_multi_choice_validated<I, S, F>(
        self,
        prompt: impl Into<String>,
        choices: I,
        validator: F,
    ) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
        F: Fn(&[usize]) -> ValidationResult + Send + Sync + 'static,
    {
        let choices = collect_choices(choices);
        self.push(
            prompt,
            QueryKind::MultiChoice,
            choices,
            StepValidator::Multi(Box::new(validator)),
        )
    }

    /// Append a file-upload step.
    pub fn ask_file(self, prompt: impl Into<String>) -> Self {
        self.push(prompt, QueryKind::FileInput, Vec::new(), StepValidator::None)
    }

    /// Append a file-upload step with an async validator over the upload.
    pub fn ask_file_validated<F>(self, prompt: impl Into<String>, validator: F) -> Self
    where
        F: for<'a> Fn(&'a Attachment) -> BoxFuture<'a, ValidationResult> + Send + Sync + 'static,
    {
        self.push(
            prompt,
            QueryKind::FileInput,
            Vec::new(),
            StepValidator::File(Box::new(validator)),
        )
    }

    /// Attach a validator to the last step that also sees all preceding
    /// responses, for cross-step rules.
    ///
    /// # Panics
    ///
    /// Panics if no step was added yet.
    pub fn with_history_validator<F>(mut self, validator: F) -> Self
    where
        F: Fn(&StepResponse, &[StepResponse]) -> ValidationResult + Send + Sync + 'static,
    {
        let step = self
            .steps
            .last_mut()
            .expect("with_history_validator needs a preceding step");
        step.history = Some(Box::new(validator));
        self
    }

    /// Replace the step namer.
    pub fn step_namer(mut self, namer: impl StepNamer + 'static) -> Self {
        self.namer = Arc::new(namer);
        self
    }

    /// Run a synchronous finalizer once after the last step.
    pub fn finalize<F>(mut self, finalizer: F) -> Self
    where
        F: Fn(&mut DialogTurn<'_>, Vec<StepResponse>) -> Result<()> + Send + Sync + 'static,
    {
        self.finalizer = Some(Box::new(FnFinalizer(finalizer)));
        self
    }

    /// Run an async [`Finalize`] implementation once after the last step.
    pub fn finalize_with(mut self, finalizer: impl Finalize + 'static) -> Self {
        self.finalizer = Some(Box::new(finalizer));
        self
    }

    /// Build the dialog handler.
    ///
    /// # Panics
    ///
    /// Panics if no steps were added.
    pub fn build(self) -> BuiltDialog {
        assert!(!self.steps.is_empty(), "dialog needs at least one step");
        BuiltDialog {
            steps: self.steps,
            namer: self.namer,
            finalizer: self.finalizer,
        }
    }

    fn push(
        mut self,
        prompt: impl Into<String>,
        kind: QueryKind,
        choices: Vec<String>,
        validator: StepValidator,
    ) -> Self {
        self.steps.push(StepSpec {
            prompt: prompt.into(),
            kind,
            choices,
            validator,
            history: None,
        });
        self
    }
}

impl Default for DialogBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for DialogBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DialogBuilder")
            .field("steps", &self.steps.len())
            .finish_non_exhaustive()
    }
}

fn collect_choices<I, S>(choices: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let choices: Vec<String> = choices.into_iter().map(Into::into).collect();
    assert!(!choices.is_empty(), "choice step needs at least one choice");
    choices
}

/// A step-sequence dialog produced by [`DialogBuilder`].
pub struct BuiltDialog {
    steps: Vec<StepSpec>,
    namer: Arc<dyn StepNamer>,
    finalizer: Option<Box<dyn Finalize>>,
}

impl BuiltDialog {
    fn query_for(&self, index: usize) -> Result<Query> {
        let step = self
            .steps
            .get(index)
            .ok_or_else(|| BotError::internal(format!("step {index} out of range")))?;
        let name = self.namer.name(index);
        Ok(match step.kind {
            QueryKind::TextInput => Query::text(name, step.prompt.clone()),
            QueryKind::FileInput => Query::file(name, step.prompt.clone()),
            QueryKind::SingleChoice => {
                Query::single_choice(name, step.prompt.clone(), step.choices.clone())
            }
            QueryKind::MultiChoice => {
                Query::multi_choice(name, step.prompt.clone(), step.choices.clone())
            }
        })
    }

    /// Extract the response for step `index` from the session.
    ///
    /// The error carries the user-facing text for a missing or empty
    /// response, so callers turn it into a retry.
    fn collect_response(
        &self,
        index: usize,
        turn: &DialogTurn<'_>,
    ) -> std::result::Result<StepResponse, ValidationError> {
        let step = self
            .steps
            .get(index)
            .ok_or_else(|| ValidationError::new("please answer the question first"))?;
        let name = self.namer.name(index);
        let session = turn.session();
        match step.kind {
            QueryKind::TextInput => session
                .response_for(&name)
                .map(|text| StepResponse::Text(text.to_owned()))
                .ok_or_else(|| ValidationError::new("please answer the question first")),
            QueryKind::FileInput => turn
                .attachment(&name)
                .map(StepResponse::File)
                .ok_or_else(|| ValidationError::new("please upload a file")),
            QueryKind::SingleChoice => session
                .choices_for(&name)
                .unwrap_or_default()
                .first()
                .copied()
                .map(StepResponse::Choice)
                .ok_or_else(|| ValidationError::new("please select one of the options")),
            QueryKind::MultiChoice => Ok(StepResponse::Choices(
                session.choices_for(&name).unwrap_or_default(),
            )),
        }
    }

    async fn validate(
        &self,
        index: usize,
        response: &StepResponse,
        turn: &DialogTurn<'_>,
    ) -> ValidationResult {
        let Some(step) = self.steps.get(index) else {
            return Ok(());
        };
        match (&step.validator, response) {
            (StepValidator::Text(v), StepResponse::Text(text)) => v(text)?,
            (StepValidator::Single(v), StepResponse::Choice(choice)) => v(*choice)?,
            (StepValidator::Multi(v), StepResponse::Choices(choices)) => v(choices)?,
            (StepValidator::File(v), StepResponse::File(attachment)) => v(attachment).await?,
            _ => {}
        }
        if let Some(history) = &step.history {
            let preceding = (0..index)
                .map(|i| self.collect_response(i, turn))
                .collect::<std::result::Result<Vec<_>, _>>()?;
            history(response, &preceding)?;
        }
        Ok(())
    }
}

#[async_trait]
impl DialogHandler for BuiltDialog {
    async fn advance(&self, turn: &mut DialogTurn<'_>) -> Result<Step> {
        let Some(current) = turn.session().pending_name() else {
            return Ok(Step::Ask(self.query_for(0)?));
        };
        let Some(index) = self.namer.index(current) else {
            return Err(BotError::internal(format!(
                "unrecognized step name: {current}"
            )));
        };

        let response = match self.collect_response(index, turn) {
            Ok(response) => response,
            Err(rejection) => {
                turn.notify(rejection.0);
                return Ok(Step::Retry);
            }
        };
        if let Err(rejection) = self.validate(index, &response, turn).await {
            turn.notify(rejection.0);
            return Ok(Step::Retry);
        }

        let next = index + 1;
        if next < self.steps.len() {
            return Ok(Step::Ask(self.query_for(next)?));
        }

        if let Some(finalizer) = &self.finalizer {
            let responses = (0..self.steps.len())
                .map(|i| self.collect_response(i, turn))
                .collect::<std::result::Result<Vec<_>, _>>()?;
            finalizer.finish(turn, responses).await?;
        }
        Ok(Step::Done)
    }
}

impl fmt::Debug for BuiltDialog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BuiltDialog")
            .field("steps", &self.steps.len())
            .field("finalizer", &self.finalizer.is_some())
            .finish_non_exhaustive()
    }
}
