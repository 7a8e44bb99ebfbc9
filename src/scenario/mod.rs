//! Disaster scenario simulation
//!
//! Each turn narrates the next situation (streamed), proposes three actions,
//! estimates the survival rate and, from the second turn on, grades the
//! previous choice.

pub mod parse;
pub mod prompts;

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Instant;

use futures::StreamExt;
use futures::stream::{self, BoxStream};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, info, instrument, warn};

use crate::llm::{CompletionRequest, LanguageModel, collect_text, ensure_terminal};
use crate::models::{Coordinate, StreamChunk};
use crate::{Result, SeaguardError};

pub use parse::{parse_choices, parse_feedback, parse_survival};

const EVENT_BUFFER: usize = 16;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scenario {
    pub title: String,
    pub description: String,
    pub start_date: String,
}

/// Field report the scenario starts from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub title: String,
    pub latitude: f64,
    pub longitude: f64,
    pub description: String,
    pub reported_date: String,
}

/// One completed turn: the situation shown and the action chosen
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    pub situation: String,
    pub choice: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioInput {
    pub scenario: Scenario,
    pub report: Report,
    #[serde(default)]
    pub history: Vec<Turn>,
}

impl ScenarioInput {
    pub fn validate(&self) -> Result<()> {
        if self.scenario.title.trim().is_empty() {
            return Err(SeaguardError::invalid_request("scenario.title must not be empty"));
        }
        Coordinate::new(self.report.latitude, self.report.longitude)?;
        if let Some(i) = self.history.iter().position(|t| t.choice.trim().is_empty()) {
            return Err(SeaguardError::invalid_request(format!(
                "history[{i}].choice must not be empty"
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SurvivalEstimate {
    /// Always within 0..=100
    pub survival_rate: u8,
    /// Signed change from the previous turn, `"0"` on the first
    pub change: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Evaluation {
    Excellent,
    Good,
    Neutral,
    Risky,
    Dangerous,
}

impl fmt::Display for Evaluation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Evaluation::Excellent => "excellent",
            Evaluation::Good => "good",
            Evaluation::Neutral => "neutral",
            Evaluation::Risky => "risky",
            Evaluation::Dangerous => "dangerous",
        })
    }
}

impl FromStr for Evaluation {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "excellent" => Ok(Evaluation::Excellent),
            "good" => Ok(Evaluation::Good),
            "neutral" => Ok(Evaluation::Neutral),
            "risky" => Ok(Evaluation::Risky),
            "dangerous" => Ok(Evaluation::Dangerous),
            other => Err(format!("unknown evaluation '{other}'")),
        }
    }
}

/// Grade of the previous turn's choice
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChoiceFeedback {
    pub chosen_action: String,
    pub evaluation: Evaluation,
    pub comment: String,
    pub better_choice: Option<String>,
    pub survival_impact: String,
}

/// A complete turn, as returned by the buffered endpoint
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScenarioOutcome {
    pub situation: String,
    pub choice1: String,
    pub choice2: String,
    pub choice3: String,
    pub survival_rate: u8,
    pub survival_change: String,
    pub model: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub feedback: Option<ChoiceFeedback>,
}

/// Named events of a streamed turn. `Done` or `Error` is always last.
#[derive(Debug, Clone, PartialEq)]
pub enum ScenarioEvent {
    Situation(String),
    /// `index` is 1-based
    Choice { index: usize, text: String },
    SurvivalRate(SurvivalEstimate),
    Feedback(ChoiceFeedback),
    Done,
    Error(String),
}

impl ScenarioEvent {
    /// SSE event name
    #[must_use]
    pub fn name(&self) -> String {
        match self {
            ScenarioEvent::Situation(_) => "situation".to_string(),
            ScenarioEvent::Choice { index, .. } => format!("choice{index}"),
            ScenarioEvent::SurvivalRate(_) => "survival_rate".to_string(),
            ScenarioEvent::Feedback(_) => "feedback".to_string(),
            ScenarioEvent::Done => "done".to_string(),
            ScenarioEvent::Error(_) => "error".to_string(),
        }
    }

    /// SSE event payload
    #[must_use]
    pub fn data(&self) -> Value {
        match self {
            ScenarioEvent::Situation(text) | ScenarioEvent::Choice { text, .. } => {
                json!({ "content": text })
            }
            ScenarioEvent::SurvivalRate(estimate) => json!(estimate),
            ScenarioEvent::Feedback(feedback) => json!(feedback),
            ScenarioEvent::Done => json!({ "done": true }),
            ScenarioEvent::Error(error) => json!({ "error": error }),
        }
    }

    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, ScenarioEvent::Done | ScenarioEvent::Error(_))
    }
}

/// Runs scenario turns against a language model
#[derive(Clone)]
pub struct ScenarioSimulator {
    llm: Arc<dyn LanguageModel>,
}

impl ScenarioSimulator {
    pub fn new(llm: Arc<dyn LanguageModel>) -> Self {
        Self { llm }
    }

    /// Stream the narration of the next situation
    #[must_use]
    pub fn situation_stream(&self, input: &ScenarioInput) -> BoxStream<'static, StreamChunk> {
        let (system, prompt) = prompts::situation(input);
        debug!("Situation prompt is {} chars", prompt.chars().count());
        ensure_terminal(self.llm.stream(CompletionRequest::new(prompt).with_system(system)))
    }

    pub async fn choices(&self, situation: &str, history: &[Turn]) -> Result<[String; 3]> {
        let request = CompletionRequest::new(prompts::choices(situation, history))
            .with_system(prompts::CHOICES_SYSTEM);
        let text = self.llm.complete(&request).await?;
        Ok(parse_choices(&text))
    }

    pub async fn survival_rate(
        &self,
        scenario_title: &str,
        situation: &str,
        history: &[Turn],
    ) -> Result<SurvivalEstimate> {
        let prompt = prompts::survival_rate(scenario_title, situation, history);
        let request = CompletionRequest::new(prompt)
            .with_system(prompts::SURVIVAL_SYSTEM)
            .with_json_output();
        let text = self.llm.complete(&request).await?;
        Ok(parse_survival(&text))
    }

    pub async fn feedback(
        &self,
        scenario_title: &str,
        last_turn: &Turn,
        current_situation: &str,
        available_choices: &[String],
    ) -> Result<ChoiceFeedback> {
        let prompt = prompts::feedback(
            scenario_title,
            &last_turn.choice,
            &last_turn.situation,
            current_situation,
            available_choices,
        );
        let request = CompletionRequest::new(prompt)
            .with_system(prompts::FEEDBACK_SYSTEM)
            .with_json_output();
        let text = self.llm.complete(&request).await?;
        Ok(parse_feedback(&text, &last_turn.choice))
    }

    /// Run a whole turn and return it at once
    #[instrument(
        skip(self, input),
        fields(scenario = %input.scenario.title, turn = input.history.len() + 1)
    )]
    pub async fn simulate(&self, input: &ScenarioInput) -> Result<ScenarioOutcome> {
        let start_time = Instant::now();
        let situation = collect_text(self.situation_stream(input)).await?;
        let [choice1, choice2, choice3] = self.choices(&situation, &input.history).await?;
        let survival = self
            .survival_rate(&input.scenario.title, &situation, &input.history)
            .await?;

        let feedback = match input.history.last() {
            Some(last) => {
                let available = [choice1.clone(), choice2.clone(), choice3.clone()];
                Some(
                    self.feedback(&input.scenario.title, last, &situation, &available)
                        .await?,
                )
            }
            None => None,
        };

        info!(
            "Scenario turn finished in {:.3}s (survival {}%)",
            start_time.elapsed().as_secs_f64(),
            survival.survival_rate
        );
        Ok(ScenarioOutcome {
            situation,
            choice1,
            choice2,
            choice3,
            survival_rate: survival.survival_rate,
            survival_change: survival.change,
            model: self.llm.model_name().to_string(),
            feedback,
        })
    }

    /// Run a whole turn as a stream of named events. Dropping the stream
    /// stops the turn.
    #[must_use]
    pub fn simulate_stream(&self, input: ScenarioInput) -> BoxStream<'static, ScenarioEvent> {
        let simulator = self.clone();
        stream::once(async move {
            let (tx, rx) = mpsc::channel(EVENT_BUFFER);
            tokio::spawn(simulator.relay(input, tx));
            ReceiverStream::new(rx)
        })
        .flatten()
        .boxed()
    }

    async fn relay(self, input: ScenarioInput, tx: mpsc::Sender<ScenarioEvent>) {
        let terminal = tokio::select! {
            outcome = self.run(&input, &tx) => match outcome {
                Ok(()) => ScenarioEvent::Done,
                Err(e) => {
                    warn!("Scenario turn failed: {}", e);
                    ScenarioEvent::Error(e.user_message())
                }
            },
            () = tx.closed() => {
                debug!("Scenario consumer dropped; stopping turn");
                return;
            }
        };
        let _ = tx.send(terminal).await;
    }

    async fn run(&self, input: &ScenarioInput, tx: &mpsc::Sender<ScenarioEvent>) -> Result<()> {
        let mut situation = String::new();
        let mut narration = self.situation_stream(input);
        while let Some(chunk) = narration.next().await {
            match chunk {
                StreamChunk::Content { content } => {
                    situation.push_str(&content);
                    if tx.send(ScenarioEvent::Situation(content)).await.is_err() {
                        return Ok(());
                    }
                }
                StreamChunk::Done { .. } => break,
                StreamChunk::Error { error } => return Err(SeaguardError::llm(None, error)),
            }
        }
        drop(narration);

        let choices = self.choices(&situation, &input.history).await?;
        for (i, text) in choices.iter().enumerate() {
            if text.is_empty() {
                continue;
            }
            let event = ScenarioEvent::Choice {
                index: i + 1,
                text: text.clone(),
            };
            if tx.send(event).await.is_err() {
                return Ok(());
            }
        }

        let survival = self
            .survival_rate(&input.scenario.title, &situation, &input.history)
            .await?;
        if tx.send(ScenarioEvent::SurvivalRate(survival)).await.is_err() {
            return Ok(());
        }

        if let Some(last) = input.history.last() {
            let feedback = self
                .feedback(&input.scenario.title, last, &situation, &choices)
                .await?;
            let _ = tx.send(ScenarioEvent::Feedback(feedback)).await;
        }
        Ok(())
    }
}
