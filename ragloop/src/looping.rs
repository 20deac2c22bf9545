//! Reason, act, observe: drive one conversation until it stops.

use std::collections::VecDeque;
use std::path::PathBuf;
use std::thread;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result};
use tracing::{debug, info, instrument, warn};

use crate::core::budget::{DeadlineExceeded, backoff_delay, remaining_budget};
use crate::io::config::RagloopConfig;
use crate::io::model::{ChatMessage, ChatModel, ChatRequest, ModelTurn};
use crate::io::prompt::PromptBuilder;
use crate::io::session_log::{
    CallOutcome, RoundMeta, RoundWriteRequest, ToolResultRecord, write_round,
};
use crate::sessions::Session;
use crate::tools::{ToolCall, ToolDecodeError};

const SKIPPED_MESSAGE: &str =
    "skipped: an earlier tool call in this turn was malformed, resend it after fixing that call";

/// Reason why `run_loop` stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoopStop {
    /// The session's state machine has nothing left to do.
    Complete,
    /// The model replied without tool calls and the session accepted the text.
    Answered { text: String },
    MaxRoundsExceeded { rounds: u32, max_rounds: u32 },
    /// The conversation deadline passed before or during a model call.
    DeadlineExceeded,
}

/// Summary of one conversation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoopOutcome {
    pub conversation: String,
    pub rounds_executed: u32,
    pub stop: LoopStop,
}

/// What happened in one round, handed to the `on_round` callback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoundReport {
    pub round: u32,
    /// Model calls made, retries included.
    pub attempts: u32,
    pub text: String,
    pub results: Vec<ToolResultRecord>,
    pub protocol_error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoopConfig {
    pub max_rounds: u32,
    pub conversation_timeout: Duration,
    pub model_retries: u32,
    pub retry_backoff: Duration,
    pub transcript_rounds: usize,
    pub log_dir: Option<PathBuf>,
}

impl From<&RagloopConfig> for LoopConfig {
    fn from(cfg: &RagloopConfig) -> Self {
        Self {
            max_rounds: cfg.max_rounds,
            conversation_timeout: cfg.conversation_timeout(),
            model_retries: cfg.model_retries,
            retry_backoff: cfg.retry_backoff(),
            transcript_rounds: cfg.transcript_rounds,
            log_dir: cfg.log_dir.clone(),
        }
    }
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self::from(&RagloopConfig::default())
    }
}

/// Run rounds until the session finishes, the model answers, or a limit is hit.
///
/// Malformed tool calls abort only their round. Model failures that outlast
/// the retries, prompt rendering failures, and log write failures stop the
/// conversation with an error.
#[instrument(skip_all, fields(session = %session.kind()))]
pub fn run_loop<M: ChatModel, S: Session, F: FnMut(&RoundReport)>(
    model: &M,
    session: &mut S,
    prompts: &PromptBuilder,
    config: &LoopConfig,
    mut on_round: F,
) -> Result<LoopOutcome> {
    let conversation = conversation_id(&session.kind().to_string());
    let deadline = Instant::now() + config.conversation_timeout;
    let goal = session.goal();
    let tools = session.tools();
    let mut transcript: VecDeque<Vec<ChatMessage>> = VecDeque::new();
    let mut rounds_executed = 0u32;

    let outcome = |rounds_executed, stop| LoopOutcome {
        conversation: conversation.clone(),
        rounds_executed,
        stop,
    };

    loop {
        if session.is_finished() {
            info!(rounds = rounds_executed, "session complete");
            return Ok(outcome(rounds_executed, LoopStop::Complete));
        }
        if rounds_executed >= config.max_rounds {
            return Ok(outcome(
                rounds_executed,
                LoopStop::MaxRoundsExceeded {
                    rounds: rounds_executed,
                    max_rounds: config.max_rounds,
                },
            ));
        }
        if remaining_budget(deadline).is_err() {
            return Ok(outcome(rounds_executed, LoopStop::DeadlineExceeded));
        }

        let round = rounds_executed + 1;
        let started = Instant::now();
        let system = session
            .render(prompts)
            .with_context(|| format!("render {} prompt", session.kind()))?;
        let mut messages = vec![ChatMessage::User {
            content: goal.clone(),
        }];
        messages.extend(transcript.iter().flatten().cloned());
        let request = ChatRequest {
            system,
            messages,
            tools: tools.clone(),
        };

        let (turn, attempts) = match complete_with_retry(model, &request, config, deadline) {
            Ok(done) => done,
            Err(err) if err.downcast_ref::<DeadlineExceeded>().is_some() => {
                warn!(round, "deadline exceeded during model call");
                return Ok(outcome(rounds_executed, LoopStop::DeadlineExceeded));
            }
            Err(err) => return Err(err),
        };
        rounds_executed = round;

        let (results, protocol_error) = dispatch_calls(session, &turn.tool_calls)?;
        debug!(
            round,
            tool_calls = turn.tool_calls.len(),
            protocol_error = protocol_error.is_some(),
            "round dispatched"
        );

        if let Some(log_dir) = &config.log_dir {
            let meta = RoundMeta {
                conversation: conversation.clone(),
                session: session.kind().to_string(),
                round,
                attempts,
                duration_ms: u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
                tool_calls: turn.tool_calls.len(),
                protocol_error: protocol_error.clone(),
            };
            write_round(&RoundWriteRequest {
                log_dir,
                meta: &meta,
                system_prompt: &request.system,
                turn: &turn,
                results: &results,
            })?;
        }

        on_round(&RoundReport {
            round,
            attempts,
            text: turn.text.clone(),
            results: results.clone(),
            protocol_error,
        });

        if turn.tool_calls.is_empty() && session.accepts_final(&turn.text) {
            info!(rounds = rounds_executed, "model answered");
            return Ok(outcome(
                rounds_executed,
                LoopStop::Answered {
                    text: turn.text.trim().to_string(),
                },
            ));
        }

        transcript.push_back(round_messages(turn, &results));
        while transcript.len() > config.transcript_rounds {
            transcript.pop_front();
        }
    }
}

/// Call the model, retrying failures with backoff inside the deadline.
fn complete_with_retry<M: ChatModel>(
    model: &M,
    request: &ChatRequest,
    config: &LoopConfig,
    deadline: Instant,
) -> Result<(ModelTurn, u32)> {
    let mut attempt = 0u32;
    loop {
        attempt += 1;
        let remaining = remaining_budget(deadline)?;
        match model.complete(request, remaining) {
            Ok(turn) => return Ok((turn, attempt)),
            Err(err) if attempt <= config.model_retries => {
                let delay = backoff_delay(config.retry_backoff, attempt, remaining_budget(deadline)?);
                warn!(
                    attempt,
                    delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                    error = %format!("{:#}", err),
                    "model call failed; retrying"
                );
                thread::sleep(delay);
            }
            Err(err) => {
                return Err(err.context(format!("model call failed after {} attempt(s)", attempt)));
            }
        }
    }
}

/// Dispatch calls in order. The first malformed call skips the rest of the turn.
fn dispatch_calls<S: Session>(
    session: &mut S,
    calls: &[ToolCall],
) -> Result<(Vec<ToolResultRecord>, Option<String>)> {
    let mut results = Vec::with_capacity(calls.len());
    let mut protocol_error: Option<String> = None;
    for call in calls {
        if protocol_error.is_some() {
            results.push(record(call, CallOutcome::Skipped, SKIPPED_MESSAGE.to_string()));
            continue;
        }
        match session.dispatch(call) {
            Ok(content) => results.push(record(call, CallOutcome::Handled, content)),
            Err(err) => {
                let Some(decode) = err.downcast_ref::<ToolDecodeError>() else {
                    return Err(err.context(format!("tool {} failed", call.name)));
                };
                warn!(tool = %call.name, error = %decode, "malformed tool call; aborting round");
                let message = decode.to_string();
                results.push(record(
                    call,
                    CallOutcome::ProtocolError,
                    format!("protocol error: {}", message),
                ));
                protocol_error = Some(message);
            }
        }
    }
    Ok((results, protocol_error))
}

fn record(call: &ToolCall, outcome: CallOutcome, content: String) -> ToolResultRecord {
    ToolResultRecord {
        call_id: call.id.clone(),
        name: call.name.clone(),
        outcome,
        content,
    }
}

fn round_messages(turn: ModelTurn, results: &[ToolResultRecord]) -> Vec<ChatMessage> {
    let mut messages = vec![ChatMessage::Assistant {
        content: turn.text,
        tool_calls: turn.tool_calls,
    }];
    messages.extend(results.iter().map(|result| ChatMessage::Tool {
        tool_call_id: result.call_id.clone(),
        content: result.content.clone(),
    }));
    messages
}

fn conversation_id(kind: &str) -> String {
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis())
        .unwrap_or_default();
    format!("{}-{}", kind, millis)
}
