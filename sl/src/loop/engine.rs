//! LoopEngine - drives one agent conversation to a terminal state

use std::future::Future;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::llm::{
    CompletionRequest, CompletionResponse, ContentBlock, LlmClient, LlmError, Message, TokenUsage, ToolCall,
    ToolDefinition,
};
use crate::tools::{Outcome, ToolContext, ToolExecutor};

use super::LoopConfig;
use super::events::{EventSender, LoopEvent};

/// Why a run stopped
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum Termination {
    /// The model answered with non-blank text
    FinalText(String),

    /// The model returned neither text nor tool calls
    NoOp,

    /// Every allowed model turn was used without a final answer
    MaxIterationsExhausted { iterations: u32 },

    /// A model call failed or timed out
    Fatal { message: String },

    /// The run was interrupted from outside
    Cancelled,
}

impl Termination {
    /// Only a final text answer counts as a finished agent
    pub fn is_success(&self) -> bool {
        matches!(self, Termination::FinalText(_))
    }
}

/// Where the conversation state machine currently is
#[derive(Debug, Clone, PartialEq)]
pub enum LoopState {
    AwaitingModel,
    HandlingToolCalls(Vec<ToolCall>),
    Done(Termination),
}

/// Everything known about a run once it has stopped
#[derive(Debug, Clone)]
pub struct RunReport {
    pub run_id: String,
    pub termination: Termination,
    pub iterations: u32,
    pub transcript: Vec<Message>,
    pub usage: TokenUsage,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl RunReport {
    /// Wall-clock duration of the run
    pub fn elapsed(&self) -> chrono::Duration {
        self.finished_at - self.started_at
    }
}

/// Conversation engine
///
/// Owns the transcript and iteration counter for the duration of a run. The
/// sandbox root is fixed in the `ToolContext` the engine is built with.
pub struct LoopEngine {
    /// Run ID
    pub run_id: String,

    /// Loop configuration
    config: LoopConfig,

    /// LLM client
    llm: Arc<dyn LlmClient>,

    /// Tool dispatcher
    executor: ToolExecutor,

    /// Sandbox-scoped tool context
    ctx: ToolContext,

    /// Optional progress channel
    events: Option<EventSender>,

    /// Conversation so far
    transcript: Vec<Message>,

    /// Model turns taken
    iteration: u32,

    /// Token usage accumulated across turns
    usage: TokenUsage,

    /// Tool definitions sent with every request
    tool_defs: Vec<ToolDefinition>,
}

impl LoopEngine {
    /// Create a new loop engine with the standard tools
    pub fn new(config: LoopConfig, llm: Arc<dyn LlmClient>, ctx: ToolContext) -> Self {
        let run_id = uuid::Uuid::now_v7().to_string();
        debug!(%run_id, max_iterations = config.max_iterations, ?ctx, "LoopEngine::new: called");
        let executor = ToolExecutor::standard();
        let tool_defs = executor.definitions();

        Self {
            run_id,
            config,
            llm,
            executor,
            ctx,
            events: None,
            transcript: Vec::new(),
            iteration: 0,
            usage: TokenUsage::default(),
            tool_defs,
        }
    }

    /// Publish progress events on this channel
    pub fn with_events(mut self, events: EventSender) -> Self {
        debug!(run_id = %self.run_id, "with_events: called");
        self.events = Some(events);
        self
    }

    /// Run the conversation to a terminal state
    pub async fn run(&mut self, prompt: &str) -> RunReport {
        let started_at = self.start(prompt);
        let termination = self.drive().await;
        self.finish(termination, started_at)
    }

    /// Run the conversation, stopping early when `shutdown` resolves
    ///
    /// Cancellation drops the in-flight model call or tool; a running script
    /// is killed when its child handle is dropped.
    pub async fn run_until<F>(&mut self, prompt: &str, shutdown: F) -> RunReport
    where
        F: Future<Output = ()>,
    {
        let started_at = self.start(prompt);
        let termination = tokio::select! {
            biased;
            _ = shutdown => {
                warn!("Run cancelled");
                Termination::Cancelled
            }
            termination = self.drive() => termination,
        };
        self.finish(termination, started_at)
    }

    fn start(&mut self, prompt: &str) -> DateTime<Utc> {
        debug!(run_id = %self.run_id, prompt_len = prompt.len(), "start: called");
        info!(
            "Starting run {} (max_iterations: {}, sandbox: {})",
            self.run_id,
            self.config.max_iterations,
            self.ctx.root()
        );
        self.transcript = vec![Message::user(prompt)];
        self.iteration = 0;
        self.usage = TokenUsage::default();
        Utc::now()
    }

    fn finish(&mut self, termination: Termination, started_at: DateTime<Utc>) -> RunReport {
        debug!(run_id = %self.run_id, ?termination, iterations = self.iteration, "finish: called");
        info!(
            "Run {} finished after {} iterations: {:?}",
            self.run_id, self.iteration, termination
        );
        self.emit(LoopEvent::Finished {
            iterations: self.iteration,
            termination: termination.clone(),
        });

        RunReport {
            run_id: self.run_id.clone(),
            termination,
            iterations: self.iteration,
            transcript: self.transcript.clone(),
            usage: self.usage,
            started_at,
            finished_at: Utc::now(),
        }
    }

    /// Step the state machine until it reaches `Done`
    async fn drive(&mut self) -> Termination {
        let mut state = LoopState::AwaitingModel;
        loop {
            state = match state {
                LoopState::AwaitingModel => self.await_model().await,
                LoopState::HandlingToolCalls(calls) => self.handle_tool_calls(calls).await,
                LoopState::Done(termination) => return termination,
            };
        }
    }

    /// One model turn
    async fn await_model(&mut self) -> LoopState {
        if self.iteration >= self.config.max_iterations {
            debug!(run_id = %self.run_id, iteration = self.iteration, "await_model: iteration bound reached");
            warn!("Maximum iterations ({}) reached", self.config.max_iterations);
            return LoopState::Done(Termination::MaxIterationsExhausted {
                iterations: self.iteration,
            });
        }

        self.iteration += 1;
        info!("Run {} iteration {}/{}", self.run_id, self.iteration, self.config.max_iterations);
        self.emit(LoopEvent::IterationStarted {
            iteration: self.iteration,
            max_iterations: self.config.max_iterations,
        });

        let request = CompletionRequest {
            system_prompt: self.config.system_prompt.clone(),
            messages: self.transcript.clone(),
            tools: self.tool_defs.clone(),
            max_tokens: self.config.max_tokens,
        };

        let response = match self.call_model(request).await {
            Ok(r) => r,
            Err(e) => {
                error!(iteration = self.iteration, error = %e, "Model call failed");
                return LoopState::Done(Termination::Fatal {
                    message: format!("model call failed during iteration {}: {}", self.iteration, e),
                });
            }
        };

        debug!(
            run_id = %self.run_id,
            stop_reason = ?response.stop_reason,
            tool_calls = response.tool_calls.len(),
            "await_model: response received"
        );
        self.usage.add(&response.usage);
        self.transcript.push(Message::from_response(&response));
        self.emit(LoopEvent::ResponseReceived {
            iteration: self.iteration,
            input_tokens: response.usage.input_tokens,
            output_tokens: response.usage.output_tokens,
            text: response.content.clone(),
            tool_calls: response.tool_calls.len(),
        });

        // Final text wins over any tool calls in the same response
        if let Some(text) = response.text() {
            if !response.tool_calls.is_empty() {
                debug!(
                    run_id = %self.run_id,
                    skipped = response.tool_calls.len(),
                    "await_model: final text with tool calls, calls not dispatched"
                );
            }
            return LoopState::Done(Termination::FinalText(text.to_string()));
        }

        if response.tool_calls.is_empty() {
            debug!(run_id = %self.run_id, "await_model: neither text nor tool calls");
            return LoopState::Done(Termination::NoOp);
        }

        LoopState::HandlingToolCalls(response.tool_calls)
    }

    /// Model call bounded by the outer timeout
    async fn call_model(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        match tokio::time::timeout(self.config.model_timeout, self.llm.complete(request)).await {
            Ok(result) => result,
            Err(_) => Err(LlmError::Timeout(self.config.model_timeout)),
        }
    }

    /// Dispatch every call in order and append the results as one user turn
    async fn handle_tool_calls(&mut self, calls: Vec<ToolCall>) -> LoopState {
        debug!(run_id = %self.run_id, count = calls.len(), "handle_tool_calls: called");
        let mut blocks = Vec::with_capacity(calls.len());

        for call in &calls {
            self.emit(LoopEvent::ToolCallStarted {
                iteration: self.iteration,
                call_id: call.id.clone(),
                tool_name: call.name.clone(),
                args: call.input.clone(),
            });

            let envelope = self.executor.dispatch(call, &self.ctx).await;
            debug!(call_id = %envelope.call_id, is_error = envelope.is_error(), "handle_tool_calls: dispatched");

            self.emit(LoopEvent::ToolCallCompleted {
                iteration: self.iteration,
                call_id: envelope.call_id.clone(),
                tool_name: envelope.tool_name.clone(),
                is_error: envelope.is_error(),
                response: envelope.response_payload(),
            });

            blocks.push(match &envelope.outcome {
                Outcome::Result(result) => ContentBlock::tool_result(
                    envelope.call_id.clone(),
                    envelope.tool_name.clone(),
                    result.content.clone(),
                    result.is_error,
                ),
                Outcome::DispatchError(message) => {
                    ContentBlock::dispatch_error(envelope.call_id.clone(), envelope.tool_name.clone(), message.clone())
                }
            });
        }

        self.transcript.push(Message::user_blocks(blocks));
        LoopState::AwaitingModel
    }

    fn emit(&self, event: LoopEvent) {
        if let Some(tx) = &self.events {
            debug!(event_type = event.event_type(), "LoopEngine::emit");
            // A dropped receiver only means nobody is rendering
            let _ = tx.send(event);
        }
    }
}
