use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use futures::StreamExt;
use tokio::sync::RwLock;

use crate::context::Context;
use crate::error::HiveError;
use crate::events::EventEmitter;
use crate::memory::Memory;
use crate::provider::Provider;
use crate::schemas::{
    Event, FinishReason, InferenceOptions, InferenceStreamUpdate, MemoryMessage, Prompt,
    StepResult, TokenUsage, ToolCall, ToolResult,
};
use crate::tools::{ToolRegistry, ToolSchema};

use super::AgentConfiguration;

/// Token budget handed to the memory when building a turn's context.
const CONTEXT_TOKEN_LIMIT: usize = 4096;

/// What one model turn produced, normalized across the three provider
/// modes.
struct ModelTurn {
    content: Option<String>,
    tool_calls: Vec<ToolCall>,
    usage: Option<TokenUsage>,
    #[allow(dead_code)]
    finish_reason: FinishReason,
}

/// Drives one conversation to termination: model turn, tool turn,
/// repeat. Owns clones of everything the spawned streaming task needs.
pub(crate) struct TurnEngine {
    pub(crate) instructions: String,
    pub(crate) provider: Arc<dyn Provider>,
    pub(crate) tools: Arc<ToolRegistry>,
    pub(crate) memory: Arc<RwLock<dyn Memory>>,
    pub(crate) configuration: AgentConfiguration,
    pub(crate) inference_options: InferenceOptions,
}

impl TurnEngine {
    /// Run to completion, emitting progress on `emitter` and returning
    /// the terminal outcome. Exactly one terminal event is emitted.
    pub(crate) async fn drive(
        &self,
        ctx: Context,
        emitter: EventEmitter,
    ) -> Result<StepResult, HiveError> {
        let outcome = self.run_loop(&ctx, &emitter).await;

        match &outcome {
            Ok(result) => {
                if let Some(hooks) = ctx.hooks() {
                    hooks.on_finish(result).await;
                }
                emitter
                    .emit(Event::Completed {
                        result: result.clone(),
                    })
                    .await;
            }
            Err(HiveError::Cancelled) => emitter.emit(Event::Cancelled).await,
            Err(error) => {
                emitter
                    .emit(Event::Failed {
                        error: error.to_string(),
                    })
                    .await
            }
        }

        outcome
    }

    async fn run_loop(
        &self,
        ctx: &Context,
        emitter: &EventEmitter,
    ) -> Result<StepResult, HiveError> {
        let input = ctx.input().to_string();
        let started = Instant::now();

        emitter
            .emit(Event::Started {
                input: input.clone(),
            })
            .await;

        if let Some(hooks) = ctx.hooks() {
            hooks.on_start(&input).await;
            if let Err(error) = hooks.guardrail_input(&input).await {
                return self.guardrail_tripped(error, emitter).await;
            }
        }

        let mut session_batch = self.load_history(ctx, &input).await;

        let mut all_calls: Vec<ToolCall> = Vec::new();
        let mut all_results: Vec<ToolResult> = Vec::new();
        let mut usage: Option<TokenUsage> = None;
        let final_output;

        loop {
            ctx.check_cancelled()?;

            let iteration = ctx.advance_iteration();
            if iteration > self.configuration.max_iterations {
                return Err(HiveError::MaxIterationsExceeded {
                    iterations: self.configuration.max_iterations,
                    partial_output: all_results
                        .last()
                        .map(|result| result.content())
                        .unwrap_or_default(),
                });
            }

            emitter.emit(Event::IterationStarted { iteration }).await;
            if let Some(hooks) = ctx.hooks() {
                hooks.on_iteration(iteration).await;
            }

            let prompt = self.build_prompt(&input).await;
            let schemas = self.tools.schemas();

            let turn = self.model_turn(&prompt, &schemas, ctx, emitter).await?;
            usage = TokenUsage::merge_options(usage, turn.usage.clone());

            if turn.tool_calls.is_empty() {
                // DECIDE: no tool calls, so this turn's text is final.
                let content = turn.content.unwrap_or_default();
                let assistant = MemoryMessage::assistant(&content);
                self.memory.write().await.add_message(assistant.clone());
                session_batch.push(assistant);

                emitter.emit(Event::IterationCompleted { iteration }).await;
                final_output = content;
                break;
            }

            self.tool_turn(&turn.tool_calls, ctx, emitter, &mut session_batch, &mut all_results)
                .await?;
            all_calls.extend(turn.tool_calls);

            emitter.emit(Event::IterationCompleted { iteration }).await;
        }

        if let Some(hooks) = ctx.hooks() {
            if let Err(error) = hooks.guardrail_output(&final_output).await {
                return self.guardrail_tripped(error, emitter).await;
            }
        }

        if let Some(session) = ctx.session() {
            // One batch per run keeps the session append atomic.
            session.add_items(session_batch).await;
        }

        Ok(StepResult {
            output: final_output,
            tool_calls: all_calls,
            tool_results: all_results,
            iterations: ctx.iteration(),
            duration: started.elapsed(),
            usage,
            metadata: Default::default(),
        })
    }

    /// Seed memory from the session (when empty) and append the user
    /// message. Returns the starting session write-back batch.
    async fn load_history(&self, ctx: &Context, input: &str) -> Vec<MemoryMessage> {
        let mut memory = self.memory.write().await;

        if let Some(session) = ctx.session() {
            if memory.is_empty() && self.configuration.session_history_limit > 0 {
                let items = session
                    .get_items(Some(self.configuration.session_history_limit))
                    .await;
                memory.add_messages(items);
            }
        }

        let user = MemoryMessage::user(input);
        memory.add_message(user.clone());
        vec![user]
    }

    async fn build_prompt(&self, query: &str) -> Prompt {
        let memory = self.memory.read().await;
        let context = memory.context(query, CONTEXT_TOKEN_LIMIT);
        let system = if self.instructions.is_empty() {
            None
        } else {
            Some(self.instructions.clone())
        };

        Prompt::new(system, memory.messages()).with_context(Some(context))
    }

    /// Invoke the provider in whichever of the three modes its
    /// capabilities allow.
    async fn model_turn(
        &self,
        prompt: &Prompt,
        schemas: &[ToolSchema],
        ctx: &Context,
        emitter: &EventEmitter,
    ) -> Result<ModelTurn, HiveError> {
        if schemas.is_empty() {
            return self.plain_turn(prompt, ctx, emitter).await;
        }

        if self.provider.supports_streaming() {
            self.streaming_tool_turn(prompt, schemas, ctx, emitter).await
        } else {
            let response = cancellable(
                ctx,
                self.provider
                    .generate_with_tool_calls(prompt, schemas, &self.inference_options),
            )
            .await?;

            if let Some(content) = &response.content {
                if !content.is_empty() {
                    emitter
                        .emit(Event::OutputChunk {
                            text: content.clone(),
                        })
                        .await;
                }
            }

            Ok(ModelTurn {
                content: response.content,
                tool_calls: response.tool_calls,
                usage: response.usage,
                finish_reason: response.finish_reason,
            })
        }
    }

    /// Text-only turn for agents without tools.
    async fn plain_turn(
        &self,
        prompt: &Prompt,
        ctx: &Context,
        emitter: &EventEmitter,
    ) -> Result<ModelTurn, HiveError> {
        let content = if self.provider.supports_streaming() {
            let mut stream =
                cancellable(ctx, self.provider.stream(prompt, &self.inference_options)).await?;

            let mut content = String::new();
            loop {
                let chunk = tokio::select! {
                    _ = ctx.cancellation().cancelled() => return Err(HiveError::Cancelled),
                    chunk = stream.next() => chunk,
                };
                match chunk {
                    Some(chunk) => {
                        let text = chunk?;
                        emitter.emit(Event::OutputChunk { text: text.clone() }).await;
                        content.push_str(&text);
                    }
                    None => break,
                }
            }
            content
        } else {
            let content = cancellable(
                ctx,
                self.provider.generate(prompt, &self.inference_options),
            )
            .await?;
            emitter
                .emit(Event::OutputChunk {
                    text: content.clone(),
                })
                .await;
            content
        };

        Ok(ModelTurn {
            content: Some(content),
            tool_calls: Vec::new(),
            usage: None,
            finish_reason: FinishReason::Completed,
        })
    }

    async fn streaming_tool_turn(
        &self,
        prompt: &Prompt,
        schemas: &[ToolSchema],
        ctx: &Context,
        emitter: &EventEmitter,
    ) -> Result<ModelTurn, HiveError> {
        let mut stream = cancellable(
            ctx,
            self.provider
                .stream_with_tool_calls(prompt, schemas, &self.inference_options),
        )
        .await?;

        let mut content = String::new();
        let mut tool_calls = Vec::new();
        let mut usage = None;
        let mut finish_reason = FinishReason::Completed;

        loop {
            let update = tokio::select! {
                _ = ctx.cancellation().cancelled() => return Err(HiveError::Cancelled),
                update = stream.next() => update,
            };

            match update {
                Some(update) => match update? {
                    InferenceStreamUpdate::OutputChunk(text) => {
                        emitter.emit(Event::OutputChunk { text: text.clone() }).await;
                        content.push_str(&text);
                    }
                    InferenceStreamUpdate::ToolCallPartial {
                        provider_call_id,
                        tool_name,
                        arguments_fragment,
                        index,
                    } => {
                        emitter
                            .emit(Event::ToolCallPartial {
                                provider_call_id,
                                tool_name,
                                arguments_fragment,
                                index,
                            })
                            .await;
                    }
                    InferenceStreamUpdate::ToolCallsCompleted(calls) => tool_calls = calls,
                    InferenceStreamUpdate::Usage(turn_usage) => usage = Some(turn_usage),
                    InferenceStreamUpdate::Done(reason) => {
                        finish_reason = reason;
                        break;
                    }
                },
                None => break,
            }
        }

        Ok(ModelTurn {
            content: (!content.is_empty()).then_some(content),
            tool_calls,
            usage,
            finish_reason,
        })
    }

    /// Dispatch the turn's tool calls and feed every result back into
    /// memory, failures included, so the model can self-correct.
    async fn tool_turn(
        &self,
        calls: &[ToolCall],
        ctx: &Context,
        emitter: &EventEmitter,
        session_batch: &mut Vec<MemoryMessage>,
        all_results: &mut Vec<ToolResult>,
    ) -> Result<(), HiveError> {
        {
            // Record the assistant's decision to call tools.
            let assistant = MemoryMessage::assistant("").with_metadata(
                "tool_calls",
                serde_json::to_value(calls).unwrap_or_default(),
            );
            self.memory.write().await.add_message(assistant.clone());
            if self.configuration.persist_tool_messages {
                session_batch.push(assistant);
            }
        }

        for call in calls {
            emitter.emit(Event::ToolCallStarted { call: call.clone() }).await;
            if let Some(hooks) = ctx.hooks() {
                hooks.on_tool_call(call).await;
            }
        }

        let parallel = self.configuration.parallel_tool_calls && calls.len() > 1;
        let results = cancellable_infallible(ctx, self.tools.dispatch_all(calls, parallel)).await?;

        let mut memory = self.memory.write().await;
        for (call, result) in calls.iter().zip(results) {
            if result.is_success() {
                emitter
                    .emit(Event::ToolCallCompleted {
                        result: result.clone(),
                    })
                    .await;
            } else {
                log::warn!("Tool '{}' failed: {}", call.name, result.content());
                emitter
                    .emit(Event::ToolCallFailed {
                        call: call.clone(),
                        error: result.content(),
                    })
                    .await;
            }
            if let Some(hooks) = ctx.hooks() {
                hooks.on_tool_result(&result).await;
            }

            let message = MemoryMessage::tool(Some(call.name.clone()), result.content())
                .with_metadata("call_id", call.id.clone());
            memory.add_message(message.clone());
            if self.configuration.persist_tool_messages {
                session_batch.push(message);
            }

            all_results.push(result);
        }

        Ok(())
    }

    async fn guardrail_tripped(
        &self,
        error: HiveError,
        emitter: &EventEmitter,
    ) -> Result<StepResult, HiveError> {
        let error = match error {
            HiveError::GuardrailViolation(_) => error,
            other => HiveError::GuardrailViolation(other.to_string()),
        };
        emitter
            .emit(Event::GuardrailFailed {
                error: error.to_string(),
            })
            .await;
        Err(error)
    }
}

async fn cancellable<T>(
    ctx: &Context,
    fut: impl Future<Output = Result<T, HiveError>>,
) -> Result<T, HiveError> {
    tokio::select! {
        _ = ctx.cancellation().cancelled() => Err(HiveError::Cancelled),
        result = fut => result,
    }
}

async fn cancellable_infallible<T>(
    ctx: &Context,
    fut: impl Future<Output = T>,
) -> Result<T, HiveError> {
    tokio::select! {
        _ = ctx.cancellation().cancelled() => Err(HiveError::Cancelled),
        value = fut => Ok(value),
    }
}
