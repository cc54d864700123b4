use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;

use crate::context::Context;
use crate::error::HiveError;
use crate::events::{event_channel, EventEmitter, EventStream};
use crate::memory::{Memory, Session};
use crate::provider::Provider;
use crate::schemas::{InferenceOptions, StepResult};
use crate::step::Step;
use crate::tools::ToolRegistry;
use crate::trace::{ConsoleTracer, Tracer};

use super::{AgentBuilder, AgentConfiguration, RunHooks, TurnEngine};

/// A model-backed [`Step`]: instructions, tools and memory around a
/// provider, driven by the turn engine.
///
/// ```rust,ignore
/// let agent = Agent::builder()
///     .name("assistant")
///     .instructions("You are terse.")
///     .provider(provider)
///     .tool(calculator)
///     .build()?;
///
/// let result = agent.run("What is 2+2?", None, None).await?;
/// ```
pub struct Agent {
    pub(crate) instructions: String,
    pub(crate) provider: Arc<dyn Provider>,
    pub(crate) tools: Arc<ToolRegistry>,
    pub(crate) memory: Arc<RwLock<dyn Memory>>,
    pub(crate) configuration: AgentConfiguration,
    pub(crate) inference_options: InferenceOptions,
    pub(crate) tracer: Option<Arc<dyn Tracer>>,
    /// Token of the most recently started run, for [`Agent::cancel`].
    current_run: Mutex<CancellationToken>,
}

impl Agent {
    pub fn builder() -> AgentBuilder {
        AgentBuilder::new()
    }

    pub(crate) fn from_parts(
        instructions: String,
        provider: Arc<dyn Provider>,
        tools: Arc<ToolRegistry>,
        memory: Arc<RwLock<dyn Memory>>,
        configuration: AgentConfiguration,
        inference_options: InferenceOptions,
        tracer: Option<Arc<dyn Tracer>>,
    ) -> Self {
        Self {
            instructions,
            provider,
            tools,
            memory,
            configuration,
            inference_options,
            tracer,
            current_run: Mutex::new(CancellationToken::new()),
        }
    }

    pub fn agent_name(&self) -> &str {
        &self.configuration.name
    }

    pub fn instructions(&self) -> &str {
        &self.instructions
    }

    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    pub fn configuration(&self) -> &AgentConfiguration {
        &self.configuration
    }

    /// Cancel the most recently started run; it terminates with a
    /// `Cancelled` event at its next suspension point.
    pub fn cancel(&self) {
        self.current_run
            .lock()
            .expect("run token poisoned")
            .cancel();
    }

    /// Run to completion and return the terminal result. `stream` is the
    /// ground truth; this is its collected form.
    pub async fn run(
        &self,
        input: impl Into<String>,
        session: Option<Arc<dyn Session>>,
        hooks: Option<Arc<dyn RunHooks>>,
    ) -> Result<StepResult, HiveError> {
        let ctx = self.run_context(input.into(), CancellationToken::new(), session, hooks);
        self.engine().drive(ctx, EventEmitter::discard()).await
    }

    /// Start a run and observe it as a cancellable event stream.
    pub fn stream(
        &self,
        input: impl Into<String>,
        session: Option<Arc<dyn Session>>,
        hooks: Option<Arc<dyn RunHooks>>,
    ) -> EventStream {
        let token = CancellationToken::new();
        let ctx = self.run_context(input.into(), token.clone(), session, hooks);
        let (emitter, stream) = event_channel(token);

        let engine = self.engine();
        tokio::spawn(async move {
            let _ = engine.drive(ctx, emitter).await;
        });

        stream
    }

    fn run_context(
        &self,
        input: String,
        token: CancellationToken,
        session: Option<Arc<dyn Session>>,
        hooks: Option<Arc<dyn RunHooks>>,
    ) -> Context {
        *self.current_run.lock().expect("run token poisoned") = token.clone();

        let mut builder = Context::builder(input).cancellation(token);
        if let Some(session) = session {
            builder = builder.session(session);
        }
        if let Some(hooks) = hooks {
            builder = builder.hooks(hooks);
        }
        if let Some(tracer) = self.effective_tracer() {
            builder = builder.tracer(tracer);
        }
        builder.memory(Arc::clone(&self.memory)).build()
    }

    fn effective_tracer(&self) -> Option<Arc<dyn Tracer>> {
        match (&self.tracer, self.configuration.default_tracing_enabled) {
            (Some(tracer), _) => Some(Arc::clone(tracer)),
            (None, true) => Some(Arc::new(ConsoleTracer::new())),
            (None, false) => None,
        }
    }

    fn engine(&self) -> TurnEngine {
        TurnEngine {
            instructions: self.instructions.clone(),
            provider: Arc::clone(&self.provider),
            tools: Arc::clone(&self.tools),
            memory: Arc::clone(&self.memory),
            configuration: self.configuration.clone(),
            inference_options: self.inference_options.clone(),
        }
    }
}

#[async_trait]
impl Step for Agent {
    fn name(&self) -> String {
        self.configuration.name.clone()
    }

    /// Running as a workflow step inherits the surrounding run's
    /// cancellation scope, session, hooks and tracer.
    async fn execute(&self, input: &str, ctx: &Context) -> Result<StepResult, HiveError> {
        let token = ctx.cancellation().child_token();
        *self.current_run.lock().expect("run token poisoned") = token.clone();

        let mut builder = Context::builder(input).cancellation(token);
        if let Some(session) = ctx.session() {
            builder = builder.session(session);
        }
        if let Some(hooks) = ctx.hooks() {
            builder = builder.hooks(hooks);
        }
        if let Some(tracer) = ctx.tracer().or_else(|| self.effective_tracer()) {
            builder = builder.tracer(tracer);
        }
        let run_ctx = builder.memory(Arc::clone(&self.memory)).build();

        self.engine().drive(run_ctx, EventEmitter::discard()).await
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use serde_json::{json, Value};

    use super::*;
    use crate::error::HiveError;
    use crate::memory::InMemorySession;
    use crate::provider::ScriptedProvider;
    use crate::schemas::{Event, InferenceResponse, MessageRole, TokenUsage, ToolCall};
    use crate::tools::{FunctionTool, Tool, ToolArguments, ToolParameter, ToolSchema};

    fn calculator() -> Arc<dyn Tool> {
        Arc::new(FunctionTool::new(
            ToolSchema::new("calculator", "Evaluate an arithmetic expression")
                .parameter(ToolParameter::string("expression")),
            |args: ToolArguments| async move {
                match args.require_str("expression")? {
                    "2+2" => Ok(json!("4")),
                    other => Err(HiveError::tool_execution_failed(
                        "calculator",
                        format!("unsupported expression: {other}"),
                    )),
                }
            },
        ))
    }

    fn tool_call_script() -> Vec<InferenceResponse> {
        let args = match json!({"expression": "2+2"}) {
            Value::Object(map) => map,
            _ => unreachable!(),
        };
        vec![
            InferenceResponse::tool_calls(vec![
                ToolCall::new("calculator", args).with_provider_call_id("call_0"),
            ])
            .with_usage(TokenUsage::new(12, 3)),
            InferenceResponse::text("The answer is 4").with_usage(TokenUsage::new(20, 5)),
        ]
    }

    fn calculator_agent(streaming: bool) -> Agent {
        let provider = ScriptedProvider::new(tool_call_script());
        let provider = if streaming { provider.streaming() } else { provider };

        Agent::builder()
            .name("calculator_agent")
            .instructions("Use the calculator for arithmetic.")
            .provider(provider)
            .tool(calculator())
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn test_tool_round_trip_non_streaming() {
        let agent = calculator_agent(false);
        let result = agent.run("What is 2+2?", None, None).await.unwrap();

        assert_eq!(result.output, "The answer is 4");
        assert_eq!(result.iterations, 2);
        assert_eq!(result.tool_calls.len(), 1);
        assert_eq!(result.tool_calls[0].name, "calculator");
        assert_eq!(result.tool_results.len(), 1);
        assert_eq!(result.tool_results[0].content(), "4");
        assert_eq!(result.usage, Some(TokenUsage::new(32, 8)));
    }

    #[tokio::test]
    async fn test_memory_holds_the_conversation_tail() {
        let agent = calculator_agent(false);
        let result = agent.run("What is 2+2?", None, None).await.unwrap();

        let messages = agent.memory.read().await.messages();
        let tail = &messages[messages.len() - 2..];
        // Tool-call turns sit between; the tail is the tool result and
        // the final assistant message.
        assert_eq!(tail[1].role, MessageRole::Assistant);
        assert_eq!(tail[1].content, result.output);
        assert_eq!(messages[0].role, MessageRole::User);
        assert_eq!(messages[0].content, "What is 2+2?");
    }

    #[tokio::test]
    async fn test_plain_run_memory_invariant() {
        let agent = Agent::builder()
            .provider(ScriptedProvider::new([InferenceResponse::text("hello!")]))
            .build()
            .unwrap();
        agent.run("hi", None, None).await.unwrap();

        let messages = agent.memory.read().await.messages();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, MessageRole::User);
        assert_eq!(messages[0].content, "hi");
        assert_eq!(messages[1].role, MessageRole::Assistant);
        assert_eq!(messages[1].content, "hello!");
    }

    #[tokio::test]
    async fn test_stream_event_ordering_and_tool_pairing() {
        let agent = calculator_agent(true);
        let events = agent
            .stream("What is 2+2?", None, None)
            .collect_events()
            .await;

        assert!(matches!(events.first(), Some(Event::Started { .. })));
        assert!(matches!(events.last(), Some(Event::Completed { .. })));
        assert_eq!(
            events.iter().filter(|e| e.is_terminal()).count(),
            1,
            "exactly one terminal event"
        );

        // Iteration bracketing: started(n) < events < completed(n), and
        // iteration 2 starts only after iteration 1 completed.
        let position = |predicate: &dyn Fn(&Event) -> bool| {
            events.iter().position(|event| predicate(event)).unwrap()
        };
        let iter1_start = position(&|e| matches!(e, Event::IterationStarted { iteration: 1 }));
        let iter1_end = position(&|e| matches!(e, Event::IterationCompleted { iteration: 1 }));
        let iter2_start = position(&|e| matches!(e, Event::IterationStarted { iteration: 2 }));
        let tool_started = position(&|e| matches!(e, Event::ToolCallStarted { .. }));
        let tool_completed = position(&|e| matches!(e, Event::ToolCallCompleted { .. }));
        let partial = position(&|e| matches!(e, Event::ToolCallPartial { .. }));

        assert!(iter1_start < partial);
        assert!(partial < tool_started);
        assert!(tool_started < tool_completed);
        assert!(tool_completed < iter1_end);
        assert!(iter1_end < iter2_start);

        // Tool pairing: the completion references the started call.
        let call_id = events.iter().find_map(|event| match event {
            Event::ToolCallStarted { call } => Some(call.id.clone()),
            _ => None,
        });
        let result_id = events.iter().find_map(|event| match event {
            Event::ToolCallCompleted { result } => Some(result.call_id.clone()),
            _ => None,
        });
        assert_eq!(call_id, result_id);
    }

    #[tokio::test]
    async fn test_cancellation_yields_single_cancelled_event() {
        let provider = ScriptedProvider::new([InferenceResponse::text("too late")])
            .with_turn_delay(Duration::from_millis(500));
        let agent = Agent::builder().provider(provider).build().unwrap();

        let stream = agent.stream("slow question", None, None);
        tokio::time::sleep(Duration::from_millis(10)).await;
        stream.cancel();

        let events = stream.collect_events().await;
        assert!(matches!(events.last(), Some(Event::Cancelled)));
        assert_eq!(events.iter().filter(|e| e.is_terminal()).count(), 1);
        assert!(!events
            .iter()
            .any(|event| matches!(event, Event::Completed { .. } | Event::Failed { .. })));
    }

    #[tokio::test]
    async fn test_agent_cancel_handle() {
        let provider = ScriptedProvider::new([InferenceResponse::text("too late")])
            .with_turn_delay(Duration::from_millis(500));
        let agent = Arc::new(Agent::builder().provider(provider).build().unwrap());

        let runner = Arc::clone(&agent);
        let handle =
            tokio::spawn(async move { runner.run("slow question", None, None).await });

        tokio::time::sleep(Duration::from_millis(20)).await;
        agent.cancel();

        let result = handle.await.unwrap();
        assert!(matches!(result.unwrap_err(), HiveError::Cancelled));
    }

    #[tokio::test]
    async fn test_max_iterations_exceeded() {
        // Every turn asks for another tool call; the loop must bail.
        let args = match json!({"expression": "2+2"}) {
            Value::Object(map) => map,
            _ => unreachable!(),
        };
        let turns: Vec<InferenceResponse> = (0..4)
            .map(|_| {
                InferenceResponse::tool_calls(vec![ToolCall::new("calculator", args.clone())])
            })
            .collect();

        let agent = Agent::builder()
            .provider(ScriptedProvider::new(turns))
            .tool(calculator())
            .configuration(AgentConfiguration::default().with_max_iterations(3))
            .build()
            .unwrap();

        let error = agent.run("loop forever", None, None).await.unwrap_err();
        assert!(matches!(
            error,
            HiveError::MaxIterationsExceeded { iterations: 3, .. }
        ));
    }

    #[tokio::test]
    async fn test_tool_failure_feeds_back_without_aborting() {
        let args = match json!({"expression": "1/0"}) {
            Value::Object(map) => map,
            _ => unreachable!(),
        };
        let agent = Agent::builder()
            .provider(ScriptedProvider::new([
                InferenceResponse::tool_calls(vec![ToolCall::new("calculator", args)]),
                InferenceResponse::text("That expression is not supported."),
            ]))
            .tool(calculator())
            .build()
            .unwrap();

        let result = agent.run("What is 1/0?", None, None).await.unwrap();
        assert_eq!(result.output, "That expression is not supported.");
        assert!(!result.tool_results[0].is_success());

        // The failure is visible to the next model turn as a tool message.
        let messages = agent.memory.read().await.messages();
        assert!(messages.iter().any(|message| {
            message.role == MessageRole::Tool && message.content.contains("Tool call failed")
        }));
    }

    #[tokio::test]
    async fn test_session_seeding_and_write_back() {
        let session: Arc<dyn Session> = Arc::new(InMemorySession::new());
        session
            .add_items(vec![
                crate::schemas::MemoryMessage::user("earlier question"),
                crate::schemas::MemoryMessage::assistant("earlier answer"),
            ])
            .await;

        let agent = Agent::builder()
            .provider(ScriptedProvider::new([InferenceResponse::text("fresh answer")]))
            .build()
            .unwrap();

        agent
            .run("new question", Some(Arc::clone(&session)), None)
            .await
            .unwrap();

        // Memory was seeded with the session history before the turn.
        let messages = agent.memory.read().await.messages();
        assert_eq!(messages[0].content, "earlier question");

        // The new user/assistant pair was appended as one batch.
        let items = session.get_items(None).await;
        assert_eq!(items.len(), 4);
        assert_eq!(items[2].content, "new question");
        assert_eq!(items[3].content, "fresh answer");
    }

    #[tokio::test]
    async fn test_guardrail_aborts_the_run() {
        struct BlockEverything;

        #[async_trait]
        impl RunHooks for BlockEverything {
            async fn guardrail_input(&self, _input: &str) -> Result<(), HiveError> {
                Err(HiveError::GuardrailViolation("input rejected".into()))
            }
        }

        let agent = Agent::builder()
            .provider(ScriptedProvider::new([InferenceResponse::text("never")]))
            .build()
            .unwrap();

        let events = agent
            .stream("anything", None, Some(Arc::new(BlockEverything)))
            .collect_events()
            .await;

        assert!(events
            .iter()
            .any(|event| matches!(event, Event::GuardrailFailed { .. })));
        assert!(matches!(events.last(), Some(Event::Failed { .. })));
    }
}
