/// Behavioural knobs of one agent.
#[derive(Debug, Clone)]
pub struct AgentConfiguration {
    pub name: String,
    /// Upper bound on model turns per run; at least 1.
    pub max_iterations: usize,
    /// How many session messages seed an empty memory.
    pub session_history_limit: usize,
    /// Dispatch independent tool calls concurrently.
    pub parallel_tool_calls: bool,
    /// Attach a console tracer when none is configured.
    pub default_tracing_enabled: bool,
    /// Nest a handed-off agent's history instead of flattening it.
    pub nest_handoff_history: bool,
    /// Persist tool-role messages to the session alongside the
    /// user/assistant pair.
    pub persist_tool_messages: bool,
}

impl Default for AgentConfiguration {
    fn default() -> Self {
        Self {
            name: "Agent".into(),
            max_iterations: 10,
            session_history_limit: 20,
            parallel_tool_calls: false,
            default_tracing_enabled: true,
            nest_handoff_history: false,
            persist_tool_messages: true,
        }
    }
}

impl AgentConfiguration {
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations.max(1);
        self
    }

    pub fn with_session_history_limit(mut self, session_history_limit: usize) -> Self {
        self.session_history_limit = session_history_limit;
        self
    }

    pub fn with_parallel_tool_calls(mut self, parallel_tool_calls: bool) -> Self {
        self.parallel_tool_calls = parallel_tool_calls;
        self
    }

    pub fn with_default_tracing(mut self, default_tracing_enabled: bool) -> Self {
        self.default_tracing_enabled = default_tracing_enabled;
        self
    }

    pub fn with_persist_tool_messages(mut self, persist_tool_messages: bool) -> Self {
        self.persist_tool_messages = persist_tool_messages;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AgentConfiguration::default();
        assert_eq!(config.name, "Agent");
        assert_eq!(config.max_iterations, 10);
        assert_eq!(config.session_history_limit, 20);
        assert!(!config.parallel_tool_calls);
        assert!(config.default_tracing_enabled);
        assert!(config.persist_tool_messages);
    }

    #[test]
    fn test_max_iterations_floor() {
        let config = AgentConfiguration::default().with_max_iterations(0);
        assert_eq!(config.max_iterations, 1);
    }
}
