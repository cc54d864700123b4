use std::sync::Arc;

use async_trait::async_trait;
use regex::Regex;

use crate::context::Context;
use crate::error::HiveError;
use crate::schemas::StepResult;
use crate::step::{execute_step, Step};

/// Predicate over the routed input (and run context).
#[derive(Debug, Clone)]
pub enum RouteCondition {
    Contains(String),
    StartsWith(String),
    EndsWith(String),
    MatchesRegex(Regex),
    /// Inclusive character-length bounds.
    LengthInRange { min: usize, max: usize },
    /// True when the context value map holds the key.
    ContextHas(String),
    Always,
    Never,
    And(Vec<RouteCondition>),
    Or(Vec<RouteCondition>),
    Not(Box<RouteCondition>),
}

impl RouteCondition {
    pub fn contains(needle: impl Into<String>) -> Self {
        RouteCondition::Contains(needle.into())
    }

    pub fn starts_with(prefix: impl Into<String>) -> Self {
        RouteCondition::StartsWith(prefix.into())
    }

    pub fn ends_with(suffix: impl Into<String>) -> Self {
        RouteCondition::EndsWith(suffix.into())
    }

    pub fn matches_regex(pattern: &str) -> Result<Self, HiveError> {
        Regex::new(pattern)
            .map(RouteCondition::MatchesRegex)
            .map_err(|error| HiveError::InvalidInput(format!("invalid route regex: {error}")))
    }

    pub fn length_in_range(min: usize, max: usize) -> Self {
        RouteCondition::LengthInRange { min, max }
    }

    pub fn context_has(key: impl Into<String>) -> Self {
        RouteCondition::ContextHas(key.into())
    }

    pub fn and(conditions: Vec<RouteCondition>) -> Self {
        RouteCondition::And(conditions)
    }

    pub fn or(conditions: Vec<RouteCondition>) -> Self {
        RouteCondition::Or(conditions)
    }

    #[allow(clippy::should_implement_trait)]
    pub fn not(condition: RouteCondition) -> Self {
        RouteCondition::Not(Box::new(condition))
    }

    pub fn matches(&self, input: &str, ctx: &Context) -> bool {
        match self {
            RouteCondition::Contains(needle) => input.contains(needle.as_str()),
            RouteCondition::StartsWith(prefix) => input.starts_with(prefix.as_str()),
            RouteCondition::EndsWith(suffix) => input.ends_with(suffix.as_str()),
            RouteCondition::MatchesRegex(regex) => regex.is_match(input),
            RouteCondition::LengthInRange { min, max } => {
                let length = input.chars().count();
                length >= *min && length <= *max
            }
            RouteCondition::ContextHas(key) => ctx.contains_key(key),
            RouteCondition::Always => true,
            RouteCondition::Never => false,
            RouteCondition::And(conditions) => conditions
                .iter()
                .all(|condition| condition.matches(input, ctx)),
            RouteCondition::Or(conditions) => conditions
                .iter()
                .any(|condition| condition.matches(input, ctx)),
            RouteCondition::Not(condition) => !condition.matches(input, ctx),
        }
    }
}

/// First-match routing over condition/step pairs.
///
/// Conditions are evaluated in declaration order; the first match wins.
/// Without a match, the default step runs — or `NoRouteMatched` is
/// raised when there is none.
pub struct RouteStep {
    routes: Vec<(RouteCondition, Arc<dyn Step>)>,
    default: Option<Arc<dyn Step>>,
}

impl Default for RouteStep {
    fn default() -> Self {
        Self::new()
    }
}

impl RouteStep {
    pub fn new() -> Self {
        Self {
            routes: Vec::new(),
            default: None,
        }
    }

    pub fn route(mut self, condition: RouteCondition, step: impl Into<Arc<dyn Step>>) -> Self {
        self.routes.push((condition, step.into()));
        self
    }

    pub fn default_route(mut self, step: impl Into<Arc<dyn Step>>) -> Self {
        self.default = Some(step.into());
        self
    }
}

#[async_trait]
impl Step for RouteStep {
    fn name(&self) -> String {
        "route".into()
    }

    async fn execute(&self, input: &str, ctx: &Context) -> Result<StepResult, HiveError> {
        for (position, (condition, step)) in self.routes.iter().enumerate() {
            if condition.matches(input, ctx) {
                let mut result = execute_step(step.as_ref(), input, ctx).await?;
                result.set_metadata("routing.matched", format!("condition_{}", position + 1));
                result.set_metadata("routing.step", step.name());
                return Ok(result);
            }
        }

        match &self.default {
            Some(step) => {
                let mut result = execute_step(step.as_ref(), input, ctx).await?;
                result.set_metadata("routing.matched", "default");
                result.set_metadata("routing.step", step.name());
                Ok(result)
            }
            None => Err(HiveError::NoRouteMatched),
        }
    }
}
