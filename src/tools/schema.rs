use std::cmp::Ordering;

use serde_json::{Map, Value};

use crate::utils::helper::add_indent;

/// The type of a single tool parameter.
#[derive(Debug, Clone, PartialEq)]
pub enum ParameterKind {
    String,
    Integer,
    Number,
    Boolean,
    Array(Box<ParameterKind>),
    Object(Vec<ToolParameter>),
    /// Enumerated string values.
    OneOf(Vec<String>),
    Any,
}

impl ParameterKind {
    fn type_name(&self) -> &'static str {
        match self {
            ParameterKind::String => "string",
            ParameterKind::Integer => "integer",
            ParameterKind::Number => "number",
            ParameterKind::Boolean => "boolean",
            ParameterKind::Array(_) => "array",
            ParameterKind::Object(_) => "object",
            ParameterKind::OneOf(_) => "string",
            ParameterKind::Any => "any",
        }
    }

    pub fn accepts(&self, value: &Value) -> bool {
        match self {
            ParameterKind::String => value.is_string(),
            ParameterKind::Integer => value.is_i64() || value.is_u64(),
            ParameterKind::Number => value.is_number(),
            ParameterKind::Boolean => value.is_boolean(),
            ParameterKind::Array(items) => value
                .as_array()
                .is_some_and(|array| array.iter().all(|item| items.accepts(item))),
            ParameterKind::Object(parameters) => value
                .as_object()
                .is_some_and(|object| validate_object(parameters, object).is_ok()),
            ParameterKind::OneOf(options) => value
                .as_str()
                .is_some_and(|s| options.iter().any(|option| option == s)),
            ParameterKind::Any => true,
        }
    }

    fn to_json_schema(&self) -> Value {
        match self {
            ParameterKind::Array(items) => {
                let mut fields = Map::new();
                fields.insert("type".into(), "array".into());
                fields.insert("items".into(), items.to_json_schema());
                Value::Object(fields)
            }
            ParameterKind::Object(parameters) => parameters_to_json_schema(parameters),
            ParameterKind::OneOf(options) => {
                let mut fields = Map::new();
                fields.insert("type".into(), "string".into());
                fields.insert(
                    "enum".into(),
                    options.iter().map(|o| Value::from(o.as_str())).collect(),
                );
                Value::Object(fields)
            }
            ParameterKind::Any => Value::Object(Map::new()),
            _ => {
                let mut fields = Map::new();
                fields.insert("type".into(), self.type_name().into());
                Value::Object(fields)
            }
        }
    }
}

/// One named parameter of a tool schema.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolParameter {
    pub name: String,
    pub description: Option<String>,
    pub kind: ParameterKind,
    pub required: bool,
    pub default: Option<Value>,
}

impl ToolParameter {
    pub fn new(name: impl Into<String>, kind: ParameterKind) -> Self {
        Self {
            name: name.into(),
            description: None,
            kind,
            required: true,
            default: None,
        }
    }

    pub fn string(name: impl Into<String>) -> Self {
        Self::new(name, ParameterKind::String)
    }

    pub fn integer(name: impl Into<String>) -> Self {
        Self::new(name, ParameterKind::Integer)
    }

    pub fn number(name: impl Into<String>) -> Self {
        Self::new(name, ParameterKind::Number)
    }

    pub fn boolean(name: impl Into<String>) -> Self {
        Self::new(name, ParameterKind::Boolean)
    }

    pub fn array(name: impl Into<String>, items: ParameterKind) -> Self {
        Self::new(name, ParameterKind::Array(Box::new(items)))
    }

    pub fn object(name: impl Into<String>, parameters: Vec<ToolParameter>) -> Self {
        Self::new(name, ParameterKind::Object(parameters))
    }

    pub fn one_of(
        name: impl Into<String>,
        options: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        Self::new(
            name,
            ParameterKind::OneOf(options.into_iter().map(Into::into).collect()),
        )
    }

    pub fn any(name: impl Into<String>) -> Self {
        Self::new(name, ParameterKind::Any)
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }

    pub fn with_default(mut self, default: impl Into<Value>) -> Self {
        self.default = Some(default.into());
        self.required = false;
        self
    }

    fn to_plain_description(&self) -> String {
        let type_info = if self.required {
            self.kind.type_name().to_string()
        } else {
            format!("{}, optional", self.kind.type_name())
        };

        match &self.description {
            Some(description) => format!("{} ({}): {}", self.name, type_info, description),
            None => format!("{} ({})", self.name, type_info),
        }
    }
}

/// The published shape of a tool: name, description and parameter list.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolSchema {
    pub name: String,
    pub description: String,
    pub parameters: Vec<ToolParameter>,
}

impl ToolSchema {
    /// `name` must be non-empty; a nameless tool can never be addressed
    /// by the model.
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        let name = name.into();
        debug_assert!(!name.is_empty(), "tool schema requires a name");
        Self {
            name,
            description: description.into(),
            parameters: Vec::new(),
        }
    }

    pub fn parameter(mut self, parameter: ToolParameter) -> Self {
        self.parameters.push(parameter);
        self
    }

    /// Render as the JSON-schema-shaped object the provider boundary
    /// expects, required parameters listed first.
    pub fn to_json_schema(&self) -> Value {
        parameters_to_json_schema(&self.parameters)
    }

    /// Human-readable rendering used in plain-text tool prompts.
    pub fn to_plain_description(&self) -> String {
        let parameters = self
            .parameters
            .iter()
            .map(|parameter| parameter.to_plain_description())
            .collect::<Vec<_>>()
            .join(",\n");
        let parameters = add_indent(&parameters, 4, true);

        if parameters.is_empty() {
            format!("> {}: {}", self.name, self.description)
        } else {
            format!("> {}: {}\n{{\n{}\n}}", self.name, self.description, parameters)
        }
    }

    /// Check `args` against this schema: required fields present, types
    /// accepted, enum membership honored. Returns the first violation.
    pub fn validate(&self, args: &Map<String, Value>) -> Result<(), String> {
        validate_object(&self.parameters, args)
    }

    /// Validate, then fill in defaults for absent optional parameters.
    pub fn validate_and_fill(&self, args: Map<String, Value>) -> Result<Map<String, Value>, String> {
        self.validate(&args)?;

        let mut filled = args;
        for parameter in &self.parameters {
            if let Some(default) = &parameter.default {
                filled
                    .entry(parameter.name.clone())
                    .or_insert_with(|| default.clone());
            }
        }
        Ok(filled)
    }
}

fn parameters_to_json_schema(parameters: &[ToolParameter]) -> Value {
    let mut sorted: Vec<&ToolParameter> = parameters.iter().collect();
    sorted.sort_by(|a, b| match (a.required, b.required) {
        (true, false) => Ordering::Less,
        (false, true) => Ordering::Greater,
        _ => Ordering::Equal,
    });

    let mut fields = Map::new();
    fields.insert("type".into(), "object".into());
    fields.insert(
        "properties".into(),
        Map::from_iter(sorted.iter().map(|parameter| {
            let mut schema = parameter.kind.to_json_schema();
            if let (Some(description), Some(object)) =
                (&parameter.description, schema.as_object_mut())
            {
                object.insert("description".into(), description.as_str().into());
            }
            (parameter.name.clone(), schema)
        }))
        .into(),
    );
    fields.insert(
        "required".into(),
        sorted
            .iter()
            .filter(|parameter| parameter.required)
            .map(|parameter| parameter.name.as_str())
            .collect::<Vec<_>>()
            .into(),
    );

    Value::Object(fields)
}

fn validate_object(parameters: &[ToolParameter], args: &Map<String, Value>) -> Result<(), String> {
    for parameter in parameters {
        match args.get(&parameter.name) {
            Some(value) => {
                if !parameter.kind.accepts(value) {
                    return Err(format!(
                        "parameter '{}' expects {}, got {}",
                        parameter.name,
                        parameter.kind.type_name(),
                        json_type_name(value)
                    ));
                }
            }
            None if parameter.required => {
                return Err(format!("missing required parameter '{}'", parameter.name));
            }
            None => {}
        }
    }
    Ok(())
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use indoc::indoc;
    use serde_json::json;

    use super::*;

    fn search_schema() -> ToolSchema {
        ToolSchema::new("search", "Search for articles")
            .parameter(
                ToolParameter::string("query").description("A query to search for"),
            )
            .parameter(
                ToolParameter::integer("limit")
                    .description("Max number of articles to search")
                    .with_default(10),
            )
    }

    #[test]
    fn test_json_schema_required_first() {
        let schema = search_schema().to_json_schema();
        assert_eq!(
            schema,
            json!({
                "type": "object",
                "properties": {
                    "query": {
                        "type": "string",
                        "description": "A query to search for"
                    },
                    "limit": {
                        "type": "integer",
                        "description": "Max number of articles to search"
                    }
                },
                "required": ["query"]
            })
        );
    }

    #[test]
    fn test_plain_description() {
        assert_eq!(
            search_schema().to_plain_description(),
            indoc! {"
            > search: Search for articles
            {
                query (string): A query to search for,
                limit (integer, optional): Max number of articles to search
            }"}
        );
    }

    #[test]
    fn test_validation() {
        let schema = search_schema();

        let ok = json!({"query": "rust"});
        assert!(schema.validate(ok.as_object().unwrap()).is_ok());

        let missing = json!({"limit": 3});
        let err = schema.validate(missing.as_object().unwrap()).unwrap_err();
        assert!(err.contains("missing required parameter 'query'"));

        let wrong_type = json!({"query": "rust", "limit": "three"});
        let err = schema.validate(wrong_type.as_object().unwrap()).unwrap_err();
        assert!(err.contains("expects integer"));
    }

    #[test]
    fn test_validate_and_fill_defaults() {
        let schema = search_schema();
        let filled = schema
            .validate_and_fill(json!({"query": "rust"}).as_object().unwrap().clone())
            .unwrap();
        assert_eq!(filled["limit"], json!(10));
    }

    #[test]
    fn test_one_of_membership() {
        let schema = ToolSchema::new("convert", "Convert units")
            .parameter(ToolParameter::one_of("unit", ["metric", "imperial"]));

        let ok = json!({"unit": "metric"});
        assert!(schema.validate(ok.as_object().unwrap()).is_ok());

        let bad = json!({"unit": "nautical"});
        assert!(schema.validate(bad.as_object().unwrap()).is_err());
    }

    #[test]
    fn test_nested_array_and_object() {
        let schema = ToolSchema::new("batch", "Run a batch").parameter(ToolParameter::array(
            "items",
            ParameterKind::Object(vec![ToolParameter::string("id")]),
        ));

        let ok = json!({"items": [{"id": "a"}, {"id": "b"}]});
        assert!(schema.validate(ok.as_object().unwrap()).is_ok());

        let bad = json!({"items": [{"id": 1}]});
        assert!(schema.validate(bad.as_object().unwrap()).is_err());
    }
}
