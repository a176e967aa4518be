//! Tools the model can call.
//!
//! A tool is stateless: whatever it needs to remember goes through the
//! [`ToolContext`] it is handed, because one tool value may serve many
//! concurrent runs.

use async_trait::async_trait;
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use std::future::Future;
use std::sync::Arc;

use crate::context::ToolContext;
use crate::error::ToolError;

/// JSON type of a tool parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamType {
    String,
    Integer,
    Number,
    Boolean,
    Array,
    Object,
}

/// One named parameter of a tool.
#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    pub name: String,
    pub kind: ParamType,
    pub description: String,
    pub required: bool,
}

impl Param {
    /// A required parameter.
    pub fn new(name: impl Into<String>, kind: ParamType, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind,
            description: description.into(),
            required: true,
        }
    }

    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }
}

/// Build a JSON Schema object from a parameter list.
pub fn params_schema(params: &[Param]) -> Value {
    let mut properties = Map::new();
    let mut required = Vec::new();
    for p in params {
        properties.insert(
            p.name.clone(),
            json!({ "type": p.kind, "description": p.description }),
        );
        if p.required {
            required.push(Value::String(p.name.clone()));
        }
    }
    json!({
        "type": "object",
        "properties": properties,
        "required": required,
    })
}

/// What the chat adapter is told about a tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

/// A named, schema-described operation the model can invoke.
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    fn parameters(&self) -> Vec<Param> {
        Vec::new()
    }

    /// JSON Schema of the arguments object.
    fn parameter_schema(&self) -> Value {
        params_schema(&self.parameters())
    }

    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name().to_string(),
            description: self.description().to_string(),
            parameters: self.parameter_schema(),
        }
    }

    /// Run the tool. Strings are passed to the model verbatim; any other value
    /// is serialized as JSON.
    async fn execute(&self, ctx: &ToolContext, args: Value) -> Result<Value, ToolError>;
}

impl std::fmt::Debug for dyn Tool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tool").field("name", &self.name()).finish()
    }
}

/// Check `args` against a tool's schema.
///
/// Schemas that fail to compile are not enforced.
pub(crate) fn validate_arguments(tool: &str, schema: &Value, args: &Value) -> Result<(), ToolError> {
    let validator = match jsonschema::validator_for(schema) {
        Ok(v) => v,
        Err(e) => {
            tracing::warn!(tool, error = %e, "tool schema does not compile; skipping validation");
            return Ok(());
        }
    };
    let errors: Vec<String> = validator.iter_errors(args).map(|e| e.to_string()).collect();
    if errors.is_empty() {
        Ok(())
    } else {
        Err(ToolError::InvalidArguments {
            tool: tool.to_string(),
            message: errors.join("; "),
        })
    }
}

/// Render a tool's return value for the model.
pub(crate) fn render_result(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

type Handler = Arc<dyn Fn(ToolContext, Value) -> BoxFuture<'static, Result<Value, ToolError>> + Send + Sync>;

/// A tool backed by a closure.
///
/// ```ignore
/// let lookup = FunctionTool::new("lookup_customer", "Find a customer by id", |ctx, args| async move {
///     let id = args["id"].as_str().unwrap_or_default().to_string();
///     ctx.state().set("customer_id", &id)?;
///     Ok(json!({"id": id, "plan": "fiber"}))
/// })
/// .param(Param::new("id", ParamType::String, "Customer id"));
/// ```
#[derive(Clone)]
pub struct FunctionTool {
    name: String,
    description: String,
    params: Vec<Param>,
    handler: Handler,
}

impl FunctionTool {
    pub fn new<F, Fut>(name: impl Into<String>, description: impl Into<String>, f: F) -> Self
    where
        F: Fn(ToolContext, Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, ToolError>> + Send + 'static,
    {
        Self {
            name: name.into(),
            description: description.into(),
            params: Vec::new(),
            handler: Arc::new(move |ctx, args| Box::pin(f(ctx, args))),
        }
    }

    /// A tool whose body does no I/O.
    pub fn sync<F>(name: impl Into<String>, description: impl Into<String>, f: F) -> Self
    where
        F: Fn(&ToolContext, &Value) -> Result<Value, ToolError> + Send + Sync + 'static,
    {
        let f = Arc::new(f);
        Self::new(name, description, move |ctx, args| {
            let f = f.clone();
            async move { f(&ctx, &args) }
        })
    }

    pub fn param(mut self, param: Param) -> Self {
        self.params.push(param);
        self
    }

    /// Wrap into the shared form agents hold.
    pub fn into_tool(self) -> Arc<dyn Tool> {
        Arc::new(self)
    }
}

impl std::fmt::Debug for FunctionTool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FunctionTool")
            .field("name", &self.name)
            .field("params", &self.params)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Tool for FunctionTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn parameters(&self) -> Vec<Param> {
        self.params.clone()
    }

    async fn execute(&self, ctx: &ToolContext, args: Value) -> Result<Value, ToolError> {
        (self.handler)(ctx.clone(), args).await
    }
}

/// An external source of tools, such as an MCP server.
///
/// Listing may spawn processes or hit the network; agents cache the result.
#[async_trait]
pub trait ToolProvider: Send + Sync {
    fn name(&self) -> &str;

    async fn list_tools(&self) -> Result<Vec<Arc<dyn Tool>>, ToolError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::RunContext;

    fn echo() -> FunctionTool {
        FunctionTool::sync("echo", "Echo the text back", |_, args| {
            Ok(args["text"].clone())
        })
        .param(Param::new("text", ParamType::String, "Text to echo"))
        .param(Param::new("times", ParamType::Integer, "Repetitions").optional())
    }

    #[test]
    fn test_params_schema() {
        let schema = echo().parameter_schema();
        assert_eq!(schema["type"], "object");
        assert_eq!(schema["properties"]["text"]["type"], "string");
        assert_eq!(schema["properties"]["times"]["type"], "integer");
        assert_eq!(schema["required"], json!(["text"]));
    }

    #[test]
    fn test_definition_uses_tool_metadata() {
        let def = echo().definition();
        assert_eq!(def.name, "echo");
        assert_eq!(def.description, "Echo the text back");
    }

    #[test]
    fn test_validate_arguments() {
        let schema = echo().parameter_schema();
        assert!(validate_arguments("echo", &schema, &json!({"text": "hi"})).is_ok());

        let err = validate_arguments("echo", &schema, &json!({"times": 2})).unwrap_err();
        assert!(matches!(err, ToolError::InvalidArguments { ref tool, .. } if tool == "echo"));

        let err = validate_arguments("echo", &schema, &json!({"text": 5})).unwrap_err();
        assert!(err.to_string().contains("invalid arguments"));
    }

    #[test]
    fn test_render_result() {
        assert_eq!(render_result(&json!("plain")), "plain");
        assert_eq!(render_result(&json!({"a": 1})), r#"{"a":1}"#);
    }

    #[test]
    fn test_sync_tool_executes() {
        let ctx = RunContext::new();
        let out = tokio_test::block_on(echo().execute(&ctx.tool_context("1", "A"), json!({"text": "hey"})));
        assert_eq!(out.unwrap(), json!("hey"));
    }

    #[tokio::test]
    async fn test_async_tool_writes_state() {
        let tool = FunctionTool::new("remember", "Remember a value", |ctx, args| async move {
            ctx.state().insert("remembered", args["value"].clone());
            Ok(json!("ok"))
        });
        let ctx = RunContext::new();
        tool.execute(&ctx.tool_context("1", "A"), json!({"value": 3}))
            .await
            .unwrap();
        assert_eq!(ctx.state().get::<i32>("remembered"), Some(3));
    }
}
