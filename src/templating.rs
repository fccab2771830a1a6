//! Templating Engine Adapter
//!
//! The orchestrator only depends on [`TemplateEngine`]; the shipped
//! implementation delegates to `handlebars`.

use handlebars::{
    no_escape, Context, Handlebars, Helper, HelperDef, RenderContext, RenderError,
    RenderErrorReason, ScopedJson,
};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;

/// A helper callable from templates: positional arguments in, a value out.
pub type HelperFn = Arc<dyn Fn(&[Value]) -> Result<Value, String> + Send + Sync>;

#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("Invalid partial '{name}': {message}")]
    Partial { name: String, message: String },

    #[error("{0}")]
    Render(String),
}

#[derive(Clone, Default)]
pub struct RenderOptions {
    pub helpers: BTreeMap<String, HelperFn>,
    pub partials: BTreeMap<String, String>,
    pub strict: bool,
    pub no_escape: bool,
}

pub trait TemplateEngine: Send + Sync {
    fn render(&self, body: &str, context: &Value, options: &RenderOptions) -> Result<String, TemplateError>;
}

/// Handlebars-backed engine with the built-in helper set registered.
#[derive(Debug, Default, Clone, Copy)]
pub struct HandlebarsEngine;

impl HandlebarsEngine {
    pub fn new() -> Self {
        Self
    }
}

struct FnHelper(HelperFn);

impl HelperDef for FnHelper {
    fn call_inner<'reg: 'rc, 'rc>(
        &self,
        h: &Helper<'rc>,
        _: &'reg Handlebars<'reg>,
        _: &'rc Context,
        _: &mut RenderContext<'reg, 'rc>,
    ) -> Result<ScopedJson<'rc>, RenderError> {
        let args: Vec<Value> = h.params().iter().map(|p| p.value().clone()).collect();
        let value = (self.0)(&args).map_err(|message| {
            RenderError::from(RenderErrorReason::Other(format!(
                "helper '{}': {}",
                h.name(),
                message
            )))
        })?;
        Ok(ScopedJson::Derived(value))
    }
}

impl TemplateEngine for HandlebarsEngine {
    fn render(&self, body: &str, context: &Value, options: &RenderOptions) -> Result<String, TemplateError> {
        let mut registry = Handlebars::new();
        registry.set_strict_mode(options.strict);
        if options.no_escape {
            registry.register_escape_fn(no_escape);
        }

        for (name, helper) in builtin_helpers().into_iter().chain(options.helpers.clone()) {
            registry.register_helper(&name, Box::new(FnHelper(helper)));
        }

        for (name, source) in &options.partials {
            registry
                .register_partial(name, source.as_str())
                .map_err(|e| TemplateError::Partial {
                    name: name.clone(),
                    message: e.to_string(),
                })?;
        }

        registry
            .render_template(body, context)
            .map_err(|e| TemplateError::Render(e.to_string()))
    }
}

fn text_of(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn first_text(args: &[Value]) -> String {
    args.first().map(text_of).unwrap_or_default()
}

pub fn helper(f: impl Fn(&[Value]) -> Result<Value, String> + Send + Sync + 'static) -> HelperFn {
    Arc::new(f)
}

/// Helpers available to every template.
pub fn builtin_helpers() -> BTreeMap<String, HelperFn> {
    let mut helpers: BTreeMap<String, HelperFn> = BTreeMap::new();

    helpers.insert(
        "uppercase".into(),
        helper(|args| Ok(Value::String(first_text(args).to_uppercase()))),
    );
    helpers.insert(
        "lowercase".into(),
        helper(|args| Ok(Value::String(first_text(args).to_lowercase()))),
    );
    helpers.insert(
        "capitalize".into(),
        helper(|args| {
            let text = first_text(args);
            let mut chars = text.chars();
            let capitalized = match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            };
            Ok(Value::String(capitalized))
        }),
    );
    helpers.insert(
        "eq".into(),
        helper(|args| match args {
            [a, b, ..] => Ok(Value::Bool(a == b)),
            _ => Err("expects two arguments".into()),
        }),
    );
    helpers.insert(
        "ne".into(),
        helper(|args| match args {
            [a, b, ..] => Ok(Value::Bool(a != b)),
            _ => Err("expects two arguments".into()),
        }),
    );
    helpers.insert(
        "json".into(),
        helper(|args| {
            let value = args.first().cloned().unwrap_or(Value::Null);
            serde_json::to_string(&value)
                .map(Value::String)
                .map_err(|e| e.to_string())
        }),
    );
    helpers.insert(
        "join".into(),
        helper(|args| {
            let separator = args.get(1).map(text_of).unwrap_or_else(|| ", ".into());
            match args.first() {
                Some(Value::Array(items)) => Ok(Value::String(
                    items.iter().map(text_of).collect::<Vec<_>>().join(&separator),
                )),
                Some(other) => Ok(Value::String(text_of(other))),
                None => Ok(Value::String(String::new())),
            }
        }),
    );

    helpers
}
