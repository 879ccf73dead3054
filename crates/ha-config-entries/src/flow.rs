//! Config flows
//!
//! A config flow collects and validates the data of a new entry. Each flow
//! runs one step at a time: a step either shows a form (possibly with
//! errors), creates the entry, or aborts.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::{debug, info};

use crate::entry::{ConfigEntry, ConfigEntrySource};
use crate::manager::{ConfigEntries, ConfigEntriesError};

pub const STEP_USER: &str = "user";
pub const ABORT_ALREADY_CONFIGURED: &str = "already_configured";

#[derive(Debug, Error)]
pub enum FlowError {
    #[error("No config flow registered for {0}")]
    UnknownHandler(String),

    #[error("Flow not found: {0}")]
    UnknownFlow(String),

    #[error("Flow {flow_id} has no step {step_id}")]
    UnknownStep { flow_id: String, step_id: String },

    #[error(transparent)]
    Entries(#[from] ConfigEntriesError),
}

/// One field of a form schema
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FormField {
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: String,
    pub required: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
}

impl FormField {
    pub fn string(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            field_type: "string".to_string(),
            required: false,
            default: None,
        }
    }

    pub fn integer(name: impl Into<String>) -> Self {
        Self {
            field_type: "integer".to_string(),
            ..Self::string(name)
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn with_default(mut self, default: impl Into<Value>) -> Self {
        self.default = Some(default.into());
        self
    }
}

/// Outcome of one flow step
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FlowStep {
    Form {
        step_id: String,
        data_schema: Vec<FormField>,
        /// Field name (or `base`) to error key
        errors: HashMap<String, String>,
    },
    CreateEntry {
        title: String,
        data: Map<String, Value>,
    },
    Abort {
        reason: String,
    },
}

impl FlowStep {
    pub fn form(
        step_id: impl Into<String>,
        data_schema: Vec<FormField>,
        errors: HashMap<String, String>,
    ) -> Self {
        FlowStep::Form {
            step_id: step_id.into(),
            data_schema,
            errors,
        }
    }

    pub fn create_entry(title: impl Into<String>, data: Map<String, Value>) -> Self {
        FlowStep::CreateEntry {
            title: title.into(),
            data,
        }
    }

    pub fn abort(reason: impl Into<String>) -> Self {
        FlowStep::Abort {
            reason: reason.into(),
        }
    }
}

/// What callers of the flow manager get back
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FlowResult {
    pub flow_id: String,
    pub handler: String,
    #[serde(flatten)]
    pub step: FlowStep,
    /// Id of the entry created by a `create_entry` step
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entry_id: Option<String>,
}

/// Per-flow state visible to the flow's steps
pub struct FlowContext {
    flow_id: String,
    handler: String,
    source: ConfigEntrySource,
    unique_id: Option<String>,
    entries: Arc<ConfigEntries>,
}

impl FlowContext {
    pub fn flow_id(&self) -> &str {
        &self.flow_id
    }

    pub fn source(&self) -> ConfigEntrySource {
        self.source
    }

    pub fn unique_id(&self) -> Option<&str> {
        self.unique_id.as_deref()
    }

    /// Unique id given to the entry this flow creates
    pub fn set_unique_id(&mut self, unique_id: impl Into<String>) {
        self.unique_id = Some(unique_id.into());
    }

    /// `already_configured` abort when an entry with this flow's unique id exists
    pub fn abort_if_unique_id_configured(&self) -> Option<FlowStep> {
        let unique_id = self.unique_id.as_deref()?;
        self.entries
            .get_by_unique_id(&self.handler, unique_id)
            .map(|_| FlowStep::abort(ABORT_ALREADY_CONFIGURED))
    }
}

/// Steps of an integration's config flow
#[async_trait]
pub trait ConfigFlow: Send + Sync {
    /// Step shown to a user; `None` input asks for the initial form
    async fn step_user(
        &mut self,
        ctx: &mut FlowContext,
        user_input: Option<Map<String, Value>>,
    ) -> FlowStep;

    /// Import from a configuration file; validated like user input
    async fn step_import(&mut self, ctx: &mut FlowContext, import_data: Map<String, Value>) -> FlowStep {
        self.step_user(ctx, Some(import_data)).await
    }
}

/// Creates a fresh flow instance per started flow
pub type FlowFactory = Arc<dyn Fn() -> Box<dyn ConfigFlow> + Send + Sync>;

struct ActiveFlow {
    ctx: FlowContext,
    step_id: String,
    flow: Box<dyn ConfigFlow>,
}

/// Runs config flows and turns finished ones into entries
pub struct FlowManager {
    entries: Arc<ConfigEntries>,
    factories: DashMap<String, FlowFactory>,
    /// Flows waiting for form input
    flows: DashMap<String, ActiveFlow>,
}

impl FlowManager {
    pub fn new(entries: Arc<ConfigEntries>) -> Self {
        Self {
            entries,
            factories: DashMap::new(),
            flows: DashMap::new(),
        }
    }

    pub fn register(&self, handler: impl Into<String>, factory: FlowFactory) {
        self.factories.insert(handler.into(), factory);
    }

    /// Flows currently waiting for input
    pub fn in_progress(&self) -> Vec<String> {
        self.flows.iter().map(|r| r.key().clone()).collect()
    }

    /// Start a flow
    ///
    /// User flows receive `data` as their first input (usually `None`);
    /// import flows receive it as the imported configuration.
    pub async fn async_init(
        &self,
        handler: &str,
        source: ConfigEntrySource,
        data: Option<Map<String, Value>>,
    ) -> Result<FlowResult, FlowError> {
        let factory = self
            .factories
            .get(handler)
            .map(|f| Arc::clone(f.value()))
            .ok_or_else(|| FlowError::UnknownHandler(handler.to_string()))?;

        let mut ctx = FlowContext {
            flow_id: ulid::Ulid::new().to_string(),
            handler: handler.to_string(),
            source,
            unique_id: None,
            entries: Arc::clone(&self.entries),
        };
        let mut flow = factory();
        debug!("Starting {} flow {} for {}", source.as_str(), ctx.flow_id, handler);

        let step = match source {
            ConfigEntrySource::User => flow.step_user(&mut ctx, data).await,
            ConfigEntrySource::Import => flow.step_import(&mut ctx, data.unwrap_or_default()).await,
        };
        self.finish(ctx, flow, step).await
    }

    /// Submit form input to a waiting flow
    pub async fn async_configure(
        &self,
        flow_id: &str,
        user_input: Map<String, Value>,
    ) -> Result<FlowResult, FlowError> {
        let (_, ActiveFlow {
            mut ctx,
            step_id,
            mut flow,
        }) = self
            .flows
            .remove(flow_id)
            .ok_or_else(|| FlowError::UnknownFlow(flow_id.to_string()))?;

        if step_id != STEP_USER {
            return Err(FlowError::UnknownStep {
                flow_id: flow_id.to_string(),
                step_id,
            });
        }

        let step = flow.step_user(&mut ctx, Some(user_input)).await;
        self.finish(ctx, flow, step).await
    }

    async fn finish(
        &self,
        ctx: FlowContext,
        flow: Box<dyn ConfigFlow>,
        step: FlowStep,
    ) -> Result<FlowResult, FlowError> {
        let mut result = FlowResult {
            flow_id: ctx.flow_id.clone(),
            handler: ctx.handler.clone(),
            step: step.clone(),
            entry_id: None,
        };

        match step {
            FlowStep::Form { step_id, .. } => {
                self.flows.insert(
                    ctx.flow_id.clone(),
                    ActiveFlow { ctx, step_id, flow },
                );
            }
            FlowStep::CreateEntry { title, data } => {
                let mut entry = ConfigEntry::new(&ctx.handler, title)
                    .with_data(data)
                    .with_source(ctx.source);
                entry.unique_id = ctx.unique_id.clone();

                match self.entries.add(entry).await {
                    Ok(entry) => {
                        info!("Flow {} created entry {}", ctx.flow_id, entry.entry_id);
                        result.entry_id = Some(entry.entry_id);
                    }
                    Err(ConfigEntriesError::AlreadyExists { .. }) => {
                        result.step = FlowStep::abort(ABORT_ALREADY_CONFIGURED);
                    }
                    Err(err) => return Err(err.into()),
                }
            }
            FlowStep::Abort { ref reason } => {
                debug!("Flow {} aborted: {}", ctx.flow_id, reason);
            }
        }
        Ok(result)
    }
}
