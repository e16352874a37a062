//! Per-request, tenant-scoped execution context.
//!
//! A context is visible only to the task that installed it. Nothing is inherited
//! implicitly: a thread or task spawned for sub-work sees no context until the spawner
//! hands it over with [`propagate`] (or one of the `spawn_*_with_context` helpers).
//!
//! Two storage slots back the contract:
//! - a thread-local slot for plain threads (`set`/`clear`/`propagate` act on it);
//! - a tokio task-local slot that exists only inside [`scope`]. When present it takes
//!   precedence, so async request handlers never observe a neighbouring task's tenant
//!   through a shared worker thread.

use std::cell::RefCell;
use std::future::Future;
use std::marker::PhantomData;
use std::rc::Rc;
use std::sync::Arc;
use std::thread;

use serde_json::{Map, Value};
use tracing::debug;
use uuid::Uuid;

use crate::errors::NoContextError;

pub type TeamConfig = Map<String, Value>;
pub type IntegrationConfig = Map<String, Value>;

/// Keys stored alongside integration values that are never configuration themselves.
pub const METADATA_KEYS: [&str; 5] = ["level", "locked", "config_schema", "team_config_schema", "name"];

type Slot = RefCell<Option<Arc<ExecutionContext>>>;

thread_local! {
    static THREAD_SLOT: Slot = const { RefCell::new(None) };
}

tokio::task_local! {
    static TASK_SLOT: Slot;
}

fn with_slot<R>(f: impl Fn(&Slot) -> R) -> R {
    TASK_SLOT.try_with(&f).unwrap_or_else(|_| THREAD_SLOT.with(&f))
}

/// Immutable once built; replaced wholesale, never edited in place.
#[derive(Clone, Debug, PartialEq)]
pub struct ExecutionContext {
    org_id: String,
    team_node_id: String,
    team_config: TeamConfig,
    request_id: String,
}

impl ExecutionContext {
    pub fn new(
        org_id: impl Into<String>,
        team_node_id: impl Into<String>,
        team_config: TeamConfig,
    ) -> Self {
        Self {
            org_id: org_id.into(),
            team_node_id: team_node_id.into(),
            team_config,
            request_id: Uuid::new_v4().to_string(),
        }
    }

    pub fn org_id(&self) -> &str {
        &self.org_id
    }

    pub fn team_node_id(&self) -> &str {
        &self.team_node_id
    }

    pub fn team_config(&self) -> &TeamConfig {
        &self.team_config
    }

    /// Correlation id for log lines emitted while this context is active.
    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    /// `team_config["integrations"]`, if it is an object.
    pub fn integrations(&self) -> Option<&Map<String, Value>> {
        self.team_config.get("integrations").and_then(Value::as_object)
    }

    /// The integration record for `integration_id` minus [`METADATA_KEYS`].
    ///
    /// An absent or non-object entry yields an empty map.
    pub fn integration_config(&self, integration_id: &str) -> IntegrationConfig {
        self.integrations()
            .and_then(|integrations| integrations.get(integration_id))
            .and_then(Value::as_object)
            .map(strip_metadata)
            .unwrap_or_default()
    }

    pub fn is_integration_configured(&self, integration_id: &str, required_fields: &[&str]) -> bool {
        config_satisfies(&self.integration_config(integration_id), required_fields)
    }
}

pub fn strip_metadata(record: &Map<String, Value>) -> IntegrationConfig {
    record
        .iter()
        .filter(|(key, _)| !METADATA_KEYS.contains(&key.as_str()))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect()
}

/// False for an empty config; otherwise every named field must be present and truthy.
pub fn config_satisfies(config: &IntegrationConfig, required_fields: &[&str]) -> bool {
    if config.is_empty() {
        return false;
    }
    required_fields.iter().all(|field| config.get(*field).is_some_and(is_truthy))
}

pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(flag) => *flag,
        Value::Number(number) => number.as_f64().is_some_and(|n| n != 0.0),
        Value::String(text) => !text.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(entries) => !entries.is_empty(),
    }
}

/// Builds a fresh context and installs it as the only one visible to this task.
///
/// Outside [`scope`] this writes the thread-local slot. In async code that slot belongs to
/// the tokio worker thread, so every task later polled on that worker would see it; async
/// callers must install contexts with [`scope`] instead.
pub fn set(
    org_id: impl Into<String>,
    team_node_id: impl Into<String>,
    team_config: TeamConfig,
) -> Arc<ExecutionContext> {
    let context = Arc::new(ExecutionContext::new(org_id, team_node_id, team_config));
    install(&context);
    context
}

pub fn get() -> Option<Arc<ExecutionContext>> {
    with_slot(|slot| slot.borrow().clone())
}

pub fn require() -> Result<Arc<ExecutionContext>, NoContextError> {
    get().ok_or(NoContextError)
}

pub fn clear() {
    let previous = with_slot(|slot| slot.borrow_mut().take());
    if let Some(previous) = previous {
        debug!(
            event_name = "context.cleared",
            correlation_id = previous.request_id(),
            org_id = previous.org_id(),
            "execution context cleared"
        );
    }
}

/// Installs `parent` in the calling task. Call it first thing in any spawned worker.
pub fn propagate(parent: &Arc<ExecutionContext>) {
    install(parent);
}

fn install(context: &Arc<ExecutionContext>) {
    with_slot(|slot| *slot.borrow_mut() = Some(Arc::clone(context)));
    debug!(
        event_name = "context.installed",
        correlation_id = context.request_id(),
        org_id = context.org_id(),
        team_node_id = context.team_node_id(),
        "execution context installed"
    );
}

/// Stripped integration config from the current context; empty when there is none.
pub fn get_integration_config(integration_id: &str) -> IntegrationConfig {
    get().map(|context| context.integration_config(integration_id)).unwrap_or_default()
}

pub fn is_integration_configured(integration_id: &str, required_fields: &[&str]) -> bool {
    config_satisfies(&get_integration_config(integration_id), required_fields)
}

/// Clears the calling thread's context when dropped, on success, error or unwind.
///
/// Tied to the thread that created it. For synchronous code only; an async request
/// handler uses [`scope`], since a guard held across `.await` would expose the context to
/// other tasks sharing the worker thread.
#[must_use = "the context is cleared as soon as the guard is dropped"]
pub struct ContextGuard {
    context: Arc<ExecutionContext>,
    _not_send: PhantomData<Rc<()>>,
}

impl ContextGuard {
    pub fn enter(
        org_id: impl Into<String>,
        team_node_id: impl Into<String>,
        team_config: TeamConfig,
    ) -> Self {
        Self { context: set(org_id, team_node_id, team_config), _not_send: PhantomData }
    }

    pub fn propagated(parent: &Arc<ExecutionContext>) -> Self {
        propagate(parent);
        Self { context: Arc::clone(parent), _not_send: PhantomData }
    }

    pub fn context(&self) -> &Arc<ExecutionContext> {
        &self.context
    }
}

impl Drop for ContextGuard {
    fn drop(&mut self) {
        clear();
    }
}

/// Runs `future` with `context` as its task's context. The slot disappears with the
/// future, so the context cannot outlive the request.
pub async fn scope<F>(context: Arc<ExecutionContext>, future: F) -> F::Output
where
    F: Future,
{
    TASK_SLOT.scope(RefCell::new(Some(context)), future).await
}

/// Spawns a thread that starts with the caller's context (if any) and clears it on exit.
pub fn spawn_thread_with_context<F, T>(f: F) -> thread::JoinHandle<T>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    let parent = get();
    thread::spawn(move || {
        let _guard = parent.as_ref().map(ContextGuard::propagated);
        f()
    })
}

/// Spawns a tokio task scoped to the caller's context (if any).
pub fn spawn_with_context<F>(future: F) -> tokio::task::JoinHandle<F::Output>
where
    F: Future + Send + 'static,
    F::Output: Send + 'static,
{
    match get() {
        Some(parent) => tokio::spawn(scope(parent, future)),
        None => tokio::spawn(future),
    }
}
