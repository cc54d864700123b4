use std::any::Any;
use std::collections::HashMap;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};

use tokio::sync::RwLock as AsyncRwLock;
use tokio_util::sync::CancellationToken;

use crate::agent::RunHooks;
use crate::error::HiveError;
use crate::memory::{Memory, Session};
use crate::trace::Tracer;

/// Typed handle into the context's key/value map.
///
/// Keys are compared by name; the type parameter pins what `get` returns.
///
/// ```rust,ignore
/// const TENANT: ContextKey<String> = ContextKey::new("tenant");
/// ctx.insert(&TENANT, "acme".to_string());
/// let tenant = ctx.get(&TENANT);
/// ```
pub struct ContextKey<T> {
    name: &'static str,
    _marker: PhantomData<fn() -> T>,
}

impl<T> ContextKey<T> {
    pub const fn new(name: &'static str) -> Self {
        Self {
            name,
            _marker: PhantomData,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl<T> Clone for ContextKey<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for ContextKey<T> {}

struct ContextShared {
    input: String,
    iteration: AtomicUsize,
    values: RwLock<HashMap<String, Arc<dyn Any + Send + Sync>>>,
    session: Option<Arc<dyn Session>>,
    memory: Option<Arc<AsyncRwLock<dyn Memory>>>,
    tracer: Option<Arc<dyn Tracer>>,
    hooks: Option<Arc<dyn RunHooks>>,
}

/// Per-run state shared by every step of one invocation.
///
/// Cloning is cheap; all clones observe the same iteration counter and
/// value map. [`Context::child`] derives a context whose cancellation can
/// be triggered without cancelling the parent, while a parent cancel
/// still reaches every child.
#[derive(Clone)]
pub struct Context {
    shared: Arc<ContextShared>,
    cancellation: CancellationToken,
}

impl Context {
    pub fn new(input: impl Into<String>) -> Self {
        Self::builder(input).build()
    }

    pub fn builder(input: impl Into<String>) -> ContextBuilder {
        ContextBuilder {
            input: input.into(),
            cancellation: None,
            session: None,
            memory: None,
            tracer: None,
            hooks: None,
        }
    }

    pub fn input(&self) -> &str {
        &self.shared.input
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancellation
    }

    pub fn cancel(&self) {
        self.cancellation.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }

    pub fn check_cancelled(&self) -> Result<(), HiveError> {
        if self.is_cancelled() {
            Err(HiveError::Cancelled)
        } else {
            Ok(())
        }
    }

    /// Derive a context with a child cancellation token. Used by scoped
    /// modifiers (timeout) and parallel siblings so they can be cancelled
    /// without touching the parent.
    pub fn child(&self) -> Context {
        Context {
            shared: Arc::clone(&self.shared),
            cancellation: self.cancellation.child_token(),
        }
    }

    /// Current iteration, 0 before the first turn.
    pub fn iteration(&self) -> usize {
        self.shared.iteration.load(Ordering::SeqCst)
    }

    /// Increment the iteration counter and return the new (1-based) value.
    pub fn advance_iteration(&self) -> usize {
        self.shared.iteration.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub fn insert<T: Send + Sync + 'static>(&self, key: &ContextKey<T>, value: T) {
        self.shared
            .values
            .write()
            .expect("context value map poisoned")
            .insert(key.name.to_string(), Arc::new(value));
    }

    pub fn get<T: Send + Sync + 'static>(&self, key: &ContextKey<T>) -> Option<Arc<T>> {
        self.shared
            .values
            .read()
            .expect("context value map poisoned")
            .get(key.name)
            .cloned()
            .and_then(|value| value.downcast::<T>().ok())
    }

    /// Untyped presence check, used by route conditions.
    pub fn contains_key(&self, name: &str) -> bool {
        self.shared
            .values
            .read()
            .expect("context value map poisoned")
            .contains_key(name)
    }

    pub fn session(&self) -> Option<Arc<dyn Session>> {
        self.shared.session.clone()
    }

    pub fn memory(&self) -> Option<Arc<AsyncRwLock<dyn Memory>>> {
        self.shared.memory.clone()
    }

    pub fn tracer(&self) -> Option<Arc<dyn Tracer>> {
        self.shared.tracer.clone()
    }

    pub fn hooks(&self) -> Option<Arc<dyn RunHooks>> {
        self.shared.hooks.clone()
    }
}

pub struct ContextBuilder {
    input: String,
    cancellation: Option<CancellationToken>,
    session: Option<Arc<dyn Session>>,
    memory: Option<Arc<AsyncRwLock<dyn Memory>>>,
    tracer: Option<Arc<dyn Tracer>>,
    hooks: Option<Arc<dyn RunHooks>>,
}

impl ContextBuilder {
    pub fn cancellation(mut self, cancellation: CancellationToken) -> Self {
        self.cancellation = Some(cancellation);
        self
    }

    pub fn session(mut self, session: Arc<dyn Session>) -> Self {
        self.session = Some(session);
        self
    }

    pub fn memory(mut self, memory: Arc<AsyncRwLock<dyn Memory>>) -> Self {
        self.memory = Some(memory);
        self
    }

    pub fn tracer(mut self, tracer: Arc<dyn Tracer>) -> Self {
        self.tracer = Some(tracer);
        self
    }

    pub fn hooks(mut self, hooks: Arc<dyn RunHooks>) -> Self {
        self.hooks = Some(hooks);
        self
    }

    pub fn build(self) -> Context {
        Context {
            shared: Arc::new(ContextShared {
                input: self.input,
                iteration: AtomicUsize::new(0),
                values: RwLock::new(HashMap::new()),
                session: self.session,
                memory: self.memory,
                tracer: self.tracer,
                hooks: self.hooks,
            }),
            cancellation: self.cancellation.unwrap_or_default(),
        }
    }
}
