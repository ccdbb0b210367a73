// src/task.rs

//! The unit of work the scheduler drives.
//!
//! - [`Initializable`] is the capability every schedulable task implements:
//!   one asynchronous "run to completion" operation.
//! - [`TaskRef`] is the shared handle passed around by the graph builder,
//!   the scheduler and the host.
//! - [`TaskHandle`] gives a `TaskRef` identity semantics so it can be used
//!   as a map key.
//! - [`InitFn`] wraps a closure as a task.

use std::fmt;
use std::future::Future;
use std::hash::{Hash, Hasher};
use std::pin::Pin;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

/// Boxed future returned by [`Initializable::init`].
pub type BoxInitFuture = Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send + 'static>>;

/// Shared handle to a task object.
pub type TaskRef = Arc<dyn Initializable>;

/// A unit of asynchronous initialization work.
///
/// `init` is called at most once per scheduling run. Returning `Err` marks
/// the task as failed for that run; the scheduler never retries it.
///
/// The token is shared by every task of the run. It fires when the host
/// tears the run down; implementations that can stop early should watch it,
/// the scheduler never aborts an in-flight `init` on its own.
pub trait Initializable: Send + Sync + 'static {
    /// Stable, human-readable name used in logs and run reports.
    fn name(&self) -> &str;

    /// Start the task's work and return a future that settles once it is done.
    fn init(&self, cancel: CancellationToken) -> BoxInitFuture;
}

/// Identity wrapper around a [`TaskRef`].
///
/// Two handles are equal only if they point at the same task object; the
/// task's name plays no part in equality or hashing.
#[derive(Clone)]
pub struct TaskHandle(TaskRef);

impl TaskHandle {
    pub fn new(task: TaskRef) -> Self {
        Self(task)
    }

    pub fn task(&self) -> &TaskRef {
        &self.0
    }

    pub fn name(&self) -> &str {
        self.0.name()
    }

    fn addr(&self) -> *const () {
        Arc::as_ptr(&self.0) as *const ()
    }
}

impl From<TaskRef> for TaskHandle {
    fn from(task: TaskRef) -> Self {
        Self(task)
    }
}

impl From<&TaskRef> for TaskHandle {
    fn from(task: &TaskRef) -> Self {
        Self(Arc::clone(task))
    }
}

impl PartialEq for TaskHandle {
    fn eq(&self, other: &Self) -> bool {
        // Compare data pointers only; vtable pointers for the same object may
        // differ between codegen units.
        std::ptr::eq(self.addr(), other.addr())
    }
}

impl Eq for TaskHandle {}

impl Hash for TaskHandle {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.addr().hash(state);
    }
}

impl fmt::Debug for TaskHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("TaskHandle").field(&self.name()).finish()
    }
}

impl fmt::Display for TaskHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

type InitClosure = dyn Fn(CancellationToken) -> BoxInitFuture + Send + Sync;

/// Closure-backed [`Initializable`].
///
/// ```
/// use initdag::task::{InitFn, Initializable};
///
/// let task = InitFn::arc("settings", |_cancel| async { Ok(()) });
/// assert_eq!(task.name(), "settings");
/// ```
pub struct InitFn {
    name: String,
    f: Box<InitClosure>,
}

impl InitFn {
    pub fn new<F, Fut>(name: impl Into<String>, f: F) -> Self
    where
        F: Fn(CancellationToken) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        Self {
            name: name.into(),
            f: Box::new(move |cancel| Box::pin(f(cancel))),
        }
    }

    /// Same as [`InitFn::new`], already wrapped as a [`TaskRef`].
    pub fn arc<F, Fut>(name: impl Into<String>, f: F) -> TaskRef
    where
        F: Fn(CancellationToken) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        Arc::new(Self::new(name, f))
    }
}

impl fmt::Debug for InitFn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InitFn")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

impl Initializable for InitFn {
    fn name(&self) -> &str {
        &self.name
    }

    fn init(&self, cancel: CancellationToken) -> BoxInitFuture {
        (self.f)(cancel)
    }
}
