//! Extension runtime.
//!
//! Every pipeline step is a *pluggable* function: a marker type implementing
//! [`Pluggable`] plus one of [`StreamStep`] (synchronous default body) or
//! [`PromiseStep`] (asynchronous default body). Invoking a step through
//! [`stream`] or [`promise`] consults the session's
//! [`ExtensionRegistry`](crate::core::registry::ExtensionRegistry):
//!
//! 1. registered overrides run in registration order, followed by the default
//!    body; the first candidate that returns [`Handled::Done`] ends the chain
//!    and later candidates are never invoked;
//! 2. a chain in which every candidate declined settles to
//!    `Output::default()`;
//! 3. registered transforms then run unconditionally, in registration order,
//!    each receiving the previous result and the original arguments.
//!
//! Any `Err` aborts the remaining chain and is returned unchanged.

use crate::cache::CompilationCache;
use crate::core::context::{Collaborators, CompilationContext};
use crate::core::models::BuildOptions;
use crate::utils::{InterlockError, Result};
use futures::future::BoxFuture;
use std::sync::Arc;
use tracing::{debug, trace, warn};

/// Outcome of a single override candidate or default body.
///
/// `Handled::Continue` is the "decline, fall through" marker. It is a
/// variant, not a value, so it can never be confused with a result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Handled<T> {
    /// Defer to the next candidate in the chain.
    Continue,
    Done(T),
}

impl<T> Handled<T> {
    pub fn is_continue(&self) -> bool {
        matches!(self, Handled::Continue)
    }

    pub fn into_option(self) -> Option<T> {
        match self {
            Handled::Continue => None,
            Handled::Done(value) => Some(value),
        }
    }
}

impl<T> From<Option<T>> for Handled<T> {
    fn from(value: Option<T>) -> Self {
        match value {
            Some(value) => Handled::Done(value),
            None => Handled::Continue,
        }
    }
}

/// Name of an extensible step. Overrides and transforms are registered
/// against these.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ExtensionPoint {
    Compile,
    GetModuleSeeds,
    GenerateModuleMaps,
    GenerateBundles,
    InterpolateFilename,
    BuildOutput,
    GetUrls,
    EmitRawBundles,
    ConstructBundle,
    SaveBundles,
    /// Pluggable functions defined outside this crate.
    Custom(&'static str),
}

/// How a step's chain is evaluated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    Stream,
    Promise,
}

/// Static description of an extensible function.
pub trait Pluggable: Send + Sync + 'static {
    const POINT: ExtensionPoint;

    /// Extensible steps this one may invoke through its [`ExecutionContext`].
    const DEPENDENCIES: &'static [ExtensionPoint] = &[];

    type Args: Clone + Send + Sync + 'static;

    /// `Default` is the settled value of a chain in which every candidate
    /// declined.
    type Output: Default + Send + 'static;
}

/// A step whose chain is evaluated synchronously.
pub trait StreamStep: Pluggable {
    fn run(cx: &ExecutionContext, args: &Self::Args) -> Result<Handled<Self::Output>>;
}

/// A step whose chain is evaluated as a sequence of futures.
pub trait PromiseStep: Pluggable {
    fn run(cx: ExecutionContext, args: Self::Args) -> BoxFuture<'static, Result<Handled<Self::Output>>>;
}

/// Per-call context handed to default bodies, overrides and transforms.
///
/// Built by [`ExecutionContext::bind`] as a flat copy of the session
/// context. Extensible dependencies reached through [`call`](Self::call) or
/// [`call_sync`](Self::call_sync) always resolve their own overrides against
/// the session context that started the outermost call, no matter how
/// deeply they are nested.
#[derive(Clone)]
pub struct ExecutionContext {
    pub opts: Arc<BuildOptions>,
    pub cache: Arc<CompilationCache>,
    /// Plain helpers. Calls through these never consult the registry.
    pub collaborators: Collaborators,
    caller: ExtensionPoint,
    dependencies: &'static [ExtensionPoint],
    session: CompilationContext,
}

impl ExecutionContext {
    /// Derive the execution context for one invocation of `caller`.
    /// `base` is not modified.
    pub fn bind(
        base: &CompilationContext,
        caller: ExtensionPoint,
        dependencies: &'static [ExtensionPoint],
    ) -> Self {
        Self {
            opts: base.opts.clone(),
            cache: base.cache.clone(),
            collaborators: base.collaborators.clone(),
            caller,
            dependencies,
            session: base.clone(),
        }
    }

    pub fn caller(&self) -> ExtensionPoint {
        self.caller
    }

    pub fn dependencies(&self) -> &'static [ExtensionPoint] {
        self.dependencies
    }

    /// Invoke an asynchronous dependency against the session context.
    pub async fn call<P: PromiseStep>(&self, args: P::Args) -> Result<P::Output> {
        let session = self.bound_session(P::POINT)?;
        promise::<P>(session, args).await
    }

    /// Invoke a synchronous dependency against the session context.
    pub fn call_sync<P: StreamStep>(&self, args: P::Args) -> Result<P::Output> {
        let session = self.bound_session(P::POINT)?;
        stream::<P>(session, args)
    }

    fn bound_session(&self, dependency: ExtensionPoint) -> Result<&CompilationContext> {
        if self.dependencies.contains(&dependency) {
            Ok(&self.session)
        } else {
            Err(InterlockError::UndeclaredDependency {
                caller: self.caller,
                dependency,
            })
        }
    }
}

fn settle<P: Pluggable>(result: Handled<P::Output>) -> P::Output {
    match result {
        Handled::Done(value) => value,
        Handled::Continue => {
            warn!("every candidate for {:?} declined; using the empty value", P::POINT);
            P::Output::default()
        }
    }
}

/// Run a synchronous step against `session`.
pub fn stream<P: StreamStep>(session: &CompilationContext, args: P::Args) -> Result<P::Output> {
    let (overrides, transforms) = session.registry.stream_sequences::<P>()?;
    let cx = ExecutionContext::bind(session, P::POINT, P::DEPENDENCIES);

    let mut result = Handled::Continue;
    for (index, candidate) in overrides.iter().enumerate() {
        trace!("{:?}: trying override #{}", P::POINT, index);
        result = candidate(&cx, &args)?;
        if !result.is_continue() {
            debug!("{:?}: handled by override #{}", P::POINT, index);
            break;
        }
    }
    if result.is_continue() {
        result = P::run(&cx, &args)?;
    }

    let mut value = settle::<P>(result);
    for transform in transforms.iter() {
        value = transform(&cx, value, &args)?;
    }

    Ok(value)
}

/// Run an asynchronous step against `session`.
///
/// Candidates and transforms are awaited one at a time; nothing in a chain
/// runs concurrently.
pub async fn promise<P: PromiseStep>(session: &CompilationContext, args: P::Args) -> Result<P::Output> {
    let (overrides, transforms) = session.registry.promise_sequences::<P>()?;
    let cx = ExecutionContext::bind(session, P::POINT, P::DEPENDENCIES);

    let mut result = Handled::Continue;
    for (index, candidate) in overrides.iter().enumerate() {
        trace!("{:?}: trying override #{}", P::POINT, index);
        result = candidate(cx.clone(), args.clone()).await?;
        if !result.is_continue() {
            debug!("{:?}: handled by override #{}", P::POINT, index);
            break;
        }
    }
    if result.is_continue() {
        result = P::run(cx.clone(), args.clone()).await?;
    }

    let mut value = settle::<P>(result);
    for transform in transforms.iter() {
        value = transform(cx.clone(), value, args.clone()).await?;
    }

    Ok(value)
}
