use crate::core::pluggable::{
    ExecutionContext, ExtensionPoint, Handled, Pluggable, PromiseStep, StreamStep, Strategy,
};
use crate::utils::{InterlockError, Result};
use futures::future::BoxFuture;
use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

pub type StreamOverride<P> = Arc<
    dyn Fn(&ExecutionContext, &<P as Pluggable>::Args) -> Result<Handled<<P as Pluggable>::Output>>
        + Send
        + Sync,
>;

pub type StreamTransform<P> = Arc<
    dyn Fn(
            &ExecutionContext,
            <P as Pluggable>::Output,
            &<P as Pluggable>::Args,
        ) -> Result<<P as Pluggable>::Output>
        + Send
        + Sync,
>;

pub type PromiseOverride<P> = Arc<
    dyn Fn(
            ExecutionContext,
            <P as Pluggable>::Args,
        ) -> BoxFuture<'static, Result<Handled<<P as Pluggable>::Output>>>
        + Send
        + Sync,
>;

pub type PromiseTransform<P> = Arc<
    dyn Fn(
            ExecutionContext,
            <P as Pluggable>::Output,
            <P as Pluggable>::Args,
        ) -> BoxFuture<'static, Result<<P as Pluggable>::Output>>
        + Send
        + Sync,
>;

struct Chains<O, T> {
    overrides: Vec<O>,
    transforms: Vec<T>,
}

impl<O, T> Default for Chains<O, T> {
    fn default() -> Self {
        Self {
            overrides: Vec::new(),
            transforms: Vec::new(),
        }
    }
}

struct Entry {
    strategy: Strategy,
    override_count: usize,
    transform_count: usize,
    chains: Box<dyn Any + Send + Sync>,
}

/// Override and transform sequences for every extension point.
///
/// Populated while a compilation context is bootstrapped and read-only
/// afterwards. Sequences preserve registration order.
#[derive(Default)]
pub struct ExtensionRegistry {
    entries: HashMap<ExtensionPoint, Entry>,
}

impl ExtensionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an override for an asynchronous step. The closure returns a
    /// boxed future, usually `async move { ... }.boxed()`.
    pub fn add_override<P: PromiseStep>(
        &mut self,
        candidate: impl Fn(ExecutionContext, P::Args) -> BoxFuture<'static, Result<Handled<P::Output>>>
            + Send
            + Sync
            + 'static,
    ) -> Result<()> {
        let entry = self.entry::<P>(Strategy::Promise)?;
        downcast_mut::<P, PromiseOverride<P>, PromiseTransform<P>>(&mut entry.chains)?
            .overrides
            .push(Arc::new(candidate));
        entry.override_count += 1;
        Ok(())
    }

    /// Register a transform for an asynchronous step.
    pub fn add_transform<P: PromiseStep>(
        &mut self,
        transform: impl Fn(ExecutionContext, P::Output, P::Args) -> BoxFuture<'static, Result<P::Output>>
            + Send
            + Sync
            + 'static,
    ) -> Result<()> {
        let entry = self.entry::<P>(Strategy::Promise)?;
        downcast_mut::<P, PromiseOverride<P>, PromiseTransform<P>>(&mut entry.chains)?
            .transforms
            .push(Arc::new(transform));
        entry.transform_count += 1;
        Ok(())
    }

    pub fn add_stream_override<P: StreamStep>(
        &mut self,
        candidate: impl Fn(&ExecutionContext, &P::Args) -> Result<Handled<P::Output>> + Send + Sync + 'static,
    ) -> Result<()> {
        let entry = self.entry::<P>(Strategy::Stream)?;
        downcast_mut::<P, StreamOverride<P>, StreamTransform<P>>(&mut entry.chains)?
            .overrides
            .push(Arc::new(candidate));
        entry.override_count += 1;
        Ok(())
    }

    pub fn add_stream_transform<P: StreamStep>(
        &mut self,
        transform: impl Fn(&ExecutionContext, P::Output, &P::Args) -> Result<P::Output> + Send + Sync + 'static,
    ) -> Result<()> {
        let entry = self.entry::<P>(Strategy::Stream)?;
        downcast_mut::<P, StreamOverride<P>, StreamTransform<P>>(&mut entry.chains)?
            .transforms
            .push(Arc::new(transform));
        entry.transform_count += 1;
        Ok(())
    }

    /// Overrides and transforms registered for a synchronous step. Both are
    /// empty when nothing was registered.
    pub fn stream_sequences<P: StreamStep>(&self) -> Result<(&[StreamOverride<P>], &[StreamTransform<P>])> {
        match self.lookup::<P>(Strategy::Stream)? {
            Some(chains) => {
                let chains = downcast_ref::<P, StreamOverride<P>, StreamTransform<P>>(chains)?;
                Ok((&chains.overrides, &chains.transforms))
            }
            None => Ok((&[], &[])),
        }
    }

    pub fn promise_sequences<P: PromiseStep>(&self) -> Result<(&[PromiseOverride<P>], &[PromiseTransform<P>])> {
        match self.lookup::<P>(Strategy::Promise)? {
            Some(chains) => {
                let chains = downcast_ref::<P, PromiseOverride<P>, PromiseTransform<P>>(chains)?;
                Ok((&chains.overrides, &chains.transforms))
            }
            None => Ok((&[], &[])),
        }
    }

    pub fn override_count(&self, point: ExtensionPoint) -> usize {
        self.entries.get(&point).map_or(0, |e| e.override_count)
    }

    pub fn transform_count(&self, point: ExtensionPoint) -> usize {
        self.entries.get(&point).map_or(0, |e| e.transform_count)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn entry<P: Pluggable>(&mut self, strategy: Strategy) -> Result<&mut Entry> {
        let entry = self.entries.entry(P::POINT).or_insert_with(|| Entry {
            strategy,
            override_count: 0,
            transform_count: 0,
            chains: match strategy {
                Strategy::Stream => Box::new(Chains::<StreamOverride<P>, StreamTransform<P>>::default()),
                Strategy::Promise => Box::new(Chains::<PromiseOverride<P>, PromiseTransform<P>>::default()),
            },
        });

        if entry.strategy != strategy {
            return Err(strategy_mismatch(P::POINT, entry.strategy, strategy));
        }
        Ok(entry)
    }

    fn lookup<P: Pluggable>(&self, strategy: Strategy) -> Result<Option<&(dyn Any + Send + Sync)>> {
        match self.entries.get(&P::POINT) {
            None => Ok(None),
            Some(entry) if entry.strategy != strategy => {
                Err(strategy_mismatch(P::POINT, entry.strategy, strategy))
            }
            Some(entry) => Ok(Some(entry.chains.as_ref())),
        }
    }
}

fn strategy_mismatch(point: ExtensionPoint, registered: Strategy, requested: Strategy) -> InterlockError {
    InterlockError::Registry(format!(
        "{:?} is registered as {:?} but was used as {:?}",
        point, registered, requested
    ))
}

fn type_mismatch(point: ExtensionPoint) -> InterlockError {
    InterlockError::Registry(format!(
        "extensions for {:?} were registered with different argument or result types",
        point
    ))
}

fn downcast_mut<P: Pluggable, O: 'static, T: 'static>(
    chains: &mut Box<dyn Any + Send + Sync>,
) -> Result<&mut Chains<O, T>> {
    chains
        .downcast_mut::<Chains<O, T>>()
        .ok_or_else(|| type_mismatch(P::POINT))
}

fn downcast_ref<'a, P: Pluggable, O: 'static, T: 'static>(
    chains: &'a (dyn Any + Send + Sync),
) -> Result<&'a Chains<O, T>> {
    chains
        .downcast_ref::<Chains<O, T>>()
        .ok_or_else(|| type_mismatch(P::POINT))
}

impl fmt::Debug for ExtensionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut points: Vec<_> = self.entries.iter().collect();
        points.sort_by_key(|(point, _)| **point);

        let mut map = f.debug_map();
        for (point, entry) in points {
            map.entry(
                point,
                &format_args!(
                    "{:?} ({} overrides, {} transforms)",
                    entry.strategy, entry.override_count, entry.transform_count
                ),
            );
        }
        map.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::FutureExt;

    struct Both;

    impl Pluggable for Both {
        const POINT: ExtensionPoint = ExtensionPoint::Custom("both");
        type Args = ();
        type Output = u8;
    }

    impl StreamStep for Both {
        fn run(_cx: &ExecutionContext, _args: &()) -> Result<Handled<u8>> {
            Ok(Handled::Done(1))
        }
    }

    impl PromiseStep for Both {
        fn run(_cx: ExecutionContext, _args: ()) -> BoxFuture<'static, Result<Handled<u8>>> {
            async { Ok(Handled::Done(2)) }.boxed()
        }
    }

    // Same point name as `Both`, different output type.
    struct Impostor;

    impl Pluggable for Impostor {
        const POINT: ExtensionPoint = ExtensionPoint::Custom("both");
        type Args = ();
        type Output = String;
    }

    impl StreamStep for Impostor {
        fn run(_cx: &ExecutionContext, _args: &()) -> Result<Handled<String>> {
            Ok(Handled::Continue)
        }
    }

    #[test]
    fn test_unregistered_point_has_empty_sequences() {
        let registry = ExtensionRegistry::new();
        let (overrides, transforms) = registry.stream_sequences::<Both>().unwrap();
        assert!(overrides.is_empty());
        assert!(transforms.is_empty());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_sequences_keep_registration_order() {
        let mut registry = ExtensionRegistry::new();
        registry.add_stream_override::<Both>(|_, _| Ok(Handled::Done(10))).unwrap();
        registry.add_stream_override::<Both>(|_, _| Ok(Handled::Done(20))).unwrap();
        registry.add_stream_transform::<Both>(|_, v, _| Ok(v + 1)).unwrap();

        assert_eq!(registry.override_count(Both::POINT), 2);
        assert_eq!(registry.transform_count(Both::POINT), 1);
        let (overrides, transforms) = registry.stream_sequences::<Both>().unwrap();
        assert_eq!(overrides.len(), 2);
        assert_eq!(transforms.len(), 1);
    }

    #[test]
    fn test_strategy_mismatch_is_rejected() {
        let mut registry = ExtensionRegistry::new();
        registry.add_stream_override::<Both>(|_, _| Ok(Handled::Continue)).unwrap();

        let err = registry
            .add_override::<Both>(|_, _| async { Ok(Handled::Continue) }.boxed())
            .unwrap_err();
        assert!(matches!(err, InterlockError::Registry(_)));
        assert!(registry.promise_sequences::<Both>().is_err());
    }

    #[test]
    fn test_type_mismatch_is_rejected() {
        let mut registry = ExtensionRegistry::new();
        registry.add_stream_override::<Both>(|_, _| Ok(Handled::Continue)).unwrap();

        let err = registry
            .add_stream_transform::<Impostor>(|_, v, _| Ok(v))
            .unwrap_err();
        assert!(matches!(err, InterlockError::Registry(_)));
        let err = registry
            .add_stream_override::<Impostor>(|_, _| Ok(Handled::Continue))
            .unwrap_err();
        assert!(matches!(err, InterlockError::Registry(_)));

        assert_eq!(registry.override_count(Both::POINT), 1);
        assert_eq!(registry.transform_count(Both::POINT), 0);
    }

    #[test]
    fn test_debug_lists_counts() {
        let mut registry = ExtensionRegistry::new();
        registry.add_stream_transform::<Both>(|_, v, _| Ok(v)).unwrap();
        let rendered = format!("{:?}", registry);
        assert!(rendered.contains("Custom(\"both\")"));
        assert!(rendered.contains("0 overrides, 1 transforms"));
    }
}
