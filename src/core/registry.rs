//! # Component registry: conditional loading, aggregate expansion, priority order.
//!
//! ```text
//! add_provider(p) ──► check_acyclic(p)         (ConfigError before any side effect)
//!
//! filter_providers(resolver):
//!   for p in registration order:
//!     expand(p)
//!       ├─ should_load? ── Ok(false) ─► ComponentSkipped (subtree skipped)
//!       │               └─ Err(e)    ─► AppError::Filter (fatal)
//!       ├─ children first (depth-first), priority clamped to the parent's
//!       └─ then the provider itself
//!   warn names seen more than once (DuplicateComponent) ─► dedup identical instances
//!   stable sort by priority
//! ```
//!
//! ## Rules
//! - Ties keep registration order (stable sort).
//! - A declared child always ends up strictly before its parent.
//! - Cycles are detected by instance identity on the ancestry path. Nesting
//!   deeper than [`MAX_AGGREGATE_DEPTH`] is reported as a cycle too, which
//!   catches aggregates building fresh copies of themselves.
//! - The registry is mutated only before startup; filtering only reads it.

use std::collections::HashMap;
use std::sync::Arc;

use crate::components::{ProviderEntry, ProviderRef, ServiceEntry, ServiceRef};
use crate::container::Resolver;
use crate::error::{AppError, ConfigError};
use crate::events::{Bus, Event, EventKind};

/// Deepest aggregate nesting accepted before the tree is treated as cyclic.
pub const MAX_AGGREGATE_DEPTH: usize = 64;

/// Registered providers and services, in registration order.
pub struct Registry {
    providers: Vec<ProviderRef>,
    services: Vec<ServiceRef>,
    bus: Bus,
}

impl Registry {
    /// Creates an empty registry publishing its decisions to `bus`.
    pub fn new(bus: Bus) -> Self {
        Self {
            providers: Vec::new(),
            services: Vec::new(),
            bus,
        }
    }

    /// Adds a provider after validating its aggregate tree.
    pub fn add_provider(&mut self, provider: ProviderRef) -> Result<(), ConfigError> {
        check_acyclic(&provider, &mut Vec::new())?;
        self.providers.push(provider);
        Ok(())
    }

    /// Adds a service.
    pub fn add_service(&mut self, service: ServiceRef) {
        self.services.push(service);
    }

    /// Number of providers registered directly (aggregated children not counted).
    pub fn provider_count(&self) -> usize {
        self.providers.len()
    }

    /// Number of registered services.
    pub fn service_count(&self) -> usize {
        self.services.len()
    }

    /// Produces the ordered list of providers to load.
    pub fn filter_providers(&self, resolver: &dyn Resolver) -> Result<Vec<ProviderEntry>, AppError> {
        let mut expanded = Vec::new();
        for provider in &self.providers {
            self.expand(provider, i32::MAX, resolver, &mut Vec::new(), &mut expanded)?;
        }

        self.warn_duplicates(expanded.iter().map(ProviderEntry::name_arc));

        let mut entries: Vec<ProviderEntry> = Vec::with_capacity(expanded.len());
        for entry in expanded {
            match entries
                .iter_mut()
                .find(|kept| same_instance(kept.provider(), entry.provider()))
            {
                Some(kept) => {
                    let priority = kept.priority().min(entry.priority());
                    *kept = ProviderEntry::with_priority(Arc::clone(kept.provider()), priority);
                }
                None => entries.push(entry),
            }
        }

        entries.sort_by_key(ProviderEntry::priority);
        Ok(entries)
    }

    /// Produces the ordered list of services to load.
    pub fn filter_services(&self, resolver: &dyn Resolver) -> Result<Vec<ServiceEntry>, AppError> {
        let mut entries: Vec<ServiceEntry> = Vec::with_capacity(self.services.len());
        let mut loaded = Vec::with_capacity(self.services.len());
        for service in &self.services {
            let entry = ServiceEntry::new(Arc::clone(service));
            if !self.should_load(entry.name(), || service.should_load(resolver))? {
                continue;
            }
            loaded.push(entry.name_arc());
            if !entries
                .iter()
                .any(|kept| Arc::ptr_eq(kept.service(), service))
            {
                entries.push(entry);
            }
        }

        self.warn_duplicates(loaded.into_iter());
        entries.sort_by_key(ServiceEntry::priority);
        Ok(entries)
    }

    fn expand(
        &self,
        provider: &ProviderRef,
        ceiling: i32,
        resolver: &dyn Resolver,
        path: &mut Vec<ProviderRef>,
        out: &mut Vec<ProviderEntry>,
    ) -> Result<(), AppError> {
        let name = provider.name();
        if let Some(cycle) = cycle_at(provider, path) {
            return Err(cycle.into());
        }
        if !self.should_load(name, || provider.should_load(resolver))? {
            return Ok(());
        }

        let priority = provider.priority().min(ceiling);
        if let Some(aggregate) = provider.as_aggregate() {
            path.push(Arc::clone(provider));
            for child in aggregate.aggregates() {
                self.expand(&child, priority, resolver, path, out)?;
            }
            path.pop();
        }
        out.push(ProviderEntry::with_priority(Arc::clone(provider), priority));
        Ok(())
    }

    fn should_load(
        &self,
        name: &str,
        check: impl FnOnce() -> anyhow::Result<bool>,
    ) -> Result<bool, AppError> {
        match check() {
            Ok(true) => Ok(true),
            Ok(false) => {
                self.bus
                    .publish(Event::new(EventKind::ComponentSkipped).with_component(name));
                Ok(false)
            }
            Err(source) => Err(AppError::Filter {
                component: name.to_string(),
                source,
            }),
        }
    }

    fn warn_duplicates(&self, names: impl Iterator<Item = Arc<str>>) {
        let mut seen: HashMap<Arc<str>, usize> = HashMap::new();
        let mut order = Vec::new();
        for name in names {
            let count = seen.entry(Arc::clone(&name)).or_insert(0);
            *count += 1;
            if *count == 2 {
                order.push(name);
            }
        }
        for name in order {
            self.bus
                .publish(Event::new(EventKind::DuplicateComponent).with_component(name));
        }
    }
}

/// Walks the aggregate tree; an instance reappearing on its own ancestry path is a cycle.
fn check_acyclic(provider: &ProviderRef, path: &mut Vec<ProviderRef>) -> Result<(), ConfigError> {
    if let Some(cycle) = cycle_at(provider, path) {
        return Err(cycle);
    }
    if let Some(aggregate) = provider.as_aggregate() {
        path.push(Arc::clone(provider));
        for child in aggregate.aggregates() {
            check_acyclic(&child, path)?;
        }
        path.pop();
    }
    Ok(())
}

fn cycle_at(provider: &ProviderRef, path: &[ProviderRef]) -> Option<ConfigError> {
    let repeated = path.iter().any(|seen| same_instance(seen, provider));
    if !repeated && path.len() < MAX_AGGREGATE_DEPTH {
        return None;
    }
    let path = path
        .iter()
        .chain(std::iter::once(provider))
        .map(|p| p.name().to_string())
        .collect();
    Some(ConfigError::AggregateCycle { path })
}

fn same_instance(a: &ProviderRef, b: &ProviderRef) -> bool {
    std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b))
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;
    use crate::components::{Aggregate, Provider, Service};
    use crate::container::{Binder, Container};

    struct Named {
        name: &'static str,
        priority: i32,
        load: Result<bool, &'static str>,
        children: Vec<ProviderRef>,
    }

    impl Named {
        fn new(name: &'static str, priority: i32) -> Self {
            Self {
                name,
                priority,
                load: Ok(true),
                children: Vec::new(),
            }
        }

        fn load(mut self, load: Result<bool, &'static str>) -> Self {
            self.load = load;
            self
        }

        fn children(mut self, children: Vec<ProviderRef>) -> Self {
            self.children = children;
            self
        }

        fn arc(self) -> ProviderRef {
            Arc::new(self)
        }
    }

    impl Aggregate for Named {
        fn aggregates(&self) -> Vec<ProviderRef> {
            self.children.clone()
        }
    }

    impl Provider for Named {
        fn name(&self) -> &str {
            self.name
        }
        fn register(&self, _binder: &dyn Binder) -> anyhow::Result<()> {
            Ok(())
        }
        fn priority(&self) -> i32 {
            self.priority
        }
        fn should_load(&self, _resolver: &dyn Resolver) -> anyhow::Result<bool> {
            self.load.map_err(|e| anyhow::anyhow!(e))
        }
        fn as_aggregate(&self) -> Option<&dyn Aggregate> {
            if self.children.is_empty() {
                None
            } else {
                Some(self)
            }
        }
    }

    /// Aggregates a fresh copy of itself forever.
    struct Recursive;

    impl Aggregate for Recursive {
        fn aggregates(&self) -> Vec<ProviderRef> {
            vec![Arc::new(Recursive)]
        }
    }

    impl Provider for Recursive {
        fn register(&self, _binder: &dyn Binder) -> anyhow::Result<()> {
            Ok(())
        }
        fn as_aggregate(&self) -> Option<&dyn Aggregate> {
            Some(self)
        }
    }

    fn names(entries: &[ProviderEntry]) -> Vec<&str> {
        entries.iter().map(ProviderEntry::name).collect()
    }

    fn drain(rx: &mut tokio::sync::broadcast::Receiver<Event>) -> Vec<Event> {
        let mut out = Vec::new();
        while let Ok(ev) = rx.try_recv() {
            out.push(ev);
        }
        out
    }

    #[test]
    fn test_priority_ties_keep_registration_order() {
        let mut reg = Registry::new(Bus::new(16));
        for (name, prio) in [("p0", 0), ("p1", 10), ("p2", 10), ("p3", 5)] {
            reg.add_provider(Named::new(name, prio).arc()).unwrap();
        }
        let out = reg.filter_providers(&Container::new()).unwrap();
        assert_eq!(names(&out), vec!["p0", "p3", "p1", "p2"]);
    }

    #[test]
    fn test_default_priority_loads_last() {
        struct Plain;
        impl Provider for Plain {
            fn register(&self, _binder: &dyn Binder) -> anyhow::Result<()> {
                Ok(())
            }
        }

        let mut reg = Registry::new(Bus::new(16));
        reg.add_provider(Arc::new(Plain)).unwrap();
        reg.add_provider(Named::new("early", 999).arc()).unwrap();
        let out = reg.filter_providers(&Container::new()).unwrap();
        assert_eq!(out[0].name(), "early");
        assert_eq!(out[1].priority(), crate::components::DEFAULT_PRIORITY);
    }

    #[test]
    fn test_should_load_false_is_skipped() {
        let bus = Bus::new(16);
        let mut rx = bus.subscribe();
        let mut reg = Registry::new(bus);
        reg.add_provider(Named::new("kept", 1).arc()).unwrap();
        reg.add_provider(Named::new("off", 1).load(Ok(false)).arc())
            .unwrap();

        let out = reg.filter_providers(&Container::new()).unwrap();
        assert_eq!(names(&out), vec!["kept"]);

        let events = drain(&mut rx);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind, EventKind::ComponentSkipped);
        assert_eq!(events[0].component.as_deref(), Some("off"));
    }

    #[test]
    fn test_should_load_error_is_fatal() {
        let mut reg = Registry::new(Bus::new(16));
        reg.add_provider(Named::new("bad", 1).load(Err("missing flag")).arc())
            .unwrap();

        let err = reg.filter_providers(&Container::new()).unwrap_err();
        match err {
            AppError::Filter { component, source } => {
                assert_eq!(component, "bad");
                assert_eq!(source.to_string(), "missing flag");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_children_load_before_parent() {
        let mut reg = Registry::new(Bus::new(16));
        let leaf = Named::new("leaf", 50).arc();
        let mid = Named::new("mid", 20).children(vec![leaf]).arc();
        let root = Named::new("root", 5)
            .children(vec![mid, Named::new("side", 1).arc()])
            .arc();
        reg.add_provider(Named::new("other", 5).arc()).unwrap();
        reg.add_provider(root).unwrap();

        let out = reg.filter_providers(&Container::new()).unwrap();
        assert_eq!(names(&out), vec!["side", "other", "leaf", "mid", "root"]);
    }

    #[test]
    fn test_skipped_aggregate_skips_children() {
        let mut reg = Registry::new(Bus::new(16));
        let parent = Named::new("parent", 1)
            .load(Ok(false))
            .children(vec![Named::new("child", 1).arc()])
            .arc();
        reg.add_provider(parent).unwrap();
        assert!(reg.filter_providers(&Container::new()).unwrap().is_empty());
    }

    #[test]
    fn test_cycle_rejected_at_registration() {
        let mut reg = Registry::new(Bus::new(16));
        let err = reg.add_provider(Arc::new(Recursive)).unwrap_err();
        assert_eq!(err.as_label(), "config_aggregate_cycle");
        match err {
            ConfigError::AggregateCycle { path } => assert_eq!(path.len(), MAX_AGGREGATE_DEPTH + 1),
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(reg.provider_count(), 0);
    }

    /// Same type at every level, named by type.
    struct Group(Vec<ProviderRef>);

    impl Aggregate for Group {
        fn aggregates(&self) -> Vec<ProviderRef> {
            self.0.clone()
        }
    }

    impl Provider for Group {
        fn register(&self, _binder: &dyn Binder) -> anyhow::Result<()> {
            Ok(())
        }
        fn as_aggregate(&self) -> Option<&dyn Aggregate> {
            Some(self)
        }
    }

    #[test]
    fn test_same_type_nested_aggregates_are_not_a_cycle() {
        let mut reg = Registry::new(Bus::new(16));
        let inner: ProviderRef = Arc::new(Group(vec![Named::new("leaf", 1).arc()]));
        reg.add_provider(Arc::new(Group(vec![inner]))).unwrap();

        let out = reg.filter_providers(&Container::new()).unwrap();
        assert_eq!(out.len(), 3);
        assert_eq!(out[0].name(), "leaf");
        assert_eq!(out[1].name(), out[2].name());
    }

    #[test]
    fn test_identical_instance_loaded_once_and_duplicates_warned() {
        let bus = Bus::new(16);
        let mut rx = bus.subscribe();
        let mut reg = Registry::new(bus);

        let shared = Named::new("shared", 30).arc();
        let a = Named::new("a", 10).children(vec![Arc::clone(&shared)]).arc();
        let b = Named::new("b", 1).children(vec![Arc::clone(&shared)]).arc();
        reg.add_provider(a).unwrap();
        reg.add_provider(b).unwrap();
        reg.add_provider(Named::new("twin", 40).arc()).unwrap();
        reg.add_provider(Named::new("twin", 40).arc()).unwrap();

        let out = reg.filter_providers(&Container::new()).unwrap();
        assert_eq!(names(&out), vec!["shared", "b", "a", "twin", "twin"]);

        let dups: Vec<_> = drain(&mut rx)
            .into_iter()
            .filter(|e| e.kind == EventKind::DuplicateComponent)
            .filter_map(|e| e.component)
            .collect();
        assert_eq!(dups, vec![Arc::<str>::from("shared"), Arc::<str>::from("twin")]);
    }

    #[test]
    fn test_provider_registered_twice_loads_once_with_warning() {
        let bus = Bus::new(16);
        let mut rx = bus.subscribe();
        let mut reg = Registry::new(bus);

        let leaf = Named::new("leaf", 1).arc();
        reg.add_provider(Arc::clone(&leaf)).unwrap();
        reg.add_provider(leaf).unwrap();

        let out = reg.filter_providers(&Container::new()).unwrap();
        assert_eq!(names(&out), vec!["leaf"]);

        let events = drain(&mut rx);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind, EventKind::DuplicateComponent);
        assert_eq!(events[0].component.as_deref(), Some("leaf"));
    }

    struct Svc {
        name: &'static str,
        priority: i32,
        load: bool,
        log: Arc<Mutex<Vec<&'static str>>>,
    }

    #[async_trait]
    impl Service for Svc {
        fn name(&self) -> &str {
            self.name
        }
        fn priority(&self) -> i32 {
            self.priority
        }
        fn should_load(&self, _resolver: &dyn Resolver) -> anyhow::Result<bool> {
            Ok(self.load)
        }
        async fn init(&self, _resolver: Arc<dyn Resolver>) -> anyhow::Result<()> {
            Ok(())
        }
        async fn start(&self) -> anyhow::Result<()> {
            self.log.lock().unwrap().push(self.name);
            Ok(())
        }
        async fn stop(&self) {}
    }

    #[test]
    fn test_services_filtered_and_sorted() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut reg = Registry::new(Bus::new(16));
        for (name, priority, load) in [("late", 100, true), ("off", 1, false), ("early", 1, true)] {
            reg.add_service(Arc::new(Svc {
                name,
                priority,
                load,
                log: Arc::clone(&log),
            }));
        }

        let out = reg.filter_services(&Container::new()).unwrap();
        let got: Vec<&str> = out.iter().map(ServiceEntry::name).collect();
        assert_eq!(got, vec!["early", "late"]);
        assert_eq!(reg.service_count(), 3);
    }

    #[test]
    fn test_service_registered_twice_starts_once_with_warning() {
        let bus = Bus::new(16);
        let mut rx = bus.subscribe();
        let mut reg = Registry::new(bus);
        let svc: ServiceRef = Arc::new(Svc {
            name: "http",
            priority: 1,
            load: true,
            log: Arc::default(),
        });
        reg.add_service(Arc::clone(&svc));
        reg.add_service(svc);

        let out = reg.filter_services(&Container::new()).unwrap();
        assert_eq!(out.len(), 1);

        let events = drain(&mut rx);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind, EventKind::DuplicateComponent);
        assert_eq!(events[0].component.as_deref(), Some("http"));
    }
}
