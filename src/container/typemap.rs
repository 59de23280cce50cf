//! # Default in-memory resolver.
//!
//! Bindings live in a `RwLock<HashMap<TypeId, Binding>>`. The table lock is never held
//! while a constructor runs, so constructors may resolve their own dependencies.
//! A singleton constructor that (transitively) resolves its own type deadlocks on
//! its slot; dependency cycles are a caller error.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};

use tracing::debug;

use super::{AnyArc, AnyFactory, Binder, Lifetime, Resolver, TypeKey};
use crate::error::ContainerError;

#[derive(Clone)]
enum Binding {
    Instance(AnyArc),
    Singleton {
        factory: AnyFactory,
        slot: Arc<Mutex<Option<AnyArc>>>,
    },
    Prototype(AnyFactory),
}

/// Type-keyed binder/resolver.
#[derive(Default)]
pub struct Container {
    bindings: RwLock<HashMap<std::any::TypeId, Binding>>,
}

impl Container {
    /// Creates an empty container.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty container behind the shared handle the runtime passes around.
    pub fn shared() -> Arc<dyn Resolver> {
        Arc::new(Self::new())
    }

    /// Returns the number of bound types.
    pub fn len(&self) -> usize {
        self.bindings.read().map(|b| b.len()).unwrap_or(0)
    }

    /// Returns true when nothing is bound.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn insert(&self, key: TypeKey, binding: Binding) {
        let mut table = match self.bindings.write() {
            Ok(t) => t,
            Err(poisoned) => poisoned.into_inner(),
        };
        if table.insert(key.id, binding).is_some() {
            debug!(type_name = key.name, "binding replaced");
        }
    }

    fn lookup(&self, key: TypeKey) -> Result<Binding, ContainerError> {
        let table = self.bindings.read().map_err(|_| ContainerError::Poisoned)?;
        table
            .get(&key.id)
            .cloned()
            .ok_or(ContainerError::NotBound {
                type_name: key.name,
            })
    }
}

impl Binder for Container {
    fn bind_any(&self, key: TypeKey, value: AnyArc) {
        self.insert(key, Binding::Instance(value));
    }

    fn bind_factory(&self, key: TypeKey, lifetime: Lifetime, factory: AnyFactory) {
        let binding = match lifetime {
            Lifetime::Singleton => Binding::Singleton {
                factory,
                slot: Arc::new(Mutex::new(None)),
            },
            Lifetime::Prototype => Binding::Prototype(factory),
        };
        self.insert(key, binding);
    }

    fn has(&self, key: TypeKey) -> bool {
        self.bindings
            .read()
            .map(|t| t.contains_key(&key.id))
            .unwrap_or(false)
    }
}

impl Resolver for Container {
    fn resolve_any(&self, key: TypeKey) -> Result<AnyArc, ContainerError> {
        let construct = |factory: &AnyFactory| {
            factory(self).map_err(|source| ContainerError::Factory {
                type_name: key.name,
                source,
            })
        };

        match self.lookup(key)? {
            Binding::Instance(value) => Ok(value),
            Binding::Prototype(factory) => construct(&factory),
            Binding::Singleton { factory, slot } => {
                let mut slot = slot.lock().map_err(|_| ContainerError::Poisoned)?;
                if let Some(value) = slot.as_ref() {
                    return Ok(Arc::clone(value));
                }
                let value = construct(&factory)?;
                *slot = Some(Arc::clone(&value));
                Ok(value)
            }
        }
    }

    fn as_binder(&self) -> &dyn Binder {
        self
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::container::{BinderExt, ResolverExt};

    #[derive(Debug, PartialEq)]
    struct Port(u16);

    #[test]
    fn test_value_binding_resolves() {
        let c = Container::new();
        c.bind_value(Port(8080));
        assert_eq!(*c.resolve::<Port>().unwrap(), Port(8080));
        assert!(c.has(TypeKey::of::<Port>()));
    }

    #[test]
    fn test_missing_binding() {
        let c = Container::new();
        let err = c.resolve::<Port>().unwrap_err();
        assert_eq!(err.as_label(), "container_not_bound");
    }

    #[test]
    fn test_singleton_constructed_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let c = Container::new();
        let counter = Arc::clone(&calls);
        c.singleton(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(Port(1))
        });

        let a = c.resolve::<Port>().unwrap();
        let b = c.resolve::<Port>().unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_prototype_constructed_every_time() {
        let c = Container::new();
        c.prototype(|_| Ok(Port(2)));
        let a = c.resolve::<Port>().unwrap();
        let b = c.resolve::<Port>().unwrap();
        assert!(!Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn test_constructor_resolves_dependencies() {
        let c = Container::new();
        c.bind_value(Port(9000));
        c.singleton(|r| Ok(format!("0.0.0.0:{}", r.resolve::<Port>()?.0)));
        assert_eq!(*c.resolve::<String>().unwrap(), "0.0.0.0:9000");
    }

    #[test]
    fn test_later_binding_wins() {
        let c = Container::new();
        c.bind_value(Port(1));
        c.bind_value(Port(2));
        assert_eq!(*c.resolve::<Port>().unwrap(), Port(2));
        assert_eq!(c.len(), 1);
    }

    #[test]
    fn test_failing_constructor() {
        let c = Container::new();
        c.prototype::<Port, _>(|_| Err(anyhow::anyhow!("no port")));
        let err = c.resolve::<Port>().unwrap_err();
        assert_eq!(err.as_label(), "container_factory");
        assert!(err.to_string().contains("no port"));
    }
}
