//! # Binder / resolver capability.
//!
//! The runtime never constructs components itself: it consumes an opaque capability
//! that can **bind** constructors/values by type and later **resolve** instances.
//!
//! - [`Binder`]: object-safe binding surface handed to [`Provider::register`](crate::Provider::register).
//! - [`Resolver`]: binder plus resolution; handed to boot hooks, daemons, services and jobs.
//! - [`BinderExt`] / [`ResolverExt`]: typed helpers over the object-safe core.
//! - [`Container`]: the default in-memory implementation, keyed by [`TypeId`].
//!
//! Plug in another container by implementing [`Resolver`] and passing it to
//! [`AppBuilder::with_resolver`](crate::AppBuilder::with_resolver).
//!
//! ## Example
//! ```rust
//! use std::sync::Arc;
//! use appvisor::{BinderExt, Container, ResolverExt};
//!
//! struct Greeting(String);
//!
//! let c = Container::new();
//! c.bind_value(Greeting("hello".into()));
//! c.prototype(|r| Ok(r.resolve::<Greeting>()?.0.len()));
//!
//! assert_eq!(*c.resolve::<usize>().unwrap(), 5);
//! ```

mod flags;
mod typemap;

use std::any::{Any, TypeId, type_name};
use std::sync::Arc;

use crate::error::ContainerError;

pub use flags::{FlagContext, MapFlags};
pub use typemap::Container;

/// Type-erased shared value stored in a resolver.
pub type AnyArc = Arc<dyn Any + Send + Sync>;

/// Type-erased constructor invoked with the resolver so it can pull its own dependencies.
pub type AnyFactory = Arc<dyn Fn(&dyn Resolver) -> anyhow::Result<AnyArc> + Send + Sync>;

/// Identity of a bound type.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TypeKey {
    /// Rust type identity.
    pub id: TypeId,
    /// Type name, for diagnostics.
    pub name: &'static str,
}

impl TypeKey {
    /// Key for `T`.
    pub fn of<T: Any>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: type_name::<T>(),
        }
    }
}

/// How often a bound constructor runs.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Lifetime {
    /// Constructed once, on first resolution, then shared.
    Singleton,
    /// Constructed on every resolution.
    Prototype,
}

/// Object-safe binding surface.
///
/// A later binding for the same type replaces the earlier one.
pub trait Binder: Send + Sync {
    /// Binds an already constructed value.
    fn bind_any(&self, key: TypeKey, value: AnyArc);

    /// Binds a constructor with the given lifetime.
    fn bind_factory(&self, key: TypeKey, lifetime: Lifetime, factory: AnyFactory);

    /// Returns true when something is bound for `key`.
    fn has(&self, key: TypeKey) -> bool;
}

/// Binder plus resolution.
pub trait Resolver: Binder {
    /// Produces the instance bound for `key`.
    fn resolve_any(&self, key: TypeKey) -> Result<AnyArc, ContainerError>;

    /// Upcast helper used where only the binding surface is needed.
    fn as_binder(&self) -> &dyn Binder;
}

/// Typed helpers for every [`Binder`].
pub trait BinderExt: Binder {
    /// Binds a value of type `T`.
    fn bind_value<T: Any + Send + Sync>(&self, value: T) {
        self.bind_any(TypeKey::of::<T>(), Arc::new(value));
    }

    /// Binds a lazily constructed, shared instance of `T`.
    fn singleton<T, F>(&self, factory: F)
    where
        T: Any + Send + Sync,
        F: Fn(&dyn Resolver) -> anyhow::Result<T> + Send + Sync + 'static,
    {
        self.bind_factory(TypeKey::of::<T>(), Lifetime::Singleton, erase(factory));
    }

    /// Binds a constructor producing a fresh `T` on every resolution.
    fn prototype<T, F>(&self, factory: F)
    where
        T: Any + Send + Sync,
        F: Fn(&dyn Resolver) -> anyhow::Result<T> + Send + Sync + 'static,
    {
        self.bind_factory(TypeKey::of::<T>(), Lifetime::Prototype, erase(factory));
    }
}

impl<B: Binder + ?Sized> BinderExt for B {}

/// Typed helpers for every [`Resolver`].
pub trait ResolverExt: Resolver {
    /// Resolves the instance bound for `T`.
    fn resolve<T: Any + Send + Sync>(&self) -> Result<Arc<T>, ContainerError> {
        let key = TypeKey::of::<T>();
        self.resolve_any(key)?
            .downcast::<T>()
            .map_err(|_| ContainerError::TypeMismatch {
                type_name: key.name,
            })
    }

    /// Resolves `T` and clones it out of its shared slot.
    ///
    /// Convenient for handles that are themselves shared pointers, e.g.
    /// `resolve_cloned::<Arc<dyn Graceful>>()`.
    fn resolve_cloned<T: Any + Send + Sync + Clone>(&self) -> Result<T, ContainerError> {
        self.resolve::<T>().map(|v| (*v).clone())
    }
}

impl<R: Resolver + ?Sized> ResolverExt for R {}

fn erase<T, F>(factory: F) -> AnyFactory
where
    T: Any + Send + Sync,
    F: Fn(&dyn Resolver) -> anyhow::Result<T> + Send + Sync + 'static,
{
    Arc::new(move |r: &dyn Resolver| factory(r).map(|v| Arc::new(v) as AnyArc))
}
