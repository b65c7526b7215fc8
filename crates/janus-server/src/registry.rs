//! Framework name → adapter constructor.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::adapter::{Adapter, AdapterContext};
use crate::adapters::{auto_backend, axum_backend, hyper_backend};
use crate::adapters::{AutoAdapter, AxumAdapter, HyperAdapter};

/// Builds a fresh adapter for one serving lifetime.
pub type AdapterConstructor = Arc<dyn Fn(AdapterContext) -> Box<dyn Adapter> + Send + Sync>;

/// Open set of adapter constructors, resolved once per switch.
///
/// # Example
///
/// ```rust
/// use janus_server::AdapterRegistry;
///
/// let registry = AdapterRegistry::with_defaults();
/// assert!(registry.contains("hyper"));
/// assert!(!registry.contains("bogus"));
/// ```
#[derive(Clone, Default)]
pub struct AdapterRegistry {
    constructors: BTreeMap<String, AdapterConstructor>,
}

impl AdapterRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry holding the built-in adapters.
    #[must_use]
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry
            .register(hyper_backend::FRAMEWORK, HyperAdapter::boxed)
            .register(auto_backend::FRAMEWORK, AutoAdapter::boxed)
            .register(axum_backend::FRAMEWORK, AxumAdapter::boxed);
        registry
    }

    /// Registers `constructor` under `name`, replacing any previous one.
    pub fn register<F>(&mut self, name: impl Into<String>, constructor: F) -> &mut Self
    where
        F: Fn(AdapterContext) -> Box<dyn Adapter> + Send + Sync + 'static,
    {
        self.constructors.insert(name.into(), Arc::new(constructor));
        self
    }

    /// Returns `true` if `name` is registered.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.constructors.contains_key(name)
    }

    /// Registered names in sorted order.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        self.constructors.keys().cloned().collect()
    }

    /// Constructs the adapter registered under `ctx.framework()`.
    #[must_use]
    pub fn create(&self, ctx: AdapterContext) -> Option<Box<dyn Adapter>> {
        self.constructors
            .get(ctx.framework())
            .map(|constructor| constructor(ctx))
    }
}

impl fmt::Debug for AdapterRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AdapterRegistry")
            .field("frameworks", &self.names())
            .finish()
    }
}
