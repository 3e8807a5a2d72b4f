//! Application store and per-request scope chain
//!
//! Every [`App`](crate::App) owns one [`AppStore`]. Bootstrap code writes
//! environments, processor chains, named routes and free-form values into
//! it; request handling only reads. The [`ScopeChain`] is the view a request
//! gets of all stores along its routing path.

use dashmap::DashMap;
use minijinja::Value;
use std::borrow::Cow;
use std::fmt;
use std::sync::{Arc, Weak};

use crate::environment::Environment;
use crate::processors::ProcessorChain;

/// Key naming a slot in the application store
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AppKey(Cow<'static, str>);

impl AppKey {
    /// Default slot for the template environment
    pub const ENVIRONMENT: AppKey = AppKey(Cow::Borrowed("axum_jinja_environment"));

    /// Default slot for the context-processor chain
    pub const CONTEXT_PROCESSORS: AppKey =
        AppKey(Cow::Borrowed("axum_jinja_context_processors"));

    /// Create a key from a static name
    pub const fn from_static(name: &'static str) -> Self {
        Self(Cow::Borrowed(name))
    }

    /// Create a key from any string
    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self(name.into())
    }

    /// The key name
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for AppKey {
    fn default() -> Self {
        Self::ENVIRONMENT
    }
}

impl fmt::Display for AppKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&'static str> for AppKey {
    fn from(name: &'static str) -> Self {
        Self::from_static(name)
    }
}

impl From<String> for AppKey {
    fn from(name: String) -> Self {
        Self::new(name)
    }
}

#[derive(Default)]
struct StoreInner {
    environments: DashMap<AppKey, Environment>,
    processors: DashMap<AppKey, ProcessorChain>,
    values: DashMap<String, Value>,
    routes: DashMap<String, String>,
}

/// Shared registry owned by one application
#[derive(Clone, Default)]
pub struct AppStore {
    inner: Arc<StoreInner>,
}

impl AppStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Install an environment, replacing any previous one under `key`
    pub fn insert_environment(&self, key: AppKey, environment: Environment) {
        self.inner.environments.insert(key, environment);
    }

    /// Environment stored under `key`
    pub fn environment(&self, key: &AppKey) -> Option<Environment> {
        self.inner.environments.get(key).map(|env| env.clone())
    }

    /// Install a processor chain, replacing any previous one under `key`
    pub fn insert_processors(&self, key: AppKey, chain: ProcessorChain) {
        self.inner.processors.insert(key, chain);
    }

    /// Processor chain stored under `key`
    pub fn processors(&self, key: &AppKey) -> Option<ProcessorChain> {
        self.inner.processors.get(key).map(|chain| chain.clone())
    }

    /// Set an application value
    pub fn insert_value(&self, name: impl Into<String>, value: impl Into<Value>) {
        self.inner.values.insert(name.into(), value.into());
    }

    /// Application value by name
    pub fn value(&self, name: &str) -> Option<Value> {
        self.inner.values.get(name).map(|value| value.clone())
    }

    /// Names of all application values, sorted
    pub fn value_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .inner
            .values
            .iter()
            .map(|entry| entry.key().clone())
            .collect();
        names.sort();
        names
    }

    /// Register a named route pattern
    pub fn insert_route(&self, name: impl Into<String>, pattern: impl Into<String>) {
        self.inner.routes.insert(name.into(), pattern.into());
    }

    /// Route pattern registered under `name`
    pub fn route(&self, name: &str) -> Option<String> {
        self.inner.routes.get(name).map(|pattern| pattern.clone())
    }

    /// Prepend `prefix` to every registered route pattern
    pub(crate) fn prefix_routes(&self, prefix: &str) {
        for mut entry in self.inner.routes.iter_mut() {
            let prefixed = format!("{}{}", prefix, entry.value());
            *entry.value_mut() = prefixed;
        }
    }

    pub(crate) fn downgrade(&self) -> WeakStore {
        WeakStore(Arc::downgrade(&self.inner))
    }

    /// Whether both handles point at the same store
    pub fn ptr_eq(&self, other: &AppStore) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for AppStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppStore")
            .field("environments", &self.inner.environments.len())
            .field("processors", &self.inner.processors.len())
            .field("values", &self.value_names())
            .field("routes", &self.inner.routes.len())
            .finish()
    }
}

/// Non-owning store handle held by template globals
///
/// The environment lives inside the store, so a strong handle from the
/// engine back to the store would never be freed.
#[derive(Clone)]
pub(crate) struct WeakStore(Weak<StoreInner>);

impl WeakStore {
    pub(crate) fn upgrade(&self) -> Option<AppStore> {
        self.0.upgrade().map(|inner| AppStore { inner })
    }
}

impl fmt::Debug for WeakStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("WeakStore")
    }
}

/// Stores of every application a request passed through, root first
///
/// Installed as a request extension by the scope layer. Lookups walk from the
/// nearest application outward.
#[derive(Debug, Clone, Default)]
pub struct ScopeChain(Arc<Vec<AppStore>>);

impl ScopeChain {
    /// Chain with `store` appended as the nearest scope
    pub fn push(&self, store: AppStore) -> Self {
        let mut stores = Vec::with_capacity(self.0.len() + 1);
        stores.extend(self.0.iter().cloned());
        stores.push(store);
        Self(Arc::new(stores))
    }

    /// Innermost store
    pub fn nearest(&self) -> Option<&AppStore> {
        self.0.last()
    }

    /// Stores from nearest to root
    pub fn iter(&self) -> impl Iterator<Item = &AppStore> {
        self.0.iter().rev()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Nearest environment under `key`
    pub fn environment(&self, key: &AppKey) -> Option<Environment> {
        self.iter().find_map(|store| store.environment(key))
    }

    /// Nearest processor chain under `key`
    pub fn processors(&self, key: &AppKey) -> Option<ProcessorChain> {
        self.iter().find_map(|store| store.processors(key))
    }

    /// Nearest application value named `name`
    pub fn value(&self, name: &str) -> Option<Value> {
        self.iter().find_map(|store| store.value(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_keys() {
        assert_eq!(AppKey::default(), AppKey::ENVIRONMENT);
        assert_eq!(AppKey::ENVIRONMENT.as_str(), "axum_jinja_environment");
        assert_eq!(
            AppKey::CONTEXT_PROCESSORS.to_string(),
            "axum_jinja_context_processors"
        );
        assert_eq!(AppKey::from("custom"), AppKey::new(String::from("custom")));
    }

    #[test]
    fn test_values_last_write_wins() {
        let store = AppStore::new();
        store.insert_value("site", "one");
        store.insert_value("site", "two");
        assert_eq!(store.value("site"), Some(Value::from("two")));
        assert_eq!(store.value_names(), vec!["site".to_string()]);
        assert!(store.value("missing").is_none());
    }

    #[test]
    fn test_prefix_routes() {
        let store = AppStore::new();
        store.insert_route("user", "/users/{id}");
        store.prefix_routes("/admin");
        assert_eq!(store.route("user").as_deref(), Some("/admin/users/{id}"));
    }

    #[test]
    fn test_scope_chain_nearest_wins() {
        let root = AppStore::new();
        root.insert_value("title", "root");
        root.insert_value("only_root", true);
        let child = AppStore::new();
        child.insert_value("title", "child");

        let chain = ScopeChain::default().push(root.clone()).push(child.clone());

        assert_eq!(chain.len(), 2);
        assert!(chain.nearest().is_some_and(|s| s.ptr_eq(&child)));
        assert_eq!(chain.value("title"), Some(Value::from("child")));
        assert_eq!(chain.value("only_root"), Some(Value::from(true)));
    }

    #[test]
    fn test_weak_store_does_not_keep_store_alive() {
        let store = AppStore::new();
        let weak = store.downgrade();
        assert!(weak.upgrade().is_some());
        drop(store);
        assert!(weak.upgrade().is_none());
    }
}
