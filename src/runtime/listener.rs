//! Lifecycle notifications.

use crate::resource::ResourceId;

/// Observer of resource lifecycle transitions.
///
/// Listeners are registered on the runtime and called synchronously on the
/// thread driving it, after the transition is committed and outside any
/// resolver hook session. A resolve pass reports every resource it
/// committed a wiring for, providers pulled in transitively included; a
/// resource that was already resolved is not reported again. Teardown
/// reports every resource whose wiring was destroyed. All methods default
/// to doing nothing.
pub trait LifecycleListener: Send + Sync + 'static {
    /// A resource entered the store.
    fn resource_installed(&self, _id: ResourceId) {}

    /// A resolve pass committed a wiring for this resource.
    fn resource_resolved(&self, _id: ResourceId) {}

    /// A resource lost its wiring to a refresh or an uninstall cascade.
    fn resource_unresolved(&self, _id: ResourceId) {}

    /// A resource left the store.
    fn resource_uninstalled(&self, _id: ResourceId) {}
}
