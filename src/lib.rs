//! # patchbay
//!
//! A capability-based dependency resolution engine for modular component
//! runtimes. Resources declare typed capabilities and requirements;
//! requirements carry attribute filters; the resolver connects them with
//! wires and maintains the resulting wirings across installs, refreshes
//! and uninstalls.
//!
//! The [`runtime::Runtime`] facade is the main entry point:
//!
//! ```
//! use patchbay::resource::Resource;
//! use patchbay::runtime::Runtime;
//! use semver::Version;
//!
//! let mut runtime = Runtime::new();
//! let lib = runtime.install(
//!     Resource::builder()
//!         .identity("lib", Version::new(1, 0, 0))
//!         .package_export("lib.api", Version::new(1, 0, 0))
//!         .build(),
//! );
//! let app = runtime.install(
//!     Resource::builder()
//!         .identity("app", Version::new(1, 0, 0))
//!         .package_import("lib.api")
//!         .build(),
//! );
//! let outcome = runtime.resolve(&[app]).unwrap();
//! assert!(outcome.satisfied());
//! assert!(runtime.wiring(lib).is_some());
//! ```

pub mod filter;
pub mod hooks;
pub mod registry;
pub mod resolver;
pub mod resource;
pub mod runtime;
pub mod wiring;

pub use filter::Filter;
pub use hooks::{HookError, ResolverHook, ResolverHookSource};
pub use registry::CapabilityRegistry;
pub use resolver::{BatchOutcome, ResolveError, UnresolvedReport};
pub use resource::{Capability, Requirement, Resource, ResourceId};
pub use runtime::{LifecycleListener, ResourceState, Runtime, RuntimeConfig, Snapshot};
pub use wiring::{Wire, Wiring};

/// Crate version, also reported in snapshots.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
