//! rpxloader-client - version-negotiating client for the RPX loader module
//!
//! Lets an application ask the separately loaded `homebrew_rpx_loader`
//! provider module to stage or launch a homebrew bundle and to manage
//! content redirection, without linking against the provider. The client
//! acquires the module by its well-known name at runtime, negotiates an
//! API version, selectively resolves exports, and routes every public
//! call through a layered guard chain before forwarding it.
//!
//! # Architecture
//!
//! ```text
//! Application
//!      │
//!      ▼
//! Capability Gateway (RpxLoaderClient)
//!      │  uninitialized? → availability/version? → arguments?
//!      ▼
//! Export Table (capability → resolved callable)
//!      │
//!      ▼
//! Module Host (libloading / in-memory mock)
//!      │
//!      ▼
//! Provider module export
//! ```
//!
//! Mandatory exports (the version query) abort initialization when
//! absent; optional exports degrade to `UnsupportedCommand` on their one
//! capability. The capability set is declarative: registering fewer
//! entries reproduces an older protocol revision.
//!
//! # Example
//!
//! ```no_run
//! use rpxloader_client::{DynamicModuleHost, RpxLoaderClient};
//!
//! let mut client = RpxLoaderClient::new(Box::new(DynamicModuleHost::new()));
//! client.init_library()?;
//! client.launch_homebrew("/apps/test.wuhb")?;
//! # Ok::<(), rpxloader_client::LoaderStatus>(())
//! ```

mod capability;
mod client;
pub mod global;
mod native;
mod provider;
mod status;
mod types;

pub use capability::{Capability, CapabilityDescriptor, CapabilityTable, TableError};
pub use client::{BundleSource, RpxLoaderClient, MODULE_NAME};
pub use native::{DynamicModuleHost, NativeModule, MAX_FORWARD_ARITY};
pub use provider::{AcquireError, ModuleHost, ProviderExport, ProviderModule, ResolveError};
pub use status::{LoaderResult, LoaderStatus, ModuleVersion, MODULE_VERSION_ERROR};
pub use types::{ExportSignature, ExportType, ExportValue};
