//! Safe Rust bindings for the VideoXpert VxSdk native library.
//!
//! The crate covers the two places where VxSdk hands data across the C
//! boundary in non-trivial ways:
//!
//! - **Collections.** Every relationship query (the data sources of a system,
//!   the roles of a user, ...) goes through a capacity probe followed by a
//!   fetch into a buffer of exactly the probed size. See [`collection`].
//! - **Events.** A [`MediaController`] registers native callbacks for
//!   timestamp, stream and PelcoData events and fans them out to Rust handlers.
//!   See [`media`].
//!
//! # Quick Start
//!
//! ```no_run
//! use vxsdk::{load_api_from_env, Filters, LoginOptions, SdkOptions, VxSdk};
//!
//! # fn main() -> Result<(), vxsdk::Error> {
//! // Load the native library named by VXSDK_LIBRARY and start the runtime
//! let sdk = VxSdk::new(load_api_from_env()?, SdkOptions::from_env()?)?;
//!
//! let login = LoginOptions::builder()
//!     .address("10.0.0.5")
//!     .username("admin")
//!     .password("secret")
//!     .build()?;
//! let system = sdk.login(&login)?;
//!
//! for source in system.try_get_data_sources(&Filters::new())? {
//!     println!("Found: {}", source);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! # Core Concepts
//!
//! ## Runtime Management
//!
//! [`VxSdk`] owns a reference to the process-wide native runtime. The runtime
//! is initialized by the first instance and shut down when the last instance,
//! and every object created from it, is gone.
//!
//! ## Ownership
//!
//! Every resource wrapper owns its native handle exclusively. Dropping it, or
//! calling `dispose`, releases the native object; the wrapper cannot be used
//! afterwards. Wrappers are `Send` but not `Sync`.
//!
//! ## Query results
//!
//! Each relationship comes in two forms: `try_get_*` returns a [`Result`], and
//! `get_*` returns an empty list on failure and logs the error.
//!
//! # Logging
//!
//! The crate logs through `tracing`. Native SDK logging is separate and is
//! configured once per process through [`LogConfig`].

#![allow(clippy::must_use_candidate)]
#![allow(clippy::missing_errors_doc)]

// Internal modules
mod error;
mod handle;

// Public modules
pub mod api;
pub mod collection;
pub mod event;
pub mod filter;
pub mod logging;
pub mod media;
pub mod resource;
pub mod runtime;
pub mod sys;
pub mod system;

#[cfg(any(feature = "tokio", feature = "async-std"))]
mod async_runtime;

#[cfg(feature = "async-std")]
pub use async_runtime::async_std;
#[cfg(feature = "tokio")]
pub use async_runtime::tokio;

// Re-exports
pub use {
    api::{default_library_name, load_api, load_api_from_env, VxSdkApi, VxSdkTable},
    collection::CollectionOptions,
    error::*,
    event::{EventBridge, SubscriptionId},
    filter::{FilterKey, Filters, MAX_FILTER_VALUE_LEN},
    logging::{configure_native_logging, native_log_config, LogConfig, LogLevel},
    media::{
        ControllerState, MediaController, PelcoDataEvent, StreamEvent, StreamEventKind,
        TimestampEvent,
    },
    resource::{
        DataSource, Device, Drawing, Marker, Privilege, Resource, ResourceInfo, ResourceKind,
        Role, Tag, User,
    },
    runtime::{SdkOptions, SdkOptionsBuilder, VxSdk},
    system::{LoginOptions, LoginOptionsBuilder, VxSystem},
};

/// Alias for Result with our Error type
pub type Result<T> = std::result::Result<T, crate::error::Error>;
