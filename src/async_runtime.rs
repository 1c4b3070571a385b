//! Async runtime integration for Tokio and async-std.
//!
//! Collection queries block the calling thread until the native SDK answers,
//! so these wrappers run them on the runtime's blocking pool with
//! `spawn_blocking`.
//!
//! A [`VxSystem`] is not `Sync`, so the async wrapper serializes access with a
//! mutex: concurrent queries on one system run one after the other.
//!
//! # Features
//!
//! - `tokio` - Enable Tokio runtime support
//! - `async-std` - Enable async-std runtime support
//!
//! # Example with Tokio
//!
//! ```no_run
//! # #[cfg(feature = "tokio")]
//! # {
//! use vxsdk::{load_api_from_env, Filters, LoginOptions, SdkOptions, VxSdk, tokio::AsyncSystem};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), vxsdk::Error> {
//!     let sdk = VxSdk::new(load_api_from_env()?, SdkOptions::from_env()?)?;
//!     let login = LoginOptions::builder()
//!         .address("10.0.0.5")
//!         .username("admin")
//!         .password("secret")
//!         .build()?;
//!
//!     let system = AsyncSystem::new(sdk.login(&login)?);
//!     for source in system.data_sources(Filters::new()).await? {
//!         println!("{source}");
//!     }
//!     Ok(())
//! }
//! # }
//! ```

use std::sync::{Arc, Mutex, PoisonError};

use crate::{DataSource, Device, Filters, Result, Role, Tag, User, VxSystem};

fn with_system<T>(system: &Mutex<VxSystem>, f: impl FnOnce(&VxSystem) -> T) -> T {
    let guard = system.lock().unwrap_or_else(PoisonError::into_inner);
    f(&guard)
}

#[cfg(feature = "tokio")]
pub mod tokio {
    //! Tokio async runtime integration.
    //!
    //! Provides `AsyncSystem` wrapper that uses `tokio::task::spawn_blocking`
    //! to run collection queries without blocking the Tokio runtime.

    use super::*;

    /// Async system wrapper for Tokio runtime.
    ///
    /// Cloning is cheap; clones share the same logged-in system.
    #[derive(Clone)]
    pub struct AsyncSystem {
        inner: Arc<Mutex<VxSystem>>,
    }

    impl AsyncSystem {
        pub fn new(system: VxSystem) -> Self {
            Self {
                inner: Arc::new(Mutex::new(system)),
            }
        }

        /// Runs `f` against the system on Tokio's blocking pool.
        pub async fn run<T, F>(&self, f: F) -> T
        where
            F: FnOnce(&VxSystem) -> T + Send + 'static,
            T: Send + 'static,
        {
            let system = Arc::clone(&self.inner);
            ::tokio::task::spawn_blocking(move || with_system(&system, f))
                .await
                .expect("Blocking task panicked")
        }

        /// Async version of `VxSystem::try_get_data_sources`.
        pub async fn data_sources(&self, filters: Filters) -> Result<Vec<DataSource>> {
            self.run(move |system| system.try_get_data_sources(&filters)).await
        }

        pub async fn devices(&self, filters: Filters) -> Result<Vec<Device>> {
            self.run(move |system| system.try_get_devices(&filters)).await
        }

        pub async fn users(&self, filters: Filters) -> Result<Vec<User>> {
            self.run(move |system| system.try_get_users(&filters)).await
        }

        pub async fn roles(&self, filters: Filters) -> Result<Vec<Role>> {
            self.run(move |system| system.try_get_roles(&filters)).await
        }

        pub async fn tags(&self, filters: Filters) -> Result<Vec<Tag>> {
            self.run(move |system| system.try_get_tags(&filters)).await
        }
    }
}

#[cfg(feature = "async-std")]
pub mod async_std {
    //! async-std runtime integration.
    //!
    //! Provides `AsyncSystem` wrapper that uses `async_std::task::spawn_blocking`
    //! to run collection queries without blocking the executor.

    use super::*;

    /// Async system wrapper for async-std runtime.
    #[derive(Clone)]
    pub struct AsyncSystem {
        inner: Arc<Mutex<VxSystem>>,
    }

    impl AsyncSystem {
        pub fn new(system: VxSystem) -> Self {
            Self {
                inner: Arc::new(Mutex::new(system)),
            }
        }

        /// Runs `f` against the system on async-std's blocking pool.
        pub async fn run<T, F>(&self, f: F) -> T
        where
            F: FnOnce(&VxSystem) -> T + Send + 'static,
            T: Send + 'static,
        {
            let system = Arc::clone(&self.inner);
            ::async_std::task::spawn_blocking(move || with_system(&system, f)).await
        }

        pub async fn data_sources(&self, filters: Filters) -> Result<Vec<DataSource>> {
            self.run(move |system| system.try_get_data_sources(&filters)).await
        }

        pub async fn devices(&self, filters: Filters) -> Result<Vec<Device>> {
            self.run(move |system| system.try_get_devices(&filters)).await
        }

        pub async fn users(&self, filters: Filters) -> Result<Vec<User>> {
            self.run(move |system| system.try_get_users(&filters)).await
        }

        pub async fn roles(&self, filters: Filters) -> Result<Vec<Role>> {
            self.run(move |system| system.try_get_roles(&filters)).await
        }

        pub async fn tags(&self, filters: Filters) -> Result<Vec<Tag>> {
            self.run(move |system| system.try_get_tags(&filters)).await
        }
    }
}
