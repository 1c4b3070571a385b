//! VxSdk runtime management and initialization.

use once_cell::sync::Lazy;

use std::{
    ffi::{CStr, CString},
    fmt,
    ptr,
    sync::{Arc, Condvar, Mutex, PoisonError},
};

use tracing::{debug, info};

use crate::{
    api::VxSdkApi,
    collection::CollectionOptions,
    logging::{self, LogConfig, LogLevel},
    system::{LoginOptions, VxSystem},
    Error, Result,
};

/// Environment variables read by [`SdkOptions::from_env`].
pub const LICENSE_KEY_ENV: &str = "VXSDK_LICENSE_KEY";
pub const LOG_LEVEL_ENV: &str = "VXSDK_LOG_LEVEL";
pub const LOG_DIR_ENV: &str = "VXSDK_LOG_DIR";

/// State of the VxSdk runtime lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    /// Runtime has not been initialized yet.
    Uninitialized,
    /// Runtime is currently being initialized by another thread.
    Initializing,
    /// Runtime is initialized and active with the given reference count.
    Initialized { refcount: usize },
    /// Runtime is currently being destroyed.
    Destroying,
}

/// Process-global runtime manager for the native SDK.
struct RuntimeManager {
    state: Mutex<State>,
    cv: Condvar,
}

impl RuntimeManager {
    const fn new() -> Self {
        Self {
            state: Mutex::new(State::Uninitialized),
            cv: Condvar::new(),
        }
    }

    fn acquire(&self, api: &VxSdkApi, license_key: Option<&CStr>) -> Result<()> {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);

        loop {
            match *state {
                State::Uninitialized => {
                    // We'll be the initializer
                    *state = State::Initializing;
                    drop(state); // Release lock before calling FFI

                    let key_ptr = license_key.map_or(ptr::null(), CStr::as_ptr);
                    let init_result = Error::check("VxInit", unsafe { api.init(key_ptr) });

                    state = self.state.lock().unwrap_or_else(PoisonError::into_inner);

                    match init_result {
                        Ok(()) => {
                            *state = State::Initialized { refcount: 1 };
                            self.cv.notify_all();
                            info!("VxSdk runtime initialized");
                            return Ok(());
                        }
                        Err(err) => {
                            *state = State::Uninitialized;
                            self.cv.notify_all();
                            return Err(Error::InitializationFailed(err.to_string()));
                        }
                    }
                }
                State::Initializing | State::Destroying => {
                    state = self.cv.wait(state).unwrap_or_else(PoisonError::into_inner);
                }
                State::Initialized { refcount } => {
                    *state = State::Initialized {
                        refcount: refcount + 1,
                    };
                    return Ok(());
                }
            }
        }
    }

    fn release(&self, api: &VxSdkApi) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);

        match *state {
            State::Initialized { refcount } => {
                if refcount == 1 {
                    // We're the last reference, shut the runtime down
                    *state = State::Destroying;
                    drop(state);

                    unsafe { api.shutdown() };

                    state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
                    *state = State::Uninitialized;
                    self.cv.notify_all();
                    info!("VxSdk runtime shut down");
                } else {
                    *state = State::Initialized {
                        refcount: refcount - 1,
                    };
                }
            }
            _ => {
                // This should never happen in correct usage
                #[cfg(debug_assertions)]
                panic!("release() called in invalid state: {:?}", *state);
            }
        }
    }

    fn is_running(&self) -> bool {
        let state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        matches!(*state, State::Initialized { .. })
    }
}

static RUNTIME: Lazy<RuntimeManager> = Lazy::new(RuntimeManager::new);

/// Settings applied when the runtime is acquired.
#[derive(Clone, Default)]
pub struct SdkOptions {
    /// License key passed to `VxInit`. `None` runs unlicensed.
    pub license_key: Option<String>,
    /// Native log settings, applied once per process.
    pub log: Option<LogConfig>,
    pub collection: CollectionOptions,
}

impl fmt::Debug for SdkOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SdkOptions")
            .field("license_key", &self.license_key.as_ref().map(|_| "<redacted>"))
            .field("log", &self.log)
            .field("collection", &self.collection)
            .finish()
    }
}

impl SdkOptions {
    /// Create a builder for configuring SDK options
    pub fn builder() -> SdkOptionsBuilder {
        SdkOptionsBuilder::new()
    }

    /// Reads `VXSDK_LICENSE_KEY`, `VXSDK_LOG_LEVEL` and `VXSDK_LOG_DIR`.
    ///
    /// Unset variables keep their defaults.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfiguration`] if `VXSDK_LOG_LEVEL` is not a
    /// known level.
    pub fn from_env() -> Result<Self> {
        let mut builder = SdkOptionsBuilder::new();
        if let Ok(key) = std::env::var(LICENSE_KEY_ENV) {
            builder = builder.license_key(key);
        }

        let level = std::env::var(LOG_LEVEL_ENV)
            .ok()
            .map(|level| level.parse::<LogLevel>())
            .transpose()?;
        let directory = std::env::var_os(LOG_DIR_ENV);
        if level.is_some() || directory.is_some() {
            let mut log = LogConfig::new(level.unwrap_or(LogLevel::Info));
            if let Some(directory) = directory {
                log = log.directory(directory);
            }
            builder = builder.log(log);
        }

        builder.build()
    }
}

/// Builder for configuring [`SdkOptions`] with ergonomic method chaining
#[derive(Debug, Clone, Default)]
pub struct SdkOptionsBuilder {
    license_key: Option<String>,
    log: Option<LogConfig>,
    resize_retries: Option<u32>,
}

impl SdkOptionsBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the license key passed to the native runtime
    #[must_use]
    pub fn license_key<S: Into<String>>(mut self, key: S) -> Self {
        self.license_key = Some(key.into());
        self
    }

    /// Configure native logging for the process
    #[must_use]
    pub fn log(mut self, log: LogConfig) -> Self {
        self.log = Some(log);
        self
    }

    /// How many times a collection fetch is retried when the collection grows
    /// between the capacity probe and the fetch
    #[must_use]
    pub fn resize_retries(mut self, retries: u32) -> Self {
        self.resize_retries = Some(retries);
        self
    }

    /// Build the `SdkOptions`
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The license key is empty or contains a null byte
    /// - `resize_retries` exceeds [`CollectionOptions::MAX_RESIZE_RETRIES`]
    pub fn build(self) -> Result<SdkOptions> {
        if let Some(key) = &self.license_key {
            if key.trim().is_empty() {
                return Err(Error::InvalidConfiguration(
                    "License key cannot be empty or contain only whitespace".into(),
                ));
            }
            if key.contains('\0') {
                return Err(Error::InvalidConfiguration(
                    "License key cannot contain null bytes".into(),
                ));
            }
        }

        let mut collection = CollectionOptions::default();
        if let Some(retries) = self.resize_retries {
            collection = CollectionOptions::new(retries)?;
        }

        Ok(SdkOptions {
            license_key: self.license_key,
            log: self.log,
            collection,
        })
    }
}

/// Shared runtime state kept alive by every object created from a [`VxSdk`].
pub(crate) struct SdkInner {
    pub(crate) api: Arc<VxSdkApi>,
    pub(crate) options: SdkOptions,
}

impl Drop for SdkInner {
    fn drop(&mut self) {
        RUNTIME.release(&self.api);
    }
}

/// Manages the VxSdk runtime lifecycle.
///
/// `VxSdk` is the entry point for all operations. Several instances can exist
/// at once; they share the same native runtime through reference counting, and
/// the runtime is shut down when the last instance and the last object created
/// from it are dropped.
///
/// # Examples
///
/// ```no_run
/// use vxsdk::{load_api, SdkOptions, VxSdk};
///
/// # fn main() -> Result<(), vxsdk::Error> {
/// let api = load_api("libVxSdk.so")?;
/// let sdk = VxSdk::new(api, SdkOptions::builder().license_key("XXXX").build()?)?;
/// println!("VxSdk {}", sdk.version()?);
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct VxSdk {
    pub(crate) inner: Arc<SdkInner>,
}

impl fmt::Debug for VxSdk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VxSdk")
            .field("api", &self.inner.api)
            .field("options", &self.inner.options)
            .finish()
    }
}

impl VxSdk {
    /// Applies the log configuration (if any) and acquires the native runtime.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InitializationFailed`] if `VxInit` fails, or a logging
    /// error if the log configuration cannot be applied.
    pub fn new(api: Arc<VxSdkApi>, options: SdkOptions) -> Result<Self> {
        if let Some(log) = &options.log {
            logging::configure_native_logging(&api, log)?;
        }

        let license_key = options.license_key.as_deref().map(CString::new).transpose()?;
        RUNTIME.acquire(&api, license_key.as_deref())?;
        debug!(options = ?options, "VxSdk runtime acquired");

        Ok(Self {
            inner: Arc::new(SdkInner { api, options }),
        })
    }

    /// Returns the version string of the native library.
    ///
    /// # Errors
    ///
    /// Returns an error if the version pointer is null or not UTF-8.
    pub fn version(&self) -> Result<String> {
        unsafe {
            let version_ptr = self.inner.api.version();
            if version_ptr.is_null() {
                return Err(Error::NullPointer("VxVersion".into()));
            }
            CStr::from_ptr(version_ptr)
                .to_str()
                .map(|s| s.to_owned())
                .map_err(|e| Error::InvalidUtf8(e.to_string()))
        }
    }

    /// Checks if the native runtime is currently initialized.
    pub fn is_running() -> bool {
        RUNTIME.is_running()
    }

    /// Logs into a VideoXpert system.
    pub fn login(&self, options: &LoginOptions) -> Result<VxSystem> {
        VxSystem::login(self, options)
    }

    pub fn options(&self) -> &SdkOptions {
        &self.inner.options
    }
}
