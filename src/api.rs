//! Function table for the VxSdk native library.
//!
//! The native library is loaded at runtime with `libloading`, so the crate
//! builds without the SDK installed. Every entry point is resolved up front;
//! a missing symbol fails [`VxSdkApi::load`] instead of a later call.

use std::{
    ffi::{OsStr, OsString},
    fmt,
    os::raw::{c_char, c_int, c_void},
    sync::Arc,
};

use libloading::Library;
use tracing::debug;

use crate::{sys, Result};

/// Environment variable naming the native library to load.
pub const LIBRARY_ENV: &str = "VXSDK_LIBRARY";

/// One entry per exported native function.
///
/// Fields are public so that callers which link the SDK statically, or test
/// doubles, can assemble a table themselves and pass it to
/// [`VxSdkApi::from_table`].
#[derive(Clone, Copy)]
pub struct VxSdkTable {
    pub init: sys::VxInitFn,
    pub shutdown: sys::VxShutdownFn,
    pub version: sys::VxVersionFn,
    pub set_log_level: sys::VxSetLogLevelFn,
    pub set_log_path: sys::VxSetLogPathFn,
    pub submit_login: sys::VxSubmitLoginFn,
    pub get_collection: sys::VxGetCollectionFn,
    pub get_resource_info: sys::VxGetResourceInfoFn,
    pub release: sys::VxReleaseFn,
    pub media_create: sys::VxMediaCreateFn,
    pub media_release: sys::VxMediaReleaseFn,
    pub media_play: sys::VxMediaPlayFn,
    pub media_pause: sys::VxMediaPauseFn,
    pub media_stop: sys::VxMediaStopFn,
    pub media_seek: sys::VxMediaSeekFn,
    pub media_set_timestamp_callback: sys::VxMediaSetTimestampCallbackFn,
    pub media_set_stream_callback: sys::VxMediaSetStreamCallbackFn,
    pub media_set_pelco_data_callback: sys::VxMediaSetPelcoDataCallbackFn,
}

/// A resolved VxSdk function table.
///
/// When created through [`VxSdkApi::load`] the shared library stays loaded for
/// as long as the table exists.
pub struct VxSdkApi {
    table: VxSdkTable,
    _library: Option<Library>,
}

impl fmt::Debug for VxSdkApi {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VxSdkApi")
            .field("dynamic", &self._library.is_some())
            .finish()
    }
}

fn symbol<T: Copy>(library: &Library, name: &[u8]) -> Result<T> {
    // SAFETY: every `T` used below is the exact C signature of the exported symbol.
    let symbol = unsafe { library.get::<T>(name)? };
    Ok(*symbol)
}

impl VxSdkApi {
    /// Loads the native library at `path` and resolves every entry point.
    ///
    /// # Errors
    ///
    /// Returns [`Error::LibLoading`](crate::Error::LibLoading) if the library
    /// cannot be opened or any symbol is missing.
    pub fn load<P: AsRef<OsStr>>(path: P) -> Result<Self> {
        // SAFETY: loading runs the library's initializers; the VxSdk library has
        // no load-time requirements beyond being on the search path.
        let library = unsafe { Library::new(path.as_ref())? };

        let table = VxSdkTable {
            init: symbol(&library, b"VxInit\0")?,
            shutdown: symbol(&library, b"VxShutdown\0")?,
            version: symbol(&library, b"VxVersion\0")?,
            set_log_level: symbol(&library, b"VxSetLogLevel\0")?,
            set_log_path: symbol(&library, b"VxSetLogPath\0")?,
            submit_login: symbol(&library, b"VxSubmitLogin\0")?,
            get_collection: symbol(&library, b"VxGetCollection\0")?,
            get_resource_info: symbol(&library, b"VxGetResourceInfo\0")?,
            release: symbol(&library, b"VxRelease\0")?,
            media_create: symbol(&library, b"VxMediaCreate\0")?,
            media_release: symbol(&library, b"VxMediaRelease\0")?,
            media_play: symbol(&library, b"VxMediaPlay\0")?,
            media_pause: symbol(&library, b"VxMediaPause\0")?,
            media_stop: symbol(&library, b"VxMediaStop\0")?,
            media_seek: symbol(&library, b"VxMediaSeek\0")?,
            media_set_timestamp_callback: symbol(&library, b"VxMediaSetTimestampCallback\0")?,
            media_set_stream_callback: symbol(&library, b"VxMediaSetStreamCallback\0")?,
            media_set_pelco_data_callback: symbol(&library, b"VxMediaSetPelcoDataCallback\0")?,
        };

        debug!(path = ?path.as_ref(), "loaded VxSdk library");
        Ok(Self {
            table,
            _library: Some(library),
        })
    }

    /// Builds an API from an already resolved function table.
    ///
    /// # Safety
    ///
    /// Every function in `table` must implement the VxSdk C contract for its
    /// entry point, and must stay callable for the lifetime of the returned
    /// value and of every object created through it.
    pub unsafe fn from_table(table: VxSdkTable) -> Self {
        Self {
            table,
            _library: None,
        }
    }

    pub(crate) unsafe fn init(&self, license_key: *const c_char) -> sys::VxResult {
        (self.table.init)(license_key)
    }

    pub(crate) unsafe fn shutdown(&self) {
        (self.table.shutdown)()
    }

    pub(crate) unsafe fn version(&self) -> *const c_char {
        (self.table.version)()
    }

    pub(crate) unsafe fn set_log_level(&self, level: c_int) -> sys::VxResult {
        (self.table.set_log_level)(level)
    }

    pub(crate) unsafe fn set_log_path(&self, path: *const c_char) -> sys::VxResult {
        (self.table.set_log_path)(path)
    }

    pub(crate) unsafe fn submit_login(
        &self,
        info: *const sys::VxLoginInfo,
        system: *mut sys::VxHandle,
    ) -> sys::VxResult {
        (self.table.submit_login)(info, system)
    }

    pub(crate) unsafe fn get_collection(
        &self,
        parent: sys::VxHandle,
        relation: c_int,
        collection: *mut sys::VxCollection,
    ) -> sys::VxResult {
        (self.table.get_collection)(parent, relation, collection)
    }

    pub(crate) unsafe fn get_resource_info(
        &self,
        handle: sys::VxHandle,
        resource_type: c_int,
        info: *mut sys::VxResourceInfo,
    ) -> sys::VxResult {
        (self.table.get_resource_info)(handle, resource_type, info)
    }

    pub(crate) unsafe fn release(
        &self,
        handle: sys::VxHandle,
        resource_type: c_int,
    ) -> sys::VxResult {
        (self.table.release)(handle, resource_type)
    }

    pub(crate) unsafe fn media_create(
        &self,
        data_source: sys::VxHandle,
        controller: *mut sys::VxHandle,
    ) -> sys::VxResult {
        (self.table.media_create)(data_source, controller)
    }

    pub(crate) unsafe fn media_release(&self, controller: sys::VxHandle) -> sys::VxResult {
        (self.table.media_release)(controller)
    }

    pub(crate) unsafe fn media_play(&self, controller: sys::VxHandle, speed: f32) -> sys::VxResult {
        (self.table.media_play)(controller, speed)
    }

    pub(crate) unsafe fn media_pause(&self, controller: sys::VxHandle) -> sys::VxResult {
        (self.table.media_pause)(controller)
    }

    pub(crate) unsafe fn media_stop(&self, controller: sys::VxHandle) -> sys::VxResult {
        (self.table.media_stop)(controller)
    }

    pub(crate) unsafe fn media_seek(
        &self,
        controller: sys::VxHandle,
        unix_time_ms: u64,
        speed: f32,
    ) -> sys::VxResult {
        (self.table.media_seek)(controller, unix_time_ms, speed)
    }

    pub(crate) unsafe fn media_set_timestamp_callback(
        &self,
        controller: sys::VxHandle,
        callback: Option<sys::VxTimestampCallback>,
        user_data: *mut c_void,
    ) -> sys::VxResult {
        (self.table.media_set_timestamp_callback)(controller, callback, user_data)
    }

    pub(crate) unsafe fn media_set_stream_callback(
        &self,
        controller: sys::VxHandle,
        callback: Option<sys::VxStreamCallback>,
        user_data: *mut c_void,
    ) -> sys::VxResult {
        (self.table.media_set_stream_callback)(controller, callback, user_data)
    }

    pub(crate) unsafe fn media_set_pelco_data_callback(
        &self,
        controller: sys::VxHandle,
        callback: Option<sys::VxPelcoDataCallback>,
        user_data: *mut c_void,
    ) -> sys::VxResult {
        (self.table.media_set_pelco_data_callback)(controller, callback, user_data)
    }
}

// SAFETY: the table only holds plain function pointers and the library handle,
// and the VxSdk entry points may be called from any thread.
unsafe impl Send for VxSdkApi {}
unsafe impl Sync for VxSdkApi {}

/// Platform file name of the VxSdk shared library.
pub fn default_library_name() -> &'static str {
    if cfg!(windows) {
        "VxSdk.dll"
    } else if cfg!(target_os = "macos") {
        "libVxSdk.dylib"
    } else {
        "libVxSdk.so"
    }
}

/// Loads the VxSdk library from `path`.
///
/// # Examples
///
/// ```no_run
/// # fn main() -> Result<(), vxsdk::Error> {
/// let api = vxsdk::load_api("libVxSdk.so")?;
/// # Ok(())
/// # }
/// ```
pub fn load_api<P: AsRef<OsStr>>(path: P) -> Result<Arc<VxSdkApi>> {
    Ok(Arc::new(VxSdkApi::load(path)?))
}

/// Loads the VxSdk library named by `VXSDK_LIBRARY`, or the platform default
/// name when the variable is unset.
pub fn load_api_from_env() -> Result<Arc<VxSdkApi>> {
    let path = std::env::var_os(LIBRARY_ENV)
        .unwrap_or_else(|| OsString::from(default_library_name()));
    load_api(path)
}
