//! Exclusive ownership of native object handles.

use std::{fmt, mem, os::raw::c_int, ptr, sync::Arc};

use tracing::error;

use crate::{runtime::SdkInner, sys, Error, Result};

/// A native handle owned by exactly one wrapper.
///
/// Releasing is destructive: the native object is deleted, so the handle is
/// consumed by [`OwnedHandle::release`] and released on drop otherwise. There
/// is no way to release twice or to use the handle afterwards.
pub(crate) struct OwnedHandle {
    sdk: Arc<SdkInner>,
    raw: sys::VxHandle,
    resource_type: c_int,
}

impl OwnedHandle {
    /// Takes ownership of `raw`.
    ///
    /// # Safety
    ///
    /// `raw` must be a live native object of `resource_type` that nothing else
    /// will release.
    pub(crate) unsafe fn from_raw(
        sdk: Arc<SdkInner>,
        raw: sys::VxHandle,
        resource_type: c_int,
    ) -> Self {
        debug_assert!(!raw.is_null());
        Self {
            sdk,
            raw,
            resource_type,
        }
    }

    pub(crate) fn as_raw(&self) -> sys::VxHandle {
        self.raw
    }

    pub(crate) fn sdk(&self) -> &Arc<SdkInner> {
        &self.sdk
    }

    /// Releases the native object now, reporting the native result.
    pub(crate) fn release(mut self) -> Result<()> {
        let raw = mem::replace(&mut self.raw, ptr::null_mut());
        Error::check("VxRelease", unsafe {
            self.sdk.api.release(raw, self.resource_type)
        })
    }
}

impl Drop for OwnedHandle {
    fn drop(&mut self) {
        if self.raw.is_null() {
            return;
        }
        if let Err(err) = Error::check("VxRelease", unsafe {
            self.sdk.api.release(self.raw, self.resource_type)
        }) {
            error!(resource_type = self.resource_type, "Failed to release native handle: {err}");
        }
    }
}

impl fmt::Debug for OwnedHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OwnedHandle")
            .field("raw", &self.raw)
            .field("resource_type", &self.resource_type)
            .finish()
    }
}

// SAFETY: a handle can be moved to another thread; it is never shared, so no
// `Sync`. Concurrent calls on one native object are not supported.
unsafe impl Send for OwnedHandle {}
