//! Typed wrappers over native resources.
//!
//! Every resource type shares one generic wrapper, [`Resource<K>`], and differs
//! only in its marker type `K: ResourceKind`. The marker fixes the native
//! resource type used for info and release calls at compile time.
//!
//! # Architecture
//!
//! - `ResourceKind`: sealed trait carrying the native resource type constant
//! - `Resource<K>`: owns the handle and the fields copied out at construction
//! - type aliases (`DataSource`, `User`, ...) name the concrete resources
//!
//! Relationship queries live on the aliases (`impl Resource<UserKind>`), so a
//! `User` has `get_roles` while a `Tag` has none.

use std::{
    ffi::CStr,
    fmt,
    marker::PhantomData,
    os::raw::{c_char, c_int},
    sync::Arc,
};

use crate::{
    collection::{self, Relation},
    handle::OwnedHandle,
    runtime::SdkInner,
    sys, Error, Filters, Result,
};

/// Sealed trait module to prevent external implementations of `ResourceKind`.
mod sealed {
    pub trait Sealed {}

    impl Sealed for super::SystemKind {}
    impl Sealed for super::DataSourceKind {}
    impl Sealed for super::DeviceKind {}
    impl Sealed for super::UserKind {}
    impl Sealed for super::RoleKind {}
    impl Sealed for super::PrivilegeKind {}
    impl Sealed for super::TagKind {}
    impl Sealed for super::DrawingKind {}
    impl Sealed for super::MarkerKind {}
}

/// Compile-time description of one native resource type.
///
/// This is a sealed trait - it cannot be implemented outside this crate.
pub trait ResourceKind: sealed::Sealed + Send + 'static {
    /// Native resource type passed to `VxGetResourceInfo` and `VxRelease`.
    const RESOURCE_TYPE: c_int;
    /// Human-readable name used in logs and errors.
    const NAME: &'static str;
}

macro_rules! resource_kind {
    ($(#[$doc:meta])* $kind:ident, $constant:path, $name:literal) => {
        $(#[$doc])*
        #[derive(Debug)]
        pub struct $kind;

        impl ResourceKind for $kind {
            const RESOURCE_TYPE: c_int = $constant;
            const NAME: &'static str = $name;
        }
    };
}

resource_kind!(
    /// Marker for the logged-in system root.
    SystemKind, sys::VX_RESOURCE_SYSTEM, "system"
);
resource_kind!(
    /// Marker for data sources (camera streams and other media sources).
    DataSourceKind, sys::VX_RESOURCE_DATA_SOURCE, "data source"
);
resource_kind!(DeviceKind, sys::VX_RESOURCE_DEVICE, "device");
resource_kind!(UserKind, sys::VX_RESOURCE_USER, "user");
resource_kind!(RoleKind, sys::VX_RESOURCE_ROLE, "role");
resource_kind!(PrivilegeKind, sys::VX_RESOURCE_PRIVILEGE, "privilege");
resource_kind!(TagKind, sys::VX_RESOURCE_TAG, "tag");
resource_kind!(DrawingKind, sys::VX_RESOURCE_DRAWING, "drawing");
resource_kind!(MarkerKind, sys::VX_RESOURCE_MARKER, "marker");

/// Fields copied out of the native object when the wrapper is created.
#[derive(Debug, Default, Clone, PartialEq, Eq, Hash)]
pub struct ResourceInfo {
    pub id: String,
    pub name: String,
}

impl ResourceInfo {
    pub(crate) fn from_raw(raw: &sys::VxResourceInfo) -> Self {
        Self {
            id: fixed_str(&raw.id),
            name: fixed_str(&raw.name),
        }
    }
}

/// Reads a NUL-terminated string out of a fixed-size native field.
///
/// A field without a terminator is read to its full length.
pub(crate) fn fixed_str(buf: &[c_char]) -> String {
    // SAFETY: c_char and u8 have the same size and alignment.
    let bytes = unsafe { std::slice::from_raw_parts(buf.as_ptr().cast::<u8>(), buf.len()) };
    match CStr::from_bytes_until_nul(bytes) {
        Ok(s) => s.to_string_lossy().into_owned(),
        Err(_) => String::from_utf8_lossy(bytes).into_owned(),
    }
}

/// A native resource owned by this wrapper.
///
/// Dropping the wrapper releases the native object. [`Resource::dispose`] does
/// the same but reports the native result.
pub struct Resource<K: ResourceKind> {
    handle: OwnedHandle,
    info: ResourceInfo,
    _kind: PhantomData<K>,
}

/// A camera stream or other media source.
pub type DataSource = Resource<DataSourceKind>;
/// A physical or virtual device hosting data sources.
pub type Device = Resource<DeviceKind>;
pub type User = Resource<UserKind>;
pub type Role = Resource<RoleKind>;
pub type Privilege = Resource<PrivilegeKind>;
pub type Tag = Resource<TagKind>;
/// A map or floor plan that markers are placed on.
pub type Drawing = Resource<DrawingKind>;
pub type Marker = Resource<MarkerKind>;

impl<K: ResourceKind> Resource<K> {
    /// Wraps an owned handle and copies out its fields.
    ///
    /// On failure the handle is dropped, which releases it.
    pub(crate) fn from_handle(handle: OwnedHandle) -> Result<Self> {
        let mut raw = sys::VxResourceInfo::default();
        Error::check("VxGetResourceInfo", unsafe {
            handle
                .sdk()
                .api
                .get_resource_info(handle.as_raw(), K::RESOURCE_TYPE, &mut raw)
        })?;
        Ok(Self {
            handle,
            info: ResourceInfo::from_raw(&raw),
            _kind: PhantomData,
        })
    }

    /// Wraps a raw handle returned by the native layer.
    ///
    /// # Safety
    ///
    /// `raw` must be a live native object of kind `K` owned by the caller.
    pub(crate) unsafe fn from_raw(sdk: Arc<SdkInner>, raw: sys::VxHandle) -> Result<Self> {
        Self::from_handle(OwnedHandle::from_raw(sdk, raw, K::RESOURCE_TYPE))
    }

    pub fn id(&self) -> &str {
        &self.info.id
    }

    pub fn name(&self) -> &str {
        &self.info.name
    }

    pub fn info(&self) -> &ResourceInfo {
        &self.info
    }

    /// The underlying native handle, still owned by this wrapper.
    pub fn as_raw(&self) -> sys::VxHandle {
        self.handle.as_raw()
    }

    /// Releases the native object and consumes the wrapper.
    ///
    /// # Errors
    ///
    /// Returns the native result if the release was rejected. The wrapper is
    /// gone either way.
    pub fn dispose(self) -> Result<()> {
        self.handle.release()
    }

    pub(crate) fn handle(&self) -> &OwnedHandle {
        &self.handle
    }

    fn children<C: ResourceKind>(
        &self,
        relation: Relation,
        filters: &Filters,
    ) -> Result<Vec<Resource<C>>> {
        collection::fetch(&self.handle, relation, filters)
    }
}

impl<K: ResourceKind> fmt::Debug for Resource<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resource")
            .field("kind", &K::NAME)
            .field("id", &self.info.id)
            .field("name", &self.info.name)
            .finish()
    }
}

impl<K: ResourceKind> fmt::Display for Resource<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.info.name, self.info.id)
    }
}

impl Resource<DeviceKind> {
    /// Data sources hosted by this device.
    pub fn try_get_data_sources(&self, filters: &Filters) -> Result<Vec<DataSource>> {
        self.children(Relation::DeviceDataSources, filters)
    }

    /// Like [`Self::try_get_data_sources`], but empty on failure.
    pub fn get_data_sources(&self, filters: &Filters) -> Vec<DataSource> {
        collection::or_empty("Device::get_data_sources", self.try_get_data_sources(filters))
    }
}

impl Resource<UserKind> {
    /// Roles assigned to this user.
    pub fn try_get_roles(&self, filters: &Filters) -> Result<Vec<Role>> {
        self.children(Relation::UserRoles, filters)
    }

    pub fn get_roles(&self, filters: &Filters) -> Vec<Role> {
        collection::or_empty("User::get_roles", self.try_get_roles(filters))
    }
}

impl Resource<RoleKind> {
    pub fn try_get_privileges(&self, filters: &Filters) -> Result<Vec<Privilege>> {
        self.children(Relation::RolePrivileges, filters)
    }

    pub fn get_privileges(&self, filters: &Filters) -> Vec<Privilege> {
        collection::or_empty("Role::get_privileges", self.try_get_privileges(filters))
    }

    /// Users holding this role.
    pub fn try_get_users(&self, filters: &Filters) -> Result<Vec<User>> {
        self.children(Relation::RoleUsers, filters)
    }

    pub fn get_users(&self, filters: &Filters) -> Vec<User> {
        collection::or_empty("Role::get_users", self.try_get_users(filters))
    }
}

impl Resource<DrawingKind> {
    /// Markers placed on this drawing.
    pub fn try_get_markers(&self, filters: &Filters) -> Result<Vec<Marker>> {
        self.children(Relation::DrawingMarkers, filters)
    }

    pub fn get_markers(&self, filters: &Filters) -> Vec<Marker> {
        collection::or_empty("Drawing::get_markers", self.try_get_markers(filters))
    }
}
