//! Raw C ABI of the VxSdk native library.
//!
//! Everything here mirrors the exported C surface one-to-one. Nothing in this
//! module is safe to use directly; the wrappers in the rest of the crate own
//! every pointer that crosses the boundary.

#![allow(non_camel_case_types)]
#![allow(dead_code)]

use std::os::raw::{c_char, c_int, c_void};

/// Opaque pointer to a native object.
pub type VxHandle = *mut c_void;

/// Result code returned by almost every native entry point.
pub type VxResult = c_int;

pub const VX_OK: VxResult = 0;
pub const VX_INSUFFICIENT_SIZE: VxResult = 1;
pub const VX_INVALID_PARAMETER: VxResult = 2;
pub const VX_CONFLICT: VxResult = 3;
pub const VX_UNAUTHORIZED: VxResult = 4;
pub const VX_INSUFFICIENT_PRIVILEGES: VxResult = 5;
pub const VX_NOT_FOUND: VxResult = 6;
pub const VX_LOCKED: VxResult = 7;
pub const VX_RESOURCE_IN_USE: VxResult = 8;
pub const VX_LICENSE_REQUIRED: VxResult = 9;
pub const VX_INVALID_LICENSE: VxResult = 10;
pub const VX_NOT_ALLOWED: VxResult = 11;
pub const VX_ACTION_UNAVAILABLE: VxResult = 12;
pub const VX_UNSUPPORTED: VxResult = 13;
pub const VX_UNABLE_TO_COMMUNICATE: VxResult = 14;
pub const VX_UNKNOWN_ERROR: VxResult = 99;

// Resource types, used to route info and release calls.
pub const VX_RESOURCE_SYSTEM: c_int = 0;
pub const VX_RESOURCE_DATA_SOURCE: c_int = 1;
pub const VX_RESOURCE_DEVICE: c_int = 2;
pub const VX_RESOURCE_USER: c_int = 3;
pub const VX_RESOURCE_ROLE: c_int = 4;
pub const VX_RESOURCE_PRIVILEGE: c_int = 5;
pub const VX_RESOURCE_TAG: c_int = 6;
pub const VX_RESOURCE_DRAWING: c_int = 7;
pub const VX_RESOURCE_MARKER: c_int = 8;

// Collection endpoints. Each constant selects one parent/child relationship
// for `VxGetCollection`.
pub const VX_REL_SYSTEM_DATA_SOURCES: c_int = 1;
pub const VX_REL_SYSTEM_DEVICES: c_int = 2;
pub const VX_REL_SYSTEM_USERS: c_int = 3;
pub const VX_REL_SYSTEM_ROLES: c_int = 4;
pub const VX_REL_SYSTEM_TAGS: c_int = 5;
pub const VX_REL_SYSTEM_DRAWINGS: c_int = 6;
pub const VX_REL_DEVICE_DATA_SOURCES: c_int = 20;
pub const VX_REL_USER_ROLES: c_int = 30;
pub const VX_REL_ROLE_PRIVILEGES: c_int = 40;
pub const VX_REL_ROLE_USERS: c_int = 41;
pub const VX_REL_DRAWING_MARKERS: c_int = 70;

// Collection filter keys.
pub const VX_FILTER_ID: c_int = 1;
pub const VX_FILTER_NAME: c_int = 2;
pub const VX_FILTER_OWNER: c_int = 3;
pub const VX_FILTER_MODIFIED_SINCE: c_int = 4;
pub const VX_FILTER_TAGS: c_int = 5;
pub const VX_FILTER_RESOURCE_TYPE: c_int = 6;
pub const VX_FILTER_NUMBER: c_int = 7;
pub const VX_FILTER_STATE: c_int = 8;
pub const VX_FILTER_ENABLED: c_int = 9;
pub const VX_FILTER_IP: c_int = 10;
pub const VX_FILTER_MODEL: c_int = 11;
pub const VX_FILTER_VENDOR: c_int = 12;
pub const VX_FILTER_START_TIME: c_int = 13;
pub const VX_FILTER_END_TIME: c_int = 14;
pub const VX_FILTER_CREATED_BY: c_int = 15;

// Native log levels.
pub const VX_LOG_DISABLED: c_int = 0;
pub const VX_LOG_FATAL: c_int = 1;
pub const VX_LOG_ERROR: c_int = 2;
pub const VX_LOG_WARNING: c_int = 3;
pub const VX_LOG_INFO: c_int = 4;
pub const VX_LOG_DEBUG: c_int = 5;
pub const VX_LOG_TRACE: c_int = 6;

// Stream event types.
pub const VX_STREAM_UNKNOWN: c_int = 0;
pub const VX_STREAM_STARTED: c_int = 1;
pub const VX_STREAM_PAUSED: c_int = 2;
pub const VX_STREAM_RESUMED: c_int = 3;
pub const VX_STREAM_ENDED: c_int = 4;
pub const VX_STREAM_INTERRUPTED: c_int = 5;

pub const VX_FILTER_VALUE_LEN: usize = 64;
pub const VX_ID_LEN: usize = 64;
pub const VX_NAME_LEN: usize = 128;

/// One key/value constraint on a collection query.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct VxCollectionFilter {
    pub key: c_int,
    pub value: [c_char; VX_FILTER_VALUE_LEN],
}

/// In/out descriptor for `VxGetCollection`.
///
/// On input `collection_size` is the number of slots behind `collection`
/// (zero and null for a probe). On output it is the number of elements the
/// native side returned, or needs when the result is `VX_INSUFFICIENT_SIZE`.
#[repr(C)]
#[derive(Debug)]
pub struct VxCollection {
    pub collection: *mut VxHandle,
    pub collection_size: c_int,
    pub filter_size: c_int,
    pub filters: *mut VxCollectionFilter,
}

#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct VxResourceInfo {
    pub id: [c_char; VX_ID_LEN],
    pub name: [c_char; VX_NAME_LEN],
}

impl Default for VxResourceInfo {
    fn default() -> Self {
        Self {
            id: [0; VX_ID_LEN],
            name: [0; VX_NAME_LEN],
        }
    }
}

#[repr(C)]
#[derive(Debug)]
pub struct VxLoginInfo {
    pub ip_address: *const c_char,
    pub port: c_int,
    pub username: *const c_char,
    pub password: *const c_char,
    pub use_ssl: bool,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct VxTimestampEvent {
    pub unix_time_ms: u64,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct VxStreamEvent {
    pub event_type: c_int,
}

#[repr(C)]
#[derive(Debug)]
pub struct VxPelcoDataEvent {
    pub data: *const u8,
    pub data_size: c_int,
}

pub type VxTimestampCallback =
    unsafe extern "C" fn(event: *const VxTimestampEvent, user_data: *mut c_void);
pub type VxStreamCallback =
    unsafe extern "C" fn(event: *const VxStreamEvent, user_data: *mut c_void);
pub type VxPelcoDataCallback =
    unsafe extern "C" fn(event: *const VxPelcoDataEvent, user_data: *mut c_void);

// Exported entry points.
pub type VxInitFn = unsafe extern "C" fn(license_key: *const c_char) -> VxResult;
pub type VxShutdownFn = unsafe extern "C" fn();
pub type VxVersionFn = unsafe extern "C" fn() -> *const c_char;
pub type VxSetLogLevelFn = unsafe extern "C" fn(level: c_int) -> VxResult;
pub type VxSetLogPathFn = unsafe extern "C" fn(path: *const c_char) -> VxResult;
pub type VxSubmitLoginFn =
    unsafe extern "C" fn(info: *const VxLoginInfo, system: *mut VxHandle) -> VxResult;
pub type VxGetCollectionFn = unsafe extern "C" fn(
    parent: VxHandle,
    relation: c_int,
    collection: *mut VxCollection,
) -> VxResult;
pub type VxGetResourceInfoFn = unsafe extern "C" fn(
    handle: VxHandle,
    resource_type: c_int,
    info: *mut VxResourceInfo,
) -> VxResult;
pub type VxReleaseFn = unsafe extern "C" fn(handle: VxHandle, resource_type: c_int) -> VxResult;
pub type VxMediaCreateFn =
    unsafe extern "C" fn(data_source: VxHandle, controller: *mut VxHandle) -> VxResult;
pub type VxMediaReleaseFn = unsafe extern "C" fn(controller: VxHandle) -> VxResult;
pub type VxMediaPlayFn = unsafe extern "C" fn(controller: VxHandle, speed: f32) -> VxResult;
pub type VxMediaPauseFn = unsafe extern "C" fn(controller: VxHandle) -> VxResult;
pub type VxMediaStopFn = unsafe extern "C" fn(controller: VxHandle) -> VxResult;
pub type VxMediaSeekFn =
    unsafe extern "C" fn(controller: VxHandle, unix_time_ms: u64, speed: f32) -> VxResult;
pub type VxMediaSetTimestampCallbackFn = unsafe extern "C" fn(
    controller: VxHandle,
    callback: Option<VxTimestampCallback>,
    user_data: *mut c_void,
) -> VxResult;
pub type VxMediaSetStreamCallbackFn = unsafe extern "C" fn(
    controller: VxHandle,
    callback: Option<VxStreamCallback>,
    user_data: *mut c_void,
) -> VxResult;
pub type VxMediaSetPelcoDataCallbackFn = unsafe extern "C" fn(
    controller: VxHandle,
    callback: Option<VxPelcoDataCallback>,
    user_data: *mut c_void,
) -> VxResult;
