//! Collection fetching.
//!
//! Every relationship query goes through the same two-call exchange with
//! `VxGetCollection`:
//!
//! 1. **Probe**: a null buffer with capacity zero. `VX_OK` means the collection
//!    is empty and nothing more is asked. `VX_INSUFFICIENT_SIZE` reports the
//!    required capacity. Anything else ends the query.
//! 2. **Fetch**: a buffer of exactly the reported capacity. `VX_OK` reports how
//!    many slots were filled. `VX_INSUFFICIENT_SIZE` means the collection grew
//!    since the probe, and the fetch is repeated with the new capacity.
//!
//! Returned handles are wrapped in native order. Nothing is cached; every call
//! queries again.

use std::{os::raw::c_int, ptr};

use num_enum::IntoPrimitive;
use tracing::{debug, trace, warn};

use crate::{
    error::ResultCode,
    handle::OwnedHandle,
    resource::{Resource, ResourceKind},
    sys, Error, Filters, Result,
};

const OPERATION: &str = "VxGetCollection";

/// Tuning for collection queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CollectionOptions {
    /// Extra fetches allowed when the collection grows between probe and fetch.
    pub resize_retries: u32,
}

impl CollectionOptions {
    pub const DEFAULT_RESIZE_RETRIES: u32 = 3;
    pub const MAX_RESIZE_RETRIES: u32 = 16;

    /// # Errors
    ///
    /// Returns [`Error::InvalidConfiguration`] if `resize_retries` exceeds
    /// [`Self::MAX_RESIZE_RETRIES`].
    pub fn new(resize_retries: u32) -> Result<Self> {
        if resize_retries > Self::MAX_RESIZE_RETRIES {
            return Err(Error::InvalidConfiguration(format!(
                "resize_retries is {resize_retries}, maximum is {}",
                Self::MAX_RESIZE_RETRIES
            )));
        }
        Ok(Self { resize_retries })
    }
}

impl Default for CollectionOptions {
    fn default() -> Self {
        Self {
            resize_retries: Self::DEFAULT_RESIZE_RETRIES,
        }
    }
}

/// Parent/child relationships reachable through `VxGetCollection`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, IntoPrimitive)]
#[repr(i32)]
pub(crate) enum Relation {
    SystemDataSources = sys::VX_REL_SYSTEM_DATA_SOURCES,
    SystemDevices = sys::VX_REL_SYSTEM_DEVICES,
    SystemUsers = sys::VX_REL_SYSTEM_USERS,
    SystemRoles = sys::VX_REL_SYSTEM_ROLES,
    SystemTags = sys::VX_REL_SYSTEM_TAGS,
    SystemDrawings = sys::VX_REL_SYSTEM_DRAWINGS,
    DeviceDataSources = sys::VX_REL_DEVICE_DATA_SOURCES,
    UserRoles = sys::VX_REL_USER_ROLES,
    RolePrivileges = sys::VX_REL_ROLE_PRIVILEGES,
    RoleUsers = sys::VX_REL_ROLE_USERS,
    DrawingMarkers = sys::VX_REL_DRAWING_MARKERS,
}

/// Runs the probe/fetch exchange against `query` and returns the raw handles.
///
/// `query` is one native `VxGetCollection` call with the parent and relation
/// already bound. The filter records stay borrowed for every call made.
///
/// Ownership of the returned handles passes to the caller.
pub(crate) fn fetch_handles<F>(
    mut query: F,
    filters: &mut [sys::VxCollectionFilter],
    resize_retries: u32,
) -> Result<Vec<sys::VxHandle>>
where
    F: FnMut(&mut sys::VxCollection) -> sys::VxResult,
{
    let filter_size = c_int::try_from(filters.len())
        .map_err(|_| Error::InvalidConfiguration(format!("{} filters", filters.len())))?;
    let filter_ptr = if filters.is_empty() {
        ptr::null_mut()
    } else {
        filters.as_mut_ptr()
    };

    let mut request = sys::VxCollection {
        collection: ptr::null_mut(),
        collection_size: 0,
        filter_size,
        filters: filter_ptr,
    };

    let status = query(&mut request);
    trace!(status, reported = request.collection_size, "collection probe");
    let mut capacity = match ResultCode::try_from(status) {
        Ok(ResultCode::Ok) => return Ok(Vec::new()),
        Ok(ResultCode::InsufficientSize) => required_capacity(request.collection_size)?,
        _ => return Err(Error::from_status(OPERATION, status)),
    };

    let mut attempts = 0u32;
    loop {
        let mut buffer: Vec<sys::VxHandle> = vec![ptr::null_mut(); capacity];
        request.collection = buffer.as_mut_ptr();
        // Capacity always originates from a positive c_int.
        request.collection_size = capacity as c_int;

        let status = query(&mut request);
        attempts += 1;
        trace!(status, capacity, reported = request.collection_size, attempts, "collection fetch");

        match ResultCode::try_from(status) {
            Ok(ResultCode::Ok) => {
                let returned = request.collection_size;
                if returned < 0 || returned as usize > capacity {
                    return Err(Error::ProtocolViolation(format!(
                        "fetch returned {returned} handles into {capacity} slots"
                    )));
                }
                buffer.truncate(returned as usize);
                return Ok(buffer);
            }
            Ok(ResultCode::InsufficientSize) => {
                if attempts > resize_retries {
                    return Err(Error::CollectionResized { attempts });
                }
                capacity = required_capacity(request.collection_size)?;
                debug!(capacity, attempts, "Collection grew between probe and fetch, retrying");
            }
            _ => return Err(Error::from_status(OPERATION, status)),
        }
    }
}

fn required_capacity(reported: c_int) -> Result<usize> {
    match usize::try_from(reported) {
        Ok(capacity) if capacity > 0 => Ok(capacity),
        _ => Err(Error::ProtocolViolation(format!(
            "insufficient size reported with required capacity {reported}"
        ))),
    }
}

/// Fetches the children of `parent` along `relation` and wraps them.
///
/// Every handle is owned before anything else can fail, so an error drops and
/// releases all of them.
pub(crate) fn fetch<K: ResourceKind>(
    parent: &OwnedHandle,
    relation: Relation,
    filters: &Filters,
) -> Result<Vec<Resource<K>>> {
    let sdk = parent.sdk();
    let mut raw_filters = filters.to_raw()?;
    let raw = fetch_handles(
        |request| unsafe { sdk.api.get_collection(parent.as_raw(), relation.into(), request) },
        &mut raw_filters,
        sdk.options.collection.resize_retries,
    )?;

    let nulls = raw.iter().filter(|handle| handle.is_null()).count();
    let handles: Vec<OwnedHandle> = raw
        .into_iter()
        .filter(|handle| !handle.is_null())
        .map(|handle| unsafe { OwnedHandle::from_raw(sdk.clone(), handle, K::RESOURCE_TYPE) })
        .collect();
    if nulls > 0 {
        drop(handles);
        return Err(Error::ProtocolViolation(format!(
            "{relation:?} returned {nulls} null {} handles",
            K::NAME
        )));
    }

    trace!(relation = ?relation, count = handles.len(), kind = K::NAME, "collection fetched");
    handles.into_iter().map(Resource::from_handle).collect()
}

/// Swallows a failed query into an empty result, logging the error.
pub(crate) fn or_empty<T>(operation: &'static str, result: Result<Vec<T>>) -> Vec<T> {
    result.unwrap_or_else(|err| {
        warn!(operation, "Collection query failed, returning no results: {err}");
        Vec::new()
    })
}
