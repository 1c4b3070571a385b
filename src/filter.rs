//! Collection filters.
//!
//! A query carries zero or more filters, one value per [`FilterKey`]. The
//! native side combines them with AND semantics and rejects keys that do not
//! apply to the queried collection; nothing is validated here beyond what the
//! fixed-size native field can hold.

use std::{collections::BTreeMap, ffi::CString, os::raw::c_char};

use num_enum::{IntoPrimitive, TryFromPrimitive};

use crate::{sys, Error, Result};

/// Longest filter value, in bytes, the native field can carry.
pub const MAX_FILTER_VALUE_LEN: usize = sys::VX_FILTER_VALUE_LEN - 1;

/// Fields a collection can be filtered on.
#[derive(Debug, TryFromPrimitive, IntoPrimitive, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(i32)]
pub enum FilterKey {
    Id = sys::VX_FILTER_ID,
    Name = sys::VX_FILTER_NAME,
    Owner = sys::VX_FILTER_OWNER,
    /// Resources modified at or after the given time (ISO 8601).
    ModifiedSince = sys::VX_FILTER_MODIFIED_SINCE,
    /// Comma-separated tag ids.
    Tags = sys::VX_FILTER_TAGS,
    ResourceType = sys::VX_FILTER_RESOURCE_TYPE,
    Number = sys::VX_FILTER_NUMBER,
    State = sys::VX_FILTER_STATE,
    Enabled = sys::VX_FILTER_ENABLED,
    Ip = sys::VX_FILTER_IP,
    Model = sys::VX_FILTER_MODEL,
    Vendor = sys::VX_FILTER_VENDOR,
    StartTime = sys::VX_FILTER_START_TIME,
    EndTime = sys::VX_FILTER_END_TIME,
    CreatedBy = sys::VX_FILTER_CREATED_BY,
}

/// A set of collection filters.
///
/// An empty set is an unconstrained query.
///
/// # Examples
///
/// ```
/// use vxsdk::{FilterKey, Filters};
///
/// let filters = Filters::new()
///     .with(FilterKey::Name, "Lobby*")
///     .with(FilterKey::Enabled, "true");
/// assert_eq!(filters.len(), 2);
/// assert_eq!(filters.get(FilterKey::Name), Some("Lobby*"));
/// ```
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Filters {
    entries: BTreeMap<FilterKey, String>,
}

impl Filters {
    /// An empty filter set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces the value for `key`
    #[must_use]
    pub fn with<S: Into<String>>(mut self, key: FilterKey, value: S) -> Self {
        self.entries.insert(key, value.into());
        self
    }

    /// Inserts a value, returning the previous one for the same key.
    pub fn insert<S: Into<String>>(&mut self, key: FilterKey, value: S) -> Option<String> {
        self.entries.insert(key, value.into())
    }

    pub fn remove(&mut self, key: FilterKey) -> Option<String> {
        self.entries.remove(&key)
    }

    pub fn get(&self, key: FilterKey) -> Option<&str> {
        self.entries.get(&key).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (FilterKey, &str)> {
        self.entries.iter().map(|(k, v)| (*k, v.as_str()))
    }

    /// Marshals the filters into native filter records.
    pub(crate) fn to_raw(&self) -> Result<Vec<sys::VxCollectionFilter>> {
        self.entries
            .iter()
            .map(|(key, value)| raw_filter(*key, value))
            .collect()
    }
}

impl<S: Into<String>> FromIterator<(FilterKey, S)> for Filters {
    fn from_iter<I: IntoIterator<Item = (FilterKey, S)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().map(|(k, v)| (k, v.into())).collect(),
        }
    }
}

fn raw_filter(key: FilterKey, value: &str) -> Result<sys::VxCollectionFilter> {
    let value = CString::new(value)?;
    let bytes = value.as_bytes();
    if bytes.len() > MAX_FILTER_VALUE_LEN {
        return Err(Error::FilterValueTooLong {
            key,
            len: bytes.len(),
            max: MAX_FILTER_VALUE_LEN,
        });
    }

    let mut raw = sys::VxCollectionFilter {
        key: key.into(),
        value: [0; sys::VX_FILTER_VALUE_LEN],
    };
    for (dst, src) in raw.value.iter_mut().zip(bytes) {
        *dst = *src as c_char;
    }
    Ok(raw)
}
