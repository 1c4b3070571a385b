//! Error types for the vxsdk library.

use std::ffi::NulError;
use std::io;

use num_enum::{IntoPrimitive, TryFromPrimitive};
use thiserror::Error;

use crate::{filter::FilterKey, sys};

/// Result codes reported by the native SDK.
///
/// Only [`ResultCode::Ok`] and [`ResultCode::InsufficientSize`] carry meaning
/// for the collection protocol and the event bridge; every other code means the
/// request did not succeed.
#[derive(Debug, TryFromPrimitive, IntoPrimitive, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum ResultCode {
    Ok = sys::VX_OK,
    /// The supplied buffer is too small; the required size was reported back.
    InsufficientSize = sys::VX_INSUFFICIENT_SIZE,
    InvalidParameter = sys::VX_INVALID_PARAMETER,
    Conflict = sys::VX_CONFLICT,
    Unauthorized = sys::VX_UNAUTHORIZED,
    InsufficientPrivileges = sys::VX_INSUFFICIENT_PRIVILEGES,
    NotFound = sys::VX_NOT_FOUND,
    Locked = sys::VX_LOCKED,
    ResourceInUse = sys::VX_RESOURCE_IN_USE,
    LicenseRequired = sys::VX_LICENSE_REQUIRED,
    InvalidLicense = sys::VX_INVALID_LICENSE,
    NotAllowed = sys::VX_NOT_ALLOWED,
    ActionUnavailable = sys::VX_ACTION_UNAVAILABLE,
    Unsupported = sys::VX_UNSUPPORTED,
    UnableToCommunicate = sys::VX_UNABLE_TO_COMMUNICATE,
    UnknownError = sys::VX_UNKNOWN_ERROR,
}

/// The main error type for VxSdk operations.
#[derive(Debug, Error)]
pub enum Error {
    /// VxSdk runtime initialization failed.
    ///
    /// This typically occurs when the license key is rejected or the native
    /// library could not start its services.
    #[error("Failed to initialize the VxSdk runtime: {0}")]
    InitializationFailed(String),

    /// A null pointer was returned by the native SDK.
    #[error("Encountered a null pointer in function: {0}")]
    NullPointer(String),

    /// Invalid UTF-8 data in a string crossing the boundary.
    #[error("Invalid UTF-8 string in data: {0}")]
    InvalidUtf8(String),

    /// Failed to create a C string due to null bytes.
    #[error("Invalid CString: {0}")]
    InvalidCString(#[from] NulError),

    /// A native call returned a result code other than success.
    #[error("{operation} failed: {code:?}")]
    Native {
        operation: &'static str,
        code: ResultCode,
    },

    /// A native call returned a value outside the known result codes.
    #[error("{operation} returned unknown result code {code}")]
    UnknownResultCode { operation: &'static str, code: i32 },

    /// The collection kept growing between capacity probe and fetch.
    #[error("Collection changed size on every fetch ({attempts} attempts)")]
    CollectionResized { attempts: u32 },

    /// The native side broke the collection or callback contract.
    #[error("Native protocol violation: {0}")]
    ProtocolViolation(String),

    /// A filter value does not fit the native fixed-size field.
    #[error("Filter value for {key:?} is {len} bytes, limit is {max}")]
    FilterValueTooLong {
        key: FilterKey,
        len: usize,
        max: usize,
    },

    /// Configuration parameters are invalid.
    ///
    /// This can occur when builder validation fails or conflicting options are set.
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// Native logging was already configured differently in this process.
    #[error("Native logging is already configured for this process: {0}")]
    LoggingAlreadyConfigured(String),

    /// Failed to load the native library or resolve one of its symbols.
    #[error("Loading library: {0}")]
    LibLoading(#[from] libloading::Error),

    /// I/O operation failed.
    #[error(transparent)]
    Io(#[from] io::Error),
}

impl Error {
    /// Maps a raw native result code to a [`Result`](crate::Result).
    ///
    /// ```ignore
    /// Error::check("VxMediaPlay", unsafe { api.media_play(controller, 1.0) })?;
    /// ```
    pub(crate) fn check(operation: &'static str, raw: sys::VxResult) -> crate::Result<()> {
        if raw == sys::VX_OK {
            Ok(())
        } else {
            Err(Error::from_status(operation, raw))
        }
    }

    /// Builds the error for a non-success native result.
    pub(crate) fn from_status(operation: &'static str, raw: sys::VxResult) -> Self {
        match ResultCode::try_from(raw) {
            Ok(code) => Error::Native { operation, code },
            Err(err) => Error::UnknownResultCode {
                operation,
                code: err.number,
            },
        }
    }

    /// The native result code behind this error, if it came from a native call.
    pub fn code(&self) -> Option<ResultCode> {
        match self {
            Error::Native { code, .. } => Some(*code),
            _ => None,
        }
    }
}
