//! Process-wide logging configuration of the native SDK.
//!
//! The native library keeps one log level and one log directory for the whole
//! process. This module applies them at most once; the first successful call
//! wins and later calls must agree with it.

use std::{
    ffi::CString,
    fs,
    os::raw::c_int,
    path::{Path, PathBuf},
};

use num_enum::{IntoPrimitive, TryFromPrimitive};
use once_cell::sync::OnceCell;
use tracing::info;

use crate::{api::VxSdkApi, sys, Error, Result};

/// Verbosity of the native SDK log.
#[derive(Debug, TryFromPrimitive, IntoPrimitive, Clone, Copy, PartialEq, Eq, Default)]
#[repr(i32)]
pub enum LogLevel {
    #[default]
    Disabled = sys::VX_LOG_DISABLED,
    Fatal = sys::VX_LOG_FATAL,
    Error = sys::VX_LOG_ERROR,
    Warning = sys::VX_LOG_WARNING,
    Info = sys::VX_LOG_INFO,
    Debug = sys::VX_LOG_DEBUG,
    Trace = sys::VX_LOG_TRACE,
}

impl std::str::FromStr for LogLevel {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "disabled" | "off" | "none" => Ok(LogLevel::Disabled),
            "fatal" => Ok(LogLevel::Fatal),
            "error" => Ok(LogLevel::Error),
            "warning" | "warn" => Ok(LogLevel::Warning),
            "info" => Ok(LogLevel::Info),
            "debug" => Ok(LogLevel::Debug),
            "trace" => Ok(LogLevel::Trace),
            other => Err(Error::InvalidConfiguration(format!(
                "unknown log level '{other}'"
            ))),
        }
    }
}

/// Native log settings.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LogConfig {
    pub level: LogLevel,
    /// Directory the native library writes its log files into. `None` keeps
    /// the library default.
    pub directory: Option<PathBuf>,
}

impl LogConfig {
    pub fn new(level: LogLevel) -> Self {
        Self {
            level,
            directory: None,
        }
    }

    #[must_use]
    pub fn directory<P: Into<PathBuf>>(mut self, directory: P) -> Self {
        self.directory = Some(directory.into());
        self
    }
}

static NATIVE_LOG: OnceCell<LogConfig> = OnceCell::new();

/// Applies `config` to the native library, once per process.
///
/// Calling again with an equal configuration is a no-op. A different
/// configuration is rejected with [`Error::LoggingAlreadyConfigured`], since
/// the native side offers no way to scope it.
///
/// # Errors
///
/// Also fails if the log directory cannot be created, is not valid UTF-8, or
/// the native library rejects the settings. Nothing is recorded in that case
/// and a later call may try again.
pub fn configure_native_logging(api: &VxSdkApi, config: &LogConfig) -> Result<()> {
    let mut applied_now = false;
    let current = NATIVE_LOG.get_or_try_init(|| {
        apply(api, config)?;
        applied_now = true;
        Ok::<_, Error>(config.clone())
    })?;

    if !applied_now && current != config {
        return Err(Error::LoggingAlreadyConfigured(format!(
            "active {current:?}, requested {config:?}"
        )));
    }
    Ok(())
}

/// The native log configuration applied in this process, if any.
pub fn native_log_config() -> Option<&'static LogConfig> {
    NATIVE_LOG.get()
}

fn apply(api: &VxSdkApi, config: &LogConfig) -> Result<()> {
    if let Some(directory) = &config.directory {
        fs::create_dir_all(directory)?;
        let path = path_to_cstring(directory)?;
        Error::check("VxSetLogPath", unsafe { api.set_log_path(path.as_ptr()) })?;
    }

    let level: c_int = config.level.into();
    Error::check("VxSetLogLevel", unsafe { api.set_log_level(level) })?;

    info!(level = ?config.level, directory = ?config.directory, "native logging configured");
    Ok(())
}

fn path_to_cstring(path: &Path) -> Result<CString> {
    let s = path
        .to_str()
        .ok_or_else(|| Error::InvalidUtf8(path.to_string_lossy().into_owned()))?;
    Ok(CString::new(s)?)
}
