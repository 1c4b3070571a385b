//! Login and the system root.

use std::{ffi::CString, fmt, os::raw::c_int, ptr};

use tracing::info;

use crate::{
    collection::{self, Relation},
    resource::{
        DataSource, Device, Drawing, Resource, ResourceInfo, ResourceKind, Role, SystemKind, Tag,
        User,
    },
    sys, Error, Filters, Result, VxSdk,
};

/// Credentials and address of a VideoXpert system.
///
/// # Examples
///
/// ```
/// use vxsdk::LoginOptions;
///
/// let options = LoginOptions::builder()
///     .address("10.0.0.5")
///     .username("admin")
///     .password("secret")
///     .build()
///     .unwrap();
/// assert_eq!(options.port, 443);
/// assert!(options.use_ssl);
/// ```
#[derive(Clone)]
pub struct LoginOptions {
    pub address: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub use_ssl: bool,
}

impl fmt::Debug for LoginOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoginOptions")
            .field("address", &self.address)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("use_ssl", &self.use_ssl)
            .finish()
    }
}

impl LoginOptions {
    /// Create a builder for configuring login options
    pub fn builder() -> LoginOptionsBuilder {
        LoginOptionsBuilder::new()
    }
}

/// Builder for configuring [`LoginOptions`] with ergonomic method chaining
#[derive(Debug, Clone, Default)]
pub struct LoginOptionsBuilder {
    address: Option<String>,
    port: Option<u16>,
    username: Option<String>,
    password: Option<String>,
    use_ssl: Option<bool>,
}

impl LoginOptionsBuilder {
    /// Creates a new builder with default settings.
    ///
    /// Default settings:
    /// - `port`: `443`
    /// - `use_ssl`: `true`
    /// - `password`: empty
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the host name or IP address of the system
    #[must_use]
    pub fn address<S: Into<String>>(mut self, address: S) -> Self {
        self.address = Some(address.into());
        self
    }

    #[must_use]
    pub fn port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    #[must_use]
    pub fn username<S: Into<String>>(mut self, username: S) -> Self {
        self.username = Some(username.into());
        self
    }

    #[must_use]
    pub fn password<S: Into<String>>(mut self, password: S) -> Self {
        self.password = Some(password.into());
        self
    }

    /// Configure whether the connection uses TLS
    #[must_use]
    pub fn use_ssl(mut self, use_ssl: bool) -> Self {
        self.use_ssl = Some(use_ssl);
        self
    }

    /// Build the `LoginOptions`
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The address or username is missing or blank
    /// - The port is zero
    pub fn build(self) -> Result<LoginOptions> {
        let address = self.address.unwrap_or_default();
        if address.trim().is_empty() {
            return Err(Error::InvalidConfiguration("Login address is required".into()));
        }
        let username = self.username.unwrap_or_default();
        if username.trim().is_empty() {
            return Err(Error::InvalidConfiguration("Login username is required".into()));
        }
        let port = self.port.unwrap_or(443);
        if port == 0 {
            return Err(Error::InvalidConfiguration("Login port cannot be zero".into()));
        }

        Ok(LoginOptions {
            address,
            port,
            username,
            password: self.password.unwrap_or_default(),
            use_ssl: self.use_ssl.unwrap_or(true),
        })
    }
}

/// A logged-in VideoXpert system.
///
/// The system is the root of every relationship query. Dropping it (or calling
/// [`VxSystem::dispose`]) ends the session.
pub struct VxSystem {
    root: Resource<SystemKind>,
}

impl fmt::Debug for VxSystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VxSystem").field("root", &self.root).finish()
    }
}

impl VxSystem {
    /// Submits a login request and wraps the resulting system handle.
    ///
    /// # Errors
    ///
    /// Returns the native result if the login is rejected, or
    /// [`Error::NullPointer`] if the native side reports success without a
    /// handle.
    pub fn login(sdk: &VxSdk, options: &LoginOptions) -> Result<Self> {
        let address = CString::new(options.address.as_str())?;
        let username = CString::new(options.username.as_str())?;
        let password = CString::new(options.password.as_str())?;
        let raw_info = sys::VxLoginInfo {
            ip_address: address.as_ptr(),
            port: c_int::from(options.port),
            username: username.as_ptr(),
            password: password.as_ptr(),
            use_ssl: options.use_ssl,
        };

        let mut handle: sys::VxHandle = ptr::null_mut();
        Error::check("VxSubmitLogin", unsafe {
            sdk.inner.api.submit_login(&raw_info, &mut handle)
        })?;
        if handle.is_null() {
            return Err(Error::NullPointer("VxSubmitLogin".into()));
        }

        let root = unsafe { Resource::<SystemKind>::from_raw(sdk.inner.clone(), handle)? };
        info!(address = %options.address, port = options.port, system = %root, "logged in");
        Ok(Self { root })
    }

    pub fn id(&self) -> &str {
        self.root.id()
    }

    pub fn name(&self) -> &str {
        self.root.name()
    }

    pub fn info(&self) -> &ResourceInfo {
        self.root.info()
    }

    /// Ends the session and releases the native system object.
    pub fn dispose(self) -> Result<()> {
        self.root.dispose()
    }

    fn children<K: ResourceKind>(
        &self,
        relation: Relation,
        filters: &Filters,
    ) -> Result<Vec<Resource<K>>> {
        collection::fetch(self.root.handle(), relation, filters)
    }

    pub fn try_get_data_sources(&self, filters: &Filters) -> Result<Vec<DataSource>> {
        self.children(Relation::SystemDataSources, filters)
    }

    /// All data sources visible to the logged-in user, or none on failure.
    pub fn get_data_sources(&self, filters: &Filters) -> Vec<DataSource> {
        collection::or_empty("VxSystem::get_data_sources", self.try_get_data_sources(filters))
    }

    pub fn try_get_devices(&self, filters: &Filters) -> Result<Vec<Device>> {
        self.children(Relation::SystemDevices, filters)
    }

    pub fn get_devices(&self, filters: &Filters) -> Vec<Device> {
        collection::or_empty("VxSystem::get_devices", self.try_get_devices(filters))
    }

    pub fn try_get_users(&self, filters: &Filters) -> Result<Vec<User>> {
        self.children(Relation::SystemUsers, filters)
    }

    pub fn get_users(&self, filters: &Filters) -> Vec<User> {
        collection::or_empty("VxSystem::get_users", self.try_get_users(filters))
    }

    pub fn try_get_roles(&self, filters: &Filters) -> Result<Vec<Role>> {
        self.children(Relation::SystemRoles, filters)
    }

    pub fn get_roles(&self, filters: &Filters) -> Vec<Role> {
        collection::or_empty("VxSystem::get_roles", self.try_get_roles(filters))
    }

    pub fn try_get_tags(&self, filters: &Filters) -> Result<Vec<Tag>> {
        self.children(Relation::SystemTags, filters)
    }

    pub fn get_tags(&self, filters: &Filters) -> Vec<Tag> {
        collection::or_empty("VxSystem::get_tags", self.try_get_tags(filters))
    }

    pub fn try_get_drawings(&self, filters: &Filters) -> Result<Vec<Drawing>> {
        self.children(Relation::SystemDrawings, filters)
    }

    pub fn get_drawings(&self, filters: &Filters) -> Vec<Drawing> {
        collection::or_empty("VxSystem::get_drawings", self.try_get_drawings(filters))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_defaults() {
        let options = LoginOptions::builder()
            .address("vx.local")
            .username("operator")
            .build()
            .unwrap();
        assert_eq!(options.port, 443);
        assert!(options.use_ssl);
        assert!(options.password.is_empty());
    }

    #[test]
    fn missing_address_is_rejected() {
        let result = LoginOptions::builder().username("operator").build();
        assert!(matches!(result, Err(Error::InvalidConfiguration(_))));
    }

    #[test]
    fn zero_port_is_rejected() {
        let result = LoginOptions::builder()
            .address("vx.local")
            .username("operator")
            .port(0)
            .build();
        assert!(matches!(result, Err(Error::InvalidConfiguration(_))));
    }

    #[test]
    fn debug_redacts_password() {
        let options = LoginOptions::builder()
            .address("vx.local")
            .username("operator")
            .password("hunter2")
            .build()
            .unwrap();
        let printed = format!("{options:?}");
        assert!(!printed.contains("hunter2"));
        assert!(printed.contains("<redacted>"));
    }
}
