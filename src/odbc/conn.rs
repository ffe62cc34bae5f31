use std::ffi::c_void;
use std::fmt;
use std::sync::OnceLock;
use std::time::Duration;

use odbc_api::handles::{self, SqlResult, SqlText};
use odbc_api::sys::{AttrOdbcVersion, HDbc, Integer, Pointer, SqlReturn};
use tracing::{debug, warn};

use super::attrs::{PreConnectAttributes, pre_connect_attributes};
use super::conn_str::ConnectionString;
use super::credentials::Credentials;
use super::token::TokenProvider;
use crate::error::{AdapterError, Result};

pub const ADAPTER_TYPE: &str = "sqlserver";

/// Options handed to the native connect call alongside the string.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConnectOptions {
    pub login_timeout_sec: Option<u32>,
}

impl ConnectOptions {
    pub fn for_credentials(credentials: &Credentials) -> Self {
        Self {
            login_timeout_sec: (credentials.login_timeout > 0).then_some(credentials.login_timeout),
        }
    }
}

/// The primitive that turns a connection string into an open handle.
pub trait NativeConnect {
    type Handle;

    fn connect(
        &self,
        connection_string: &str,
        attrs_before: &PreConnectAttributes,
        options: &ConnectOptions,
    ) -> Result<Self::Handle>;
}

// odbc-sys 0.25 types the attribute as a closed enum; declare the raw entry point
// so driver-specific attribute ids can be passed through.
unsafe extern "system" {
    fn SQLSetConnectAttrW(hdbc: HDbc, attr: i32, value: Pointer, len: Integer) -> SqlReturn;
}

// SAFETY: mirrors odbc_api::Environment, which declares the same handle Sync.
struct SharedEnvironment(handles::Environment);

unsafe impl Sync for SharedEnvironment {}

// Only one ODBC environment may exist per process.
static ENVIRONMENT: OnceLock<std::result::Result<SharedEnvironment, String>> = OnceLock::new();

fn allocate_environment() -> std::result::Result<SharedEnvironment, String> {
    let environment = match handles::Environment::new() {
        SqlResult::Success(environment) | SqlResult::SuccessWithInfo(environment) => environment,
        _ => return Err("failed to allocate ODBC environment".to_string()),
    };
    environment
        .declare_version(AttrOdbcVersion::Odbc3_80)
        .into_result(&environment)
        .map_err(|e| e.to_string())?;

    Ok(SharedEnvironment(environment))
}

/// Handle to the process-wide ODBC environment.
#[derive(Clone, Copy)]
pub struct OdbcEnvironment {
    environment: &'static handles::Environment,
}

impl OdbcEnvironment {
    /// Returns the shared environment, allocating it on first use.
    pub fn new() -> Result<Self> {
        match ENVIRONMENT.get_or_init(allocate_environment) {
            Ok(SharedEnvironment(environment)) => Ok(Self { environment }),
            Err(message) => Err(AdapterError::connection_failed(message.clone())),
        }
    }

    pub fn is_same_environment(&self, other: &Self) -> bool {
        std::ptr::eq(self.environment, other.environment)
    }
}

/// An open ODBC connection, disconnected on drop.
pub struct OdbcConnection {
    handle: handles::Connection<'static>,
}

impl OdbcConnection {
    pub fn as_handle(&self) -> &handles::Connection<'static> {
        &self.handle
    }
}

impl Drop for OdbcConnection {
    fn drop(&mut self) {
        match self.handle.disconnect() {
            SqlResult::Success(()) | SqlResult::SuccessWithInfo(()) => {}
            _ => warn!("Failed to disconnect ODBC connection"),
        }
    }
}

/// Length argument for `SQLSetConnectAttr` with a binary value.
pub fn attribute_length(attribute: i32, value: &[u8]) -> Result<i32> {
    i32::try_from(value.len()).map_err(|_| {
        AdapterError::configuration(format!(
            "value of connection attribute {attribute} is too large"
        ))
    })
}

fn set_pre_connect_attribute(
    handle: &handles::Connection<'_>,
    attribute: i32,
    value: &[u8],
) -> Result<()> {
    let length = attribute_length(attribute, value)?;

    // `value` outlives the connect call that consumes it
    let ret = unsafe {
        SQLSetConnectAttrW(
            handle.as_sys(),
            attribute,
            value.as_ptr() as *mut c_void,
            length,
        )
    };

    if ret == SqlReturn::SUCCESS || ret == SqlReturn::SUCCESS_WITH_INFO {
        Ok(())
    } else {
        Err(AdapterError::connection_failed(format!(
            "SQLSetConnectAttr failed for attribute {attribute}"
        )))
    }
}

impl NativeConnect for OdbcEnvironment {
    type Handle = OdbcConnection;

    fn connect(
        &self,
        connection_string: &str,
        attrs_before: &PreConnectAttributes,
        options: &ConnectOptions,
    ) -> Result<OdbcConnection> {
        let mut handle = self
            .environment
            .allocate_connection()
            .into_result(self.environment)?;

        if let Some(seconds) = options.login_timeout_sec {
            handle.set_login_timeout_sec(seconds).into_result(&handle)?;
        }
        for (attribute, value) in attrs_before.iter() {
            set_pre_connect_attribute(&handle, attribute, value)?;
        }

        handle
            .connect_with_connection_string(&SqlText::new(connection_string))
            .into_result(&handle)?;

        Ok(OdbcConnection { handle })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Init,
    Open,
    Fail,
    Closed,
}

/// A named, adapter-tagged connection owned by the orchestration framework.
pub struct Connection<H> {
    pub adapter_type: String,
    pub name: String,
    pub credentials: Credentials,
    state: ConnectionState,
    handle: Option<H>,
}

impl<H> Connection<H> {
    pub fn new(
        adapter_type: impl Into<String>,
        name: impl Into<String>,
        credentials: Credentials,
    ) -> Self {
        Self {
            adapter_type: adapter_type.into(),
            name: name.into(),
            credentials,
            state: ConnectionState::Init,
            handle: None,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn is_open(&self) -> bool {
        self.state == ConnectionState::Open
    }

    pub fn handle(&self) -> Option<&H> {
        self.handle.as_ref()
    }

    pub fn into_handle(self) -> Option<H> {
        self.handle
    }

    /// Statement timeout the framework should apply to this connection.
    pub fn query_timeout(&self) -> Option<Duration> {
        match self.credentials.query_timeout {
            0 => None,
            secs => Some(Duration::from_secs(u64::from(secs))),
        }
    }

    /// Drops the handle, which closes the native connection.
    pub fn close(&mut self) {
        self.handle = None;
        self.state = ConnectionState::Closed;
    }
}

impl<H> fmt::Debug for Connection<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("adapter_type", &self.adapter_type)
            .field("name", &self.name)
            .field("state", &self.state)
            .field("credentials", &self.credentials)
            .finish_non_exhaustive()
    }
}

/// Opens SQL Server connections through the injected connector, fetching
/// access tokens from the injected provider when the credentials ask for one.
pub struct SqlServerConnectionManager<C, T> {
    connector: C,
    tokens: T,
}

impl<C, T> SqlServerConnectionManager<C, T>
where
    C: NativeConnect,
    T: TokenProvider,
{
    pub fn new(connector: C, tokens: T) -> Self {
        Self { connector, tokens }
    }

    /// Builds the connection string and opens exactly one native connection.
    ///
    /// Errors from the token provider and the connector are returned
    /// unchanged and leave the connection in [`ConnectionState::Fail`].
    pub fn open(&self, connection: &mut Connection<C::Handle>) -> Result<()> {
        if connection.is_open() {
            warn!(name = %connection.name, "Connection is already open, reopening");
        }

        let credentials = &connection.credentials;
        let conn_str = ConnectionString::for_credentials(credentials);
        debug!(connection_string = %conn_str, "Using connection string");

        let attrs_before = match pre_connect_attributes(credentials, &self.tokens) {
            Ok(attrs) => attrs,
            Err(e) => {
                connection.handle = None;
                connection.state = ConnectionState::Fail;
                return Err(e);
            }
        };
        let options = ConnectOptions::for_credentials(credentials);

        match self
            .connector
            .connect(&conn_str.expose(), &attrs_before, &options)
        {
            Ok(handle) => {
                debug!(database = %credentials.database, "Connected to db");
                connection.handle = Some(handle);
                connection.state = ConnectionState::Open;
                Ok(())
            }
            Err(e) => {
                connection.handle = None;
                connection.state = ConnectionState::Fail;
                Err(e)
            }
        }
    }
}
