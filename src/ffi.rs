use std::ffi::CStr;
use std::os::raw::{c_char, c_int};
use std::panic::{self, AssertUnwindSafe};
use std::ptr;

use crate::error::AdapterError;
use crate::logging::init_logging;
use crate::odbc::conn::{
    ADAPTER_TYPE, Connection, NativeConnect, OdbcConnection, OdbcEnvironment,
    SqlServerConnectionManager,
};
use crate::odbc::credentials::Credentials;
use crate::odbc::token::{AzureCliCredential, TokenProvider};

#[repr(C)]
pub struct SqlServerConnectionHandle {
    connection: Option<OdbcConnection>,
}

#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SqlServerError {
    Success = 0,
    ConnectionError = 1,
    StringConversionError = 2,
    InvalidHandle = 3,
    NullPointer = 4,
    ConfigurationError = 5,
    AuthenticationError = 6,
    Panic = 7,
}

impl From<&AdapterError> for SqlServerError {
    fn from(err: &AdapterError) -> Self {
        match err {
            AdapterError::Configuration { .. } | AdapterError::Io { .. } => {
                Self::ConfigurationError
            }
            AdapterError::Authentication { .. } => Self::AuthenticationError,
            AdapterError::Odbc(_) | AdapterError::Connection { .. } => Self::ConnectionError,
        }
    }
}

/// Opens a connection into `slot`. The slot is emptied first, so a failed
/// reopen never leaves the previous connection behind.
pub(crate) fn open_into<C, T>(
    slot: &mut Option<C::Handle>,
    manager: &SqlServerConnectionManager<C, T>,
    name: &str,
    credentials: Credentials,
) -> Result<(), SqlServerError>
where
    C: NativeConnect,
    T: TokenProvider,
{
    *slot = None;

    let mut connection = Connection::new(ADAPTER_TYPE, name, credentials);
    manager
        .open(&mut connection)
        .map_err(|e| SqlServerError::from(&e))?;

    *slot = connection.into_handle();
    Ok(())
}

/// Installs the process-wide log subscriber; only the first call succeeds.
#[unsafe(no_mangle)]
pub extern "C" fn sqlserver_init_logging(verbose: u8) -> c_int {
    match init_logging(verbose, false) {
        Ok(()) => SqlServerError::Success as c_int,
        Err(_) => SqlServerError::ConfigurationError as c_int,
    }
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn sqlserver_create_connection() -> *mut SqlServerConnectionHandle {
    match OdbcEnvironment::new() {
        Ok(_) => Box::into_raw(Box::new(SqlServerConnectionHandle { connection: None })),
        Err(_) => ptr::null_mut(),
    }
}

/// Opens a connection described by a JSON credentials document.
///
/// # Safety
/// `handle` must come from [`sqlserver_create_connection`]; `name` and
/// `credentials_json` must be valid NUL-terminated strings.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn sqlserver_open(
    handle: *mut SqlServerConnectionHandle,
    name: *const c_char,
    credentials_json: *const c_char,
) -> c_int {
    if handle.is_null() || name.is_null() || credentials_json.is_null() {
        return SqlServerError::NullPointer as c_int;
    }

    let result = panic::catch_unwind(AssertUnwindSafe(|| {
        let handle_ref = unsafe { &mut *handle };

        let name = unsafe { CStr::from_ptr(name) }
            .to_str()
            .map_err(|_| SqlServerError::StringConversionError)?;
        let json = unsafe { CStr::from_ptr(credentials_json) }
            .to_str()
            .map_err(|_| SqlServerError::StringConversionError)?;

        handle_ref.connection = None;
        let credentials = Credentials::from_json(json).map_err(|e| SqlServerError::from(&e))?;

        let environment = OdbcEnvironment::new().map_err(|e| SqlServerError::from(&e))?;
        let tokens = AzureCliCredential::new().with_tenant(credentials.tenant_id.clone());
        let manager = SqlServerConnectionManager::new(environment, tokens);

        open_into(&mut handle_ref.connection, &manager, name, credentials)
    }));

    match result {
        Ok(Ok(())) => SqlServerError::Success as c_int,
        Ok(Err(err)) => err as c_int,
        Err(_) => SqlServerError::Panic as c_int,
    }
}

/// Returns 1 when the handle holds an open connection, 0 otherwise.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn sqlserver_is_open(handle: *const SqlServerConnectionHandle) -> c_int {
    if handle.is_null() {
        return 0;
    }

    let handle_ref = unsafe { &*handle };
    c_int::from(handle_ref.connection.is_some())
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn sqlserver_free_connection(
    handle: *mut SqlServerConnectionHandle,
) -> c_int {
    if handle.is_null() {
        return SqlServerError::InvalidHandle as c_int;
    }

    let _ = unsafe { Box::from_raw(handle) };
    SqlServerError::Success as c_int
}
