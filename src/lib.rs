//! SQL Server adapter over ODBC.
//!
//! Turns a declarative [`Credentials`] record into an ODBC connection string,
//! resolves any pre-connection attributes required by the chosen
//! authentication mode, and opens a single connection through an injected
//! [`NativeConnect`] primitive.

pub mod error;
pub mod ffi;
pub mod logging;
pub mod odbc;


pub use error::{AdapterError, Result};
pub use odbc::attrs::{PreConnectAttributes, SQL_COPT_SS_ACCESS_TOKEN, pre_connect_attributes};
pub use odbc::conn::{
    Connection, ConnectionState, NativeConnect, OdbcConnection, OdbcEnvironment,
    SqlServerConnectionManager,
};
pub use odbc::conn_str::{ConnectionString, bool_to_connection_string_arg};
pub use odbc::credentials::{Authentication, Credentials, Encrypt};
pub use odbc::token::{AccessToken, AzureCliCredential, TokenProvider};
