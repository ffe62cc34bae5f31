//! ODBC attributes that must be set on the connection handle before the
//! driver connects.

use std::collections::BTreeMap;
use std::fmt;

use zeroize::Zeroize;

use super::credentials::{Authentication, Credentials};
use super::token::{AZURE_SQL_SCOPE, TokenProvider};
use crate::error::{AdapterError, Result};

/// Driver-specific connection attribute taking an access token struct.
pub const SQL_COPT_SS_ACCESS_TOKEN: i32 = 1256;

/// Attribute key to raw value. Values may be credentials, so `Debug` only
/// lists keys.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct PreConnectAttributes(BTreeMap<i32, Vec<u8>>);

impl PreConnectAttributes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, attribute: i32, value: Vec<u8>) {
        if let Some(mut previous) = self.0.insert(attribute, value) {
            previous.zeroize();
        }
    }

    pub fn get(&self, attribute: i32) -> Option<&[u8]> {
        self.0.get(&attribute).map(Vec::as_slice)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn keys(&self) -> impl Iterator<Item = i32> + '_ {
        self.0.keys().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (i32, &[u8])> {
        self.0.iter().map(|(k, v)| (*k, v.as_slice()))
    }
}

impl Drop for PreConnectAttributes {
    fn drop(&mut self) {
        self.0.values_mut().for_each(Zeroize::zeroize);
    }
}

impl fmt::Debug for PreConnectAttributes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.0.keys()).finish()
    }
}

/// Encodes a token the way the SQL Server driver expects it: UTF-16LE bytes
/// prefixed with their length as a little-endian u32.
pub fn encode_access_token(token: &str) -> Result<Vec<u8>> {
    let mut body: Vec<u8> = token.encode_utf16().flat_map(u16::to_le_bytes).collect();
    let prefix = token_length_prefix(body.len());

    let encoded = prefix.map(|prefix| {
        let mut encoded = Vec::with_capacity(prefix.len() + body.len());
        encoded.extend_from_slice(&prefix);
        encoded.extend_from_slice(&body);
        encoded
    });
    body.zeroize();
    encoded
}

/// Little-endian u32 byte count that leads the token struct.
pub fn token_length_prefix(byte_len: usize) -> Result<[u8; 4]> {
    u32::try_from(byte_len)
        .map(u32::to_le_bytes)
        .map_err(|_| {
            AdapterError::configuration(format!(
                "access token of {byte_len} bytes does not fit the driver's length prefix"
            ))
        })
}

/// Resolves the attributes the selected authentication mode needs before
/// connecting. Only token-based modes produce entries; token failures are
/// returned as is.
pub fn pre_connect_attributes<T>(
    credentials: &Credentials,
    tokens: &T,
) -> Result<PreConnectAttributes>
where
    T: TokenProvider + ?Sized,
{
    let mut attrs = PreConnectAttributes::new();

    match credentials.authentication {
        Authentication::Cli => {
            let token = tokens.get_token(AZURE_SQL_SCOPE)?;
            attrs.insert(SQL_COPT_SS_ACCESS_TOKEN, encode_access_token(token.token())?);
        }
        Authentication::Sql
        | Authentication::ActiveDirectoryPassword
        | Authentication::ActiveDirectoryInteractive
        | Authentication::ActiveDirectoryIntegrated
        | Authentication::ActiveDirectoryMsi
        | Authentication::ActiveDirectoryServicePrincipal => {}
    }

    Ok(attrs)
}
