//! Declarative credentials for a SQL Server target.
//!
//! Secrets are held in [`Secret`] containers which are zeroed on drop and
//! never printed by `Debug`.

use std::fmt;
use std::path::Path;

use serde::de::{self, Deserializer};
use serde::Deserialize;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::{AdapterError, Result};

pub const DEFAULT_PORT: u16 = 1433;

/// A sensitive string value, zeroed when dropped.
#[derive(Clone, PartialEq, Eq, Deserialize, Zeroize, ZeroizeOnDrop)]
#[serde(transparent)]
pub struct Secret(String);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(***)")
    }
}

/// How the driver is asked to authenticate.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub enum Authentication {
    /// Plain SQL Server login (or Windows login when `windows_login` is set)
    #[default]
    #[serde(rename = "sql", alias = "SQL")]
    Sql,
    ActiveDirectoryPassword,
    ActiveDirectoryInteractive,
    ActiveDirectoryIntegrated,
    ActiveDirectoryMsi,
    #[serde(alias = "serviceprincipal", alias = "ServicePrincipal")]
    ActiveDirectoryServicePrincipal,
    /// Access token obtained from the Azure CLI and injected before connect
    #[serde(rename = "cli", alias = "CLI")]
    Cli,
}

impl Authentication {
    /// The value of the driver's `Authentication=` keyword, for the modes the
    /// driver handles natively.
    pub fn driver_keyword(&self) -> Option<&'static str> {
        match self {
            Self::ActiveDirectoryPassword => Some("ActiveDirectoryPassword"),
            Self::ActiveDirectoryInteractive => Some("ActiveDirectoryInteractive"),
            Self::ActiveDirectoryIntegrated => Some("ActiveDirectoryIntegrated"),
            Self::ActiveDirectoryMsi => Some("ActiveDirectoryMsi"),
            Self::ActiveDirectoryServicePrincipal => Some("ActiveDirectoryServicePrincipal"),
            Self::Sql | Self::Cli => None,
        }
    }
}

/// Transport encryption mode.
///
/// `Strict` is only meaningful for `encrypt`; other driver flags stay boolean.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Encrypt {
    #[default]
    Yes,
    No,
    Strict,
}

impl From<bool> for Encrypt {
    fn from(value: bool) -> Self {
        if value { Self::Yes } else { Self::No }
    }
}

impl<'de> Deserialize<'de> for Encrypt {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Flag(bool),
            Mode(String),
        }

        match Raw::deserialize(deserializer)? {
            Raw::Flag(flag) => Ok(flag.into()),
            Raw::Mode(mode) if mode.eq_ignore_ascii_case("strict") => Ok(Self::Strict),
            Raw::Mode(other) => Err(de::Error::custom(format!(
                "invalid encrypt value `{other}`, expected a boolean or \"strict\""
            ))),
        }
    }
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

/// Connection settings for one SQL Server target.
#[derive(Debug, Clone, Deserialize)]
pub struct Credentials {
    pub driver: String,
    pub host: String,
    pub database: String,
    pub schema: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default, alias = "UID", alias = "username")]
    pub user: Option<String>,
    #[serde(default, alias = "PWD", alias = "pass")]
    pub password: Option<Secret>,
    #[serde(default, alias = "trusted_connection")]
    pub windows_login: bool,
    #[serde(default)]
    pub tenant_id: Option<String>,
    #[serde(default)]
    pub client_id: Option<String>,
    #[serde(default)]
    pub client_secret: Option<Secret>,
    #[serde(default)]
    pub authentication: Authentication,
    #[serde(default)]
    pub encrypt: Encrypt,
    #[serde(default)]
    pub trust_cert: bool,
    /// Seconds, 0 leaves the driver default
    #[serde(default)]
    pub login_timeout: u32,
    /// Seconds, 0 disables the statement timeout
    #[serde(default)]
    pub query_timeout: u32,
    #[serde(default)]
    pub schema_authorization: Option<String>,
}

impl Credentials {
    pub fn new(
        driver: impl Into<String>,
        host: impl Into<String>,
        database: impl Into<String>,
        schema: impl Into<String>,
    ) -> Self {
        Self {
            driver: driver.into(),
            host: host.into(),
            database: database.into(),
            schema: schema.into(),
            port: DEFAULT_PORT,
            user: None,
            password: None,
            windows_login: false,
            tenant_id: None,
            client_id: None,
            client_secret: None,
            authentication: Authentication::default(),
            encrypt: Encrypt::default(),
            trust_cert: false,
            login_timeout: 0,
            query_timeout: 0,
            schema_authorization: None,
        }
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_encrypt(mut self, encrypt: impl Into<Encrypt>) -> Self {
        self.encrypt = encrypt.into();
        self
    }

    pub fn with_trust_cert(mut self, trust_cert: bool) -> Self {
        self.trust_cert = trust_cert;
        self
    }

    pub fn with_authentication(mut self, authentication: Authentication) -> Self {
        self.authentication = authentication;
        self
    }

    pub fn with_user(mut self, user: impl Into<String>, password: Option<&str>) -> Self {
        self.user = Some(user.into());
        self.password = password.map(Secret::new);
        self
    }

    pub fn with_service_principal(
        mut self,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
    ) -> Self {
        self.client_id = Some(client_id.into());
        self.client_secret = Some(Secret::new(client_secret));
        self
    }

    pub fn with_windows_login(mut self, windows_login: bool) -> Self {
        self.windows_login = windows_login;
        self
    }

    pub fn with_login_timeout(mut self, seconds: u32) -> Self {
        self.login_timeout = seconds;
        self
    }

    /// Parses and validates a JSON credentials document.
    pub fn from_json(json: &str) -> Result<Self> {
        let credentials: Self = serde_json::from_str(json)
            .map_err(|e| AdapterError::configuration(format!("invalid credentials: {e}")))?;
        credentials.validate()?;
        Ok(credentials)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .map_err(|e| AdapterError::io(format!("reading {}", path.display()), e))?;
        Self::from_json(&json)
    }

    /// A named instance (`host\instance`) is resolved by the SQL Browser, so
    /// no port may be given for it.
    pub fn is_named_instance(&self) -> bool {
        self.host.contains('\\')
    }

    /// Checks required fields and the fields each authentication mode needs.
    pub fn validate(&self) -> Result<()> {
        for (field, value) in [
            ("driver", &self.driver),
            ("host", &self.host),
            ("database", &self.database),
            ("schema", &self.schema),
        ] {
            if value.trim().is_empty() {
                return Err(AdapterError::configuration(format!(
                    "`{field}` must not be empty"
                )));
            }
        }

        match self.authentication {
            Authentication::ActiveDirectoryPassword => {
                self.require(self.user.is_some(), "user")?;
                self.require(self.password.is_some(), "password")
            }
            Authentication::ActiveDirectoryInteractive => self.require(self.user.is_some(), "user"),
            Authentication::ActiveDirectoryServicePrincipal => {
                self.require(self.client_id.is_some(), "client_id")?;
                self.require(self.client_secret.is_some(), "client_secret")
            }
            Authentication::Sql
            | Authentication::ActiveDirectoryIntegrated
            | Authentication::ActiveDirectoryMsi
            | Authentication::Cli => Ok(()),
        }
    }

    fn require(&self, present: bool, field: &str) -> Result<()> {
        if present {
            Ok(())
        } else {
            Err(AdapterError::configuration(format!(
                "`{field}` is required for {:?} authentication",
                self.authentication
            )))
        }
    }
}
