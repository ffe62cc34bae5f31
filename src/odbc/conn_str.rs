use std::fmt;

use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

use super::credentials::{Authentication, Credentials, Encrypt};

const MASKED_PASSWORD: &str = "PWD=***";

/// Renders a boolean driver flag as `key=Yes` or `key=No`.
pub fn bool_to_connection_string_arg(key: &str, value: bool) -> String {
    format!("{key}={}", if value { "Yes" } else { "No" })
}

/// `encrypt=strict` is passed through as is, it is not a Yes/No flag.
pub fn encrypt_to_connection_string_arg(encrypt: Encrypt) -> String {
    match encrypt {
        Encrypt::Strict => "encrypt=strict".to_string(),
        Encrypt::Yes => bool_to_connection_string_arg("encrypt", true),
        Encrypt::No => bool_to_connection_string_arg("encrypt", false),
    }
}

/// Wraps a value in braces, doubling any closing brace inside it.
fn braced(value: &str) -> String {
    format!("{{{}}}", value.replace('}', "}}"))
}

fn application_name() -> String {
    format!("{}/{}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"))
}

/// An ODBC connection string assembled from [`Credentials`].
///
/// The string may hold a password, so `Display` and `Debug` print the masked
/// form and the buffer is zeroed on drop. Use [`ConnectionString::expose`] to
/// hand the real string to the driver.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct ConnectionString {
    tokens: Vec<String>,
    password_index: Option<usize>,
}

impl ConnectionString {
    pub fn for_credentials(credentials: &Credentials) -> Self {
        let mut conn_str = Self {
            tokens: Vec::with_capacity(10),
            password_index: None,
        };

        conn_str.push(format!("DRIVER={}", braced(&credentials.driver)));
        if credentials.is_named_instance() {
            conn_str.push(format!("SERVER={}", credentials.host));
        } else {
            conn_str.push(format!("SERVER={},{}", credentials.host, credentials.port));
        }
        conn_str.push(format!("Database={}", credentials.database));

        conn_str.push_authentication(credentials);

        conn_str.push(encrypt_to_connection_string_arg(credentials.encrypt));
        conn_str.push(bool_to_connection_string_arg(
            "TrustServerCertificate",
            credentials.trust_cert,
        ));
        conn_str.push(format!("APP={}", application_name()));

        conn_str
    }

    fn push_authentication(&mut self, credentials: &Credentials) {
        let user = credentials.user.as_deref();
        let password = credentials.password.as_ref().map(|p| p.expose());

        if let Some(keyword) = credentials.authentication.driver_keyword() {
            self.push(format!("Authentication={keyword}"));
        }

        match credentials.authentication {
            Authentication::ActiveDirectoryPassword => {
                self.push_user(user);
                self.push_password(password);
            }
            Authentication::ActiveDirectoryInteractive => self.push_user(user),
            Authentication::ActiveDirectoryServicePrincipal => {
                self.push_user(credentials.client_id.as_deref());
                self.push_password(credentials.client_secret.as_ref().map(|s| s.expose()));
            }
            Authentication::ActiveDirectoryIntegrated | Authentication::ActiveDirectoryMsi => {}
            Authentication::Sql if credentials.windows_login => {
                self.push("trusted_connection=Yes".to_string());
            }
            Authentication::Sql => {
                self.push_user(user);
                self.push_password(password);
            }
            // token goes in as a pre-connection attribute
            Authentication::Cli => {}
        }
    }

    fn push(&mut self, token: String) {
        self.tokens.push(token);
    }

    fn push_user(&mut self, user: Option<&str>) {
        if let Some(user) = user {
            self.push(format!("UID={}", braced(user)));
        }
    }

    fn push_password(&mut self, password: Option<&str>) {
        if let Some(password) = password {
            self.password_index = Some(self.tokens.len());
            self.push(format!("PWD={}", braced(password)));
        }
    }

    pub fn tokens(&self) -> impl Iterator<Item = &str> {
        self.tokens.iter().map(String::as_str)
    }

    /// The full string including secrets, for the driver only.
    pub fn expose(&self) -> Zeroizing<String> {
        Zeroizing::new(self.tokens.join(";"))
    }

    /// The string with the password replaced, safe for logs.
    pub fn masked(&self) -> String {
        self.tokens
            .iter()
            .enumerate()
            .map(|(index, token)| {
                if Some(index) == self.password_index {
                    MASKED_PASSWORD
                } else {
                    token.as_str()
                }
            })
            .collect::<Vec<_>>()
            .join(";")
    }
}

impl fmt::Display for ConnectionString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.masked())
    }
}

impl fmt::Debug for ConnectionString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ConnectionString").field(&self.masked()).finish()
    }
}
