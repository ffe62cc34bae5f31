pub mod attrs;
pub mod conn;
pub mod conn_str;
pub mod credentials;
pub mod token;
