#[cfg(test)]
mod tests {
    use std::io::Write;

    use crate::error::AdapterError;
    use crate::odbc::credentials::{Authentication, Credentials, DEFAULT_PORT, Encrypt};

    const MINIMAL: &str = r#"{
        "driver": "ODBC Driver 18 for SQL Server",
        "host": "fake.sql.sqlserver.net",
        "database": "dbt",
        "schema": "sqlserver"
    }"#;

    #[test]
    fn test_defaults() {
        let creds = Credentials::from_json(MINIMAL).expect("minimal credentials");

        assert_eq!(creds.port, DEFAULT_PORT);
        assert_eq!(creds.authentication, Authentication::Sql);
        assert_eq!(creds.encrypt, Encrypt::Yes);
        assert!(!creds.trust_cert);
        assert!(!creds.windows_login);
        assert_eq!(creds.login_timeout, 0);
    }

    #[test]
    fn test_encrypt_accepts_bool_and_strict() {
        let cases = [
            (r#"true"#, Encrypt::Yes),
            (r#"false"#, Encrypt::No),
            (r#""strict""#, Encrypt::Strict),
            (r#""Strict""#, Encrypt::Strict),
        ];

        for (raw, expected) in cases {
            let encrypt: Encrypt = serde_json::from_str(raw).expect(raw);
            assert_eq!(encrypt, expected, "input {raw}");
        }
    }

    #[test]
    fn test_encrypt_rejects_other_strings() {
        assert!(serde_json::from_str::<Encrypt>(r#""optional""#).is_err());
    }

    #[test]
    fn test_field_aliases() {
        let json = r#"{
            "driver": "ODBC Driver 18 for SQL Server",
            "host": "fake.sql.sqlserver.net",
            "database": "dbt",
            "schema": "sqlserver",
            "UID": "dbt_user",
            "PWD": "hunter2",
            "trusted_connection": false,
            "authentication": "serviceprincipal",
            "client_id": "app",
            "client_secret": "shh",
            "encrypt": "strict"
        }"#;

        let creds = Credentials::from_json(json).expect("aliased credentials");

        assert_eq!(creds.user.as_deref(), Some("dbt_user"));
        assert_eq!(creds.password.as_ref().map(|p| p.expose()), Some("hunter2"));
        assert_eq!(
            creds.authentication,
            Authentication::ActiveDirectoryServicePrincipal
        );
        assert_eq!(creds.encrypt, Encrypt::Strict);
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let creds = Credentials::new("d", "h", "db", "s")
            .with_user("dbt_user", Some("hunter2"))
            .with_service_principal("app", "shh-secret");

        let printed = format!("{creds:?}");

        assert!(!printed.contains("hunter2"));
        assert!(!printed.contains("shh-secret"));
        assert!(printed.contains("dbt_user"));
    }

    #[test]
    fn test_missing_required_field_is_configuration_error() {
        let err = Credentials::from_json(r#"{"driver": "d", "host": "h"}"#).unwrap_err();
        assert!(matches!(err, AdapterError::Configuration { .. }));
    }

    #[test]
    fn test_empty_host_rejected() {
        let creds = Credentials::new("d", "  ", "db", "s");
        let err = creds.validate().unwrap_err();
        assert_eq!(err.to_string(), "Configuration error: `host` must not be empty");
    }

    #[test]
    fn test_mode_specific_requirements() {
        let password = Credentials::new("d", "h", "db", "s")
            .with_authentication(Authentication::ActiveDirectoryPassword)
            .with_user("someone", None);
        assert!(password.validate().is_err());

        let principal = Credentials::new("d", "h", "db", "s")
            .with_authentication(Authentication::ActiveDirectoryServicePrincipal);
        assert!(principal.validate().is_err());

        let cli = Credentials::new("d", "h", "db", "s").with_authentication(Authentication::Cli);
        assert!(cli.validate().is_ok());
    }

    #[test]
    fn test_unknown_authentication_rejected() {
        let json = MINIMAL.replace(
            r#""schema": "sqlserver""#,
            r#""schema": "sqlserver", "authentication": "kerberos""#,
        );
        assert!(Credentials::from_json(&json).is_err());
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        file.write_all(MINIMAL.as_bytes()).expect("write credentials");

        let creds = Credentials::from_file(file.path()).expect("load credentials");
        assert_eq!(creds.database, "dbt");
    }

    #[test]
    fn test_from_missing_file() {
        let err = Credentials::from_file("/nonexistent/credentials.json").unwrap_err();
        assert!(matches!(err, AdapterError::Io { .. }));
    }

    #[test]
    fn test_named_instance_detection() {
        assert!(Credentials::new("d", r"host\INST", "db", "s").is_named_instance());
        assert!(!Credentials::new("d", "host", "db", "s").is_named_instance());
    }
}
