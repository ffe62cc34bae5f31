#[cfg(test)]
mod tests {
    use std::env;
    use std::time::Duration;

    use crate::error::AdapterError;
    use crate::odbc::attrs::{SQL_COPT_SS_ACCESS_TOKEN, encode_access_token};
    use crate::odbc::conn::{
        ADAPTER_TYPE, Connection, ConnectionState, OdbcEnvironment, SqlServerConnectionManager,
        attribute_length,
    };
    use crate::odbc::credentials::{Authentication, Credentials, Encrypt};
    use crate::tests::support::{
        DRIVER, NoSessionTokenProvider, RecordingConnector, StaticTokenProvider, credentials,
    };

    fn connection(credentials: Credentials) -> Connection<usize> {
        Connection::new(ADAPTER_TYPE, "test", credentials)
    }

    #[test]
    fn test_encrypt_strict() {
        let connector = RecordingConnector::default();
        let manager = SqlServerConnectionManager::new(&connector, NoSessionTokenProvider);
        let mut conn = connection(credentials().with_encrypt(Encrypt::Strict));

        manager.open(&mut conn).expect("open");

        assert!(connector.last_connection_string().contains("encrypt=strict"));
    }

    #[test]
    fn test_encrypt_true() {
        let connector = RecordingConnector::default();
        let manager = SqlServerConnectionManager::new(&connector, NoSessionTokenProvider);
        let mut conn = connection(credentials().with_encrypt(true));

        manager.open(&mut conn).expect("open");

        assert!(connector.last_connection_string().contains("encrypt=Yes"));
    }

    #[test]
    fn test_encrypt_false() {
        let connector = RecordingConnector::default();
        let manager = SqlServerConnectionManager::new(&connector, NoSessionTokenProvider);
        let mut conn = connection(credentials().with_encrypt(false));

        manager.open(&mut conn).expect("open");

        let conn_str = connector.last_connection_string();
        assert!(conn_str.contains("encrypt=No"));
        assert!(!conn_str.contains("encrypt=strict"));
    }

    #[test]
    fn test_open_transitions_to_open() {
        let connector = RecordingConnector::default();
        let manager = SqlServerConnectionManager::new(&connector, NoSessionTokenProvider);
        let mut conn = connection(credentials());
        assert_eq!(conn.state(), ConnectionState::Init);
        assert!(conn.handle().is_none());

        manager.open(&mut conn).expect("open");

        assert!(conn.is_open());
        assert_eq!(conn.handle(), Some(&1));
        assert_eq!(conn.adapter_type, "sqlserver");
        assert_eq!(conn.name, "test");

        let calls = connector.calls.borrow();
        assert_eq!(calls.len(), 1);
        assert!(calls[0].attrs_before.is_empty());
        assert!(calls[0].connection_string.starts_with(&format!("DRIVER={{{DRIVER}}}")));
    }

    #[test]
    fn test_opening_twice_connects_twice() {
        let connector = RecordingConnector::default();
        let manager = SqlServerConnectionManager::new(&connector, NoSessionTokenProvider);

        let mut first = connection(credentials());
        let mut second = connection(credentials());
        manager.open(&mut first).expect("open first");
        manager.open(&mut second).expect("open second");
        assert_eq!(connector.call_count(), 2);

        manager.open(&mut first).expect("reopen");
        assert_eq!(connector.call_count(), 3);
        assert_eq!(first.handle(), Some(&3));
    }

    #[test]
    fn test_connect_failure_propagates() {
        let connector = RecordingConnector::failing("Login timeout expired");
        let manager = SqlServerConnectionManager::new(&connector, NoSessionTokenProvider);
        let mut conn = connection(credentials());

        let err = manager.open(&mut conn).unwrap_err();

        match err {
            AdapterError::Connection { context } => assert_eq!(context, "Login timeout expired"),
            other => panic!("expected connection error, got {other:?}"),
        }
        assert_eq!(conn.state(), ConnectionState::Fail);
        assert!(conn.handle().is_none());
        assert_eq!(connector.call_count(), 1, "no retry on failure");
    }

    #[test]
    fn test_cli_token_reaches_connector() {
        let connector = RecordingConnector::default();
        let tokens = StaticTokenProvider::new("token-value");
        let manager = SqlServerConnectionManager::new(&connector, &tokens);
        let mut conn = connection(credentials().with_authentication(Authentication::Cli));

        manager.open(&mut conn).expect("open");

        let calls = connector.calls.borrow();
        assert_eq!(
            calls[0].attrs_before.get(SQL_COPT_SS_ACCESS_TOKEN),
            Some(encode_access_token("token-value").expect("encode").as_slice())
        );
        assert!(!calls[0].connection_string.contains("token-value"));
    }

    #[test]
    fn test_token_failure_skips_connect() {
        let connector = RecordingConnector::default();
        let manager = SqlServerConnectionManager::new(&connector, NoSessionTokenProvider);
        let mut conn = connection(credentials().with_authentication(Authentication::Cli));

        let err = manager.open(&mut conn).unwrap_err();

        assert!(matches!(err, AdapterError::Authentication { .. }));
        assert_eq!(connector.call_count(), 0);
        assert_eq!(conn.state(), ConnectionState::Fail);
    }

    #[test]
    fn test_login_timeout_is_forwarded() {
        let connector = RecordingConnector::default();
        let manager = SqlServerConnectionManager::new(&connector, NoSessionTokenProvider);

        let mut with_timeout = connection(credentials().with_login_timeout(15));
        manager.open(&mut with_timeout).expect("open");
        let mut without_timeout = connection(credentials());
        manager.open(&mut without_timeout).expect("open");

        let calls = connector.calls.borrow();
        assert_eq!(calls[0].options.login_timeout_sec, Some(15));
        assert_eq!(calls[1].options.login_timeout_sec, None);
    }

    #[test]
    fn test_query_timeout_and_close() {
        let connector = RecordingConnector::default();
        let manager = SqlServerConnectionManager::new(&connector, NoSessionTokenProvider);
        let mut creds = credentials();
        creds.query_timeout = 30;
        let mut conn = connection(creds);

        manager.open(&mut conn).expect("open");
        assert_eq!(conn.query_timeout(), Some(Duration::from_secs(30)));

        conn.close();
        assert_eq!(conn.state(), ConnectionState::Closed);
        assert!(conn.handle().is_none());
    }

    #[test]
    fn test_token_failure_on_reopen_drops_previous_handle() {
        let connector = RecordingConnector::default();
        let tokens = StaticTokenProvider::new("token-value");
        let signed_in = SqlServerConnectionManager::new(&connector, &tokens);
        let signed_out = SqlServerConnectionManager::new(&connector, NoSessionTokenProvider);
        let mut conn = connection(credentials().with_authentication(Authentication::Cli));

        signed_in.open(&mut conn).expect("open");
        assert_eq!(conn.handle(), Some(&1));

        let err = signed_out.open(&mut conn).unwrap_err();

        assert!(matches!(err, AdapterError::Authentication { .. }));
        assert_eq!(conn.state(), ConnectionState::Fail);
        assert!(conn.handle().is_none());
        assert_eq!(connector.call_count(), 1);
    }

    #[test]
    fn test_connect_failure_on_reopen_drops_previous_handle() {
        let connector = RecordingConnector::default();
        let refusing = RecordingConnector::failing("Login failed for user");
        let mut conn = connection(credentials());

        SqlServerConnectionManager::new(&connector, NoSessionTokenProvider)
            .open(&mut conn)
            .expect("open");
        assert!(conn.is_open());

        let err = SqlServerConnectionManager::new(&refusing, NoSessionTokenProvider)
            .open(&mut conn)
            .unwrap_err();

        assert!(matches!(err, AdapterError::Connection { .. }));
        assert_eq!(conn.state(), ConnectionState::Fail);
        assert!(conn.handle().is_none());
    }

    #[test]
    fn test_environment_is_shared() {
        let first = OdbcEnvironment::new().expect("odbc environment");
        let second = OdbcEnvironment::new().expect("odbc environment");

        assert!(first.is_same_environment(&second));
    }

    #[test]
    fn test_attribute_length() {
        let token = encode_access_token("abc").expect("encode");

        assert_eq!(attribute_length(SQL_COPT_SS_ACCESS_TOKEN, &token).unwrap(), 10);
        assert_eq!(attribute_length(SQL_COPT_SS_ACCESS_TOKEN, &[]).unwrap(), 0);
    }

    #[test]
    fn test_odbc_connector_attempts_token_connection() {
        let environment = OdbcEnvironment::new().expect("odbc environment");
        let tokens = StaticTokenProvider::new("token-value");
        let manager = SqlServerConnectionManager::new(environment, &tokens);
        let creds = Credentials::new(
            "sqlserver_odbc test driver that is not installed",
            "localhost",
            "dbt",
            "sqlserver",
        )
        .with_authentication(Authentication::Cli);
        let mut conn = Connection::new(ADAPTER_TYPE, "token", creds);

        let err = manager.open(&mut conn).unwrap_err();

        // the driver manager, not the adapter, rejects the unknown driver
        assert!(
            matches!(err, AdapterError::Odbc(_) | AdapterError::Connection { .. }),
            "unexpected error: {err:?}"
        );
        assert_eq!(tokens.scopes.borrow().len(), 1);
        assert_eq!(conn.state(), ConnectionState::Fail);
        assert!(conn.handle().is_none());
    }

    #[test]
    #[ignore = "requires TEST_DATABASE_URL pointing at a SQL Server credentials file"]
    fn test_connect_success() {
        let path = env::var("TEST_DATABASE_URL").expect("TEST_DATABASE_URL not set");
        let creds = Credentials::from_file(path).expect("load credentials");

        let environment = OdbcEnvironment::new().expect("odbc environment");
        let manager = SqlServerConnectionManager::new(environment, NoSessionTokenProvider);
        let mut conn = Connection::new(ADAPTER_TYPE, "live", creds);

        let result = manager.open(&mut conn);

        assert!(result.is_ok(), "Expected Ok(()), got {:?}", result);
        assert!(conn.is_open());
        assert!(conn.handle().map(|c| c.as_handle()).is_some());
    }
}
