use std::path::PathBuf;

use anyhow::{Context, Error};
use clap::Parser;
use tracing::info;

use sqlserver_odbc::logging::init_logging;
use sqlserver_odbc::odbc::conn::ADAPTER_TYPE;
use sqlserver_odbc::{
    AzureCliCredential, Connection, ConnectionString, Credentials, OdbcEnvironment,
    SqlServerConnectionManager,
};

/// Opens a SQL Server connection over ODBC from a JSON credentials file.
#[derive(Parser)]
#[command(name = "sqlserver-odbc", version)]
struct Cli {
    /// Path to the JSON credentials document
    #[arg(short, long, env = "SQLSERVER_CREDENTIALS")]
    credentials: PathBuf,

    /// Logical connection name
    #[arg(short, long, default_value = "default")]
    name: String,

    /// Print the connection string with the password masked and exit
    #[arg(long)]
    print: bool,

    /// Increase verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Only log errors
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,
}

fn main() -> Result<(), Error> {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.quiet)?;

    let credentials = Credentials::from_file(&cli.credentials)
        .with_context(|| format!("loading {}", cli.credentials.display()))?;

    if cli.print {
        println!("{}", ConnectionString::for_credentials(&credentials).masked());
        return Ok(());
    }

    let environment = OdbcEnvironment::new().context("initializing ODBC environment")?;
    let tokens = AzureCliCredential::new().with_tenant(credentials.tenant_id.clone());
    let manager = SqlServerConnectionManager::new(environment, tokens);

    let mut connection = Connection::new(ADAPTER_TYPE, cli.name, credentials);
    manager
        .open(&mut connection)
        .with_context(|| format!("opening connection `{}`", connection.name))?;

    info!(
        name = %connection.name,
        database = %connection.credentials.database,
        "Connection opened"
    );

    Ok(())
}
