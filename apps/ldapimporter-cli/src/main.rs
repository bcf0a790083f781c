//! ldapimporter - import directory users into the local identity store
//!
//! Runs one import session against the configured LDAP/AD server:
//! - Loads the `cas_import_*` settings from a YAML file
//! - Registers establishments in PostgreSQL (or in memory for a dry run)
//! - Writes the resulting accounts as CSV and optionally as JSON

use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::Parser;
use tracing::{info, warn};

use ldapimporter_core::prelude::*;
use ldapimporter_db::PgRecordStore;
use ldapimporter_ldap::{LdapConfig, LdapDirectoryClient};

mod config;
mod error;
mod logging;

use error::CliResult;

/// Import users and groups from an LDAP or Active Directory server
#[derive(Parser, Debug)]
#[command(name = "ldapimporter")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// YAML configuration file (`ldapimporter: { cas_import_*: ... }`)
    #[arg(short, long, env = "LDAPIMPORTER_CONFIG")]
    config: PathBuf,

    /// CSV output file
    #[arg(long, default_value = "accounts.csv")]
    csv: PathBuf,

    /// Also write the full user mapping as JSON to this file
    #[arg(long)]
    text: Option<PathBuf>,

    /// Pretty-print the JSON output
    #[arg(long, requires = "text")]
    pretty: bool,

    /// PostgreSQL URL for the establishment tables; omitted means a dry run
    #[arg(long, env = "DATABASE_URL")]
    database_url: Option<String>,

    /// Prefix for the establishment and users tables
    #[arg(long, env = "LDAPIMPORTER_TABLE_PREFIX", default_value = "")]
    table_prefix: String,

    /// Directory connection timeout in seconds
    #[arg(long, default_value_t = 10)]
    connect_timeout: u64,

    /// Skip directory server certificate verification
    #[arg(long)]
    no_tls_verify: bool,

    /// Emit logs as JSON
    #[arg(long)]
    log_json: bool,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    logging::init_logging(cli.log_json);

    match run(cli).await {
        Ok(()) => std::process::exit(0),
        Err(e) => {
            e.print();
            std::process::exit(e.exit_code());
        }
    }
}

async fn run(cli: Cli) -> CliResult<()> {
    let mut source = config::load_config_file(&cli.config)?;
    config::apply_env_overrides(&mut source, std::env::var(config::PASSWORD_ENV).ok());
    let import_config = ImportConfig::from_source(&source);

    let store: Arc<dyn RecordStore> = match &cli.database_url {
        Some(url) => Arc::new(
            PgRecordStore::connect(url, 5)
                .await?
                .with_table_prefix(cli.table_prefix.clone()),
        ),
        None => {
            warn!("No database URL given, establishments are kept in memory only");
            Arc::new(InMemoryRecordStore::new())
        }
    };

    let mut ldap_config = LdapConfig::default().with_connection_timeout(cli.connect_timeout);
    ldap_config.no_tls_verify = cli.no_tls_verify;
    let client = LdapDirectoryClient::new(ldap_config);

    let mut session = ImportSession::new(import_config, client, store);
    let report = session.execute().await?;

    let stats = &report.statistics;
    info!(
        run_id = %report.run_id,
        pages = stats.pages,
        entries = stats.entries,
        imported = stats.imported,
        duplicates = stats.duplicates,
        skipped = stats.skipped,
        groups = stats.groups_synthesized,
        establishments = report.establishments.len(),
        rule_misses = stats.rule_misses,
        "Import finished"
    );

    write_export(&CsvExporter::new(), &report.users, &cli.csv)?;
    if let Some(path) = &cli.text {
        let exporter = if cli.pretty {
            TextExporter::pretty()
        } else {
            TextExporter::new()
        };
        write_export(&exporter, &report.users, path)?;
    }

    Ok(())
}

fn write_export(exporter: &dyn Exporter, users: &UserMap, path: &Path) -> CliResult<()> {
    let mut out = BufWriter::new(File::create(path)?);
    exporter.export(users, &mut out)?;
    info!(path = %path.display(), users = users.len(), "Export written");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_defaults() {
        let cli = Cli::try_parse_from(["ldapimporter", "--config", "import.yaml"]).unwrap();

        assert_eq!(cli.csv, PathBuf::from("accounts.csv"));
        assert_eq!(cli.connect_timeout, 10);
        assert!(cli.text.is_none());
        assert!(!cli.log_json);
    }

    #[test]
    fn test_pretty_requires_text() {
        assert!(Cli::try_parse_from(["ldapimporter", "-c", "import.yaml", "--pretty"]).is_err());
        assert!(Cli::try_parse_from([
            "ldapimporter",
            "-c",
            "import.yaml",
            "--text",
            "users.json",
            "--pretty"
        ])
        .is_ok());
    }

    #[test]
    fn test_write_export() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("accounts.csv");
        let mut users = UserMap::new();
        users.insert("jdoe".to_string(), UserRecord::new("jdoe"));

        write_export(&CsvExporter::new(), &users, &path).unwrap();

        let written = std::fs::read_to_string(&path).unwrap();
        assert!(written.starts_with("UID,displayName,email,quota,groups,enabled\n"));
        assert!(written.contains("jdoe,jdoe,,0,,1"));
    }
}
