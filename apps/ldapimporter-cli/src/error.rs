//! CLI error types and exit codes

use ldapimporter_core::error::{DirectoryError, ImportError};
use ldapimporter_db::DbError;
use thiserror::Error;

/// Exit codes for the CLI
/// - 0: Success
/// - 1: General error
/// - 2: Authentication failed
/// - 3: Network error
/// - 4: Validation error
/// - 5: Storage error
pub type CliResult<T> = Result<T, CliError>;

#[derive(Debug, Error)]
pub enum CliError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Import failed: {0}")]
    Import(#[from] ImportError),

    #[error("Database error: {0}")]
    Database(String),

    #[error("I/O error: {0}")]
    Io(String),
}

impl CliError {
    /// Get the exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::Config(_) | CliError::Io(_) => 1,
            CliError::Database(_) => 5,
            CliError::Import(e) => match e {
                ImportError::Bind(DirectoryError::AuthenticationFailed) => 2,
                ImportError::Connect(_) | ImportError::Bind(_) | ImportError::Search(_) => 3,
                ImportError::Config { .. } => 4,
                ImportError::Store(_) => 5,
                ImportError::Export { .. } => 1,
            },
        }
    }

    /// Print the error to stderr with appropriate formatting
    pub fn print(&self) {
        let use_color = std::env::var("NO_COLOR").is_err();

        if use_color {
            eprintln!("\x1b[31mError:\x1b[0m {}", self);
        } else {
            eprintln!("Error: {}", self);
        }

        if let Some(suggestion) = self.suggestion() {
            if use_color {
                eprintln!("\n\x1b[33mSuggestion:\x1b[0m {}", suggestion);
            } else {
                eprintln!("\nSuggestion: {}", suggestion);
            }
        }
    }

    /// Get a suggested action for this error
    fn suggestion(&self) -> Option<&'static str> {
        match self {
            CliError::Import(ImportError::Bind(DirectoryError::AuthenticationFailed)) => {
                Some("Check cas_import_ad_user and cas_import_ad_password.")
            }
            CliError::Import(ImportError::Connect(_)) => Some(
                "Check cas_import_ad_host, cas_import_ad_port and cas_import_ad_protocol.",
            ),
            CliError::Import(ImportError::Config { .. }) => {
                Some("Set cas_import_ad_host in the configuration file.")
            }
            CliError::Import(ImportError::Search(DirectoryError::NoSuchObject { .. })) => {
                Some("Check cas_import_ad_base_dn.")
            }
            CliError::Database(_) => Some("Check --database-url or DATABASE_URL."),
            _ => None,
        }
    }
}

impl From<std::io::Error> for CliError {
    fn from(e: std::io::Error) -> Self {
        CliError::Io(e.to_string())
    }
}

impl From<serde_yaml::Error> for CliError {
    fn from(e: serde_yaml::Error) -> Self {
        CliError::Config(format!("YAML error: {}", e))
    }
}

impl From<serde_json::Error> for CliError {
    fn from(e: serde_json::Error) -> Self {
        CliError::Config(format!("JSON error: {}", e))
    }
}

impl From<DbError> for CliError {
    fn from(e: DbError) -> Self {
        CliError::Database(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ldapimporter_core::error::StoreError;

    #[test]
    fn test_exit_codes() {
        assert_eq!(CliError::Config("x".into()).exit_code(), 1);
        assert_eq!(
            CliError::from(ImportError::Bind(DirectoryError::AuthenticationFailed)).exit_code(),
            2
        );
        assert_eq!(
            CliError::from(ImportError::Connect(DirectoryError::connection_failed("refused")))
                .exit_code(),
            3
        );
        assert_eq!(
            CliError::from(ImportError::config("cas_import_ad_host is not set")).exit_code(),
            4
        );
        assert_eq!(
            CliError::from(ImportError::Store(StoreError::Unavailable {
                message: "down".into()
            }))
            .exit_code(),
            5
        );
    }

    #[test]
    fn test_suggestions() {
        let err = CliError::from(ImportError::Bind(DirectoryError::AuthenticationFailed));
        assert!(err.suggestion().is_some());
        assert!(CliError::Io("x".into()).suggestion().is_none());
    }
}
