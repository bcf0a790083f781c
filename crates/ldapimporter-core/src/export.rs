//! Exporters for the final user mapping.

use std::io::Write;
use tracing::info;

use crate::error::{ImportError, ImportResult};
use crate::model::UserMap;

/// CSV column headers.
pub const CSV_HEADERS: &[&str] = &["UID", "displayName", "email", "quota", "groups", "enabled"];

/// Serializes a user mapping to a writer.
pub trait Exporter {
    /// Write every user in mapping order.
    fn export(&self, users: &UserMap, out: &mut dyn Write) -> ImportResult<()>;
}

/// Join multi-valued fields with `glue`.
pub fn flatten_join<I, S>(values: I, glue: &str) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    values
        .into_iter()
        .map(|v| v.as_ref().to_string())
        .collect::<Vec<_>>()
        .join(glue)
}

/// One row per user; groups are space-joined, enabled is `1` or `0`.
#[derive(Debug, Default)]
pub struct CsvExporter;

impl CsvExporter {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Exporter for CsvExporter {
    fn export(&self, users: &UserMap, out: &mut dyn Write) -> ImportResult<()> {
        info!(users = users.len(), "Exporting users to CSV");
        let mut wtr = csv::Writer::from_writer(out);
        wtr.write_record(CSV_HEADERS)
            .map_err(|e| ImportError::export_with_source("failed to write CSV header", e))?;

        for user in users.values() {
            let quota = user.quota.to_string();
            let groups = flatten_join(&user.groups, " ");
            wtr.write_record([
                user.uid.as_str(),
                user.display_name.as_str(),
                user.email.as_str(),
                quota.as_str(),
                groups.as_str(),
                if user.enabled { "1" } else { "0" },
            ])
            .map_err(|e| ImportError::export_with_source(format!("failed to write {}", user.uid), e))?;
        }

        wtr.flush()
            .map_err(|e| ImportError::export_with_source("failed to flush CSV", e))?;
        info!("CSV export finished");
        Ok(())
    }
}

/// JSON snapshot of the whole mapping.
#[derive(Debug, Default)]
pub struct TextExporter {
    pretty: bool,
}

impl TextExporter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn pretty() -> Self {
        Self { pretty: true }
    }
}

impl Exporter for TextExporter {
    fn export(&self, users: &UserMap, out: &mut dyn Write) -> ImportResult<()> {
        info!(users = users.len(), "Exporting users to text");
        let result = if self.pretty {
            serde_json::to_writer_pretty(&mut *out, users)
        } else {
            serde_json::to_writer(&mut *out, users)
        };
        result.map_err(|e| ImportError::export_with_source("failed to serialize users", e))?;
        out.flush()
            .map_err(|e| ImportError::export_with_source("failed to flush text export", e))?;
        info!("Text export finished");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::UserRecord;

    fn users() -> UserMap {
        let mut jdoe = UserRecord::new("jdoe");
        jdoe.display_name = "Jane Doe".to_string();
        jdoe.email = "jane@example.com".to_string();
        jdoe.quota = 2048;
        jdoe.add_group("Classe 7A");
        jdoe.add_group("Profs, Lycee");

        let mut off = UserRecord::new("off");
        off.enabled = false;

        let mut users = UserMap::new();
        users.insert(jdoe.uid.clone(), jdoe);
        users.insert(off.uid.clone(), off);
        users
    }

    #[test]
    fn test_csv_export() {
        let mut buf = Vec::new();
        CsvExporter::new().export(&users(), &mut buf).unwrap();

        let text = String::from_utf8(buf).unwrap();
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(lines[0], "UID,displayName,email,quota,groups,enabled");
        assert_eq!(
            lines[1],
            "jdoe,Jane Doe,jane@example.com,2048,\"Classe 7A Profs, Lycee\",1"
        );
        assert_eq!(lines[2], "off,off,,0,,0");
    }

    #[test]
    fn test_text_export_round_trips() {
        let mut buf = Vec::new();
        TextExporter::new().export(&users(), &mut buf).unwrap();

        let parsed: UserMap = serde_json::from_slice(&buf).unwrap();
        assert_eq!(parsed, users());
        let keys: Vec<_> = parsed.keys().cloned().collect();
        assert_eq!(keys, vec!["jdoe", "off"]);
    }

    #[test]
    fn test_flatten_join() {
        assert_eq!(flatten_join(["a", "b"], " "), "a b");
        assert_eq!(flatten_join(Vec::<String>::new(), " "), "");
    }
}
