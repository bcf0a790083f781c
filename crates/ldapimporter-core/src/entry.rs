//! Directory entry and paging types
//!
//! Raw records as returned by a directory search, before projection.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// One raw record returned by a directory search.
///
/// Attribute names are stored lower-cased (directory attribute names are
/// case-insensitive); every attribute is multi-valued and keeps the order
/// the server returned.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryEntry {
    /// Distinguished name of the entry.
    dn: String,
    /// Lower-cased attribute name to ordered values.
    attributes: HashMap<String, Vec<String>>,
}

impl DirectoryEntry {
    /// Create an empty entry with the given DN.
    pub fn new(dn: impl Into<String>) -> Self {
        Self {
            dn: dn.into(),
            attributes: HashMap::new(),
        }
    }

    /// Replace all values of an attribute.
    pub fn set<I, V>(&mut self, name: &str, values: I)
    where
        I: IntoIterator<Item = V>,
        V: Into<String>,
    {
        self.attributes.insert(
            name.to_lowercase(),
            values.into_iter().map(Into::into).collect(),
        );
    }

    /// Set an attribute using builder pattern.
    pub fn with<I, V>(mut self, name: &str, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<String>,
    {
        self.set(name, values);
        self
    }

    /// Append one value to an attribute.
    pub fn push(&mut self, name: &str, value: impl Into<String>) {
        self.attributes
            .entry(name.to_lowercase())
            .or_default()
            .push(value.into());
    }

    /// Get the distinguished name.
    pub fn dn(&self) -> &str {
        &self.dn
    }

    /// Get all values of an attribute (case-insensitive name).
    pub fn get(&self, name: &str) -> Option<&[String]> {
        self.attributes
            .get(&name.to_lowercase())
            .map(Vec::as_slice)
    }

    /// Get the first value of an attribute.
    ///
    /// `dn` falls back to the entry's distinguished name when the server did
    /// not return it as a regular attribute.
    pub fn first(&self, name: &str) -> Option<&str> {
        if name.is_empty() {
            return None;
        }
        match self.get(name).and_then(|values| values.first()) {
            Some(value) => Some(value.as_str()),
            None if name.eq_ignore_ascii_case("dn") && !self.dn.is_empty() => {
                Some(self.dn.as_str())
            }
            None => None,
        }
    }

    /// Check if an attribute has at least one value.
    pub fn has(&self, name: &str) -> bool {
        self.get(name).is_some_and(|values| !values.is_empty())
    }

    /// Get the number of attributes.
    pub fn len(&self) -> usize {
        self.attributes.len()
    }

    /// Check if the entry carries no attributes.
    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty()
    }

    /// Iterate over all attributes.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Vec<String>)> {
        self.attributes.iter()
    }
}

impl FromIterator<(String, Vec<String>)> for DirectoryEntry {
    fn from_iter<T: IntoIterator<Item = (String, Vec<String>)>>(iter: T) -> Self {
        Self {
            dn: String::new(),
            attributes: iter
                .into_iter()
                .map(|(name, values)| (name.to_lowercase(), values))
                .collect(),
        }
    }
}

/// Parameters of a paginated directory search.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRequest {
    /// Search base.
    pub base_dn: String,
    /// LDAP filter string.
    pub filter: String,
    /// Attributes to return; empty means all user attributes.
    pub attributes: Vec<String>,
    /// Maximum entries per page.
    pub page_size: u32,
}

impl PageRequest {
    /// Create a new page request.
    pub fn new(
        base_dn: impl Into<String>,
        filter: impl Into<String>,
        attributes: Vec<String>,
        page_size: u32,
    ) -> Self {
        Self {
            base_dn: base_dn.into(),
            filter: filter.into(),
            attributes,
            page_size,
        }
    }
}

/// One server response to a paged search request.
#[derive(Debug, Clone, Default)]
pub struct SearchPage {
    /// Entries in server order.
    pub entries: Vec<DirectoryEntry>,
    /// Opaque continuation cookie; `None` or empty means the search is done.
    pub cookie: Option<Vec<u8>>,
}

impl SearchPage {
    /// Create a final page (no continuation).
    pub fn last(entries: Vec<DirectoryEntry>) -> Self {
        Self {
            entries,
            cookie: None,
        }
    }

    /// Create a page followed by more results.
    pub fn with_cookie(entries: Vec<DirectoryEntry>, cookie: impl Into<Vec<u8>>) -> Self {
        Self {
            entries,
            cookie: Some(cookie.into()),
        }
    }

    /// Check whether the server signalled more pages.
    pub fn has_more(&self) -> bool {
        self.cookie.as_ref().is_some_and(|c| !c.is_empty())
    }
}

/// A page of entries handed to the pipeline.
#[derive(Debug, Clone, Default)]
pub struct DirectoryPage {
    /// Entries in server order.
    pub entries: Vec<DirectoryEntry>,
}

impl DirectoryPage {
    /// Number of entries in the page.
    pub fn count(&self) -> usize {
        self.entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attribute_names_are_case_insensitive() {
        let entry = DirectoryEntry::new("uid=jdoe,ou=people,dc=example,dc=com")
            .with("ESCOUAICourant", ["0450822X"])
            .with("isMemberOf", ["cn=7A,ou=classes", "cn=staff,ou=groups"]);

        assert_eq!(entry.first("escouaicourant"), Some("0450822X"));
        assert_eq!(entry.first("ESCOUAICOURANT"), Some("0450822X"));
        assert_eq!(entry.get("ismemberof").map(<[String]>::len), Some(2));
        assert!(entry.has("IsMemberOf"));
        assert!(!entry.has("mail"));
    }

    #[test]
    fn test_first_keeps_server_order() {
        let mut entry = DirectoryEntry::new("cn=x");
        entry.push("mail", "first@example.com");
        entry.push("mail", "second@example.com");

        assert_eq!(entry.first("mail"), Some("first@example.com"));
    }

    #[test]
    fn test_dn_fallback() {
        let entry = DirectoryEntry::new("uid=jdoe,dc=example,dc=com");
        assert_eq!(entry.first("dn"), Some("uid=jdoe,dc=example,dc=com"));

        let explicit = entry.clone().with("dn", ["uid=other"]);
        assert_eq!(explicit.first("DN"), Some("uid=other"));

        assert_eq!(DirectoryEntry::default().first("dn"), None);
        assert_eq!(entry.first(""), None);
    }

    #[test]
    fn test_search_page_has_more() {
        assert!(!SearchPage::last(vec![]).has_more());
        assert!(!SearchPage::with_cookie(vec![], Vec::new()).has_more());
        assert!(SearchPage::with_cookie(vec![], b"next".to_vec()).has_more());
    }
}
