//! Naming template interpreter.
//!
//! A naming template is literal text with `${name}` placeholders. `name` is a
//! capture index (`${0}`, `${1}`), the establishment-name keyword
//! (`${nometablissement}` or `${establishment-name}`), or any other word,
//! which the caller resolves against a named capture or a directory attribute.
//!
//! Templates are parsed once when rules are loaded and expanded per match.

use std::fmt;

/// Keywords that resolve to the establishment name of the matched org code.
const ESTABLISHMENT_NAME_KEYWORDS: &[&str] = &["nometablissement", "establishment-name"];

/// One `${...}` reference inside a template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Placeholder {
    /// Regex capture group by index (0 is the whole match).
    Capture(usize),
    /// Registered name of the org code the value belongs to.
    EstablishmentName,
    /// Named capture group or directory attribute.
    Attribute(String),
}

impl Placeholder {
    fn parse(token: &str) -> Self {
        let trimmed = token.trim();
        if !trimmed.is_empty() && trimmed.bytes().all(|b| b.is_ascii_digit()) {
            if let Ok(index) = trimmed.parse() {
                return Placeholder::Capture(index);
            }
        }
        let lower = trimmed.to_lowercase();
        if ESTABLISHMENT_NAME_KEYWORDS.contains(&lower.as_str()) {
            return Placeholder::EstablishmentName;
        }
        Placeholder::Attribute(trimmed.to_string())
    }
}

impl fmt::Display for Placeholder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Placeholder::Capture(index) => write!(f, "${{{index}}}"),
            Placeholder::EstablishmentName => write!(f, "${{nometablissement}}"),
            Placeholder::Attribute(name) => write!(f, "${{{name}}}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Placeholder(Placeholder),
}

/// Resolves placeholders during expansion.
pub trait PlaceholderResolver {
    /// Value for `placeholder`, or `None` if it cannot be resolved.
    fn resolve(&self, placeholder: &Placeholder) -> Option<String>;
}

/// Result of expanding a template.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Expansion {
    /// Expanded text; unresolved placeholders contribute nothing.
    pub name: String,
    /// Placeholders that could not be resolved, in template order.
    pub unresolved: Vec<Placeholder>,
}

/// Parsed naming template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamingTemplate {
    source: String,
    segments: Vec<Segment>,
}

impl NamingTemplate {
    /// Parse a template. Unterminated `${` is kept as literal text.
    pub fn parse(source: &str) -> Self {
        let mut segments = Vec::new();
        let mut rest = source;

        while let Some(start) = rest.find("${") {
            let after = &rest[start + 2..];
            let Some(end) = after.find('}') else {
                break;
            };
            if start > 0 {
                segments.push(Segment::Literal(rest[..start].to_string()));
            }
            segments.push(Segment::Placeholder(Placeholder::parse(&after[..end])));
            rest = &after[end + 1..];
        }
        if !rest.is_empty() {
            segments.push(Segment::Literal(rest.to_string()));
        }

        Self {
            source: source.to_string(),
            segments,
        }
    }

    /// The template text as configured.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Check if the template is empty.
    pub fn is_empty(&self) -> bool {
        self.source.is_empty()
    }

    /// Placeholders in template order.
    pub fn placeholders(&self) -> impl Iterator<Item = &Placeholder> {
        self.segments.iter().filter_map(|segment| match segment {
            Segment::Placeholder(p) => Some(p),
            Segment::Literal(_) => None,
        })
    }

    /// Check whether expansion needs an establishment-name lookup.
    pub fn needs_establishment_name(&self) -> bool {
        self.placeholders()
            .any(|p| matches!(p, Placeholder::EstablishmentName))
    }

    /// Expand the template.
    pub fn expand<R: PlaceholderResolver + ?Sized>(&self, resolver: &R) -> Expansion {
        let mut expansion = Expansion::default();
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => expansion.name.push_str(text),
                Segment::Placeholder(placeholder) => match resolver.resolve(placeholder) {
                    Some(value) => expansion.name.push_str(&value),
                    None => expansion.unresolved.push(placeholder.clone()),
                },
            }
        }
        expansion
    }
}

impl fmt::Display for NamingTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}
