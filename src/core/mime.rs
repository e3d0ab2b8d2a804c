//! MIME type constants, the ordered MIME type sets implementations declare,
//! and the parsed client preference list used for negotiation.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A well-known media type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MimeType(&'static str);

impl MimeType {
    pub const TEXT: MimeType = MimeType("text/plain");
    pub const HTML: MimeType = MimeType("text/html");
    pub const JSON: MimeType = MimeType("application/json");
    pub const XML: MimeType = MimeType("application/xml");
    /// The universal fallback in an accept list.
    pub const ANY: MimeType = MimeType("*/*");

    pub const fn value(&self) -> &'static str {
        self.0
    }
}

impl fmt::Display for MimeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)
    }
}

/// An insertion-ordered set of MIME type strings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MimeTypeSet {
    values: Vec<String>,
}

impl MimeTypeSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a value unless it is already present. Returns whether it was added.
    pub fn insert(&mut self, mimetype: impl Into<String>) -> bool {
        let mimetype = normalize(&mimetype.into());
        if mimetype.is_empty() || self.contains(&mimetype) {
            return false;
        }
        self.values.push(mimetype);
        true
    }

    pub fn contains(&self, mimetype: &str) -> bool {
        self.values.iter().any(|m| m.eq_ignore_ascii_case(mimetype))
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.values.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn first(&self) -> Option<&str> {
        self.values.first().map(String::as_str)
    }
}

impl<S: Into<String>> FromIterator<S> for MimeTypeSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut set = MimeTypeSet::new();
        for value in iter {
            set.insert(value);
        }
        set
    }
}

impl From<MimeType> for MimeTypeSet {
    fn from(mimetype: MimeType) -> Self {
        std::iter::once(mimetype.value()).collect()
    }
}

/// Anything that carries declared MIME type metadata.
pub trait DeclaresMimeTypes {
    fn declared_mimetypes(&self) -> &MimeTypeSet;
}

/// Reads the MIME types declared on an implementation. No declaration yields
/// an empty set, which is valid.
pub fn read_from<T: DeclaresMimeTypes + ?Sized>(source: &T) -> MimeTypeSet {
    source.declared_mimetypes().clone()
}

/// The client's acceptable media types, highest preference first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AcceptList {
    values: Vec<String>,
}

impl AcceptList {
    /// Accepts anything.
    pub fn any() -> Self {
        Self {
            values: vec![MimeType::ANY.value().to_string()],
        }
    }

    /// Parses an `Accept` header value.
    ///
    /// Entries are ordered by descending `q` with ties kept in header order.
    /// Entries with `q=0` or an unparsable `q` are dropped. An empty header
    /// accepts anything.
    pub fn parse(header: &str) -> Self {
        let mut ranked: Vec<(f32, String)> = Vec::new();

        for entry in header.split(',') {
            let mut parts = entry.split(';');
            let media_range = normalize(parts.next().unwrap_or_default());
            if media_range.is_empty() {
                continue;
            }

            let mut quality = Some(1.0_f32);
            for param in parts {
                if let Some((key, value)) = param.split_once('=') {
                    if key.trim().eq_ignore_ascii_case("q") {
                        quality = value.trim().parse::<f32>().ok().filter(|q| (0.0..=1.0).contains(q));
                    }
                }
            }

            match quality {
                Some(q) if q > 0.0 => ranked.push((q, media_range)),
                _ => log::debug!("Dropping accept entry '{}'", entry.trim()),
            }
        }

        if ranked.is_empty() {
            return Self::any();
        }

        // sort_by is stable, so equal qualities keep header order
        ranked.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
        Self {
            values: ranked.into_iter().map(|(_, m)| m).collect(),
        }
    }

    /// Parses an optional header; a missing header accepts anything.
    pub fn from_header(header: Option<&str>) -> Self {
        header.map(Self::parse).unwrap_or_else(Self::any)
    }

    pub fn has_wildcard(&self) -> bool {
        self.values.iter().any(|m| m == MimeType::ANY.value())
    }

    pub fn as_slice(&self) -> &[String] {
        &self.values
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.values.iter().map(String::as_str)
    }
}

impl Default for AcceptList {
    fn default() -> Self {
        Self::any()
    }
}

impl<S: Into<String>> FromIterator<S> for AcceptList {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self {
            values: iter.into_iter().map(|s| normalize(&s.into())).collect(),
        }
    }
}

fn normalize(mimetype: &str) -> String {
    mimetype.trim().to_ascii_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_keeps_first_insertion_order() {
        let set: MimeTypeSet = ["application/json", "text/json", "Application/JSON"]
            .into_iter()
            .collect();
        assert_eq!(set.iter().collect::<Vec<_>>(), vec!["application/json", "text/json"]);
    }

    #[test]
    fn test_parse_orders_by_quality_then_position() {
        let accept = AcceptList::parse("text/html;q=0.8, application/json, text/plain;q=0.8, */*;q=0.1");
        assert_eq!(
            accept.as_slice(),
            &["application/json", "text/html", "text/plain", "*/*"]
        );
        assert!(accept.has_wildcard());
    }

    #[test]
    fn test_parse_drops_refused_and_malformed_entries() {
        let accept = AcceptList::parse("application/xml;q=0, text/plain;q=high, text/html");
        assert_eq!(accept.as_slice(), &["text/html"]);
        assert!(!accept.has_wildcard());
    }

    #[test]
    fn test_empty_or_missing_header_accepts_anything() {
        assert_eq!(AcceptList::parse(" , "), AcceptList::any());
        assert_eq!(AcceptList::from_header(None), AcceptList::any());
    }

    #[test]
    fn test_parameters_other_than_quality_are_stripped() {
        let accept = AcceptList::parse("Text/HTML; charset=utf-8");
        assert_eq!(accept.as_slice(), &["text/html"]);
    }
}
