//! HTTP headers handling
//!
//! This module provides a type for managing HTTP headers with normalized,
//! case-insensitive names and support for multiple values per header name.

use std::fmt;

use super::CRLF;

/// HTTP headers collection
///
/// Headers are stored in insertion order under normalized names and support:
/// - Case-insensitive lookups
/// - Multiple values for the same header name
/// - Conversion to and from wire-format lines
#[derive(Debug, Clone, Default)]
pub struct Headers {
    // Normalized name -> values in arrival order, entries in first-seen order
    entries: Vec<(String, Vec<String>)>,
}

impl Headers {
    /// Create a new empty headers collection
    pub fn new() -> Self {
        Headers {
            entries: Vec::new(),
        }
    }

    /// Create a headers collection from (name, value) pairs
    pub fn from_pairs<I, N, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (N, V)>,
        N: AsRef<str>,
        V: Into<String>,
    {
        let mut headers = Headers::new();
        for (name, value) in pairs {
            headers.add(name.as_ref(), value);
        }
        headers
    }

    /// Add a header value
    ///
    /// If the normalized name already exists, the value is appended to its
    /// list rather than replacing it.
    pub fn add(&mut self, name: &str, value: impl Into<String>) {
        let name = normalize(name);
        let value = value.into();

        match self.entries.iter_mut().find(|(n, _)| *n == name) {
            Some((_, values)) => values.push(value),
            None => self.entries.push((name, vec![value])),
        }
    }

    /// Get the value for a header (case-insensitive)
    ///
    /// Multiple values are joined with `", "`. The join loses the boundary
    /// between values, which matters for headers like `Set-Cookie`; this is
    /// a known lossy simplification. Use [`Headers::iter`] to observe the
    /// individual values.
    pub fn get(&self, name: &str) -> Option<String> {
        let name = normalize(name);
        self.entries
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, values)| values.join(", "))
    }

    /// Get the value for a header, or a default when absent
    pub fn get_or(&self, name: &str, default: &str) -> String {
        self.get(name).unwrap_or_else(|| default.to_string())
    }

    /// Check if a header exists (case-insensitive)
    pub fn contains(&self, name: &str) -> bool {
        let name = normalize(name);
        self.entries.iter().any(|(n, _)| *n == name)
    }

    /// Get the number of distinct header names
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if there are no headers
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate over (normalized name, values) entries in first-seen order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v.as_slice()))
    }

    /// Parse a sequence of `Name:Value` wire lines
    ///
    /// Each line is split on the first colon and both segments are trimmed.
    /// A line with no colon yields an empty value rather than an error.
    pub fn from_lines<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut headers = Headers::new();

        for line in lines {
            let line = line.as_ref();
            let (name, value) = match line.split_once(':') {
                Some((name, value)) => (name, value),
                None => (line, ""),
            };
            headers.add(name.trim(), value.trim());
        }

        headers
    }

    /// Render wire lines, one per stored name with values comma-joined
    ///
    /// Inverse of [`Headers::from_lines`], up to the lossy value join.
    pub fn to_lines(&self) -> Vec<String> {
        self.entries
            .iter()
            .map(|(name, values)| format!("{}: {}", name, values.join(", ")))
            .collect()
    }
}

/// Normalize a header name: title-case every hyphen-separated segment
///
/// `content-length`, `Content-Length` and `CONTENT-LENGTH` all map to
/// `Content-Length`.
fn normalize(name: &str) -> String {
    name.split('-')
        .map(|segment| {
            let mut chars = segment.chars();
            match chars.next() {
                Some(first) => {
                    first.to_ascii_uppercase().to_string() + &chars.as_str().to_ascii_lowercase()
                }
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join("-")
}

impl fmt::Display for Headers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for line in self.to_lines() {
            write!(f, "{}{}", line, CRLF)?;
        }
        Ok(())
    }
}

impl FromIterator<(String, String)> for Headers {
    fn from_iter<T: IntoIterator<Item = (String, String)>>(iter: T) -> Self {
        Headers::from_pairs(iter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_and_get() {
        let mut headers = Headers::new();
        headers.add("Content-Type", "text/html");
        headers.add("Content-Length", "42");

        assert_eq!(headers.get("Content-Type"), Some("text/html".to_string()));
        assert_eq!(headers.get("Content-Length"), Some("42".to_string()));
        assert_eq!(headers.get("Missing"), None);
    }

    #[test]
    fn test_case_insensitive() {
        let mut headers = Headers::new();
        headers.add("content-type", "text/html");

        assert_eq!(headers.get("Content-Type"), Some("text/html".to_string()));
        assert_eq!(headers.get("CONTENT-TYPE"), Some("text/html".to_string()));
        assert_eq!(headers.get("CoNtEnT-TyPe"), Some("text/html".to_string()));
    }

    #[test]
    fn test_normalized_storage() {
        let mut headers = Headers::new();
        headers.add("x-custom-header", "1");

        let names: Vec<_> = headers.iter().map(|(n, _)| n.to_string()).collect();
        assert_eq!(names, vec!["X-Custom-Header"]);
    }

    #[test]
    fn test_multiple_values_joined() {
        let mut headers = Headers::new();
        headers.add("Set-Cookie", "a=1");
        headers.add("set-cookie", "b=2");
        headers.add("SET-COOKIE", "c=3");

        assert_eq!(headers.get("Set-Cookie"), Some("a=1, b=2, c=3".to_string()));
        assert_eq!(headers.len(), 1);
    }

    #[test]
    fn test_get_or_default() {
        let headers = Headers::new();
        assert_eq!(headers.get_or("Content-Length", "0"), "0");
    }

    #[test]
    fn test_from_lines() {
        let headers = Headers::from_lines(["Content-Type: text/html", "Host:  example.com  "]);

        assert_eq!(headers.get("Content-Type"), Some("text/html".to_string()));
        assert_eq!(headers.get("Host"), Some("example.com".to_string()));
    }

    #[test]
    fn test_from_lines_no_colon() {
        let headers = Headers::from_lines(["Warning"]);
        assert_eq!(headers.get("Warning"), Some(String::new()));
    }

    #[test]
    fn test_from_lines_value_with_colon() {
        let headers = Headers::from_lines(["Host: example.com:8080"]);
        assert_eq!(headers.get("Host"), Some("example.com:8080".to_string()));
    }

    #[test]
    fn test_to_lines_order_and_join() {
        let mut headers = Headers::new();
        headers.add("B-Header", "1");
        headers.add("A-Header", "2");
        headers.add("b-header", "3");

        assert_eq!(headers.to_lines(), vec!["B-Header: 1, 3", "A-Header: 2"]);
    }

    #[test]
    fn test_round_trip() {
        let mut headers = Headers::new();
        headers.add("Content-Type", "text/plain");
        headers.add("X-Tag", "one");
        headers.add("X-Tag", "two");

        let parsed = Headers::from_lines(headers.to_lines());
        assert_eq!(parsed.get("Content-Type"), Some("text/plain".to_string()));
        // The multi-value entry comes back as one joined value
        assert_eq!(parsed.get("X-Tag"), Some("one, two".to_string()));
        assert_eq!(parsed.to_lines(), headers.to_lines());
    }

    #[test]
    fn test_contains() {
        let mut headers = Headers::new();
        headers.add("X-Test", "value");

        assert!(headers.contains("x-test"));
        assert!(!headers.contains("X-Missing"));
    }

    #[test]
    fn test_display() {
        let mut headers = Headers::new();
        headers.add("Host", "h");

        assert_eq!(headers.to_string(), "Host: h\r\n");
    }
}
