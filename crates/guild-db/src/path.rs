//! Paths into a JSON document.
//!
//! A [`DocPath`] is a sequence of object keys. The empty path is the root
//! and addresses the whole document. Paths render in the legacy `RedisJSON`
//! syntax: `.` for the root and `["golems"]["HAR-0"]` otherwise.

use core::fmt;

/// A path of object keys into a JSON document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct DocPath {
    segments: Vec<String>,
}

impl DocPath {
    /// The root path.
    pub const fn root() -> Self {
        Self {
            segments: Vec::new(),
        }
    }

    /// A single-segment path.
    pub fn field(name: impl Into<String>) -> Self {
        Self {
            segments: vec![name.into()],
        }
    }

    /// Extend this path with one more key.
    #[must_use]
    pub fn child(mut self, name: impl Into<String>) -> Self {
        self.segments.push(name.into());
        self
    }

    /// The keys making up this path, outermost first.
    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Whether this is the root path.
    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    /// Split into the parent path and the final key. `None` for the root.
    pub fn split_last(&self) -> Option<(Self, &str)> {
        let (last, parent) = self.segments.split_last()?;
        Some((
            Self {
                segments: parent.to_vec(),
            },
            last.as_str(),
        ))
    }

    /// Render in legacy `RedisJSON` path syntax.
    pub fn to_legacy(&self) -> String {
        if self.segments.is_empty() {
            return ".".to_owned();
        }
        let mut out = String::new();
        for segment in &self.segments {
            out.push_str("[\"");
            for ch in segment.chars() {
                if ch == '"' || ch == '\\' {
                    out.push('\\');
                }
                out.push(ch);
            }
            out.push_str("\"]");
        }
        out
    }
}

impl fmt::Display for DocPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_legacy())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn root_renders_as_dot() {
        assert_eq!(DocPath::root().to_legacy(), ".");
        assert!(DocPath::root().is_root());
    }

    #[test]
    fn nested_path_renders_bracketed() {
        let path = DocPath::field("golems").child("HAR-0");
        assert_eq!(path.to_legacy(), r#"["golems"]["HAR-0"]"#);
    }

    #[test]
    fn quotes_are_escaped() {
        let path = DocPath::field(r#"a"b"#);
        assert_eq!(path.to_legacy(), r#"["a\"b"]"#);
    }

    #[test]
    fn split_last_yields_parent_and_key() {
        let path = DocPath::field("inventories").child("A-G");
        let split = path.split_last();
        assert_eq!(
            split.map(|(parent, key)| (parent.to_legacy(), key.to_owned())),
            Some((r#"["inventories"]"#.to_owned(), "A-G".to_owned()))
        );
        assert!(DocPath::root().split_last().is_none());
    }
}
