//! Definition lookup types.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// The structural form a definition pattern detects.
///
/// Declaration order is priority order: earlier kinds are more
/// authoritative jump targets than later ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DefinitionKind {
    SignatureSameLine,
    SignatureNextLine,
    Assignment,
    DataDecl,
    TypeDecl,
    NewtypeDecl,
    ClassDecl,
    Constructor,
    TypeFamily,
    DataFamily,
    PatternSynonym,
}

impl DefinitionKind {
    /// All kinds in priority order.
    pub const ALL: [DefinitionKind; 11] = [
        Self::SignatureSameLine,
        Self::SignatureNextLine,
        Self::Assignment,
        Self::DataDecl,
        Self::TypeDecl,
        Self::NewtypeDecl,
        Self::ClassDecl,
        Self::Constructor,
        Self::TypeFamily,
        Self::DataFamily,
        Self::PatternSynonym,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SignatureSameLine => "signature_same_line",
            Self::SignatureNextLine => "signature_next_line",
            Self::Assignment => "assignment",
            Self::DataDecl => "data_decl",
            Self::TypeDecl => "type_decl",
            Self::NewtypeDecl => "newtype_decl",
            Self::ClassDecl => "class_decl",
            Self::Constructor => "constructor",
            Self::TypeFamily => "type_family",
            Self::DataFamily => "data_family",
            Self::PatternSynonym => "pattern_synonym",
        }
    }

    /// Whether this kind is a visible type signature.
    pub fn is_signature(&self) -> bool {
        matches!(self, Self::SignatureSameLine | Self::SignatureNextLine)
    }
}

impl fmt::Display for DefinitionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One regular expression from the pattern catalog, tagged with its kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatternEntry {
    pub kind: DefinitionKind,
    pub pattern: String,
}

/// Where a match was found.
///
/// `Buffer` stands for the in-memory text that was queried and never
/// collides with a real path.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "path", rename_all = "lowercase")]
pub enum MatchOrigin {
    Buffer,
    File(PathBuf),
}

impl MatchOrigin {
    pub fn path(&self) -> Option<&Path> {
        match self {
            Self::Buffer => None,
            Self::File(path) => Some(path),
        }
    }
}

impl fmt::Display for MatchOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Buffer => f.write_str("<buffer>"),
            Self::File(path) => write!(f, "{}", path.display()),
        }
    }
}

/// A single occurrence reported by a search engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawMatchEvent {
    /// File the match came from, or `Buffer` for in-memory searches
    pub origin: MatchOrigin,
    /// 1-based number of the first line of the match
    pub line_number: u64,
    /// Full physical lines spanned by the match, possibly several
    pub text: String,
}

/// A normalized occurrence pointing at exactly one physical line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Match {
    pub kind: DefinitionKind,
    pub origin: MatchOrigin,
    /// 0-based line index
    pub line_index: usize,
    /// The selected line, without line terminator
    pub line_text: String,
}

/// A resolved jump target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    pub origin: MatchOrigin,
    /// 0-based line index
    pub line_index: usize,
    /// Length of the line in characters
    pub line_length: usize,
    pub line_text: String,
    pub kind: DefinitionKind,
}

impl From<Match> for Location {
    fn from(m: Match) -> Self {
        Self {
            line_length: m.line_text.chars().count(),
            origin: m.origin,
            line_index: m.line_index,
            line_text: m.line_text,
            kind: m.kind,
        }
    }
}

/// Source text the user is currently looking at.
#[derive(Debug, Clone, Default)]
pub struct Buffer {
    pub text: String,
    /// Path the buffer was loaded from, if it is backed by a file
    pub path: Option<PathBuf>,
}

impl Buffer {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            path: None,
        }
    }

    pub fn with_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = Some(path.into());
        self
    }
}

/// Everything needed for one definition lookup.
#[derive(Debug, Clone, Default)]
pub struct LocateRequest {
    pub identifier: String,
    pub buffer: Option<Buffer>,
    pub workspace_root: Option<PathBuf>,
    /// File-name globs restricting the workspace search (e.g. `*.hs`)
    pub file_globs: Vec<String>,
}

impl LocateRequest {
    pub fn new(identifier: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            ..Default::default()
        }
    }

    pub fn with_buffer(mut self, buffer: Buffer) -> Self {
        self.buffer = Some(buffer);
        self
    }

    pub fn with_workspace(mut self, root: impl Into<PathBuf>) -> Self {
        self.workspace_root = Some(root.into());
        self
    }

    pub fn with_globs(mut self, globs: Vec<String>) -> Self {
        self.file_globs = globs;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_order_is_priority_order() {
        let mut sorted = DefinitionKind::ALL;
        sorted.sort();
        assert_eq!(sorted, DefinitionKind::ALL);
        assert!(DefinitionKind::SignatureSameLine < DefinitionKind::Assignment);
        assert!(DefinitionKind::DataDecl < DefinitionKind::Constructor);
    }

    #[test]
    fn test_kind_serialization() {
        for kind in DefinitionKind::ALL {
            let json = serde_json::to_string(&kind).unwrap();
            assert_eq!(json, format!("\"{}\"", kind.as_str()));
        }
    }

    #[test]
    fn test_origin_ordering_and_display() {
        let buffer = MatchOrigin::Buffer;
        let file = MatchOrigin::File(PathBuf::from("src/A.hs"));
        assert!(buffer < file);
        assert_eq!(buffer.to_string(), "<buffer>");
        assert_eq!(file.to_string(), "src/A.hs");
        assert_eq!(file.path(), Some(Path::new("src/A.hs")));
        assert_eq!(buffer.path(), None);
    }

    #[test]
    fn test_location_from_match_counts_chars() {
        let m = Match {
            kind: DefinitionKind::Assignment,
            origin: MatchOrigin::Buffer,
            line_index: 3,
            line_text: "λx = 1".to_string(),
        };
        let loc = Location::from(m);
        assert_eq!(loc.line_length, 6);
        assert_eq!(loc.line_index, 3);
        assert_eq!(loc.kind, DefinitionKind::Assignment);
    }

    #[test]
    fn test_locate_request_builder() {
        let req = LocateRequest::new("foo")
            .with_buffer(Buffer::new("foo = 1").with_path("A.hs"))
            .with_workspace("/ws")
            .with_globs(vec!["*.hs".to_string()]);
        assert_eq!(req.identifier, "foo");
        assert_eq!(req.buffer.unwrap().path, Some(PathBuf::from("A.hs")));
        assert_eq!(req.workspace_root, Some(PathBuf::from("/ws")));
        assert_eq!(req.file_globs, vec!["*.hs"]);
    }
}
