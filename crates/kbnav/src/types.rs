use crate::error::ParseNodeIdError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ============================================================================
// Identifiers
// ============================================================================

/// Identifier of a node in the knowledge base.
///
/// Source datasets key their rows by integer ids. The id is stable across
/// reloads only as long as the source row keeps it.
///
/// # Parsing
///
/// Text is trimmed before parsing. Accepted forms are an optional `-`
/// followed by decimal digits, optionally followed by `.` and zeros:
/// spreadsheet exports widen integer columns that contain blanks to
/// floats, so `"2.0"` parses as `2`. Signs other than `-`, exponents,
/// a bare trailing dot, or a non-zero fraction are all rejected.
///
/// ```
/// use kbnav::NodeId;
///
/// assert_eq!("42".parse::<NodeId>().unwrap(), NodeId::new(42));
/// assert_eq!(" 7.0 ".parse::<NodeId>().unwrap(), NodeId::new(7));
/// assert!("7.5".parse::<NodeId>().is_err());
/// assert!("parent".parse::<NodeId>().is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(i64);

impl NodeId {
    pub const fn new(raw: i64) -> Self {
        Self(raw)
    }

    pub const fn get(self) -> i64 {
        self.0
    }
}

impl From<i64> for NodeId {
    fn from(raw: i64) -> Self {
        Self(raw)
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for NodeId {
    type Err = ParseNodeIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let (digits, fraction) = match trimmed.split_once('.') {
            Some((digits, fraction)) => (digits, Some(fraction)),
            None => (trimmed, None),
        };
        let unsigned = digits.strip_prefix('-').unwrap_or(digits);

        let well_formed = !unsigned.is_empty()
            && unsigned.bytes().all(|b| b.is_ascii_digit())
            && fraction.is_none_or(|f| !f.is_empty() && f.bytes().all(|b| b == b'0'));
        if !well_formed {
            return Err(ParseNodeIdError::new(s));
        }

        digits
            .parse::<i64>()
            .map(Self)
            .map_err(|_| ParseNodeIdError::new(s))
    }
}

// ============================================================================
// Rows
// ============================================================================

/// One raw row as produced by a row source, before validation.
///
/// `id` is optional because sheets can carry blank id cells; [`Tree::build`]
/// rejects such rows instead of dropping them.
///
/// [`Tree::build`]: crate::Tree::build
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Row {
    pub id: Option<NodeId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<NodeId>,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

impl Row {
    pub fn new(id: impl Into<NodeId>, name: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
            parent: None,
            name: name.into(),
            text: None,
        }
    }

    /// A row whose id cell was blank.
    pub fn without_id(name: impl Into<String>) -> Self {
        Self {
            id: None,
            parent: None,
            name: name.into(),
            text: None,
        }
    }

    pub fn with_parent(mut self, parent: impl Into<NodeId>) -> Self {
        self.parent = Some(parent.into());
        self
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }
}

// ============================================================================
// Nodes
// ============================================================================

/// A validated entry in the hierarchy: a category or a leaf item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    pub id: NodeId,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<NodeId>,
}

impl Node {
    /// Body text, if the row carried any non-blank text.
    pub fn body(&self) -> Option<&str> {
        self.text.as_deref().filter(|t| !t.trim().is_empty())
    }
}
