//! Language tags for ingestion records and import resolution.

use serde::{Deserialize, Serialize};

/// Languages the ingestion pipeline accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    Typescript,
    Tsx,
    Javascript,
    Jsx,
    Go,
    Java,
    Python,
    Markdown,
}

impl Language {
    /// Parse a language from its tag (as returned by `name()`).
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "typescript" => Some(Self::Typescript),
            "tsx" => Some(Self::Tsx),
            "javascript" => Some(Self::Javascript),
            "jsx" => Some(Self::Jsx),
            "go" => Some(Self::Go),
            "java" => Some(Self::Java),
            "python" => Some(Self::Python),
            "markdown" => Some(Self::Markdown),
            _ => None,
        }
    }

    /// Display tag.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Typescript => "typescript",
            Self::Tsx => "tsx",
            Self::Javascript => "javascript",
            Self::Jsx => "jsx",
            Self::Go => "go",
            Self::Java => "java",
            Self::Python => "python",
            Self::Markdown => "markdown",
        }
    }

    /// Extensions tried, in order, when an import target has none.
    /// The same set backs the `/index.<ext>` fallback.
    pub fn candidate_extensions(&self) -> &'static [&'static str] {
        match self {
            Self::Typescript | Self::Tsx => &["ts", "tsx", "js", "jsx"],
            Self::Javascript | Self::Jsx => &["js", "jsx", "ts", "tsx"],
            Self::Go => &["go"],
            Self::Java => &["java"],
            Self::Python => &["py"],
            Self::Markdown => &["md"],
        }
    }
}
