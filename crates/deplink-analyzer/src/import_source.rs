//! The ingestion record handed over by language parsers.
//!
//! The analyzer never parses source code; an external parser supplies
//! one [`ImportSource`] per import statement.

use serde::{Deserialize, Serialize};

/// How the parser classified an import specifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImportKind {
    /// `./utils/helpers`, `../lib/math`
    Relative,
    /// `@/components/Button`, `~/config`, `/src/app`
    Absolute,
    /// An external package: `react`, `lodash`
    Library,
    /// A runtime builtin: `fs`, `path`
    Builtin,
}

impl ImportKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Relative => "relative",
            Self::Absolute => "absolute",
            Self::Library => "library",
            Self::Builtin => "builtin",
        }
    }

    /// Library and builtin imports resolve to library nodes, not files.
    pub fn is_external(self) -> bool {
        matches!(self, Self::Library | Self::Builtin)
    }
}

/// One name brought into scope by an import.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportedSymbol {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
    #[serde(default)]
    pub is_default: bool,
    #[serde(default)]
    pub is_namespace: bool,
}

impl ImportedSymbol {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn default_export(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            is_default: true,
            ..Self::default()
        }
    }
}

/// Location of the import statement in the source file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceLocation {
    pub line: u32,
    pub column: u32,
}

/// A single import extracted by an external parser.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportSource {
    pub kind: ImportKind,
    /// The specifier as written: `./utils/helpers`, `react`, `@/lib/math`.
    pub source: String,
    #[serde(default)]
    pub symbols: Vec<ImportedSymbol>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<SourceLocation>,
}

impl ImportSource {
    pub fn new(kind: ImportKind, source: impl Into<String>) -> Self {
        Self {
            kind,
            source: source.into(),
            symbols: Vec::new(),
            location: None,
        }
    }

    pub fn symbol(mut self, symbol: ImportedSymbol) -> Self {
        self.symbols.push(symbol);
        self
    }

    pub fn at(mut self, line: u32, column: u32) -> Self {
        self.location = Some(SourceLocation { line, column });
        self
    }
}
