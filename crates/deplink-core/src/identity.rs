//! Stable node identifiers: generation and round-trip parsing.
//!
//! Identifiers are the shared currency across components; no other
//! subsystem invents its own naming. Canonical forms:
//! `<path>::<kind>::<name>`, `<path>::<parent_scope>::<kind>::<name>`,
//! and `library::<name>` for external packages.

use crate::graph::kinds;

const SEP: &str = "::";

/// A malformed identifier string.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid identifier {input:?}: {reason}")]
pub struct InvalidIdentifier {
    pub input: String,
    pub reason: &'static str,
}

impl InvalidIdentifier {
    fn new(input: &str, reason: &'static str) -> Self {
        Self {
            input: input.to_string(),
            reason,
        }
    }
}

/// The components recovered from an identifier by [`parse`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Parsed {
    /// Normalized path; None for the `library::` form.
    pub path: Option<String>,
    pub kind: String,
    pub name: String,
    pub parent_scope: Option<String>,
    pub is_library: bool,
}

/// Canonicalize a path for identifier use: backslashes folded to
/// forward slashes, made relative to `root` when possible, leading
/// slash enforced.
pub fn normalize(path: &str, root: Option<&str>) -> String {
    let mut p = path.replace('\\', "/");
    if let Some(root) = root {
        let mut r = root.replace('\\', "/");
        while r.len() > 1 && r.ends_with('/') {
            r.pop();
        }
        if let Some(rest) = p.strip_prefix(&r)
            && rest.starts_with('/')
        {
            p = rest.to_string();
        }
    }
    if !p.starts_with('/') {
        p.insert(0, '/');
    }
    p
}

/// The final path segment.
pub fn basename(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

pub fn file_id(path: &str, root: Option<&str>) -> String {
    let p = normalize(path, root);
    let base = basename(&p).to_string();
    format!("{p}{SEP}{}{SEP}{base}", kinds::FILE)
}

pub fn export_id(path: &str, name: &str, root: Option<&str>) -> String {
    format!("{}{SEP}{}{SEP}{name}", normalize(path, root), kinds::EXPORT)
}

pub fn import_id(path: &str, name: &str, root: Option<&str>) -> String {
    format!("{}{SEP}{}{SEP}{name}", normalize(path, root), kinds::IMPORT)
}

pub fn class_id(path: &str, name: &str, root: Option<&str>) -> String {
    format!("{}{SEP}{}{SEP}{name}", normalize(path, root), kinds::CLASS)
}

pub fn function_id(path: &str, name: &str, root: Option<&str>) -> String {
    format!("{}{SEP}{}{SEP}{name}", normalize(path, root), kinds::FUNCTION)
}

/// Method identifiers insert the owning class as a parent scope:
/// `<path>::<class>::method::<name>`.
pub fn method_id(path: &str, class_name: &str, method_name: &str, root: Option<&str>) -> String {
    format!(
        "{}{SEP}{class_name}{SEP}{}{SEP}{method_name}",
        normalize(path, root),
        kinds::METHOD
    )
}

pub fn library_id(library_name: &str) -> String {
    format!("{}{SEP}{library_name}", kinds::LIBRARY)
}

/// Parse an identifier back into its components. The inverse of the
/// generators above, modulo whitespace around segments.
pub fn parse(identifier: &str) -> Result<Parsed, InvalidIdentifier> {
    let segments: Vec<&str> = identifier.split(SEP).map(str::trim).collect();
    if segments.iter().any(|s| s.is_empty()) {
        return Err(InvalidIdentifier::new(identifier, "empty segment"));
    }
    if segments.len() == 2 && segments[0] == kinds::LIBRARY {
        return Ok(Parsed {
            path: None,
            kind: kinds::LIBRARY.to_string(),
            name: segments[1].to_string(),
            parent_scope: None,
            is_library: true,
        });
    }
    match segments.len() {
        0..=2 => Err(InvalidIdentifier::new(
            identifier,
            "expected at least three :: segments",
        )),
        3 => Ok(Parsed {
            path: Some(segments[0].to_string()),
            kind: segments[1].to_string(),
            name: segments[2].to_string(),
            parent_scope: None,
            is_library: false,
        }),
        4 => Ok(Parsed {
            path: Some(segments[0].to_string()),
            parent_scope: Some(segments[1].to_string()),
            kind: segments[2].to_string(),
            name: segments[3].to_string(),
            is_library: false,
        }),
        _ => Err(InvalidIdentifier::new(identifier, "too many :: segments")),
    }
}
