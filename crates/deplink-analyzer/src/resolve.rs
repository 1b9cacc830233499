//! Resolve import specifiers to project-relative file paths.
//!
//! Resolution is best-effort: a target that does not exist on disk is
//! a missing link, never an error. Errors are reserved for input that
//! cannot name a path at all.

use crate::import_source::ImportKind;
use crate::language::Language;
use std::path::{Path, PathBuf};

/// A specifier that cannot name a path.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ResolutionError {
    #[error("empty import specifier")]
    EmptySpecifier,
}

/// Outcome of resolving one file-import target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedTarget {
    /// Project-relative path with a leading slash.
    pub path: String,
    /// Whether the resolved file exists under the project root.
    pub exists: bool,
}

/// Resolves specifiers against a project root on disk.
#[derive(Debug, Clone)]
pub struct PathResolver {
    root: PathBuf,
}

impl PathResolver {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Whether a project-relative path (leading slash) is a file on disk.
    pub fn exists(&self, project_relative: &str) -> bool {
        self.root
            .join(project_relative.trim_start_matches('/'))
            .is_file()
    }

    /// Resolve a relative or aliased-absolute specifier against the
    /// importing file (a normalized project-relative path). Library and
    /// builtin specifiers never reach this; the analyzer maps those to
    /// library nodes directly.
    ///
    /// Extensionless targets probe the language's extension set, then
    /// `/index.<ext>`; when nothing matches, the extensionless path is
    /// kept with `exists = false`.
    pub fn resolve_file_target(
        &self,
        importing_file: &str,
        specifier: &str,
        kind: ImportKind,
        language: Language,
    ) -> Result<ResolvedTarget, ResolutionError> {
        let spec = specifier.trim();
        if spec.is_empty() {
            return Err(ResolutionError::EmptySpecifier);
        }

        let joined = match kind {
            ImportKind::Relative => format!("{}/{spec}", dir_of(importing_file)),
            _ => {
                if let Some(rest) = spec.strip_prefix("@/") {
                    format!("/src/{rest}")
                } else if let Some(rest) = spec.strip_prefix("~/") {
                    format!("/{rest}")
                } else {
                    format!("/{}", spec.trim_start_matches('/'))
                }
            }
        };
        let collapsed = collapse(&joined);

        if has_extension(&collapsed) {
            let exists = self.exists(&collapsed);
            return Ok(ResolvedTarget {
                path: collapsed,
                exists,
            });
        }
        for ext in language.candidate_extensions() {
            let candidate = format!("{collapsed}.{ext}");
            if self.exists(&candidate) {
                return Ok(ResolvedTarget {
                    path: candidate,
                    exists: true,
                });
            }
        }
        for ext in language.candidate_extensions() {
            let candidate = format!("{collapsed}/index.{ext}");
            if self.exists(&candidate) {
                return Ok(ResolvedTarget {
                    path: candidate,
                    exists: true,
                });
            }
        }
        Ok(ResolvedTarget {
            path: collapsed,
            exists: false,
        })
    }
}

/// The directory part of a project-relative file path.
fn dir_of(path: &str) -> &str {
    path.rsplit_once('/').map_or("", |(dir, _)| dir)
}

/// Lexically collapse `.`/`..` segments and duplicate slashes. `..`
/// never escapes the root.
fn collapse(path: &str) -> String {
    let mut segments: Vec<&str> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            s => segments.push(s),
        }
    }
    format!("/{}", segments.join("/"))
}

fn has_extension(path: &str) -> bool {
    Path::new(path).extension().is_some()
}
