// registry.rs — Build registration
//
// Maps each list of output file names to the callback that renders their
// contents. The build driver either lists the expected file names (for its
// dependency graph) or renders everything and writes the files.
//
// Preconditions: a callback returns one artifact per registered file name,
//                in the same order.
// Postconditions: `generate` writes nothing unless every callback succeeded,
//                 returned the expected number of artifacts and every file
//                 could be staged next to its final name.
// Failure modes: `ArtifactCount` on a count mismatch, `Configuration` for a
//                file name registered twice, `Io` on write failure, and any
//                error a callback returns.
// Side effects: `generate` creates `out_dir` and writes files into it.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::info;

use crate::error::GenError;

/// Renders the artifacts of one registration.
pub type GeneratorFn<'a> = Box<dyn Fn() -> Result<Vec<String>, GenError> + 'a>;

struct Registration<'a> {
    files: Vec<String>,
    generator: GeneratorFn<'a>,
}

#[derive(Default)]
pub struct BuildRegistry<'a> {
    registrations: Vec<Registration<'a>>,
}

impl<'a> BuildRegistry<'a> {
    pub fn new() -> Self {
        BuildRegistry {
            registrations: Vec::new(),
        }
    }

    pub fn register(&mut self, files: Vec<String>, generator: GeneratorFn<'a>) -> Result<(), GenError> {
        for file in &files {
            if self.generated_files().contains(&file.as_str()) {
                return Err(GenError::config(format!(
                    "output file '{}' is registered twice",
                    file
                )));
            }
        }
        self.registrations.push(Registration { files, generator });
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.registrations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.registrations.is_empty()
    }

    /// Every registered output file name, in registration order.
    pub fn generated_files(&self) -> Vec<&str> {
        self.registrations
            .iter()
            .flat_map(|r| r.files.iter().map(String::as_str))
            .collect()
    }

    /// `;`-joined file list, the form build systems consume.
    pub fn list_output_files(&self) -> String {
        self.generated_files().join(";")
    }

    /// Run every callback and pair each artifact with its file name.
    pub fn render(&self) -> Result<Vec<(String, String)>, GenError> {
        let mut out = Vec::new();
        for r in &self.registrations {
            let artifacts = (r.generator)()?;
            if artifacts.len() != r.files.len() {
                return Err(GenError::ArtifactCount {
                    files: r.files.clone(),
                    expected: r.files.len(),
                    got: artifacts.len(),
                });
            }
            out.extend(r.files.iter().cloned().zip(artifacts));
        }
        Ok(out)
    }

    /// Render everything, stage every file as a temporary sibling, then
    /// move the staged files into place. A failed write removes every
    /// staged file before any final name is touched.
    pub fn generate(&self, out_dir: &Path) -> Result<Vec<PathBuf>, GenError> {
        let rendered = self.render()?;

        fs::create_dir_all(out_dir).map_err(|source| GenError::Io {
            path: out_dir.to_path_buf(),
            source,
        })?;

        let mut staged: Vec<(PathBuf, PathBuf, usize)> = Vec::with_capacity(rendered.len());
        for (name, content) in &rendered {
            let tmp = out_dir.join(format!(".{}.tmp", name));
            if let Err(source) = fs::write(&tmp, content.as_bytes()) {
                discard(staged.iter().map(|(t, _, _)| t).chain(std::iter::once(&tmp)));
                return Err(GenError::Io { path: tmp, source });
            }
            staged.push((tmp, out_dir.join(name), content.len()));
        }

        let mut written = Vec::with_capacity(staged.len());
        for (i, (tmp, path, bytes)) in staged.iter().enumerate() {
            if let Err(source) = fs::rename(tmp, path) {
                discard(staged[i..].iter().map(|(t, _, _)| t));
                return Err(GenError::Io {
                    path: path.clone(),
                    source,
                });
            }
            info!(file = %path.display(), bytes, "wrote artifact");
            written.push(path.clone());
        }
        Ok(written)
    }
}

/// Best-effort removal of staged files; a file that was never created is
/// not an error.
fn discard<'p>(paths: impl Iterator<Item = &'p PathBuf>) {
    for p in paths {
        let _ = fs::remove_file(p);
    }
}

// ── Tests ───────────────────────────────────────────────────────────────────
