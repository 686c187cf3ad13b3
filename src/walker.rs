use std::path::{Path, PathBuf};

use globset::GlobMatcher;

use crate::{
    error::{Error, Result},
    loader::DocumentKind,
};

/// A file selected for loading.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputFile {
    /// Name used in provenance markers: the file name for explicit inputs,
    /// the path relative to the walked directory otherwise.
    pub name: String,
    pub path: PathBuf,
}

/// Expand command-line inputs into the list of files to load.
///
/// Explicit files are kept as given, whatever their extension, so that
/// unsupported types are reported by the loader. Directories are walked
/// recursively for supported files (.txt, .pdf), skipping hidden entries;
/// `include` further filters walked files by their relative path.
pub fn collect_inputs(
    paths: &[PathBuf],
    include: Option<&GlobMatcher>,
) -> Result<Vec<InputFile>> {
    let mut inputs = Vec::new();

    for path in paths {
        if path.is_dir() {
            let mut found = discover_files(path)?;
            if let Some(glob) = include {
                found.retain(|file| glob.is_match(&file.name));
            }
            inputs.extend(found);
        } else if path.is_file() {
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| path.display().to_string());
            inputs.push(InputFile {
                name,
                path: path.clone(),
            });
        } else {
            return Err(Error::NotFound {
                kind: "path",
                name: path.display().to_string(),
            });
        }
    }

    Ok(inputs)
}

/// Recursively walk a directory and discover supported document files,
/// sorted by relative path.
pub fn discover_files(root: &Path) -> Result<Vec<InputFile>> {
    let canonical_root = root.canonicalize()?;
    let mut results = Vec::new();
    walk_dir(&canonical_root, &canonical_root, &mut results)?;
    results.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(results)
}

fn walk_dir(
    root: &Path,
    current: &Path,
    results: &mut Vec<InputFile>,
) -> Result<()> {
    for entry in std::fs::read_dir(current)? {
        let entry = entry?;
        let file_name = entry.file_name();

        if file_name.to_string_lossy().starts_with('.') {
            continue;
        }

        let file_type = entry.file_type()?;

        if file_type.is_dir() {
            walk_dir(root, &entry.path(), results)?;
        } else if file_type.is_symlink() {
            let resolved = match entry.path().canonicalize() {
                Ok(p) => p,
                Err(_) => continue, // broken symlink
            };
            // Directory links are not followed (cycle prevention).
            if resolved.is_file() && is_supported(&resolved) {
                results.push(make_input(root, &entry.path(), resolved));
            }
        } else if file_type.is_file() && is_supported(&entry.path()) {
            results.push(make_input(root, &entry.path(), entry.path()));
        }
    }

    Ok(())
}

fn is_supported(path: &Path) -> bool {
    DocumentKind::from_path(path).is_some()
}

fn make_input(root: &Path, original: &Path, resolved: PathBuf) -> InputFile {
    let relative = original.strip_prefix(root).unwrap_or(original);
    InputFile {
        name: relative.to_string_lossy().into_owned(),
        path: resolved,
    }
}
