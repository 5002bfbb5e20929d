//! Filesystem snapshots for change detection between builds.

use std::fs;
use std::path::Path;

use globset::{Glob, GlobSetBuilder};
use plugwatch_core::ProjectPath;
use plugwatch_core::hash::content_digest;
use tracing::warn;
use walkdir::WalkDir;

use crate::state::CreateRule;

/// Content digest of a file, or `None` if it cannot be read.
pub(crate) fn hash_file(path: &Path) -> Option<String> {
    fs::read(path).ok().map(|content| content_digest(&content))
}

/// Project paths that currently satisfy each rule, keyed by rule key.
///
/// All glob rules share one walk of the project, which skips `excluded`.
pub(crate) fn create_matches(
    root: &Path,
    rules: &[CreateRule],
    excluded: Option<&Path>,
) -> Vec<(String, Vec<String>)> {
    let mut results: Vec<Vec<String>> = vec![Vec::new(); rules.len()];
    let mut globs = GlobSetBuilder::new();
    let mut glob_rules: Vec<usize> = Vec::new();

    for (index, rule) in rules.iter().enumerate() {
        match rule {
            CreateRule::FilePath(path) => {
                if ProjectPath::new(path.as_str()).to_absolute(root).exists() {
                    results[index].push(path.clone());
                }
            }
            CreateRule::Glob(glob) => match Glob::new(glob) {
                Ok(glob) => {
                    globs.add(glob);
                    glob_rules.push(index);
                }
                Err(e) => warn!("Ignoring invalid glob '{}': {}", glob, e),
            },
            CreateRule::FileName {
                file_name,
                above_file_path,
            } => {
                let start = ProjectPath::new(above_file_path.as_str()).to_absolute(root);
                for dir in start.ancestors() {
                    let candidate = dir.join(file_name);
                    if candidate.exists() {
                        results[index]
                            .push(ProjectPath::from_absolute(root, &candidate).as_str().to_string());
                    }
                    if dir == root {
                        break;
                    }
                }
            }
        }
    }

    if !glob_rules.is_empty() {
        match globs.build() {
            Ok(set) => {
                let files = WalkDir::new(root)
                    .into_iter()
                    .filter_entry(|entry| excluded.is_none_or(|dir| entry.path() != dir))
                    .filter_map(|e| e.ok())
                    .filter(|entry| entry.file_type().is_file());
                for entry in files {
                    let path = ProjectPath::from_absolute(root, entry.path());
                    for hit in set.matches(path.as_str()) {
                        results[glob_rules[hit]].push(path.as_str().to_string());
                    }
                }
            }
            Err(e) => warn!("Ignoring glob rules: {}", e),
        }
    }

    rules
        .iter()
        .zip(results)
        .map(|(rule, mut matches)| {
            matches.sort();
            (rule.key(), matches)
        })
        .collect()
}

/// Whether creating `path` satisfies `rule`.
pub(crate) fn is_created_match(rule: &CreateRule, path: &str) -> bool {
    match rule {
        CreateRule::FilePath(file_path) => file_path == path,
        CreateRule::Glob(glob) => Glob::new(glob)
            .map(|glob| glob.compile_matcher().is_match(path))
            .unwrap_or(false),
        CreateRule::FileName {
            file_name,
            above_file_path,
        } => {
            let dir = if path == file_name {
                "."
            } else {
                match path.strip_suffix(file_name.as_str()).and_then(|d| d.strip_suffix('/')) {
                    Some(dir) => dir,
                    None => return false,
                }
            };
            is_ancestor_or_self(dir, above_file_path.trim_end_matches('/'))
        }
    }
}

fn is_ancestor_or_self(dir: &str, path: &str) -> bool {
    if dir == "." {
        return !path.starts_with("..");
    }
    path == dir || path.starts_with(&format!("{}/", dir))
}
