use anyhow::{anyhow, Result};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

#[derive(Debug, Clone)]
pub struct FileSelection {
    pub files: Vec<PathBuf>,
    pub folder: PathBuf,
}

pub fn matches_pattern(file_name: &str, pattern: &str) -> bool {
    match pattern.strip_prefix('*') {
        Some(suffix) => file_name.ends_with(suffix),
        None => file_name == pattern,
    }
}

pub fn select_files(root: &Path, pattern: &str) -> Result<FileSelection> {
    if !root.is_dir() {
        return Err(anyhow!("not a directory: {}", root.display()));
    }
    let mut files = Vec::new();
    for entry in WalkDir::new(root).follow_links(false) {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        let matched = entry
            .file_name()
            .to_str()
            .map(|name| matches_pattern(name, pattern))
            .unwrap_or(false);
        if matched {
            files.push(entry.into_path());
        }
    }
    if files.is_empty() {
        return Err(anyhow!(
            "no files matching '{}' under {}",
            pattern,
            root.display()
        ));
    }
    files.sort();
    Ok(FileSelection {
        files,
        folder: root.to_path_buf(),
    })
}
