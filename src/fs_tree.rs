//! Local files and directories as an upload source.

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::traversal::{Entry, EntrySource, TraversalError, flatten};
use crate::upload::NamedFile;

/// A path together with its location below the picked root, `/`-separated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalEntry {
    pub path: PathBuf,
    pub relative: String,
}

impl LocalEntry {
    fn child(&self, name: &str, path: PathBuf) -> Self {
        Self {
            path,
            relative: format!("{}/{name}", self.relative),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalFile {
    pub path: PathBuf,
    pub relative: String,
}

impl NamedFile for LocalFile {
    fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.relative.clone())
    }

    fn relative_path(&self) -> String {
        self.relative.clone()
    }
}

/// Listing cursor; `read_dir` hands back the whole directory in one page.
pub struct DirCursor {
    dir: LocalEntry,
    exhausted: bool,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct FsSource;

impl EntrySource for FsSource {
    type FileEntry = LocalEntry;
    type DirEntry = LocalEntry;
    type Reader = DirCursor;
    type File = LocalFile;

    fn reader(&self, dir: &LocalEntry) -> DirCursor {
        DirCursor {
            dir: dir.clone(),
            exhausted: false,
        }
    }

    async fn read_page(
        &self,
        reader: &mut DirCursor,
    ) -> Result<Vec<Entry<LocalEntry, LocalEntry>>, TraversalError> {
        if reader.exhausted {
            return Ok(Vec::new());
        }
        reader.exhausted = true;

        let dir = &reader.dir;
        let fail = |err: std::io::Error| read_error(dir, err);
        let mut listing = tokio::fs::read_dir(&dir.path).await.map_err(fail)?;

        let mut children = Vec::new();
        while let Some(child) = listing.next_entry().await.map_err(fail)? {
            let name = child.file_name().to_string_lossy().into_owned();
            children.push((name, child.path()));
        }
        children.sort();

        let mut page = Vec::with_capacity(children.len());
        for (name, path) in children {
            if let Some(entry) = classify_child(dir.child(&name, path)).await? {
                page.push(entry);
            }
        }
        debug!(dir = %dir.path.display(), entries = page.len(), "listed directory");
        Ok(page)
    }

    async fn file(&self, entry: LocalEntry) -> Result<LocalFile, TraversalError> {
        Ok(LocalFile {
            path: entry.path,
            relative: entry.relative,
        })
    }
}

fn read_error(entry: &LocalEntry, err: std::io::Error) -> TraversalError {
    TraversalError::new(entry.path.display().to_string(), err.to_string())
}

/// Follows symlinks; used for the paths named on the command line.
async fn classify(entry: LocalEntry) -> Result<Entry<LocalEntry, LocalEntry>, TraversalError> {
    let metadata = tokio::fs::metadata(&entry.path)
        .await
        .map_err(|err| read_error(&entry, err))?;
    Ok(if metadata.is_dir() {
        Entry::Directory(entry)
    } else {
        Entry::File(entry)
    })
}

/// Inside a walked directory only linked files are followed. Linked
/// directories and dangling links are skipped, so link cycles end.
async fn classify_child(
    entry: LocalEntry,
) -> Result<Option<Entry<LocalEntry, LocalEntry>>, TraversalError> {
    let metadata = tokio::fs::symlink_metadata(&entry.path)
        .await
        .map_err(|err| read_error(&entry, err))?;
    if !metadata.file_type().is_symlink() {
        return Ok(Some(if metadata.is_dir() {
            Entry::Directory(entry)
        } else {
            Entry::File(entry)
        }));
    }
    match tokio::fs::metadata(&entry.path).await {
        Ok(target) if target.is_file() => Ok(Some(Entry::File(entry))),
        Ok(_) => {
            debug!(path = %entry.path.display(), "skipping symlinked directory");
            Ok(None)
        }
        Err(err) => {
            debug!(path = %entry.path.display(), error = %err, "skipping dangling symlink");
            Ok(None)
        }
    }
}

fn root_entry(path: &Path) -> LocalEntry {
    let relative = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    LocalEntry {
        path: path.to_path_buf(),
        relative,
    }
}

/// Expands files and directories given on the command line into the files
/// to upload. A directory's files keep its name as the first path segment.
pub async fn collect_files(paths: &[PathBuf]) -> Result<Vec<LocalFile>, TraversalError> {
    let mut roots = Vec::with_capacity(paths.len());
    for path in paths {
        roots.push(classify(root_entry(path)).await?);
    }
    flatten(&FsSource, roots).await
}
