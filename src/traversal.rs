//! Flattening of dropped or picked directory trees into a file list.

use std::future::Future;

use futures::FutureExt;
use futures::future::{LocalBoxFuture, try_join_all};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("failed to read {path}: {reason}")]
pub struct TraversalError {
    pub path: String,
    pub reason: String,
}

impl TraversalError {
    pub fn new(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

pub enum Entry<F, D> {
    File(F),
    Directory(D),
}

/// A tree that is listed page by page, like the browser's directory reader
/// or a native `read_dir`.
pub trait EntrySource {
    type FileEntry;
    type DirEntry;
    /// Cursor over one directory's listing.
    type Reader;
    type File;

    fn reader(&self, dir: &Self::DirEntry) -> Self::Reader;

    /// Next page of the listing. An empty page means the directory is
    /// exhausted.
    fn read_page(
        &self,
        reader: &mut Self::Reader,
    ) -> impl Future<Output = Result<Vec<Entry<Self::FileEntry, Self::DirEntry>>, TraversalError>>;

    fn file(
        &self,
        entry: Self::FileEntry,
    ) -> impl Future<Output = Result<Self::File, TraversalError>>;
}

/// Resolves every root into files, recursing into directories. Sibling
/// entries are read concurrently; the result keeps listing order and is
/// only returned once the whole tree has been read.
pub async fn flatten<S: EntrySource>(
    source: &S,
    roots: Vec<Entry<S::FileEntry, S::DirEntry>>,
) -> Result<Vec<S::File>, TraversalError> {
    let nested = try_join_all(roots.into_iter().map(|entry| resolve(source, entry))).await?;
    let files: Vec<S::File> = nested.into_iter().flatten().collect();
    debug!(files = files.len(), "directory traversal finished");
    Ok(files)
}

/// Drains a directory listing until an empty page comes back.
pub async fn read_all<S: EntrySource>(
    source: &S,
    dir: &S::DirEntry,
) -> Result<Vec<Entry<S::FileEntry, S::DirEntry>>, TraversalError> {
    let mut reader = source.reader(dir);
    let mut entries = Vec::new();
    loop {
        let page = source.read_page(&mut reader).await?;
        if page.is_empty() {
            return Ok(entries);
        }
        entries.extend(page);
    }
}

fn resolve<'a, S: EntrySource>(
    source: &'a S,
    entry: Entry<S::FileEntry, S::DirEntry>,
) -> LocalBoxFuture<'a, Result<Vec<S::File>, TraversalError>>
where
    S::FileEntry: 'a,
    S::DirEntry: 'a,
    S::Reader: 'a,
    S::File: 'a,
{
    async move {
        match entry {
            Entry::File(file) => Ok(vec![source.file(file).await?]),
            Entry::Directory(dir) => {
                let children = read_all(source, &dir).await?;
                let nested =
                    try_join_all(children.into_iter().map(|child| resolve(source, child)))
                        .await?;
                Ok(nested.into_iter().flatten().collect())
            }
        }
    }
    .boxed_local()
}
