//! Client-side flows for the ChunkGo document workbench.
//!
//! Everything here is transport and presentation agnostic: the browser
//! frontend (`frontend/`) and the `chunkgo` binary each plug their own
//! [`api::ChunkGoApi`], [`page::Page`] and [`poller::Sleeper`] into the same
//! upload, selection, batch trigger and polling logic.

pub mod api;
pub mod batch;
pub mod delete;
pub mod dify;
pub mod document;
pub mod error;
pub mod models;
pub mod page;
pub mod poller;
pub mod progress;
pub mod selection;
pub mod traversal;
pub mod upload;
pub mod validation;

#[cfg(feature = "cli")]
pub mod config;
#[cfg(feature = "cli")]
pub mod fs_tree;
#[cfg(feature = "cli")]
pub mod http;
#[cfg(feature = "cli")]
pub mod terminal;

#[cfg(test)]
pub(crate) mod testing;

pub use error::ClientError;
