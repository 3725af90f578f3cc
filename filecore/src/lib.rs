//! Asynchronous file-attribute cache and task scheduler for a GNOME
//! Nautilus-like file manager.
//!
//! The crate's centre of gravity is [`node::FileNode`]: a cheaply cloned
//! handle, interned by [`registry::FileRegistry`], whose attributes
//! ([`node::FileInfo`], directory listings, thumbnails, recursive size) are
//! fetched lazily onto a worker pool ([`task::runner::PoolRunner`]) and
//! delivered back on a caller-chosen [`task::runner::Context`]. Everything
//! else in the crate — [`operations`], [`search`], [`undo`], [`tags`] — is
//! built on top of that same task/context plumbing.

pub mod cache;
pub mod change_bus;
pub mod config;
pub mod error;
pub mod location;
pub mod node;
pub mod operations;
pub mod registry;
pub mod search;
pub mod tags;
pub mod task;
pub mod thumbnail;
pub mod undo;

pub use change_bus::{ChangeBus, ChangeEvent};
pub use config::Config;
pub use error::{Error, Result};
pub use location::Location;
pub use node::{DirectoryNode, FileInfo, FileNode, NodeKind};
pub use registry::FileRegistry;
pub use task::runner::{Context, PoolRunner};
pub use task::{spawn_task, Cancellable, TaskHandle, TaskState};
