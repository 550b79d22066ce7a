#![doc = include_str!("../README.md")]

pub mod error;
pub mod file;
pub mod reader;
#[cfg(feature = "watcher")]
pub mod watcher;

pub use error::{Result, SheetError};
pub use file::SheetDataset;
pub use reader::{SheetFormat, SheetReader};
#[cfg(feature = "watcher")]
pub use watcher::{DatasetWatcher, WatcherConfig, WatcherHandle};
