#![doc = include_str!("../README.md")]

pub mod auth;
pub mod bot;
pub mod dataset;
pub mod error;
pub mod nav;
pub mod session;
pub mod store;
pub mod tree;
pub mod types;

pub use auth::{Authorizer, DenyAll, StaticCredentials};
pub use bot::{Command, Event, Message, Navigator, Reply};
pub use dataset::{Dataset, DatasetFile, MemoryDataset};
pub use error::{
    DataIntegrityError, DatasetError, NotFound, ParseNodeIdError, ReloadError, StoreError,
};
pub use nav::{Action, Button, NodeView, Notice, Outcome, Transition};
pub use session::{Session, SessionKey, SessionStore};
pub use store::{ReloadSummary, TreeStore};
pub use tree::Tree;
pub use types::{Node, NodeId, Row};
