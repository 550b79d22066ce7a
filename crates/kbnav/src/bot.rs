//! Inbound events, outbound replies, and the dispatcher between them.

use crate::auth::Authorizer;
use crate::dataset::{Dataset, DatasetFile};
use crate::error::{DataIntegrityError, DatasetError, ReloadError};
use crate::nav::{self, Action, NodeView, Notice, Outcome, Transition};
use crate::session::{Session, SessionKey, SessionStore};
use crate::store::{ReloadSummary, TreeStore};
use std::fmt;
use std::sync::Arc;

// ── Inbound ──────────────────────────────────────────────────────────

/// Something a conversation sent, already decoded by the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// `/start`: show the root.
    Start,
    /// A child button was pressed; the payload is not validated yet.
    Select(String),
    Back,
    Home,
    Command(Command),
    /// A file was sent.
    Document(DatasetFile),
}

impl Event {
    /// Decode a text message. Returns `None` for plain text, which the
    /// bot does not react to.
    pub fn from_text(text: &str) -> Option<Event> {
        let mut words = text.split_whitespace();
        let head = words.next()?.strip_prefix('/')?;
        // Group chats address commands as `/name@botname`.
        let name = head.split('@').next().unwrap_or(head);
        let args: Vec<String> = words.map(str::to_string).collect();
        Some(match Command::parse(name, args) {
            Command::Start => Event::Start,
            command => Event::Command(command),
        })
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Event::Start => "start",
            Event::Select(_) => "select",
            Event::Back => "back",
            Event::Home => "home",
            Event::Command(_) => "command",
            Event::Document(_) => "document",
        }
    }

    /// Decode a button callback payload.
    pub fn from_callback(data: &str) -> Event {
        match Action::transition_for(data) {
            Transition::GoToParent => Event::Back,
            Transition::GoToRoot => Event::Home,
            Transition::Enter(id) => Event::Select(id.to_string()),
            Transition::Select(raw) => Event::Select(raw),
        }
    }
}

/// A slash command with its arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Start,
    Login(Vec<String>),
    Logout,
    Upload,
    Download,
    Reload,
    Unknown(String),
}

impl Command {
    pub fn parse(name: &str, args: Vec<String>) -> Self {
        match name.to_ascii_lowercase().as_str() {
            "start" => Command::Start,
            "login" => Command::Login(args),
            "logout" => Command::Logout,
            "upload" => Command::Upload,
            "download" => Command::Download,
            "reload" => Command::Reload,
            _ => Command::Unknown(name.to_string()),
        }
    }

    /// Whether the session must be logged in as administrator.
    pub fn requires_privilege(&self) -> bool {
        matches!(self, Command::Upload | Command::Download | Command::Reload)
    }

    pub fn name(&self) -> &str {
        match self {
            Command::Start => "start",
            Command::Login(_) => "login",
            Command::Logout => "logout",
            Command::Upload => "upload",
            Command::Download => "download",
            Command::Reload => "reload",
            Command::Unknown(name) => name,
        }
    }
}

// ── Outbound ─────────────────────────────────────────────────────────

/// Fixed bot messages that are not node views.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    NoPermission,
    UnexpectedDocument,
    FormatRejected(String),
    IntegrityRejected(DataIntegrityError),
    StorageFailed(String),
    DatasetUpdated(ReloadSummary),
    NoDatasetFile,
    UploadPrompt,
    LoginUsage,
    LoggedIn,
    LoginFailed,
    LoggedOut,
    UnknownCommand(String),
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Message::NoPermission => f.write_str("You do not have permission to use this command."),
            Message::UnexpectedDocument => f.write_str("Unexpected document."),
            Message::FormatRejected(reason) => write!(
                f,
                "The file was not accepted: {}. Columns must be id, parentid, name, text.",
                reason
            ),
            Message::IntegrityRejected(e) => {
                write!(f, "The dataset was rejected: {}. Nothing was changed.", e)
            }
            Message::StorageFailed(e) => write!(f, "Could not access the dataset file: {}", e),
            Message::DatasetUpdated(summary) => write!(
                f,
                "File uploaded and data updated ({} items).",
                summary.nodes
            ),
            Message::NoDatasetFile => f.write_str("No dataset file found."),
            Message::UploadPrompt => f.write_str("Send the new dataset file as a document."),
            Message::LoginUsage => f.write_str("Usage: /login <username> <password>"),
            Message::LoggedIn => f.write_str("Logged in as administrator."),
            Message::LoginFailed => f.write_str("Invalid username or password."),
            Message::LoggedOut => f.write_str("Logged out."),
            Message::UnknownCommand(name) => write!(f, "Unknown command: /{}", name),
        }
    }
}

/// At most one of these goes back to the transport per event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// Show a node with its buttons.
    View(NodeView),
    /// Transient feedback; the previous view stays on screen.
    Notice(Notice),
    Message(Message),
    /// Send a file back.
    Document(DatasetFile),
}

impl Reply {
    pub fn text(&self) -> String {
        match self {
            Reply::View(view) => view.text(),
            Reply::Notice(notice) => notice.to_string(),
            Reply::Message(message) => message.to_string(),
            Reply::Document(file) => file.file_name.clone(),
        }
    }

    pub fn view(&self) -> Option<&NodeView> {
        match self {
            Reply::View(view) => Some(view),
            _ => None,
        }
    }
}

// ── Dispatcher ───────────────────────────────────────────────────────

/// Routes events from any number of conversations.
///
/// Owns the tree store and session store, and borrows the dataset and
/// credential checks as collaborators. Share it behind an `Arc`; every
/// method takes `&self`.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use kbnav::{DenyAll, Event, MemoryDataset, Navigator, Row, SessionKey};
///
/// let dataset = MemoryDataset::with_rows(&[
///     Row::new(1, "Root").with_text("R"),
///     Row::new(2, "A").with_parent(1).with_text("a"),
/// ])
/// .unwrap();
/// let bot = Navigator::new(Arc::new(dataset), Arc::new(DenyAll));
/// bot.load_dataset().unwrap();
///
/// let key = SessionKey::from("chat-1");
/// assert_eq!(bot.handle(&key, Event::Start).text(), "Root\n\nR");
/// assert_eq!(bot.handle(&key, Event::Select("2".into())).text(), "A\n\na");
/// ```
pub struct Navigator {
    tree: TreeStore,
    sessions: SessionStore,
    dataset: Arc<dyn Dataset>,
    auth: Arc<dyn Authorizer>,
}

impl Navigator {
    /// A navigator with no data loaded yet.
    pub fn new(dataset: Arc<dyn Dataset>, auth: Arc<dyn Authorizer>) -> Self {
        Self {
            tree: TreeStore::new(),
            sessions: SessionStore::new(),
            dataset,
            auth,
        }
    }

    pub fn tree_store(&self) -> &TreeStore {
        &self.tree
    }

    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    /// Read the persisted dataset and make it active.
    ///
    /// `Ok(None)` means there is no dataset file; the active tree (or the
    /// "no data" state) is kept. Rows are read before the tree store is
    /// touched, so a slow read never blocks readers.
    pub fn load_dataset(&self) -> Result<Option<ReloadSummary>, ReloadError> {
        let Some(rows) = self.dataset.load()? else {
            tracing::info!("no dataset file, keeping current data");
            return Ok(None);
        };
        Ok(Some(self.tree.reload_from(rows)?))
    }

    /// Handle one event for one conversation.
    ///
    /// Events for the same `key` are processed one at a time.
    pub fn handle(&self, key: &SessionKey, event: Event) -> Reply {
        let guard = self.sessions.lock(key);
        let mut session = guard.get();
        tracing::debug!(session = %key, event = event.kind(), "event");

        match event {
            Event::Start => self.navigate(&mut session, Transition::GoToRoot),
            Event::Select(raw) => self.navigate(&mut session, Transition::Select(raw)),
            Event::Back => self.navigate(&mut session, Transition::GoToParent),
            Event::Home => self.navigate(&mut session, Transition::GoToRoot),
            Event::Command(command) => self.command(&mut session, command),
            Event::Document(file) => self.replace_dataset(&mut session, file),
        }
    }

    fn navigate(&self, session: &mut Session, transition: Transition) -> Reply {
        let Some(tree) = self.tree.snapshot() else {
            return Reply::Notice(Notice::NoData);
        };
        let outcome = nav::navigate(&tree, session.current(), transition);
        session.set_current(outcome.current());
        match outcome {
            Outcome::Moved(view) => Reply::View(view),
            Outcome::Refused { notice, .. } => {
                tracing::debug!(session = %session.key(), %notice, "navigation refused");
                Reply::Notice(notice)
            }
        }
    }

    fn command(&self, session: &mut Session, command: Command) -> Reply {
        if command.requires_privilege() && !session.is_privileged() {
            tracing::warn!(session = %session.key(), command = command.name(), "permission denied");
            return Reply::Message(Message::NoPermission);
        }

        let message = match command {
            Command::Start => return self.navigate(session, Transition::GoToRoot),
            Command::Login(args) => self.login(session, &args),
            Command::Logout => {
                session.set_privilege(false);
                session.set_awaiting_upload(false);
                Message::LoggedOut
            }
            Command::Upload => {
                session.set_awaiting_upload(true);
                Message::UploadPrompt
            }
            Command::Download => match self.dataset.export() {
                Ok(Some(file)) => return Reply::Document(file),
                Ok(None) => Message::NoDatasetFile,
                Err(e) => storage_failed(e),
            },
            Command::Reload => match self.load_dataset() {
                Ok(Some(summary)) => Message::DatasetUpdated(summary),
                Ok(None) => Message::NoDatasetFile,
                Err(ReloadError::Integrity(e)) => Message::IntegrityRejected(e),
                Err(ReloadError::Dataset(e)) => storage_failed(e),
            },
            Command::Unknown(name) => Message::UnknownCommand(name),
        };
        Reply::Message(message)
    }

    fn login(&self, session: &mut Session, args: &[String]) -> Message {
        let [username, password] = args else {
            return Message::LoginUsage;
        };
        if self.auth.authorize(username, password) {
            tracing::info!(session = %session.key(), "administrator login");
            session.set_privilege(true);
            Message::LoggedIn
        } else {
            tracing::warn!(session = %session.key(), "failed administrator login");
            Message::LoginFailed
        }
    }

    fn replace_dataset(&self, session: &mut Session, file: DatasetFile) -> Reply {
        if !session.is_awaiting_upload() {
            return Reply::Message(Message::UnexpectedDocument);
        }

        let rows = match self.dataset.decode(&file) {
            Ok(rows) => rows,
            Err(DatasetError::Format(reason)) => {
                tracing::warn!(file = %file.file_name, %reason, "upload rejected");
                return Reply::Message(Message::FormatRejected(reason));
            }
            Err(e) => return Reply::Message(storage_failed(e)),
        };

        // Validate before persisting so a bad upload never reaches disk.
        let tree = match TreeStore::build(rows) {
            Ok(tree) => tree,
            Err(e) => {
                tracing::warn!(file = %file.file_name, error = %e, "upload failed validation");
                return Reply::Message(Message::IntegrityRejected(e));
            }
        };

        if let Err(e) = self.dataset.store(&file) {
            return Reply::Message(storage_failed(e));
        }

        let summary = ReloadSummary {
            nodes: tree.len(),
            root: tree.root(),
            previous_nodes: self.tree.replace(tree).map(|t| t.len()),
        };
        session.set_awaiting_upload(false);
        tracing::info!(
            session = %session.key(),
            file = %file.file_name,
            nodes = summary.nodes,
            "dataset replaced by upload"
        );
        Reply::Message(Message::DatasetUpdated(summary))
    }
}

fn storage_failed(e: DatasetError) -> Message {
    tracing::error!(error = %e, "dataset storage failure");
    Message::StorageFailed(e.to_string())
}
