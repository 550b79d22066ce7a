//! The navigation state machine.
//!
//! [`navigate`] is a pure function: it reads one tree snapshot and the
//! session's stored position, and returns the new position plus what to
//! show. It never fails; every problem becomes a [`Notice`].

use crate::error::NotFound;
use crate::tree::Tree;
use crate::types::NodeId;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Body shown for nodes without text.
pub const EMPTY_BODY: &str = "No text";
pub const BACK_LABEL: &str = "Back";
pub const HOME_LABEL: &str = "Home";

/// A requested move.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    /// Enter a child of the current node.
    Enter(NodeId),
    GoToParent,
    GoToRoot,
    /// Unvalidated child id as received from the transport.
    Select(String),
}

/// What a button does when pressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    Enter(NodeId),
    Parent,
    Root,
}

impl Action {
    /// Callback payload the transport attaches to the button.
    pub fn callback_data(&self) -> String {
        match self {
            Action::Enter(id) => id.to_string(),
            Action::Parent => "parent".to_string(),
            Action::Root => "root".to_string(),
        }
    }

    /// Map a callback payload back to a transition.
    ///
    /// Anything that is not `parent` or `root` is treated as a child
    /// selection and validated later by [`navigate`].
    pub fn transition_for(data: &str) -> Transition {
        match data.trim() {
            "parent" => Transition::GoToParent,
            "root" => Transition::GoToRoot,
            other => Transition::Select(other.to_string()),
        }
    }
}

impl From<Action> for Transition {
    fn from(action: Action) -> Self {
        match action {
            Action::Enter(id) => Transition::Enter(id),
            Action::Parent => Transition::GoToParent,
            Action::Root => Transition::GoToRoot,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Button {
    pub label: String,
    pub action: Action,
}

/// One node rendered for display: text plus ordered buttons.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeView {
    pub id: NodeId,
    pub name: String,
    pub body: String,
    pub buttons: Vec<Button>,
}

impl NodeView {
    /// Render `id` as found in `tree`.
    ///
    /// Buttons: every child in source order, then `Back` if the node has a
    /// parent, then `Home` if the node is not the root.
    pub fn render(tree: &Tree, id: NodeId) -> Result<Self, NotFound> {
        let node = tree.get(id)?;

        let mut buttons: Vec<Button> = tree
            .child_nodes(id)?
            .map(|child| Button {
                label: child.name.clone(),
                action: Action::Enter(child.id),
            })
            .collect();

        if node.parent.is_some() {
            buttons.push(Button {
                label: BACK_LABEL.to_string(),
                action: Action::Parent,
            });
        }
        if id != tree.root() {
            buttons.push(Button {
                label: HOME_LABEL.to_string(),
                action: Action::Root,
            });
        }

        Ok(Self {
            id,
            name: node.name.clone(),
            body: node.body().unwrap_or(EMPTY_BODY).to_string(),
            buttons,
        })
    }

    /// Message text: the name, a blank line, the body.
    pub fn text(&self) -> String {
        format!("{}\n\n{}", self.name, self.body)
    }

    pub fn has_action(&self, action: Action) -> bool {
        self.buttons.iter().any(|b| b.action == action)
    }

    /// Child entries only, in display order.
    pub fn child_labels(&self) -> Vec<&str> {
        self.buttons
            .iter()
            .filter(|b| matches!(b.action, Action::Enter(_)))
            .map(|b| b.label.as_str())
            .collect()
    }
}

/// Transient, non-fatal feedback for a move that did not happen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    NoData,
    /// The id is not in the current tree (stale button after a reload).
    NodeGone(NodeId),
    /// The id exists but is not a child of the current node.
    NotAChild(NodeId),
    NoParent,
    InvalidSelection(String),
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Notice::NoData => f.write_str("No data to display."),
            Notice::NodeGone(_) => f.write_str("This item no longer exists."),
            Notice::NotAChild(_) => f.write_str("This item is not available here."),
            Notice::NoParent => f.write_str("Parent item not found."),
            Notice::InvalidSelection(_) => f.write_str("Invalid selection."),
        }
    }
}

/// Result of one navigation step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// The session moved (or stayed) at `view.id`.
    Moved(NodeView),
    /// Nothing moved; the session stays at `current`.
    Refused { current: NodeId, notice: Notice },
}

impl Outcome {
    /// Node the session is at after this step.
    pub fn current(&self) -> NodeId {
        match self {
            Outcome::Moved(view) => view.id,
            Outcome::Refused { current, .. } => *current,
        }
    }
}

/// Where a stored position lands in `tree`.
///
/// A position that was never set, or that vanished in a reload, resolves
/// to the root.
pub fn resolve(tree: &Tree, stored: Option<NodeId>) -> NodeId {
    stored
        .filter(|id| tree.contains(*id))
        .unwrap_or_else(|| tree.root())
}

/// Apply `transition` to a session positioned at `stored`.
///
/// # Example
///
/// ```
/// use kbnav::nav::{navigate, Outcome, Transition};
/// use kbnav::{NodeId, Row, Tree};
///
/// let tree = Tree::build(vec![
///     Row::new(1, "Root").with_text("R"),
///     Row::new(2, "A").with_parent(1).with_text("a"),
/// ])
/// .unwrap();
///
/// let step = navigate(&tree, None, Transition::Select("2".into()));
/// assert_eq!(step.current(), NodeId::new(2));
///
/// let back = navigate(&tree, Some(step.current()), Transition::GoToParent);
/// let Outcome::Moved(view) = back else { panic!() };
/// assert_eq!(view.text(), "Root\n\nR");
/// ```
pub fn navigate(tree: &Tree, stored: Option<NodeId>, transition: Transition) -> Outcome {
    let current = resolve(tree, stored);

    let target = match transition {
        Transition::GoToRoot => Ok(tree.root()),
        Transition::GoToParent => match tree.parent(current) {
            Ok(Some(parent)) => Ok(parent),
            Ok(None) | Err(_) => Err(Notice::NoParent),
        },
        Transition::Enter(child) => enter(tree, current, child),
        Transition::Select(raw) => match raw.parse::<NodeId>() {
            Ok(child) => enter(tree, current, child),
            Err(_) => Err(Notice::InvalidSelection(raw)),
        },
    };

    let view = target.and_then(|id| {
        NodeView::render(tree, id).map_err(|NotFound(missing)| Notice::NodeGone(missing))
    });

    match view {
        Ok(view) => Outcome::Moved(view),
        Err(notice) => Outcome::Refused { current, notice },
    }
}

fn enter(tree: &Tree, current: NodeId, child: NodeId) -> Result<NodeId, Notice> {
    if !tree.contains(child) {
        return Err(Notice::NodeGone(child));
    }
    if !tree.is_child(current, child) {
        return Err(Notice::NotAChild(child));
    }
    Ok(child)
}
