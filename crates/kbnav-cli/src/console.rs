//! Line-oriented transport: one inbound event per stdin line, rendered
//! replies on stdout.
//!
//! Input lines look like `<session> <input>`:
//!
//! - `alice /start`, `alice /login admin pw`: commands
//! - `alice 2`, `alice parent`, `alice root`: button callback data
//! - `alice @new-data.csv`: send a file as a document
//!
//! Blank lines and lines starting with `#` are ignored.

use kbnav::{DatasetFile, Event, Navigator, Reply, SessionKey};
use std::path::Path;

/// A decoded input line.
#[derive(Debug, PartialEq, Eq)]
pub enum Line {
    Skip,
    Event(SessionKey, Event),
    /// The line could not be turned into an event; the text says why.
    Invalid(String),
}

pub fn parse_line(line: &str) -> Line {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return Line::Skip;
    }

    let Some((session, input)) = line.split_once(char::is_whitespace) else {
        return Line::Invalid(format!("expected `<session> <input>`, got {:?}", line));
    };
    let key = SessionKey::from(session);
    let input = input.trim();

    if let Some(path) = input.strip_prefix('@') {
        return match read_document(Path::new(path.trim())) {
            Ok(file) => Line::Event(key, Event::Document(file)),
            Err(e) => Line::Invalid(format!("cannot read {}: {}", path.trim(), e)),
        };
    }

    if input.starts_with('/') {
        return match Event::from_text(input) {
            Some(event) => Line::Event(key, event),
            None => Line::Invalid(format!("not a command: {:?}", input)),
        };
    }

    Line::Event(key, Event::from_callback(input))
}

fn read_document(path: &Path) -> std::io::Result<DatasetFile> {
    let bytes = std::fs::read(path)?;
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    Ok(DatasetFile::new(file_name, bytes))
}

/// Render a reply as `[session] ...` lines.
pub fn render(key: &SessionKey, reply: &Reply) -> String {
    let prefix = format!("[{}]", key);
    let mut out = Vec::new();

    match reply {
        Reply::View(view) => {
            for line in view.text().lines() {
                out.push(format!("{} {}", prefix, line).trim_end().to_string());
            }
            for button in &view.buttons {
                out.push(format!(
                    "{}   [{} -> {}]",
                    prefix,
                    button.label,
                    button.action.callback_data()
                ));
            }
        }
        Reply::Notice(notice) => out.push(format!("{} ! {}", prefix, notice)),
        Reply::Message(message) => {
            for line in message.to_string().lines() {
                out.push(format!("{} {}", prefix, line));
            }
        }
        Reply::Document(file) => out.push(format!(
            "{} document {} ({} bytes)",
            prefix,
            file.file_name,
            file.bytes.len()
        )),
    }

    out.join("\n")
}

/// Parse, dispatch, and render one input line.
pub fn handle_line(bot: &Navigator, line: &str) -> Option<String> {
    match parse_line(line) {
        Line::Skip => None,
        Line::Invalid(reason) => {
            tracing::warn!(%reason, "ignored input line");
            Some(format!("? {}", reason))
        }
        Line::Event(key, event) => {
            let reply = bot.handle(&key, event);
            Some(render(&key, &reply))
        }
    }
}
