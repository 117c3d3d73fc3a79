//! SD-004: Edit command synthesis.
//!
//! Turns a record's change set into a single `cobbler system edit` line.
//! Only changed fields appear; unchanged fields are never rewritten.

use super::types::Field;
use std::fmt;

/// Fixed command prefix.
pub const EDIT_PREFIX: &str = "cobbler system edit";

/// An edit invocation covering only the changed fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditCommand {
    pub name: String,
    /// Changed fields with their command-format rendering, in change order.
    pub changes: Vec<(Field, String)>,
}

impl EditCommand {
    pub fn new(name: &str, changes: Vec<(Field, String)>) -> Self {
        Self {
            name: name.to_string(),
            changes,
        }
    }

    /// True when no field changed; the command would only re-select the record.
    pub fn is_noop(&self) -> bool {
        self.changes.is_empty()
    }

    /// Argument vector form, unquoted, for spawning the command directly.
    pub fn args(&self) -> Vec<String> {
        let mut args: Vec<String> = EDIT_PREFIX.split(' ').map(str::to_string).collect();
        args.push("--name".to_string());
        args.push(self.name.clone());
        for (field, value) in &self.changes {
            args.push(format!("--{}", field.flag()));
            args.push(value.clone());
        }
        args
    }
}

impl fmt::Display for EditCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} --name {}", EDIT_PREFIX, shell_word(&self.name))?;
        for (field, value) in &self.changes {
            write!(f, " --{} {}", field.flag(), shell_quote(value))?;
        }
        Ok(())
    }
}

/// Single-quote a value for POSIX shells.
pub fn shell_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', r"'\''"))
}

/// A single shell word: bare when it needs no quoting, quoted otherwise.
/// An empty value becomes `''` so it still occupies its argument slot.
pub fn shell_word(value: &str) -> String {
    let bare = !value.is_empty()
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-' | ':' | '/' | '@'));
    if bare {
        value.to_string()
    } else {
        shell_quote(value)
    }
}
