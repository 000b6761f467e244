use colored::Colorize;
use serde::Serialize;

use crate::errors::AppError;

/// Message categories used by the CLI output helpers.
#[derive(Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    Section,
    Warning,
    Error,
}

fn apply_style(kind: MessageKind, text: &str) -> String {
    match kind {
        MessageKind::Section => format!("=== {} ===", text.trim()).bold().cyan().to_string(),
        MessageKind::Warning => format!("WARNING: [!] {text}").yellow().to_string(),
        MessageKind::Error => format!("ERROR: [x] {text}").red().bold().to_string(),
    }
}

/// Human-readable lines go to stderr so stdout stays machine-readable JSON.
pub struct Printer {
    quiet: bool,
}

impl Printer {
    pub fn new(quiet: bool) -> Self {
        Self { quiet }
    }

    pub fn section(&self, title: impl AsRef<str>) {
        if !self.quiet {
            eprintln!("{}", apply_style(MessageKind::Section, title.as_ref()));
        }
    }

    pub fn warnings<'a>(&self, warnings: impl IntoIterator<Item = &'a String>) {
        if self.quiet {
            return;
        }
        for warning in warnings {
            eprintln!("{}", apply_style(MessageKind::Warning, warning));
        }
    }

    pub fn json<T: Serialize>(&self, value: &T) -> Result<(), AppError> {
        println!("{}", serde_json::to_string_pretty(value)?);
        Ok(())
    }
}

/// Errors are always printed, with their wire code.
pub fn print_error(err: &AppError) {
    eprintln!(
        "{}",
        apply_style(MessageKind::Error, &format!("{} ({})", err, err.code()))
    );
}
