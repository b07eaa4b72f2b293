//! Terminal line input backed by rustyline.

use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use tracing::warn;

use crate::session::{LineReader, ReadOutcome};

/// Reads lines from the terminal with history and line editing.
pub struct Console {
    editor: DefaultEditor,
}

impl Console {
    /// Open the terminal.
    ///
    /// # Errors
    ///
    /// Fails if the terminal cannot be initialized.
    pub fn new() -> anyhow::Result<Self> {
        Ok(Self { editor: DefaultEditor::new()? })
    }
}

impl LineReader for Console {
    fn read_line(&mut self, prompt: &str) -> ReadOutcome {
        match self.editor.readline(prompt) {
            Ok(line) => {
                if !line.trim().is_empty() {
                    let _ = self.editor.add_history_entry(line.as_str());
                }
                ReadOutcome::Line(line)
            }
            Err(ReadlineError::Interrupted) => ReadOutcome::Interrupted,
            Err(ReadlineError::Eof) => ReadOutcome::Closed,
            Err(e) => {
                warn!(error = %e, "failed to read input");
                ReadOutcome::Closed
            }
        }
    }
}
