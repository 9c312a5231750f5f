use log::{debug, warn};
pub use rustyline::error::ReadlineError;
use rustyline::history::FileHistory;
use rustyline::{CompletionType, Config as RlConfig, Editor};

use crate::utils::config::Config;

/// Thin wrapper around the rustyline editor: edit mode comes from config,
/// history is persisted in the configured history file.
pub struct ReadlineManager<'a> {
    config: &'a Config,
    editor: Editor<(), FileHistory>,
}

impl<'a> ReadlineManager<'a> {
    pub fn new(config: &'a Config) -> Result<Self, ReadlineError> {
        let rl_config = RlConfig::builder()
            .history_ignore_space(true)
            .completion_type(CompletionType::List)
            .edit_mode(config.edit_mode())
            .build();

        Ok(Self {
            config,
            editor: Editor::with_config(rl_config)?,
        })
    }

    /// A missing history file is the common first-run case, not an error.
    pub fn load_history(&mut self) {
        match self.editor.load_history(&self.config.history_file) {
            Ok(()) => debug!(
                "history loaded from {}",
                self.config.history_file.display()
            ),
            Err(err) => warn!(
                "could not load history {}: {}",
                self.config.history_file.display(),
                err
            ),
        }
    }

    pub fn readline(&mut self, prompt: &str) -> Result<String, ReadlineError> {
        self.editor.readline(prompt)
    }

    pub fn add_history(&mut self, line: &str) {
        if let Err(err) = self.editor.add_history_entry(line) {
            warn!("could not record history entry: {}", err);
        }
    }

    pub fn save_history(&mut self) {
        match self.editor.save_history(&self.config.history_file) {
            Ok(()) => debug!("history saved"),
            Err(err) => warn!(
                "could not save history {}: {}",
                self.config.history_file.display(),
                err
            ),
        }
    }
}
