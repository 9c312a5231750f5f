use dotenv::dotenv;
use rustyline::EditMode;
use std::env;
use std::fs;
use std::path::PathBuf;

pub struct Config {
    pub name: String,
    pub theme: String,
    pub config_dir: PathBuf,
    pub history_file: PathBuf,
    pub editor_mode: String,
    pub logger_level: String,
    pub logger_dir: PathBuf,
}

impl Config {
    fn get_config_dir() -> PathBuf {
        if let Ok(home) = env::var("HOME") {
            PathBuf::from(home).join(".config/rill")
        } else {
            PathBuf::from("/tmp/rill")
        }
    }

    fn default() -> Self {
        let config_dir = Self::get_config_dir();
        Config {
            name: String::from("rill"),
            theme: String::from("default"),
            history_file: config_dir.join("history"),
            editor_mode: String::from("emacs"),
            logger_level: String::from("warn"),
            logger_dir: config_dir.join("logs"),
            config_dir,
        }
    }

    pub fn new() -> Self {
        // environment files first
        if cfg!(debug_assertions) {
            dotenv::from_filename(".env.development").ok();
        } else {
            dotenv().ok();
        }

        let mut config = Config::default();

        if let Ok(theme) = env::var("RILL_THEME") {
            config.theme = theme;
        }

        if let Ok(editor) = env::var("RILL_EDITOR") {
            config.editor_mode = editor;
        }

        if let Ok(history) = env::var("RILL_HISTORY") {
            config.history_file = PathBuf::from(history);
        }

        if let Ok(level) = env::var("RILL_LOG_LEVEL") {
            config.logger_level = level;
        }

        if let Ok(dir) = env::var("RILL_LOG_DIR") {
            config.logger_dir = PathBuf::from(dir);
        }

        // make sure the history file's directory exists
        if let Some(parent) = config.history_file.parent() {
            if let Err(err) = fs::create_dir_all(parent) {
                eprintln!("rill: could not create {}: {}", parent.display(), err);
            }
        }

        config
    }

    pub fn edit_mode(&self) -> EditMode {
        match self.editor_mode.to_lowercase().as_str() {
            "vi" => EditMode::Vi,
            _ => EditMode::Emacs,
        }
    }
}
