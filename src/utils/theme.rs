use std::collections::HashMap;

use colored::Colorize;
use once_cell::sync::Lazy;

static MESSAGES: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    HashMap::from([
        ("welcome", "rill, a small tree-walking shell"),
        (
            "help",
            "pipes `|`, conjunctions `&&`, subshells `( )`, redirections `<` `>`; Ctrl-D or `exit` leaves",
        ),
        ("eof_signal", "received EOF, leaving rill"),
        ("interrupt_signal", "interrupted"),
        ("success_symbol", "✓"),
        ("error_symbol", "✗"),
        ("command_success", "ok"),
        ("command_error", "command failed"),
        ("error", "error"),
    ])
});

pub struct Theme {
    pub prompt_style: Box<dyn Fn(String) -> String>,
    pub success_style: Box<dyn Fn(String) -> String>,
    pub error_style: Box<dyn Fn(String) -> String>,
    pub warning_style: Box<dyn Fn(String) -> String>,
}

impl Theme {
    pub fn get_message(&self, key: &str) -> String {
        MESSAGES.get(key).copied().unwrap_or(key).to_string()
    }
}

impl Default for Theme {
    fn default() -> Self {
        Theme {
            prompt_style: Box::new(|s| s.bright_cyan().to_string()),
            success_style: Box::new(|s| s.bright_green().to_string()),
            error_style: Box::new(|s| s.bright_red().to_string()),
            warning_style: Box::new(|s| s.yellow().to_string()),
        }
    }
}

pub fn load_theme(theme_name: &str) -> Theme {
    match theme_name {
        // for dumb terminals and transcripts
        "plain" => Theme {
            prompt_style: Box::new(|s| s),
            success_style: Box::new(|s| s),
            error_style: Box::new(|s| s),
            warning_style: Box::new(|s| s),
        },
        _ => Theme::default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_message() {
        let theme = load_theme("plain");
        assert_eq!(theme.get_message("command_success"), "ok");
    }

    #[test]
    fn test_unknown_message_falls_back_to_key() {
        let theme = load_theme("plain");
        assert_eq!(theme.get_message("no-such-key"), "no-such-key");
    }
}
