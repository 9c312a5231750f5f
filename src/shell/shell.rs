use log::{debug, error, warn};
use std::error::Error;
use std::io::Write;

use crate::shell::executor::Executor;
use crate::shell::parser::Parser;
use crate::shell::readline::{ReadlineError, ReadlineManager};
use crate::shell::signals;
use crate::utils::config::Config;
use crate::utils::path;
use crate::utils::theme::{self, Theme};

pub struct Shell<'a> {
    theme: Theme,
    readline: ReadlineManager<'a>,
    executor: Executor,
}

impl<'a> Shell<'a> {
    pub fn new(config: &'a Config) -> Result<Self, ReadlineError> {
        Ok(Self {
            theme: theme::load_theme(&config.theme),
            readline: ReadlineManager::new(config)?,
            executor: Executor::new(),
        })
    }

    pub fn run(&mut self) -> Result<(), Box<dyn Error>> {
        debug!("starting rill...");

        // the shell itself shrugs off Ctrl-C and friends; forked children
        // restore default dispositions before exec
        signals::ignore_block_signals();

        self.readline.load_history();

        println!(
            "{}",
            (self.theme.success_style)(self.theme.get_message("welcome"))
        );
        println!(
            "{}",
            (self.theme.warning_style)(self.theme.get_message("help"))
        );
        debug!("rill ready");

        self.run_loop()?;
        self.readline.save_history();

        debug!("leaving rill...");
        Ok(())
    }

    fn run_loop(&mut self) -> Result<(), Box<dyn Error>> {
        loop {
            std::io::stdout().flush()?;
            let cwd = path::current_dir();
            let prompt =
                (self.theme.prompt_style)(format!("{} > ", path::basename(&cwd)));

            match self.readline.readline(&prompt) {
                Ok(line) => self.handle_input(&line),
                Err(err) => match err {
                    ReadlineError::Eof => {
                        warn!("received EOF, leaving rill...");
                        println!(
                            "\n{}",
                            (self.theme.warning_style)(self.theme.get_message("eof_signal"))
                        );
                        break;
                    }
                    ReadlineError::Interrupted => {
                        warn!("interrupted at the prompt");
                        println!(
                            "\n{}",
                            (self.theme.warning_style)(self.theme.get_message("interrupt_signal"))
                        );
                    }
                    err => {
                        error!("readline error: {}", err);
                        eprintln!(
                            "{}: {}",
                            (self.theme.error_style)(self.theme.get_message("error")),
                            err
                        );
                    }
                },
            }
        }
        Ok(())
    }

    fn handle_input(&mut self, line: &str) {
        if line.trim().is_empty() {
            return;
        }

        self.readline.add_history(line);
        debug!("executing line: {}", line);

        let mut parser = Parser::new(line);
        match parser.parse() {
            Ok(Some(tree)) => {
                let status = self.executor.execute(&tree);
                self.report_status(status);
            }
            Ok(None) => {}
            Err(err) => {
                eprintln!(
                    "{} {}",
                    (self.theme.error_style)(self.theme.get_message("error_symbol")),
                    (self.theme.error_style)(err)
                );
            }
        }
    }

    fn report_status(&self, status: i32) {
        if status == 0 {
            println!(
                "{} {}",
                (self.theme.success_style)(self.theme.get_message("success_symbol")),
                (self.theme.success_style)(self.theme.get_message("command_success"))
            );
        } else {
            eprintln!(
                "{} {}",
                (self.theme.error_style)(self.theme.get_message("error_symbol")),
                (self.theme.error_style)(format!(
                    "{} ({})",
                    self.theme.get_message("command_error"),
                    status
                ))
            );
        }
    }
}
