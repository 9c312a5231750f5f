use log::error;
use nix::sys::signal::{signal, SigHandler, Signal};

/// Signals the interactive shell itself must survive. A Ctrl-C at the prompt
/// belongs to the foreground command, not to the shell.
const BLOCK_SIGNALS: [Signal; 3] = [Signal::SIGINT, Signal::SIGQUIT, Signal::SIGTSTP];

/// Ignores the interactive block signals in the shell process. Called once
/// when the REPL starts.
pub fn ignore_block_signals() {
    set_handler(SigHandler::SigIgn);
}

/// Restores default dispositions in a forked child, before redirection and
/// exec, so spawned commands can be interrupted normally.
pub fn restore_default_signals() {
    set_handler(SigHandler::SigDfl);
}

fn set_handler(handler: SigHandler) {
    for sig in BLOCK_SIGNALS {
        if let Err(err) = unsafe { signal(sig, handler) } {
            error!("failed to set {} disposition: {}", sig, err);
        }
    }
}
