use std::path::Path;

use libc::{EXIT_FAILURE, EXIT_SUCCESS};
use nix::unistd::chdir;

/// The closed set of commands the engine interprets itself. Everything else
/// is spawned as an external program.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Builtin {
    /// Terminate the whole shell process with success status.
    Exit,
    /// Change the working directory of the process running the engine.
    Cd,
}

impl Builtin {
    pub fn lookup(name: &str) -> Option<Self> {
        match name {
            "exit" => Some(Builtin::Exit),
            "cd" => Some(Builtin::Cd),
            _ => None,
        }
    }
}

/// `cd [dir]`: defaults to the user's home directory when no argument is
/// given. Never spawns a process; the directory change is visible only inside
/// the process that performed it, so a subshell discards it on exit.
pub fn change_directory(argv: &[String]) -> i32 {
    let target = argv.get(1).map(String::as_str).unwrap_or("~");
    let dir = shellexpand::tilde(target);

    match chdir(Path::new(dir.as_ref())) {
        Ok(()) => EXIT_SUCCESS,
        Err(err) => {
            eprintln!("cd: {}: {}", dir, err.desc());
            EXIT_FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup() {
        assert_eq!(Builtin::lookup("exit"), Some(Builtin::Exit));
        assert_eq!(Builtin::lookup("cd"), Some(Builtin::Cd));
        assert_eq!(Builtin::lookup("ls"), None);
        assert_eq!(Builtin::lookup(""), None);
    }

    #[test]
    fn test_cd_to_missing_directory_fails() {
        let argv = vec!["cd".to_string(), "/definitely/not/a/directory".to_string()];
        assert_ne!(change_directory(&argv), EXIT_SUCCESS);
    }
}
