use std::ffi::CString;
use std::fs::{File, OpenOptions};
use std::os::fd::{AsRawFd, RawFd};
use std::os::unix::fs::OpenOptionsExt;
use std::process;

use libc::{EXIT_FAILURE, EXIT_SUCCESS, STDIN_FILENO, STDOUT_FILENO};
use log::{debug, error};
use nix::sys::wait::{waitpid, WaitStatus};
use nix::unistd::{dup2, execvp, fork, pipe, ForkResult, Pid};

use crate::shell::parser::ast::{CommandNode, Conjunction};
use crate::shell::signals;

use super::builtins::{self, Builtin};

/// rw-rw-r--, subject to the umask.
const FILE_PERMISSION: u32 = 0o664;

/// sysexits.h: an operating system error has been detected. The `libc` crate
/// does not re-export the sysexits constants, so it is defined here.
const EX_OSERR: i32 = 71;

const FAILED_TO_EXEC: &str = "Failed to execute";
const AMBI_INPUT_RDR: &str = "Ambiguous input redirect.";
const AMBI_OUTPUT_RDR: &str = "Ambiguous output redirect.";

/// The execution engine: realizes a command tree as OS processes and returns
/// a single process-style exit status.
///
/// The engine blocks until everything it spawned has completed. Inherited
/// pipe endpoints are threaded through the recursion as explicit optional
/// descriptors rather than hidden global state, so their lifetime is
/// auditable at every call site.
pub struct Executor;

impl Executor {
    pub fn new() -> Self {
        Self
    }

    /// Runs the whole tree with no inherited descriptors.
    pub fn execute(&self, tree: &CommandNode) -> i32 {
        self.execute_pipe(tree, None, None)
    }

    fn execute_pipe(&self, node: &CommandNode, fdi: Option<RawFd>, fdo: Option<RawFd>) -> i32 {
        match node.conjunction {
            Conjunction::And => match (node.left.as_deref(), node.right.as_deref()) {
                (Some(left), Some(right)) => {
                    let status = self.execute_pipe(left, fdi, fdo);
                    if status == EXIT_SUCCESS {
                        self.execute_pipe(right, fdi, fdo)
                    } else {
                        // short-circuit: right never starts
                        status
                    }
                }
                _ => EXIT_FAILURE,
            },
            Conjunction::Pipe => match (node.left.as_deref(), node.right.as_deref()) {
                (Some(left), Some(right)) => self.execute_pipeline(left, right, fdi, fdo),
                _ => EXIT_FAILURE,
            },
            Conjunction::Subshell => match node.left.as_deref() {
                Some(body) => self.execute_subshell(body, fdi, fdo),
                None => EXIT_FAILURE,
            },
            Conjunction::None => self.execute_leaf(node, fdi, fdo),
        }
    }

    /// Runs `left | right` under a driver process; the parent only waits for
    /// the driver, whose exit status is the pipeline's combined status.
    fn execute_pipeline(
        &self,
        left: &CommandNode,
        right: &CommandNode,
        fdi: Option<RawFd>,
        fdo: Option<RawFd>,
    ) -> i32 {
        match unsafe { fork() } {
            Ok(ForkResult::Parent { child }) => self.wait_for(child),
            Ok(ForkResult::Child) => {
                let (read_end, write_end) = match pipe() {
                    Ok(ends) => ends,
                    Err(err) => {
                        eprintln!("pipe: {}", err.desc());
                        process::exit(EXIT_FAILURE);
                    }
                };

                match unsafe { fork() } {
                    Ok(ForkResult::Parent { child }) => {
                        // the writer holds the only remaining write end;
                        // ours must go or the reader never sees end-of-stream
                        drop(write_end);
                        let result = self.execute_pipe(right, Some(read_end.as_raw_fd()), fdo);
                        drop(read_end);
                        let status = self.wait_for(child);
                        // fail if either side of the pipeline failed
                        process::exit(if result != EXIT_SUCCESS { result } else { status });
                    }
                    Ok(ForkResult::Child) => {
                        drop(read_end);
                        let result = self.execute_pipe(left, fdi, Some(write_end.as_raw_fd()));
                        drop(write_end);
                        process::exit(result);
                    }
                    Err(err) => {
                        eprintln!("fork: {}", err.desc());
                        process::exit(EXIT_FAILURE);
                    }
                }
            }
            Err(err) => {
                error!("fork failed for pipeline: {}", err);
                eprintln!("fork: {}", err.desc());
                EXIT_FAILURE
            }
        }
    }

    /// Runs `body` in a forked child so process-wide state (e.g. a `cd`) is
    /// discarded when the subshell exits.
    fn execute_subshell(&self, body: &CommandNode, fdi: Option<RawFd>, fdo: Option<RawFd>) -> i32 {
        match unsafe { fork() } {
            Ok(ForkResult::Parent { child }) => self.wait_for(child),
            Ok(ForkResult::Child) => process::exit(self.execute_pipe(body, fdi, fdo)),
            Err(err) => {
                error!("fork failed for subshell: {}", err);
                eprintln!("fork: {}", err.desc());
                EXIT_FAILURE
            }
        }
    }

    fn execute_leaf(&self, node: &CommandNode, fdi: Option<RawFd>, fdo: Option<RawFd>) -> i32 {
        let name = match node.argv.first() {
            Some(name) => name.as_str(),
            None => return EXIT_FAILURE,
        };

        match Builtin::lookup(name) {
            Some(Builtin::Exit) => {
                debug!("exit builtin: terminating the shell");
                process::exit(EXIT_SUCCESS);
            }
            Some(Builtin::Cd) => return builtins::change_directory(&node.argv),
            None => {}
        }

        // argv is converted up front so the child only does descriptor
        // plumbing and exec after the fork
        let argv = match to_cstring_argv(&node.argv) {
            Some(argv) => argv,
            None => {
                eprintln!("{} {}", FAILED_TO_EXEC, name);
                return EXIT_FAILURE;
            }
        };

        debug!("spawning external command: {:?}", node.argv);
        match unsafe { fork() } {
            Ok(ForkResult::Parent { child }) => self.wait_for(child),
            Ok(ForkResult::Child) => {
                signals::restore_default_signals();
                redirect_stdio(node, fdi, fdo);
                let _ = execvp(&argv[0], &argv);
                eprintln!("{} {}", FAILED_TO_EXEC, name);
                process::exit(EXIT_FAILURE);
            }
            Err(err) => {
                error!("fork failed for {}: {}", name, err);
                eprintln!("fork: {}", err.desc());
                EXIT_FAILURE
            }
        }
    }

    /// Blocks until `child` terminates. A child killed by signal N reports
    /// status 128 + N.
    fn wait_for(&self, child: Pid) -> i32 {
        match waitpid(child, None) {
            Ok(WaitStatus::Exited(_, code)) => code,
            Ok(WaitStatus::Signaled(_, signal, _)) => 128 + signal as i32,
            Ok(status) => {
                error!("unexpected wait status: {:?}", status);
                EXIT_FAILURE
            }
            Err(err) => {
                error!("waitpid failed: {}", err);
                EXIT_FAILURE
            }
        }
    }
}

/// Installs the leaf's redirections on the child's standard streams. Runs in
/// the forked child only; on any failure the child dies without running the
/// command.
fn redirect_stdio(node: &CommandNode, fdi: Option<RawFd>, fdo: Option<RawFd>) {
    // ambiguity is detected before any descriptor is touched
    if node.input.is_some() && fdi.is_some() {
        eprintln!("{}", AMBI_INPUT_RDR);
        process::exit(EXIT_FAILURE);
    }
    if node.output.is_some() && fdo.is_some() {
        eprintln!("{}", AMBI_OUTPUT_RDR);
        process::exit(EXIT_FAILURE);
    }

    if let Some(path) = &node.input {
        let file = match File::open(path) {
            Ok(file) => file,
            Err(err) => {
                eprintln!("File opening (read) failed: {}: {}", path, err);
                process::exit(EX_OSERR);
            }
        };
        install(file.as_raw_fd(), STDIN_FILENO, "read");
        // `file` drops here, closing the descriptor that was duplicated
    } else if let Some(fd) = fdi {
        install(fd, STDIN_FILENO, "read");
    }

    if let Some(path) = &node.output {
        let file = match OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .mode(FILE_PERMISSION)
            .open(path)
        {
            Ok(file) => file,
            Err(err) => {
                eprintln!("File opening (write) failed: {}: {}", path, err);
                process::exit(EX_OSERR);
            }
        };
        install(file.as_raw_fd(), STDOUT_FILENO, "write");
    } else if let Some(fd) = fdo {
        install(fd, STDOUT_FILENO, "write");
    }
}

/// Duplicates `fd` onto a standard stream slot, dying with an OS-error
/// status if the slot cannot be filled.
fn install(fd: RawFd, slot: RawFd, direction: &str) {
    if let Err(err) = dup2(fd, slot) {
        eprintln!("dup2 ({}) failed: {}", direction, err.desc());
        process::exit(EX_OSERR);
    }
}

fn to_cstring_argv(argv: &[String]) -> Option<Vec<CString>> {
    argv.iter()
        .map(|arg| CString::new(arg.as_str()).ok())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::fs;
    use std::path::PathBuf;
    use std::sync::Mutex;

    // `cd` mutates process-wide state; tests that read or change the working
    // directory serialize on this.
    static CWD_LOCK: Mutex<()> = Mutex::new(());

    fn leaf(args: &[&str]) -> CommandNode {
        CommandNode::leaf(args.iter().map(|s| s.to_string()).collect(), None, None)
    }

    fn leaf_io(args: &[&str], input: Option<&str>, output: Option<&str>) -> CommandNode {
        CommandNode::leaf(
            args.iter().map(|s| s.to_string()).collect(),
            input.map(|s| s.to_string()),
            output.map(|s| s.to_string()),
        )
    }

    fn scratch_path(name: &str) -> PathBuf {
        env::temp_dir().join(format!("rill-test-{}-{}", process::id(), name))
    }

    #[test]
    fn test_leaf_exit_status() {
        let executor = Executor::new();
        assert_eq!(executor.execute(&leaf(&["true"])), 0);
        assert_ne!(executor.execute(&leaf(&["false"])), 0);
    }

    #[test]
    fn test_leaf_reports_child_code() {
        let executor = Executor::new();
        assert_eq!(executor.execute(&leaf(&["sh", "-c", "exit 7"])), 7);
    }

    #[test]
    fn test_exec_failure_is_nonzero() {
        let executor = Executor::new();
        assert_ne!(executor.execute(&leaf(&["rill-no-such-binary"])), 0);
    }

    #[allow(clippy::unwrap_used)]
    #[test]
    fn test_and_short_circuits() {
        let executor = Executor::new();
        let marker = scratch_path("and-marker");
        let _ = fs::remove_file(&marker);

        let tree = CommandNode::and(
            leaf(&["false"]),
            leaf(&["touch", marker.to_str().unwrap()]),
        );
        assert_ne!(executor.execute(&tree), 0);
        assert!(!marker.exists());
    }

    #[test]
    fn test_and_propagates_left_failure_code() {
        let executor = Executor::new();
        let tree = CommandNode::and(leaf(&["sh", "-c", "exit 3"]), leaf(&["true"]));
        assert_eq!(executor.execute(&tree), 3);
    }

    #[allow(clippy::unwrap_used)]
    #[test]
    fn test_and_returns_right_result_on_success() {
        let executor = Executor::new();
        let marker = scratch_path("and-right-marker");
        let _ = fs::remove_file(&marker);

        let tree = CommandNode::and(
            leaf(&["true"]),
            leaf(&["touch", marker.to_str().unwrap()]),
        );
        assert_eq!(executor.execute(&tree), 0);
        assert!(marker.exists());

        let tree = CommandNode::and(leaf(&["true"]), leaf(&["sh", "-c", "exit 5"]));
        assert_eq!(executor.execute(&tree), 5);

        let _ = fs::remove_file(&marker);
    }

    #[allow(clippy::unwrap_used)]
    #[test]
    fn test_pipe_streams_bytes() {
        let executor = Executor::new();
        let input = scratch_path("pipe-in");
        let output = scratch_path("pipe-out");
        fs::write(&input, "hello\n").unwrap();

        let tree = CommandNode::pipe(
            leaf_io(&["cat"], Some(input.to_str().unwrap()), None),
            leaf_io(&["cat"], None, Some(output.to_str().unwrap())),
        );
        assert_eq!(executor.execute(&tree), 0);
        assert_eq!(fs::read_to_string(&output).unwrap(), "hello\n");

        let _ = fs::remove_file(&input);
        let _ = fs::remove_file(&output);
    }

    #[test]
    fn test_pipe_fails_if_either_side_failed() {
        let executor = Executor::new();
        let tree = CommandNode::pipe(leaf(&["true"]), leaf(&["false"]));
        assert_ne!(executor.execute(&tree), 0);

        let tree = CommandNode::pipe(leaf(&["false"]), leaf(&["true"]));
        assert_ne!(executor.execute(&tree), 0);

        let tree = CommandNode::pipe(leaf(&["true"]), leaf(&["true"]));
        assert_eq!(executor.execute(&tree), 0);
    }

    #[allow(clippy::unwrap_used)]
    #[test]
    fn test_subshell_isolates_directory_change() {
        let _guard = CWD_LOCK.lock().unwrap();
        let executor = Executor::new();
        let before = env::current_dir().unwrap();

        let tree = CommandNode::subshell(leaf(&["cd", "/"]));
        assert_eq!(executor.execute(&tree), 0);
        assert_eq!(env::current_dir().unwrap(), before);
    }

    #[test]
    fn test_subshell_propagates_status() {
        let executor = Executor::new();
        let tree = CommandNode::subshell(leaf(&["sh", "-c", "exit 4"]));
        assert_eq!(executor.execute(&tree), 4);
    }

    #[allow(clippy::unwrap_used)]
    #[test]
    fn test_ambiguous_input_redirect_runs_nothing() {
        let executor = Executor::new();
        let input = scratch_path("ambi-in");
        let marker = scratch_path("ambi-in-marker");
        fs::write(&input, "data\n").unwrap();
        let _ = fs::remove_file(&marker);

        // the read side of the pipe also names `< file`
        let tree = CommandNode::pipe(
            leaf(&["echo", "hi"]),
            leaf_io(
                &["touch", marker.to_str().unwrap()],
                Some(input.to_str().unwrap()),
                None,
            ),
        );
        assert_ne!(executor.execute(&tree), 0);
        assert!(!marker.exists());

        let _ = fs::remove_file(&input);
    }

    #[allow(clippy::unwrap_used)]
    #[test]
    fn test_ambiguous_output_redirect_runs_nothing() {
        let executor = Executor::new();
        let marker = scratch_path("ambi-out-marker");
        let outfile = scratch_path("ambi-out-file");
        let _ = fs::remove_file(&marker);
        let _ = fs::remove_file(&outfile);

        // the write side of the pipe also names `> file`
        let tree = CommandNode::pipe(
            leaf_io(
                &["touch", marker.to_str().unwrap()],
                None,
                Some(outfile.to_str().unwrap()),
            ),
            leaf(&["cat"]),
        );
        assert_ne!(executor.execute(&tree), 0);
        assert!(!marker.exists());
        // ambiguity precedes the open, so the target file is never created
        assert!(!outfile.exists());
    }

    #[allow(clippy::unwrap_used)]
    #[test]
    fn test_output_redirection_round_trip() {
        let executor = Executor::new();
        let output = scratch_path("redir-out");

        let tree = leaf_io(&["echo", "hello"], None, Some(output.to_str().unwrap()));
        assert_eq!(executor.execute(&tree), 0);
        assert_eq!(fs::read_to_string(&output).unwrap(), "hello\n");

        let _ = fs::remove_file(&output);
    }

    #[allow(clippy::unwrap_used)]
    #[test]
    fn test_output_redirection_truncates() {
        let executor = Executor::new();
        let output = scratch_path("redir-trunc");
        fs::write(&output, "something much longer than the new contents\n").unwrap();

        let tree = leaf_io(&["echo", "new"], None, Some(output.to_str().unwrap()));
        assert_eq!(executor.execute(&tree), 0);
        assert_eq!(fs::read_to_string(&output).unwrap(), "new\n");

        let _ = fs::remove_file(&output);
    }

    #[test]
    fn test_missing_input_file_kills_child_only() {
        let executor = Executor::new();
        let tree = leaf_io(&["cat"], Some("/definitely/not/an/input"), None);
        assert_eq!(executor.execute(&tree), EX_OSERR);
    }

    #[allow(clippy::unwrap_used)]
    #[test]
    fn test_cd_builtin() {
        let _guard = CWD_LOCK.lock().unwrap();
        let executor = Executor::new();
        let before = env::current_dir().unwrap();

        // failure leaves the working directory unchanged
        assert_ne!(
            executor.execute(&leaf(&["cd", "/definitely/not/a/directory"])),
            0
        );
        assert_eq!(env::current_dir().unwrap(), before);

        // no argument moves to the home directory
        if let Ok(home) = env::var("HOME") {
            assert_eq!(executor.execute(&leaf(&["cd"])), 0);
            assert_eq!(
                env::current_dir().unwrap().canonicalize().unwrap(),
                PathBuf::from(home).canonicalize().unwrap()
            );
        }

        env::set_current_dir(before).unwrap();
    }
}
