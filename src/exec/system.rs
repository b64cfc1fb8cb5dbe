use super::{CommandRequest, CommandRunner, ExecutionResult, InvocationError, RunControl};
use crate::error::{Result, SysPkgError};
use crate::ui;
use std::io::{ErrorKind, Read};
#[cfg(unix)]
use std::os::unix::process::CommandExt;
use std::process::{Child, Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

/// Caller variables that survive the environment reset
const PASSTHROUGH_VARS: &[&str] = &[
    "PATH",
    "HOME",
    "USER",
    "TMPDIR",
    "XDG_RUNTIME_DIR",
    "XDG_DATA_HOME",
];

/// Extra variables kept when a terminal is handed to the child
const INTERACTIVE_VARS: &[&str] = &["TERM", "COLORTERM", "DISPLAY", "WAYLAND_DISPLAY"];

/// Locale pinning so tool output is never translated
const PINNED_LOCALE: &[(&str, &str)] = &[("LC_ALL", "C"), ("LANG", "C"), ("LANGUAGE", "C")];

const CAPTURE_POLL: Duration = Duration::from_millis(50);
const INTERACTIVE_POLL: Duration = Duration::from_millis(100);

/// Runs real processes.
#[derive(Debug, Clone, Default)]
pub struct SystemRunner {
    /// Applied after locale pinning and before per-request variables
    base_env: Vec<(String, String)>,
}

impl SystemRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_env(base_env: Vec<(String, String)>) -> Self {
        Self { base_env }
    }

    fn build_command(&self, request: &CommandRequest, interactive: bool) -> Command {
        let mut cmd = Command::new(&request.program);
        cmd.args(&request.args);
        cmd.env_clear();

        let terminal: &[&str] = if interactive { INTERACTIVE_VARS } else { &[] };
        for key in PASSTHROUGH_VARS.iter().chain(terminal) {
            if let Some(value) = std::env::var_os(key) {
                cmd.env(key, value);
            }
        }
        for (key, value) in PINNED_LOCALE {
            cmd.env(key, value);
        }
        for (key, value) in self.base_env.iter().chain(request.env.iter()) {
            cmd.env(key, value);
        }
        cmd
    }
}

fn spawn_error(program: &str, err: std::io::Error) -> InvocationError {
    if err.kind() == ErrorKind::NotFound {
        InvocationError::NotFound {
            program: program.to_string(),
        }
    } else {
        InvocationError::SpawnFailed {
            program: program.to_string(),
            reason: err.to_string(),
        }
    }
}

fn drain<R: Read + Send + 'static>(stream: Option<R>) -> thread::JoinHandle<Vec<u8>> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        if let Some(stream) = stream {
            let _ = std::io::BufReader::new(stream).read_to_end(&mut buf);
        }
        buf
    })
}

/// How far a kill reaches when the deadline or a cancel fires
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Reach {
    /// Only the direct child; it shares our terminal
    Child,
    /// The child's whole process group, grandchildren included
    Group,
}

fn stop(child: &mut Child, reach: Reach) {
    #[cfg(unix)]
    if reach == Reach::Group
        && let Ok(pgid) = libc::pid_t::try_from(child.id())
    {
        // SAFETY: signalling a process group we created; no memory is touched.
        unsafe {
            libc::kill(-pgid, libc::SIGKILL);
        }
    }
    let _ = child.kill();
    let _ = child.wait();
}

/// Outcome of waiting on a child under a deadline and cancel flag
enum Waited {
    Exited(i32),
    Expired(InvocationError),
}

fn wait_with_control(
    child: &mut Child,
    request: &CommandRequest,
    control: &RunControl,
    poll: Duration,
    reach: Reach,
) -> Waited {
    let start = Instant::now();
    loop {
        match child.try_wait() {
            // Signal deaths have no code; report them like a shell would.
            Ok(Some(status)) => return Waited::Exited(status.code().unwrap_or(128)),
            Ok(None) => {
                if control.cancel.is_cancelled() {
                    stop(child, reach);
                    return Waited::Expired(InvocationError::Cancelled {
                        command: request.command_line(),
                    });
                }
                if start.elapsed() > control.timeout {
                    stop(child, reach);
                    return Waited::Expired(InvocationError::TimedOut {
                        command: request.command_line(),
                        seconds: control.timeout.as_secs(),
                    });
                }
                thread::sleep(poll);
            }
            Err(e) => {
                stop(child, reach);
                return Waited::Expired(InvocationError::SpawnFailed {
                    program: request.program.clone(),
                    reason: e.to_string(),
                });
            }
        }
    }
}

impl CommandRunner for SystemRunner {
    fn run(&self, request: &CommandRequest, control: &RunControl) -> ExecutionResult {
        ui::debug(&format!("exec: {}", request.display()));

        let mut cmd = self.build_command(request, false);
        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        #[cfg(unix)]
        cmd.process_group(0);

        let mut child = match cmd.spawn() {
            Ok(child) => child,
            Err(e) => return ExecutionResult::failed_to_run(spawn_error(&request.program, e)),
        };

        let stdout_thread = drain(child.stdout.take());
        let stderr_thread = drain(child.stderr.take());

        match wait_with_control(&mut child, request, control, CAPTURE_POLL, Reach::Group) {
            Waited::Exited(exit_code) => {
                ui::debug(&format!("exit {}: {}", exit_code, request.program));
                ExecutionResult {
                    exit_code,
                    stdout: stdout_thread.join().unwrap_or_default(),
                    stderr: stderr_thread.join().unwrap_or_default(),
                    invocation_error: None,
                }
            }
            // Drain threads are left to finish on their own: a process that
            // escaped the group can still hold the pipes open.
            Waited::Expired(error) => {
                ui::debug(&format!("{}: {}", request.program, SysPkgError::from(error.clone())));
                ExecutionResult::failed_to_run(error)
            }
        }
    }

    fn run_interactive(&self, request: &CommandRequest, control: &RunControl) -> Result<i32> {
        ui::debug(&format!("exec (interactive): {}", request.display()));

        let mut cmd = self.build_command(request, true);
        cmd.stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit());

        let mut child = cmd
            .spawn()
            .map_err(|e| SysPkgError::from(spawn_error(&request.program, e)))?;

        match wait_with_control(&mut child, request, control, INTERACTIVE_POLL, Reach::Child) {
            Waited::Exited(code) => Ok(code),
            Waited::Expired(error) => Err(error.into()),
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::exec::CancelToken;

    #[test]
    fn captures_streams_and_exit_code_separately() {
        let runner = SystemRunner::new();
        let req = CommandRequest::new("sh").args(["-c", "echo out; echo err >&2; exit 3"]);
        let result = runner.run(&req, &RunControl::default());

        assert!(result.invocation_error.is_none());
        assert_eq!(result.exit_code, 3);
        assert_eq!(result.stdout_text(), "out\n");
        assert_eq!(result.stderr_text(), "err\n");
    }

    #[test]
    fn locale_is_pinned_and_caller_env_dropped() {
        // SAFETY: test-local variable, not read concurrently by other tests.
        unsafe { std::env::set_var("SYSPKG_TEST_LEAK", "1") };
        let runner = SystemRunner::with_env(vec![("DEBIAN_FRONTEND".into(), "noninteractive".into())]);
        let req = CommandRequest::new("sh").args(["-c", "echo $LC_ALL:$SYSPKG_TEST_LEAK:$DEBIAN_FRONTEND"]);
        let result = runner.run(&req, &RunControl::default());
        assert_eq!(result.stdout_text(), "C::noninteractive\n");
    }

    #[test]
    fn arguments_are_not_shell_interpreted() {
        let runner = SystemRunner::new();
        let req = CommandRequest::new("echo").arg("a; echo injected");
        let result = runner.run(&req, &RunControl::default());
        assert_eq!(result.stdout_text(), "a; echo injected\n");
    }

    #[test]
    fn missing_binary_is_an_invocation_error() {
        let runner = SystemRunner::new();
        let req = CommandRequest::new("definitely-not-a-real-binary-syspkg");
        let result = runner.run(&req, &RunControl::default());
        assert!(matches!(
            result.invocation_error,
            Some(InvocationError::NotFound { .. })
        ));
    }

    #[test]
    fn deadline_kills_hung_child() {
        let runner = SystemRunner::new();
        let req = CommandRequest::new("sleep").arg("30");
        let started = Instant::now();
        let result = runner.run(&req, &RunControl::with_timeout(Duration::from_millis(200)));

        assert!(matches!(
            result.invocation_error,
            Some(InvocationError::TimedOut { .. })
        ));
        assert!(started.elapsed() < Duration::from_secs(10));
    }

    #[test]
    fn deadline_does_not_wait_for_grandchildren() {
        let runner = SystemRunner::new();
        let req = CommandRequest::new("sh").args(["-c", "sleep 8; echo done"]);
        let started = Instant::now();
        let result = runner.run(&req, &RunControl::with_timeout(Duration::from_millis(200)));

        assert!(matches!(
            result.invocation_error,
            Some(InvocationError::TimedOut { .. })
        ));
        assert!(started.elapsed() < Duration::from_secs(3));
    }

    #[test]
    fn cancellation_does_not_wait_for_grandchildren() {
        let runner = SystemRunner::new();
        let token = CancelToken::new();
        let control = RunControl {
            timeout: Duration::from_secs(30),
            cancel: token.clone(),
        };
        let canceller = thread::spawn(move || {
            thread::sleep(Duration::from_millis(200));
            token.cancel();
        });
        let req = CommandRequest::new("sh").args(["-c", "sleep 8 & sleep 8; wait"]);
        let started = Instant::now();
        let result = runner.run(&req, &control);
        canceller.join().unwrap();

        assert!(matches!(
            result.invocation_error,
            Some(InvocationError::Cancelled { .. })
        ));
        assert!(started.elapsed() < Duration::from_secs(3));
    }

    #[test]
    fn cancellation_stops_child() {
        let runner = SystemRunner::new();
        let token = CancelToken::new();
        token.cancel();
        let control = RunControl {
            timeout: Duration::from_secs(30),
            cancel: token,
        };
        let result = runner.run(&CommandRequest::new("sleep").arg("30"), &control);
        assert!(matches!(
            result.invocation_error,
            Some(InvocationError::Cancelled { .. })
        ));
    }
}
