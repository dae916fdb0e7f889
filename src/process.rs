//! External commands with a time limit.

use crate::error::{RenderError, Result};
use std::process::{Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Run `command` to completion, killing it after `timeout`.
///
/// A non-zero exit and a timeout are both errors.
pub fn run(command: &mut Command, timeout: Duration) -> Result<()> {
    let line = describe(command);
    debug!("Running {}", line);

    let mut child = match command.stdout(Stdio::null()).stderr(Stdio::null()).spawn() {
        Ok(child) => child,
        Err(e) => {
            warn!("Cannot start {}: {}", line, e);
            return Err(RenderError::Subprocess {
                command: line,
                status: None,
            }
            .into());
        }
    };

    let start = Instant::now();
    loop {
        if let Some(status) = child.try_wait()? {
            if status.success() {
                return Ok(());
            }
            return Err(RenderError::Subprocess {
                command: line,
                status: status.code(),
            }
            .into());
        }
        if start.elapsed() >= timeout {
            // The child may have exited between the checks.
            let _ = child.kill();
            let _ = child.wait();
            return Err(RenderError::SubprocessTimeout {
                command: line,
                seconds: timeout.as_secs(),
            }
            .into());
        }
        thread::sleep(POLL_INTERVAL);
    }
}

/// The command line as a single string, for messages.
fn describe(command: &Command) -> String {
    let mut line = command.get_program().to_string_lossy().into_owned();
    for arg in command.get_args() {
        line.push(' ');
        line.push_str(&arg.to_string_lossy());
    }
    line
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::error::Error;

    #[test]
    fn test_success() {
        assert!(run(&mut Command::new("true"), Duration::from_secs(5)).is_ok());
    }

    #[test]
    fn test_failure_carries_status() {
        let mut command = Command::new("sh");
        command.args(["-c", "exit 3"]);
        match run(&mut command, Duration::from_secs(5)) {
            Err(Error::Render(RenderError::Subprocess { command, status })) => {
                assert_eq!(command, "sh -c exit 3");
                assert_eq!(status, Some(3));
            }
            other => panic!("unexpected result {other:?}"),
        }
    }

    #[test]
    fn test_timeout_kills_child() {
        let mut command = Command::new("sleep");
        command.arg("10");
        let start = Instant::now();
        match run(&mut command, Duration::from_millis(200)) {
            Err(Error::Render(RenderError::SubprocessTimeout { command, .. })) => {
                assert_eq!(command, "sleep 10");
            }
            other => panic!("unexpected result {other:?}"),
        }
        assert!(start.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn test_missing_program() {
        let result = run(
            &mut Command::new("definitely-not-a-real-program"),
            Duration::from_secs(1),
        );
        assert!(matches!(
            result,
            Err(Error::Render(RenderError::Subprocess { status: None, .. }))
        ));
    }
}
