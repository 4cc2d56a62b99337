//! Runner that spawns real processes.

use super::{CommandLine, CommandOutput, CommandRunner, RunError};
use std::io::Read;
use std::process::{Child, Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

/// How often a running child is polled for exit.
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// How long pipe readers get to finish once a child was killed.
const DRAIN_GRACE: Duration = Duration::from_secs(1);

/// Spawns the command with piped output and kills it on timeout.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRunner;

impl SystemRunner {
    pub fn new() -> Self {
        Self
    }
}

impl CommandRunner for SystemRunner {
    fn run(&self, command: &CommandLine, timeout: Duration) -> Result<CommandOutput, RunError> {
        let mut child = Command::new(&command.program)
            .args(&command.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    RunError::NotFound(command.program.clone())
                } else {
                    RunError::Io(format!("failed to execute {}: {e}", command.program))
                }
            })?;

        // Drain pipes on their own threads so a chatty child cannot block
        let stdout = drain(child.stdout.take());
        let stderr = drain(child.stderr.take());

        let exit_code = match wait_with_deadline(&mut child, timeout) {
            Ok(code) => code,
            Err(e) => {
                reap([stdout, stderr]);
                return Err(e);
            }
        };

        Ok(CommandOutput {
            exit_code,
            stdout: stdout.join().unwrap_or_default(),
            stderr: stderr.join().unwrap_or_default(),
        })
    }
}

fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> thread::JoinHandle<String> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        if let Some(mut pipe) = pipe {
            let _ = pipe.read_to_end(&mut buf);
        }
        String::from_utf8_lossy(&buf).to_string()
    })
}

/// Join pipe readers of a killed child, giving up after [`DRAIN_GRACE`].
///
/// A grandchild can inherit the pipes and keep them open; its readers are
/// detached and exit once the last writer closes.
fn reap(readers: [thread::JoinHandle<String>; 2]) {
    let deadline = Instant::now() + DRAIN_GRACE;
    for reader in readers {
        while !reader.is_finished() && Instant::now() < deadline {
            thread::sleep(POLL_INTERVAL);
        }
        if reader.is_finished() {
            let _ = reader.join();
        } else {
            log::debug!("pipe still held open after kill, detaching reader");
        }
    }
}

fn wait_with_deadline(child: &mut Child, timeout: Duration) -> Result<Option<i32>, RunError> {
    // Too large to represent means no deadline
    let deadline = Instant::now().checked_add(timeout);
    loop {
        match child.try_wait() {
            Ok(Some(status)) => return Ok(status.code()),
            Ok(None) if deadline.is_some_and(|d| Instant::now() >= d) => {
                let _ = child.kill();
                let _ = child.wait();
                return Err(RunError::TimedOut(timeout));
            }
            Ok(None) => thread::sleep(POLL_INTERVAL),
            Err(e) => {
                let _ = child.kill();
                let _ = child.wait();
                return Err(RunError::Io(format!("failed to wait for child: {e}")));
            }
        }
    }
}
