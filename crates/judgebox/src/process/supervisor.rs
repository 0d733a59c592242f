//! Spawning and watching a single command

use std::collections::HashSet;
use std::os::unix::process::ExitStatusExt;
use std::process::{ExitStatus, Stdio};
use std::time::Instant;

use nix::errno::Errno;
use nix::sys::wait::{Id, WaitPidFlag, waitid};
use nix::unistd::Pid;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, instrument, warn};

use crate::process::procfs::{escaped_descendants, process_resident_bytes};
use crate::process::{
    CommandSpec, Escapee, ProcessOutput, Watch, group_resident_bytes, kill_escapee, kill_group,
};
use crate::types::ExecutionFailure;

/// What ended the wait
#[derive(Debug)]
enum Terminal {
    Exited,
    Breach(ExecutionFailure),
}

/// Bytes read from one pipe
#[derive(Debug, Default)]
struct Captured {
    bytes: Vec<u8>,
    overflowed: bool,
}

/// One pass over the process table
#[derive(Debug, Default)]
struct Reading {
    resident_bytes: Option<u64>,
    escaped: Vec<Escapee>,
}

/// Run a command to completion under the given watch.
///
/// Always resolves to a classification: spawn and wait errors become
/// [`ExecutionFailure::RuntimeError`]. On return no process of the group is
/// left running, and neither is any descendant the sampler saw leave it.
#[instrument(skip(command, watch), fields(program = %command.program))]
pub async fn run(command: &CommandSpec, watch: &Watch) -> Result<ProcessOutput, ExecutionFailure> {
    let stdin = match &command.stdin {
        Some(path) => match std::fs::File::open(path) {
            Ok(file) => Stdio::from(file),
            Err(e) => {
                return Err(ExecutionFailure::RuntimeError {
                    diagnostic: format!("failed to open input {}: {e}", path.display()),
                });
            }
        },
        None => Stdio::null(),
    };

    let started = Instant::now();
    let deadline_at = tokio::time::Instant::now() + watch.deadline;
    let mut child = Command::new(&command.program)
        .args(&command.args)
        .envs(&command.env)
        .stdin(stdin)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .process_group(0)
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| ExecutionFailure::RuntimeError {
            diagnostic: format!("failed to start {}: {e}", command.program),
        })?;

    // With process_group(0) the group id equals the leader's pid.
    let Some(pgid) = child.id().map(|pid| pid as i32) else {
        return Err(ExecutionFailure::RuntimeError {
            diagnostic: format!("{} exited before it could be observed", command.program),
        });
    };
    debug!(pgid, "spawned process group");

    let (overflow_tx, mut overflow_rx) = mpsc::channel(2);
    let limit = usize::try_from(watch.output_limit_bytes).unwrap_or(usize::MAX);
    let mut stdout_task = spawn_capture(child.stdout.take(), limit, overflow_tx.clone());
    let mut stderr_task = spawn_capture(child.stderr.take(), limit, overflow_tx);

    let mut leader_exit = wait_for_exit(pgid);
    let deadline = tokio::time::sleep_until(deadline_at);
    tokio::pin!(deadline);

    let mut sampler = tokio::time::interval(watch.sample_interval);
    sampler.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut last_sample = 0;
    let mut escaped = HashSet::new();
    let mut exit_unobservable = false;
    let mut reaped = None;

    let terminal = loop {
        tokio::select! {
            biased;

            observed = &mut leader_exit, if !exit_unobservable => match observed {
                Ok(true) => break Terminal::Exited,
                _ => exit_unobservable = true,
            },
            status = child.wait(), if exit_unobservable => {
                reaped = Some(status);
                break Terminal::Exited;
            }
            _ = &mut deadline => break Terminal::Breach(ExecutionFailure::TimeExceeded),
            Some(()) = overflow_rx.recv() => break Terminal::Breach(ExecutionFailure::OutputTooLarge),
            _ = sampler.tick() => {
                let reading = inspect(pgid, watch.memory_limit_bytes.is_some()).await;
                escaped.extend(reading.escaped);
                if let Some(bytes) = reading.resident_bytes {
                    if watch.memory_limit_bytes.is_some_and(|max| bytes > max) {
                        debug!(pgid, bytes, "memory ceiling breached");
                        break Terminal::Breach(ExecutionFailure::MemoryExceeded);
                    }
                    last_sample = bytes;
                }
            }
        }
    };
    let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;

    // The leader is not reaped yet, so its pid still names this group.
    // Leftover descendants would keep the pipes open, so everything goes
    // down whichever way the wait ended.
    kill_group(pgid);
    for escapee in &escaped {
        kill_escapee(*escapee);
    }
    let status = match reaped {
        Some(status) => status,
        None => child.wait().await,
    };

    if let Terminal::Breach(failure) = terminal {
        if let Err(e) = &status {
            warn!(pgid, error = %e, "failed to reap killed process");
        }
        stdout_task.abort();
        stderr_task.abort();
        debug!(%failure, elapsed_ms, "process killed");
        return Err(failure);
    }

    // A descendant that escaped between samples can still hold the pipes.
    let joined = tokio::time::timeout_at(deadline_at, async {
        (
            join_capture(&mut stdout_task).await,
            join_capture(&mut stderr_task).await,
        )
    })
    .await;
    let Ok((stdout, stderr)) = joined else {
        stdout_task.abort();
        stderr_task.abort();
        debug!(pgid, elapsed_ms, "output pipes held open past the deadline");
        return Err(ExecutionFailure::TimeExceeded);
    };

    debug!(?status, elapsed_ms, memory = last_sample, "process exited");

    if stdout.overflowed || stderr.overflowed {
        return Err(ExecutionFailure::OutputTooLarge);
    }
    let status = status.map_err(|e| ExecutionFailure::RuntimeError {
        diagnostic: format!("failed to wait for {}: {e}", command.program),
    })?;

    let diagnostic = String::from_utf8_lossy(&stderr.bytes).into_owned();
    if !status.success() {
        let diagnostic = if diagnostic.trim().is_empty() {
            describe_status(status)
        } else {
            diagnostic
        };
        return Err(ExecutionFailure::RuntimeError { diagnostic });
    }
    if !diagnostic.is_empty() {
        return Err(ExecutionFailure::RuntimeError { diagnostic });
    }

    Ok(ProcessOutput {
        stdout: stdout.bytes,
        elapsed_ms,
        memory_bytes: last_sample,
    })
}

/// Resolve once the leader has exited, leaving it unreaped.
///
/// Yields `false` when the exit could not be observed this way.
fn wait_for_exit(pid: i32) -> JoinHandle<bool> {
    tokio::task::spawn_blocking(move || {
        loop {
            match waitid(
                Id::Pid(Pid::from_raw(pid)),
                WaitPidFlag::WEXITED | WaitPidFlag::WNOWAIT,
            ) {
                Err(Errno::EINTR) => continue,
                Ok(_) => return true,
                Err(e) => {
                    debug!(pid, error = %e, "waitid failed");
                    return false;
                }
            }
        }
    })
}

/// Read the group's memory and look for escaped descendants, off the async
/// runtime
async fn inspect(pgid: i32, measure: bool) -> Reading {
    let reading = tokio::task::spawn_blocking(move || {
        let escaped = escaped_descendants(pgid, pgid).unwrap_or_else(|e| {
            debug!(pgid, error = %e, "process table scan failed");
            Vec::new()
        });
        let resident_bytes = if measure {
            match group_resident_bytes(pgid) {
                Ok(bytes) => Some(
                    bytes
                        + escaped
                            .iter()
                            .map(|e| process_resident_bytes(e.pid))
                            .sum::<u64>(),
                ),
                Err(e) => {
                    debug!(pgid, error = %e, "memory sample failed");
                    None
                }
            }
        } else {
            None
        };
        Reading {
            resident_bytes,
            escaped,
        }
    })
    .await;
    reading.unwrap_or_default()
}

fn spawn_capture<R>(
    reader: Option<R>,
    limit: usize,
    overflow: mpsc::Sender<()>,
) -> JoinHandle<Captured>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        match reader {
            Some(reader) => capture(reader, limit, overflow).await,
            None => Captured::default(),
        }
    })
}

/// Read a pipe until EOF or until more than `limit` bytes arrive
async fn capture<R>(mut reader: R, limit: usize, overflow: mpsc::Sender<()>) -> Captured
where
    R: AsyncRead + Unpin,
{
    let mut captured = Captured::default();
    let mut chunk = [0u8; 8192];
    loop {
        let n = match reader.read(&mut chunk).await {
            Ok(0) | Err(_) => break,
            Ok(n) => n,
        };
        if captured.bytes.len() + n > limit {
            let room = limit - captured.bytes.len();
            captured.bytes.extend_from_slice(&chunk[..room]);
            captured.overflowed = true;
            let _ = overflow.send(()).await;
            break;
        }
        captured.bytes.extend_from_slice(&chunk[..n]);
    }
    captured
}

async fn join_capture(task: &mut JoinHandle<Captured>) -> Captured {
    task.await.unwrap_or_default()
}

fn describe_status(status: ExitStatus) -> String {
    match (status.code(), status.signal()) {
        (Some(code), _) => format!("process exited with status {code}"),
        (None, Some(signal)) => format!("process terminated by signal {signal}"),
        (None, None) => "process terminated abnormally".to_owned(),
    }
}
