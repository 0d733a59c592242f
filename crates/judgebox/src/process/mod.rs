//! Process supervision
//!
//! Spawns one command as its own process group and races its exit against a
//! wall-clock deadline, a resident-memory sampler and an output cap. Whatever
//! resolves first decides the classification and the whole group is killed,
//! along with any descendant seen moving itself into another group.

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use nix::errno::Errno;
use nix::sys::signal::{Signal, kill, killpg};
use nix::unistd::Pid;
use tracing::debug;

pub(crate) use crate::process::procfs::Escapee;
pub use crate::process::procfs::{group_members, group_resident_bytes};
pub use crate::process::supervisor::run;

mod procfs;
mod supervisor;

/// A fully expanded command, ready to spawn
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    /// Program name or path
    pub program: String,

    /// Arguments after the program
    pub args: Vec<String>,

    /// File to connect to standard input (null when absent)
    pub stdin: Option<PathBuf>,

    /// Extra environment variables
    pub env: HashMap<String, String>,
}

impl CommandSpec {
    /// Build a command from an argv vector. Returns `None` when empty.
    pub fn from_argv(argv: Vec<String>) -> Option<Self> {
        let mut argv = argv.into_iter();
        let program = argv.next()?;
        Some(Self {
            program,
            args: argv.collect(),
            stdin: None,
            env: HashMap::new(),
        })
    }

    pub fn stdin(mut self, path: impl Into<PathBuf>) -> Self {
        self.stdin = Some(path.into());
        self
    }

    pub fn envs(mut self, env: &HashMap<String, String>) -> Self {
        self.env
            .extend(env.iter().map(|(k, v)| (k.clone(), v.clone())));
        self
    }
}

/// Limits watched while a command runs
#[derive(Debug, Clone, Copy)]
pub struct Watch {
    /// Wall clock deadline measured from spawn
    pub deadline: Duration,

    /// Resident memory ceiling for the process group; `None` disables the sampler
    pub memory_limit_bytes: Option<u64>,

    /// Cap applied to stdout and stderr independently
    pub output_limit_bytes: u64,

    /// How often the memory sampler polls
    pub sample_interval: Duration,
}

/// Output of a command that exited cleanly within its limits
#[derive(Debug, Clone)]
pub struct ProcessOutput {
    pub stdout: Vec<u8>,

    /// Wall clock time from spawn to exit, in milliseconds
    pub elapsed_ms: f64,

    /// Last resident memory sample of the group, in bytes
    pub memory_bytes: u64,
}

/// Send SIGKILL to every process in the group.
///
/// A group that no longer exists is not an error.
pub fn kill_group(pgid: i32) {
    match killpg(Pid::from_raw(pgid), Signal::SIGKILL) {
        Ok(()) => debug!(pgid, "killed process group"),
        Err(Errno::ESRCH) => {}
        Err(e) => debug!(pgid, error = %e, "failed to kill process group"),
    }
}

/// Send SIGKILL to a process that left the group, if its pid still names it
pub(crate) fn kill_escapee(escapee: Escapee) {
    let same_process = procfs::process_stat(escapee.pid)
        .is_some_and(|stat| stat.is_live() && stat.start_time == escapee.start_time);
    if !same_process {
        return;
    }
    match kill(Pid::from_raw(escapee.pid), Signal::SIGKILL) {
        Ok(()) => debug!(pid = escapee.pid, "killed escaped process"),
        Err(Errno::ESRCH) => {}
        Err(e) => debug!(pid = escapee.pid, error = %e, "failed to kill escaped process"),
    }
}

/// Check the process table for live members of the group.
///
/// Zombies are not counted: they are already dead and only wait for their
/// new parent to reap them.
pub fn group_alive(pgid: i32) -> bool {
    if matches!(killpg(Pid::from_raw(pgid), None), Err(Errno::ESRCH)) {
        return false;
    }
    group_members(pgid).map_or(true, |members| !members.is_empty())
}
