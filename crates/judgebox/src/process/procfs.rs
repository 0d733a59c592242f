//! Process table readings from procfs
//!
//! Readings come from the kernel's accounting for the child processes
//! (`/proc/<pid>/stat` and `/proc/<pid>/status`), never from this process.

use std::collections::{HashMap, HashSet};
use std::fs;
use std::io;

/// Fields of `/proc/<pid>/stat` used for supervision
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct ProcStat {
    pub state: char,
    pub ppid: i32,
    pub pgrp: i32,

    /// Clock ticks after boot; tells a reused pid apart from the original
    pub start_time: u64,
}

impl ProcStat {
    pub fn is_live(&self) -> bool {
        !matches!(self.state, 'Z' | 'X')
    }
}

/// A descendant that moved itself out of the supervised process group
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct Escapee {
    pub pid: i32,
    pub start_time: u64,
}

/// Sum of `VmRSS` over every process whose process group is `pgid`, in bytes.
///
/// Processes that exit while being scanned are skipped.
pub fn group_resident_bytes(pgid: i32) -> io::Result<u64> {
    Ok(group_members(pgid)?
        .into_iter()
        .map(process_resident_bytes)
        .sum())
}

/// `VmRSS` of a single process in bytes, zero once it is gone
pub fn process_resident_bytes(pid: i32) -> u64 {
    fs::read_to_string(format!("/proc/{pid}/status"))
        .ok()
        .and_then(|status| parse_vm_rss_kb(&status))
        .map_or(0, |kb| kb * 1024)
}

/// Pids of the live (not zombie) processes in group `pgid`
pub fn group_members(pgid: i32) -> io::Result<Vec<i32>> {
    Ok(scan()?
        .into_iter()
        .filter(|(_, stat)| stat.pgrp == pgid && stat.is_live())
        .map(|(pid, _)| pid)
        .collect())
}

/// Live descendants of `root` that are no longer in group `pgid`.
///
/// Lineage follows parent pids, so a process whose parent already exited has
/// been reparented away and is not found.
pub(crate) fn escaped_descendants(root: i32, pgid: i32) -> io::Result<Vec<Escapee>> {
    let table = scan()?;
    let mut children: HashMap<i32, Vec<usize>> = HashMap::new();
    for (index, (_, stat)) in table.iter().enumerate() {
        children.entry(stat.ppid).or_default().push(index);
    }

    let mut escaped = Vec::new();
    let mut seen = HashSet::new();
    let mut pending = vec![root];
    while let Some(parent) = pending.pop() {
        for &index in children.get(&parent).into_iter().flatten() {
            let (pid, stat) = table[index];
            if !seen.insert(pid) {
                continue;
            }
            pending.push(pid);
            if stat.pgrp != pgid && stat.is_live() {
                escaped.push(Escapee {
                    pid,
                    start_time: stat.start_time,
                });
            }
        }
    }
    Ok(escaped)
}

/// Current stat fields of one process, `None` once it is gone
pub(crate) fn process_stat(pid: i32) -> Option<ProcStat> {
    let stat = fs::read_to_string(format!("/proc/{pid}/stat")).ok()?;
    parse_stat(&stat)
}

/// Every readable entry of the process table
fn scan() -> io::Result<Vec<(i32, ProcStat)>> {
    let mut table = Vec::new();
    for entry in fs::read_dir("/proc")? {
        let Ok(entry) = entry else { continue };
        let Some(pid) = entry
            .file_name()
            .to_str()
            .and_then(|name| name.parse::<i32>().ok())
        else {
            continue;
        };
        if let Some(stat) = process_stat(pid) {
            table.push((pid, stat));
        }
    }
    Ok(table)
}

/// Parse the contents of `/proc/<pid>/stat`
fn parse_stat(stat: &str) -> Option<ProcStat> {
    // The command name is wrapped in parentheses and may itself contain
    // spaces or parentheses, so fields are counted after the last ')'.
    // Remaining fields: state, ppid, pgrp, ... with starttime 20th.
    let (_, rest) = stat.rsplit_once(')')?;
    let fields: Vec<&str> = rest.split_whitespace().collect();
    Some(ProcStat {
        state: fields.first()?.chars().next()?,
        ppid: fields.get(1)?.parse().ok()?,
        pgrp: fields.get(2)?.parse().ok()?,
        start_time: fields.get(19)?.parse().ok()?,
    })
}

/// Extract `VmRSS` in kilobytes from the contents of `/proc/<pid>/status`
fn parse_vm_rss_kb(status: &str) -> Option<u64> {
    status
        .lines()
        .find_map(|line| line.strip_prefix("VmRSS:"))
        .and_then(|value| value.split_whitespace().next())
        .and_then(|kb| kb.parse().ok())
}
