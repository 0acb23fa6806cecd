//! Process-group handling, so a timeout also reaches whatever a wrapper script forked.

use std::process::{Child, Command};

/// Starts the child as the leader of a new process group.
#[cfg(unix)]
pub(crate) fn isolate(cmd: &mut Command) {
    use std::os::unix::process::CommandExt;
    cmd.process_group(0);
}

#[cfg(not(unix))]
pub(crate) fn isolate(_cmd: &mut Command) {}

/// Kills the child's whole process group, then the child itself.
#[cfg(unix)]
pub(crate) fn kill_group(child: &mut Child) {
    if let Ok(pgid) = libc::pid_t::try_from(child.id()) {
        // SAFETY: kill(2) with a negative pid only sends a signal; the group was created by `isolate`.
        unsafe {
            libc::kill(-pgid, libc::SIGKILL);
        }
    }
    let _ = child.kill();
}

#[cfg(not(unix))]
pub(crate) fn kill_group(child: &mut Child) {
    let _ = child.kill();
}
