//! Child process configuration shared by everything that spawns musicians

use tokio::process::Command;

/// Configure a musician command so the child never outlives its parent.
///
/// The child is killed when its handle is dropped. On Linux it also gets a
/// parent-death signal, so an aborted conductor cannot leave workers behind.
///
/// The parent-death signal fires when the spawning *thread* exits. Spawn from
/// a thread that lives as long as the run (the `block_on` thread), never from
/// `spawn_blocking` or a short-lived worker thread.
pub fn configure_musician_command(cmd: &mut Command) {
    cmd.kill_on_drop(true);
    configure_platform_specific(cmd);
}

#[cfg(target_os = "linux")]
fn configure_platform_specific(cmd: &mut Command) {
    // SAFETY: prctl is async-signal-safe and touches no shared state.
    unsafe {
        cmd.pre_exec(|| {
            if libc::prctl(libc::PR_SET_PDEATHSIG, libc::SIGKILL) != 0 {
                return Err(std::io::Error::last_os_error());
            }
            Ok(())
        });
    }
}

#[cfg(not(target_os = "linux"))]
fn configure_platform_specific(_cmd: &mut Command) {}
