//! CPU pinning for benchmark child processes.
//!
//! Migration between cores adds cache and frequency noise to every sample, so
//! each child is pinned to one core before it execs, the same effect as
//! wrapping it in `taskset -c <core>`. Pinning is only a hint: if it is not
//! possible the benchmark still runs, just noisier.

use std::process::Command;
use tracing::warn;

/// Returns `requested` if this process may run on that core, `None` otherwise.
pub fn usable_core(requested: Option<usize>) -> Option<usize> {
    let core = requested?;
    if !core_allowed(core) {
        warn!("CPU core {} is not in the allowed CPU set, running unpinned", core);
        return None;
    }
    Some(core)
}

/// Checks `core` against the current affinity mask, which honours cgroup and
/// `taskset` restrictions and sparse core ids.
#[cfg(target_os = "linux")]
fn core_allowed(core: usize) -> bool {
    if core >= libc::CPU_SETSIZE as usize {
        return false;
    }
    // SAFETY: cpu_set_t is plain data and the kernel writes at most its size.
    unsafe {
        let mut mask: libc::cpu_set_t = std::mem::zeroed();
        if libc::sched_getaffinity(0, std::mem::size_of::<libc::cpu_set_t>(), &mut mask) != 0 {
            warn!("sched_getaffinity failed: {}", std::io::Error::last_os_error());
            return false;
        }
        libc::CPU_ISSET(core, &mask)
    }
}

#[cfg(not(target_os = "linux"))]
fn core_allowed(core: usize) -> bool {
    let available = std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1);
    core < available
}

/// Makes the child spawned by `cmd` run on `core` only.
///
/// `core` must come from [`usable_core`].
#[cfg(target_os = "linux")]
pub fn pin_command(cmd: &mut Command, core: usize) {
    use std::os::unix::process::CommandExt;

    // SAFETY: the hook runs between fork and exec and only touches a stack-local
    // cpu_set_t and one syscall, both async-signal-safe.
    unsafe {
        cmd.pre_exec(move || {
            let mut cpu_set: libc::cpu_set_t = std::mem::zeroed();
            libc::CPU_ZERO(&mut cpu_set);
            libc::CPU_SET(core, &mut cpu_set);

            // A failure leaves the child unpinned
            libc::sched_setaffinity(0, std::mem::size_of::<libc::cpu_set_t>(), &cpu_set);
            Ok(())
        });
    }
}

#[cfg(not(target_os = "linux"))]
pub fn pin_command(_cmd: &mut Command, _core: usize) {
    tracing::debug!("CPU pinning is not supported on this platform");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(target_os = "linux")]
    #[test]
    fn current_cpu_is_usable() {
        // SAFETY: no arguments, returns the CPU this thread last ran on.
        let current = unsafe { libc::sched_getcpu() };
        assert!(current >= 0);
        let current = current as usize;
        assert_eq!(usable_core(Some(current)), Some(current));
    }

    #[test]
    fn no_request_means_no_pinning() {
        assert_eq!(usable_core(None), None);
    }

    #[test]
    fn nonexistent_core_is_dropped() {
        assert_eq!(usable_core(Some(1 << 20)), None);
    }
}
