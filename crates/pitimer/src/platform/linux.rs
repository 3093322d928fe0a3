//! Linux implementation: `nanosleep(2)` and SCHED_FIFO / `mlockall` setup.

#![expect(
    unsafe_code,
    reason = "nanosleep, sched_setscheduler and mlockall are libc FFI calls"
)]

use super::SleepOutcome;
use crate::rt_setup::{RtSetup, RtSetupOutcome};
use libc::{
    EINTR, MCL_CURRENT, MCL_FUTURE, SCHED_FIFO, c_long, mlockall, nanosleep, sched_param,
    sched_setscheduler, time_t, timespec,
};
use std::io;
use std::time::Duration;

fn to_timespec(duration: Duration) -> timespec {
    timespec {
        tv_sec: time_t::try_from(duration.as_secs()).unwrap_or(time_t::MAX),
        tv_nsec: c_long::try_from(duration.subsec_nanos()).unwrap_or(0),
    }
}

fn from_timespec(ts: &timespec) -> Duration {
    let secs = u64::try_from(ts.tv_sec).unwrap_or(0);
    let nanos = u64::try_from(ts.tv_nsec).unwrap_or(0);
    Duration::from_secs(secs).saturating_add(Duration::from_nanos(nanos))
}

/// One `nanosleep` call. An interrupted sleep reports what was left and is not resumed.
pub(crate) fn coarse_sleep(duration: Duration) -> SleepOutcome {
    let request = to_timespec(duration);
    let mut remaining = timespec {
        tv_sec: 0,
        tv_nsec: 0,
    };

    // SAFETY: both pointers reference stack values that outlive the call.
    let rc = unsafe { nanosleep(&request, &mut remaining) };
    if rc == 0 {
        return SleepOutcome::Completed;
    }

    match io::Error::last_os_error().raw_os_error() {
        Some(EINTR) => SleepOutcome::Interrupted {
            remaining: from_timespec(&remaining),
        },
        Some(code) => SleepOutcome::Failed(code),
        None => SleepOutcome::Failed(0),
    }
}

/// Apply real-time settings to the calling thread.
///
/// Both calls may fail without `CAP_SYS_NICE` / `CAP_IPC_LOCK`; the outcome
/// reports what actually took effect.
pub(crate) fn apply_rt_setup(setup: &RtSetup) -> RtSetupOutcome {
    let mut outcome = RtSetupOutcome::default();

    if setup.high_priority {
        let param = sched_param {
            sched_priority: setup.priority,
        };
        // SAFETY: `param` outlives the call; pid 0 targets the calling thread.
        let rc = unsafe { sched_setscheduler(0, SCHED_FIFO, &param) };
        outcome.priority_applied = rc == 0;
    }

    if setup.lock_memory {
        // SAFETY: mlockall only reads its flag argument.
        let rc = unsafe { mlockall(MCL_CURRENT | MCL_FUTURE) };
        outcome.memory_locked = rc == 0;
    }

    outcome
}
