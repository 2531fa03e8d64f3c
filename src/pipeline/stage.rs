//! Stage thread spawning and scheduling hints

use log::debug;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread::JoinHandle;

/// Best-effort placement hint for a stage thread.
///
/// Capture and encode sit on the latency-critical path and get the stronger
/// hint; transmit is elevated but may share. Hints are advisory: on small
/// machines, or when the OS refuses, stages run unpinned and the pipeline is
/// still correct.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulingHint {
    /// Latency-critical path (capture, encode)
    TimeCritical,
    /// Important but off the critical path (transmit)
    Elevated,
    /// No placement preference
    Normal,
}

/// Spawn a named stage thread, applying the scheduling hint from inside the
/// thread before the stage body runs.
pub fn spawn_stage<F>(name: &str, hint: SchedulingHint, body: F) -> std::io::Result<JoinHandle<()>>
where
    F: FnOnce() + Send + 'static,
{
    let thread_name = name.to_owned();
    std::thread::Builder::new().name(thread_name.clone()).spawn(move || {
        apply_hint(&thread_name, hint);
        body();
    })
}

/// Pin hinted stages to their own cores when the machine is large enough.
///
/// Raising real OS priority classes needs privileges on Linux, so the hint
/// degrades to core pinning, and to nothing on hosts with too few cores to
/// spare one per stage.
fn apply_hint(name: &str, hint: SchedulingHint) {
    if hint == SchedulingHint::Normal {
        return;
    }

    let Some(cores) = core_affinity::get_core_ids() else {
        return;
    };
    // Keep at least one core free for everything that is not the pipeline.
    if cores.len() < 4 {
        debug!("stage {}: {} cores, skipping pinning", name, cores.len());
        return;
    }

    static NEXT_CORE: AtomicUsize = AtomicUsize::new(0);
    let slot = NEXT_CORE.fetch_add(1, Ordering::Relaxed) % (cores.len() - 1);
    let core = cores[slot];

    if core_affinity::set_for_current(core) {
        debug!("stage {}: pinned to core {:?} ({:?})", name, core, hint);
    } else {
        debug!("stage {}: pinning to {:?} refused", name, core);
    }
}
