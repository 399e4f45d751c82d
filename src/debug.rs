//! Debug utilities: per-frame fragment statistics and a stats dump written to
//! a timestamped text file in `./debug-dumps/`.
//!
//! The dump captures what the shading pass did (visible, discarded, water and
//! highlight counts), how long it took, process memory, and which worker
//! threads the parallel renderer ran on.
use bevy::prelude::{info, Resource};
use chrono::{DateTime, Utc};
use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::fmt::Write;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, OnceLock};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use sysinfo::{Pid, PidExt, ProcessExt, System, SystemExt};

use crate::atlas::MaterialId;
use crate::shading::FragmentOutput;

/// Fragment counters for one frame (or a sum of frames).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FragmentCounts {
    pub fragments: u64,
    pub visible: u64,
    pub discarded: u64,
    pub water_visible: u64,
    pub water_discarded: u64,
    pub highlighted: u64,
}

impl FragmentCounts {
    /// Count one shaded fragment.
    ///
    /// # Arguments
    /// * `material` - the fragment's material.
    /// * `output` - what the pipeline produced.
    /// * `highlighted` - whether the fragment was inside the cursor box.
    ///   Only counted for visible fragments.
    pub fn record(&mut self, material: MaterialId, output: FragmentOutput, highlighted: bool) {
        self.fragments += 1;
        let water = material == MaterialId::WATER;
        if output.is_discarded() {
            self.discarded += 1;
            if water {
                self.water_discarded += 1;
            }
        } else {
            self.visible += 1;
            if water {
                self.water_visible += 1;
            }
            if highlighted {
                self.highlighted += 1;
            }
        }
    }

    pub fn merge(&mut self, other: &FragmentCounts) {
        self.fragments += other.fragments;
        self.visible += other.visible;
        self.discarded += other.discarded;
        self.water_visible += other.water_visible;
        self.water_discarded += other.water_discarded;
        self.highlighted += other.highlighted;
    }

    /// Share of water fragments that were dropped, in `[0, 1]`.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn water_discard_ratio(&self) -> f64 {
        let water = self.water_visible + self.water_discarded;
        if water == 0 {
            0.0
        } else {
            self.water_discarded as f64 / water as f64
        }
    }
}

/// Running statistics for the preview renderer.
#[derive(Resource, Clone, Debug, Default)]
pub struct ShadingStats {
    pub frames: u64,
    pub last_frame: FragmentCounts,
    pub total: FragmentCounts,
    pub render_time: Duration,
}

impl ShadingStats {
    pub fn finish_frame(&mut self, counts: FragmentCounts, elapsed: Duration) {
        self.frames += 1;
        self.last_frame = counts;
        self.total.merge(&counts);
        self.render_time += elapsed;
    }

    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn mean_frame_ms(&self) -> f64 {
        if self.frames == 0 {
            0.0
        } else {
            self.render_time.as_secs_f64() * 1000.0 / self.frames as f64
        }
    }
}

// Global, thread-safe collector for instrumenting rayon worker threads
static GLOBAL_THREAD_MAP: OnceLock<Mutex<HashMap<String, HashSet<String>>>> = OnceLock::new();

/// Record the current thread id for `system` from any thread (worker or main).
/// Safe to call from rayon worker tasks.
pub fn record_thread_global(system: &str) {
    let tid = format!("{:?}", std::thread::current().id());
    let map = GLOBAL_THREAD_MAP.get_or_init(|| Mutex::new(HashMap::new()));
    let mut guard = map.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
    guard.entry(system.to_string()).or_default().insert(tid);
}

thread_local! {
    static RECORDED_HERE: RefCell<HashSet<&'static str>> = RefCell::new(HashSet::new());
}

/// Like [`record_thread_global`], but takes the global lock only the first
/// time a given thread reports `system`.
///
/// # Return
/// `true` when this call recorded the thread, `false` when it had already
/// been recorded.
pub fn record_thread_once(system: &'static str) -> bool {
    let first = RECORDED_HERE.with(|seen| seen.borrow_mut().insert(system));
    if first {
        record_thread_global(system);
    }
    first
}

/// Return a snapshot of the global thread map (system -> sorted list of thread ids).
#[must_use]
pub fn snapshot_global_thread_map() -> HashMap<String, Vec<String>> {
    let map = GLOBAL_THREAD_MAP.get_or_init(|| Mutex::new(HashMap::new()));
    let guard = map.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
    guard
        .iter()
        .map(|(k, s)| {
            let mut v: Vec<_> = s.iter().cloned().collect();
            v.sort();
            (k.clone(), v)
        })
        .collect()
}

/// Convert kilobytes to a megabyte string.
#[allow(clippy::cast_precision_loss)]
fn kb_to_mb(kb: u64) -> String {
    format!("{:.2} MB", (kb as f64) / 1024.0)
}

/// Build the text of a stats dump.
///
/// # Arguments
/// * `stats` - accumulated renderer statistics.
/// * `now` - timestamp written into the header.
#[must_use]
pub fn format_stats_dump(stats: &ShadingStats, now: SystemTime) -> String {
    let ts_secs = now.duration_since(UNIX_EPOCH).map_or(0, |d| d.as_secs());
    let dt: DateTime<Utc> = DateTime::from(now);
    let human_ts = dt.format("%Y-%m-%d %H:%M:%S").to_string();

    let cores = std::thread::available_parallelism().map_or(1, std::num::NonZeroUsize::get);

    let mut sys = System::new_all();
    sys.refresh_all();
    let proc = sys.process(Pid::from_u32(std::process::id()));
    let proc_mem_kb = proc.map_or(0, |p| p.memory() / 1024);
    let proc_virt_kb = proc.map_or(0, |p| p.virtual_memory() / 1024);
    let total_mem_kb = sys.total_memory() / 1024;
    let used_mem_kb = sys.used_memory() / 1024;

    let t = &stats.total;
    let mut out = String::new();
    writeln!(out, "Shading stats dump: {ts_secs}").ok();
    writeln!(out, "Timestamp: {human_ts} (epoch secs: {ts_secs})").ok();
    writeln!(out, "Frames: {}, mean render time: {:.3} ms", stats.frames, stats.mean_frame_ms()).ok();
    writeln!(out, "Fragments: total={} visible={} discarded={}", t.fragments, t.visible, t.discarded).ok();
    writeln!(
        out,
        "Water: visible={} discarded={} (discard ratio {:.3})",
        t.water_visible,
        t.water_discarded,
        t.water_discard_ratio()
    )
    .ok();
    writeln!(out, "Highlighted: {}", t.highlighted).ok();
    writeln!(
        out,
        "Last frame: total={} visible={} discarded={}",
        stats.last_frame.fragments, stats.last_frame.visible, stats.last_frame.discarded
    )
    .ok();
    writeln!(out, "CPU cores (available): {cores}").ok();
    writeln!(out, "Process memory: {} (virtual {})", kb_to_mb(proc_mem_kb), kb_to_mb(proc_virt_kb)).ok();
    writeln!(out, "System memory: total={} used={}", kb_to_mb(total_mem_kb), kb_to_mb(used_mem_kb)).ok();

    let global_map = snapshot_global_thread_map();
    writeln!(out, "\nWorker thread map:").ok();
    if global_map.is_empty() {
        writeln!(out, "  (no worker-thread entries recorded)").ok();
    } else {
        let mut systems: Vec<_> = global_map.into_iter().collect();
        systems.sort();
        for (sys, threads) in systems {
            writeln!(out, "  {} -> threads: {}", sys, threads.join(", ")).ok();
        }
    }
    out
}

/// Write a stats dump into `dir`, creating it if needed.
///
/// # Return
/// The path of the written file.
///
/// # Errors
/// Returns an `Err` if the directory cannot be created or the file written.
pub fn write_stats_dump(dir: &Path, stats: &ShadingStats) -> Result<PathBuf, Box<dyn std::error::Error>> {
    let now = SystemTime::now();
    let ts_secs = now.duration_since(UNIX_EPOCH)?.as_secs();
    fs::create_dir_all(dir)?;
    let fname = dir.join(format!("shading-{ts_secs}.txt"));
    fs::write(&fname, format_stats_dump(stats, now))?;
    info!("wrote stats dump: {}", fname.display());
    Ok(fname)
}
