//! Point-in-time process, system and runtime health.

pub mod loop_delay;

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, TimeZone, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use sysinfo::{CpuExt, Pid, PidExt, ProcessExt, System, SystemExt};

use crate::metrics::percentiles::DelayStats;
use loop_delay::LoopDelayMonitor;

/// Complete snapshot served as the structured representation.
#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    pub process: ProcessInfo,
    pub system: SystemInfo,
    pub cpu: Vec<CpuSample>,
    /// Mean runtime scheduling delay in milliseconds.
    #[serde(rename = "loop")]
    pub loop_delay: f64,
    /// Open file descriptors.
    pub handles: u64,
    /// Requests currently in flight.
    pub requests: u64,

    #[serde(skip)]
    pub loop_stats: DelayStats,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProcessInfo {
    pub pid: u32,
    pub uptime: f64,
    pub started_at: DateTime<Utc>,
    pub memory: ProcessMemory,
    pub versions: BTreeMap<&'static str, String>,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct ProcessMemory {
    pub rss: u64,
    #[serde(rename = "virtual")]
    pub virtual_bytes: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct SystemInfo {
    pub load: LoadAverage,
    pub free_memory: u64,
    pub available_memory: u64,
    pub total_memory: u64,
    pub uptime: u64,
    pub hostname: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct LoadAverage {
    pub one: f64,
    pub five: f64,
    pub fifteen: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct CpuSample {
    pub name: String,
    /// Percent busy since the previous sample.
    pub usage: f32,
    /// MHz
    pub frequency: u64,
}

/// Produces `MetricsSnapshot`s and tracks in-flight requests.
///
/// Shared by every request; `sample` takes a short lock on the underlying
/// `sysinfo::System`, the request counter is a plain atomic.
pub struct ProcessSampler {
    system: Mutex<System>,
    pid: Option<Pid>,
    created: Instant,
    created_at: DateTime<Utc>,
    in_flight: AtomicU64,
    loop_delay: LoopDelayMonitor,
}

impl ProcessSampler {
    pub fn new() -> Self {
        let mut system = System::new();
        system.refresh_cpu();

        Self {
            system: Mutex::new(system),
            pid: sysinfo::get_current_pid().ok(),
            created: Instant::now(),
            created_at: Utc::now(),
            in_flight: AtomicU64::new(0),
            loop_delay: LoopDelayMonitor::start(),
        }
    }

    pub fn sample(&self) -> MetricsSnapshot {
        let mut system = self.system.lock();
        system.refresh_cpu();
        system.refresh_memory();

        let process = self.process_info(&mut system);
        let load = system.load_average();
        let system_info = SystemInfo {
            load: LoadAverage {
                one: load.one,
                five: load.five,
                fifteen: load.fifteen,
            },
            free_memory: system.free_memory(),
            available_memory: system.available_memory(),
            total_memory: system.total_memory(),
            uptime: system.uptime(),
            hostname: system.host_name(),
        };
        let cpu = system
            .cpus()
            .iter()
            .map(|c| CpuSample {
                name: c.name().to_string(),
                usage: c.cpu_usage(),
                frequency: c.frequency(),
            })
            .collect();
        drop(system);

        let loop_stats = self.loop_delay.take_stats();
        MetricsSnapshot {
            process,
            system: system_info,
            cpu,
            loop_delay: loop_stats.mean_ms,
            handles: open_handles(),
            requests: self.in_flight(),
            loop_stats,
        }
    }

    /// Counts one request as in flight until the guard is dropped.
    pub fn track_request(self: &Arc<Self>) -> InFlightGuard {
        self.in_flight.fetch_add(1, Ordering::Relaxed);
        InFlightGuard {
            sampler: Arc::clone(self),
        }
    }

    pub fn in_flight(&self) -> u64 {
        self.in_flight.load(Ordering::Relaxed)
    }

    fn process_info(&self, system: &mut System) -> ProcessInfo {
        let fallback_uptime = self.created.elapsed().as_secs_f64();
        let own = match self.pid {
            Some(pid) => {
                system.refresh_process(pid);
                system.process(pid)
            }
            None => None,
        };

        let (memory, uptime, started_at) = match own {
            Some(p) => (
                ProcessMemory {
                    rss: p.memory(),
                    virtual_bytes: p.virtual_memory(),
                },
                p.run_time() as f64,
                Utc.timestamp_opt(p.start_time() as i64, 0)
                    .single()
                    .unwrap_or(self.created_at),
            ),
            None => (
                ProcessMemory {
                    rss: 0,
                    virtual_bytes: 0,
                },
                fallback_uptime,
                self.created_at,
            ),
        };

        ProcessInfo {
            pid: self.pid.map(|p| p.as_u32()).unwrap_or_else(std::process::id),
            uptime,
            started_at,
            memory,
            versions: versions(),
        }
    }
}

impl Default for ProcessSampler {
    fn default() -> Self {
        Self::new()
    }
}

/// Decrements the in-flight count on drop, including when the request
/// future is cancelled.
pub struct InFlightGuard {
    sampler: Arc<ProcessSampler>,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.sampler.in_flight.fetch_sub(1, Ordering::Relaxed);
    }
}

fn versions() -> BTreeMap<&'static str, String> {
    BTreeMap::from([
        ("metri", env!("CARGO_PKG_VERSION").to_string()),
        ("os", std::env::consts::OS.to_string()),
        ("arch", std::env::consts::ARCH.to_string()),
    ])
}

#[cfg(target_os = "linux")]
fn open_handles() -> u64 {
    std::fs::read_dir("/proc/self/fd")
        .map(|dir| dir.count() as u64)
        .unwrap_or(0)
}

#[cfg(not(target_os = "linux"))]
fn open_handles() -> u64 {
    0
}
