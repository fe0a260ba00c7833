//! CPU, memory and temperature from procfs/sysfs.

use std::fs;
use std::path::PathBuf;
use std::sync::{Mutex, PoisonError};

use crate::error::RefreshError;
use crate::scheduler::Producer;
use crate::status::{ResourceMetrics, StatusPayload};

/// Aggregate jiffies from the `cpu` line of `/proc/stat`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CpuSample {
    pub idle: u64,
    pub total: u64,
}

impl CpuSample {
    /// Busy percentage between `prev` and `self`; `None` if no time passed.
    pub fn usage_since(&self, prev: &CpuSample) -> Option<f32> {
        let total = self.total.checked_sub(prev.total)?;
        let idle = self.idle.checked_sub(prev.idle)?;
        if total == 0 {
            return None;
        }
        Some((total.saturating_sub(idle)) as f32 * 100.0 / total as f32)
    }
}

pub fn parse_cpu_line(stat: &str) -> Option<CpuSample> {
    let line = stat.lines().find(|l| l.starts_with("cpu "))?;
    let fields: Vec<u64> = line
        .split_whitespace()
        .skip(1)
        .filter_map(|f| f.parse().ok())
        .collect();
    if fields.len() < 4 {
        return None;
    }
    // idle + iowait
    let idle = fields[3] + fields.get(4).copied().unwrap_or(0);
    // guest and guest_nice (fields 9 and 10) are already inside user and nice.
    Some(CpuSample {
        idle,
        total: fields.iter().take(8).sum(),
    })
}

/// `(total, available)` in KiB.
pub fn parse_meminfo(meminfo: &str) -> Option<(u64, u64)> {
    let field = |name: &str| {
        meminfo
            .lines()
            .find_map(|l| l.strip_prefix(name))
            .and_then(|rest| rest.trim_start_matches(':').split_whitespace().next())
            .and_then(|v| v.parse::<u64>().ok())
    };
    Some((field("MemTotal")?, field("MemAvailable")?))
}

/// Millidegrees Celsius to degrees.
pub fn parse_temperature(raw: &str) -> Option<f32> {
    raw.trim().parse::<i64>().ok().map(|m| m as f32 / 1000.0)
}

#[derive(Debug)]
pub struct ResourceProducer {
    proc_root: PathBuf,
    thermal_path: PathBuf,
    last_cpu: Mutex<Option<CpuSample>>,
}

impl Default for ResourceProducer {
    fn default() -> Self {
        Self::new("/proc", "/sys/class/thermal/thermal_zone0/temp")
    }
}

impl ResourceProducer {
    pub fn new(proc_root: impl Into<PathBuf>, thermal_path: impl Into<PathBuf>) -> Self {
        Self {
            proc_root: proc_root.into(),
            thermal_path: thermal_path.into(),
            last_cpu: Mutex::new(None),
        }
    }

    fn cpu_percent(&self) -> Result<Option<f32>, RefreshError> {
        let stat = fs::read_to_string(self.proc_root.join("stat"))?;
        let sample = parse_cpu_line(&stat)
            .ok_or_else(|| RefreshError::Parse("no cpu line in /proc/stat".into()))?;
        let mut last = self.last_cpu.lock().unwrap_or_else(PoisonError::into_inner);
        // First sample: average since boot.
        let base = last.unwrap_or(CpuSample { idle: 0, total: 0 });
        *last = Some(sample);
        Ok(sample.usage_since(&base))
    }
}

impl Producer for ResourceProducer {
    fn produce(&self) -> Result<StatusPayload, RefreshError> {
        let cpu_percent = self.cpu_percent()?;
        let meminfo = fs::read_to_string(self.proc_root.join("meminfo"))?;
        let (total_kib, avail_kib) = parse_meminfo(&meminfo)
            .ok_or_else(|| RefreshError::Parse("MemTotal/MemAvailable missing".into()))?;
        let temperature = fs::read_to_string(&self.thermal_path)
            .ok()
            .and_then(|raw| parse_temperature(&raw));
        Ok(StatusPayload::Resources(ResourceMetrics {
            cpu_percent,
            mem_used_mib: total_kib.saturating_sub(avail_kib) / 1024,
            mem_total_mib: total_kib / 1024,
            temperature,
        }))
    }
}
