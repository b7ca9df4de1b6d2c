//! RAM counters per platform.

use std::process::Command;

use sysinfo::System;
use tracing::{debug, warn};

/// Assumed total RAM when no counter reports one.
pub const FALLBACK_TOTAL_RAM: u64 = 8 * 1024 * 1024 * 1024;

/// Total RAM and, when it could be measured, available RAM (bytes).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryReading {
    pub total: u64,
    pub available: Option<u64>,
}

/// Read memory counters, preferring the platform's native source and falling
/// back to `sysinfo`. `None` when neither reports a total.
pub fn read_memory() -> Option<MemoryReading> {
    if let Some(reading) = native_memory() {
        return Some(reading);
    }

    debug!("Native memory counters unavailable, falling back to sysinfo");
    let mut sys = System::new();
    sys.refresh_memory();
    let reading = from_counters(sys.total_memory(), sys.available_memory());
    if reading.is_none() {
        warn!("No memory counters available");
    }
    reading
}

/// Raw total/available counters, where zero means "not reported".
pub fn from_counters(total: u64, available: u64) -> Option<MemoryReading> {
    if total == 0 {
        return None;
    }
    let available = Some(available).filter(|&n| n > 0);
    Some(MemoryReading { total, available })
}

#[cfg(target_os = "linux")]
fn native_memory() -> Option<MemoryReading> {
    let text = std::fs::read_to_string("/proc/meminfo").ok()?;
    parse_meminfo(&text)
}

#[cfg(target_os = "macos")]
fn native_memory() -> Option<MemoryReading> {
    let total = sysctl("hw.memsize")?.parse().ok()?;
    let available = Command::new("vm_stat")
        .output()
        .ok()
        .filter(|o| o.status.success())
        .and_then(|o| parse_vm_stat(&String::from_utf8_lossy(&o.stdout)));
    Some(MemoryReading { total, available })
}

#[cfg(not(any(target_os = "linux", target_os = "macos")))]
fn native_memory() -> Option<MemoryReading> {
    None
}

/// `sysctl -n <name>`, trimmed.
#[cfg_attr(not(target_os = "macos"), allow(dead_code))]
pub fn sysctl(name: &str) -> Option<String> {
    let output = Command::new("sysctl").args(["-n", name]).output().ok()?;
    if !output.status.success() {
        return None;
    }
    Some(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

/// Parse `/proc/meminfo`. Available memory comes from `MemAvailable`, or from
/// `MemFree + Buffers + Cached` on kernels that lack it.
#[cfg_attr(not(target_os = "linux"), allow(dead_code))]
pub fn parse_meminfo(text: &str) -> Option<MemoryReading> {
    let field = |name: &str| -> Option<u64> {
        text.lines().find_map(|line| {
            let rest = line.strip_prefix(name)?.strip_prefix(':')?;
            let kib: u64 = rest.split_whitespace().next()?.parse().ok()?;
            Some(kib * 1024)
        })
    };

    let total = field("MemTotal").filter(|&n| n > 0)?;
    let available = field("MemAvailable").or_else(|| {
        let parts = [field("MemFree"), field("Buffers"), field("Cached")];
        if parts.iter().all(Option::is_none) {
            return None;
        }
        Some(parts.iter().flatten().sum())
    });

    Some(MemoryReading { total, available })
}

/// Parse `vm_stat` output into free + inactive bytes.
#[cfg_attr(not(target_os = "macos"), allow(dead_code))]
pub fn parse_vm_stat(text: &str) -> Option<u64> {
    let page_size = text
        .lines()
        .next()
        .and_then(|header| header.split("page size of ").nth(1))
        .and_then(|rest| rest.split_whitespace().next())
        .and_then(|n| n.parse::<u64>().ok())
        .unwrap_or(4096);

    let pages = |name: &str| -> Option<u64> {
        text.lines().find_map(|line| {
            let rest = line.strip_prefix(name)?.strip_prefix(':')?;
            rest.trim().trim_end_matches('.').parse().ok()
        })
    };

    let free = pages("Pages free")?;
    let inactive = pages("Pages inactive").unwrap_or(0);
    Some((free + inactive) * page_size)
}
