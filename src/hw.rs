use crate::types::Device;
use serde::{Deserialize, Serialize};
use sysinfo::System;

/// Hardware section of the run descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HwInfo {
    pub device: Device,
    pub num_workers: usize,
    pub logical_cpus: usize,
    pub total_ram_mb: u64,
}

fn cpu_logical() -> usize {
    num_cpus::get().max(1)
}

fn total_ram_mb() -> u64 {
    let mut sys = System::new();
    sys.refresh_memory();
    sys.total_memory() / (1024 * 1024) // bytes -> MB
}

pub fn detect_hw(device: Device, num_workers: usize) -> HwInfo {
    HwInfo {
        device,
        num_workers,
        logical_cpus: cpu_logical(),
        total_ram_mb: total_ram_mb(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_hw_reports_inputs() {
        let hw = detect_hw(Device::Cpu, 3);
        assert_eq!(hw.device, Device::Cpu);
        assert_eq!(hw.num_workers, 3);
        assert!(hw.logical_cpus >= 1);
    }
}
