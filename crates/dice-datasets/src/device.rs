//! Explicit compute placement.
//!
//! All tensors live in host memory. What varies is how much parallelism bulk
//! work may use, so a `Device` is passed to the dataset assembler and to the
//! trainer, and each builds its own scoped thread pool from it.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{DatasetError, DatasetResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Device {
    /// Single worker thread.
    #[default]
    Cpu,
    /// Worker pool with the given number of threads (0 picks one per core).
    CpuParallel { threads: usize },
}

impl Device {
    /// Builds a dedicated rayon pool for this device.
    pub fn thread_pool(&self) -> DatasetResult<rayon::ThreadPool> {
        let threads = match self {
            Device::Cpu => 1,
            Device::CpuParallel { threads } => *threads,
        };
        rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|i| format!("dice-worker-{}", i))
            .build()
            .map_err(|e| DatasetError::Device {
                message: e.to_string(),
            })
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Device::Cpu => write!(f, "cpu"),
            Device::CpuParallel { threads: 0 } => write!(f, "cpu:auto"),
            Device::CpuParallel { threads } => write!(f, "cpu:{}", threads),
        }
    }
}

impl FromStr for Device {
    type Err = DatasetError;

    /// Parses `cpu`, `cpu:auto`, or `cpu:<threads>`.
    fn from_str(s: &str) -> DatasetResult<Self> {
        match s.trim() {
            "cpu" => Ok(Device::Cpu),
            "cpu:auto" => Ok(Device::CpuParallel { threads: 0 }),
            other => other
                .strip_prefix("cpu:")
                .and_then(|n| n.parse().ok())
                .map(|threads| Device::CpuParallel { threads })
                .ok_or_else(|| DatasetError::config(format!("unknown device '{}'", other))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_devices() {
        assert_eq!("cpu".parse::<Device>().unwrap(), Device::Cpu);
        assert_eq!(
            "cpu:auto".parse::<Device>().unwrap(),
            Device::CpuParallel { threads: 0 }
        );
        assert_eq!(
            "cpu:4".parse::<Device>().unwrap(),
            Device::CpuParallel { threads: 4 }
        );
        assert!("mps".parse::<Device>().is_err());
    }

    #[test]
    fn test_display_round_trips() {
        for device in [
            Device::Cpu,
            Device::CpuParallel { threads: 0 },
            Device::CpuParallel { threads: 3 },
        ] {
            assert_eq!(device.to_string().parse::<Device>().unwrap(), device);
        }
    }

    #[test]
    fn test_single_thread_pool() {
        let pool = Device::Cpu.thread_pool().unwrap();
        assert_eq!(pool.current_num_threads(), 1);
    }
}
