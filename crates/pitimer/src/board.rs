//! Board identification and the construction-time capability gate.
//!
//! The timer only needs a yes/no answer. [`ProcfsProbe`] derives it from the
//! device-tree model string, falling back to the `Hardware` line of
//! `/proc/cpuinfo` on older kernels.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Device-tree model string, NUL terminated.
pub const DEVICE_TREE_MODEL_PATH: &str = "/proc/device-tree/model";

/// Kernel CPU description.
pub const CPUINFO_PATH: &str = "/proc/cpuinfo";

const BROADCOM_SOC_PREFIX: &str = "BCM2";
const RASPBERRY_PI_MODEL: &str = "Raspberry Pi";

/// What the host says about itself.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoardInfo {
    /// Human-readable model, e.g. `Raspberry Pi 4 Model B Rev 1.4`.
    pub model: Option<String>,
    /// SoC name from `/proc/cpuinfo`, e.g. `BCM2835`.
    pub hardware: Option<String>,
    /// Board revision code.
    pub revision: Option<String>,
    /// Board serial number.
    pub serial: Option<String>,
}

impl BoardInfo {
    /// Decode the raw bytes of the device-tree model node.
    pub fn model_from_device_tree(raw: &[u8]) -> Option<String> {
        let text = String::from_utf8_lossy(raw);
        let model = text.trim_end_matches('\0').trim();
        (!model.is_empty()).then(|| model.to_string())
    }

    /// Collect the board lines of `/proc/cpuinfo`.
    pub fn parse_cpuinfo(text: &str) -> Self {
        let mut info = Self::default();
        for line in text.lines() {
            let Some((key, value)) = line.split_once(':') else {
                continue;
            };
            let value = value.trim();
            if value.is_empty() {
                continue;
            }
            let slot = match key.trim() {
                "Model" => &mut info.model,
                "Hardware" => &mut info.hardware,
                "Revision" => &mut info.revision,
                "Serial" => &mut info.serial,
                _ => continue,
            };
            *slot = Some(value.to_string());
        }
        info
    }

    /// Whether this looks like a Raspberry Pi.
    pub fn is_raspberry_pi(&self) -> bool {
        let model_matches = self
            .model
            .as_deref()
            .is_some_and(|model| model.contains(RASPBERRY_PI_MODEL));
        let soc_matches = self
            .hardware
            .as_deref()
            .is_some_and(|hardware| hardware.starts_with(BROADCOM_SOC_PREFIX));
        model_matches || soc_matches
    }

    /// Short description for messages.
    pub fn describe(&self) -> String {
        self.model
            .as_deref()
            .or(self.hardware.as_deref())
            .unwrap_or("unknown board")
            .to_string()
    }
}

/// Source of the capability gate.
pub trait BoardProbe {
    /// Identify the host.
    fn board_info(&self) -> BoardInfo;

    /// Whether the high-resolution timer may be built on this host.
    fn is_supported(&self) -> bool {
        self.board_info().is_raspberry_pi()
    }
}

/// Probe backed by procfs.
#[derive(Debug, Clone)]
pub struct ProcfsProbe {
    device_tree_model: PathBuf,
    cpuinfo: PathBuf,
}

impl Default for ProcfsProbe {
    fn default() -> Self {
        Self::with_paths(DEVICE_TREE_MODEL_PATH, CPUINFO_PATH)
    }
}

impl ProcfsProbe {
    /// Probe reading from alternate locations.
    pub fn with_paths(device_tree_model: impl Into<PathBuf>, cpuinfo: impl Into<PathBuf>) -> Self {
        Self {
            device_tree_model: device_tree_model.into(),
            cpuinfo: cpuinfo.into(),
        }
    }

    fn read(path: &Path) -> Option<Vec<u8>> {
        match fs::read(path) {
            Ok(bytes) => Some(bytes),
            Err(e) => {
                debug!(path = %path.display(), error = %e, "Board probe source unavailable");
                None
            }
        }
    }
}

impl BoardProbe for ProcfsProbe {
    fn board_info(&self) -> BoardInfo {
        let mut info = Self::read(&self.cpuinfo)
            .map(|raw| BoardInfo::parse_cpuinfo(&String::from_utf8_lossy(&raw)))
            .unwrap_or_default();

        if let Some(model) = Self::read(&self.device_tree_model)
            .as_deref()
            .and_then(BoardInfo::model_from_device_tree)
        {
            info.model = Some(model);
        }

        info
    }
}

/// Probe with a fixed answer, for hosts identified by other means.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FixedProbe {
    supported: bool,
    info: BoardInfo,
}

impl FixedProbe {
    /// Always passes the gate.
    pub fn supported() -> Self {
        Self {
            supported: true,
            info: BoardInfo {
                model: Some("assumed supported".to_string()),
                ..BoardInfo::default()
            },
        }
    }

    /// Always fails the gate.
    pub fn unsupported() -> Self {
        Self {
            supported: false,
            info: BoardInfo::default(),
        }
    }

    /// Fixed answer with a custom description.
    pub fn new(supported: bool, info: BoardInfo) -> Self {
        Self { supported, info }
    }
}

impl BoardProbe for FixedProbe {
    fn board_info(&self) -> BoardInfo {
        self.info.clone()
    }

    fn is_supported(&self) -> bool {
        self.supported
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PI3_CPUINFO: &str = "processor\t: 0\n\
        model name\t: ARMv7 Processor rev 4 (v7l)\n\
        BogoMIPS\t: 38.40\n\
        \n\
        Hardware\t: BCM2835\n\
        Revision\t: a02082\n\
        Serial\t\t: 00000000deadbeef\n\
        Model\t\t: Raspberry Pi 3 Model B Rev 1.2\n";

    const X86_CPUINFO: &str = "processor\t: 0\n\
        vendor_id\t: GenuineIntel\n\
        model\t\t: 158\n\
        model name\t: Intel(R) Core(TM) i7-8700 CPU @ 3.20GHz\n";

    #[test]
    fn test_parse_pi_cpuinfo() {
        let info = BoardInfo::parse_cpuinfo(PI3_CPUINFO);
        assert_eq!(info.hardware.as_deref(), Some("BCM2835"));
        assert_eq!(info.revision.as_deref(), Some("a02082"));
        assert_eq!(info.serial.as_deref(), Some("00000000deadbeef"));
        assert_eq!(info.model.as_deref(), Some("Raspberry Pi 3 Model B Rev 1.2"));
        assert!(info.is_raspberry_pi());
    }

    #[test]
    fn test_parse_x86_cpuinfo() {
        let info = BoardInfo::parse_cpuinfo(X86_CPUINFO);
        assert_eq!(info, BoardInfo::default());
        assert!(!info.is_raspberry_pi());
        assert_eq!(info.describe(), "unknown board");
    }

    #[test]
    fn test_device_tree_model_strips_nul() {
        let raw = b"Raspberry Pi 4 Model B Rev 1.4\0";
        assert_eq!(
            BoardInfo::model_from_device_tree(raw).as_deref(),
            Some("Raspberry Pi 4 Model B Rev 1.4")
        );
        assert_eq!(BoardInfo::model_from_device_tree(b"\0"), None);
    }

    #[test]
    fn test_soc_alone_passes_gate() {
        let info = BoardInfo {
            hardware: Some("BCM2711".to_string()),
            ..BoardInfo::default()
        };
        assert!(info.is_raspberry_pi());
        assert_eq!(info.describe(), "BCM2711");
    }

    #[test]
    fn test_procfs_probe_missing_files() {
        let probe = ProcfsProbe::with_paths("/nonexistent/model", "/nonexistent/cpuinfo");
        assert_eq!(probe.board_info(), BoardInfo::default());
        assert!(!probe.is_supported());
    }

    #[test]
    fn test_procfs_probe_reads_files() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        let model = dir.path().join("model");
        let cpuinfo = dir.path().join("cpuinfo");
        fs::write(&model, b"Raspberry Pi Zero 2 W Rev 1.0\0")?;
        fs::write(&cpuinfo, PI3_CPUINFO)?;

        let info = ProcfsProbe::with_paths(&model, &cpuinfo).board_info();
        assert_eq!(info.model.as_deref(), Some("Raspberry Pi Zero 2 W Rev 1.0"));
        assert_eq!(info.hardware.as_deref(), Some("BCM2835"));
        Ok(())
    }

    #[test]
    fn test_fixed_probe() {
        assert!(FixedProbe::supported().is_supported());
        assert!(!FixedProbe::unsupported().is_supported());
    }
}
