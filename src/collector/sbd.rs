// src/collector/sbd.rs
//! SBD (storage based death) device health and timeout metrics.
//!
//! Devices are read from the sbd sysconfig file. Each device is then probed
//! with `sbd -d <device> dump`; a successful dump marks it healthy and its
//! header provides the watchdog and msgwait timeouts.

use std::fs;
use std::sync::LazyLock;

use regex::Regex;
use tracing::{Span, debug, info_span};

use super::{Collector, Descriptor, Metric, tool};
use crate::error::{CollectError, SetupError};

pub const SUBSYSTEM: &str = "sbd";

pub const HEALTHY: &str = "healthy";
pub const UNHEALTHY: &str = "unhealthy";

// Only the first uncommented assignment counts. Quotes are optional and not
// checked for balance.
static SBD_DEVICE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?m)^\s*SBD_DEVICE="?((?:[\w/-]+;?\s?)+)"?\s*$"#).expect("valid SBD_DEVICE regex")
});

static WATCHDOG_TIMEOUT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"Timeout \(watchdog\) *: (\d+)").expect("valid watchdog timeout regex")
});

static MSGWAIT_TIMEOUT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"Timeout \(msgwait\) *: (\d+)").expect("valid msgwait timeout regex")
});

pub static DEVICES: Descriptor = Descriptor::gauge(
    SUBSYSTEM,
    "devices",
    "SBD devices; one line per device",
    &["device", "status"],
);

pub static TIMEOUTS: Descriptor = Descriptor::gauge(
    SUBSYSTEM,
    "timeouts",
    "SBD timeouts for each device and type",
    &["device", "type"],
);

static DESCRIPTORS: &[&Descriptor] = &[&DEVICES, &TIMEOUTS];

/// Watchdog and msgwait timeouts, in seconds, from a device header dump.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    pub watchdog: u64,
    pub msgwait: u64,
}

/// Function to extract the ordered SBD device list from the sbd config file.
pub fn parse_devices(config: &str) -> Vec<String> {
    let Some(caps) = SBD_DEVICE_RE.captures(config) else {
        return Vec::new();
    };

    caps[1]
        .trim_end()
        .trim_end_matches(';')
        .split(';')
        .map(|device| device.trim().to_string())
        .collect()
}

/// Function to read both timeouts from `sbd dump` output; `None` unless both are present.
pub fn parse_timeouts(dump: &str) -> Option<Timeouts> {
    let watchdog = WATCHDOG_TIMEOUT_RE.captures(dump)?[1].parse().ok()?;
    let msgwait = MSGWAIT_TIMEOUT_RE.captures(dump)?[1].parse().ok()?;

    Some(Timeouts { watchdog, msgwait })
}

pub struct SbdCollector {
    sbd_path: String,
    config_path: String,
    span: Span,
}

impl SbdCollector {
    pub fn new(sbd_path: &str, config_path: &str) -> Result<Self, SetupError> {
        tool::check_executables(&[sbd_path])
            .and_then(|_| tool::check_file(config_path))
            .map_err(|e| SetupError::for_collector(SUBSYSTEM, e))?;

        Ok(Self {
            sbd_path: sbd_path.to_string(),
            config_path: config_path.to_string(),
            span: info_span!("collector", subsystem = SUBSYSTEM),
        })
    }

    /// Dumps one device header. A device whose dump fails or cannot be run
    /// is unhealthy and has no timeouts.
    fn probe(&self, device: &str) -> (bool, Option<Timeouts>) {
        match tool::status(&self.sbd_path, &["-d", device, "dump"]) {
            Some((success, stdout)) => (success, parse_timeouts(&String::from_utf8_lossy(&stdout))),
            None => (false, None),
        }
    }
}

impl Collector for SbdCollector {
    fn subsystem(&self) -> &'static str {
        SUBSYSTEM
    }

    fn descriptors(&self) -> &'static [&'static Descriptor] {
        DESCRIPTORS
    }

    fn collect_into(&self, metrics: &mut Vec<Metric>) -> Result<(), CollectError> {
        let _guard = self.span.enter();
        debug!("Collecting SBD metrics...");

        let config = fs::read_to_string(&self.config_path).map_err(|source| CollectError::Io {
            path: self.config_path.clone(),
            source,
        })?;
        let devices = parse_devices(&config);

        let probes: Vec<(String, bool, Option<Timeouts>)> = devices
            .into_iter()
            .map(|device| {
                let (healthy, timeouts) = self.probe(&device);
                (device, healthy, timeouts)
            })
            .collect();

        metrics.extend(project(&probes));
        Ok(())
    }
}

/// Function to flatten per-device probe results into metric observations.
pub fn project(probes: &[(String, bool, Option<Timeouts>)]) -> Vec<Metric> {
    let mut metrics = Vec::new();

    for (device, healthy, _) in probes {
        let status = if *healthy { HEALTHY } else { UNHEALTHY };
        metrics.push(Metric::new(&DEVICES, 1.0, [device.as_str(), status]));
    }

    for (device, _, timeouts) in probes {
        if let Some(timeouts) = timeouts {
            metrics.push(Metric::new(
                &TIMEOUTS,
                timeouts.watchdog as f64,
                [device.as_str(), "watchdog"],
            ));
        }
    }

    for (device, _, timeouts) in probes {
        if let Some(timeouts) = timeouts {
            metrics.push(Metric::new(
                &TIMEOUTS,
                timeouts.msgwait as f64,
                [device.as_str(), "msgwait"],
            ));
        }
    }

    metrics
}

#[cfg(test)]
mod tests {
    use super::*;

    const DUMP: &str = "==Dumping header on disk /dev/vdb
Header version     : 2.1
UUID               : 541bdcea-16af-44a4-8ab9-6a98602e65ca
Number of slots    : 255
Sector size        : 512
Timeout (watchdog) : 9
Timeout (allocate) : 2
Timeout (loop)     : 1
Timeout (msgwait)  : 10
==Header on disk /dev/vdb is dumped";

    #[test]
    fn test_parse_devices_without_double_quotes() {
        let config = "
 # SBD_DEVICE specifies the devices to use for exchanging sbd messages
 #
 #SBD_DEVICE=\"\"

 SBD_PACEMAKER=yes
 SBD_STARTMODE=always
 SBD_OPTS=
 SBD_DEVICE=/dev/vda;/dev/vdb;/dev/vdc
";

        assert_eq!(parse_devices(config), ["/dev/vda", "/dev/vdb", "/dev/vdc"]);
    }

    #[test]
    fn test_parse_devices_with_double_quotes() {
        let config = "## Type: string
 #SBD_DEVICE=\"\"

 SBD_WATCHDOG_TIMEOUT=5

 SBD_DEVICE=\"/dev/vda;/dev/vdb;/dev/vdc\"

 SBD_TIMEOUT_ACTION=flush,reboot";

        assert_eq!(parse_devices(config), ["/dev/vda", "/dev/vdb", "/dev/vdc"]);
    }

    #[test]
    fn test_parse_devices_single_device() {
        assert_eq!(parse_devices("\n SBD_DEVICE=/dev/vdc\n\n ## Type: string\n"), ["/dev/vdc"]);
    }

    #[test]
    fn test_parse_devices_ignores_commented_assignment() {
        let config = "\n# SBD_DEVICE=/dev/foo\nSBD_DEVICE=/dev/vdc;/dev/vdd";

        assert_eq!(parse_devices(config), ["/dev/vdc", "/dev/vdd"]);
    }

    #[test]
    fn test_parse_devices_separators() {
        assert_eq!(parse_devices("SBD_DEVICE=/dev/vdc; /dev/vdd"), ["/dev/vdc", "/dev/vdd"]);
        assert_eq!(parse_devices("SBD_DEVICE=/dev/vdc;/dev/vdd;"), ["/dev/vdc", "/dev/vdd"]);
    }

    #[test]
    fn test_parse_devices_stops_at_line_end() {
        let config = "SBD_DEVICE=/dev/vda\nSBD_PACEMAKER=yes\n";

        assert_eq!(parse_devices(config), ["/dev/vda"]);
    }

    #[test]
    fn test_parse_devices_missing() {
        assert!(parse_devices("SBD_PACEMAKER=yes\n#SBD_DEVICE=/dev/vda\n").is_empty());
    }

    #[test]
    fn test_parse_timeouts() {
        assert_eq!(
            parse_timeouts(DUMP),
            Some(Timeouts {
                watchdog: 9,
                msgwait: 10
            })
        );
        assert_eq!(parse_timeouts("Timeout (watchdog) : 5"), None);
        assert_eq!(parse_timeouts(""), None);
    }

    #[test]
    fn test_project() {
        let probes = vec![
            ("/dev/vda".to_string(), true, parse_timeouts(DUMP)),
            ("/dev/vdb".to_string(), false, None),
        ];
        let metrics = project(&probes);

        let summary: Vec<(&str, &str, &str, f64)> = metrics
            .iter()
            .map(|m| {
                (
                    m.name(),
                    m.label_values[0].as_str(),
                    m.label_values[1].as_str(),
                    m.value,
                )
            })
            .collect();
        assert_eq!(
            summary,
            [
                ("devices", "/dev/vda", "healthy", 1.0),
                ("devices", "/dev/vdb", "unhealthy", 1.0),
                ("timeouts", "/dev/vda", "watchdog", 9.0),
                ("timeouts", "/dev/vda", "msgwait", 10.0),
            ]
        );
    }

    #[test]
    fn test_new_checks_config_existence() {
        let err = SbdCollector::new("/bin/sh", "/nonexistent/sbd").err().unwrap();

        assert!(err.to_string().contains("'/nonexistent/sbd' does not exist"));
    }
}
