// src/collector/drbd.rs
//! DRBD device, connection and split brain metrics.
//!
//! Device and connection state comes from `drbdsetup status --json`. Split
//! brains are detected from marker files dropped by the DRBD split brain
//! notification hook, one file per resource and volume.

use std::fs;
use std::io;
use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;
use serde::Deserialize;
use tracing::{Span, debug, info_span, warn};

use super::{Collector, Descriptor, Metric, bool_value, tool};
use crate::error::{CollectError, SetupError};

pub const SUBSYSTEM: &str = "drbd";

static SPLIT_BRAIN_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^drbd-split-brain-detected-(?P<resource>[\w-]+)-(?P<volume>[\w-]+)$")
        .expect("valid split brain regex")
});

const RESOURCE_VOLUME: &[&str] = &["resource", "volume"];
const PEER_VOLUME: &[&str] = &["resource", "peer_node_id", "volume"];

pub static RESOURCES: Descriptor = Descriptor::gauge(
    SUBSYSTEM,
    "resources",
    "The DRBD resources; 1 line per name, per volume",
    &["resource", "role", "volume", "disk_state"],
);
pub static WRITTEN: Descriptor = Descriptor::gauge(
    SUBSYSTEM,
    "written",
    "KiB written to DRBD; 1 line per res, per volume",
    RESOURCE_VOLUME,
);
pub static READ: Descriptor = Descriptor::gauge(
    SUBSYSTEM,
    "read",
    "KiB read from DRBD; 1 line per res, per volume",
    RESOURCE_VOLUME,
);
pub static AL_WRITES: Descriptor = Descriptor::gauge(
    SUBSYSTEM,
    "al_writes",
    "Writes to activity log; 1 line per res, per volume",
    RESOURCE_VOLUME,
);
pub static BM_WRITES: Descriptor = Descriptor::gauge(
    SUBSYSTEM,
    "bm_writes",
    "Writes to bitmap; 1 line per res, per volume",
    RESOURCE_VOLUME,
);
pub static UPPER_PENDING: Descriptor = Descriptor::gauge(
    SUBSYSTEM,
    "upper_pending",
    "Upper pending; 1 line per res, per volume",
    RESOURCE_VOLUME,
);
pub static LOWER_PENDING: Descriptor = Descriptor::gauge(
    SUBSYSTEM,
    "lower_pending",
    "Lower pending; 1 line per res, per volume",
    RESOURCE_VOLUME,
);
pub static QUORUM: Descriptor = Descriptor::gauge(
    SUBSYSTEM,
    "quorum",
    "Quorum status per resource and per volume",
    RESOURCE_VOLUME,
);
pub static CONNECTIONS: Descriptor = Descriptor::gauge(
    SUBSYSTEM,
    "connections",
    "The DRBD resource connections; 1 line per per resource, per peer_node_id",
    &["resource", "peer_node_id", "peer_role", "volume", "peer_disk_state"],
);
pub static CONNECTIONS_SYNC: Descriptor = Descriptor::gauge(
    SUBSYSTEM,
    "connections_sync",
    "The in sync percentage value for DRBD resource connections",
    PEER_VOLUME,
);
pub static CONNECTIONS_RECEIVED: Descriptor = Descriptor::gauge(
    SUBSYSTEM,
    "connections_received",
    "KiB received per connection",
    PEER_VOLUME,
);
pub static CONNECTIONS_SENT: Descriptor = Descriptor::gauge(
    SUBSYSTEM,
    "connections_sent",
    "KiB sent per connection",
    PEER_VOLUME,
);
pub static CONNECTIONS_PENDING: Descriptor = Descriptor::gauge(
    SUBSYSTEM,
    "connections_pending",
    "Pending value per connection",
    PEER_VOLUME,
);
pub static CONNECTIONS_UNACKED: Descriptor = Descriptor::gauge(
    SUBSYSTEM,
    "connections_unacked",
    "Unacked value per connection",
    PEER_VOLUME,
);
pub static SPLIT_BRAIN: Descriptor = Descriptor::gauge(
    SUBSYSTEM,
    "split_brain",
    "Whether a split brain has been detected; 1 line per resource, per volume.",
    RESOURCE_VOLUME,
);

static DESCRIPTORS: &[&Descriptor] = &[
    &RESOURCES,
    &WRITTEN,
    &READ,
    &AL_WRITES,
    &BM_WRITES,
    &UPPER_PENDING,
    &LOWER_PENDING,
    &QUORUM,
    &CONNECTIONS,
    &CONNECTIONS_SYNC,
    &CONNECTIONS_RECEIVED,
    &CONNECTIONS_SENT,
    &CONNECTIONS_PENDING,
    &CONNECTIONS_UNACKED,
    &SPLIT_BRAIN,
];

/// One entry of the `drbdsetup status --json` array.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Resource {
    pub name: String,
    pub role: String,
    pub devices: Vec<Device>,
    pub connections: Vec<Connection>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct Device {
    pub volume: u32,
    pub written: u64,
    pub read: u64,
    pub al_writes: u64,
    pub bm_writes: u64,
    pub upper_pending: u64,
    pub lower_pending: u64,
    pub quorum: bool,
    pub disk_state: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct Connection {
    pub peer_node_id: u32,
    pub peer_role: String,
    #[serde(rename = "peer_devices")]
    pub peer_devices: Vec<PeerDevice>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct PeerDevice {
    pub volume: u32,
    pub received: u64,
    pub sent: u64,
    pub pending: u64,
    pub unacked: u64,
    pub peer_disk_state: String,
    pub percent_in_sync: f64,
}

/// Function to decode `drbdsetup status --json` output.
pub fn parse_status(raw: &[u8]) -> Result<Vec<Resource>, CollectError> {
    serde_json::from_slice(raw).map_err(|e| CollectError::Decode {
        tool: "drbdsetup",
        reason: e.to_string(),
    })
}

/// Function to flatten decoded DRBD resources into metric observations.
pub fn project(resources: &[Resource]) -> Vec<Metric> {
    let mut metrics = Vec::new();

    for resource in resources {
        let name = resource.name.as_str();

        for device in &resource.devices {
            let volume = device.volume.to_string();
            let disk_state = device.disk_state.to_lowercase();
            let labels = [name, volume.as_str()];

            metrics.push(Metric::new(
                &RESOURCES,
                1.0,
                [
                    name,
                    resource.role.as_str(),
                    volume.as_str(),
                    disk_state.as_str(),
                ],
            ));
            metrics.push(Metric::new(&WRITTEN, device.written as f64, labels));
            metrics.push(Metric::new(&READ, device.read as f64, labels));
            metrics.push(Metric::new(&AL_WRITES, device.al_writes as f64, labels));
            metrics.push(Metric::new(&BM_WRITES, device.bm_writes as f64, labels));
            metrics.push(Metric::new(&UPPER_PENDING, device.upper_pending as f64, labels));
            metrics.push(Metric::new(&LOWER_PENDING, device.lower_pending as f64, labels));
            metrics.push(Metric::new(&QUORUM, bool_value(device.quorum), labels));
        }

        if resource.connections.is_empty() {
            warn!(resource = name, "could not retrieve connection info for resource");
            continue;
        }

        for connection in &resource.connections {
            if connection.peer_devices.is_empty() {
                warn!(
                    resource = name,
                    peer_node_id = connection.peer_node_id,
                    "could not retrieve any peer device info for connection"
                );
                continue;
            }

            let peer_node_id = connection.peer_node_id.to_string();
            for peer_device in &connection.peer_devices {
                let volume = peer_device.volume.to_string();
                let peer_disk_state = peer_device.peer_disk_state.to_lowercase();
                let labels = [name, peer_node_id.as_str(), volume.as_str()];

                metrics.push(Metric::new(
                    &CONNECTIONS,
                    1.0,
                    [
                        name,
                        peer_node_id.as_str(),
                        connection.peer_role.as_str(),
                        volume.as_str(),
                        peer_disk_state.as_str(),
                    ],
                ));
                metrics.push(Metric::new(&CONNECTIONS_SYNC, peer_device.percent_in_sync, labels));
                metrics.push(Metric::new(&CONNECTIONS_RECEIVED, peer_device.received as f64, labels));
                metrics.push(Metric::new(&CONNECTIONS_SENT, peer_device.sent as f64, labels));
                metrics.push(Metric::new(&CONNECTIONS_PENDING, peer_device.pending as f64, labels));
                metrics.push(Metric::new(&CONNECTIONS_UNACKED, peer_device.unacked as f64, labels));
            }
        }
    }

    metrics
}

/// Function to report one `split_brain` series per marker file in `dir`.
///
/// A missing directory means no split brain was ever recorded.
pub fn split_brain_metrics(dir: &Path) -> Vec<Metric> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Vec::new(),
        Err(e) => {
            warn!(path = %dir.display(), error = %e, "could not scan split brain directory");
            return Vec::new();
        }
    };

    let mut names: Vec<String> = entries
        .filter_map(Result::ok)
        .map(|entry| entry.file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();

    names
        .iter()
        .filter_map(|name| SPLIT_BRAIN_RE.captures(name))
        .map(|caps| Metric::new(&SPLIT_BRAIN, 1.0, [&caps["resource"], &caps["volume"]]))
        .collect()
}

pub struct DrbdCollector {
    drbdsetup_path: String,
    split_brain_dir: String,
    span: Span,
}

impl DrbdCollector {
    pub fn new(drbdsetup_path: &str, split_brain_dir: &str) -> Result<Self, SetupError> {
        tool::check_executables(&[drbdsetup_path])
            .map_err(|e| SetupError::for_collector(SUBSYSTEM, e))?;

        Ok(Self {
            drbdsetup_path: drbdsetup_path.to_string(),
            split_brain_dir: split_brain_dir.to_string(),
            span: info_span!("collector", subsystem = SUBSYSTEM),
        })
    }
}

impl Collector for DrbdCollector {
    fn subsystem(&self) -> &'static str {
        SUBSYSTEM
    }

    fn descriptors(&self) -> &'static [&'static Descriptor] {
        DESCRIPTORS
    }

    fn collect_into(&self, metrics: &mut Vec<Metric>) -> Result<(), CollectError> {
        let _guard = self.span.enter();
        debug!("Collecting DRBD metrics...");

        // markers are reported even when drbdsetup fails below
        metrics.extend(split_brain_metrics(Path::new(&self.split_brain_dir)));

        let raw = tool::stdout(&self.drbdsetup_path, &["status", "--json"])?;
        let resources = parse_status(&raw)?;
        metrics.extend(project(&resources));

        Ok(())
    }
}
