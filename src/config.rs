// src/config.rs
//! Command line and environment configuration.

use clap::Parser;
use tracing::{info, warn};

use crate::collector::corosync::CorosyncCollector;
use crate::collector::drbd::DrbdCollector;
use crate::collector::pacemaker::PacemakerCollector;
use crate::collector::sbd::SbdCollector;
use crate::collector::{Collector, InstrumentedCollector};
use crate::error::SetupError;

#[derive(Debug, Clone, Parser)]
#[command(name = "ha_cluster_exporter", version, about = "Prometheus exporter for Pacemaker based Linux HA clusters")]
pub struct Config {
    /// Address to listen on for web interface and telemetry.
    #[arg(long = "web.listen-address", env = "HA_CLUSTER_EXPORTER_LISTEN_ADDRESS", default_value = "0.0.0.0:9664")]
    pub listen_address: String,

    /// Path under which to expose metrics.
    #[arg(
        long = "web.telemetry-path",
        env = "HA_CLUSTER_EXPORTER_TELEMETRY_PATH",
        default_value = "/metrics",
        value_parser = parse_telemetry_path
    )]
    pub telemetry_path: String,

    #[arg(long, env = "HA_CLUSTER_EXPORTER_CRM_MON_PATH", default_value = "/usr/sbin/crm_mon")]
    pub crm_mon_path: String,

    #[arg(long, env = "HA_CLUSTER_EXPORTER_CIBADMIN_PATH", default_value = "/usr/sbin/cibadmin")]
    pub cibadmin_path: String,

    #[arg(
        long,
        env = "HA_CLUSTER_EXPORTER_COROSYNC_CFGTOOL_PATH",
        default_value = "/usr/sbin/corosync-cfgtool"
    )]
    pub corosync_cfgtool_path: String,

    #[arg(
        long,
        env = "HA_CLUSTER_EXPORTER_COROSYNC_QUORUMTOOL_PATH",
        default_value = "/usr/sbin/corosync-quorumtool"
    )]
    pub corosync_quorumtool_path: String,

    #[arg(long, env = "HA_CLUSTER_EXPORTER_SBD_PATH", default_value = "/usr/sbin/sbd")]
    pub sbd_path: String,

    #[arg(long, env = "HA_CLUSTER_EXPORTER_SBD_CONFIG_PATH", default_value = "/etc/sysconfig/sbd")]
    pub sbd_config_path: String,

    #[arg(long, env = "HA_CLUSTER_EXPORTER_DRBDSETUP_PATH", default_value = "/sbin/drbdsetup")]
    pub drbdsetup_path: String,

    /// Directory watched for DRBD split brain marker files.
    #[arg(
        long,
        env = "HA_CLUSTER_EXPORTER_DRBDSPLITBRAIN_PATH",
        default_value = "/var/run/drbd/splitbrain"
    )]
    pub drbdsplitbrain_path: String,

    /// Log level or tracing filter directive; `RUST_LOG` takes precedence.
    #[arg(long = "log.level", env = "HA_CLUSTER_EXPORTER_LOG_LEVEL", default_value = "info")]
    pub log_level: String,
}

fn parse_telemetry_path(path: &str) -> Result<String, String> {
    if path.starts_with('/') {
        Ok(path.to_string())
    } else {
        Err(format!("'{path}' must start with '/'"))
    }
}

impl Config {
    /// Function to build every collector whose tools are available. A
    /// collector that cannot be initialized is logged and skipped.
    pub fn collectors(&self) -> Vec<InstrumentedCollector> {
        let candidates: Vec<Result<Box<dyn Collector>, SetupError>> = vec![
            PacemakerCollector::new(&self.crm_mon_path, &self.cibadmin_path)
                .map(|c| Box::new(c) as Box<dyn Collector>),
            CorosyncCollector::new(&self.corosync_cfgtool_path, &self.corosync_quorumtool_path)
                .map(|c| Box::new(c) as Box<dyn Collector>),
            SbdCollector::new(&self.sbd_path, &self.sbd_config_path)
                .map(|c| Box::new(c) as Box<dyn Collector>),
            DrbdCollector::new(&self.drbdsetup_path, &self.drbdsplitbrain_path)
                .map(|c| Box::new(c) as Box<dyn Collector>),
        ];

        candidates
            .into_iter()
            .filter_map(|candidate| match candidate {
                Ok(collector) => {
                    info!(collector = collector.subsystem(), "collector enabled");
                    Some(InstrumentedCollector::new(collector))
                }
                Err(e) => {
                    warn!(error = %e, "collector disabled");
                    None
                }
            })
            .collect()
    }
}
