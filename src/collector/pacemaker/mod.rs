// src/collector/pacemaker/mod.rs
//! Pacemaker node, resource and constraint metrics.
//!
//! Runtime state comes from `crm_mon`, location constraints from the CIB
//! dumped by `cibadmin`. Both documents are fetched on every scrape.

pub mod cib;
pub mod crmmon;

use chrono::NaiveDateTime;
use tracing::{Span, debug, info_span, warn};

use super::{Collector, Descriptor, Metric, bool_value, tool};
use crate::error::{CollectError, SetupError};

pub use cib::CibAdminParser;
pub use crmmon::CrmMonParser;

pub const SUBSYSTEM: &str = "pacemaker";

/// Pacemaker's reserved fail count meaning "infinitely failed".
pub const INFINITE_FAIL_COUNT: i64 = 1_000_000;

/// ANSI C `asctime` layout used by crm_mon for `last_change`, with the
/// day padding collapsed.
const LAST_CHANGE_FORMAT: &str = "%a %b %d %H:%M:%S %Y";

pub static NODES: Descriptor = Descriptor::gauge(
    SUBSYSTEM,
    "nodes",
    "The status of each node in the cluster; 1 means the node is in that status, 0 otherwise",
    &["node", "type", "status"],
);

pub static NODE_ATTRIBUTES: Descriptor = Descriptor::gauge(
    SUBSYSTEM,
    "node_attributes",
    "Metadata attributes of each node; value is always 1",
    &["node", "name", "value"],
);

pub static RESOURCES: Descriptor = Descriptor::gauge(
    SUBSYSTEM,
    "resources",
    "The status of each resource in the cluster; 1 means the resource is in that status, 0 otherwise",
    &[
        "node", "resource", "role", "managed", "status", "agent", "group", "clone",
    ],
);

pub static STONITH_ENABLED: Descriptor = Descriptor::gauge(
    SUBSYSTEM,
    "stonith_enabled",
    "Whether or not stonith is enabled",
    &[],
);

pub static FAIL_COUNT: Descriptor = Descriptor::gauge(
    SUBSYSTEM,
    "fail_count",
    "The Fail count number per node and resource id",
    &["node", "resource"],
);

pub static MIGRATION_THRESHOLD: Descriptor = Descriptor::gauge(
    SUBSYSTEM,
    "migration_threshold",
    "The migration_threshold number per node and resource id",
    &["node", "resource"],
);

pub static CONFIG_LAST_CHANGE: Descriptor = Descriptor::counter(
    SUBSYSTEM,
    "config_last_change",
    "The timestamp of the last change of the cluster configuration",
    &[],
);

pub static LOCATION_CONSTRAINTS: Descriptor = Descriptor::gauge(
    SUBSYSTEM,
    "location_constraints",
    "Resource location constraints. The value indicates the score.",
    &["constraint", "node", "resource", "role"],
);

static DESCRIPTORS: &[&Descriptor] = &[
    &NODES,
    &NODE_ATTRIBUTES,
    &RESOURCES,
    &STONITH_ENABLED,
    &FAIL_COUNT,
    &MIGRATION_THRESHOLD,
    &CONFIG_LAST_CHANGE,
    &LOCATION_CONSTRAINTS,
];

/// Boolean node flags reported by crm_mon, each exported as one `status` label.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeStatus {
    Online,
    Standby,
    StandbyOnFail,
    Maintenance,
    Pending,
    Unclean,
    Shutdown,
    ExpectedUp,
    Dc,
}

impl NodeStatus {
    pub const ALL: [NodeStatus; 9] = [
        NodeStatus::Online,
        NodeStatus::Standby,
        NodeStatus::StandbyOnFail,
        NodeStatus::Maintenance,
        NodeStatus::Pending,
        NodeStatus::Unclean,
        NodeStatus::Shutdown,
        NodeStatus::ExpectedUp,
        NodeStatus::Dc,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            NodeStatus::Online => "online",
            NodeStatus::Standby => "standby",
            NodeStatus::StandbyOnFail => "standby_onfail",
            NodeStatus::Maintenance => "maintenance",
            NodeStatus::Pending => "pending",
            NodeStatus::Unclean => "unclean",
            NodeStatus::Shutdown => "shutdown",
            NodeStatus::ExpectedUp => "expected_up",
            NodeStatus::Dc => "dc",
        }
    }

    pub fn is_set(&self, node: &crmmon::Node) -> bool {
        match self {
            NodeStatus::Online => node.online,
            NodeStatus::Standby => node.standby,
            NodeStatus::StandbyOnFail => node.standby_onfail,
            NodeStatus::Maintenance => node.maintenance,
            NodeStatus::Pending => node.pending,
            NodeStatus::Unclean => node.unclean,
            NodeStatus::Shutdown => node.shutdown,
            NodeStatus::ExpectedUp => node.expected_up,
            NodeStatus::Dc => node.dc,
        }
    }
}

/// Boolean resource flags reported by crm_mon.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceStatus {
    Active,
    Orphaned,
    Blocked,
    Failed,
    FailureIgnored,
}

impl ResourceStatus {
    pub const ALL: [ResourceStatus; 5] = [
        ResourceStatus::Active,
        ResourceStatus::Orphaned,
        ResourceStatus::Blocked,
        ResourceStatus::Failed,
        ResourceStatus::FailureIgnored,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceStatus::Active => "active",
            ResourceStatus::Orphaned => "orphaned",
            ResourceStatus::Blocked => "blocked",
            ResourceStatus::Failed => "failed",
            ResourceStatus::FailureIgnored => "failure_ignored",
        }
    }

    pub fn is_set(&self, resource: &crmmon::Resource) -> bool {
        match self {
            ResourceStatus::Active => resource.active,
            ResourceStatus::Orphaned => resource.orphaned,
            ResourceStatus::Blocked => resource.blocked,
            ResourceStatus::Failed => resource.failed,
            ResourceStatus::FailureIgnored => resource.failure_ignored,
        }
    }
}

pub struct PacemakerCollector {
    crm_mon: CrmMonParser,
    cibadmin: CibAdminParser,
    span: Span,
}

impl PacemakerCollector {
    pub fn new(crm_mon_path: &str, cibadmin_path: &str) -> Result<Self, SetupError> {
        tool::check_executables(&[crm_mon_path, cibadmin_path])
            .map_err(|e| SetupError::for_collector(SUBSYSTEM, e))?;

        Ok(Self {
            crm_mon: CrmMonParser::new(crm_mon_path),
            cibadmin: CibAdminParser::new(cibadmin_path),
            span: info_span!("collector", subsystem = SUBSYSTEM),
        })
    }
}

impl Collector for PacemakerCollector {
    fn subsystem(&self) -> &'static str {
        SUBSYSTEM
    }

    fn descriptors(&self) -> &'static [&'static Descriptor] {
        DESCRIPTORS
    }

    fn collect_into(&self, metrics: &mut Vec<Metric>) -> Result<(), CollectError> {
        let _guard = self.span.enter();
        debug!("Collecting pacemaker metrics...");

        let crm_mon = self.crm_mon.parse()?;
        let cib = self.cibadmin.parse()?;

        metrics.extend(project(&crm_mon, &cib));
        Ok(())
    }
}

/// Function to flatten the crm_mon and CIB documents into metric observations.
pub fn project(crm_mon: &crmmon::Root, cib: &cib::Root) -> Vec<Metric> {
    let mut metrics = Vec::new();

    metrics.push(Metric::unlabeled(
        &STONITH_ENABLED,
        bool_value(crm_mon.summary.cluster_options.stonith_enabled),
    ));

    record_nodes(crm_mon, &mut metrics);
    record_node_attributes(crm_mon, &mut metrics);
    record_resources(crm_mon, &mut metrics);
    record_node_history(crm_mon, &mut metrics);

    match parse_last_change(&crm_mon.summary.last_change.time) {
        Some(timestamp) => {
            metrics.push(Metric::unlabeled(&CONFIG_LAST_CHANGE, timestamp as f64));
        }
        None => warn!(
            time = %crm_mon.summary.last_change.time,
            "could not parse the last configuration change time"
        ),
    }

    for constraint in &cib.configuration.constraints.locations {
        let role = constraint.role.to_lowercase();
        metrics.push(Metric::new(
            &LOCATION_CONSTRAINTS,
            location_score(&constraint.score),
            [
                constraint.id.as_str(),
                constraint.node.as_str(),
                constraint.resource.as_str(),
                role.as_str(),
            ],
        ));
    }

    metrics
}

fn record_nodes(crm_mon: &crmmon::Root, metrics: &mut Vec<Metric>) {
    for node in &crm_mon.nodes.nodes {
        let node_type = node_type(&node.node_type);

        for status in NodeStatus::ALL {
            metrics.push(Metric::new(
                &NODES,
                bool_value(status.is_set(node)),
                [node.name.as_str(), node_type, status.as_str()],
            ));
        }
    }
}

fn record_node_attributes(crm_mon: &crmmon::Root, metrics: &mut Vec<Metric>) {
    for node in &crm_mon.node_attributes.nodes {
        for attribute in &node.attributes {
            metrics.push(Metric::new(
                &NODE_ATTRIBUTES,
                1.0,
                [
                    node.name.as_str(),
                    attribute.name.as_str(),
                    attribute.value.as_str(),
                ],
            ));
        }
    }
}

fn record_resources(crm_mon: &crmmon::Root, metrics: &mut Vec<Metric>) {
    let resources = &crm_mon.resources;
    let has_top_level = !resources.resources.is_empty()
        || !resources.clones.is_empty()
        || !resources.groups.is_empty();

    // older crm_mon only nests resources under their node
    if !has_top_level {
        for node in &crm_mon.nodes.nodes {
            for resource in &node.resources {
                record_resource(resource, Some(node.name.as_str()), "", "", metrics);
            }
        }
        return;
    }

    for resource in &resources.resources {
        record_resource(resource, None, "", "", metrics);
    }
    for group in &resources.groups {
        for resource in &group.resources {
            record_resource(resource, None, &group.id, "", metrics);
        }
    }
    for clone in &resources.clones {
        for resource in &clone.resources {
            record_resource(resource, None, "", &clone.id, metrics);
        }
        for group in &clone.groups {
            for resource in &group.resources {
                record_resource(resource, None, &group.id, &clone.id, metrics);
            }
        }
    }
}

fn record_resource(
    resource: &crmmon::Resource,
    node: Option<&str>,
    group: &str,
    clone: &str,
    metrics: &mut Vec<Metric>,
) {
    let role = resource.role.to_lowercase();
    let managed = resource.managed.to_string();

    let nodes: Vec<&str> = match node {
        Some(node) => vec![node],
        None if resource.nodes.is_empty() => vec![""],
        None => resource.nodes.iter().map(|n| n.name.as_str()).collect(),
    };

    for node in nodes {
        for status in ResourceStatus::ALL {
            metrics.push(Metric::new(
                &RESOURCES,
                bool_value(status.is_set(resource)),
                [
                    node,
                    resource.id.as_str(),
                    role.as_str(),
                    managed.as_str(),
                    status.as_str(),
                    resource.agent.as_str(),
                    group,
                    clone,
                ],
            ));
        }
    }
}

fn record_node_history(crm_mon: &crmmon::Root, metrics: &mut Vec<Metric>) {
    for node in &crm_mon.node_history.nodes {
        for history in &node.resource_history {
            metrics.push(Metric::new(
                &FAIL_COUNT,
                fail_count_value(history.fail_count),
                [node.name.as_str(), history.name.as_str()],
            ));
        }
    }

    for node in &crm_mon.node_history.nodes {
        for history in &node.resource_history {
            metrics.push(Metric::new(
                &MIGRATION_THRESHOLD,
                history.migration_threshold as f64,
                [node.name.as_str(), history.name.as_str()],
            ));
        }
    }
}

/// Function to normalise the crm_mon node type.
pub fn node_type(raw: &str) -> &'static str {
    match raw {
        "member" => "member",
        "ping" => "ping",
        "remote" => "remote",
        _ => "unknown",
    }
}

/// Function to translate the infinite fail count sentinel to `+inf`.
pub fn fail_count_value(fail_count: i64) -> f64 {
    if fail_count == INFINITE_FAIL_COUNT {
        f64::INFINITY
    } else {
        fail_count as f64
    }
}

/// Function to convert a location constraint score. Unparseable scores
/// count as 0.
pub fn location_score(score: &str) -> f64 {
    match score {
        "INFINITY" => f64::INFINITY,
        "-INFINITY" => f64::NEG_INFINITY,
        other => other.parse::<i64>().map(|s| s as f64).unwrap_or(0.0),
    }
}

/// Function to parse the crm_mon `last_change` time as UTC seconds since the epoch.
pub fn parse_last_change(time: &str) -> Option<i64> {
    let time = time.split_whitespace().collect::<Vec<_>>().join(" ");
    NaiveDateTime::parse_from_str(&time, LAST_CHANGE_FORMAT)
        .ok()
        .map(|t| t.and_utc().timestamp())
}
