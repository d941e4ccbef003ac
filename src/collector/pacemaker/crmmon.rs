// src/collector/pacemaker/crmmon.rs
//! Cluster runtime state as reported by `crm_mon -X --group-by-node --inactive`.
//!
//! Missing attributes fall back to their zero value and unknown elements are
//! ignored, so older and newer crm_mon schemas decode into the same tree.

use serde::Deserialize;

use crate::collector::tool;
use crate::error::CollectError;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Root {
    #[serde(rename = "@version")]
    pub version: String,
    pub summary: Summary,
    pub nodes: Nodes,
    pub node_attributes: NodeAttributes,
    pub node_history: NodeHistory,
    pub resources: Resources,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Summary {
    pub nodes_configured: Count,
    pub last_change: LastChange,
    pub resources_configured: ResourcesConfigured,
    pub cluster_options: ClusterOptions,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Count {
    #[serde(rename = "@number")]
    pub number: u64,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct LastChange {
    #[serde(rename = "@time")]
    pub time: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ResourcesConfigured {
    #[serde(rename = "@number")]
    pub number: u64,
    #[serde(rename = "@disabled")]
    pub disabled: u64,
    #[serde(rename = "@blocked")]
    pub blocked: u64,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ClusterOptions {
    #[serde(rename = "@stonith-enabled")]
    pub stonith_enabled: bool,
    #[serde(rename = "@maintenance-mode")]
    pub maintenance_mode: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Nodes {
    #[serde(rename = "node")]
    pub nodes: Vec<Node>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Node {
    #[serde(rename = "@name")]
    pub name: String,
    #[serde(rename = "@id")]
    pub id: String,
    #[serde(rename = "@online")]
    pub online: bool,
    #[serde(rename = "@standby")]
    pub standby: bool,
    #[serde(rename = "@standby_onfail")]
    pub standby_onfail: bool,
    #[serde(rename = "@maintenance")]
    pub maintenance: bool,
    #[serde(rename = "@pending")]
    pub pending: bool,
    #[serde(rename = "@unclean")]
    pub unclean: bool,
    #[serde(rename = "@shutdown")]
    pub shutdown: bool,
    #[serde(rename = "@expected_up")]
    pub expected_up: bool,
    #[serde(rename = "@is_dc")]
    pub dc: bool,
    #[serde(rename = "@resources_running")]
    pub resources_running: u64,
    #[serde(rename = "@type")]
    pub node_type: String,
    /// Resources running on this node (group-by-node layout).
    #[serde(rename = "resource")]
    pub resources: Vec<Resource>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct NodeAttributes {
    #[serde(rename = "node")]
    pub nodes: Vec<NodeAttributeSet>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct NodeAttributeSet {
    #[serde(rename = "@name")]
    pub name: String,
    #[serde(rename = "attribute")]
    pub attributes: Vec<NodeAttribute>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct NodeAttribute {
    #[serde(rename = "@name")]
    pub name: String,
    #[serde(rename = "@value")]
    pub value: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct NodeHistory {
    #[serde(rename = "node")]
    pub nodes: Vec<NodeHistoryEntry>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct NodeHistoryEntry {
    #[serde(rename = "@name")]
    pub name: String,
    #[serde(rename = "resource_history")]
    pub resource_history: Vec<ResourceHistory>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ResourceHistory {
    #[serde(rename = "@id")]
    pub name: String,
    #[serde(rename = "@migration-threshold")]
    pub migration_threshold: i64,
    #[serde(rename = "@fail-count")]
    pub fail_count: i64,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Resources {
    #[serde(rename = "resource")]
    pub resources: Vec<Resource>,
    #[serde(rename = "clone")]
    pub clones: Vec<ResourceClone>,
    #[serde(rename = "group")]
    pub groups: Vec<ResourceGroup>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Resource {
    #[serde(rename = "@id")]
    pub id: String,
    #[serde(rename = "@resource_agent")]
    pub agent: String,
    #[serde(rename = "@role")]
    pub role: String,
    #[serde(rename = "@active")]
    pub active: bool,
    #[serde(rename = "@orphaned")]
    pub orphaned: bool,
    #[serde(rename = "@blocked")]
    pub blocked: bool,
    #[serde(rename = "@managed")]
    pub managed: bool,
    #[serde(rename = "@failed")]
    pub failed: bool,
    #[serde(rename = "@failure_ignored")]
    pub failure_ignored: bool,
    #[serde(rename = "@nodes_running_on")]
    pub nodes_running_on: u64,
    /// Nodes the resource is running on; empty when stopped.
    #[serde(rename = "node")]
    pub nodes: Vec<ResourceNode>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ResourceNode {
    #[serde(rename = "@name")]
    pub name: String,
    #[serde(rename = "@id")]
    pub id: String,
    #[serde(rename = "@cached")]
    pub cached: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ResourceClone {
    #[serde(rename = "@id")]
    pub id: String,
    #[serde(rename = "@multi_state")]
    pub multi_state: bool,
    #[serde(rename = "@managed")]
    pub managed: bool,
    #[serde(rename = "@failed")]
    pub failed: bool,
    #[serde(rename = "@failure_ignored")]
    pub failure_ignored: bool,
    #[serde(rename = "@unique")]
    pub unique: bool,
    #[serde(rename = "resource")]
    pub resources: Vec<Resource>,
    #[serde(rename = "group")]
    pub groups: Vec<ResourceGroup>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ResourceGroup {
    #[serde(rename = "@id")]
    pub id: String,
    #[serde(rename = "resource")]
    pub resources: Vec<Resource>,
}

/// Function to decode a crm_mon XML document.
pub fn from_xml(raw: &[u8]) -> Result<Root, CollectError> {
    let text = std::str::from_utf8(raw).map_err(|e| CollectError::Decode {
        tool: "crm_mon",
        reason: e.to_string(),
    })?;

    quick_xml::de::from_str(text).map_err(|e| CollectError::Decode {
        tool: "crm_mon",
        reason: e.to_string(),
    })
}

/// Runs `crm_mon` and decodes its XML output.
#[derive(Debug, Clone)]
pub struct CrmMonParser {
    crm_mon_path: String,
}

impl CrmMonParser {
    pub fn new(crm_mon_path: &str) -> Self {
        Self {
            crm_mon_path: crm_mon_path.to_string(),
        }
    }

    pub fn parse(&self) -> Result<Root, CollectError> {
        let raw = tool::stdout(&self.crm_mon_path, &["-X", "--group-by-node", "--inactive"])?;
        from_xml(&raw)
    }
}
