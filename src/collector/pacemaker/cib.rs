// src/collector/pacemaker/cib.rs
//! Cluster Information Base as returned by `cibadmin --query --local`.
//!
//! Only the `configuration` section is decoded; the `status` section is
//! covered by crm_mon.

use serde::Deserialize;

use crate::collector::tool;
use crate::error::CollectError;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Root {
    pub configuration: Configuration,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Configuration {
    pub crm_config: CrmConfig,
    pub nodes: Nodes,
    pub resources: Resources,
    pub constraints: Constraints,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CrmConfig {
    #[serde(rename = "cluster_property_set")]
    pub property_sets: Vec<Attributes>,
}

impl CrmConfig {
    /// Every cluster property across all property sets, in document order.
    pub fn properties(&self) -> impl Iterator<Item = &Attribute> {
        nvpairs(&self.property_sets)
    }
}

fn nvpairs(sets: &[Attributes]) -> impl Iterator<Item = &Attribute> {
    sets.iter().flat_map(|set| set.nvpairs.iter())
}

/// An `instance_attributes`, `meta_attributes` or `cluster_property_set` block.
/// Elements may carry several of these, e.g. one per rule.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Attributes {
    #[serde(rename = "@id")]
    pub id: String,
    #[serde(rename = "nvpair")]
    pub nvpairs: Vec<Attribute>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Attribute {
    #[serde(rename = "@id")]
    pub id: String,
    #[serde(rename = "@name")]
    pub name: String,
    #[serde(rename = "@value")]
    pub value: String,
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
    #[serde(rename = "@id")]
    pub id: String,
    #[serde(rename = "@uname")]
    pub uname: String,
    #[serde(rename = "instance_attributes")]
    pub instance_attribute_sets: Vec<Attributes>,
}

impl Node {
    pub fn instance_attributes(&self) -> impl Iterator<Item = &Attribute> {
        nvpairs(&self.instance_attribute_sets)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Resources {
    #[serde(rename = "primitive")]
    pub primitives: Vec<Primitive>,
    #[serde(rename = "master")]
    pub masters: Vec<CloneResource>,
    #[serde(rename = "clone")]
    pub clones: Vec<CloneResource>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Primitive {
    #[serde(rename = "@id")]
    pub id: String,
    #[serde(rename = "@class")]
    pub class: String,
    #[serde(rename = "@type")]
    pub primitive_type: String,
    #[serde(rename = "@provider")]
    pub provider: String,
    #[serde(rename = "instance_attributes")]
    pub instance_attribute_sets: Vec<Attributes>,
    #[serde(rename = "meta_attributes")]
    pub meta_attribute_sets: Vec<Attributes>,
    pub operations: Operations,
}

impl Primitive {
    pub fn instance_attributes(&self) -> impl Iterator<Item = &Attribute> {
        nvpairs(&self.instance_attribute_sets)
    }

    pub fn meta_attributes(&self) -> impl Iterator<Item = &Attribute> {
        nvpairs(&self.meta_attribute_sets)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Operations {
    #[serde(rename = "op")]
    pub ops: Vec<Operation>,
}

/// Interval and timeout are kept verbatim; pacemaker accepts both `10` and `10s`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Operation {
    #[serde(rename = "@id")]
    pub id: String,
    #[serde(rename = "@name")]
    pub name: String,
    #[serde(rename = "@role")]
    pub role: String,
    #[serde(rename = "@interval")]
    pub interval: String,
    #[serde(rename = "@timeout")]
    pub timeout: String,
}

/// A `clone` or legacy `master` wrapper around a single primitive.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CloneResource {
    #[serde(rename = "@id")]
    pub id: String,
    #[serde(rename = "meta_attributes")]
    pub meta_attribute_sets: Vec<Attributes>,
    pub primitive: Primitive,
}

impl CloneResource {
    pub fn meta_attributes(&self) -> impl Iterator<Item = &Attribute> {
        nvpairs(&self.meta_attribute_sets)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Constraints {
    #[serde(rename = "rsc_location")]
    pub locations: Vec<LocationConstraint>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct LocationConstraint {
    #[serde(rename = "@id")]
    pub id: String,
    #[serde(rename = "@node")]
    pub node: String,
    #[serde(rename = "@rsc")]
    pub resource: String,
    #[serde(rename = "@role")]
    pub role: String,
    /// Raw score, an integer or `INFINITY`/`-INFINITY`.
    #[serde(rename = "@score")]
    pub score: String,
}

/// Function to decode a CIB XML document.
pub fn from_xml(raw: &[u8]) -> Result<Root, CollectError> {
    let text = std::str::from_utf8(raw).map_err(|e| CollectError::Decode {
        tool: "cibadmin",
        reason: e.to_string(),
    })?;

    quick_xml::de::from_str(text).map_err(|e| CollectError::Decode {
        tool: "cibadmin",
        reason: e.to_string(),
    })
}

#[derive(Debug, Clone)]
pub struct CibAdminParser {
    cibadmin_path: String,
}

impl CibAdminParser {
    pub fn new(cibadmin_path: &str) -> Self {
        Self {
            cibadmin_path: cibadmin_path.to_string(),
        }
    }

    pub fn parse(&self) -> Result<Root, CollectError> {
        let raw = tool::stdout(&self.cibadmin_path, &["--query", "--local"])?;
        from_xml(&raw)
    }
}
