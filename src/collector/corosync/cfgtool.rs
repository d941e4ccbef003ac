// src/collector/corosync/cfgtool.rs
//! Legacy parser reading node id and rings from a single `corosync-cfgtool -s` output.

use std::sync::LazyLock;

use regex::Regex;

use super::parser::Ring;
use crate::error::ParseError;

static LOCAL_NODE_ID_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)Local node ID (.+)").expect("valid local node id regex"));

static RING_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)RING ID (?P<id>\d+)\s+id\s*= (?P<address>.+)\s+status\s*= (?P<status>.+)")
        .expect("valid ring regex")
});

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Status {
    pub node_id: String,
    pub rings: Vec<Ring>,
}

/// Function to parse the legacy combined cfgtool output.
pub fn parse(raw_status: &[u8]) -> Result<Status, ParseError> {
    let raw = String::from_utf8_lossy(raw_status);

    let node_id = LOCAL_NODE_ID_RE
        .captures(&raw)
        .map(|caps| caps[1].trim().to_string())
        .ok_or(ParseError::MissingField("NodeId"))?;

    let rings = RING_RE
        .captures_iter(&raw)
        .map(|caps| Ring {
            number: caps["id"].to_string(),
            address: caps["address"].trim().to_string(),
            faulty: caps["status"].contains("FAULTY"),
        })
        .collect();

    Ok(Status { node_id, rings })
}
