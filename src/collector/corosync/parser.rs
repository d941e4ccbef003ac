// src/collector/corosync/parser.rs
//! Parser for `corosync-cfgtool -s` and `corosync-quorumtool -p` output.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;

use crate::error::ParseError;

static NODE_ID_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)Node ID:\s+(\w+)").expect("valid node id regex"));

// corosync 2.x prints `Ring ID: 1084780051/44`, corosync 3.x `Ring ID: 1084780051.44`
static RING_ID_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)Ring ID:\s+(\w+)([/.])(\d+)").expect("valid ring id regex"));

static QUORATE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)Quorate:[ \t]*(\S*)").expect("valid quorate regex"));

static QUORUM_VOTES_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?m)Expected votes:\s+(\d+)\s+Highest expected:\s+(\d+)\s+Total votes:\s+(\d+)\s+Quorum:\s+(\d+)",
    )
    .expect("valid quorum votes regex")
});

// corosync 2.x prints `RING ID 0` / `id = ...`, corosync 3.x `Link ID 0` / `addr = ...`
static RING_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?m)(?:RING|Link) ID (?P<number>\d+)\s+(?:id|addr)\s*= (?P<address>.+)\s+status\s*= (?P<status>.+)",
    )
    .expect("valid ring regex")
});

static MEMBERSHIP_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?m)Membership information\n-+\s+Nodeid\s+Votes\s+(?P<qdevice>Qdevice\s+)?Name[ \t]*\n(?P<table>(?:.*\n?)*)",
    )
    .expect("valid membership regex")
});

static MEMBER_QDEVICE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^\s*(?P<node_id>\w+)\s+(?P<votes>\d+)\s+(?:(?P<qdevice>(?:\w,?)+)\s+)?(?P<name>[^\s(]\S*)(?:\s+(?P<local>\(local\)))?\s*$",
    )
    .expect("valid member regex")
});

static MEMBER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^\s*(?P<node_id>\w+)\s+(?P<votes>\d+)\s+(?P<name>\S+)(?:\s+(?P<local>\(local\)))?\s*$",
    )
    .expect("valid member regex")
});

/// Snapshot of the local corosync node, built fresh on every scrape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Status {
    pub node_id: String,
    pub ring_id: RingId,
    pub quorate: bool,
    pub rings: Vec<Ring>,
    pub quorum_votes: QuorumVotes,
    pub members: Vec<Member>,
}

/// Ring (membership) id: representative node id and sequence number,
/// displayed with the separator corosync printed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RingId {
    pub node_id: String,
    pub separator: char,
    pub sequence: u64,
}

impl fmt::Display for RingId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.node_id, self.separator, self.sequence)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QuorumVotes {
    pub expected_votes: u64,
    pub highest_expected: u64,
    pub total_votes: u64,
    pub quorum: u64,
}

/// One network ring (link). Ring numbers are not guaranteed to be unique.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ring {
    pub number: String,
    pub address: String,
    pub faulty: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Member {
    pub id: String,
    pub name: String,
    pub qdevice: String,
    pub votes: u64,
    pub local: bool,
}

/// Function to parse the output of both corosync tools into a [`Status`].
pub fn parse(cfgtool_output: &[u8], quorumtool_output: &[u8]) -> Result<Status, ParseError> {
    let cfgtool = String::from_utf8_lossy(cfgtool_output);
    let quorumtool = String::from_utf8_lossy(quorumtool_output);

    Ok(Status {
        node_id: parse_node_id(&quorumtool)?,
        ring_id: parse_ring_id(&quorumtool)?,
        quorate: parse_quorate(&quorumtool)?,
        quorum_votes: parse_quorum_votes(&quorumtool)?,
        members: parse_members(&quorumtool)?,
        rings: parse_rings(&cfgtool),
    })
}

fn parse_u64(field: &'static str, value: &str) -> Result<u64, ParseError> {
    value.parse().map_err(|_| ParseError::InvalidNumber {
        field,
        value: value.to_string(),
    })
}

pub(crate) fn parse_node_id(output: &str) -> Result<String, ParseError> {
    NODE_ID_RE
        .captures(output)
        .map(|caps| caps[1].to_string())
        .ok_or(ParseError::MissingField("NodeId"))
}

pub(crate) fn parse_ring_id(output: &str) -> Result<RingId, ParseError> {
    let caps = RING_ID_RE
        .captures(output)
        .ok_or(ParseError::MissingField("RingId"))?;

    Ok(RingId {
        node_id: caps[1].to_string(),
        separator: if &caps[2] == "." { '.' } else { '/' },
        sequence: parse_u64("RingId", &caps[3])?,
    })
}

/// Anything other than `Yes` counts as not quorate; only a missing line is an error.
pub(crate) fn parse_quorate(output: &str) -> Result<bool, ParseError> {
    QUORATE_RE
        .captures(output)
        .map(|caps| &caps[1] == "Yes")
        .ok_or(ParseError::MissingField("Quorate"))
}

pub(crate) fn parse_quorum_votes(output: &str) -> Result<QuorumVotes, ParseError> {
    let caps = QUORUM_VOTES_RE
        .captures(output)
        .ok_or(ParseError::MissingField("QuorumVotes"))?;

    Ok(QuorumVotes {
        expected_votes: parse_u64("ExpectedVotes", &caps[1])?,
        highest_expected: parse_u64("HighestExpected", &caps[2])?,
        total_votes: parse_u64("TotalVotes", &caps[3])?,
        quorum: parse_u64("Quorum", &caps[4])?,
    })
}

/// Every ring block becomes one entry, in order, duplicates included.
pub(crate) fn parse_rings(output: &str) -> Vec<Ring> {
    RING_RE
        .captures_iter(output)
        .map(|caps| Ring {
            number: caps["number"].to_string(),
            address: caps["address"].trim().to_string(),
            faulty: caps["status"].contains("FAULTY"),
        })
        .collect()
}

/// Older corosync releases print no membership table, which yields no members.
pub(crate) fn parse_members(output: &str) -> Result<Vec<Member>, ParseError> {
    let Some(section) = MEMBERSHIP_RE.captures(output) else {
        return Ok(Vec::new());
    };

    let line_re: &Regex = if section.name("qdevice").is_some() {
        &MEMBER_QDEVICE_RE
    } else {
        &MEMBER_RE
    };

    let mut members = Vec::new();
    for line in section["table"].lines() {
        if line.trim().is_empty() {
            continue;
        }
        let Some(caps) = line_re.captures(line) else {
            continue;
        };

        members.push(Member {
            id: caps["node_id"].to_string(),
            name: caps["name"].to_string(),
            qdevice: caps
                .name("qdevice")
                .map(|m| m.as_str().to_string())
                .unwrap_or_default(),
            votes: parse_u64("Votes", &caps["votes"])?,
            local: caps.name("local").is_some(),
        });
    }

    Ok(members)
}
