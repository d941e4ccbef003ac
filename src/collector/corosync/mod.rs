// src/collector/corosync/mod.rs
//! Corosync ring, quorum and membership metrics.

pub mod cfgtool;
pub mod parser;

use tracing::{Span, debug, info_span};

use super::{Collector, Descriptor, Metric, bool_value, tool};
use crate::error::{CollectError, SetupError};

pub use parser::{Member, QuorumVotes, Ring, RingId, Status, parse};

pub const SUBSYSTEM: &str = "corosync";

pub static QUORATE: Descriptor = Descriptor::gauge(
    SUBSYSTEM,
    "quorate",
    "Whether or not the cluster is quorate",
    &[],
);

pub static RINGS: Descriptor = Descriptor::gauge(
    SUBSYSTEM,
    "rings",
    "The status of each Corosync ring; 1 means healthy, 0 means faulty.",
    &["ring_id", "node_id", "number", "address"],
);

pub static RING_ERRORS: Descriptor = Descriptor::gauge(
    SUBSYSTEM,
    "ring_errors",
    "The total number of faulty corosync rings",
    &[],
);

pub static MEMBER_VOTES: Descriptor = Descriptor::gauge(
    SUBSYSTEM,
    "member_votes",
    "How many votes each member node has contributed with to the current quorum",
    &["node_id", "node", "local"],
);

pub static QUORUM_VOTES: Descriptor = Descriptor::gauge(
    SUBSYSTEM,
    "quorum_votes",
    "Cluster quorum votes; one line per type",
    &["type"],
);

static DESCRIPTORS: &[&Descriptor] = &[&QUORATE, &RINGS, &RING_ERRORS, &MEMBER_VOTES, &QUORUM_VOTES];

pub struct CorosyncCollector {
    cfgtool_path: String,
    quorumtool_path: String,
    span: Span,
}

impl CorosyncCollector {
    pub fn new(cfgtool_path: &str, quorumtool_path: &str) -> Result<Self, SetupError> {
        tool::check_executables(&[cfgtool_path, quorumtool_path])
            .map_err(|e| SetupError::for_collector(SUBSYSTEM, e))?;

        Ok(Self {
            cfgtool_path: cfgtool_path.to_string(),
            quorumtool_path: quorumtool_path.to_string(),
            span: info_span!("collector", subsystem = SUBSYSTEM),
        })
    }
}

impl Collector for CorosyncCollector {
    fn subsystem(&self) -> &'static str {
        SUBSYSTEM
    }

    fn descriptors(&self) -> &'static [&'static Descriptor] {
        DESCRIPTORS
    }

    fn collect_into(&self, metrics: &mut Vec<Metric>) -> Result<(), CollectError> {
        let _guard = self.span.enter();
        debug!("Collecting corosync metrics...");

        // both tools exit with 1 when a ring is faulty, the output is still valid
        let cfgtool_output = tool::stdout_ignoring_status(&self.cfgtool_path, &["-s"])?;
        let quorumtool_output = tool::stdout_ignoring_status(&self.quorumtool_path, &["-p"])?;

        let status = parse(&cfgtool_output, &quorumtool_output).map_err(|source| {
            CollectError::Parse {
                tool: SUBSYSTEM,
                source,
            }
        })?;

        metrics.extend(project(&status));
        Ok(())
    }
}

/// Function to flatten a corosync [`Status`] into metric observations.
pub fn project(status: &Status) -> Vec<Metric> {
    let mut metrics = Vec::new();
    let ring_id = status.ring_id.to_string();

    for ring in &status.rings {
        metrics.push(Metric::new(
            &RINGS,
            bool_value(!ring.faulty),
            [
                ring_id.as_str(),
                status.node_id.as_str(),
                ring.number.as_str(),
                ring.address.as_str(),
            ],
        ));
    }

    let ring_errors = status.rings.iter().filter(|ring| ring.faulty).count();
    metrics.push(Metric::unlabeled(&RING_ERRORS, ring_errors as f64));

    metrics.push(Metric::unlabeled(&QUORATE, bool_value(status.quorate)));

    let votes = &status.quorum_votes;
    for (kind, value) in [
        ("expected_votes", votes.expected_votes),
        ("highest_expected", votes.highest_expected),
        ("total_votes", votes.total_votes),
        ("quorum", votes.quorum),
    ] {
        metrics.push(Metric::new(&QUORUM_VOTES, value as f64, [kind]));
    }

    for member in &status.members {
        metrics.push(Metric::new(
            &MEMBER_VOTES,
            member.votes as f64,
            [
                member.id.as_str(),
                member.name.as_str(),
                if member.local { "true" } else { "false" },
            ],
        ));
    }

    metrics
}
