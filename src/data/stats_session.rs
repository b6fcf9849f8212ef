//! Client and user statistics sessions.
//!
//! The statistics endpoints are stateful on the daemon side. A client
//! registers as a requestor (interval, number of lines, node type) and then
//! asks for data sequence ids in order; the daemon answers with the id of
//! its newest table and includes the table only when it is at least the
//! requested one.

use admon_types::{StatTable, StatsKind};
use tracing::{debug, trace};

use crate::source::{DaemonAddress, Document, Poller, RequestDescriptor};

/// The first sequence id that carries data.
pub const FIRST_DATA_SEQUENCE_ID: u64 = 2;

/// Default aggregation interval in seconds.
pub const DEFAULT_STATS_INTERVAL: u32 = 10;

/// Default number of host lines.
pub const DEFAULT_NUM_LINES: u32 = 10;

/// Label shown while the daemon has not produced a first table.
pub const WAITING_LABEL: &str = "waiting for data ...";

/// What a statistics response means for the view.
#[derive(Debug, Clone, PartialEq)]
pub enum StatsProgress {
    /// The daemon has not finished its first interval.
    Waiting,
    /// A table newer than the last one shown.
    Fresh(StatTable),
    /// Nothing new; keep showing the previous table.
    Unchanged,
}

/// Requestor state of one statistics view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatsSession {
    kind: StatsKind,
    interval_secs: u32,
    num_lines: u32,
    requestor_id: u32,
    next_sequence_id: u64,
}

impl StatsSession {
    pub fn new(kind: StatsKind) -> Self {
        Self {
            kind,
            interval_secs: DEFAULT_STATS_INTERVAL,
            num_lines: DEFAULT_NUM_LINES,
            requestor_id: 0,
            next_sequence_id: FIRST_DATA_SEQUENCE_ID,
        }
    }

    pub fn kind(&self) -> StatsKind {
        self.kind
    }

    pub fn interval_secs(&self) -> u32 {
        self.interval_secs
    }

    pub fn num_lines(&self) -> u32 {
        self.num_lines
    }

    pub fn requestor_id(&self) -> u32 {
        self.requestor_id
    }

    pub fn next_sequence_id(&self) -> u64 {
        self.next_sequence_id
    }

    /// Change the aggregation interval. The daemon restarts the sequence.
    pub fn set_interval(&mut self, secs: u32) {
        if secs != self.interval_secs {
            self.interval_secs = secs;
            self.next_sequence_id = FIRST_DATA_SEQUENCE_ID;
        }
    }

    /// Change the number of host lines. The daemon restarts the sequence.
    pub fn set_num_lines(&mut self, lines: u32) {
        if lines != self.num_lines {
            self.num_lines = lines;
            self.next_sequence_id = FIRST_DATA_SEQUENCE_ID;
        }
    }

    /// Request parameters for the next poll.
    pub fn params(&self) -> [(&'static str, String); 5] {
        [
            ("nodetype", self.kind.node_type().to_string()),
            ("interval", self.interval_secs.to_string()),
            ("numLines", self.num_lines.to_string()),
            ("requestorID", self.requestor_id.to_string()),
            ("nextDataSequenceID", self.next_sequence_id.to_string()),
        ]
    }

    /// A request for the next poll.
    pub fn request(&self, address: &DaemonAddress) -> RequestDescriptor {
        self.params()
            .into_iter()
            .fold(address.request(self.kind.endpoint()), |request, (key, value)| {
                request.with_param(key, value)
            })
    }

    /// Write the parameters for the next poll into a poller.
    pub fn apply(&self, poller: &Poller) {
        for (key, value) in self.params() {
            poller.set_param(key, value);
        }
    }

    /// Classify a response and advance the sequence.
    pub fn observe(&mut self, document: &Document) -> StatsProgress {
        let Ok(requestor_id) = document.scalar("requestorID").trim().parse::<u32>() else {
            trace!(kind = %self.kind, "statistics response without requestor id");
            return StatsProgress::Unchanged;
        };
        if requestor_id != self.requestor_id {
            debug!(kind = %self.kind, requestor_id, "registered as new requestor");
            self.requestor_id = requestor_id;
            self.next_sequence_id = FIRST_DATA_SEQUENCE_ID;
        }

        let Ok(received) = document.scalar("dataSequenceID").trim().parse::<u64>() else {
            trace!(kind = %self.kind, "statistics response without sequence id");
            return StatsProgress::Unchanged;
        };

        if received < FIRST_DATA_SEQUENCE_ID {
            StatsProgress::Waiting
        } else if received >= self.next_sequence_id {
            self.next_sequence_id += 1;
            StatsProgress::Fresh(document.stat_table(self.kind))
        } else {
            StatsProgress::Unchanged
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use admon_types::SUM_LABEL;

    fn response(requestor: u32, sequence: u64) -> Document {
        let xml = format!(
            r#"<data><requestorID>{requestor}</requestorID><dataSequenceID>{sequence}</dataSequenceID><sum><op id="0">9</op></sum><hosts/></data>"#
        );
        Document::parse(xml.as_bytes()).unwrap()
    }

    #[test]
    fn test_initial_params() {
        let session = StatsSession::new(StatsKind::ClientStorage);
        let request = session.request(&DaemonAddress::new("h", 1));

        assert_eq!(request.url(), "http://h:1/XML_ClientStats");
        assert_eq!(request.param("nodetype"), Some("2"));
        assert_eq!(request.param("interval"), Some("10"));
        assert_eq!(request.param("numLines"), Some("10"));
        assert_eq!(request.param("requestorID"), Some("0"));
        assert_eq!(request.param("nextDataSequenceID"), Some("2"));
    }

    #[test]
    fn test_waiting_for_first_table() {
        let mut session = StatsSession::new(StatsKind::ClientMetadata);
        assert_eq!(session.observe(&response(5, 1)), StatsProgress::Waiting);
        assert_eq!(session.requestor_id(), 5);
        assert_eq!(session.next_sequence_id(), FIRST_DATA_SEQUENCE_ID);
    }

    #[test]
    fn test_fresh_then_unchanged() {
        let mut session = StatsSession::new(StatsKind::UserStorage);
        session.observe(&response(5, 1));

        match session.observe(&response(5, 2)) {
            StatsProgress::Fresh(table) => assert_eq!(table.cell(0, 0), Some(SUM_LABEL)),
            other => panic!("expected a table, got {:?}", other),
        }
        assert_eq!(session.next_sequence_id(), 3);
        assert_eq!(session.observe(&response(5, 2)), StatsProgress::Unchanged);
        assert!(matches!(session.observe(&response(5, 4)), StatsProgress::Fresh(_)));
        assert_eq!(session.next_sequence_id(), 4);
    }

    #[test]
    fn test_new_requestor_resets_sequence() {
        let mut session = StatsSession::new(StatsKind::ClientStorage);
        session.observe(&response(5, 2));
        session.observe(&response(5, 3));
        assert_eq!(session.next_sequence_id(), 4);

        assert!(matches!(session.observe(&response(9, 2)), StatsProgress::Fresh(_)));
        assert_eq!(session.requestor_id(), 9);
        assert_eq!(session.next_sequence_id(), 3);
    }

    #[test]
    fn test_settings_change_resets_sequence() {
        let mut session = StatsSession::new(StatsKind::ClientStorage);
        session.observe(&response(5, 2));
        session.set_interval(10);
        assert_eq!(session.next_sequence_id(), 3);

        session.set_num_lines(20);
        assert_eq!(session.next_sequence_id(), FIRST_DATA_SEQUENCE_ID);
        assert_eq!(session.params()[2], ("numLines", "20".to_string()));
    }

    #[test]
    fn test_malformed_response_is_unchanged() {
        let mut session = StatsSession::new(StatsKind::ClientStorage);
        let doc = Document::parse(b"<data><requestorID>x</requestorID></data>").unwrap();
        assert_eq!(session.observe(&doc), StatsProgress::Unchanged);
        assert_eq!(session.requestor_id(), 0);
    }

    #[test]
    fn test_apply_sets_poller_params() {
        let poller = Poller::new(RequestDescriptor::new("http://h:1/XML_UserStats"));
        let session = StatsSession::new(StatsKind::UserMetadata);
        session.apply(&poller);

        let request = poller.request();
        assert_eq!(request.param("nodetype"), Some("1"));
        assert_eq!(request.params().len(), 5);
    }
}
