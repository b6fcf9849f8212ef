//! Operation counter enumerations used by the statistics endpoints.
//!
//! The daemon reports per-client and per-user operation counters for
//! metadata and storage servers. Each counter is identified by a numeric id;
//! id 0 is always the sum of all operations. The name tables below must stay
//! in the server's enum order, new counters are appended at the end.

use std::fmt;
use std::str::FromStr;

/// Short names of the metadata server operation counters, indexed by id.
pub const META_OPS: &[&str] = &[
    "sum", "ack", "close", "entInf", "nodeInf", "fndOwn", "lnk", "mkdir", "create", "rddir",
    "refrEnt", "mdsInf", "rmdir", "rmLnk", "mvDirIns", "mvFiIns", "open", "ren", "sChDrct",
    "sAttr", "sDirPat", "stat", "statfs", "trunc", "symlnk", "unlnk", "lookLI", "statLI",
    "revalLI", "openLI", "createLI", "mirrorMD", "hardlnk", "flckAp", "flckEn", "flckRg",
    "dirparent", "listXA", "getXA", "rmXA", "setXA",
];

/// Short names of the storage server operation counters, indexed by id.
pub const STORAGE_OPS: &[&str] = &[
    "sum", "ack", "sChDrct", "getFSize", "sAttr", "statfs", "trunc", "close", "fsync", "open",
    "ops-rd", "B-rd", "ops-wr", "B-wr", "gendbg", "hrtbeat", "remNode", "nodeInf", "storInf",
    "unlnk",
];

/// The family of operation counters a statistics table is built from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum OpFamily {
    Metadata,
    Storage,
}

impl OpFamily {
    /// Counter names of this family, indexed by counter id.
    pub fn op_names(&self) -> &'static [&'static str] {
        match self {
            OpFamily::Metadata => META_OPS,
            OpFamily::Storage => STORAGE_OPS,
        }
    }

    /// Number of known counters.
    pub fn op_count(&self) -> usize {
        self.op_names().len()
    }

    /// Number of table columns: the row label plus one column per counter.
    pub fn column_count(&self) -> usize {
        self.op_count() + 1
    }

    /// Name of the counter with the given id.
    pub fn op_name(&self, id: usize) -> Option<&'static str> {
        self.op_names().get(id).copied()
    }

    /// Id of the counter with the given name.
    pub fn op_id(&self, name: &str) -> Option<usize> {
        self.op_names().iter().position(|op| *op == name)
    }
}

/// The four statistics views offered by the daemon.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum StatsKind {
    ClientMetadata,
    UserMetadata,
    ClientStorage,
    UserStorage,
}

impl StatsKind {
    /// All statistics kinds.
    pub const ALL: [StatsKind; 4] = [
        StatsKind::ClientMetadata,
        StatsKind::UserMetadata,
        StatsKind::ClientStorage,
        StatsKind::UserStorage,
    ];

    /// The operation family whose counters make up the table columns.
    pub fn family(&self) -> OpFamily {
        match self {
            StatsKind::ClientMetadata | StatsKind::UserMetadata => OpFamily::Metadata,
            StatsKind::ClientStorage | StatsKind::UserStorage => OpFamily::Storage,
        }
    }

    /// Endpoint serving this kind of statistics.
    pub fn endpoint(&self) -> &'static str {
        match self {
            StatsKind::ClientMetadata | StatsKind::ClientStorage => "XML_ClientStats",
            StatsKind::UserMetadata | StatsKind::UserStorage => "XML_UserStats",
        }
    }

    /// Numeric node type sent as the `nodetype` request parameter.
    pub fn node_type(&self) -> u8 {
        match self.family() {
            OpFamily::Metadata => 1,
            OpFamily::Storage => 2,
        }
    }

    /// Short label used on the command line.
    pub fn label(&self) -> &'static str {
        match self {
            StatsKind::ClientMetadata => "client-meta",
            StatsKind::UserMetadata => "user-meta",
            StatsKind::ClientStorage => "client-storage",
            StatsKind::UserStorage => "user-storage",
        }
    }
}

impl fmt::Display for StatsKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Error returned when parsing an unknown statistics kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownStatsKind(pub String);

impl fmt::Display for UnknownStatsKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown statistics kind: {}", self.0)
    }
}

impl std::error::Error for UnknownStatsKind {}

impl FromStr for StatsKind {
    type Err = UnknownStatsKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        StatsKind::ALL
            .into_iter()
            .find(|kind| kind.label() == s)
            .ok_or_else(|| UnknownStatsKind(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_family_sizes() {
        assert_eq!(OpFamily::Metadata.op_count(), 41);
        assert_eq!(OpFamily::Storage.op_count(), 20);
        assert_eq!(OpFamily::Storage.column_count(), 21);
    }

    #[test]
    fn test_op_lookup() {
        assert_eq!(OpFamily::Metadata.op_name(0), Some("sum"));
        assert_eq!(OpFamily::Metadata.op_name(40), Some("setXA"));
        assert_eq!(OpFamily::Metadata.op_name(41), None);
        assert_eq!(OpFamily::Storage.op_id("ops-wr"), Some(12));
        assert_eq!(OpFamily::Storage.op_id("mkdir"), None);
    }

    #[test]
    fn test_stats_kind_mapping() {
        assert_eq!(StatsKind::UserMetadata.family(), OpFamily::Metadata);
        assert_eq!(StatsKind::ClientStorage.endpoint(), "XML_ClientStats");
        assert_eq!(StatsKind::UserStorage.endpoint(), "XML_UserStats");
        assert_eq!(StatsKind::ClientStorage.node_type(), 2);
    }

    #[test]
    fn test_stats_kind_from_str() {
        for kind in StatsKind::ALL {
            assert_eq!(kind.label().parse::<StatsKind>(), Ok(kind));
        }
        assert!("bogus".parse::<StatsKind>().is_err());
    }
}
