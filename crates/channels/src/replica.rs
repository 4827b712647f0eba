use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::Error;

/// The kind of storage a replica provides.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
pub enum ReplicaKind {
    /// A replica of bit-archive workers coordinated by a monitor.
    BitArchive,

    /// A replica that only keeps checksums.
    Checksum,
}

impl fmt::Display for ReplicaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BitArchive => write!(f, "bitarchive"),
            Self::Checksum => write!(f, "checksum"),
        }
    }
}

impl FromStr for ReplicaKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "bitarchive" | "bit_archive" | "ba" => Ok(Self::BitArchive),
            "checksum" | "cs" => Ok(Self::Checksum),
            other => Err(Error::ArgumentNotValid(format!(
                "unknown replica kind '{other}'"
            ))),
        }
    }
}

/// A named archive location taking part in channel naming.
#[derive(Clone, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
pub struct Replica {
    id: String,
    kind: ReplicaKind,
}

impl Replica {
    /// Creates a replica description.
    pub fn new(id: impl Into<String>, kind: ReplicaKind) -> Self {
        Self {
            id: id.into(),
            kind,
        }
    }

    /// Shorthand for a bit-archive replica.
    pub fn bit_archive(id: impl Into<String>) -> Self {
        Self::new(id, ReplicaKind::BitArchive)
    }

    /// Shorthand for a checksum replica.
    pub fn checksum(id: impl Into<String>) -> Self {
        Self::new(id, ReplicaKind::Checksum)
    }

    /// The replica identifier used as channel location.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// The kind of replica.
    #[must_use]
    pub const fn kind(&self) -> ReplicaKind {
        self.kind
    }
}

/// Parses `ID=kind`, e.g. `ONE=bitarchive`.
impl FromStr for Replica {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (id, kind) = s.split_once('=').ok_or_else(|| {
            Error::ArgumentNotValid(format!("replica '{s}' is not of the form ID=kind"))
        })?;

        let id = id.trim();
        if id.is_empty() {
            return Err(Error::ArgumentNotValid("empty replica id".to_string()));
        }

        Ok(Self::new(id, kind.trim().parse()?))
    }
}
