use crate::error::Error;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};
use std::str::FromStr;

/// Server flavor, decides GTID representation and pre-flight checks.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Flavor {
    MySQL,
    MariaDB,
}

impl Flavor {
    pub fn from_version(version: &str) -> Self {
        match version.to_ascii_lowercase().contains("maria") {
            true => Flavor::MariaDB,
            false => Flavor::MySQL,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Gtid {
    MySQL {
        sid: [u8; 16],
        gno: u64,
    },
    MariaDB {
        domain_id: u32,
        server_id: u32,
        sequence: u64,
    },
}

/// Executed GTID set, intervals are half-open `[start, end)`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MySQLGtidSet {
    sets: BTreeMap<[u8; 16], Vec<(u64, u64)>>,
}

/// Last sequence per replication domain.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MariaDBGtidSet {
    domains: BTreeMap<u32, (u32, u64)>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GtidSet {
    MySQL(MySQLGtidSet),
    MariaDB(MariaDBGtidSet),
}

impl GtidSet {
    pub fn parse(flavor: Flavor, value: &str) -> Result<Self, Error> {
        Ok(match flavor {
            Flavor::MySQL => GtidSet::MySQL(value.parse()?),
            Flavor::MariaDB => GtidSet::MariaDB(value.parse()?),
        })
    }

    pub fn flavor(&self) -> Flavor {
        match self {
            GtidSet::MySQL(_) => Flavor::MySQL,
            GtidSet::MariaDB(_) => Flavor::MariaDB,
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            GtidSet::MySQL(set) => set.sets.is_empty(),
            GtidSet::MariaDB(set) => set.domains.is_empty(),
        }
    }

    /// Returns false when the GTID belongs to the other flavor or its number cannot be tracked.
    pub fn update(&mut self, gtid: &Gtid) -> bool {
        match (self, gtid) {
            (GtidSet::MySQL(set), Gtid::MySQL { sid, gno }) => match gno.checked_add(1) {
                Some(end) => {
                    set.add_interval(*sid, *gno, end);
                    true
                }
                None => false,
            },
            (
                GtidSet::MariaDB(set),
                Gtid::MariaDB {
                    domain_id,
                    server_id,
                    sequence,
                },
            ) => {
                set.domains.insert(*domain_id, (*server_id, *sequence));
                true
            }
            _ => false,
        }
    }
}

impl Display for GtidSet {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            GtidSet::MySQL(set) => set.fmt(f),
            GtidSet::MariaDB(set) => set.fmt(f),
        }
    }
}

impl MySQLGtidSet {
    pub fn add_interval(&mut self, sid: [u8; 16], start: u64, end: u64) {
        let intervals = self.sets.entry(sid).or_default();
        intervals.push((start, end));
        intervals.sort_unstable();

        let mut merged: Vec<(u64, u64)> = Vec::with_capacity(intervals.len());
        for (start, end) in intervals.drain(..) {
            match merged.last_mut() {
                Some(last) if start <= last.1 => last.1 = last.1.max(end),
                _ => merged.push((start, end)),
            }
        }

        *intervals = merged;
    }

    pub fn intervals(&self) -> impl Iterator<Item = (&[u8; 16], &[(u64, u64)])> {
        self.sets
            .iter()
            .map(|(sid, intervals)| (sid, intervals.as_slice()))
    }
}

fn parse_sid(value: &str) -> Result<[u8; 16], Error> {
    let bytes = hex::decode(value.trim().replace('-', ""))
        .map_err(|_| Error::InvalidGtidSet(value.to_owned()))?;

    bytes
        .try_into()
        .map_err(|_| Error::InvalidGtidSet(value.to_owned()))
}

fn format_sid(sid: &[u8; 16]) -> String {
    let hex = hex::encode(sid);
    format!(
        "{}-{}-{}-{}-{}",
        &hex[0..8],
        &hex[8..12],
        &hex[12..16],
        &hex[16..20],
        &hex[20..32]
    )
}

impl FromStr for MySQLGtidSet {
    type Err = Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let mut set = MySQLGtidSet::default();
        let invalid = || Error::InvalidGtidSet(value.to_owned());

        for part in value.split(',').map(str::trim).filter(|part| !part.is_empty()) {
            let mut pieces = part.split(':');
            let sid = parse_sid(pieces.next().ok_or_else(invalid)?)?;

            for interval in pieces {
                let (start, end) = match interval.split_once('-') {
                    Some((start, end)) => (start.trim().parse(), end.trim().parse()),
                    None => (interval.trim().parse(), interval.trim().parse()),
                };

                match (start, end) {
                    (Ok(start), Ok(end)) if start <= end => {
                        set.add_interval(sid, start, end.checked_add(1).ok_or_else(invalid)?)
                    }
                    _ => return Err(invalid()),
                }
            }
        }

        Ok(set)
    }
}

impl Display for MySQLGtidSet {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        for (index, (sid, intervals)) in self.sets.iter().enumerate() {
            if index > 0 {
                f.write_str(",")?;
            }

            f.write_str(&format_sid(sid))?;

            for (start, end) in intervals {
                match end - 1 == *start {
                    true => write!(f, ":{start}")?,
                    false => write!(f, ":{start}-{}", end - 1)?,
                }
            }
        }

        Ok(())
    }
}

impl FromStr for MariaDBGtidSet {
    type Err = Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let mut set = MariaDBGtidSet::default();

        for part in value.split(',').map(str::trim).filter(|part| !part.is_empty()) {
            let numbers: Vec<&str> = part.split('-').collect();
            let parsed = match numbers.as_slice() {
                [domain, server, sequence] => {
                    (domain.parse(), server.parse(), sequence.parse::<u64>())
                }
                _ => return Err(Error::InvalidGtidSet(value.to_owned())),
            };

            match parsed {
                (Ok(domain), Ok(server), Ok(sequence)) => {
                    set.domains.insert(domain, (server, sequence));
                }
                _ => return Err(Error::InvalidGtidSet(value.to_owned())),
            }
        }

        Ok(set)
    }
}

impl Display for MariaDBGtidSet {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        for (index, (domain, (server, sequence))) in self.domains.iter().enumerate() {
            if index > 0 {
                f.write_str(",")?;
            }
            write!(f, "{domain}-{server}-{sequence}")?;
        }

        Ok(())
    }
}
