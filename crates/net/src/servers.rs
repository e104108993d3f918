//! Official master servers.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::str::FromStr;

/// Port every official master server listens on.
pub const MASTER_PORT: u16 = 22023;

/// Matchmaking region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Region {
    /// North America.
    Na,
    /// Europe.
    Eu,
    /// Asia.
    As,
}

const NA: [Ipv4Addr; 6] = [
    Ipv4Addr::new(50, 116, 1, 42),
    Ipv4Addr::new(104, 237, 135, 186),
    Ipv4Addr::new(45, 79, 40, 75),
    Ipv4Addr::new(198, 58, 115, 57),
    Ipv4Addr::new(198, 58, 99, 71),
    Ipv4Addr::new(45, 79, 5, 6),
];

const EU: [Ipv4Addr; 2] = [
    Ipv4Addr::new(172, 105, 251, 170),
    Ipv4Addr::new(172, 105, 249, 25),
];

const AS: [Ipv4Addr; 2] = [
    Ipv4Addr::new(172, 104, 96, 99),
    Ipv4Addr::new(139, 162, 111, 196),
];

impl Region {
    /// All regions.
    pub const ALL: [Region; 3] = [Region::Na, Region::Eu, Region::As];

    fn hosts(self) -> &'static [Ipv4Addr] {
        match self {
            Region::Na => &NA,
            Region::Eu => &EU,
            Region::As => &AS,
        }
    }

    /// Master servers of this region.
    pub fn official(self) -> Vec<SocketAddr> {
        self.hosts()
            .iter()
            .map(|ip| SocketAddr::V4(SocketAddrV4::new(*ip, MASTER_PORT)))
            .collect()
    }

    /// Server used when nothing else is configured: the second entry of
    /// the region's list.
    pub fn default_server(self) -> SocketAddr {
        let hosts = self.hosts();
        let ip = hosts.get(1).unwrap_or(&hosts[0]);
        SocketAddr::V4(SocketAddrV4::new(*ip, MASTER_PORT))
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Region::Na => "NA",
            Region::Eu => "EU",
            Region::As => "AS",
        })
    }
}

impl FromStr for Region {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "NA" => Ok(Region::Na),
            "EU" => Ok(Region::Eu),
            "AS" => Ok(Region::As),
            other => Err(format!("unknown region {other:?}, expected NA, EU or AS")),
        }
    }
}

/// Master servers of `region`.
pub fn official(region: Region) -> Vec<SocketAddr> {
    region.official()
}
