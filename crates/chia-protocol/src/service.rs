use std::fmt;
use std::str::FromStr;

use crate::envelope::DAEMON_DESTINATION;

/// Well-known services reachable through the daemon socket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Service {
    Daemon,
    FullNode,
    Wallet,
    Farmer,
    Harvester,
    Crawler,
}

impl Service {
    pub const ALL: [Service; 6] = [
        Service::Daemon,
        Service::FullNode,
        Service::Wallet,
        Service::Farmer,
        Service::Harvester,
        Service::Crawler,
    ];

    /// Short name used on the command line.
    pub fn name(self) -> &'static str {
        match self {
            Service::Daemon => "daemon",
            Service::FullNode => "full_node",
            Service::Wallet => "wallet",
            Service::Farmer => "farmer",
            Service::Harvester => "harvester",
            Service::Crawler => "crawler",
        }
    }

    /// Value placed in an envelope's `destination` field.
    pub fn destination(self) -> &'static str {
        match self {
            Service::Daemon => DAEMON_DESTINATION,
            Service::FullNode => "chia_full_node",
            Service::Wallet => "chia_wallet",
            Service::Farmer => "chia_farmer",
            Service::Harvester => "chia_harvester",
            Service::Crawler => "chia_crawler",
        }
    }
}

impl fmt::Display for Service {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown service '{0}' (expected one of: daemon, full_node, wallet, farmer, harvester, crawler)")]
pub struct UnknownService(pub String);

impl FromStr for Service {
    type Err = UnknownService;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Service::ALL
            .into_iter()
            .find(|service| service.name() == s || service.destination() == s)
            .ok_or_else(|| UnknownService(s.to_string()))
    }
}
