use std::net::{IpAddr, Ipv4Addr};
use std::path::PathBuf;

const COLLECTOR_PORT: &str = "COLLECTOR_PORT";

const DEFAULT_PORT: u16 = 3001;

pub fn get_default_port() -> u16 {
    DEFAULT_PORT
}

/// Port override from the environment, if set and valid
pub fn get_port() -> Option<u16> {
    std::env::var(COLLECTOR_PORT)
        .ok()
        .and_then(|res| res.parse().ok())
}

const COLLECTOR_ADDR: &str = "COLLECTOR_ADDR";

const DEFAULT_ADDR: IpAddr = IpAddr::V4(Ipv4Addr::new(0, 0, 0, 0));

pub fn get_default_addr() -> IpAddr {
    DEFAULT_ADDR
}

pub fn get_addr() -> Option<IpAddr> {
    std::env::var(COLLECTOR_ADDR)
        .ok()
        .and_then(|res| res.parse().ok())
}

const COLLECTOR_DB: &str = "COLLECTOR_DB";

pub fn get_db_path() -> Option<PathBuf> {
    std::env::var(COLLECTOR_DB)
        .ok()
        .filter(|path| !path.is_empty())
        .map(PathBuf::from)
}

/// Normalize an observed peer address for storage
///
/// IPv4 peers reaching a dual-stack socket show up as `::ffff:a.b.c.d`;
/// those are stored as plain IPv4.
pub fn canonical_addr(addr: IpAddr) -> IpAddr {
    addr.to_canonical()
}
