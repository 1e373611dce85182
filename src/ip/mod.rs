mod interface;

use std::net::{IpAddr, Ipv6Addr};

use thiserror::Error;

/// One host interface with its assigned addresses, in the order the OS
/// reported them. Read fresh every cycle, never persisted.
#[derive(Debug, Clone)]
pub struct NetInterface {
    pub name: Box<str>,
    pub addrs: Vec<IpAddr>,
}

#[derive(Debug, Error, Clone)]
pub enum LocateError {
    #[error("failed to read network interfaces: {0}")]
    Enumeration(Box<str>),

    #[error("failed to read interface addresses: {0}")]
    AddressRead(Box<str>),

    #[error("could not find a global IPv6 address on interface {0}")]
    NoAddress(Box<str>),

    #[error("could not find any network interface matching \"{0}\"")]
    NoInterfaceMatch(Box<str>),
}

/// Something that can come up with the machine's current global IPv6 address.
pub trait IpLocator {
    fn locate(&self) -> Result<Ipv6Addr, LocateError>;
}

/// Locates the address by scanning the host's interfaces for the first one
/// whose name starts with the configured prefix.
pub struct InterfaceLocator {
    prefix: Box<str>,
}

impl InterfaceLocator {
    pub fn new(prefix: Box<str>) -> Self {
        Self { prefix }
    }
}

impl IpLocator for InterfaceLocator {
    fn locate(&self) -> Result<Ipv6Addr, LocateError> {
        let interfaces = interface::enumerate()?;
        select_global_v6(&interfaces, &self.prefix)
    }
}

fn is_link_local_unicast(ip: &Ipv6Addr) -> bool {
    // fe80::/10
    ip.segments()[0] & 0xffc0 == 0xfe80
}

fn is_link_local_multicast(ip: &Ipv6Addr) -> bool {
    // ff02::/16, i.e. multicast with link-local scope
    ip.segments()[0] & 0xff0f == 0xff02
}

fn global_v6_candidate(ip: &IpAddr) -> Option<Ipv6Addr> {
    let v6 = match ip {
        IpAddr::V4(_) => return None,
        IpAddr::V6(v6) => v6,
    };

    // IPv4-mapped addresses are IPv4 in disguise, not usable for an AAAA.
    if v6.to_ipv4_mapped().is_some() {
        return None;
    }

    if is_link_local_unicast(v6) || is_link_local_multicast(v6) {
        return None;
    }

    Some(*v6)
}

/// Picks the first qualifying IPv6 address on the first interface whose name
/// starts with `prefix`. Deliberately takes OS-reported order as-is: when an
/// interface carries several global addresses (say a stable and a temporary
/// privacy one), whichever the OS lists first wins.
///
/// Once an interface matched the prefix, selection is committed to it: an
/// interface without a qualifying address is an error, not a reason to try
/// the next one.
pub fn select_global_v6(
    interfaces: &[NetInterface],
    prefix: &str,
) -> Result<Ipv6Addr, LocateError> {
    let matched = interfaces
        .iter()
        .find(|iface| iface.name.starts_with(prefix))
        .ok_or_else(|| LocateError::NoInterfaceMatch(prefix.into()))?;

    matched
        .addrs
        .iter()
        .find_map(global_v6_candidate)
        .ok_or_else(|| LocateError::NoAddress(matched.name.clone()))
}
