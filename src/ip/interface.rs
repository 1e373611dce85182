use super::{LocateError, NetInterface};

pub(super) fn enumerate() -> Result<Vec<NetInterface>, LocateError> {
    os::enumerate()
}

#[cfg(target_family = "unix")]
mod os {
    use std::ffi::CStr;
    use std::io;
    use std::mem::MaybeUninit;
    use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

    use libc;

    use crate::ip::{LocateError, NetInterface};

    pub fn enumerate() -> Result<Vec<NetInterface>, LocateError> {
        let mut interfaces: Vec<NetInterface> = Vec::new();

        // SAFETY: if getifaddrs() succeeds, ifaddrs is guaranteed to be
        // initialized. The lifetime is undetermined (hence 'static) until we
        // free it later.
        let ifaddrs = unsafe {
            let mut ifaddrs = MaybeUninit::<&'static mut libc::ifaddrs>::uninit();

            if libc::getifaddrs(&mut ifaddrs as *mut _ as _) < 0 {
                let errno = io::Error::last_os_error();
                return Err(LocateError::Enumeration(errno.to_string().into()));
            }

            ifaddrs.assume_init()
        };

        let mut current = ifaddrs as *const libc::ifaddrs;
        let mut failure = None;

        while !current.is_null() {
            // SAFETY: Nullness is already checked above.
            let ifaddr = unsafe { &*current };
            current = ifaddr.ifa_next as *const _;

            if ifaddr.ifa_name.is_null() {
                // An address entry we cannot attribute to any interface.
                failure = Some(LocateError::AddressRead(
                    "the OS returned an interface entry without a name".into(),
                ));
                break;
            }

            // SAFETY: the name returned by the OS is a safe, null-terminated
            // string. At least I hope it is so.
            let name = unsafe { CStr::from_ptr(ifaddr.ifa_name) }.to_string_lossy();

            // getifaddrs() yields one entry per (interface, address) pair;
            // group them back by interface, keeping first-seen order.
            let index = match interfaces.iter().position(|iface| *iface.name == *name) {
                Some(index) => index,
                None => {
                    interfaces.push(NetInterface {
                        name: Box::from(&*name),
                        addrs: Vec::new(),
                    });
                    interfaces.len() - 1
                }
            };

            if ifaddr.ifa_addr.is_null() {
                continue;
            }

            // SAFETY: nullness is checked above.
            let ifa_addr = unsafe { *ifaddr.ifa_addr };

            if ifa_addr.sa_family == libc::AF_INET as libc::sa_family_t {
                // SAFETY: the type of the pointer is given by sa_family
                let ifa_addr = unsafe { *(ifaddr.ifa_addr as *const libc::sockaddr_in) };
                let raw = u32::from_be(ifa_addr.sin_addr.s_addr);
                interfaces[index].addrs.push(IpAddr::V4(Ipv4Addr::from(raw)));
            } else if ifa_addr.sa_family == libc::AF_INET6 as libc::sa_family_t {
                // SAFETY: the type of the pointer is given by sa_family
                let ifa_addr = unsafe { *(ifaddr.ifa_addr as *const libc::sockaddr_in6) };
                let raw = u128::from_be_bytes(ifa_addr.sin6_addr.s6_addr);
                interfaces[index].addrs.push(IpAddr::V6(Ipv6Addr::from(raw)));
            }
        }

        // SAFETY: ifaddrs is still active at this point.
        unsafe { libc::freeifaddrs(ifaddrs) };

        match failure {
            Some(error) => Err(error),
            None => Ok(interfaces),
        }
    }
}
