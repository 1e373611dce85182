use std::net::Ipv6Addr;

use crate::cache::LastIpCache;
use crate::ip::IpLocator;
use crate::services::{DnsReconciler, Outcome};

/// One pass of the locate -> compare -> reconcile pipeline. Every failure in
/// here is logged and swallowed: a bad cycle must not take the daemon down,
/// the next scheduled cycle is the retry.
pub fn run_cycle(
    locator: &dyn IpLocator,
    reconciler: &mut dyn DnsReconciler,
    cache: Option<&LastIpCache>,
) {
    let ip = match locator.locate() {
        Ok(ip) => ip,
        Err(e) => {
            println!("[ERROR] IPv6 lookup failed: {}", e);
            return;
        }
    };

    match cache {
        Some(cache) => run_with_cache(ip, reconciler, cache),
        // Without a cache the reconciler runs every cycle and no-ops
        // remotely, at the cost of one extra read call per cycle.
        None => reconcile_and_log(ip, reconciler),
    }
}

fn run_with_cache(ip: Ipv6Addr, reconciler: &mut dyn DnsReconciler, cache: &LastIpCache) {
    let last = match cache.load() {
        Ok(last) => last,
        Err(e) => {
            println!("[ERROR] {}", e);
            return;
        }
    };

    match last {
        None => {
            // First run: remember the address, then push it out.
            if let Err(e) = cache.store(ip) {
                println!("[ERROR] {}", e);
                return;
            }
            reconcile_and_log(ip, reconciler);
        }

        Some(last) if *last == *ip.to_string() => {
            println!("[INFO] IP has not changed, nothing to do");
        }

        Some(_) => {
            reconcile_and_log(ip, reconciler);
            // Remembered even when reconciliation failed; the file tracks
            // what was last attempted, not what the provider accepted.
            if let Err(e) = cache.store(ip) {
                println!("[ERROR] {}", e);
            }
        }
    }
}

fn reconcile_and_log(ip: Ipv6Addr, reconciler: &mut dyn DnsReconciler) {
    match reconciler.reconcile(ip) {
        Ok(Outcome::Created { ip }) => {
            println!("[INFO] created AAAA record pointing at {}", ip);
        }
        Ok(Outcome::Updated { old, new }) => {
            println!("[INFO] updated AAAA record: {} -> {}", old, new);
        }
        Ok(Outcome::Unchanged { ip }) => {
            println!("[INFO] AAAA record already points at {}", ip);
        }
        Err(e) => {
            println!("[ERROR] {}", e);
        }
    }
}
