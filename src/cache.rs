use std::fs;
use std::io;
use std::net::Ipv6Addr;

use thiserror::Error;

#[derive(Debug, Error)]
#[error("last-IP file {path}: {source}")]
pub struct CacheError {
    path: Box<str>,
    #[source]
    source: io::Error,
}

/// The last address we pushed to the provider, persisted so a restart does
/// not trigger a redundant API call. The file holds exactly the address
/// string and nothing else, and is overwritten wholesale on change.
pub struct LastIpCache {
    path: Box<str>,
}

impl LastIpCache {
    pub fn new(path: Box<str>) -> Self {
        Self { path }
    }

    /// A missing file is a normal first run, not an error.
    pub fn load(&self) -> Result<Option<Box<str>>, CacheError> {
        match fs::read_to_string(&*self.path) {
            Ok(contents) => Ok(Some(contents.into())),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(CacheError {
                path: self.path.clone(),
                source: e,
            }),
        }
    }

    pub fn store(&self, ip: Ipv6Addr) -> Result<(), CacheError> {
        fs::write(&*self.path, ip.to_string()).map_err(|e| CacheError {
            path: self.path.clone(),
            source: e,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::env;
    use std::path::PathBuf;

    use super::*;

    fn temp_path(tag: &str) -> PathBuf {
        env::temp_dir().join(format!("cloudflare-ddns6-cache-{}-{}", tag, std::process::id()))
    }

    #[test]
    fn missing_file_reads_as_none() {
        let path = temp_path("missing");
        let _ = fs::remove_file(&path);

        let cache = LastIpCache::new(path.to_string_lossy().into());
        assert_eq!(cache.load().unwrap(), None);
    }

    #[test]
    fn stores_exactly_the_address_string() {
        let path = temp_path("roundtrip");
        let _ = fs::remove_file(&path);

        let cache = LastIpCache::new(path.to_string_lossy().into());
        let ip = "2001:db8::42".parse::<Ipv6Addr>().unwrap();

        cache.store(ip).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "2001:db8::42");
        assert_eq!(cache.load().unwrap().as_deref(), Some("2001:db8::42"));

        // A change overwrites the file wholesale.
        let other = "2001:db8::43".parse::<Ipv6Addr>().unwrap();
        cache.store(other).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "2001:db8::43");

        let _ = fs::remove_file(&path);
    }
}
