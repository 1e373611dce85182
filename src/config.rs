use serde_derive::{Deserialize, Serialize};

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq, Eq)]
pub struct General {
    #[serde(default = "default_check_interval")]
    pub check_interval: u64,

    #[serde(default)]
    pub last_ip_file: Option<Box<str>>,

    #[serde(default = "default_user_agent")]
    pub user_agent: Box<str>,
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq, Eq)]
pub struct Interface {
    /// Name prefix of the interface to watch. An empty prefix matches the
    /// first interface the OS reports.
    #[serde(default)]
    pub prefix: Box<str>,
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq, Eq)]
pub struct Cloudflare {
    /// Account e-mail. When present, authentication uses the legacy
    /// X-Auth-Email/X-Auth-Key header pair; when absent, `api_token` is sent
    /// as a Bearer token.
    #[serde(default)]
    pub email: Option<Box<str>>,

    pub api_token: Box<str>,

    #[serde(default)]
    pub zone: Option<Box<str>>,

    #[serde(default)]
    pub zone_id: Option<Box<str>>,

    pub record_name: Box<str>,

    #[serde(default = "default_ttl")]
    pub ttl: u32,
}

/// Either a zone name that still needs resolving against the API, or the
/// provider's zone ID taken verbatim from the config.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ZoneSelector {
    Name(Box<str>),
    Id(Box<str>),
}

impl Cloudflare {
    pub fn zone_selector(&self) -> Result<ZoneSelector, &'static str> {
        match (&self.zone, &self.zone_id) {
            (Some(name), None) => Ok(ZoneSelector::Name(name.clone())),
            (None, Some(id)) => Ok(ZoneSelector::Id(id.clone())),
            (Some(_), Some(_)) => Err("specify either `zone` or `zone_id`, not both"),
            (None, None) => Err("one of `zone` or `zone_id` must be specified"),
        }
    }
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq, Eq)]
pub struct Config {
    pub general: General,
    pub interface: Interface,
    pub cloudflare: Cloudflare,
}

fn default_check_interval() -> u64 {
    30
}

fn default_user_agent() -> Box<str> {
    concat!("cloudflare-ddns6 ", env!("CARGO_PKG_VERSION")).into()
}

fn default_ttl() -> u32 {
    300
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_config() {
        let toml = r#"
            [general]
            check_interval = 60
            last_ip_file = "/var/lib/cloudflare-ddns6/last-ip"

            [interface]
            prefix = "enp"

            [cloudflare]
            email = "admin@example.com"
            api_token = "k3y"
            zone = "example.com"
            record_name = "home.example.com"
            ttl = 120
        "#;

        let config = toml::from_str::<Config>(toml).unwrap();
        assert_eq!(config.general.check_interval, 60);
        assert_eq!(
            config.general.last_ip_file.as_deref(),
            Some("/var/lib/cloudflare-ddns6/last-ip")
        );
        assert_eq!(&*config.interface.prefix, "enp");
        assert_eq!(config.cloudflare.email.as_deref(), Some("admin@example.com"));
        assert_eq!(config.cloudflare.ttl, 120);
        assert_eq!(
            config.cloudflare.zone_selector(),
            Ok(ZoneSelector::Name("example.com".into()))
        );
    }

    #[test]
    fn minimal_config_gets_defaults() {
        let toml = r#"
            [general]

            [interface]

            [cloudflare]
            api_token = "t0k3n"
            zone_id = "023e105f4ecef8ad9ca31a8372d0c353"
            record_name = "home.example.com"
        "#;

        let config = toml::from_str::<Config>(toml).unwrap();
        assert_eq!(config.general.check_interval, 30);
        assert_eq!(config.general.last_ip_file, None);
        assert_eq!(&*config.interface.prefix, "");
        assert_eq!(config.cloudflare.ttl, 300);
        assert_eq!(
            config.cloudflare.zone_selector(),
            Ok(ZoneSelector::Id("023e105f4ecef8ad9ca31a8372d0c353".into()))
        );
    }

    #[test]
    fn zone_must_be_unambiguous() {
        let toml = r#"
            [general]

            [interface]

            [cloudflare]
            api_token = "t0k3n"
            zone = "example.com"
            zone_id = "023e105f4ecef8ad9ca31a8372d0c353"
            record_name = "home.example.com"
        "#;

        let config = toml::from_str::<Config>(toml).unwrap();
        assert!(config.cloudflare.zone_selector().is_err());

        let toml = r#"
            [general]

            [interface]

            [cloudflare]
            api_token = "t0k3n"
            record_name = "home.example.com"
        "#;

        let config = toml::from_str::<Config>(toml).unwrap();
        assert!(config.cloudflare.zone_selector().is_err());
    }
}
