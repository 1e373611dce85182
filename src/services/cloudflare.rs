use std::net::Ipv6Addr;

use crate::config::{self, ZoneSelector};
use crate::http::{Error, Request, Response};

use super::{ApiError, DnsReconciler, Outcome, ReconcileError};

const API_BASE: &str = "https://api.cloudflare.com/client/v4";

/// A single AAAA record as the provider reports it. The ID is opaque and only
/// ever echoed back in update URLs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub id: Box<str>,
    pub content: Box<str>,
}

/// The handful of API calls the reconciler needs, split out so the
/// branching in `reconcile()` can be exercised without a network.
pub trait CloudflareApi {
    /// Resolves a zone name to its ID. `Ok(None)` means the API answered but
    /// no zone of that name is visible to the credentials.
    fn zone_id_by_name(&self, name: &str) -> Result<Option<Box<str>>, ApiError>;

    fn list_aaaa_records(&self, zone_id: &str, name: &str) -> Result<Vec<Record>, ApiError>;

    fn create_aaaa_record(
        &self,
        zone_id: &str,
        name: &str,
        content: &str,
        ttl: u32,
    ) -> Result<(), ApiError>;

    fn update_aaaa_record(
        &self,
        zone_id: &str,
        record_id: &str,
        name: &str,
        content: &str,
        ttl: u32,
    ) -> Result<(), ApiError>;

    fn verify_credentials(&self) -> Result<(), ApiError>;
}

enum Auth {
    /// Legacy X-Auth-Email/X-Auth-Key header pair.
    Key { email: Box<str>, key: Box<str> },

    /// Already formatted as "Bearer <token>".
    Bearer(Box<str>),
}

/// The real thing, talking to api.cloudflare.com.
pub struct HttpApi {
    auth: Auth,
}

impl HttpApi {
    pub fn new(config: &config::Cloudflare) -> Self {
        let auth = match &config.email {
            Some(email) => Auth::Key {
                email: email.clone(),
                key: config.api_token.clone(),
            },
            None => Auth::Bearer((String::from("Bearer ") + &config.api_token).into()),
        };

        Self { auth }
    }

    fn authorize(&self, request: Request) -> Request {
        match &self.auth {
            Auth::Key { email, key } => request
                .set("X-Auth-Email", email)
                .set("X-Auth-Key", key)
                .set("Content-Type", "application/json"),
            Auth::Bearer(token) => request
                .set("Authorization", token)
                .set("Content-Type", "application/json"),
        }
    }

    fn parse_error(response: Response) -> Result<(u32, Box<str>), String> {
        let resp_json = response
            .into_json::<serde_json::Value>()
            .map_err(|e| String::from("unable to parse response as JSON:") + &e.to_string())?;

        let errors = resp_json
            .get("errors")
            .ok_or_else(|| String::from("expected map"))?;

        let error = errors
            .get(0)
            .ok_or_else(|| String::from("expected array"))?;

        let code = error
            .get("code")
            .and_then(|c| c.as_u64())
            .ok_or_else(|| String::from("expected number"))?;

        let message = error
            .get("message")
            .and_then(|m| m.as_str())
            .ok_or_else(|| String::from("expected string"))?
            .to_owned()
            .into_boxed_str();

        Ok((code as u32, message))
    }

    fn parse_and_check_response(
        response: Result<Response, Error>,
    ) -> Result<serde_json::Value, ApiError> {
        let response = match response {
            Ok(r) => r
                .into_json::<serde_json::Value>()
                .map_err(|e| ApiError::Json(e.to_string().into()))?,
            Err(Error::Status(_, resp)) => {
                let (code, message) = Self::parse_error(resp).map_err(|ref e| {
                    let error = String::from("unexpected error message structure - ");
                    ApiError::Json((error + e).into_boxed_str())
                })?;
                Err(ApiError::Cloudflare(code, message))?
            }
            Err(Error::Transport(tp)) => Err(ApiError::Transport(tp))?,
        };

        // A sanity check.
        let success = response
            .get("success")
            .and_then(|v| v.as_bool())
            .unwrap_or(false);
        if !success {
            return Err(ApiError::Json("cloudflare returned success=false?".into()));
        };

        Ok(response)
    }
}

impl CloudflareApi for HttpApi {
    fn zone_id_by_name(&self, name: &str) -> Result<Option<Box<str>>, ApiError> {
        let request = self
            .authorize(Request::get(&format!("{}/zones", API_BASE)))
            .query("name", name);

        let response = Self::parse_and_check_response(request.call())?;

        let results = response.get("result").and_then(|v| v.as_array());
        let Some(zones) = results else {
            return Err(ApiError::Json("zone listing has no result array".into()));
        };

        let Some(zone) = zones.first() else {
            return Ok(None);
        };

        let Some(id) = zone.get("id").and_then(|v| v.as_str()) else {
            return Err(ApiError::Json("zone has no id?".into()));
        };

        Ok(Some(id.into()))
    }

    fn list_aaaa_records(&self, zone_id: &str, name: &str) -> Result<Vec<Record>, ApiError> {
        let url = format!("{}/zones/{}/dns_records", API_BASE, zone_id);

        let request = self
            .authorize(Request::get(&url))
            .query("type", "AAAA")
            .query("name", name);

        let response = Self::parse_and_check_response(request.call())?;

        let results = response.get("result").and_then(|v| v.as_array());
        let Some(records) = results else {
            return Err(ApiError::Json("record listing has no result array".into()));
        };

        let mut returned_records = Vec::new();
        for record in records {
            let Some(id) = record.get("id").and_then(|v| v.as_str()) else {
                return Err(ApiError::Json("record has no id?".into()));
            };

            let Some(content) = record.get("content").and_then(|v| v.as_str()) else {
                return Err(ApiError::Json("record has no content?".into()));
            };

            returned_records.push(Record {
                id: id.into(),
                content: content.into(),
            });
        }

        Ok(returned_records)
    }

    fn create_aaaa_record(
        &self,
        zone_id: &str,
        name: &str,
        content: &str,
        ttl: u32,
    ) -> Result<(), ApiError> {
        let url = format!("{}/zones/{}/dns_records", API_BASE, zone_id);

        let response = self.authorize(Request::post(&url)).send_json(serde_json::json!({
            "type": "AAAA",
            "name": name,
            "content": content,
            "ttl": ttl,
        }));

        Self::parse_and_check_response(response)?;

        Ok(())
    }

    fn update_aaaa_record(
        &self,
        zone_id: &str,
        record_id: &str,
        name: &str,
        content: &str,
        ttl: u32,
    ) -> Result<(), ApiError> {
        let url = format!("{}/zones/{}/dns_records/{}", API_BASE, zone_id, record_id);

        let response = self.authorize(Request::put(&url)).send_json(serde_json::json!({
            "type": "AAAA",
            "name": name,
            "content": content,
            "ttl": ttl,
        }));

        Self::parse_and_check_response(response)?;

        Ok(())
    }

    fn verify_credentials(&self) -> Result<(), ApiError> {
        // Token auth has a dedicated verification endpoint; the legacy key
        // auth does not, but any authenticated endpoint will do.
        let url = match &self.auth {
            Auth::Bearer(_) => format!("{}/user/tokens/verify", API_BASE),
            Auth::Key { .. } => format!("{}/user", API_BASE),
        };

        Self::parse_and_check_response(self.authorize(Request::get(&url)).call())?;

        Ok(())
    }
}

/// Owns the reconcile-or-create decision against the provider's record set.
/// The zone ID is resolved on the first cycle and cached from then on; zone
/// IDs are stable for the lifetime of a zone.
pub struct Reconciler<A: CloudflareApi> {
    api: A,
    zone: ZoneSelector,
    record_name: Box<str>,
    ttl: u32,
    zone_id: Option<Box<str>>,
}

impl Reconciler<HttpApi> {
    pub fn from_config(config: &config::Cloudflare) -> Result<Self, &'static str> {
        Ok(Self::with_api(
            HttpApi::new(config),
            config.zone_selector()?,
            config.record_name.clone(),
            config.ttl,
        ))
    }
}

impl<A: CloudflareApi> Reconciler<A> {
    pub fn with_api(api: A, zone: ZoneSelector, record_name: Box<str>, ttl: u32) -> Self {
        Self {
            api,
            zone,
            record_name,
            ttl,
            zone_id: None,
        }
    }

    pub fn verify_credentials(&self) -> Result<(), ApiError> {
        self.api.verify_credentials()
    }

    fn zone_id(&mut self) -> Result<Box<str>, ReconcileError> {
        if let Some(id) = &self.zone_id {
            return Ok(id.clone());
        }

        let id = match &self.zone {
            ZoneSelector::Id(id) => id.clone(),
            ZoneSelector::Name(name) => match self.api.zone_id_by_name(name) {
                Ok(Some(id)) => id,
                Ok(None) => {
                    return Err(ReconcileError::ZoneLookup {
                        zone: name.clone(),
                        reason: "no zone with this name is visible to the credentials".into(),
                    })
                }
                Err(e) => {
                    return Err(ReconcileError::ZoneLookup {
                        zone: name.clone(),
                        reason: e.to_string().into(),
                    })
                }
            },
        };

        self.zone_id = Some(id.clone());
        Ok(id)
    }
}

impl<A: CloudflareApi> DnsReconciler for Reconciler<A> {
    fn reconcile(&mut self, ip: Ipv6Addr) -> Result<Outcome, ReconcileError> {
        let zone_id = self.zone_id()?;
        let name = self.record_name.clone();

        let records = self
            .api
            .list_aaaa_records(&zone_id, &name)
            .map_err(|e| ReconcileError::RecordList {
                name: name.clone(),
                reason: e.to_string().into(),
            })?;

        match records.as_slice() {
            [] => {
                self.api
                    .create_aaaa_record(&zone_id, &name, &ip.to_string(), self.ttl)
                    .map_err(|e| ReconcileError::RecordCreate {
                        name: name.clone(),
                        ip,
                        reason: e.to_string().into(),
                    })?;

                Ok(Outcome::Created { ip })
            }

            [record] => {
                // The provider stores content in its own normalized spelling,
                // so compare addresses, not strings. Unparsable content is
                // treated as different and overwritten.
                let same = record
                    .content
                    .parse::<Ipv6Addr>()
                    .map_or(false, |current| current == ip);

                if same {
                    return Ok(Outcome::Unchanged { ip });
                }

                self.api
                    .update_aaaa_record(&zone_id, &record.id, &name, &ip.to_string(), self.ttl)
                    .map_err(|e| ReconcileError::RecordUpdate {
                        name: name.clone(),
                        ip,
                        reason: e.to_string().into(),
                    })?;

                Ok(Outcome::Updated {
                    old: record.content.clone(),
                    new: ip,
                })
            }

            records => Err(ReconcileError::AmbiguousRecord {
                name,
                count: records.len(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use super::*;

    #[derive(Debug, Clone, PartialEq, Eq)]
    enum Call {
        ZoneLookup(Box<str>),
        List(Box<str>, Box<str>),
        Create {
            name: Box<str>,
            content: Box<str>,
            ttl: u32,
        },
        Update {
            record_id: Box<str>,
            content: Box<str>,
            ttl: u32,
        },
    }

    struct FakeApi {
        records: Vec<Record>,
        calls: RefCell<Vec<Call>>,
    }

    impl FakeApi {
        fn with_records(records: Vec<Record>) -> Self {
            Self {
                records,
                calls: RefCell::new(Vec::new()),
            }
        }

        fn write_calls(&self) -> Vec<Call> {
            self.calls
                .borrow()
                .iter()
                .filter(|call| matches!(call, Call::Create { .. } | Call::Update { .. }))
                .cloned()
                .collect()
        }
    }

    impl CloudflareApi for FakeApi {
        fn zone_id_by_name(&self, name: &str) -> Result<Option<Box<str>>, ApiError> {
            self.calls.borrow_mut().push(Call::ZoneLookup(name.into()));
            match name {
                "example.com" => Ok(Some("zone-1".into())),
                _ => Ok(None),
            }
        }

        fn list_aaaa_records(&self, zone_id: &str, name: &str) -> Result<Vec<Record>, ApiError> {
            self.calls
                .borrow_mut()
                .push(Call::List(zone_id.into(), name.into()));
            Ok(self.records.clone())
        }

        fn create_aaaa_record(
            &self,
            _zone_id: &str,
            name: &str,
            content: &str,
            ttl: u32,
        ) -> Result<(), ApiError> {
            self.calls.borrow_mut().push(Call::Create {
                name: name.into(),
                content: content.into(),
                ttl,
            });
            Ok(())
        }

        fn update_aaaa_record(
            &self,
            _zone_id: &str,
            record_id: &str,
            _name: &str,
            content: &str,
            ttl: u32,
        ) -> Result<(), ApiError> {
            self.calls.borrow_mut().push(Call::Update {
                record_id: record_id.into(),
                content: content.into(),
                ttl,
            });
            Ok(())
        }

        fn verify_credentials(&self) -> Result<(), ApiError> {
            Ok(())
        }
    }

    fn reconciler(api: FakeApi) -> Reconciler<FakeApi> {
        Reconciler::with_api(
            api,
            ZoneSelector::Name("example.com".into()),
            "home.example.com".into(),
            300,
        )
    }

    #[test]
    fn missing_record_is_created() {
        let mut reconciler = reconciler(FakeApi::with_records(vec![]));
        let ip = "2001:db8::1".parse::<Ipv6Addr>().unwrap();

        let outcome = reconciler.reconcile(ip).unwrap();

        assert_eq!(outcome, Outcome::Created { ip });
        assert_eq!(
            reconciler.api.write_calls(),
            vec![Call::Create {
                name: "home.example.com".into(),
                content: "2001:db8::1".into(),
                ttl: 300,
            }]
        );
    }

    #[test]
    fn matching_record_is_left_alone() {
        let mut reconciler = reconciler(FakeApi::with_records(vec![Record {
            id: "rec-1".into(),
            content: "2001:db8::1".into(),
        }]));
        let ip = "2001:db8::1".parse::<Ipv6Addr>().unwrap();

        let outcome = reconciler.reconcile(ip).unwrap();

        assert_eq!(outcome, Outcome::Unchanged { ip });
        assert_eq!(reconciler.api.write_calls(), vec![]);
    }

    #[test]
    fn content_comparison_survives_provider_normalization() {
        // Same address, differently spelled by the provider.
        let mut reconciler = reconciler(FakeApi::with_records(vec![Record {
            id: "rec-1".into(),
            content: "2001:0db8:0000:0000:0000:0000:0000:0001".into(),
        }]));
        let ip = "2001:db8::1".parse::<Ipv6Addr>().unwrap();

        assert_eq!(reconciler.reconcile(ip).unwrap(), Outcome::Unchanged { ip });
        assert_eq!(reconciler.api.write_calls(), vec![]);
    }

    #[test]
    fn stale_record_is_updated_in_place() {
        let mut reconciler = reconciler(FakeApi::with_records(vec![Record {
            id: "rec-1".into(),
            content: "2001:db8::1".into(),
        }]));
        let ip = "2001:db8::2".parse::<Ipv6Addr>().unwrap();

        let outcome = reconciler.reconcile(ip).unwrap();

        // Old content travels back to the caller, the record ID is preserved
        // and the TTL re-asserted.
        assert_eq!(
            outcome,
            Outcome::Updated {
                old: "2001:db8::1".into(),
                new: ip,
            }
        );
        assert_eq!(
            reconciler.api.write_calls(),
            vec![Call::Update {
                record_id: "rec-1".into(),
                content: "2001:db8::2".into(),
                ttl: 300,
            }]
        );
    }

    #[test]
    fn duplicate_records_are_never_touched() {
        let mut reconciler = reconciler(FakeApi::with_records(vec![
            Record {
                id: "rec-1".into(),
                content: "2001:db8::1".into(),
            },
            Record {
                id: "rec-2".into(),
                content: "2001:db8::2".into(),
            },
        ]));
        let ip = "2001:db8::3".parse::<Ipv6Addr>().unwrap();

        let err = reconciler.reconcile(ip).unwrap_err();

        assert!(matches!(
            err,
            ReconcileError::AmbiguousRecord { count: 2, .. }
        ));
        assert_eq!(reconciler.api.write_calls(), vec![]);
    }

    #[test]
    fn unknown_zone_is_a_lookup_error() {
        let api = FakeApi::with_records(vec![]);
        let mut reconciler = Reconciler::with_api(
            api,
            ZoneSelector::Name("nosuch.example".into()),
            "home.nosuch.example".into(),
            300,
        );
        let ip = "2001:db8::1".parse::<Ipv6Addr>().unwrap();

        let err = reconciler.reconcile(ip).unwrap_err();
        assert!(matches!(err, ReconcileError::ZoneLookup { .. }));
        assert_eq!(reconciler.api.write_calls(), vec![]);
    }

    #[test]
    fn zone_id_is_resolved_once() {
        let mut reconciler = reconciler(FakeApi::with_records(vec![Record {
            id: "rec-1".into(),
            content: "2001:db8::1".into(),
        }]));
        let ip = "2001:db8::1".parse::<Ipv6Addr>().unwrap();

        reconciler.reconcile(ip).unwrap();
        reconciler.reconcile(ip).unwrap();

        let lookups = reconciler
            .api
            .calls
            .borrow()
            .iter()
            .filter(|call| matches!(call, Call::ZoneLookup(_)))
            .count();
        assert_eq!(lookups, 1);
    }
}
