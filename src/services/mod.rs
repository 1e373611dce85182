pub mod cloudflare;

use std::net::Ipv6Addr;

use thiserror::Error;

/// What a reconcile pass did to the remote AAAA record. State transitions are
/// reported here for the caller to log, not printed by the reconciler itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// No record existed, one was created.
    Created { ip: Ipv6Addr },

    /// The record pointed elsewhere and was rewritten. `old` is whatever
    /// content the provider had, verbatim.
    Updated { old: Box<str>, new: Ipv6Addr },

    /// The record already matched; nothing was written.
    Unchanged { ip: Ipv6Addr },
}

/// Low-level failure talking to the Cloudflare API, before any reconcile
/// meaning is attached.
#[derive(Clone, Error, Debug)]
pub enum ApiError {
    // used when CF really returned an error
    #[error("Cloudflare returned error code {0} \"{1}\"")]
    Cloudflare(u32, Box<str>),

    // used when the API says it succeeded, but the returned JSON is nonsense
    #[error("received erroneous JSON: {0}")]
    Json(Box<str>),

    #[error("HTTP transport error: {0}")]
    Transport(Box<str>),
}

#[derive(Debug, Error, Clone)]
pub enum ReconcileError {
    #[error("failed to resolve zone \"{zone}\": {reason}")]
    ZoneLookup { zone: Box<str>, reason: Box<str> },

    #[error("failed to list AAAA records named {name}: {reason}")]
    RecordList { name: Box<str>, reason: Box<str> },

    #[error("failed to create AAAA record {name} -> {ip}: {reason}")]
    RecordCreate {
        name: Box<str>,
        ip: Ipv6Addr,
        reason: Box<str>,
    },

    #[error("failed to update AAAA record {name} -> {ip}: {reason}")]
    RecordUpdate {
        name: Box<str>,
        ip: Ipv6Addr,
        reason: Box<str>,
    },

    #[error("found {count} AAAA records named {name}, refusing to guess which one to manage")]
    AmbiguousRecord { name: Box<str>, count: usize },
}

/// Converges the remote record towards the given address with the minimal
/// write, or none at all.
pub trait DnsReconciler {
    fn reconcile(&mut self, ip: Ipv6Addr) -> Result<Outcome, ReconcileError>;
}
