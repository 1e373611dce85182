use std::io::{self, Read};

use serde::de::DeserializeOwned;
use serde::Serialize;
use ureq;

use crate::GENERAL_CONFIG;

pub struct Request {
    inner: ureq::Request,
}

pub struct Response {
    reader: Box<dyn Read>,
}

pub enum Error {
    Status(u16, Response),
    Transport(Box<str>),
}

fn user_agent() -> &'static str {
    // GENERAL_CONFIG is set before the first request is ever built; the
    // fallback only exists so unit tests can construct requests.
    GENERAL_CONFIG
        .get()
        .map(|general| &*general.user_agent)
        .unwrap_or(concat!("cloudflare-ddns6 ", env!("CARGO_PKG_VERSION")))
}

impl Request {
    pub fn get(url: &str) -> Self {
        let inner = ureq::get(url).set("User-Agent", user_agent());
        Self { inner }
    }

    pub fn post(url: &str) -> Self {
        let inner = ureq::post(url).set("User-Agent", user_agent());
        Self { inner }
    }

    pub fn put(url: &str) -> Self {
        let inner = ureq::put(url).set("User-Agent", user_agent());
        Self { inner }
    }

    pub fn query(mut self, param: &str, value: &str) -> Self {
        self.inner = self.inner.query(param, value);
        self
    }

    pub fn set(mut self, header: &str, value: &str) -> Self {
        self.inner = self.inner.set(header, value);
        self
    }

    pub fn call(self) -> Result<Response, Error> {
        Self::convert(self.inner.call())
    }

    pub fn send_json(self, data: impl Serialize) -> Result<Response, Error> {
        Self::convert(self.inner.send_json(data))
    }

    fn convert(result: Result<ureq::Response, ureq::Error>) -> Result<Response, Error> {
        result
            .map_err(|e| match e {
                ureq::Error::Status(code, resp) => Error::Status(
                    code,
                    Response {
                        reader: resp.into_reader(),
                    },
                ),
                ureq::Error::Transport(tp) => Error::Transport(tp.to_string().into()),
            })
            .map(|resp| Response {
                reader: resp.into_reader(),
            })
    }
}

impl Response {
    pub fn into_json<T: DeserializeOwned>(self) -> Result<T, io::Error> {
        serde_json::from_reader(self.reader)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
    }
}
