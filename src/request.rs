//! Incoming request descriptor.
//!
//! A [`Request`] is immutable once built. Every stage in the pipeline reads
//! the same value; cloning it only bumps a reference count.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use bytes::Bytes;
use http::Method;
use serde_json::{Map, Value};

/// An incoming HTTP request.
#[derive(Clone, Debug)]
pub struct Request {
    inner: Arc<Parts>,
}

#[derive(Debug)]
struct Parts {
    method: Method,
    path: String,
    route: Option<String>,
    remote_addr: Option<SocketAddr>,
    headers: Vec<(String, String)>,
    body: Bytes,
    params: HashMap<String, String>,
    args: Value,
}

impl Request {
    pub fn builder() -> RequestBuilder {
        RequestBuilder::default()
    }

    pub fn method(&self) -> &Method { &self.inner.method }
    pub fn path(&self) -> &str { &self.inner.path }

    /// Pattern of the matched route, e.g. `/products/{id}`. `None` when no
    /// route matched.
    pub fn route(&self) -> Option<&str> { self.inner.route.as_deref() }

    pub fn remote_addr(&self) -> Option<SocketAddr> { self.inner.remote_addr }
    pub fn headers(&self) -> &[(String, String)] { &self.inner.headers }
    pub fn body(&self) -> &[u8] { &self.inner.body }

    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.inner.headers.iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Returns a named path parameter.
    ///
    /// For a route `/products/{id}`, `req.param("id")` on `/products/42`
    /// returns `Some("42")`.
    pub fn param(&self, key: &str) -> Option<&str> {
        self.inner.params.get(key).map(String::as_str)
    }

    /// Snapshot of the arguments the handler will see: path parameters and
    /// query-string pairs as a JSON object. Path parameters win on conflict.
    pub fn args(&self) -> &Value {
        &self.inner.args
    }
}

/// Builder for [`Request`]. Used by the server and by tests that drive the
/// pipeline without a socket.
#[derive(Debug)]
pub struct RequestBuilder {
    method: Method,
    path: String,
    query: Option<String>,
    route: Option<String>,
    remote_addr: Option<SocketAddr>,
    headers: Vec<(String, String)>,
    body: Bytes,
    params: HashMap<String, String>,
}

impl Default for RequestBuilder {
    fn default() -> Self {
        Self {
            method: Method::GET,
            path: "/".to_owned(),
            query: None,
            route: None,
            remote_addr: None,
            headers: Vec::new(),
            body: Bytes::new(),
            params: HashMap::new(),
        }
    }
}

impl RequestBuilder {
    pub fn method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    pub fn path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }

    /// Raw query string, without the leading `?`.
    pub fn query(mut self, query: impl Into<String>) -> Self {
        self.query = Some(query.into());
        self
    }

    pub fn remote_addr(mut self, addr: SocketAddr) -> Self {
        self.remote_addr = Some(addr);
        self
    }

    pub fn header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_owned(), value.to_owned()));
        self
    }

    pub(crate) fn headers(mut self, headers: Vec<(String, String)>) -> Self {
        self.headers = headers;
        self
    }

    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    pub fn param(mut self, key: &str, value: &str) -> Self {
        self.params.insert(key.to_owned(), value.to_owned());
        self
    }

    pub(crate) fn params(mut self, params: HashMap<String, String>) -> Self {
        self.params = params;
        self
    }

    pub(crate) fn route(mut self, pattern: &str) -> Self {
        self.route = Some(pattern.to_owned());
        self
    }

    pub(crate) fn target(&self) -> (&Method, &str) {
        (&self.method, &self.path)
    }

    pub fn build(self) -> Request {
        let mut args = Map::new();
        if let Some(query) = &self.query {
            for (k, v) in url::form_urlencoded::parse(query.as_bytes()) {
                args.insert(k.into_owned(), Value::String(v.into_owned()));
            }
        }
        for (k, v) in &self.params {
            args.insert(k.clone(), Value::String(v.clone()));
        }

        Request {
            inner: Arc::new(Parts {
                method: self.method,
                path: self.path,
                route: self.route,
                remote_addr: self.remote_addr,
                headers: self.headers,
                body: self.body,
                params: self.params,
                args: Value::Object(args),
            }),
        }
    }
}
