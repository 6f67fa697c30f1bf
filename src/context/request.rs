use std::{
    net::{IpAddr, SocketAddr},
    sync::{Mutex, PoisonError},
};

use axum::{
    extract::ConnectInfo,
    http::{HeaderMap, HeaderName, HeaderValue, Method, Request, Uri, header},
    response::Response,
};
use axum_extra::extract::cookie::Cookie;
use uuid::Uuid;

use super::{client_ip::TrustedProxies, storage::RequestStorage};

/// Read-only snapshot of the inbound request.
///
/// The body is never captured: strategies only look at the request line and headers.
#[derive(Debug, Clone)]
pub struct RequestInfo {
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    client_ip: Option<IpAddr>,
}

impl RequestInfo {
    pub fn new(method: Method, uri: Uri, headers: HeaderMap, client_ip: Option<IpAddr>) -> Self {
        Self {
            method,
            uri,
            headers,
            client_ip,
        }
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn uri(&self) -> &Uri {
        &self.uri
    }

    pub fn path(&self) -> &str {
        self.uri.path()
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn header_str(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    pub fn client_ip(&self) -> Option<IpAddr> {
        self.client_ip
    }

    /// True when the caller is a browser navigating (as opposed to an API client).
    pub fn wants_html(&self) -> bool {
        self.headers
            .get(header::ACCEPT)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|accept| accept.contains("text/html"))
    }
}

/// Response-side half of the context: headers that stages want on the final response.
#[derive(Debug, Default)]
pub struct PendingResponse {
    headers: Mutex<HeaderMap>,
}

impl PendingResponse {
    pub fn append_header(&self, name: HeaderName, value: HeaderValue) {
        self.headers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .append(name, value);
    }

    pub fn add_cookie(&self, cookie: Cookie<'_>) {
        match HeaderValue::from_str(&cookie.to_string()) {
            Ok(value) => self.append_header(header::SET_COOKIE, value),
            Err(_) => tracing::warn!(cookie = cookie.name(), "dropping cookie with invalid header value"),
        }
    }

    /// Move every pending header onto `response`.
    pub fn apply(&self, response: &mut Response) {
        let pending = std::mem::take(&mut *self.headers.lock().unwrap_or_else(PoisonError::into_inner));
        let mut last_name: Option<HeaderName> = None;
        for (name, value) in pending {
            // HeaderMap::into_iter yields the name only for the first value of each key.
            if let Some(name) = name {
                last_name = Some(name);
            }
            if let Some(name) = last_name.clone() {
                response.headers_mut().append(name, value);
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.headers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_empty()
    }
}

#[derive(Debug)]
pub struct RequestContext {
    id: Uuid,
    request: RequestInfo,
    response: PendingResponse,
    storage: RequestStorage,
}

impl RequestContext {
    pub fn new(request: RequestInfo) -> Self {
        Self {
            id: Uuid::new_v4(),
            request,
            response: PendingResponse::default(),
            storage: RequestStorage::default(),
        }
    }

    /// Snapshot `req`. The client address comes from the socket peer, or from
    /// `X-Forwarded-For` when that peer is one of `proxies`.
    pub fn from_request<B>(req: &Request<B>, proxies: &TrustedProxies) -> Self {
        let peer = req
            .extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip());
        let client_ip = proxies.client_ip(req.headers(), peer);

        Self::new(RequestInfo::new(
            req.method().clone(),
            req.uri().clone(),
            req.headers().clone(),
            client_ip,
        ))
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn request(&self) -> &RequestInfo {
        &self.request
    }

    pub fn response(&self) -> &PendingResponse {
        &self.response
    }

    pub fn storage(&self) -> &RequestStorage {
        &self.storage
    }
}
