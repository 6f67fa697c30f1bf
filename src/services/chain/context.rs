use std::net::IpAddr;

use axum::http::{HeaderMap, Method, Uri};

use crate::context::RequestInfo;
use crate::error::AppError;
use crate::services::jwt::{Claims, StateCredentials};

/// Mutable bag threaded through a `ValidationChain`.
///
/// Handlers fill fields in as they run; later handlers must cope with any
/// optional field still being `None`.
#[derive(Debug)]
pub struct ValidationContext {
    pub method: Method,
    pub uri: Uri,
    pub headers: HeaderMap,
    pub client_ip: Option<IpAddr>,

    pub provider_id: Option<String>,
    pub token: Option<String>,
    pub code: Option<String>,
    pub claims: Option<Claims>,
    pub state: Option<StateCredentials>,
    pub redirect_url: Option<String>,
    pub success: bool,

    failure: Option<AppError>,
}

impl ValidationContext {
    pub fn new(method: Method, uri: Uri, headers: HeaderMap, client_ip: Option<IpAddr>) -> Self {
        Self {
            method,
            uri,
            headers,
            client_ip,
            provider_id: None,
            token: None,
            code: None,
            claims: None,
            state: None,
            redirect_url: None,
            success: false,
            failure: None,
        }
    }

    pub fn from_request(request: &RequestInfo) -> Self {
        Self::new(
            request.method().clone(),
            request.uri().clone(),
            request.headers().clone(),
            request.client_ip(),
        )
    }

    pub fn path(&self) -> &str {
        self.uri.path()
    }

    /// Record why the chain stopped. Always returns `false` so handlers can
    /// `return ctx.fail(...)`.
    pub fn fail(&mut self, error: impl Into<AppError>) -> bool {
        self.failure = Some(error.into());
        false
    }

    pub fn failure(&self) -> Option<&AppError> {
        self.failure.as_ref()
    }

    pub fn take_failure(&mut self) -> Option<AppError> {
        self.failure.take()
    }
}
