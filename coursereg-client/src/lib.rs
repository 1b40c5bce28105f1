//! Client side contract for the course registration REST API.
//!
//! The actual transport (and authentication) is provided by the embedding application through
//! the [`HttpApiClient`] trait. This crate only describes the requests and interprets the
//! responses, turning failures into the normalized [`Error`] taxonomy.

#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]

use std::future::Future;

use http::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

mod error;

pub use error::{
    default_status_message, Error, ErrorBody, ErrorKind, ValidationErrors, GENERIC_ERROR_MESSAGE,
};

mod api_path_builder;
pub use api_path_builder::ApiPathBuilder;

const CONTENT_TYPE_JSON: &str = "application/json";

/// HTTP client backend trait. This should be implemented for a HTTP client capable of making
/// *authenticated* requests to the course registration API.
///
/// The returned future must only fail when no response was received at all, which should be
/// reported as [`Error::NetworkFailure`]. Any HTTP status is a successful response here and is
/// classified by [`HttpApiResponse`].
pub trait HttpApiClient {
    /// An API call should return a status code and the raw body.
    type ResponseFuture<'a>: Future<Output = Result<HttpApiResponse, Error>> + 'a
    where
        Self: 'a;

    /// An *authenticated* asynchronous request with a path and query component (no hostname), and
    /// an optional JSON body, of which the response body is read to completion.
    fn request<'a, T>(
        &'a self,
        method: Method,
        path_and_query: &'a str,
        params: Option<T>,
    ) -> Self::ResponseFuture<'a>
    where
        T: Serialize + 'a;

    /// Calls `self.request` with `Method::GET` and `None` for the body.
    fn get<'a>(&'a self, path_and_query: &'a str) -> Self::ResponseFuture<'a> {
        self.request(Method::GET, path_and_query, None::<()>)
    }

    /// Calls `self.request` with `Method::POST`.
    fn post<'a, T>(&'a self, path_and_query: &'a str, params: &'a T) -> Self::ResponseFuture<'a>
    where
        T: ?Sized + Serialize,
    {
        self.request(Method::POST, path_and_query, Some(params))
    }

    /// Calls `self.request` with `Method::PUT`.
    fn put<'a, T>(&'a self, path_and_query: &'a str, params: &'a T) -> Self::ResponseFuture<'a>
    where
        T: ?Sized + Serialize,
    {
        self.request(Method::PUT, path_and_query, Some(params))
    }

    /// Calls `self.request` with `Method::DELETE` and `None` for the body.
    fn delete<'a>(&'a self, path_and_query: &'a str) -> Self::ResponseFuture<'a> {
        self.request(Method::DELETE, path_and_query, None::<()>)
    }
}

/// A response from the HTTP API as required by the [`HttpApiClient`] trait.
#[derive(Clone, Debug)]
pub struct HttpApiResponse {
    pub status: u16,
    pub content_type: Option<String>,
    pub body: Vec<u8>,
}

/// The envelope of list endpoints.
#[derive(Deserialize)]
struct ListResponse<T> {
    data: Vec<T>,
}

impl HttpApiResponse {
    /// A JSON response with the given status.
    pub fn json(status: u16, body: &Value) -> Self {
        Self {
            status,
            content_type: Some(CONTENT_TYPE_JSON.to_string()),
            body: body.to_string().into_bytes(),
        }
    }

    /// A response without a body, such as `204 No Content` or a bare error status.
    pub fn empty(status: u16) -> Self {
        Self {
            status,
            content_type: None,
            body: Vec::new(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Turn a non-success response into the matching [`Error`].
    pub fn check(self) -> Result<Self, Error> {
        if self.is_success() {
            return Ok(self);
        }
        let status = StatusCode::from_u16(self.status).map_err(|_| {
            Error::Unknown(format!("invalid status code {} in response", self.status))
        })?;
        Err(Error::from_response(status, &self.body))
    }

    /// Expect a JSON response and decode it into `T`.
    pub fn expect_json<T>(self) -> Result<T, Error>
    where
        T: DeserializeOwned,
    {
        let this = self.check()?;
        this.assert_json_content_type()?;
        serde_json::from_slice(&this.body)
            .map_err(|err| Error::bad_api("failed to parse api response", err))
    }

    /// Expect a `{"data": [...]}` list response.
    pub fn expect_list<T>(self) -> Result<Vec<T>, Error>
    where
        T: DeserializeOwned,
    {
        Ok(self.expect_json::<ListResponse<T>>()?.data)
    }

    /// Accept any successful response, deciding success by the status alone.
    ///
    /// A JSON body is decoded, an empty one maps to [`Value::Null`] and anything else is kept
    /// as a [`Value::String`] of its (lossy UTF-8) text.
    pub fn expect_success(self) -> Result<Value, Error> {
        let this = self.check()?;
        if this.body.iter().all(u8::is_ascii_whitespace) {
            return Ok(Value::Null);
        }
        match serde_json::from_slice(&this.body) {
            Ok(value) => Ok(value),
            Err(_) => Ok(Value::String(String::from_utf8_lossy(&this.body).into_owned())),
        }
    }

    // A missing Content-Type is tolerated, the body parser has the final word.
    fn assert_json_content_type(&self) -> Result<(), Error> {
        match self
            .content_type
            .as_deref()
            .and_then(|v| v.split(';').next())
            .map(str::trim)
        {
            Some(CONTENT_TYPE_JSON) | None => Ok(()),
            Some(other) => Err(Error::Unknown(format!("expected json body, got {other}"))),
        }
    }
}

impl<C> HttpApiClient for &C
where
    C: HttpApiClient,
{
    type ResponseFuture<'a>
        = C::ResponseFuture<'a>
    where
        Self: 'a;

    fn request<'a, T>(
        &'a self,
        method: Method,
        path_and_query: &'a str,
        params: Option<T>,
    ) -> Self::ResponseFuture<'a>
    where
        T: Serialize + 'a,
    {
        C::request(self, method, path_and_query, params)
    }
}

impl<C> HttpApiClient for std::sync::Arc<C>
where
    C: HttpApiClient,
{
    type ResponseFuture<'a>
        = C::ResponseFuture<'a>
    where
        Self: 'a;

    fn request<'a, T>(
        &'a self,
        method: Method,
        path_and_query: &'a str,
        params: Option<T>,
    ) -> Self::ResponseFuture<'a>
    where
        T: Serialize + 'a,
    {
        C::request(self, method, path_and_query, params)
    }
}

impl<C> HttpApiClient for std::rc::Rc<C>
where
    C: HttpApiClient,
{
    type ResponseFuture<'a>
        = C::ResponseFuture<'a>
    where
        Self: 'a;

    fn request<'a, T>(
        &'a self,
        method: Method,
        path_and_query: &'a str,
        params: Option<T>,
    ) -> Self::ResponseFuture<'a>
    where
        T: Serialize + 'a,
    {
        C::request(self, method, path_and_query, params)
    }
}
