//! Error taxonomy for backend calls and derivation of user facing messages.

use std::fmt;

use http::StatusCode;
use serde::de::{self, Deserializer, MapAccess, Visitor};
use serde::{Deserialize, Serialize, Serializer};

/// Used when an error carries nothing more specific to show.
pub const GENERIC_ERROR_MESSAGE: &str = "An unexpected error occurred";

/// The fixed message shown for a status code when the response body does not provide one.
pub fn default_status_message(status: StatusCode) -> Option<&'static str> {
    Some(match status.as_u16() {
        400 => "Invalid request. Please check your input.",
        401 => "You are not authenticated. Please log in.",
        403 => "You do not have permission to perform this action.",
        404 => "The requested resource was not found.",
        422 => "Validation failed. Please check your input.",
        500 => "Server error. Please try again later.",
        _ => return None,
    })
}

/// Per-field validation messages, in the order the backend sent them.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ValidationErrors(Vec<(String, Vec<String>)>);

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a message for `field`, appending to an existing entry.
    pub fn push(&mut self, field: impl Into<String>, message: impl Into<String>) {
        let field = field.into();
        let message = message.into();
        match self.0.iter_mut().find(|(name, _)| *name == field) {
            Some((_, messages)) => messages.push(message),
            None => self.0.push((field, vec![message])),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Messages reported for a single field.
    pub fn field(&self, field: &str) -> Option<&[String]> {
        self.0
            .iter()
            .find(|(name, _)| name == field)
            .map(|(_, messages)| messages.as_slice())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.0
            .iter()
            .map(|(name, messages)| (name.as_str(), messages.as_slice()))
    }

    /// The first message of the first field which has one.
    pub fn first_message(&self) -> Option<&str> {
        self.0
            .iter()
            .find_map(|(_, messages)| messages.first())
            .map(String::as_str)
    }
}

impl Serialize for ValidationErrors {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_map(self.0.iter().map(|(k, v)| (k, v)))
    }
}

// Some backends send a plain string instead of a list for single messages.
#[derive(Deserialize)]
#[serde(untagged)]
enum OneOrMany {
    One(String),
    Many(Vec<String>),
}

impl<'de> Deserialize<'de> for ValidationErrors {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct ErrorsVisitor;

        impl<'de> Visitor<'de> for ErrorsVisitor {
            type Value = ValidationErrors;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a map of field names to validation messages")
            }

            fn visit_map<A>(self, mut map: A) -> Result<Self::Value, A::Error>
            where
                A: MapAccess<'de>,
            {
                let mut errors = Vec::with_capacity(map.size_hint().unwrap_or(0));
                while let Some((field, messages)) = map.next_entry::<String, OneOrMany>()? {
                    let messages = match messages {
                        OneOrMany::One(message) => vec![message],
                        OneOrMany::Many(messages) => messages,
                    };
                    errors.push((field, messages));
                }
                Ok(ValidationErrors(errors))
            }

            fn visit_unit<E: de::Error>(self) -> Result<Self::Value, E> {
                Ok(ValidationErrors::default())
            }
        }

        deserializer.deserialize_any(ErrorsVisitor)
    }
}

// An `errors` member of any other shape is dropped instead of failing the whole body, so the
// top level `message` survives.
fn deserialize_lenient_errors<'de, D>(deserializer: D) -> Result<Option<ValidationErrors>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Lenient {
        Errors(ValidationErrors),
        Other(de::IgnoredAny),
    }

    Ok(match Lenient::deserialize(deserializer)? {
        Lenient::Errors(errors) => Some(errors),
        Lenient::Other(_) => None,
    })
}

/// The normalized error body: `{ "message": ..., "errors": { field: [messages] } }`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct ErrorBody {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    #[serde(
        default,
        deserialize_with = "deserialize_lenient_errors",
        skip_serializing_if = "Option::is_none"
    )]
    pub errors: Option<ValidationErrors>,
}

impl ErrorBody {
    /// Parse an error body, returning `None` for empty or non-JSON bodies.
    pub fn parse(body: &[u8]) -> Option<Self> {
        if body.iter().all(u8::is_ascii_whitespace) {
            return None;
        }
        serde_json::from_slice(body).ok()
    }

    fn has_validation_errors(&self) -> bool {
        self.errors
            .as_ref()
            .is_some_and(|errors| !errors.is_empty())
    }
}

/// The kind of failure, without any of the details.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    NetworkFailure,
    ClientError,
    ServerError,
    ValidationError,
    Unknown,
}

/// Error of a backend call.
#[derive(Clone, Debug, thiserror::Error)]
pub enum Error {
    /// No response was received.
    #[error("{0}")]
    NetworkFailure(String),

    /// The backend answered with a 4xx status.
    #[error("Request failed with status code {}", .status.as_u16())]
    Client {
        status: StatusCode,
        body: Option<ErrorBody>,
    },

    /// The backend answered with a 5xx status.
    #[error("Request failed with status code {}", .status.as_u16())]
    Server {
        status: StatusCode,
        body: Option<ErrorBody>,
    },

    /// A 422 response with structured per-field messages.
    #[error("Request failed with status code {}", .status.as_u16())]
    Validation { status: StatusCode, body: ErrorBody },

    /// Anything that is not shaped like an HTTP error, such as an undecodable response.
    #[error("{0}")]
    Unknown(String),
}

impl Error {
    /// Classify a non-success response.
    pub fn from_response(status: StatusCode, body: &[u8]) -> Self {
        let body = ErrorBody::parse(body);

        if status == StatusCode::UNPROCESSABLE_ENTITY {
            if let Some(body) = body.as_ref().filter(|body| body.has_validation_errors()) {
                return Error::Validation {
                    status,
                    body: body.clone(),
                };
            }
        }

        if status.is_client_error() {
            Error::Client { status, body }
        } else if status.is_server_error() {
            Error::Server { status, body }
        } else {
            let code = status.as_u16();
            Error::Unknown(format!("Request failed with status code {code}"))
        }
    }

    pub fn network<T: fmt::Display>(msg: T) -> Self {
        Error::NetworkFailure(msg.to_string())
    }

    /// The API behaved unexpectedly, e.g. it returned a body we cannot decode.
    pub fn bad_api<T: fmt::Display>(msg: &str, err: T) -> Self {
        Error::Unknown(format!("{msg} - {err}"))
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::NetworkFailure(_) => ErrorKind::NetworkFailure,
            Error::Client { .. } => ErrorKind::ClientError,
            Error::Server { .. } => ErrorKind::ServerError,
            Error::Validation { .. } => ErrorKind::ValidationError,
            Error::Unknown(_) => ErrorKind::Unknown,
        }
    }

    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Error::Client { status, .. }
            | Error::Server { status, .. }
            | Error::Validation { status, .. } => Some(*status),
            Error::NetworkFailure(_) | Error::Unknown(_) => None,
        }
    }

    pub fn body(&self) -> Option<&ErrorBody> {
        match self {
            Error::Client { body, .. } | Error::Server { body, .. } => body.as_ref(),
            Error::Validation { body, .. } => Some(body),
            Error::NetworkFailure(_) | Error::Unknown(_) => None,
        }
    }

    /// All per-field validation messages the backend reported, if any.
    pub fn validation_errors(&self) -> Option<&ValidationErrors> {
        self.body()
            .and_then(|body| body.errors.as_ref())
            .filter(|errors| !errors.is_empty())
    }

    /// The message to show to the user.
    ///
    /// Precedence: the first field validation message, the body's `message`, the fixed message
    /// for the status code, the error's own message and finally [`GENERIC_ERROR_MESSAGE`].
    pub fn message(&self) -> String {
        if let Some(body) = self.body() {
            if let Some(message) = body.errors.as_ref().and_then(|e| e.first_message()) {
                return message.to_string();
            }
            if let Some(message) = body.message.as_deref().filter(|m| !m.is_empty()) {
                return message.to_string();
            }
        }

        if let Some(message) = self.status().and_then(default_status_message) {
            return message.to_string();
        }

        let raw = self.to_string();
        if raw.is_empty() {
            GENERIC_ERROR_MESSAGE.to_string()
        } else {
            raw
        }
    }
}

impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Error::Unknown(format!("{err:#}"))
    }
}
