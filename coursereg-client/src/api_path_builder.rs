use std::borrow::Cow;
use std::fmt::Display;

use percent_encoding::{AsciiSet, NON_ALPHANUMERIC};

/// Everything but the RFC 3986 unreserved characters gets encoded.
const QUERY_ENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

/// Builder for resource paths with a query.
///
/// Path segments added via [`segment`](Self::segment) and query arguments added via
/// [`arg`](Self::arg) are percent-encoded. Segments must be added before the first argument.
///
/// ```rust
/// use coursereg_client::ApiPathBuilder;
///
/// let course_id = 42;
/// let path = ApiPathBuilder::new("/courses")
///     .segment(course_id)
///     .segment("enroll")
///     .build();
/// assert_eq!(&path, "/courses/42/enroll");
///
/// let query = ApiPathBuilder::new("/users")
///     .arg("per_page", 100)
///     .arg("search", "jane doe")
///     .build();
/// assert_eq!(&query, "/users?per_page=100&search=jane%20doe");
/// ```
#[derive(Clone, Debug)]
pub struct ApiPathBuilder {
    url: String,
    separator: char,
}

impl ApiPathBuilder {
    /// Creates a new builder from a base path.
    ///
    /// A trailing slash is removed so that segments can be appended uniformly.
    pub fn new<'a>(base: impl Into<Cow<'a, str>>) -> Self {
        let mut url = base.into().into_owned();
        url.truncate(url.trim_end_matches('/').len());
        Self {
            url,
            separator: '?',
        }
    }

    /// Appends an encoded path segment, usually an entity id.
    pub fn segment<T: Display>(mut self, segment: T) -> Self {
        debug_assert!(
            self.separator == '?',
            "path segments must be added before query arguments"
        );
        self.url.push('/');
        self.push_encoded(segment.to_string().as_bytes());
        self
    }

    /// Appends a raw sub path (such as `my-courses` or `grade`), which may contain slashes.
    ///
    /// Empty components are skipped, the remaining ones are encoded one by one.
    pub fn sub_path(mut self, sub_path: &str) -> Self {
        for component in sub_path.split('/').filter(|c| !c.is_empty()) {
            self = self.segment(component);
        }
        self
    }

    /// Adds an argument to the query.
    ///
    /// The name and value will be percent-encoded.
    pub fn arg<T: Display>(mut self, name: &str, value: T) -> Self {
        self.push_separator_and_name(name);
        self.push_encoded(value.to_string().as_bytes());
        self
    }

    /// Adds an optional argument to the query.
    ///
    /// Does nothing if the value is `None`. See [`arg`](Self::arg) for more details.
    pub fn maybe_arg<T: Display>(mut self, name: &str, value: &Option<T>) -> Self {
        if let Some(value) = value {
            self = self.arg(name, value);
        }
        self
    }

    /// Adds all `(name, value)` pairs in iteration order.
    pub fn args<I, K, V>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Display,
    {
        for (name, value) in args {
            self = self.arg(name.as_ref(), value);
        }
        self
    }

    /// Builds the url.
    pub fn build(self) -> String {
        self.url
    }

    fn push_separator_and_name(&mut self, name: &str) {
        self.url.push(self.separator);
        self.separator = '&';
        self.push_encoded(name.as_bytes());
        self.url.push('=');
    }

    fn push_encoded(&mut self, value: &[u8]) {
        let enc_value = percent_encoding::percent_encode(value, QUERY_ENCODE_SET);
        self.url.extend(enc_value);
    }
}
