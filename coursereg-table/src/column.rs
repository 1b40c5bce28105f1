use std::fmt;
use std::rc::Rc;

use serde_json::Value;

/// How a column gets its value out of a row.
pub enum Accessor<T> {
    /// A top level field of the serialized row.
    Field(String),

    /// A dot separated path into nested objects, e.g. `student.full_name`. Numeric components
    /// index into arrays.
    Path(Vec<String>),

    /// Custom rendering. Returning `None` shows the column's placeholder.
    Render(Rc<dyn Fn(&T) -> Option<String>>),
}

impl<T> Clone for Accessor<T> {
    fn clone(&self) -> Self {
        match self {
            Accessor::Field(field) => Accessor::Field(field.clone()),
            Accessor::Path(path) => Accessor::Path(path.clone()),
            Accessor::Render(render) => Accessor::Render(Rc::clone(render)),
        }
    }
}

impl<T> fmt::Debug for Accessor<T> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Accessor::Field(field) => f.debug_tuple("Field").field(field).finish(),
            Accessor::Path(path) => f.debug_tuple("Path").field(path).finish(),
            Accessor::Render(_) => f.write_str("Render(..)"),
        }
    }
}

impl<T> Accessor<T> {
    /// Parse an accessor key, a key containing dots becomes a [`Path`](Accessor::Path).
    pub fn parse(key: &str) -> Self {
        if key.contains('.') {
            Accessor::Path(key.split('.').map(str::to_string).collect())
        } else {
            Accessor::Field(key.to_string())
        }
    }

    /// Whether resolving needs the row as JSON.
    pub(crate) fn needs_json(&self) -> bool {
        !matches!(self, Accessor::Render(_))
    }
}

/// One column of a table: where its value comes from and how it is labelled.
#[derive(Debug)]
pub struct Column<T> {
    key: String,
    header: String,
    accessor: Accessor<T>,
    placeholder: Option<String>,
}

impl<T> Clone for Column<T> {
    fn clone(&self) -> Self {
        Self {
            key: self.key.clone(),
            header: self.header.clone(),
            accessor: self.accessor.clone(),
            placeholder: self.placeholder.clone(),
        }
    }
}

impl<T> Column<T> {
    /// A column showing the (possibly nested) field `key`.
    pub fn new(key: impl Into<String>, header: impl Into<String>) -> Self {
        let key = key.into();
        Self {
            accessor: Accessor::parse(&key),
            key,
            header: header.into(),
            placeholder: None,
        }
    }

    /// A column rendered by `render`, e.g. a status flag shown as `Active`/`Inactive`.
    pub fn render<F>(key: impl Into<String>, header: impl Into<String>, render: F) -> Self
    where
        F: Fn(&T) -> Option<String> + 'static,
    {
        Self {
            key: key.into(),
            header: header.into(),
            accessor: Accessor::Render(Rc::new(render)),
            placeholder: None,
        }
    }

    /// Shown instead of missing values, overriding the table wide placeholder.
    pub fn placeholder(mut self, placeholder: impl Into<String>) -> Self {
        self.placeholder = Some(placeholder.into());
        self
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn header(&self) -> &str {
        &self.header
    }

    pub fn accessor(&self) -> &Accessor<T> {
        &self.accessor
    }

    /// Resolve the cell of this column for `row`.
    ///
    /// `json` is the serialized row, `None` if serializing failed. Missing values of any kind
    /// resolve to the placeholder, never to an error.
    pub fn resolve(&self, row: &T, json: Option<&Value>, default_placeholder: &str) -> String {
        let value = match &self.accessor {
            Accessor::Render(render) => render(row),
            Accessor::Field(field) => json
                .and_then(|json| json.get(field.as_str()))
                .and_then(format_value),
            Accessor::Path(path) => json
                .and_then(|json| lookup_path(json, path))
                .and_then(format_value),
        };

        value.unwrap_or_else(|| {
            self.placeholder
                .as_deref()
                .unwrap_or(default_placeholder)
                .to_string()
        })
    }
}

/// Walk `path` through nested objects (and arrays, for numeric components).
pub fn lookup_path<'a, S: AsRef<str>>(value: &'a Value, path: &[S]) -> Option<&'a Value> {
    path.iter().try_fold(value, |current, component| {
        let component = component.as_ref();
        match current {
            Value::Object(map) => map.get(component),
            Value::Array(items) => component.parse::<usize>().ok().and_then(|i| items.get(i)),
            _ => None,
        }
    })
}

/// Display text of a JSON value, `None` for `null`.
pub fn format_value(value: &Value) -> Option<String> {
    Some(match value {
        Value::Null => return None,
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.clone(),
        Value::Array(_) | Value::Object(_) => value.to_string(),
    })
}
