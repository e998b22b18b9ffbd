//! Identity codec
//!
//! A managed resource is identified by a composite key serialized as its
//! components joined with `.` in a fixed field order. Components are
//! normalized per field before joining, and a component that would still
//! contain the delimiter is rejected rather than escaped, so existing
//! identifiers keep their format.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Separator between identifier components.
pub const DELIMITER: char = '.';

/// Per-field normalization applied before encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Normalize {
    /// Use the value as-is.
    Verbatim,
    /// Remove every occurrence of the given separator.
    Strip(char),
}

impl Normalize {
    /// Apply the normalization to a value.
    pub fn apply(self, value: &str) -> String {
        match self {
            Self::Verbatim => value.to_string(),
            Self::Strip(separator) => value.replace(separator, ""),
        }
    }
}

/// One named component of an identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Field {
    pub name: &'static str,
    pub normalize: Normalize,
}

impl Field {
    /// A field stored exactly as given.
    pub const fn verbatim(name: &'static str) -> Self {
        Self {
            name,
            normalize: Normalize::Verbatim,
        }
    }

    /// A field with `separator` stripped (lossy).
    pub const fn stripped(name: &'static str, separator: char) -> Self {
        Self {
            name,
            normalize: Normalize::Strip(separator),
        }
    }
}

/// The identity layout of one resource kind.
///
/// # Example
///
/// ```
/// use declarative::identity::{Field, IdentityScheme};
///
/// static SCHEME: IdentityScheme = IdentityScheme::new(
///     "circleci_ssh_key",
///     &[
///         Field::verbatim("organization"),
///         Field::verbatim("project"),
///         Field::stripped("fingerprint", ':'),
///     ],
/// );
///
/// let id = SCHEME.encode(&["acme", "widgets", "9e:82:5a"]).unwrap();
/// assert_eq!(id.as_str(), "acme.widgets.9e825a");
///
/// let parts = SCHEME.decode(id.as_str()).unwrap();
/// assert_eq!(parts.get("fingerprint"), Some("9e825a"));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IdentityScheme {
    kind: &'static str,
    fields: &'static [Field],
}

impl IdentityScheme {
    /// Declare a scheme for `kind` with fields in serialization order.
    pub const fn new(kind: &'static str, fields: &'static [Field]) -> Self {
        Self { kind, fields }
    }

    /// Resource kind this scheme belongs to.
    pub fn kind(&self) -> &'static str {
        self.kind
    }

    /// Number of components in an identifier.
    pub fn arity(&self) -> usize {
        self.fields.len()
    }

    /// Human-readable layout, e.g. `{organization}.{project}`.
    pub fn layout(&self) -> String {
        self.fields
            .iter()
            .map(|f| format!("{{{}}}", f.name))
            .collect::<Vec<_>>()
            .join(".")
    }

    /// Encode components into an identifier.
    ///
    /// Fails with [`Error::MalformedIdentifier`] when the component count is
    /// wrong or a normalized component contains the delimiter.
    pub fn encode(&self, components: &[&str]) -> Result<ResourceId> {
        if components.len() != self.arity() {
            return Err(Error::malformed(
                self.kind,
                components.join(&DELIMITER.to_string()),
                format!(
                    "expected {} components ({}), got {}",
                    self.arity(),
                    self.layout(),
                    components.len()
                ),
            ));
        }

        let mut normalized = Vec::with_capacity(components.len());
        for (field, value) in self.fields.iter().zip(components) {
            let value = field.normalize.apply(value);
            if value.contains(DELIMITER) {
                return Err(Error::malformed(
                    self.kind,
                    components.join(&DELIMITER.to_string()),
                    format!(
                        "{} '{}' contains the '{}' delimiter",
                        field.name, value, DELIMITER
                    ),
                ));
            }
            normalized.push(value);
        }

        Ok(ResourceId(normalized.join(&DELIMITER.to_string())))
    }

    /// Decode an identifier into its components.
    ///
    /// The field count is the only thing checked.
    pub fn decode(&self, identifier: &str) -> Result<IdentityParts> {
        let values: Vec<String> = identifier.split(DELIMITER).map(str::to_string).collect();

        if values.len() != self.arity() {
            return Err(Error::malformed(
                self.kind,
                identifier,
                format!(
                    "expected {} fields in the format {}, found {}",
                    self.arity(),
                    self.layout(),
                    values.len()
                ),
            ));
        }

        Ok(IdentityParts {
            fields: self.fields,
            values,
        })
    }
}

/// Serialized identifier of a managed resource.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceId(String);

impl ResourceId {
    /// The identifier string.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consume into the identifier string.
    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ResourceId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Components recovered from an identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentityParts {
    fields: &'static [Field],
    values: Vec<String>,
}

impl IdentityParts {
    /// Look up a component by field name.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .position(|f| f.name == name)
            .map(|i| self.values[i].as_str())
    }

    /// Components in field order.
    pub fn values(&self) -> &[String] {
        &self.values
    }

    /// Consume into components in field order.
    pub fn into_values(self) -> Vec<String> {
        self.values
    }
}
