//! Core data types shared by ingestion, persistence and query.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// The identity of a time series: an ordered set of string key/value pairs.
///
/// Two identities with the same pairs are equal regardless of the order in
/// which the pairs were supplied. The [`Display`](fmt::Display) form is a
/// canonical JSON object with keys in sorted order, and is what the
/// persistence layer and the paced worker use as a map key.
///
/// # Example
///
/// ```
/// use rrdb::Ident;
///
/// let a = Ident::from([("name", "cpu"), ("host", "a")]);
/// let b = Ident::from([("host", "a"), ("name", "cpu")]);
/// assert_eq!(a, b);
/// assert_eq!(a.to_string(), r#"{"host":"a","name":"cpu"}"#);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Ident(BTreeMap<String, String>);

impl Ident {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), value.into());
    }

    /// The value of the `name` key, if present.
    pub fn name(&self) -> Option<&str> {
        self.get("name")
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Serializes the identity to its canonical JSON bytes.
    pub fn to_json(&self) -> crate::Result<Vec<u8>> {
        Ok(serde_json::to_vec(&self.0)?)
    }

    /// Parses an identity from JSON bytes produced by [`Ident::to_json`].
    pub fn from_json(bytes: &[u8]) -> crate::Result<Self> {
        Ok(Self(serde_json::from_slice(bytes)?))
    }
}

impl fmt::Display for Ident {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = serde_json::to_string(&self.0).map_err(|_| fmt::Error)?;
        f.write_str(&s)
    }
}

impl<K, V> FromIterator<(K, V)> for Ident
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

impl<K, V, const N: usize> From<[(K, V); N]> for Ident
where
    K: Into<String>,
    V: Into<String>,
{
    fn from(pairs: [(K, V); N]) -> Self {
        pairs.into_iter().collect()
    }
}

/// A single value for a series at a point in time.
#[derive(Debug, Clone, PartialEq)]
pub struct DataPoint {
    pub ident: Ident,
    /// Timestamp in milliseconds since the UNIX epoch.
    pub timestamp_ms: i64,
    pub value: f64,
}
