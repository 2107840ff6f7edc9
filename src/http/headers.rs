//! Ordered header handling.
//!
//! # Responsibilities
//! - Keep headers in arrival order (transcripts must reproduce it)
//! - Build the outbound header set from the inbound one
//!
//! # Design Decisions
//! - `HeaderList` is a plain vector of pairs; setting an existing name
//!   replaces the value in place so the original position is kept
//! - Names are lowercase because the HTTP stack normalises them on parse

use axum::http::header::{HeaderMap, HeaderName, HeaderValue, ACCEPT_ENCODING, HOST};
use serde::ser::{Serialize, SerializeMap, Serializer};

use crate::config::Target;

/// An order-preserving list of header name/value pairs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeaderList {
    entries: Vec<(HeaderName, HeaderValue)>,
}

impl HeaderList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a pair without looking for an existing entry.
    pub fn append(&mut self, name: HeaderName, value: HeaderValue) {
        self.entries.push((name, value));
    }

    /// Replace the first entry named `name` in place and drop any later
    /// duplicates; append if absent.
    pub fn set(&mut self, name: HeaderName, value: HeaderValue) {
        match self.entries.iter().position(|(n, _)| *n == name) {
            Some(index) => {
                self.entries[index].1 = value;
                let mut seen = 0usize;
                self.entries.retain(|(n, _)| {
                    if *n == name {
                        seen += 1;
                        seen == 1
                    } else {
                        true
                    }
                });
            }
            None => self.entries.push((name, value)),
        }
    }

    /// Remove every entry named `name`.
    pub fn remove(&mut self, name: &HeaderName) {
        self.entries.retain(|(n, _)| n != name);
    }

    pub fn get(&self, name: &HeaderName) -> Option<&HeaderValue> {
        self.entries.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    pub fn contains(&self, name: &HeaderName) -> bool {
        self.get(name).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&HeaderName, &HeaderValue)> {
        self.entries.iter().map(|(n, v)| (n, v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Build a `HeaderMap` for the wire, preserving repeated values.
    pub fn to_header_map(&self) -> HeaderMap {
        let mut map = HeaderMap::with_capacity(self.entries.len());
        for (name, value) in &self.entries {
            map.append(name.clone(), value.clone());
        }
        map
    }
}

impl From<&HeaderMap> for HeaderList {
    fn from(map: &HeaderMap) -> Self {
        Self {
            entries: map
                .iter()
                .map(|(n, v)| (n.clone(), v.clone()))
                .collect(),
        }
    }
}

impl Serialize for HeaderList {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (name, value) in &self.entries {
            map.serialize_entry(name.as_str(), &String::from_utf8_lossy(value.as_bytes()))?;
        }
        map.end()
    }
}

/// Derive the outbound header set from the inbound one.
///
/// `host` is rewritten to the target's host only when the client sent one;
/// `accept-encoding` is dropped unless compression passes through.
pub fn outbound_headers(
    inbound: &HeaderMap,
    target: &Target,
    pass_through_compression: bool,
) -> HeaderList {
    let mut headers = HeaderList::from(inbound);

    if headers.contains(&HOST) {
        if let Ok(host) = HeaderValue::from_str(&target.host_header()) {
            headers.set(HOST, host);
        }
    }

    if !pass_through_compression {
        headers.remove(&ACCEPT_ENCODING);
    }

    headers
}
