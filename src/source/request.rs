//! Request descriptors.

use std::fmt;

/// Address of the admon daemon.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DaemonAddress {
    pub host: String,
    pub port: u16,
}

impl DaemonAddress {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// Base URL of the daemon, without a trailing slash.
    pub fn base_url(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }

    /// Full URL of an endpoint such as `XML_GetNonce`.
    pub fn endpoint_url(&self, endpoint: &str) -> String {
        format!("{}/{}", self.base_url(), endpoint.trim_start_matches('/'))
    }

    /// A request descriptor targeting an endpoint.
    pub fn request(&self, endpoint: &str) -> RequestDescriptor {
        RequestDescriptor::new(self.endpoint_url(endpoint))
    }
}

impl Default for DaemonAddress {
    fn default() -> Self {
        Self::new("localhost", 8000)
    }
}

impl fmt::Display for DaemonAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// A URL plus ordered query parameters.
///
/// Views adjust parameters (time spans, id types, sequence ids) between
/// refresh cycles; the next poll picks up the current state.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RequestDescriptor {
    url: String,
    params: Vec<(String, String)>,
}

impl RequestDescriptor {
    /// Create a descriptor without parameters.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            params: Vec::new(),
        }
    }

    /// Add or replace a parameter, builder style.
    pub fn with_param(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.set_param(key, value);
        self
    }

    /// The target URL, without parameters.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Replace the target URL, keeping the parameters.
    pub fn set_url(&mut self, url: impl Into<String>) {
        self.url = url.into();
    }

    /// Parameters in insertion order.
    pub fn params(&self) -> &[(String, String)] {
        &self.params
    }

    /// Value of a parameter.
    pub fn param(&self, key: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Set a parameter. An existing key keeps its position.
    pub fn set_param(&mut self, key: impl Into<String>, value: impl ToString) {
        let key = key.into();
        let value = value.to_string();
        match self.params.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => self.params.push((key, value)),
        }
    }

    /// Remove a parameter. Returns its previous value.
    pub fn remove_param(&mut self, key: &str) -> Option<String> {
        let position = self.params.iter().position(|(k, _)| k == key)?;
        Some(self.params.remove(position).1)
    }
}

impl fmt::Display for RequestDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.url)?;
        let mut separator = if self.url.contains('?') { '&' } else { '?' };
        for (key, value) in &self.params {
            write!(f, "{}{}={}", separator, key, value)?;
            separator = '&';
        }
        Ok(())
    }
}
