//! Endpoint normalization for the remote launch service.
//!
//! Users type the device address in whatever shape they copied it: a bare
//! IPv4 address, with an `http://` or `https://` prefix, with a trailing
//! slash, sometimes with a port. All of that collapses into a host plus the
//! fixed service port before any transport address is built. A port typed
//! by the user is discarded; the launch service only listens on
//! [`SERVICE_PORT`].

use std::fmt;

use crate::error::EndpointError;

/// Port the launch service listens on.
pub const SERVICE_PORT: u16 = 7497;

/// Scheme the user supplied, kept only for the direct launch URL.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Scheme {
    Http,
    Https,
}

impl Scheme {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Http => "http",
            Self::Https => "https",
        }
    }
}

/// Normalized address of a remote device.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Endpoint {
    scheme: Option<Scheme>,
    host: String,
    port: u16,
}

impl Endpoint {
    /// Parse and normalize user input.
    ///
    /// # Errors
    ///
    /// Returns [`EndpointError::Empty`] for blank input and
    /// [`EndpointError::InvalidAddress`] when the host is neither a dotted
    /// IPv4 address with octets in range nor a plain host name.
    pub fn parse(raw: &str) -> Result<Self, EndpointError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(EndpointError::Empty);
        }
        let invalid = || EndpointError::InvalidAddress(trimmed.to_owned());

        let (scheme, rest) = strip_scheme(trimmed);
        let rest = rest.trim_end_matches('/');
        if rest.contains('/') {
            return Err(invalid());
        }

        let host = match rest.split_once(':') {
            Some((host, port)) => {
                if port.is_empty() || port.parse::<u16>().is_err() {
                    return Err(invalid());
                }
                host
            }
            None => rest,
        };

        if !is_valid_host(host) {
            return Err(invalid());
        }

        Ok(Self {
            scheme,
            host: host.to_ascii_lowercase(),
            port: SERVICE_PORT,
        })
    }

    /// Override the service port. Used to point at a local stand-in device.
    #[must_use]
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }

    #[must_use]
    pub fn port(&self) -> u16 {
        self.port
    }

    #[must_use]
    pub fn scheme(&self) -> Option<Scheme> {
        self.scheme
    }

    /// `host:port`, with no scheme and no trailing slash.
    #[must_use]
    pub fn authority(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Transport URL. Always plain `ws://`, whatever scheme was typed.
    #[must_use]
    pub fn ws_url(&self) -> String {
        format!("ws://{}", self.authority())
    }

    /// URL of the side-channel launcher that bypasses the RPC link.
    ///
    /// The path is component-encoded, then `/` and space are restored so the
    /// device sees the library path as typed.
    #[must_use]
    pub fn direct_launch_url(&self, path: &str) -> String {
        let scheme = self.scheme.unwrap_or(Scheme::Http).as_str();
        format!("{scheme}://{}/l/{}", self.authority(), encode_launch_path(path))
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.authority())
    }
}

impl std::str::FromStr for Endpoint {
    type Err = EndpointError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

fn strip_scheme(input: &str) -> (Option<Scheme>, &str) {
    for (prefix, scheme) in [("https://", Scheme::Https), ("http://", Scheme::Http)] {
        if input
            .get(..prefix.len())
            .is_some_and(|head| head.eq_ignore_ascii_case(prefix))
        {
            return (Some(scheme), &input[prefix.len()..]);
        }
    }
    (None, input)
}

fn is_valid_host(host: &str) -> bool {
    if host.is_empty() {
        return false;
    }
    if host.chars().all(|c| c.is_ascii_digit() || c == '.') {
        return is_valid_ipv4(host);
    }
    host.chars().all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '-')
        && !host.starts_with(['.', '-'])
        && !host.ends_with(['.', '-'])
        && !host.contains("..")
}

fn is_valid_ipv4(host: &str) -> bool {
    let octets: Vec<&str> = host.split('.').collect();
    octets.len() == 4
        && octets
            .iter()
            .all(|o| (1..=3).contains(&o.len()) && o.parse::<u8>().is_ok())
}

/// `encodeURIComponent` semantics, then `%2F` and `%20` put back.
fn encode_launch_path(path: &str) -> String {
    urlencoding::encode(path)
        .replace("%21", "!")
        .replace("%27", "'")
        .replace("%28", "(")
        .replace("%29", ")")
        .replace("%2A", "*")
        .replace("%2F", "/")
        .replace("%20", " ")
}

#[cfg(test)]
#[path = "endpoint_test.rs"]
mod tests;
