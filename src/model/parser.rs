//! Tree snapshot → Definition.
//!
//! # Responsibilities
//! - Read host path rules from `<prefix>/hosts/<host>/locations/<key>/{path,upstream,vcl}`
//! - Create a director for every name a retained rule references
//! - Attach endpoints from `<prefix>/upstreams/<director>/endpoints/<n>`
//! - Report every dropped item with the key and reason
//!
//! # Design Decisions
//! - Bad items are skipped, never fatal
//! - Directors are created before any backend is read so empty pools still
//!   render
//! - Upstream subtrees nobody routes to are ignored
//! - No regex: sanitizing is a character filter

use thiserror::Error;
use url::Url;

use crate::model::{Definition, Director, Host, PathRule};
use crate::store::TreeNode;

const DEFAULT_PORT: u16 = 80;

/// Why an endpoint value was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EndpointError {
    #[error("invalid address '{0}', expected http://address:port")]
    InvalidAddress(String),

    #[error("endpoint '{0}' must provide a host")]
    MissingHost(String),
}

/// An item dropped while parsing.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseSkip {
    #[error("found {host}/{path_key} but missing components [{}], ignoring", .missing.join(","))]
    IncompleteRule {
        host: String,
        path_key: String,
        missing: Vec<&'static str>,
    },

    #[error("skipping endpoint {key} of director {director}: {error}")]
    InvalidEndpoint {
        director: String,
        key: String,
        error: EndpointError,
    },
}

impl ParseSkip {
    fn log(&self) {
        match self {
            ParseSkip::IncompleteRule { host, path_key, missing } => tracing::warn!(
                host = %host,
                path_key = %path_key,
                missing = %missing.join(","),
                "{}", self
            ),
            ParseSkip::InvalidEndpoint { director, key, .. } => tracing::error!(
                director = %director,
                key = %key,
                "{}", self
            ),
        }
    }
}

/// A parsed Definition plus everything that was dropped on the way.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParseReport {
    pub definition: Definition,
    pub skipped: Vec<ParseSkip>,
}

/// Strip every character that is not an ASCII letter, digit or underscore.
pub fn sanitize(name: &str) -> String {
    name.chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_')
        .collect()
}

/// Parse `scheme://host[:port]` into address and port.
///
/// Hosts come back normalized by the URL parser (lowercased, percent-decoded,
/// IPv6 without brackets). A missing port defaults to 80; a port that does
/// not parse as a `u16` becomes 0.
pub fn parse_endpoint(endpoint: &str) -> Result<(String, u16), EndpointError> {
    let invalid = || EndpointError::InvalidAddress(endpoint.to_string());
    let missing_host = || EndpointError::MissingHost(endpoint.to_string());

    let trimmed = endpoint.trim();
    let (authority_start, authority) = raw_authority(trimmed).ok_or_else(invalid)?;
    // `http:///path` would otherwise parse with `path` as its host.
    if host_part(authority).is_empty() {
        return Err(missing_host());
    }

    let (url, port_parsed) = match Url::parse(trimmed) {
        Ok(url) => (url, true),
        Err(url::ParseError::InvalidPort) => {
            let suffix = port_suffix(authority).map_or(0, |p| p.len() + 1);
            let host_end = authority_start + authority.len() - suffix;
            let without_port = format!("{}{}", &trimmed[..host_end], &trimmed[authority_start + authority.len()..]);
            (Url::parse(&without_port).map_err(|_| invalid())?, false)
        }
        Err(url::ParseError::EmptyHost) => return Err(missing_host()),
        Err(_) => return Err(invalid()),
    };

    if url.cannot_be_a_base() {
        return Err(invalid());
    }

    let address = match url.host() {
        Some(url::Host::Domain(domain)) if !domain.is_empty() => domain.to_string(),
        Some(url::Host::Ipv4(ip)) => ip.to_string(),
        Some(url::Host::Ipv6(ip)) => ip.to_string(),
        _ => return Err(missing_host()),
    };

    let port = match (port_parsed, url.port()) {
        (false, _) => 0,
        (true, Some(port)) => port,
        // The parser drops an explicit port equal to the scheme default.
        (true, None) => match port_suffix(authority) {
            None => DEFAULT_PORT,
            Some("") => 0,
            Some(_) => url.port_or_known_default().unwrap_or(DEFAULT_PORT),
        },
    };

    Ok((address, port))
}

/// Offset and text of the authority between `://` and the path.
fn raw_authority(endpoint: &str) -> Option<(usize, &str)> {
    let start = endpoint.find("://")? + 3;
    let rest = &endpoint[start..];
    let end = rest.find(['/', '?', '#']).unwrap_or(rest.len());
    Some((start, &rest[..end]))
}

fn host_and_port(authority: &str) -> (&str, Option<&str>) {
    let host_port = authority.rsplit_once('@').map_or(authority, |(_, host_port)| host_port);
    match host_port.find(']') {
        Some(close) if host_port.starts_with('[') => {
            (&host_port[..=close], host_port[close + 1..].strip_prefix(':'))
        }
        _ => match host_port.split_once(':') {
            Some((host, port)) => (host, Some(port)),
            None => (host_port, None),
        },
    }
}

fn host_part(authority: &str) -> &str {
    host_and_port(authority).0
}

fn port_suffix(authority: &str) -> Option<&str> {
    host_and_port(authority).1
}

/// Parse both snapshots into a Definition, logging every dropped item.
pub fn parse(hosts: &TreeNode, upstreams: &TreeNode) -> Definition {
    let report = parse_with_report(hosts, upstreams);
    for skip in &report.skipped {
        skip.log();
    }
    report.definition
}

/// Parse both snapshots, returning dropped items as data instead of logging.
pub fn parse_with_report(hosts: &TreeNode, upstreams: &TreeNode) -> ParseReport {
    let mut report = ParseReport::default();

    for host_node in &hosts.nodes {
        let host = parse_host(host_node, &mut report.skipped);
        if host.paths.is_empty() {
            tracing::debug!(host = %host.name, "Host has no usable path rules, dropping");
            continue;
        }

        for rule in &host.paths {
            report
                .definition
                .directors
                .entry(rule.director.clone())
                .or_insert_with(|| Director::new(rule.director.clone()));
        }
        report.definition.hosts.push(host);
    }

    for upstream in &upstreams.nodes {
        let name = sanitize(upstream.name());
        let Some(director) = report.definition.directors.get_mut(&name) else {
            tracing::debug!(upstream = %upstream.key, "No path rule routes to upstream, ignoring");
            continue;
        };

        for endpoint in upstream.children_named("endpoints").flat_map(|e| e.nodes.iter()) {
            match parse_endpoint(endpoint.value_str()) {
                Ok((address, port)) => director.push_backend(address, port),
                Err(error) => report.skipped.push(ParseSkip::InvalidEndpoint {
                    director: name.clone(),
                    key: endpoint.key.clone(),
                    error,
                }),
            }
        }
    }

    report
}

fn parse_host(node: &TreeNode, skipped: &mut Vec<ParseSkip>) -> Host {
    let name = node.name().to_string();
    let mut paths = Vec::new();

    for path_node in node.children_named("locations").flat_map(|l| l.nodes.iter()) {
        match parse_path_rule(&name, path_node) {
            Ok(rule) => paths.push(rule),
            Err(skip) => skipped.push(skip),
        }
    }

    Host { name, paths }
}

fn parse_path_rule(host: &str, node: &TreeNode) -> Result<PathRule, ParseSkip> {
    let mut path = "";
    let mut upstream = "";
    let mut vcl = "";

    for field in &node.nodes {
        match field.name() {
            "path" => path = field.value_str(),
            "upstream" => upstream = field.value_str(),
            "vcl" => vcl = field.value_str(),
            _ => {}
        }
    }

    let director = sanitize(upstream);

    let mut missing = Vec::new();
    if path.is_empty() {
        missing.push("path");
    }
    // A name made only of punctuation sanitizes to nothing.
    if director.is_empty() {
        missing.push("upstream");
    }
    if vcl.is_empty() {
        missing.push("vcl");
    }

    if !missing.is_empty() {
        return Err(ParseSkip::IncompleteRule {
            host: host.to_string(),
            path_key: node.name().to_string(),
            missing,
        });
    }

    Ok(PathRule {
        path: path.to_string(),
        director,
        vcl: vcl.to_string(),
    })
}
