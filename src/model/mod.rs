//! Routing model subsystem.
//!
//! # Data Flow
//! ```text
//! TreeNode snapshots (hosts, upstreams)
//!     → parser.rs (normalize, sanitize, drop incomplete items)
//!     → Definition (immutable, rebuilt every cycle)
//!     → diff.rs (compare against last recorded Definition)
//!     → render (only when changed)
//! ```
//!
//! # Design Decisions
//! - The whole graph is rebuilt from scratch on every cycle; nothing is
//!   patched in place
//! - Directors are keyed by sanitized name; hosts keep discovery order
//! - Model types serialize directly into the template context

pub mod diff;
pub mod parser;

use serde::Serialize;
use std::collections::BTreeMap;

pub use diff::{changed, diff, Change};
pub use parser::{parse, parse_endpoint, parse_with_report, sanitize, EndpointError, ParseReport, ParseSkip};

/// Root of one parsed snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Definition {
    /// Hosts with at least one valid path rule, in discovery order.
    pub hosts: Vec<Host>,

    /// Directors referenced by retained path rules, keyed by name.
    pub directors: BTreeMap<String, Director>,
}

/// A routable domain name and its rules.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Host {
    pub name: String,
    pub paths: Vec<PathRule>,
}

/// URL pattern routed to a director, with a VCL fragment to splice in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PathRule {
    pub path: String,
    /// Sanitized director name.
    pub director: String,
    pub vcl: String,
}

/// A named pool of backends.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Director {
    pub name: String,
    pub backends: Vec<Backend>,
}

impl Director {
    /// An empty pool.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            backends: Vec::new(),
        }
    }

    /// Append a backend named `<director>_<ordinal>`.
    pub fn push_backend(&mut self, address: String, port: u16) {
        let name = format!("{}_{}", self.name, self.backends.len());
        self.backends.push(Backend { name, address, port });
    }
}

/// One concrete endpoint of a director.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Backend {
    pub name: String,
    pub address: String,
    pub port: u16,
}
