//! Change detection between two Definitions.
//!
//! Hosts compare by position: the store returns them sorted, so unchanged
//! data traverses identically. Directors compare by name, so their order
//! never matters.

use std::fmt;

use crate::model::{Definition, Director, Host};

/// First difference found between two Definitions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Change {
    /// Nothing was recorded yet.
    FirstRun,
    HostCount { current: usize, previous: usize },
    /// Host at `index` differs in name or rules.
    Host { index: usize, name: String },
    DirectorCount { current: usize, previous: usize },
    /// Director present now but not before.
    DirectorAdded(String),
    /// Director whose backends changed.
    Backends(String),
}

impl fmt::Display for Change {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Change::FirstRun => write!(f, "no previous definition"),
            Change::HostCount { current, previous } => {
                write!(f, "host count {} -> {}", previous, current)
            }
            Change::Host { index, name } => write!(f, "host #{} ({}) changed", index, name),
            Change::DirectorCount { current, previous } => {
                write!(f, "director count {} -> {}", previous, current)
            }
            Change::DirectorAdded(name) => write!(f, "director {} added", name),
            Change::Backends(name) => write!(f, "backends of {} changed", name),
        }
    }
}

/// Describe the first material difference, or `None` if there is none.
pub fn diff(current: &Definition, previous: Option<&Definition>) -> Option<Change> {
    let Some(previous) = previous else {
        return Some(Change::FirstRun);
    };

    if current.hosts.len() != previous.hosts.len() {
        return Some(Change::HostCount {
            current: current.hosts.len(),
            previous: previous.hosts.len(),
        });
    }

    if current.directors.len() != previous.directors.len() {
        return Some(Change::DirectorCount {
            current: current.directors.len(),
            previous: previous.directors.len(),
        });
    }

    for (index, (now, before)) in current.hosts.iter().zip(&previous.hosts).enumerate() {
        if !same_host(now, before) {
            return Some(Change::Host {
                index,
                name: now.name.clone(),
            });
        }
    }

    for (name, now) in &current.directors {
        match previous.directors.get(name) {
            None => return Some(Change::DirectorAdded(name.clone())),
            Some(before) if !same_backends(now, before) => {
                return Some(Change::Backends(name.clone()))
            }
            Some(_) => {}
        }
    }

    None
}

/// True when `current` must be applied.
pub fn changed(current: &Definition, previous: Option<&Definition>) -> bool {
    diff(current, previous).is_some()
}

fn same_host(a: &Host, b: &Host) -> bool {
    a.name == b.name && a.paths.len() == b.paths.len() && a.paths.iter().zip(&b.paths).all(|(x, y)| x == y)
}

fn same_backends(a: &Director, b: &Director) -> bool {
    a.name == b.name
        && a.backends.len() == b.backends.len()
        && a.backends.iter().zip(&b.backends).all(|(x, y)| x == y)
}
