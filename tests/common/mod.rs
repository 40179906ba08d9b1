//! Shared fakes for integration tests.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use vcl_sync::config::{ReloadConfig, StoreConfig};
use vcl_sync::reload::{CommandOutput, CommandRunner, Orchestrator};
use vcl_sync::render::{Renderer, Templates};
use vcl_sync::store::{StoreError, TreeNode, TreeSource};
use vcl_sync::Reconciler;

pub const HOSTS_KEY: &str = "/varnish/hosts";
pub const UPSTREAMS_KEY: &str = "/varnish/upstreams";

/// In-memory store whose contents tests can change between cycles.
#[derive(Clone, Default)]
pub struct FakeStore {
    trees: Arc<Mutex<HashMap<String, TreeNode>>>,
    fetches: Arc<Mutex<usize>>,
}

impl FakeStore {
    pub fn set(&self, key: &str, node: TreeNode) {
        self.trees.lock().unwrap().insert(key.to_string(), node);
    }

    pub fn remove(&self, key: &str) {
        self.trees.lock().unwrap().remove(key);
    }

    pub fn fetches(&self) -> usize {
        *self.fetches.lock().unwrap()
    }
}

impl TreeSource for FakeStore {
    async fn fetch(&self, key: &str) -> Result<TreeNode, StoreError> {
        *self.fetches.lock().unwrap() += 1;
        self.trees
            .lock()
            .unwrap()
            .get(key)
            .cloned()
            .ok_or_else(|| StoreError::KeyNotFound(key.to_string()))
    }
}

/// Records every admin invocation; results are scripted, default success.
#[derive(Clone, Default)]
pub struct RecordingRunner {
    calls: Arc<Mutex<Vec<Vec<String>>>>,
    results: Arc<Mutex<VecDeque<bool>>>,
}

impl RecordingRunner {
    pub fn fail_next(&self, results: &[bool]) {
        self.results.lock().unwrap().extend(results.iter().copied());
    }

    pub fn calls(&self) -> Vec<Vec<String>> {
        self.calls.lock().unwrap().clone()
    }

    /// Admin sub-commands in call order, e.g. `vcl.load`.
    pub fn commands(&self) -> Vec<String> {
        self.calls().iter().map(|c| c[4].clone()).collect()
    }
}

impl CommandRunner for RecordingRunner {
    async fn run(&self, _program: &Path, args: &[String]) -> io::Result<CommandOutput> {
        self.calls.lock().unwrap().push(args.to_vec());
        let success = self.results.lock().unwrap().pop_front().unwrap_or(true);
        Ok(CommandOutput {
            success,
            status: if success { "exit status: 0" } else { "exit status: 106" }.to_string(),
            output: if success {
                "VCL compiled.".to_string()
            } else {
                "Message from VCC-compiler:\nSyntax error".to_string()
            },
        })
    }
}

pub fn template_dir() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("templates")
}

pub fn rule(host: &str, key: &str, fields: &[(&str, &str)]) -> TreeNode {
    let base = format!("{}/{}/locations/{}", HOSTS_KEY, host, key);
    TreeNode::dir(
        base.clone(),
        fields
            .iter()
            .map(|(k, v)| TreeNode::leaf(format!("{}/{}", base, k), *v))
            .collect(),
    )
}

pub fn host(name: &str, rules: Vec<TreeNode>) -> TreeNode {
    let base = format!("{}/{}", HOSTS_KEY, name);
    TreeNode::dir(base.clone(), vec![TreeNode::dir(format!("{}/locations", base), rules)])
}

pub fn upstream(name: &str, endpoints: &[&str]) -> TreeNode {
    let base = format!("{}/{}", UPSTREAMS_KEY, name);
    TreeNode::dir(
        base.clone(),
        vec![TreeNode::dir(
            format!("{}/endpoints", base),
            endpoints
                .iter()
                .enumerate()
                .map(|(i, v)| TreeNode::leaf(format!("{}/endpoints/{}", base, i), *v))
                .collect(),
        )],
    )
}

/// Hosts tree: example.com routes `^/` to director "api".
pub fn api_hosts() -> TreeNode {
    TreeNode::dir(
        HOSTS_KEY,
        vec![host(
            "example.com",
            vec![rule(
                "example.com",
                "root",
                &[("path", "^/"), ("upstream", "api"), ("vcl", "return (pass);")],
            )],
        )],
    )
}

/// Upstreams tree: "api" with one explicit-port and one default-port endpoint.
pub fn api_upstreams() -> TreeNode {
    TreeNode::dir(
        UPSTREAMS_KEY,
        vec![upstream("api", &["http://10.0.0.1:8080", "http://10.0.0.2"])],
    )
}

pub fn api_store() -> FakeStore {
    let store = FakeStore::default();
    store.set(HOSTS_KEY, api_hosts());
    store.set(UPSTREAMS_KEY, api_upstreams());
    store
}

/// A reconciler writing into `out_dir` with the shipped templates.
pub fn reconciler(
    store: FakeStore,
    runner: RecordingRunner,
    out_dir: &Path,
) -> Reconciler<FakeStore, RecordingRunner> {
    let templates = Templates::load(&template_dir()).unwrap();
    let renderer = Renderer::new(templates, out_dir.join("default.vcl"), out_dir.join("directors.vcl"));
    let orchestrator = Orchestrator::new(runner, &ReloadConfig::default(), renderer.routing_path());
    Reconciler::new(store, &StoreConfig::default(), renderer, orchestrator)
}
