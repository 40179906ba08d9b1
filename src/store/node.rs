//! Tree snapshot nodes.

use serde::Deserialize;

/// One node of a key-value tree snapshot.
///
/// Mirrors the node shape of the etcd v2 keys API: directories carry
/// `nodes`, leaves carry `value`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct TreeNode {
    /// Full key, e.g. `/varnish/hosts/example.com`.
    #[serde(default)]
    pub key: String,

    /// Leaf value; absent for directories.
    #[serde(default)]
    pub value: Option<String>,

    /// True when the node is a directory.
    #[serde(default)]
    pub dir: bool,

    /// Children in store order.
    #[serde(default)]
    pub nodes: Vec<TreeNode>,

    /// Index of the last modification (used by the watcher).
    #[serde(default, rename = "modifiedIndex")]
    pub modified_index: u64,
}

impl TreeNode {
    /// Build a leaf node.
    pub fn leaf(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: Some(value.into()),
            ..Self::default()
        }
    }

    /// Build a directory node.
    pub fn dir(key: impl Into<String>, nodes: Vec<TreeNode>) -> Self {
        Self {
            key: key.into(),
            dir: true,
            nodes,
            ..Self::default()
        }
    }

    /// Last path segment of the key.
    pub fn name(&self) -> &str {
        let trimmed = self.key.trim_end_matches('/');
        trimmed.rsplit('/').next().unwrap_or(trimmed)
    }

    /// Leaf value, or the empty string for directories.
    pub fn value_str(&self) -> &str {
        self.value.as_deref().unwrap_or("")
    }

    /// Children whose last path segment equals `name`.
    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a TreeNode> + 'a {
        self.nodes.iter().filter(move |n| n.name() == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_name_is_last_segment() {
        assert_eq!(TreeNode::leaf("/varnish/hosts/example.com", "").name(), "example.com");
        assert_eq!(TreeNode::dir("/varnish/upstreams/", vec![]).name(), "upstreams");
        assert_eq!(TreeNode::leaf("plain", "").name(), "plain");
    }

    #[test]
    fn test_decodes_etcd_node() {
        let json = r#"{
            "key": "/varnish/upstreams",
            "dir": true,
            "nodes": [
                {"key": "/varnish/upstreams/api/endpoints/1", "value": "http://10.0.0.1", "modifiedIndex": 7}
            ],
            "modifiedIndex": 3,
            "createdIndex": 3
        }"#;
        let node: TreeNode = serde_json::from_str(json).unwrap();
        assert!(node.dir);
        assert_eq!(node.nodes.len(), 1);
        assert_eq!(node.nodes[0].value_str(), "http://10.0.0.1");
        assert_eq!(node.nodes[0].modified_index, 7);
    }

    #[test]
    fn test_children_named() {
        let host = TreeNode::dir(
            "/v/hosts/a",
            vec![
                TreeNode::dir("/v/hosts/a/locations", vec![]),
                TreeNode::leaf("/v/hosts/a/other", "x"),
            ],
        );
        assert_eq!(host.children_named("locations").count(), 1);
        assert_eq!(host.children_named("missing").count(), 0);
    }
}
