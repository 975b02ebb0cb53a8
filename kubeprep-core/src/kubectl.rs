use k8s_openapi::api::core::v1::{Node, Pod};
use serde::{de::DeserializeOwned, Deserialize};

pub const CONTROL_PLANE_TAINT: &str = "node-role.kubernetes.io/control-plane";

/// `kubectl get ... -o json` answers with a generic `List`, so only the items
/// are typed.
#[derive(Debug, Deserialize)]
struct Items<T> {
    #[serde(default = "Vec::new")]
    items: Vec<T>,
}

pub fn parse_items<T: DeserializeOwned>(json: &str) -> Result<Vec<T>, serde_json::Error> {
    Ok(serde_json::from_str::<Items<T>>(json)?.items)
}

pub fn node_name(node: &Node) -> &str {
    node.metadata.name.as_deref().unwrap_or("<unnamed>")
}

pub fn node_is_ready(node: &Node) -> bool {
    node.status
        .as_ref()
        .and_then(|s| s.conditions.as_ref())
        .map(|conditions| {
            conditions
                .iter()
                .any(|c| c.type_ == "Ready" && c.status == "True")
        })
        .unwrap_or(false)
}

pub fn has_control_plane_taint(node: &Node) -> bool {
    node.spec
        .as_ref()
        .and_then(|s| s.taints.as_ref())
        .map(|taints| taints.iter().any(|t| t.key == CONTROL_PLANE_TAINT))
        .unwrap_or(false)
}

pub fn pod_phase(pod: &Pod) -> &str {
    pod.status
        .as_ref()
        .and_then(|s| s.phase.as_deref())
        .unwrap_or("Unknown")
}

/// Completed pods (jobs) count as settled.
pub fn pod_is_running(pod: &Pod) -> bool {
    matches!(pod_phase(pod), "Running" | "Succeeded")
}

pub fn describe_pod(pod: &Pod) -> String {
    format!(
        "{}/{} ({})",
        pod.metadata.namespace.as_deref().unwrap_or("default"),
        pod.metadata.name.as_deref().unwrap_or("<unnamed>"),
        pod_phase(pod)
    )
}

pub fn not_ready_nodes(nodes: &[Node]) -> Vec<String> {
    nodes
        .iter()
        .filter(|n| !node_is_ready(n))
        .map(|n| node_name(n).to_owned())
        .collect()
}

pub fn not_running_pods(pods: &[Pod]) -> Vec<String> {
    pods.iter()
        .filter(|p| !pod_is_running(p))
        .map(describe_pod)
        .collect()
}

#[cfg(test)]
mod tests {
    use k8s_openapi::api::core::v1::{Node, Pod};

    use super::*;

    const NODES: &str = r#"{
      "apiVersion": "v1",
      "kind": "List",
      "items": [
        {
          "apiVersion": "v1",
          "kind": "Node",
          "metadata": {"name": "cp-1"},
          "spec": {"taints": [{"key": "node-role.kubernetes.io/control-plane", "effect": "NoSchedule"}]},
          "status": {"conditions": [{"type": "Ready", "status": "True"}]}
        },
        {
          "apiVersion": "v1",
          "kind": "Node",
          "metadata": {"name": "worker-1"},
          "status": {"conditions": [{"type": "Ready", "status": "False"}]}
        }
      ]
    }"#;

    const PODS: &str = r#"{
      "apiVersion": "v1",
      "kind": "List",
      "items": [
        {"apiVersion": "v1", "kind": "Pod", "metadata": {"name": "etcd-cp-1", "namespace": "kube-system"}, "status": {"phase": "Running"}},
        {"apiVersion": "v1", "kind": "Pod", "metadata": {"name": "migrate", "namespace": "default"}, "status": {"phase": "Succeeded"}},
        {"apiVersion": "v1", "kind": "Pod", "metadata": {"name": "calico-node-x", "namespace": "calico-system"}, "status": {"phase": "Pending"}}
      ]
    }"#;

    #[test]
    fn finds_nodes_that_are_not_ready() {
        let nodes = parse_items::<Node>(NODES).unwrap();

        assert_eq!(nodes.len(), 2);
        assert_eq!(not_ready_nodes(&nodes), vec!["worker-1"]);
    }

    #[test]
    fn detects_control_plane_taint() {
        let nodes = parse_items::<Node>(NODES).unwrap();

        assert!(has_control_plane_taint(&nodes[0]));
        assert!(!has_control_plane_taint(&nodes[1]));
    }

    #[test]
    fn finds_pods_that_are_not_running() {
        let pods = parse_items::<Pod>(PODS).unwrap();

        assert_eq!(
            not_running_pods(&pods),
            vec!["calico-system/calico-node-x (Pending)"]
        );
    }

    #[test]
    fn empty_list_parses() {
        let pods = parse_items::<Pod>(r#"{"apiVersion": "v1", "kind": "List", "items": []}"#).unwrap();

        assert!(pods.is_empty());
    }
}
