use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum NodeRole {
    #[default]
    Worker,
    ControlPlane,
    SingleNode,
}

impl NodeRole {
    /// Single-node clusters run the full control-plane setup and then some.
    pub fn is_control_plane(self) -> bool {
        matches!(self, Self::ControlPlane | Self::SingleNode)
    }
}

impl std::fmt::Display for NodeRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Worker => "worker",
            Self::ControlPlane => "control-plane",
            Self::SingleNode => "single-node",
        })
    }
}

/// Resolves the node role from the role flags.
///
/// Total over every flag combination: `single_node` takes precedence over
/// `control_plane` because a single-node cluster is a control plane with
/// extra post-init steps.
pub fn resolve_role(control_plane: bool, single_node: bool) -> NodeRole {
    match (control_plane, single_node) {
        (_, true) => NodeRole::SingleNode,
        (true, false) => NodeRole::ControlPlane,
        (false, false) => NodeRole::Worker,
    }
}
