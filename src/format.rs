// System
use std::fmt;
use std::fmt::Write;

// Third Party
use k8s_openapi::api::core::v1::{ContainerState, Pod};

/// The lifecycle event a log record describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    Added,
    Updated,
    Deleted,
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EventKind::Added => "Added",
            EventKind::Updated => "Updated",
            EventKind::Deleted => "Deleted",
        };
        f.write_str(name)
    }
}

/// Render one pod event: a summary line followed by one indented line per container status.
/// Absent optional fields render as empty text.
pub fn format_pod_event(kind: EventKind, pod: &Pod) -> String {
    let metadata = &pod.metadata;
    let status = pod.status.as_ref();
    let node_name = pod
        .spec
        .as_ref()
        .and_then(|spec| spec.node_name.as_deref())
        .unwrap_or_default();

    let mut out = String::new();
    // Writing into a String cannot fail
    let _ = writeln!(
        out,
        "[{}] Timestamp: {}, Namespace: {}, Pod Name: {}, Phase: {}, PodIP: {}, Node: {}, Restart Count: {}",
        kind,
        creation_timestamp(pod),
        metadata.namespace.as_deref().unwrap_or_default(),
        metadata.name.as_deref().unwrap_or_default(),
        status.and_then(|s| s.phase.as_deref()).unwrap_or_default(),
        status.and_then(|s| s.pod_ip.as_deref()).unwrap_or_default(),
        simplify_node_name(node_name),
        total_restarts(pod),
    );

    for container_status in status
        .and_then(|s| s.container_statuses.as_deref())
        .unwrap_or_default()
    {
        let state = container_status
            .state
            .as_ref()
            .map(container_state_label)
            .unwrap_or_else(|| "Unknown".to_string());
        let _ = writeln!(
            out,
            "  Container: {}, State: {}, Restarts: {}",
            container_status.name, state, container_status.restart_count
        );
    }
    out
}

/// Creation instant in UTC, truncated to seconds, without an offset suffix.
fn creation_timestamp(pod: &Pod) -> String {
    pod.metadata
        .creation_timestamp
        .as_ref()
        .map(|time| time.0.format("%Y-%m-%dT%H:%M:%S").to_string())
        .unwrap_or_default()
}

/// Label for a container state. Waiting is checked first, then Running, then Terminated, so a
/// state with more than one field populated reports the first match.
pub fn container_state_label(state: &ContainerState) -> String {
    if let Some(waiting) = &state.waiting {
        format!("Waiting - {}", waiting.reason.as_deref().unwrap_or_default())
    } else if state.running.is_some() {
        "Running".to_string()
    } else if let Some(terminated) = &state.terminated {
        format!(
            "Terminated - {}",
            terminated.reason.as_deref().unwrap_or_default()
        )
    } else {
        "Unknown".to_string()
    }
}

/// Sum of the restart counts of every container in the pod.
pub fn total_restarts(pod: &Pod) -> i64 {
    pod.status
        .as_ref()
        .and_then(|status| status.container_statuses.as_ref())
        .map(|statuses| {
            statuses
                .iter()
                .map(|status| i64::from(status.restart_count))
                .sum()
        })
        .unwrap_or(0)
}

/// The leading label of a fully-qualified node name, e.g. `node-1.cluster.local` -> `node-1`.
pub fn simplify_node_name(node_name: &str) -> &str {
    match node_name.find('.') {
        Some(index) => &node_name[..index],
        None => node_name,
    }
}
