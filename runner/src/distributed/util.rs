use crate::config::ConfigErrors;
use tracing::error;

/// Name of this node, either configured or the hostname
pub fn node_name(configured: Option<&str>) -> Result<String, ConfigErrors> {
    if let Some(node) = configured {
        return Ok(node.to_owned());
    }

    match nix::unistd::gethostname() {
        Ok(hostname) => Ok(hostname.to_string_lossy().into_owned()),
        Err(error) => {
            error!(error = ?error, "Failed to retrieve hostname for the node name: {error}");

            Err(ConfigErrors::NodeName(error))
        }
    }
}

/// substitute `{type}`, `{id}` and `{node}` in a path template
pub fn render(template: &str, task_type: &str, id: u32, node: &str) -> String {
    template
        .replace("{type}", task_type)
        .replace("{id}", &id.to_string())
        .replace("{node}", node)
}

/// name of the per-thread files, unique across nodes since task ids are
pub fn thread_file_name(task_id: u32, thread_id: usize) -> String {
    format!("{task_id}-{thread_id}")
}
