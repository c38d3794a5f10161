pub mod iterate;
pub mod metadata;
pub mod operators;


use crate::registry::TaskKind;

/// names accepted as `kind` of a task type
pub const BUILTIN: [&str; 2] = ["iterate", "metadata"];

pub fn builtin(kind: &str) -> Option<TaskKind> {
    match kind.to_lowercase().as_str() {
        "iterate" => Some(iterate::KIND),
        "metadata" => Some(metadata::KIND),
        _ => None,
    }
}
