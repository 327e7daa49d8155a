use crate::bdd::Bdd;
use crate::graph::Edge;
use std::collections::HashMap;
use std::fmt::Display;
use std::fs;
use std::io::{Error, ErrorKind, Result};
use std::path::{Path, PathBuf};
use std::process::Command;

/// Writes forwarding edges as a Graphviz digraph.
///
/// States become nodes numbered in order of first appearance; each edge is labelled with
/// `label(guard)`.
pub fn edges_to_dot<S: Display, P>(edges: &[Edge<S, P>], label: impl Fn(&P) -> String) -> String {
    let mut ids: HashMap<String, usize> = HashMap::new();
    let mut nodes = String::new();
    let mut arcs = String::new();

    let mut node_id = |state: &S, nodes: &mut String| -> usize {
        let name = state.to_string();
        if let Some(&id) = ids.get(&name) {
            return id;
        }
        let id = ids.len();
        nodes.push_str(&format!("  n{} [label=\"{}\", shape=box];\n", id, escape(&name)));
        ids.insert(name, id);
        id
    };

    for edge in edges {
        let source = node_id(&edge.source, &mut nodes);
        let target = node_id(&edge.target, &mut nodes);
        arcs.push_str(&format!(
            "  n{} -> n{} [label=\"{}\"];\n",
            source,
            target,
            escape(&label(&edge.guard))
        ));
    }

    format!("digraph Forwarding {{\n  rankdir=LR;\n{}{}}}\n", nodes, arcs)
}

/// A short label for a guard: one packet it admits.
pub fn guard_label(guard: &Bdd) -> String {
    match guard.example_packet() {
        Some(packet) => format!("e.g. {}", packet),
        None => "empty".to_string(),
    }
}

fn escape(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"")
}

/// Writes `dot_content` to `<output_dir>/<name>.dot` and renders `<name>.svg` next to it with
/// Graphviz `dot`. Returns the path of the SVG.
pub fn render_svg(dot_content: &str, output_dir: &Path, name: &str) -> Result<PathBuf> {
    fs::create_dir_all(output_dir).map_err(|e| {
        Error::new(
            ErrorKind::Other,
            format!("Failed to create output directory {:?}: {}", output_dir, e),
        )
    })?;

    let dot_path = output_dir.join(format!("{}.dot", name));
    let svg_path = output_dir.join(format!("{}.svg", name));

    fs::write(&dot_path, dot_content).map_err(|e| {
        Error::new(
            ErrorKind::Other,
            format!("Failed to write DOT file to {:?}: {}", dot_path, e),
        )
    })?;

    let output = Command::new("dot")
        .arg("-Tsvg")
        .arg(dot_path.as_os_str())
        .arg("-o")
        .arg(svg_path.as_os_str())
        .output()
        .map_err(|e| {
            Error::new(
                ErrorKind::NotFound,
                format!(
                    "Failed to execute 'dot' command. Is Graphviz installed and in PATH? Error: {}",
                    e
                ),
            )
        })?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(Error::new(
            ErrorKind::Other,
            format!(
                "Graphviz 'dot' command failed with status: {}. Stderr: {}",
                output.status,
                stderr.trim()
            ),
        ));
    }

    tracing::info!(path = %svg_path.display(), "rendered forwarding graph");
    Ok(svg_path)
}
