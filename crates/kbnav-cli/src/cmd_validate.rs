use anyhow::{Context, Result};
use kbnav::Tree;
use kbnav_sheet::{SheetFormat, SheetReader};
use std::path::PathBuf;

pub fn run(input: PathBuf) -> Result<()> {
    let format = SheetFormat::from_file_name(&input.to_string_lossy())?;
    let bytes = std::fs::read(&input).with_context(|| format!("Failed to read {:?}", input))?;
    println!("{}", validate_bytes(format, &bytes)?);
    Ok(())
}

fn validate_bytes(format: SheetFormat, bytes: &[u8]) -> Result<String> {
    let rows = SheetReader::read_bytes(format, bytes).map_err(|e| anyhow::anyhow!("Invalid: {}", e))?;
    let tree = Tree::build(rows).map_err(|e| anyhow::anyhow!("Invalid: {}", e))?;

    let root = tree.root();
    let name = tree.get(root).map(|n| n.name.as_str()).unwrap_or_default();
    let walked = tree.walk();
    let reachable = walked.len();
    let depth = walked
        .iter()
        .filter_map(|(_, node)| tree.depth(node.id).ok())
        .max()
        .unwrap_or(0);
    let mut summary = format!(
        "Valid: {} nodes, root {} ({}), depth {}",
        tree.len(),
        root,
        name,
        depth
    );
    if reachable < tree.len() {
        summary.push_str(&format!(
            "\nWarning: {} nodes are not reachable from the root",
            tree.len() - reachable
        ));
    }
    Ok(summary)
}
