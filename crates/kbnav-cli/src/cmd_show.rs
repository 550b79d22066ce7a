use anyhow::{Context, Result};
use kbnav::{NodeId, NodeView, Tree};
use kbnav_sheet::SheetReader;
use std::path::Path;

fn load_tree(input: &Path) -> Result<Tree> {
    let rows = SheetReader::read_path(input).with_context(|| format!("Failed to read {:?}", input))?;
    Tree::build(rows).map_err(|e| anyhow::anyhow!("Invalid: {}", e))
}

/// Print one node the way a conversation would see it.
pub fn run_show(input: &Path, node: Option<i64>, json: bool, pretty: bool) -> Result<()> {
    let tree = load_tree(input)?;
    println!("{}", show(&tree, node.map(NodeId::new), json, pretty)?);
    Ok(())
}

/// Print the whole hierarchy as an indented outline.
pub fn run_tree(input: &Path) -> Result<()> {
    let tree = load_tree(input)?;
    print!("{}", outline(&tree));
    Ok(())
}

fn show(tree: &Tree, node: Option<NodeId>, json: bool, pretty: bool) -> Result<String> {
    let id = node.unwrap_or_else(|| tree.root());
    let view = NodeView::render(tree, id).map_err(|e| anyhow::anyhow!("{}", e))?;

    if json {
        return Ok(if pretty {
            serde_json::to_string_pretty(&view)?
        } else {
            serde_json::to_string(&view)?
        });
    }

    let mut out = Vec::new();
    let trail: Vec<String> = tree
        .ancestors(id)
        .map_err(|e| anyhow::anyhow!("{}", e))?
        .into_iter()
        .skip(1)
        .rev()
        .filter_map(|a| tree.get(a).ok().map(|n| n.name.clone()))
        .collect();
    if !trail.is_empty() {
        out.push(format!("{} >", trail.join(" > ")));
    }
    out.push(view.text());
    out.push(String::new());
    for button in &view.buttons {
        out.push(format!("  [{} -> {}]", button.label, button.action.callback_data()));
    }
    Ok(out.join("\n").trim_end().to_string())
}

fn outline(tree: &Tree) -> String {
    let mut out = String::new();
    let walked = tree.walk();
    for (depth, node) in &walked {
        out.push_str(&format!("{}{} ({})\n", "  ".repeat(*depth), node.name, node.id));
    }

    let unreachable: Vec<_> = tree
        .nodes()
        .filter(|n| !walked.iter().any(|(_, w)| w.id == n.id))
        .collect();
    if !unreachable.is_empty() {
        out.push_str("\nUnreachable:\n");
        for node in unreachable {
            out.push_str(&format!("  {} ({})\n", node.name, node.id));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use kbnav::Row;

    fn sample() -> Tree {
        Tree::build(vec![
            Row::new(1, "Root").with_text("R"),
            Row::new(2, "A").with_parent(1).with_text("a"),
            Row::new(3, "B").with_parent(1),
            Row::new(4, "A1").with_parent(2).with_text("deep"),
        ])
        .unwrap()
    }

    #[test]
    fn test_show_root() {
        let out = show(&sample(), None, false, false).unwrap();
        assert_eq!(out, "Root\n\nR\n\n  [A -> 2]\n  [B -> 3]");
    }

    #[test]
    fn test_show_nested_node_has_breadcrumb() {
        let out = show(&sample(), Some(NodeId::new(4)), false, false).unwrap();
        assert!(out.starts_with("Root > A >\nA1\n\ndeep"));
        assert!(out.contains("[Back -> parent]"));
        assert!(out.contains("[Home -> root]"));
    }

    #[test]
    fn test_show_placeholder_body() {
        let out = show(&sample(), Some(NodeId::new(3)), false, false).unwrap();
        assert!(out.contains("B\n\nNo text"));
    }

    #[test]
    fn test_show_json() {
        let out = show(&sample(), Some(NodeId::new(2)), true, false).unwrap();
        let view: NodeView = serde_json::from_str(&out).unwrap();
        assert_eq!(view.name, "A");
        assert_eq!(view.child_labels(), ["A1"]);
    }

    #[test]
    fn test_show_unknown_node() {
        assert!(show(&sample(), Some(NodeId::new(99)), false, false).is_err());
    }

    #[test]
    fn test_outline() {
        assert_eq!(
            outline(&sample()),
            "Root (1)\n  A (2)\n    A1 (4)\n  B (3)\n"
        );
    }

    #[test]
    fn test_outline_lists_unreachable() {
        let tree = Tree::build(vec![Row::new(1, "Root"), Row::new(7, "Island")]).unwrap();
        let out = outline(&tree);
        assert!(out.starts_with("Root (1)\n"));
        assert!(out.contains("Unreachable:\n  Island (7)\n"));
    }
}
