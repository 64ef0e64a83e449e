//! Plain-text outline of a comment forest for the command line.

use crate::domain::{count_descendants, Comment, Expansion, GroupedThread, TreeNode};
use crate::pool::PoolState;
use std::fmt::Write;
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

/// Column budget for single-line entries.
pub const SINGLE_LINE_WIDTH: usize = 72;
/// Body lines kept for truncated entries.
const TRUNCATED_LINES: usize = 3;

/// Render `forest` one comment per block, indented by depth. Display flags
/// come from `state`; comments it does not know render with defaults.
pub fn render_forest(forest: &[TreeNode], state: &PoolState) -> String {
    let mut out = String::new();
    render_nodes(&mut out, forest, state, 0);
    out
}

/// Pre-order walk of `nodes`, the first level indented by `depth`.
fn render_nodes(out: &mut String, nodes: &[TreeNode], state: &PoolState, depth: usize) {
    let mut stack: Vec<(&TreeNode, usize)> = nodes.iter().rev().map(|n| (n, depth)).collect();
    while let Some((node, depth)) = stack.pop() {
        let indent = "  ".repeat(depth);
        match &node.item {
            None => {
                let _ = writeln!(out, "{indent}[{}] (not loaded)", node.id);
            }
            Some(comment) => {
                let expansion = state
                    .entry(&comment.id)
                    .map_or(Expansion::Default, |entry| entry.expansion);
                render_comment(out, comment, expansion, count_descendants(node), &indent);
            }
        }
        stack.extend(node.children.iter().rev().map(|child| (child, depth + 1)));
    }
}

fn render_comment(
    out: &mut String,
    comment: &Comment,
    expansion: Expansion,
    descendants: usize,
    indent: &str,
) {
    let header = header(comment);
    if expansion.is_single_line() {
        let line = format!("{header} {}", comment.summary());
        let budget = SINGLE_LINE_WIDTH.saturating_sub(indent.width());
        let _ = write!(out, "{indent}{}", truncate_to_width(&line, budget));
        if descendants > 0 {
            let _ = write!(out, " (+{descendants})");
        }
        out.push('\n');
        return;
    }

    let _ = writeln!(out, "{indent}{header} [{expansion}]");
    let mut lines = comment.body.lines();
    let shown: Vec<&str> = match expansion {
        Expansion::Truncated => lines.by_ref().take(TRUNCATED_LINES).collect(),
        _ => lines.by_ref().collect(),
    };
    for line in shown {
        let _ = writeln!(out, "{indent}  {line}");
    }
    if lines.next().is_some() {
        let _ = writeln!(out, "{indent}  …");
    }
}

fn header(comment: &Comment) -> String {
    let mut header = format!("{} ({})", comment.id, comment.base_score);
    if !comment.author.is_empty() {
        let _ = write!(header, " {}", comment.author);
    }
    if let Some(posted_at) = comment.posted_at {
        let _ = write!(header, " {}", posted_at.format("%Y-%m-%d %H:%M"));
    }
    header
}

/// Render a collapsed chain on one line followed by the subtrees below it.
pub fn render_group(group: &GroupedThread, state: &PoolState) -> String {
    let chain: Vec<String> = group
        .grouped_comments
        .iter()
        .map(|comment| comment.id.to_string())
        .collect();
    let mut out = format!("{}\n", chain.join(" → "));
    render_nodes(&mut out, &group.child_comments, state, 1);
    out
}

/// Cut `text` to at most `width` display columns, ending in `…` when cut.
pub fn truncate_to_width(text: &str, width: usize) -> String {
    if text.width() <= width {
        return text.to_string();
    }
    let budget = width.saturating_sub(1);
    let mut used = 0;
    let mut out = String::new();
    for ch in text.chars() {
        let w = ch.width().unwrap_or(0);
        if used + w > budget {
            break;
        }
        used += w;
        out.push(ch);
    }
    if width > 0 {
        out.push('…');
    }
    out
}
