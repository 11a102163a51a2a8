//! Markdown-heading outline → [`MiniMap`] tree

use crate::model::MiniMap;
use regex::Regex;
use std::sync::OnceLock;

fn thinking_block() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)<thinking>.*?</thinking>").expect("valid regex"))
}

/// Removes `<thinking>` blocks and surrounding whitespace
pub fn strip_thinking(answer: &str) -> String {
    thinking_block().replace_all(answer, "").trim().to_string()
}

#[derive(Debug, PartialEq)]
struct Heading {
    level: usize,
    title: String,
    url: String,
}

fn heading(line: &str) -> Option<Heading> {
    let line = line.trim();
    let level = line.chars().take_while(|c| *c == '#').count();
    if level == 0 {
        return None;
    }

    let content = line.trim_start_matches('#').trim();
    let (title, url) = match content.split_once(':') {
        Some((title, url)) => (title.trim(), url.trim()),
        None => (content, ""),
    };

    Some(Heading {
        level,
        title: title.to_string(),
        url: url.to_string(),
    })
}

/// Nodes at exactly `level` within `headings`; deeper headings that skip a
/// level are dropped.
fn nodes_at(headings: &[Heading], level: usize) -> Vec<MiniMap> {
    let mut nodes = Vec::new();
    let mut i = 0;

    while i < headings.len() {
        let current = &headings[i];
        if current.level != level {
            i += 1;
            continue;
        }

        let end = headings[i + 1..]
            .iter()
            .position(|h| h.level <= level)
            .map(|offset| i + 1 + offset)
            .unwrap_or(headings.len());

        nodes.push(MiniMap {
            title: current.title.clone(),
            url: current.url.clone(),
            nodes: nodes_at(&headings[i + 1..end], level + 1),
        });
        i = end;
    }

    nodes
}

/// Parses `#`-depth headings (`# Title:path/to/file`) into a tree.
///
/// The first top-level heading becomes the root; further top-level headings
/// are attached as its children. Returns `None` when no heading is present.
pub fn parse_minimap(answer: &str) -> Option<MiniMap> {
    let headings: Vec<Heading> = answer.lines().filter_map(heading).collect();

    let mut top = nodes_at(&headings, 1).into_iter();
    let mut root = top.next()?;
    root.nodes.extend(top);

    if root.is_empty() {
        None
    } else {
        Some(root)
    }
}
