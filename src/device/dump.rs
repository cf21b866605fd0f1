//! uiautomator hierarchy dump codec
//!
//! `uiautomator dump` writes a single-line XML document:
//! ```text
//! <?xml version='1.0' encoding='UTF-8' standalone='yes' ?><hierarchy rotation="0">
//!   <node index="0" text="" resource-id="" class="..." package="..." bounds="[0,0][1080,2340]">
//!     ...
//!   </node>
//! </hierarchy>
//! ```
//! Only `node` elements and their attributes matter, so the document is
//! scanned tag by tag instead of going through a full XML parser.

use std::collections::HashMap;
use std::fmt::Write;
use std::sync::OnceLock;

use regex::Regex;

use crate::common::{Error, Result};

use super::tree::{Bounds, UiNode, UiTree};

const XML_HEADER: &str = "<?xml version='1.0' encoding='UTF-8' standalone='yes' ?>";

fn tag_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"<(/?)(node|hierarchy)\b((?:[^>"]|"[^"]*")*?)(/?)>"#).expect("valid tag regex")
    })
}

fn attr_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"([\w:-]+)="([^"]*)""#).expect("valid attribute regex"))
}

/// Cut the hierarchy document out of raw command output
///
/// `uiautomator dump /dev/tty` appends a status line after the XML, and
/// prints an `ERROR:` line instead of XML when the dump fails.
pub fn extract_hierarchy(output: &str) -> Result<&str> {
    let start = output.find("<hierarchy").ok_or_else(|| {
        let reason = output
            .lines()
            .find(|l| l.contains("ERROR"))
            .unwrap_or("no <hierarchy> element in output");
        Error::DumpParse(reason.trim().to_string())
    })?;

    let end = output[start..]
        .find("</hierarchy>")
        .map(|i| start + i + "</hierarchy>".len())
        .or_else(|| {
            // An empty screen may be dumped as a self-closing root, but a
            // child's `/>` does not close it
            tag_regex()
                .captures(&output[start..])
                .filter(|caps| &caps[2] == "hierarchy" && !caps[4].is_empty())
                .and_then(|caps| caps.get(0))
                .filter(|m| m.start() == 0)
                .map(|m| start + m.end())
        })
        .ok_or_else(|| Error::DumpParse("unterminated <hierarchy> element".to_string()))?;

    Ok(&output[start..end])
}

/// Parse a hierarchy dump into a flat, document-ordered tree
pub fn parse_dump(output: &str) -> Result<UiTree> {
    let xml = extract_hierarchy(output)?;

    let mut tree = UiTree::default();
    let mut depth = 0usize;

    for caps in tag_regex().captures_iter(xml) {
        let closing = !caps[1].is_empty();
        let name = &caps[2];
        let self_closing = !caps[4].is_empty();

        match (name, closing) {
            ("hierarchy", false) => {
                let attrs = parse_attrs(&caps[3]);
                tree.rotation = attrs
                    .get("rotation")
                    .and_then(|r| r.parse().ok())
                    .unwrap_or(0);
            }
            ("hierarchy", true) => break,
            ("node", false) => {
                let attrs = parse_attrs(&caps[3]);
                tree.nodes.push(node_from_attrs(&attrs, depth)?);
                if !self_closing {
                    depth += 1;
                }
            }
            ("node", true) => {
                depth = depth.checked_sub(1).ok_or_else(|| {
                    Error::DumpParse("unbalanced </node> tag".to_string())
                })?;
            }
            _ => {}
        }
    }

    Ok(tree)
}

fn parse_attrs(raw: &str) -> HashMap<&str, String> {
    attr_regex()
        .captures_iter(raw)
        .filter_map(|c| {
            let key = c.get(1)?.as_str();
            let value = c.get(2)?.as_str();
            Some((key, unescape(value)))
        })
        .collect()
}

fn node_from_attrs(attrs: &HashMap<&str, String>, depth: usize) -> Result<UiNode> {
    let text = |key: &str| attrs.get(key).cloned().unwrap_or_default();
    let flag = |key: &str| attrs.get(key).map(|v| v == "true").unwrap_or(false);

    let bounds = match attrs.get("bounds") {
        Some(raw) => Bounds::parse(raw)
            .ok_or_else(|| Error::DumpParse(format!("invalid bounds '{}'", raw)))?,
        None => Bounds::default(),
    };

    Ok(UiNode {
        depth,
        index: attrs.get("index").and_then(|i| i.parse().ok()).unwrap_or(0),
        text: text("text"),
        resource_id: text("resource-id"),
        class: text("class"),
        package: text("package"),
        content_desc: text("content-desc"),
        clickable: flag("clickable"),
        enabled: attrs.get("enabled").map(|v| v == "true").unwrap_or(true),
        focused: flag("focused"),
        bounds,
    })
}

/// Render a tree in the same format `uiautomator dump` produces
pub fn render_dump(tree: &UiTree) -> String {
    let mut out = String::from(XML_HEADER);
    let _ = write!(out, "<hierarchy rotation=\"{}\">", tree.rotation);

    let mut open: Vec<usize> = Vec::new();
    for (i, node) in tree.nodes.iter().enumerate() {
        while open.last().is_some_and(|&d| d >= node.depth) {
            open.pop();
            out.push_str("</node>");
        }

        let _ = write!(
            out,
            "<node index=\"{}\" text=\"{}\" resource-id=\"{}\" class=\"{}\" package=\"{}\" \
             content-desc=\"{}\" clickable=\"{}\" enabled=\"{}\" focused=\"{}\" bounds=\"{}\"",
            node.index,
            escape(&node.text),
            escape(&node.resource_id),
            escape(&node.class),
            escape(&node.package),
            escape(&node.content_desc),
            node.clickable,
            node.enabled,
            node.focused,
            node.bounds,
        );

        let has_children = tree
            .nodes
            .get(i + 1)
            .is_some_and(|next| next.depth > node.depth);
        if has_children {
            out.push('>');
            open.push(node.depth);
        } else {
            out.push_str(" />");
        }
    }
    for _ in open {
        out.push_str("</node>");
    }

    out.push_str("</hierarchy>");
    out
}

fn escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\n' => out.push_str("&#10;"),
            c => out.push(c),
        }
    }
    out
}

fn unescape(s: &str) -> String {
    if !s.contains('&') {
        return s.to_string();
    }

    let mut out = String::with_capacity(s.len());
    let mut rest = s;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        let tail = &rest[amp..];
        let Some(semi) = tail.find(';') else {
            out.push_str(tail);
            return out;
        };
        let entity = &tail[1..semi];
        let decoded = match entity {
            "amp" => Some('&'),
            "lt" => Some('<'),
            "gt" => Some('>'),
            "quot" => Some('"'),
            "apos" => Some('\''),
            _ => entity
                .strip_prefix("#x")
                .and_then(|hex| u32::from_str_radix(hex, 16).ok())
                .or_else(|| entity.strip_prefix('#').and_then(|dec| dec.parse().ok()))
                .and_then(char::from_u32),
        };
        match decoded {
            Some(c) => {
                out.push(c);
                rest = &tail[semi + 1..];
            }
            None => {
                out.push('&');
                rest = &tail[1..];
            }
        }
    }
    out.push_str(rest);
    out
}
