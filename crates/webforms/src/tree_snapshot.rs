//! Line-per-node rendering of a tree, for corpus fixtures and debugging.
//!
//! Compiled for tests and behind the `tree-snapshot` feature. The format is
//! stable: two-space indentation, attributes nested under their owner, and
//! text escaped so a snapshot always stays one line per node.

use std::fmt::{self, Write};

use crate::tree::{Attribute, Document, NodeKind, ServerBlockKind};

pub struct TreeSnapshot {
    lines: Vec<String>,
}

impl TreeSnapshot {
    pub fn new(document: &Document) -> TreeSnapshot {
        let mut lines = Vec::new();
        let mut stack = vec![(document.root(), 0usize)];
        while let Some((id, depth)) = stack.pop() {
            let indent = "  ".repeat(depth);
            let node = document.node(id);
            match &node.kind {
                NodeKind::Document { .. } => lines.push(format!("{indent}document")),
                NodeKind::Element {
                    name,
                    attributes,
                    self_closing,
                    well_closed,
                    ..
                } => {
                    let mut line = format!("{indent}element {name}");
                    if *self_closing {
                        line.push_str(" self-closing");
                    }
                    if !*well_closed {
                        line.push_str(" unclosed");
                    }
                    lines.push(line);
                    for attr in attributes {
                        lines.push(attr_line(attr, depth + 1));
                    }
                }
                NodeKind::Text { text } => {
                    lines.push(format!("{indent}text \"{}\"", escape_text(text)));
                }
                NodeKind::Comment { text, server_side } => {
                    let label = if *server_side {
                        "server-comment"
                    } else {
                        "comment"
                    };
                    lines.push(format!("{indent}{label} \"{}\"", escape_text(text)));
                }
                NodeKind::Directive { name, attributes } => {
                    lines.push(format!("{indent}directive {name}"));
                    for attr in attributes {
                        lines.push(attr_line(attr, depth + 1));
                    }
                }
                NodeKind::ServerBlock { kind, body, .. } => {
                    let label = match kind {
                        ServerBlockKind::Code => "code",
                        ServerBlockKind::Expression => "expression",
                        ServerBlockKind::DataBinding => "data-binding",
                        ServerBlockKind::Resource => "resource",
                    };
                    lines.push(format!(
                        "{indent}server-block {label} \"{}\"",
                        escape_text(body)
                    ));
                }
                NodeKind::Doctype { text } => {
                    lines.push(format!("{indent}doctype \"{}\"", escape_text(text)));
                }
                NodeKind::Error { raw, .. } => {
                    lines.push(format!("{indent}error \"{}\"", escape_text(raw)));
                }
            }
            for &child in document.children(id).iter().rev() {
                stack.push((child, depth + 1));
            }
        }
        TreeSnapshot { lines }
    }

    pub fn as_lines(&self) -> &[String] {
        &self.lines
    }

    pub fn render(&self) -> String {
        self.lines.join("\n")
    }
}

impl fmt::Display for TreeSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for line in &self.lines {
            writeln!(f, "{line}")?;
        }
        Ok(())
    }
}

/// Render `document` in the form the corpus fixtures store.
pub fn render(document: &Document) -> String {
    TreeSnapshot::new(document).render()
}

fn attr_line(attr: &Attribute, depth: usize) -> String {
    let indent = "  ".repeat(depth);
    match &attr.value {
        Some(value) => format!("{indent}attr {}=\"{}\"", attr.name, escape_text(value)),
        None => format!("{indent}attr {}", attr.name),
    }
}

fn escape_text(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '\\' => escaped.push_str("\\\\"),
            '"' => escaped.push_str("\\\""),
            '\n' => escaped.push_str("\\n"),
            '\r' => escaped.push_str("\\r"),
            '\t' => escaped.push_str("\\t"),
            ch if ch < ' ' => {
                let _ = write!(escaped, "\\u{{{:02X}}}", ch as u32);
            }
            ch => escaped.push(ch),
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::Diagnostics;
    use crate::tree::TreeBuilder;

    fn parse(source: &str) -> Document {
        let mut diags = Diagnostics::new();
        let mut builder = TreeBuilder::new();
        crate::engine::run(source, &mut builder, &mut diags, None).unwrap();
        builder.finish(source.len())
    }

    #[test]
    fn nodes_render_in_document_order_with_indentation() {
        let doc = parse("<div id=\"x\">a<br></div>");
        let expected = [
            "document",
            "  element div",
            "    attr id=\"x\"",
            "    text \"a\"",
            "    element br",
        ]
        .join("\n");
        assert_eq!(render(&doc), expected);
    }

    #[test]
    fn flags_mark_self_closing_and_unclosed_elements() {
        let doc = parse("<a><b></a><c/>");
        let expected = [
            "document",
            "  element a",
            "    element b unclosed",
            "  element c self-closing",
        ]
        .join("\n");
        assert_eq!(render(&doc), expected);
    }

    #[test]
    fn server_constructs_have_their_own_labels() {
        let doc = parse("<%@ Page Language=\"C#\" %><%# Bind(\"Name\") %><%-- note --%>");
        let expected = [
            "document",
            "  directive Page",
            "    attr Language=\"C#\"",
            "  server-block data-binding \" Bind(\\\"Name\\\") \"",
            "  server-comment \" note \"",
        ]
        .join("\n");
        assert_eq!(render(&doc), expected);
    }

    #[test]
    fn text_is_escaped_onto_a_single_line() {
        let doc = parse("a\"b\nc");
        assert_eq!(
            render(&doc),
            ["document", "  text \"a\\\"b\\nc\""].join("\n")
        );
    }

    #[test]
    fn display_ends_every_line_with_a_newline() {
        let doc = parse("x");
        let snapshot = TreeSnapshot::new(&doc);
        assert_eq!(snapshot.to_string(), "document\n  text \"x\"\n");
        assert_eq!(snapshot.as_lines().len(), 2);
    }
}
