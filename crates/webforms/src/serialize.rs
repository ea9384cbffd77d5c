//! Turn a tree back into markup.

use std::fmt::Write;

use crate::tree::{Attribute, Document, NodeId, NodeKind, is_void_element};

enum Step {
    Enter(NodeId),
    CloseTag(NodeId),
}

/// Render `document` as markup text.
///
/// Canonical input, double-quoted attributes and all, round-trips
/// byte-for-byte. Markup that needed recovery comes back normalized: values
/// gain quotes and elements the parser forced shut gain closing tags, so the
/// output reparses to the same structure rather than the same bytes.
pub fn to_markup(document: &Document) -> String {
    let mut out = String::new();
    let mut steps: Vec<Step> = document
        .children(document.root())
        .iter()
        .rev()
        .map(|&id| Step::Enter(id))
        .collect();
    while let Some(step) = steps.pop() {
        match step {
            Step::Enter(id) => write_node(document, id, &mut out, &mut steps),
            Step::CloseTag(id) => {
                if let NodeKind::Element { name, .. } = &document.node(id).kind {
                    let _ = write!(out, "</{name}>");
                }
            }
        }
    }
    out
}

fn write_node(document: &Document, id: NodeId, out: &mut String, steps: &mut Vec<Step>) {
    match &document.node(id).kind {
        NodeKind::Document { .. } => {}
        NodeKind::Element {
            name,
            attributes,
            self_closing,
            ..
        } => {
            let _ = write!(out, "<{name}");
            for attr in attributes {
                write_attribute(attr, out);
            }
            if *self_closing {
                out.push_str("/>");
                return;
            }
            out.push('>');
            let children = document.children(id);
            if children.is_empty() && is_void_element(name) {
                return;
            }
            steps.push(Step::CloseTag(id));
            steps.extend(children.iter().rev().map(|&child| Step::Enter(child)));
        }
        NodeKind::Text { text } => out.push_str(text),
        NodeKind::Comment { text, server_side } => {
            if *server_side {
                let _ = write!(out, "<%--{text}--%>");
            } else {
                let _ = write!(out, "<!--{text}-->");
            }
        }
        NodeKind::Directive { name, attributes } => {
            let _ = write!(out, "<%@ {name}");
            for attr in attributes {
                write_attribute(attr, out);
            }
            out.push_str(" %>");
        }
        NodeKind::ServerBlock { kind, body, .. } => {
            let _ = write!(out, "<%{}{body}%>", kind.sigil());
        }
        NodeKind::Doctype { text } => out.push_str(text),
        NodeKind::Error { raw, .. } => out.push_str(raw),
    }
}

/// Double quotes by default, single when the value itself holds a double
/// quote. Values holding both kinds are not representable and keep double.
fn write_attribute(attr: &Attribute, out: &mut String) {
    let _ = write!(out, " {}", attr.name);
    if let Some(value) = &attr.value {
        if value.contains('"') {
            let _ = write!(out, "='{value}'");
        } else {
            let _ = write!(out, "=\"{value}\"");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::Diagnostics;
    use crate::tree::TreeBuilder;
    use crate::tree_snapshot::TreeSnapshot;

    fn parse(source: &str) -> Document {
        let mut diags = Diagnostics::new();
        let mut builder = TreeBuilder::new();
        crate::engine::run(source, &mut builder, &mut diags, None).unwrap();
        builder.finish(source.len())
    }

    #[test]
    fn canonical_markup_round_trips_byte_for_byte() {
        let source = concat!(
            "<%@ Page Language=\"C#\" Inherits=\"App.Default\" %>\n",
            "<!DOCTYPE html>\n",
            "<html>\n",
            "<head><title>Home</title></head>\n",
            "<body>\n",
            "<!-- header -->\n",
            "<asp:Label ID=\"Greeting\" runat=\"server\"/>\n",
            "<%-- server side note --%>\n",
            "<% if (ready) { %><%= User.Name %><% } %>\n",
            "<img src=\"logo.png\">\n",
            "<script runat=\"server\">void Page_Load() { }</script>\n",
            "</body>\n",
            "</html>\n",
        );
        assert_eq!(to_markup(&parse(source)), source);
    }

    #[test]
    fn normalized_output_reparses_to_the_same_tree() {
        let source = "<%@ Page Language=C# %><br><input type=text disabled><a href=/home>x</a>";
        let first = parse(source);
        let second = parse(&to_markup(&first));
        assert_eq!(
            TreeSnapshot::new(&first).render(),
            TreeSnapshot::new(&second).render()
        );
    }

    #[test]
    fn attribute_quoting_switches_when_the_value_holds_a_quote() {
        let source = "<div data-note='say \"hi\"'></div>";
        let doc = parse(source);
        assert_eq!(to_markup(&doc), source);
    }

    #[test]
    fn stray_and_error_nodes_keep_their_raw_text() {
        let source = "<a></b></a><![CDATA[x]]>";
        let doc = parse(source);
        assert_eq!(to_markup(&doc), source);
    }
}
