//! Host-language code lifted out of the markup.
//!
//! Server script islands and code-bearing `<% %>` blocks become
//! [`Projection`] values: the code text verbatim plus a bidirectional offset
//! map between the source and the projected text. [`Projection::combine`]
//! stitches them into a single unit a code model can consume.

use std::fmt::Write;

use crate::token::Span;
use crate::tree::{Document, NodeKind};

/// Namespaces every WebForms code model starts from.
pub const DEFAULT_USINGS: &[&str] = &[
    "System",
    "System.Web",
    "System.Collections",
    "System.Collections.Specialized",
    "System.Configuration",
    "System.Text",
    "System.Text.RegularExpressions",
    "System.Web.Caching",
    "System.Web.Profile",
    "System.Web.Security",
    "System.Web.SessionState",
    "System.Web.UI",
    "System.Web.UI.HtmlControls",
    "System.Web.UI.WebControls",
    "System.Web.UI.WebControls.WebParts",
];

/// One contiguous run of code and where it sits in both texts.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MapEntry {
    /// Byte offset of the run in the source markup.
    pub original: usize,
    /// Byte offset of the run in [`Projection::text`].
    pub projected: usize,
    pub len: usize,
}

/// Code extracted from the markup with its offset map. Offsets map inside
/// the lifted runs only; prologue text and separators have no source.
#[derive(Clone, Debug)]
pub struct Projection {
    /// Source range the projection covers.
    pub span: Span,
    /// The projected code itself.
    pub text: String,
    map: Vec<MapEntry>,
}

impl Projection {
    /// A single island lifted verbatim from the source.
    pub fn from_island(span: Span, text: String) -> Projection {
        let len = text.len();
        debug_assert_eq!(len, span.len());
        Projection {
            span,
            text,
            map: vec![MapEntry {
                original: span.start,
                projected: 0,
                len,
            }],
        }
    }

    pub fn map(&self) -> &[MapEntry] {
        &self.map
    }

    /// Map a source byte offset into the projected text. Offsets map within
    /// `[original, original + len)` of some run; run ends are exclusive.
    pub fn to_projected(&self, original: usize) -> Option<usize> {
        let idx = self
            .map
            .partition_point(|entry| entry.original + entry.len <= original);
        let entry = self.map.get(idx)?;
        (original >= entry.original).then(|| entry.projected + (original - entry.original))
    }

    /// Inverse of [`Projection::to_projected`].
    pub fn to_original(&self, projected: usize) -> Option<usize> {
        let idx = self
            .map
            .partition_point(|entry| entry.projected + entry.len <= projected);
        let entry = self.map.get(idx)?;
        (projected >= entry.projected).then(|| entry.original + (projected - entry.projected))
    }

    /// Concatenate projections into one unit, prefixed with `using` lines
    /// for `usings`. Each island lands on its own line; the prologue and
    /// separators stay unmapped.
    pub fn combine(projections: &[Projection], usings: &[&str]) -> Projection {
        let mut text = String::new();
        for using in usings {
            let _ = writeln!(text, "using {using};");
        }
        let mut map = Vec::new();
        let mut span: Option<Span> = None;
        for projection in projections {
            let base = text.len();
            for entry in &projection.map {
                map.push(MapEntry {
                    original: entry.original,
                    projected: base + entry.projected,
                    len: entry.len,
                });
            }
            text.push_str(&projection.text);
            text.push('\n');
            span = Some(match span {
                None => projection.span,
                Some(all) => Span::new(all.start, projection.span.end.max(all.end)),
            });
        }
        Projection {
            span: span.unwrap_or(Span::new(0, 0)),
            text,
            map,
        }
    }
}

fn is_server_script(kind: &NodeKind) -> bool {
    let NodeKind::Element {
        name, attributes, ..
    } = kind
    else {
        return false;
    };
    if !name.eq_ignore_ascii_case("script") {
        return false;
    }
    attributes.iter().any(|attr| {
        attr.name.eq_ignore_ascii_case("runat")
            && attr
                .value
                .as_deref()
                .is_some_and(|value| value.eq_ignore_ascii_case("server"))
    })
}

/// Collect the projections of a document in source order: the bodies of
/// `<script runat="server">` islands and of code-bearing render blocks.
/// Resource expressions `<%$ %>` are declarative and stay behind.
pub fn project(document: &Document, source: &str) -> Vec<Projection> {
    let mut projections = Vec::new();
    for id in document.iter() {
        let node = document.node(id);
        match &node.kind {
            NodeKind::Element { .. } if is_server_script(&node.kind) => {
                for &child in document.children(id) {
                    let child_node = document.node(child);
                    if matches!(child_node.kind, NodeKind::Text { .. })
                        && !child_node.span.is_empty()
                    {
                        projections.push(Projection::from_island(
                            child_node.span,
                            child_node.span.slice(source).to_string(),
                        ));
                    }
                }
            }
            NodeKind::ServerBlock {
                kind,
                body,
                body_span,
            } => {
                if kind.is_code() && !body_span.is_empty() {
                    projections.push(Projection::from_island(*body_span, body.clone()));
                }
            }
            _ => {}
        }
    }
    projections
}

/// Hook for handing projected code to a host-language service.
pub trait CodeModelHost {
    type Analysis;

    fn analyze(&self, projection: &Projection, usings: &[&str]) -> Self::Analysis;
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
    fn island_maps_offsets_both_ways() {
        let projection = Projection::from_island(Span::new(10, 16), "x == y".to_string());

        assert_eq!(projection.to_projected(10), Some(0));
        assert_eq!(projection.to_projected(13), Some(3));
        assert_eq!(projection.to_projected(15), Some(5));
        assert_eq!(projection.to_projected(16), None);
        assert_eq!(projection.to_projected(9), None);

        assert_eq!(projection.to_original(0), Some(10));
        assert_eq!(projection.to_original(5), Some(15));
        assert_eq!(projection.to_original(6), None);
    }

    #[test]
    fn project_lifts_script_islands_and_code_blocks() {
        let source = concat!(
            "<script runat=\"server\">int x;</script>",
            "<% if (x) { %>",
            "<%= x %>",
            "<%$ Resources:Strings,Title %>",
        );
        let doc = parse(source);
        let projections = project(&doc, source);

        let texts: Vec<&str> = projections.iter().map(|p| p.text.as_str()).collect();
        assert_eq!(texts, vec!["int x;", " if (x) { ", " x "]);
        assert_eq!(projections[0].span, Span::new(23, 29));
        assert_eq!(projections[0].to_projected(24), Some(1));
    }

    #[test]
    fn client_scripts_are_not_projected() {
        let source = "<script>var x = 1;</script><script runat=\"client\">y;</script>";
        let doc = parse(source);
        assert!(project(&doc, source).is_empty());
    }

    #[test]
    fn empty_islands_are_skipped() {
        let source = "<script runat=\"server\"></script><%%>";
        let doc = parse(source);
        assert!(project(&doc, source).is_empty());
    }

    #[test]
    fn combine_prefixes_usings_and_remaps_offsets() {
        let first = Projection::from_island(Span::new(5, 7), "a;".to_string());
        let second = Projection::from_island(Span::new(20, 24), "b();".to_string());
        let combined = Projection::combine(&[first, second], &["System"]);

        assert_eq!(combined.text, "using System;\na;\nb();\n");
        assert_eq!(combined.span, Span::new(5, 24));
        assert_eq!(combined.map().len(), 2);

        assert_eq!(combined.to_projected(5), Some(14));
        assert_eq!(combined.to_projected(21), Some(18));
        assert_eq!(combined.to_original(14), Some(5));
        assert_eq!(combined.to_original(17), Some(20));
        // Prologue and separators have no source position.
        assert_eq!(combined.to_original(0), None);
        assert_eq!(combined.to_original(16), None);
    }

    #[test]
    fn combine_of_nothing_is_just_the_prologue() {
        let combined = Projection::combine(&[], DEFAULT_USINGS);
        assert!(combined.text.starts_with("using System;\n"));
        assert!(combined.map().is_empty());
        assert_eq!(combined.span, Span::new(0, 0));
        assert_eq!(combined.to_projected(0), None);
    }

    #[test]
    fn default_usings_have_no_duplicates() {
        for (i, using) in DEFAULT_USINGS.iter().enumerate() {
            assert!(
                !DEFAULT_USINGS[i + 1..].contains(using),
                "{using} appears twice"
            );
        }
    }
}
