//! Arena-backed node tree and its builder.
//!
//! The engine drives the builder with open/close/add calls; the in-progress
//! tree lives in a flat arena with index links, so the finished [`Document`]
//! owns every node exactly once and parent references stay non-owning.

use crate::token::Span;

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct NodeId(usize);

impl NodeId {
    const ROOT: NodeId = NodeId(0);

    pub fn index(self) -> usize {
        self.0
    }
}

/// Attribute as written. `value` is `None` for bare flags like `disabled`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Attribute {
    pub name: String,
    pub value: Option<String>,
    pub span: Span,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ServerBlockKind {
    /// `<% ... %>`
    Code,
    /// `<%= ... %>`
    Expression,
    /// `<%# ... %>`
    DataBinding,
    /// `<%$ ... %>`
    Resource,
}

impl ServerBlockKind {
    /// Kinds whose body is host-language code and becomes a projection
    /// island. Resource expressions are declarative and stay out.
    pub fn is_code(self) -> bool {
        !matches!(self, ServerBlockKind::Resource)
    }

    pub(crate) fn sigil(self) -> &'static str {
        match self {
            ServerBlockKind::Code => "",
            ServerBlockKind::Expression => "=",
            ServerBlockKind::DataBinding => "#",
            ServerBlockKind::Resource => "$",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum NodeKind {
    Document {
        children: Vec<NodeId>,
    },
    Element {
        name: String,
        attributes: Vec<Attribute>,
        children: Vec<NodeId>,
        /// The open tag ended with `/>`.
        self_closing: bool,
        /// False when the element was closed by recovery rather than its own
        /// closing tag.
        well_closed: bool,
    },
    Text {
        text: String,
    },
    Comment {
        text: String,
        /// `<%-- --%>` rather than `<!-- -->`.
        server_side: bool,
    },
    Directive {
        name: String,
        attributes: Vec<Attribute>,
    },
    ServerBlock {
        kind: ServerBlockKind,
        body: String,
        /// Range of `body` in the source, inside the node span.
        body_span: Span,
    },
    Doctype {
        text: String,
    },
    Error {
        reason: &'static str,
        raw: String,
    },
}

#[derive(Clone, Debug)]
pub struct NodeData {
    pub kind: NodeKind,
    pub span: Span,
    pub parent: Option<NodeId>,
}

/// Finished tree. Node 0 is the document root; every other node is reachable
/// from it exactly once.
#[derive(Debug)]
pub struct Document {
    nodes: Vec<NodeData>,
}

const NO_CHILDREN: &[NodeId] = &[];

impl Document {
    pub fn root(&self) -> NodeId {
        NodeId::ROOT
    }

    pub fn node(&self, id: NodeId) -> &NodeData {
        &self.nodes[id.0]
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        match &self.nodes[id.0].kind {
            NodeKind::Document { children } | NodeKind::Element { children, .. } => children,
            _ => NO_CHILDREN,
        }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// True when only the root node exists.
    pub fn is_empty(&self) -> bool {
        self.nodes.len() <= 1
    }

    /// Depth-first walk in document order, starting at the root.
    pub fn iter(&self) -> Nodes<'_> {
        Nodes {
            doc: self,
            stack: vec![NodeId::ROOT],
        }
    }
}

pub struct Nodes<'d> {
    doc: &'d Document,
    stack: Vec<NodeId>,
}

impl Iterator for Nodes<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let id = self.stack.pop()?;
        let children = self.doc.children(id);
        self.stack.extend(children.iter().rev().copied());
        Some(id)
    }
}

pub(crate) fn is_void_element(name: &str) -> bool {
    const VOID: &[&str] = &[
        "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param",
        "source", "track", "wbr",
    ];
    VOID.iter().any(|void| void.eq_ignore_ascii_case(name))
}

pub(crate) fn is_rawtext_element(name: &str) -> bool {
    name.eq_ignore_ascii_case("script") || name.eq_ignore_ascii_case("style")
}

/// Incremental tree assembly. The engine opens and closes elements around the
/// add calls; leftovers at the end are closed by [`TreeBuilder::finish`].
#[derive(Debug)]
pub struct TreeBuilder {
    nodes: Vec<NodeData>,
    open: Vec<NodeId>,
}

impl Default for TreeBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl TreeBuilder {
    pub fn new() -> Self {
        let root = NodeData {
            kind: NodeKind::Document {
                children: Vec::new(),
            },
            span: Span::new(0, 0),
            parent: None,
        };
        Self {
            nodes: vec![root],
            open: vec![NodeId::ROOT],
        }
    }

    fn current(&self) -> NodeId {
        self.open.last().copied().unwrap_or(NodeId::ROOT)
    }

    fn attach(&mut self, kind: NodeKind, span: Span) -> NodeId {
        let id = NodeId(self.nodes.len());
        let parent = self.current();
        self.nodes.push(NodeData {
            kind,
            span,
            parent: Some(parent),
        });
        match &mut self.nodes[parent.0].kind {
            NodeKind::Document { children } | NodeKind::Element { children, .. } => {
                children.push(id);
            }
            _ => {}
        }
        id
    }

    pub fn open_element(&mut self, name: impl Into<String>, span: Span) {
        let id = self.attach(
            NodeKind::Element {
                name: name.into(),
                attributes: Vec::new(),
                children: Vec::new(),
                self_closing: false,
                well_closed: true,
            },
            span,
        );
        self.open.push(id);
    }

    /// Attach an attribute to the innermost open element.
    pub fn add_attribute(&mut self, name: impl Into<String>, value: Option<String>, span: Span) {
        let id = self.current();
        if let NodeKind::Element { attributes, .. } = &mut self.nodes[id.0].kind {
            attributes.push(Attribute {
                name: name.into(),
                value,
                span,
            });
        }
    }

    /// Close the innermost open element, extending its span through `end`.
    /// `matched` is false when the close was forced by recovery.
    pub fn close_element(&mut self, end: usize, matched: bool, self_closing: bool) {
        if self.open.len() <= 1 {
            return;
        }
        let Some(id) = self.open.pop() else { return };
        let node = &mut self.nodes[id.0];
        node.span.end = node.span.end.max(end);
        if let NodeKind::Element {
            self_closing: slash,
            well_closed,
            ..
        } = &mut node.kind
        {
            *slash = self_closing;
            if !matched {
                *well_closed = false;
            }
        }
    }

    /// Append a text run, merging into the previous sibling when the two are
    /// adjacent in the source.
    pub fn add_text(&mut self, text: impl Into<String>, span: Span) {
        let text = text.into();
        let parent = self.current();
        let last = match &self.nodes[parent.0].kind {
            NodeKind::Document { children } | NodeKind::Element { children, .. } => {
                children.last().copied()
            }
            _ => None,
        };
        if let Some(last) = last {
            let node = &mut self.nodes[last.0];
            if node.span.end == span.start {
                if let NodeKind::Text { text: existing } = &mut node.kind {
                    existing.push_str(&text);
                    node.span.end = span.end;
                    return;
                }
            }
        }
        self.attach(NodeKind::Text { text }, span);
    }

    pub fn add_comment(&mut self, text: impl Into<String>, server_side: bool, span: Span) {
        self.attach(
            NodeKind::Comment {
                text: text.into(),
                server_side,
            },
            span,
        );
    }

    pub fn add_directive(&mut self, name: impl Into<String>, attributes: Vec<Attribute>, span: Span) {
        self.attach(
            NodeKind::Directive {
                name: name.into(),
                attributes,
            },
            span,
        );
    }

    pub fn add_server_block(
        &mut self,
        kind: ServerBlockKind,
        body: impl Into<String>,
        body_span: Span,
        span: Span,
    ) {
        self.attach(
            NodeKind::ServerBlock {
                kind,
                body: body.into(),
                body_span,
            },
            span,
        );
    }

    pub fn add_doctype(&mut self, text: impl Into<String>, span: Span) {
        self.attach(NodeKind::Doctype { text: text.into() }, span);
    }

    pub fn add_error(&mut self, reason: &'static str, raw: impl Into<String>, span: Span) {
        self.attach(
            NodeKind::Error {
                reason,
                raw: raw.into(),
            },
            span,
        );
    }

    /// Open elements, not counting the document root.
    pub fn depth(&self) -> usize {
        self.open.len().saturating_sub(1)
    }

    /// Seal the tree. Elements still open (a faulted or truncated parse) are
    /// closed at `source_len` as not well closed.
    pub fn finish(mut self, source_len: usize) -> Document {
        while self.open.len() > 1 {
            self.close_element(source_len, false, false);
        }
        self.nodes[0].span = Span::new(0, source_len);
        Document { nodes: self.nodes }
    }
}

#[cfg(any(test, feature = "tree-invariants"))]
#[derive(Debug)]
pub struct TreeInvariantError {
    pub node: NodeId,
    pub message: &'static str,
}

#[cfg(any(test, feature = "tree-invariants"))]
impl std::fmt::Display for TreeInvariantError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "node {}: {}", self.node.index(), self.message)
    }
}

#[cfg(any(test, feature = "tree-invariants"))]
impl std::error::Error for TreeInvariantError {}

/// Verify the structural invariants of a finished tree: single ownership,
/// parent/child agreement, non-empty spans, sibling order and containment.
#[cfg(any(test, feature = "tree-invariants"))]
pub fn check_tree(doc: &Document) -> Result<(), TreeInvariantError> {
    fn fail(node: NodeId, message: &'static str) -> Result<(), TreeInvariantError> {
        Err(TreeInvariantError { node, message })
    }

    let mut seen = vec![false; doc.len()];
    seen[doc.root().index()] = true;
    let mut stack = vec![doc.root()];
    while let Some(id) = stack.pop() {
        let node = doc.node(id);
        if id != doc.root() {
            if node.span.is_empty() {
                return fail(id, "empty span");
            }
            match node.parent {
                None => return fail(id, "non-root node without a parent"),
                Some(parent) => {
                    if parent.index() >= doc.len() {
                        return fail(id, "parent index out of bounds");
                    }
                    if !doc.node(parent).span.contains(node.span) {
                        return fail(id, "span escapes the parent span");
                    }
                }
            }
        }

        let mut prev_end = None;
        for &child in doc.children(id) {
            if child.index() >= doc.len() {
                return fail(child, "index out of bounds");
            }
            if seen[child.index()] {
                return fail(child, "reachable through two parents");
            }
            seen[child.index()] = true;
            let child_span = doc.node(child).span;
            if let Some(prev) = prev_end {
                if child_span.start < prev {
                    return fail(child, "sibling spans overlap or run backwards");
                }
            }
            prev_end = Some(child_span.end);
            if doc.node(child).parent != Some(id) {
                return fail(child, "child does not point back at its parent");
            }
            stack.push(child);
        }
    }
    if let Some(unreached) = seen.iter().position(|&reached| !reached) {
        return fail(NodeId(unreached), "not reachable from the root");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn adjacent_text_runs_merge_into_one_node() {
        let mut builder = TreeBuilder::new();
        builder.add_text("a ", Span::new(0, 2));
        builder.add_text("< b", Span::new(2, 5));
        let doc = builder.finish(5);

        let children = doc.children(doc.root());
        assert_eq!(children.len(), 1);
        let node = doc.node(children[0]);
        assert!(
            matches!(&node.kind, NodeKind::Text { text } if text == "a < b"),
            "got {:?}",
            node.kind
        );
        assert_eq!(node.span, Span::new(0, 5));
    }

    #[test]
    fn non_adjacent_text_runs_stay_separate() {
        let mut builder = TreeBuilder::new();
        builder.add_text("a", Span::new(0, 1));
        builder.add_text("b", Span::new(4, 5));
        let doc = builder.finish(5);
        assert_eq!(doc.children(doc.root()).len(), 2);
    }

    #[test]
    fn forced_close_marks_the_element() {
        let mut builder = TreeBuilder::new();
        builder.open_element("a", Span::new(0, 2));
        builder.close_element(6, false, false);
        let doc = builder.finish(6);

        let a = doc.children(doc.root())[0];
        assert!(matches!(
            &doc.node(a).kind,
            NodeKind::Element { well_closed: false, .. }
        ));
        assert_eq!(doc.node(a).span, Span::new(0, 6));
    }

    #[test]
    fn finish_closes_leftover_open_elements() {
        let mut builder = TreeBuilder::new();
        builder.open_element("a", Span::new(0, 2));
        builder.open_element("b", Span::new(2, 4));
        let doc = builder.finish(9);

        check_tree(&doc).unwrap();
        let a = doc.children(doc.root())[0];
        let b = doc.children(a)[0];
        assert_eq!(doc.node(a).span, Span::new(0, 9));
        assert_eq!(doc.node(b).span, Span::new(2, 9));
        assert!(matches!(
            &doc.node(b).kind,
            NodeKind::Element { well_closed: false, .. }
        ));
    }

    #[test]
    fn document_iter_is_depth_first_document_order() {
        let mut builder = TreeBuilder::new();
        builder.open_element("a", Span::new(0, 3));
        builder.add_text("x", Span::new(3, 4));
        builder.close_element(8, true, false);
        builder.add_comment("c", false, Span::new(8, 16));
        let doc = builder.finish(16);

        let kinds: Vec<&'static str> = doc
            .iter()
            .map(|id| match &doc.node(id).kind {
                NodeKind::Document { .. } => "document",
                NodeKind::Element { .. } => "element",
                NodeKind::Text { .. } => "text",
                NodeKind::Comment { .. } => "comment",
                _ => "other",
            })
            .collect();
        assert_eq!(kinds, ["document", "element", "text", "comment"]);
    }

    #[test]
    fn checker_rejects_an_empty_span() {
        let nodes = vec![
            NodeData {
                kind: NodeKind::Document {
                    children: vec![NodeId(1)],
                },
                span: Span::new(0, 4),
                parent: None,
            },
            NodeData {
                kind: NodeKind::Text {
                    text: String::new(),
                },
                span: Span::new(2, 2),
                parent: Some(NodeId(0)),
            },
        ];
        let doc = Document { nodes };
        let err = check_tree(&doc).unwrap_err();
        assert_eq!(err.message, "empty span");
    }

    #[test]
    fn checker_rejects_double_ownership() {
        let child = NodeData {
            kind: NodeKind::Text {
                text: "x".into(),
            },
            span: Span::new(0, 1),
            parent: Some(NodeId(0)),
        };
        let nodes = vec![
            NodeData {
                kind: NodeKind::Document {
                    children: vec![NodeId(1), NodeId(1)],
                },
                span: Span::new(0, 1),
                parent: None,
            },
            child,
        ];
        let doc = Document { nodes };
        let err = check_tree(&doc).unwrap_err();
        assert_eq!(err.message, "reachable through two parents");
    }

    #[test]
    fn checker_rejects_sibling_overlap() {
        let nodes = vec![
            NodeData {
                kind: NodeKind::Document {
                    children: vec![NodeId(1), NodeId(2)],
                },
                span: Span::new(0, 10),
                parent: None,
            },
            NodeData {
                kind: NodeKind::Text { text: "ab".into() },
                span: Span::new(0, 5),
                parent: Some(NodeId(0)),
            },
            NodeData {
                kind: NodeKind::Text { text: "cd".into() },
                span: Span::new(3, 8),
                parent: Some(NodeId(0)),
            },
        ];
        let doc = Document { nodes };
        let err = check_tree(&doc).unwrap_err();
        assert_eq!(err.message, "sibling spans overlap or run backwards");
    }

    #[test]
    fn void_and_rawtext_tables_match_ascii_case_insensitively() {
        assert!(is_void_element("BR"));
        assert!(is_void_element("meta"));
        assert!(!is_void_element("div"));
        assert!(is_rawtext_element("SCRIPT"));
        assert!(is_rawtext_element("style"));
        assert!(!is_rawtext_element("textarea"));
    }
}
