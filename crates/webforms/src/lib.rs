pub mod diagnostics;
pub mod page_info;
pub mod projection;
pub mod serialize;
pub mod session;
pub mod token;
pub mod tree;
#[cfg(any(test, feature = "tree-snapshot"))]
pub mod tree_snapshot;

mod engine;
mod lexer;

pub use crate::diagnostics::{Diagnostic, Diagnostics, Severity};
pub use crate::page_info::{ExtensionSubtypes, PageInfo, SubtypeResolver, WebSubtype};
pub use crate::projection::{CodeModelHost, DEFAULT_USINGS, MapEntry, Projection, project};
pub use crate::serialize::to_markup;
pub use crate::session::{CancelToken, Cancelled, ParseOptions, ParsedDocument, parse};
pub use crate::token::{Location, Span, Token, TokenKind};
pub use crate::tree::{
    Attribute, Document, NodeData, NodeId, NodeKind, Nodes, ServerBlockKind, TreeBuilder,
};
#[cfg(any(test, feature = "tree-invariants"))]
pub use crate::tree::{TreeInvariantError, check_tree};
#[cfg(any(test, feature = "tree-snapshot"))]
pub use crate::tree_snapshot::TreeSnapshot;
