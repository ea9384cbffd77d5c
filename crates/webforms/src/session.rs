//! The parse entry point and its session types.
//!
//! [`parse`] is total over any input: malformed markup degrades into
//! diagnostics, and a panic anywhere in the engine is caught at this
//! boundary and reported as an internal fault with the partial tree kept.
//! Cancellation is the only case that returns no result.

use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::diagnostics::Diagnostics;
use crate::engine;
use crate::page_info::{ExtensionSubtypes, PageInfo, SubtypeResolver};
use crate::projection::{self, CodeModelHost, Projection};
use crate::token::Location;
use crate::tree::{Document, TreeBuilder};

/// Cooperative cancellation flag, observed between tokens. Clones share the
/// flag, so a token handed to another thread can stop a parse in flight.
#[derive(Clone, Debug, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> CancelToken {
        CancelToken::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }
}

/// Returned when a [`CancelToken`] fired during the parse.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct Cancelled;

impl fmt::Display for Cancelled {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("parse cancelled")
    }
}

impl std::error::Error for Cancelled {}

/// Per-parse settings. `file_name` drives subtype reconciliation; without
/// one the declared directive stands unchallenged.
#[derive(Clone, Copy)]
pub struct ParseOptions<'a> {
    pub file_name: Option<&'a str>,
    pub resolver: &'a dyn SubtypeResolver,
    pub cancel: Option<&'a CancelToken>,
}

impl Default for ParseOptions<'_> {
    fn default() -> Self {
        ParseOptions {
            file_name: None,
            resolver: &ExtensionSubtypes,
            cancel: None,
        }
    }
}

impl fmt::Debug for ParseOptions<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ParseOptions")
            .field("file_name", &self.file_name)
            .field("cancel", &self.cancel)
            .finish_non_exhaustive()
    }
}

/// Everything one parse produces.
#[derive(Debug)]
pub struct ParsedDocument {
    pub file_name: Option<String>,
    pub document: Document,
    pub diagnostics: Diagnostics,
    pub page_info: PageInfo,
    pub projections: Vec<Projection>,
}

impl ParsedDocument {
    /// All projected code as one unit behind the default namespace prologue.
    pub fn combined_projection(&self) -> Projection {
        Projection::combine(&self.projections, projection::DEFAULT_USINGS)
    }

    /// Run every projection through a host analysis, in document order.
    pub fn analyze<H: CodeModelHost>(&self, host: &H) -> Vec<H::Analysis> {
        self.projections
            .iter()
            .map(|projection| host.analyze(projection, projection::DEFAULT_USINGS))
            .collect()
    }
}

/// Parse `source` into a tree, diagnostics, page info and projections.
pub fn parse(source: &str, options: &ParseOptions<'_>) -> Result<ParsedDocument, Cancelled> {
    let mut diagnostics = Diagnostics::new();
    let mut builder = TreeBuilder::new();

    let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
        engine::run(source, &mut builder, &mut diagnostics, options.cancel)
    }));
    match outcome {
        Ok(Ok(())) => {}
        Ok(Err(cancelled)) => return Err(cancelled),
        Err(payload) => {
            let detail = panic_detail(payload.as_ref());
            log::error!(
                target: "webforms.parse",
                "parser fault caught at the parse boundary: {detail}"
            );
            diagnostics.error(format!("internal parser fault: {detail}"), Location::START);
        }
    }

    let document = builder.finish(source.len());
    let mut page_info = PageInfo::populate(&document);
    if let Some(file_name) = options.file_name {
        page_info.reconcile(options.resolver.resolve(file_name), &mut diagnostics);
    }
    let projections = projection::project(&document, source);

    Ok(ParsedDocument {
        file_name: options.file_name.map(str::to_string),
        document,
        diagnostics,
        page_info,
        projections,
    })
}

fn panic_detail(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("unknown panic payload")
}
