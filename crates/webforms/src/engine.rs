//! Token-to-tree state machine.
//!
//! A stack of [`ParseState`] values picks the lexer mode for the next token;
//! a parallel stack of open element names drives close-tag matching. Every
//! malformed shape has a recovery path, so the engine always reaches
//! [`TokenKind::Eof`] unless cancelled.

use crate::diagnostics::Diagnostics;
use crate::lexer::{Lexer, ScanMode};
use crate::session::{CancelToken, Cancelled};
use crate::token::{Location, Span, Token, TokenKind};
use crate::tree::{Attribute, ServerBlockKind, TreeBuilder, is_rawtext_element, is_void_element};

/// How many enclosing elements a closing tag may force shut before it is
/// treated as stray text instead.
const MAX_CLOSE_SCAN_DEPTH: usize = 8;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
enum ParseState {
    /// Element content, including the document top level.
    Root,
    /// Just after `<name`, before any attribute.
    TagName,
    /// Attribute list of an open tag.
    InTagAttributes,
    /// Attribute list of a `<%@ ... %>` directive.
    InDirective,
    /// Raw script or style body.
    InScriptIsland,
}

struct PendingAttr {
    name: String,
    span: Span,
}

struct PendingDirective {
    name: String,
    start: usize,
    location: Location,
    attributes: Vec<Attribute>,
}

/// Run the parse over `source`, feeding `builder` and `diags`. Cancellation
/// is observed between tokens and is the only early return.
pub(crate) fn run(
    source: &str,
    builder: &mut TreeBuilder,
    diags: &mut Diagnostics,
    cancel: Option<&CancelToken>,
) -> Result<(), Cancelled> {
    #[cfg(test)]
    fault::trip_if_armed();
    Engine {
        source,
        lexer: Lexer::new(source),
        builder,
        diags,
        cancel,
        states: vec![ParseState::Root],
        open_names: Vec::new(),
        pending_attr: None,
        pending_directive: None,
    }
    .run_to_eof()
}

struct Engine<'s, 'o> {
    source: &'s str,
    lexer: Lexer<'s>,
    builder: &'o mut TreeBuilder,
    diags: &'o mut Diagnostics,
    cancel: Option<&'o CancelToken>,
    states: Vec<ParseState>,
    open_names: Vec<String>,
    pending_attr: Option<PendingAttr>,
    pending_directive: Option<PendingDirective>,
}

impl Engine<'_, '_> {
    fn run_to_eof(mut self) -> Result<(), Cancelled> {
        loop {
            if self.cancel.is_some_and(CancelToken::is_cancelled) {
                return Err(Cancelled);
            }
            debug_assert_eq!(self.builder.depth(), self.open_names.len());

            let mode = match self.top_state() {
                ParseState::Root => ScanMode::Markup,
                ParseState::TagName | ParseState::InTagAttributes => {
                    ScanMode::Tag { directive: false }
                }
                ParseState::InDirective => ScanMode::Tag { directive: true },
                ParseState::InScriptIsland => ScanMode::RawText {
                    close_tag: self
                        .open_names
                        .last()
                        .map(String::as_str)
                        .unwrap_or("script"),
                },
            };
            let token = self.lexer.next(mode, &mut *self.diags);
            #[cfg(any(test, feature = "debug-stats"))]
            log::trace!(
                target: "webforms.engine",
                "{:?} <- {:?} {:?}",
                self.top_state(),
                token.kind,
                token.span,
            );
            if token.kind == TokenKind::Eof {
                self.finish_at_eof(&token);
                return Ok(());
            }
            match self.top_state() {
                ParseState::Root | ParseState::InScriptIsland => self.on_content_token(token),
                ParseState::TagName | ParseState::InTagAttributes => self.on_tag_token(token),
                ParseState::InDirective => self.on_directive_token(token),
            }
        }
    }

    fn top_state(&self) -> ParseState {
        self.states.last().copied().unwrap_or(ParseState::Root)
    }

    fn replace_top(&mut self, state: ParseState) {
        if let Some(top) = self.states.last_mut() {
            *top = state;
        }
    }

    fn on_content_token(&mut self, token: Token) {
        match token.kind {
            TokenKind::Text => {
                if self.top_state() == ParseState::Root && token.text.starts_with("<!") {
                    self.diags
                        .warning("unrecognized markup declaration", token.location);
                    self.builder.add_error(
                        "unrecognized markup declaration",
                        token.text,
                        token.span,
                    );
                } else {
                    self.builder.add_text(token.text, token.span);
                }
            }
            TokenKind::Comment => {
                let server_side =
                    self.source.as_bytes().get(token.span.start + 1).copied() == Some(b'%');
                self.builder.add_comment(token.text, server_side, token.span);
            }
            TokenKind::ServerBlock => {
                let (kind, body_start, body_end) = split_server_block(&token.text);
                let body = token.text[body_start..body_end].to_string();
                let body_span = Span::new(
                    token.span.start + body_start,
                    token.span.start + body_end,
                );
                self.builder.add_server_block(kind, body, body_span, token.span);
            }
            TokenKind::Doctype => self.builder.add_doctype(token.text, token.span),
            TokenKind::Directive => {
                self.pending_directive = Some(PendingDirective {
                    name: token.text,
                    start: token.span.start,
                    location: token.location,
                    attributes: Vec::new(),
                });
                self.states.push(ParseState::InDirective);
            }
            TokenKind::TagOpen => {
                self.builder.open_element(token.text.clone(), token.span);
                self.open_names.push(token.text);
                self.states.push(ParseState::TagName);
            }
            TokenKind::TagClose => self.on_closing_tag(token),
            TokenKind::AttrName | TokenKind::AttrValue | TokenKind::Eof => {}
        }
    }

    fn on_closing_tag(&mut self, token: Token) {
        if token.text.is_empty() {
            self.diags.error("closing tag with no name", token.location);
            let raw = token.span.slice(self.source).to_string();
            self.builder
                .add_error("closing tag with no name", raw, token.span);
            return;
        }
        let matched = self
            .open_names
            .iter()
            .rev()
            .take(MAX_CLOSE_SCAN_DEPTH)
            .position(|open| open.eq_ignore_ascii_case(&token.text));
        match matched {
            Some(0) => self.close_matched(token.span.end),
            Some(depth) => {
                for _ in 0..depth {
                    let open = self.open_names.last().cloned().unwrap_or_default();
                    self.diags.warning(
                        format!(
                            "mismatched closing tag </{}>: <{}> was still open",
                            token.text, open
                        ),
                        token.location,
                    );
                    self.builder.close_element(token.span.start, false, false);
                    self.open_names.pop();
                }
                self.close_matched(token.span.end);
            }
            None => {
                self.diags.error(
                    format!("closing tag </{}> matches no open element", token.text),
                    token.location,
                );
                let raw = token.span.slice(self.source).to_string();
                self.builder.add_text(raw, token.span);
            }
        }
    }

    fn close_matched(&mut self, end: usize) {
        self.builder.close_element(end, true, false);
        self.open_names.pop();
        if self.top_state() == ParseState::InScriptIsland {
            self.states.pop();
        }
    }

    fn on_tag_token(&mut self, token: Token) {
        match token.kind {
            TokenKind::AttrName => {
                self.flush_pending_attr();
                self.pending_attr = Some(PendingAttr {
                    name: token.text,
                    span: token.span,
                });
                self.replace_top(ParseState::InTagAttributes);
            }
            TokenKind::AttrValue => match self.pending_attr.take() {
                Some(attr) => {
                    let span = Span::new(attr.span.start, token.span.end);
                    self.builder.add_attribute(attr.name, Some(token.text), span);
                }
                None => self
                    .diags
                    .warning("attribute value without a name", token.location),
            },
            TokenKind::TagClose => match token.text.as_str() {
                ">" => self.complete_open_tag(token.span.end, false),
                "/>" => self.complete_open_tag(token.span.end, true),
                _ => {
                    self.diags.warning("unterminated tag", token.location);
                    self.complete_open_tag(token.span.start, false);
                }
            },
            _ => {}
        }
    }

    fn on_directive_token(&mut self, token: Token) {
        match token.kind {
            TokenKind::AttrName => {
                self.flush_pending_attr();
                self.pending_attr = Some(PendingAttr {
                    name: token.text,
                    span: token.span,
                });
            }
            TokenKind::AttrValue => match self.pending_attr.take() {
                Some(attr) => {
                    let span = Span::new(attr.span.start, token.span.end);
                    if let Some(directive) = self.pending_directive.as_mut() {
                        directive.attributes.push(Attribute {
                            name: attr.name,
                            value: Some(token.text),
                            span,
                        });
                    }
                }
                None => self
                    .diags
                    .warning("attribute value without a name", token.location),
            },
            TokenKind::TagClose => match token.text.as_str() {
                "%>" => self.commit_directive(token.span.end),
                _ => {
                    self.diags.warning("unterminated directive", token.location);
                    self.commit_directive(token.span.start);
                }
            },
            _ => {}
        }
    }

    /// An attribute name with no `=value` becomes a bare flag.
    fn flush_pending_attr(&mut self) {
        let Some(attr) = self.pending_attr.take() else {
            return;
        };
        if self.top_state() == ParseState::InDirective {
            if let Some(directive) = self.pending_directive.as_mut() {
                directive.attributes.push(Attribute {
                    name: attr.name,
                    value: None,
                    span: attr.span,
                });
            }
        } else {
            self.builder.add_attribute(attr.name, None, attr.span);
        }
    }

    fn complete_open_tag(&mut self, end: usize, self_closing: bool) {
        self.flush_pending_attr();
        self.states.pop();
        let name = self.open_names.last().cloned().unwrap_or_default();
        if self_closing || is_void_element(&name) {
            self.builder.close_element(end, true, self_closing);
            self.open_names.pop();
        } else if is_rawtext_element(&name) {
            self.states.push(ParseState::InScriptIsland);
        }
    }

    fn commit_directive(&mut self, end: usize) {
        self.flush_pending_attr();
        self.states.pop();
        let Some(directive) = self.pending_directive.take() else {
            return;
        };
        if directive.name.is_empty() {
            self.diags
                .warning("directive missing a name", directive.location);
        }
        let span = Span::new(directive.start, end.max(directive.start + 3));
        self.builder
            .add_directive(directive.name, directive.attributes, span);
    }

    fn finish_at_eof(&mut self, token: &Token) {
        let end = token.span.end;
        match self.top_state() {
            ParseState::TagName | ParseState::InTagAttributes => {
                self.diags.warning("unterminated tag", token.location);
                self.complete_open_tag(end, false);
            }
            ParseState::InDirective => {
                self.diags.error("unterminated directive", token.location);
                self.commit_directive(end);
            }
            ParseState::Root | ParseState::InScriptIsland => {}
        }
        while let Some(name) = self.open_names.pop() {
            self.diags
                .error(format!("unclosed element <{name}>"), token.location);
            self.builder.close_element(end, false, false);
        }
        self.states.truncate(1);
    }
}

/// Split a raw `<%...%>` token into its kind and the byte range of its body.
fn split_server_block(text: &str) -> (ServerBlockKind, usize, usize) {
    let bytes = text.as_bytes();
    let (kind, head) = match bytes.get(2) {
        Some(b'=') => (ServerBlockKind::Expression, 3),
        Some(b'#') => (ServerBlockKind::DataBinding, 3),
        Some(b'$') => (ServerBlockKind::Resource, 3),
        _ => (ServerBlockKind::Code, 2),
    };
    let tail = if bytes.len() >= head + 2 && text.ends_with("%>") {
        bytes.len() - 2
    } else {
        bytes.len()
    };
    (kind, head.min(tail), tail)
}

#[cfg(test)]
pub(crate) mod fault {
    use std::cell::Cell;

    thread_local! {
        static TRIP: Cell<bool> = const { Cell::new(false) };
    }

    /// Arm a one-shot panic inside the next parse on this thread.
    pub(crate) fn arm() {
        TRIP.with(|trip| trip.set(true));
    }

    pub(crate) fn trip_if_armed() {
        if TRIP.with(|trip| trip.replace(false)) {
            panic!("injected parser fault");
        }
    }
}
