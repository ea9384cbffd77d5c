//! Mode-driven pull lexer over the raw source.
//!
//! The caller owns the mode: content positions use [`ScanMode::Markup`],
//! attribute positions use [`ScanMode::Tag`], and script or style bodies use
//! [`ScanMode::RawText`]. Malformed input never stops the lexer; it reports a
//! diagnostic and keeps producing tokens until [`TokenKind::Eof`].

use memchr::{memchr, memchr_iter, memmem};

use crate::diagnostics::Diagnostics;
use crate::token::{Location, Span, Token, TokenKind};

#[derive(Clone, Copy, Debug)]
pub(crate) enum ScanMode<'a> {
    /// Element content: text, tags, comments, directives, server blocks.
    Markup,
    /// Inside an open tag head or a directive head.
    Tag { directive: bool },
    /// Inside a script or style body, inert until the named close tag.
    RawText { close_tag: &'a str },
}

pub(crate) struct Lexer<'s> {
    src: &'s str,
    pos: usize,
    line: u32,
    column: u32,
}

fn is_name_start(b: u8) -> bool {
    b.is_ascii_alphabetic() || b == b'_'
}

fn is_name_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || matches!(b, b'-' | b'_' | b':' | b'.')
}

impl<'s> Lexer<'s> {
    pub(crate) fn new(src: &'s str) -> Self {
        Self {
            src,
            pos: 0,
            line: 1,
            column: 1,
        }
    }

    pub(crate) fn next(&mut self, mode: ScanMode<'_>, diags: &mut Diagnostics) -> Token {
        let token = match mode {
            ScanMode::Markup => self.next_markup(diags),
            ScanMode::Tag { directive } => self.next_in_tag(directive, diags),
            ScanMode::RawText { close_tag } => self.next_rawtext(close_tag, diags),
        };
        #[cfg(any(test, feature = "debug-stats"))]
        log::trace!(
            target: "webforms.lexer",
            "{:?} {:?} at {} ({:?})",
            token.kind,
            token.span,
            token.location,
            mode,
        );
        token
    }

    fn location(&self) -> Location {
        Location {
            line: self.line,
            column: self.column,
        }
    }

    fn at_eof(&self) -> bool {
        self.pos >= self.src.len()
    }

    fn rest(&self) -> &'s str {
        &self.src[self.pos..]
    }

    fn peek(&self) -> Option<u8> {
        self.src.as_bytes().get(self.pos).copied()
    }

    fn slice(&self, start: usize, end: usize) -> &'s str {
        &self.src[start..end]
    }

    /// Move `len` bytes forward, keeping the line and column counters in step.
    fn advance(&mut self, len: usize) {
        let skipped = &self.src.as_bytes()[self.pos..self.pos + len];
        let mut last_newline = None;
        for at in memchr_iter(b'\n', skipped) {
            self.line += 1;
            last_newline = Some(at);
        }
        match last_newline {
            Some(at) => self.column = (len - at) as u32,
            None => self.column += len as u32,
        }
        self.pos += len;
    }

    fn skip_char(&mut self) {
        let len = self.rest().chars().next().map_or(1, char::len_utf8);
        self.advance(len);
    }

    fn skip_whitespace(&mut self) {
        while self.peek().is_some_and(|b| b.is_ascii_whitespace()) {
            self.advance(1);
        }
    }

    fn scan_name(&mut self) -> &'s str {
        let start = self.pos;
        if self.peek().is_some_and(is_name_start) {
            self.advance(1);
            while self.peek().is_some_and(is_name_byte) {
                self.advance(1);
            }
        }
        self.slice(start, self.pos)
    }

    fn token(
        &self,
        kind: TokenKind,
        text: impl Into<String>,
        start: usize,
        location: Location,
    ) -> Token {
        Token {
            kind,
            text: text.into(),
            span: Span::new(start, self.pos),
            location,
        }
    }

    fn eof_token(&self) -> Token {
        Token {
            kind: TokenKind::Eof,
            text: String::new(),
            span: Span::new(self.src.len(), self.src.len()),
            location: self.location(),
        }
    }

    fn next_markup(&mut self, diags: &mut Diagnostics) -> Token {
        if self.at_eof() {
            return self.eof_token();
        }
        let start = self.pos;
        let location = self.location();
        let rest = self.rest();
        let bytes = rest.as_bytes();

        if bytes[0] != b'<' {
            let end = memchr(b'<', bytes).unwrap_or(bytes.len());
            let text = &rest[..end];
            self.advance(end);
            return self.token(TokenKind::Text, text, start, location);
        }
        if rest.starts_with("<!--") {
            return self.scan_comment(start, location, diags);
        }
        if rest.starts_with("<%--") {
            return self.scan_server_comment(start, location, diags);
        }
        if rest.starts_with("<%@") {
            self.advance(3);
            self.skip_whitespace();
            let name = self.scan_name();
            return self.token(TokenKind::Directive, name, start, location);
        }
        if rest.starts_with("<%") {
            return self.scan_server_block(start, location, diags);
        }
        if rest.starts_with("</") {
            return self.scan_closing_tag(start, location, diags);
        }
        if rest.starts_with("<!") {
            return self.scan_markup_declaration(start, location, diags);
        }
        if bytes.len() > 1 && is_name_start(bytes[1]) {
            self.advance(1);
            let name = self.scan_name();
            return self.token(TokenKind::TagOpen, name, start, location);
        }

        // A '<' that opens nothing is literal text.
        let end = memchr(b'<', &bytes[1..]).map_or(bytes.len(), |at| at + 1);
        let text = &rest[..end];
        self.advance(end);
        self.token(TokenKind::Text, text, start, location)
    }

    fn scan_comment(&mut self, start: usize, location: Location, diags: &mut Diagnostics) -> Token {
        let rest = self.rest();
        match memmem::find(&rest.as_bytes()[4..], b"-->") {
            Some(at) => {
                let text = &rest[4..4 + at];
                self.advance(4 + at + 3);
                self.token(TokenKind::Comment, text, start, location)
            }
            None => {
                diags.error("unterminated comment", location);
                let text = &rest[4..];
                self.advance(rest.len());
                self.token(TokenKind::Comment, text, start, location)
            }
        }
    }

    fn scan_server_comment(
        &mut self,
        start: usize,
        location: Location,
        diags: &mut Diagnostics,
    ) -> Token {
        let rest = self.rest();
        match memmem::find(&rest.as_bytes()[4..], b"--%>") {
            Some(at) => {
                let text = &rest[4..4 + at];
                self.advance(4 + at + 4);
                self.token(TokenKind::Comment, text, start, location)
            }
            None => {
                diags.error("unterminated server comment", location);
                let text = &rest[4..];
                self.advance(rest.len());
                self.token(TokenKind::Comment, text, start, location)
            }
        }
    }

    /// The whole block, delimiters included, becomes one token; the tree
    /// layer splits out the kind sigil and body.
    fn scan_server_block(
        &mut self,
        start: usize,
        location: Location,
        diags: &mut Diagnostics,
    ) -> Token {
        let rest = self.rest();
        match memmem::find(&rest.as_bytes()[2..], b"%>") {
            Some(at) => {
                let end = 2 + at + 2;
                let text = &rest[..end];
                self.advance(end);
                self.token(TokenKind::ServerBlock, text, start, location)
            }
            None => {
                diags.error("unterminated server block", location);
                self.advance(rest.len());
                self.token(TokenKind::ServerBlock, rest, start, location)
            }
        }
    }

    fn scan_markup_declaration(
        &mut self,
        start: usize,
        location: Location,
        diags: &mut Diagnostics,
    ) -> Token {
        let rest = self.rest();
        let doctype = rest.len() >= 9 && rest.as_bytes()[2..9].eq_ignore_ascii_case(b"doctype");
        let kind = if doctype {
            TokenKind::Doctype
        } else {
            TokenKind::Text
        };
        match memchr(b'>', &rest.as_bytes()[2..]) {
            Some(at) => {
                let end = 2 + at + 1;
                let text = &rest[..end];
                self.advance(end);
                self.token(kind, text, start, location)
            }
            None => {
                diags.error("unterminated markup declaration", location);
                self.advance(rest.len());
                self.token(kind, rest, start, location)
            }
        }
    }

    fn scan_closing_tag(
        &mut self,
        start: usize,
        location: Location,
        diags: &mut Diagnostics,
    ) -> Token {
        self.advance(2);
        let name = self.scan_name();
        self.skip_whitespace();
        let mut junk = false;
        loop {
            match self.peek() {
                Some(b'>') => {
                    self.advance(1);
                    break;
                }
                Some(b'<') | None => {
                    diags.error("unterminated closing tag", location);
                    break;
                }
                Some(_) => {
                    if !junk {
                        diags.warning("unexpected characters in closing tag", self.location());
                        junk = true;
                    }
                    self.skip_char();
                }
            }
        }
        self.token(TokenKind::TagClose, name, start, location)
    }

    fn next_in_tag(&mut self, directive: bool, diags: &mut Diagnostics) -> Token {
        loop {
            self.skip_whitespace();
            if self.at_eof() {
                return self.eof_token();
            }
            let start = self.pos;
            let location = self.location();
            let rest = self.rest();
            let bytes = rest.as_bytes();

            if directive && rest.starts_with("%>") {
                self.advance(2);
                return self.token(TokenKind::TagClose, "%>", start, location);
            }
            if !directive && bytes[0] == b'>' {
                self.advance(1);
                return self.token(TokenKind::TagClose, ">", start, location);
            }
            if !directive && rest.starts_with("/>") {
                self.advance(2);
                return self.token(TokenKind::TagClose, "/>", start, location);
            }
            match bytes[0] {
                // A new construct opening inside an unterminated head. Hand
                // back a zero-width close without consuming it.
                b'<' => return self.token(TokenKind::TagClose, "", start, location),
                b'=' => return self.scan_attr_value(directive, start, location, diags),
                b'/' => self.advance(1),
                b if is_name_start(b) => {
                    let name = self.scan_name();
                    return self.token(TokenKind::AttrName, name, start, location);
                }
                _ => self.skip_char(),
            }
        }
    }

    fn scan_attr_value(
        &mut self,
        directive: bool,
        start: usize,
        location: Location,
        diags: &mut Diagnostics,
    ) -> Token {
        self.advance(1);
        self.skip_whitespace();
        let Some(open) = self.peek() else {
            return self.token(TokenKind::AttrValue, "", start, location);
        };
        if open == b'"' || open == b'\'' {
            let rest = self.rest();
            return match memchr(open, &rest.as_bytes()[1..]) {
                Some(at) => {
                    let text = &rest[1..1 + at];
                    self.advance(1 + at + 1);
                    self.token(TokenKind::AttrValue, text, start, location)
                }
                None => {
                    diags.error("unterminated attribute value", self.location());
                    let text = &rest[1..];
                    self.advance(rest.len());
                    self.token(TokenKind::AttrValue, text, start, location)
                }
            };
        }
        if open == b'>' || open == b'<' || (directive && self.rest().starts_with("%>")) {
            diags.warning("attribute value missing", self.location());
            return self.token(TokenKind::AttrValue, "", start, location);
        }
        let value_start = self.pos;
        loop {
            match self.peek() {
                None | Some(b'>') | Some(b'<') => break,
                Some(b'%') if directive && self.rest().starts_with("%>") => break,
                Some(b) if b.is_ascii_whitespace() => break,
                Some(_) => self.skip_char(),
            }
        }
        let text = self.slice(value_start, self.pos);
        self.token(TokenKind::AttrValue, text, start, location)
    }

    fn next_rawtext(&mut self, close_tag: &str, diags: &mut Diagnostics) -> Token {
        if self.at_eof() {
            return self.eof_token();
        }
        match self.find_rawtext_close(close_tag) {
            Some(0) => self.next_markup(diags),
            Some(at) => {
                let start = self.pos;
                let location = self.location();
                let text = self.slice(start, start + at);
                self.advance(at);
                self.token(TokenKind::Text, text, start, location)
            }
            None => {
                let start = self.pos;
                let location = self.location();
                let text = self.rest();
                self.advance(text.len());
                self.token(TokenKind::Text, text, start, location)
            }
        }
    }

    /// Offset of `</close_tag` from the current position, where the name is
    /// followed by whitespace, `>`, `/` or nothing.
    fn find_rawtext_close(&self, close_tag: &str) -> Option<usize> {
        let bytes = self.rest().as_bytes();
        for at in memchr_iter(b'<', bytes) {
            let after = &bytes[at..];
            if after.len() < 2 + close_tag.len() || after[1] != b'/' {
                continue;
            }
            if !after[2..2 + close_tag.len()].eq_ignore_ascii_case(close_tag.as_bytes()) {
                continue;
            }
            let next = after.get(2 + close_tag.len()).copied();
            if next.is_none_or(|b| b.is_ascii_whitespace() || b == b'>' || b == b'/') {
                return Some(at);
            }
        }
        None
    }
}
