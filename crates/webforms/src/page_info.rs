//! Page-level facts lifted out of a parsed tree: the file's web subtype,
//! its file directive attributes, and the doctype.

use crate::diagnostics::Diagnostics;
use crate::token::Location;
use crate::tree::{Document, NodeKind};

/// What flavor of WebForms artifact a file is.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub enum WebSubtype {
    Page,
    MasterPage,
    Control,
    Global,
    Handler,
    WebService,
    #[default]
    None,
}

impl WebSubtype {
    /// Classify by file extension, ASCII case-insensitive. Unknown or
    /// missing extensions map to [`WebSubtype::None`].
    pub fn from_extension(file_name: &str) -> WebSubtype {
        const TABLE: &[(&str, WebSubtype)] = &[
            ("aspx", WebSubtype::Page),
            ("master", WebSubtype::MasterPage),
            ("ascx", WebSubtype::Control),
            ("asax", WebSubtype::Global),
            ("ashx", WebSubtype::Handler),
            ("asmx", WebSubtype::WebService),
        ];
        let Some((_, ext)) = file_name.rsplit_once('.') else {
            return WebSubtype::None;
        };
        TABLE
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(ext))
            .map(|(_, subtype)| *subtype)
            .unwrap_or(WebSubtype::None)
    }

    /// Classify by the name of a `<%@ ... %>` directive. Directives that do
    /// not declare the file's type, such as `Register`, yield `None`.
    pub fn from_directive(name: &str) -> Option<WebSubtype> {
        const TABLE: &[(&str, WebSubtype)] = &[
            ("Page", WebSubtype::Page),
            ("Master", WebSubtype::MasterPage),
            ("Control", WebSubtype::Control),
            ("Application", WebSubtype::Global),
            ("WebHandler", WebSubtype::Handler),
            ("WebService", WebSubtype::WebService),
        ];
        TABLE
            .iter()
            .find(|(directive, _)| directive.eq_ignore_ascii_case(name))
            .map(|(_, subtype)| *subtype)
    }
}

/// Maps a file name to the subtype its location implies. The default keys
/// off the extension; hosts with project-level knowledge can substitute
/// their own mapping.
pub trait SubtypeResolver {
    fn resolve(&self, file_name: &str) -> WebSubtype;
}

/// Extension-based [`SubtypeResolver`].
#[derive(Clone, Copy, Debug, Default)]
pub struct ExtensionSubtypes;

impl SubtypeResolver for ExtensionSubtypes {
    fn resolve(&self, file_name: &str) -> WebSubtype {
        WebSubtype::from_extension(file_name)
    }
}

#[derive(Clone, Debug, Default)]
pub struct PageInfo {
    pub subtype: WebSubtype,
    /// File directive attributes in source order, duplicates kept.
    pub directive_attributes: Vec<(String, String)>,
    pub language: Option<String>,
    pub inherits: Option<String>,
    pub code_behind: Option<String>,
    pub code_file: Option<String>,
    pub master_page_file: Option<String>,
    pub doctype: Option<String>,
    declared: Option<WebSubtype>,
}

impl PageInfo {
    /// Collect page-level facts from a finished tree. Every recognized file
    /// directive contributes; a later one overwrites the scalar fields.
    pub fn populate(document: &Document) -> PageInfo {
        let mut info = PageInfo::default();
        for id in document.iter() {
            match &document.node(id).kind {
                NodeKind::Directive { name, attributes } => {
                    let Some(declared) = WebSubtype::from_directive(name) else {
                        continue;
                    };
                    info.declared = Some(declared);
                    info.subtype = declared;
                    for attr in attributes {
                        let value = attr.value.clone().unwrap_or_default();
                        info.set_known_field(&attr.name, &value);
                        info.directive_attributes.push((attr.name.clone(), value));
                    }
                }
                NodeKind::Doctype { text } => {
                    if info.doctype.is_none() {
                        info.doctype = Some(text.clone());
                    }
                }
                _ => {}
            }
        }
        info
    }

    fn set_known_field(&mut self, name: &str, value: &str) {
        let slot = if name.eq_ignore_ascii_case("language") {
            &mut self.language
        } else if name.eq_ignore_ascii_case("inherits") {
            &mut self.inherits
        } else if name.eq_ignore_ascii_case("codebehind") {
            &mut self.code_behind
        } else if name.eq_ignore_ascii_case("codefile") {
            &mut self.code_file
        } else if name.eq_ignore_ascii_case("masterpagefile") {
            &mut self.master_page_file
        } else {
            return;
        };
        *slot = Some(value.to_string());
    }

    /// Case-insensitive lookup among the file directive's attributes. The
    /// last occurrence of a repeated name wins.
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.directive_attributes
            .iter()
            .rev()
            .find(|(attr, _)| attr.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// Subtype declared by the file directive, if one was present.
    pub fn declared_subtype(&self) -> Option<WebSubtype> {
        self.declared
    }

    /// Check the declared subtype against what the file's location implies.
    /// The location wins any disagreement; a missing declaration is an error
    /// when the location implies one.
    pub fn reconcile(&mut self, expected: WebSubtype, diags: &mut Diagnostics) {
        if expected == WebSubtype::None {
            return;
        }
        match self.declared {
            None => {
                diags.error("File directive is missing", Location::START);
                self.subtype = expected;
            }
            Some(declared) if declared != expected => {
                diags.warning(
                    "File directive does not match page extension",
                    Location::START,
                );
                self.subtype = expected;
            }
            Some(_) => {}
        }
    }
}
