//! Truncation sweep: parsing any prefix of a realistic page must stay
//! total, keep every tree invariant, and report cuts that land inside a
//! construct.

use webforms::{ParseOptions, WebSubtype, check_tree, parse};

const PAGE: &str = concat!(
    "<%@ Page Language=\"C#\" Inherits=\"App.Default\" CodeBehind=\"Default.aspx.cs\" %>\n",
    "<!DOCTYPE html>\n",
    "<html>\n",
    "<head><meta charset=\"utf-8\"><title>Home</title></head>\n",
    "<body>\n",
    "<!-- greeting block -->\n",
    "<div class=\"greeting\">\n",
    "<asp:Label ID=\"Greeting\" runat=\"server\"/>\n",
    "<%-- rendered on the server --%>\n",
    "<% if (ready) { %>\n",
    "<%= User.Name %>\n",
    "<% } %>\n",
    "</div>\n",
    "<script runat=\"server\">void Page_Load(object sender, EventArgs e) { Bind(); }</script>\n",
    "</body>\n",
    "</html>\n",
);

#[test]
fn the_reference_page_parses_clean() {
    let options = ParseOptions {
        file_name: Some("Default.aspx"),
        ..ParseOptions::default()
    };
    let parsed = parse(PAGE, &options).unwrap();

    assert!(
        parsed.diagnostics.is_empty(),
        "{:?}",
        parsed.diagnostics.entries()
    );
    assert_eq!(parsed.page_info.subtype, WebSubtype::Page);
    assert_eq!(parsed.page_info.code_behind.as_deref(), Some("Default.aspx.cs"));
    // Three render blocks and the script island.
    assert_eq!(parsed.projections.len(), 4);
    check_tree(&parsed.document).unwrap();
}

#[test]
fn every_prefix_yields_a_consistent_tree() {
    for end in 0..=PAGE.len() {
        if !PAGE.is_char_boundary(end) {
            continue;
        }
        let parsed = parse(&PAGE[..end], &ParseOptions::default()).unwrap();
        if let Err(err) = check_tree(&parsed.document) {
            panic!("prefix of {end} bytes broke a tree invariant: {err}");
        }
    }
}

#[test]
fn a_cut_inside_each_construct_is_reported() {
    // Each label sits inside a construct that cannot end before it.
    let labels = [
        "Inherits",
        "utf-8",
        "greeting block",
        "rendered on",
        "User.Name",
        "Page_Load",
    ];
    for label in labels {
        let at = PAGE.find(label).unwrap();
        let parsed = parse(&PAGE[..at], &ParseOptions::default()).unwrap();
        assert!(
            !parsed.diagnostics.is_empty(),
            "cutting before {label:?} at byte {at} reported nothing"
        );
    }
}
