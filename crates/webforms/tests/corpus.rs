use webforms_test_support::{check_case, load_corpus};

fn run(fixture: &str, content: &str) {
    let mut failures = Vec::new();
    for case in load_corpus(fixture, content) {
        if let Err(failure) = check_case(&case) {
            failures.push(failure);
        }
    }
    assert!(failures.is_empty(), "{}", failures.join("\n\n"));
}

#[test]
fn well_formed_corpus() {
    run("well_formed", include_str!("fixtures/well_formed.toml"));
}

#[test]
fn recovery_corpus() {
    run("recovery", include_str!("fixtures/recovery.toml"));
}

#[test]
fn page_info_corpus() {
    run("page_info", include_str!("fixtures/page_info.toml"));
}
