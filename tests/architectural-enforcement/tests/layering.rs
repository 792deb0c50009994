//! Layering and blocking-call checks

use std::fs;
use std::path::{Path, PathBuf};

use architectural_enforcement::workspace_root;
use walkdir::WalkDir;

/// Rust sources under `assistant/*/src`
fn production_sources() -> Vec<PathBuf> {
    let root = workspace_root().join("assistant");
    WalkDir::new(&root)
        .into_iter()
        .filter_map(Result::ok)
        .map(walkdir::DirEntry::into_path)
        .filter(|path| path.extension().is_some_and(|ext| ext == "rs"))
        .filter(|path| path.components().any(|c| c.as_os_str() == "src"))
        .collect()
}

/// Code lines before the first `#[cfg(test)]`, comments removed
fn non_test_code(path: &Path) -> String {
    let source = fs::read_to_string(path).unwrap();
    let code = match source.find("#[cfg(test)]") {
        Some(pos) => &source[..pos],
        None => &source[..],
    };
    code.lines()
        .filter(|line| !line.trim_start().starts_with("//"))
        .collect::<Vec<_>>()
        .join("\n")
}

#[test]
fn test_sources_found() {
    let sources = production_sources();
    assert!(
        sources.iter().any(|p| p.ends_with("core/src/panel.rs")),
        "expected to find the panel module, got {sources:?}"
    );
}

#[test]
fn test_no_blocking_sleep_in_production_code() {
    let offenders: Vec<_> = production_sources()
        .into_iter()
        .filter(|path| {
            let code = non_test_code(path);
            code.contains("std::thread::sleep") || code.contains("thread::sleep(")
        })
        .collect();

    assert!(
        offenders.is_empty(),
        "blocking sleep found in async code: {offenders:?}"
    );
}

#[test]
fn test_core_has_no_ui_dependencies() {
    let manifest = fs::read_to_string(workspace_root().join("assistant/core/Cargo.toml")).unwrap();
    for forbidden in ["ratatui", "crossterm", "clap"] {
        assert!(
            !manifest.contains(forbidden),
            "assistant-core must stay surface-agnostic but depends on {forbidden}"
        );
    }
}

#[test]
fn test_core_does_not_print() {
    let core_src = workspace_root().join("assistant/core/src");
    let offenders: Vec<_> = production_sources()
        .into_iter()
        .filter(|path| path.starts_with(&core_src))
        .filter(|path| {
            let code = non_test_code(path);
            code.contains("println!(") || code.contains("eprintln!(")
        })
        .collect();

    assert!(
        offenders.is_empty(),
        "core library should log through tracing, not print: {offenders:?}"
    );
}
