//! Integration Test: Source Hygiene
//!
//! Enforces the async-first rules the streaming pipeline depends on:
//!
//! **Policy**: Production code in the core, daemon, and client crates
//! MUST NOT block the runtime (no `std::thread::sleep`, no
//! `reqwest::blocking`) and library code MUST NOT `unwrap()` outside
//! tests - the exchange path propagates errors instead of panicking.

use std::path::{Path, PathBuf};

/// Production source roots, relative to the workspace root
const PRODUCTION_ROOTS: &[&str] = &["parley/core/src", "parley/daemon/src", "client/src"];

/// Roots where unwrap() is forbidden outside tests (library code)
const LIBRARY_ROOTS: &[&str] = &["parley/core/src", "client/src"];

fn workspace_root() -> PathBuf {
    // tests/architectural-enforcement -> workspace root
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("..")
        .join("..")
}

/// The portion of a source file that ships in production builds
///
/// Test modules sit at the bottom of each file behind `#[cfg(test)]`;
/// everything after that marker is test-only.
fn production_source(text: &str) -> &str {
    text.split("#[cfg(test)]").next().unwrap_or(text)
}

fn scan_roots(roots: &[&str], mut check: impl FnMut(&Path, &str) -> Option<String>) -> Vec<String> {
    let mut violations = Vec::new();
    let workspace = workspace_root();

    for root in roots {
        let dir = workspace.join(root);
        assert!(dir.exists(), "missing production source root: {root}");

        for entry in walkdir::WalkDir::new(&dir).into_iter().filter_map(|e| e.ok()) {
            if entry.path().extension().and_then(|s| s.to_str()) != Some("rs") {
                continue;
            }
            let text = std::fs::read_to_string(entry.path())
                .unwrap_or_else(|e| panic!("failed to read {:?}: {e}", entry.path()));
            if let Some(violation) = check(entry.path(), production_source(&text)) {
                violations.push(violation);
            }
        }
    }

    violations
}

#[test]
fn test_no_blocking_sleep_in_production_code() {
    let violations = scan_roots(PRODUCTION_ROOTS, |path, source| {
        source
            .contains("std::thread::sleep")
            .then(|| format!("{}: std::thread::sleep blocks the runtime", path.display()))
    });

    assert!(
        violations.is_empty(),
        "blocking sleep in production code:\n{}",
        violations.join("\n")
    );
}

#[test]
fn test_no_blocking_http_in_production_code() {
    let violations = scan_roots(PRODUCTION_ROOTS, |path, source| {
        source
            .contains("reqwest::blocking")
            .then(|| format!("{}: reqwest::blocking blocks the runtime", path.display()))
    });

    assert!(
        violations.is_empty(),
        "blocking HTTP in production code:\n{}",
        violations.join("\n")
    );
}

#[test]
fn test_no_unwrap_in_library_code() {
    let violations = scan_roots(LIBRARY_ROOTS, |path, source| {
        source
            .contains(".unwrap()")
            .then(|| format!("{}: unwrap() in library code", path.display()))
    });

    assert!(
        violations.is_empty(),
        "unwrap() outside tests in library code:\n{}",
        violations.join("\n")
    );
}
