//! Compiler diagnostic helpers
//!
//! Hints are advisory only. They are shown next to the raw diagnostic and
//! never replace it.

use std::path::Path;

/// Diagnostic substrings and the hint shown for them, first match wins
const HINTS: &[(&str, &str)] = &[
    (
        "'::main' must return 'int'",
        "main() function must return 'int', not 'void'. Use 'int main()' instead of 'void main()'.",
    ),
    (
        "expected ';'",
        "Missing semicolon (;) at the end of a statement.",
    ),
    (
        "'cout' was not declared",
        "Missing '#include <iostream>' or 'using namespace std;'",
    ),
    (
        "'cin' was not declared",
        "Missing '#include <iostream>' or 'using namespace std;' for input operations.",
    ),
    (
        "'scanf' was not declared",
        "Missing '#include <cstdio>' for scanf operations.",
    ),
    (
        "'printf' was not declared",
        "Missing '#include <cstdio>' for printf operations.",
    ),
    (
        "undefined reference",
        "Compilation failed due to undefined references. Check your includes and function declarations.",
    ),
    (
        "cannot find",
        "Compilation failed. Check your syntax and includes.",
    ),
];

/// Find a human-readable hint for a compiler diagnostic
pub fn hint_for(diagnostics: &str) -> Option<&'static str> {
    HINTS
        .iter()
        .find(|(needle, _)| diagnostics.contains(needle))
        .map(|(_, hint)| *hint)
}

/// Remove the workspace path from text shown to users
pub fn scrub_workspace_path(text: &str, root: &Path) -> String {
    let root = root.to_string_lossy();
    if root.is_empty() {
        return text.to_string();
    }
    let with_separator = format!("{}/", root.trim_end_matches('/'));
    text.replace(&with_separator, "")
        .replace(root.trim_end_matches('/'), ".")
}
