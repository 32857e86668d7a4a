//! `/etc/shells` registration for `@shell`-tagged asset entries (§4.C).
//!
//! Installing a package that ships a login shell lists its absolute path in
//! `/etc/shells`; deleting the package strips the line back out. Best-effort:
//! a missing or unwritable `/etc/shells` is not a fatal install/delete error.

use std::fs;

const SHELLS_FILE: &str = "/etc/shells";

/// Appends `path` to `/etc/shells` if it isn't already listed.
pub(crate) fn register(path: &str) {
    register_at(SHELLS_FILE, path);
}

/// Removes `path` from `/etc/shells`, if present.
pub(crate) fn unregister(path: &str) {
    unregister_at(SHELLS_FILE, path);
}

fn register_at(shells_file: &str, path: &str) {
    let existing = fs::read_to_string(shells_file).unwrap_or_default();
    if existing.lines().any(|line| line.trim() == path) {
        return;
    }
    let mut updated = existing;
    if !updated.is_empty() && !updated.ends_with('\n') {
        updated.push('\n');
    }
    updated.push_str(path);
    updated.push('\n');
    let _ = fs::write(shells_file, updated);
}

fn unregister_at(shells_file: &str, path: &str) {
    let Ok(existing) = fs::read_to_string(shells_file) else {
        return;
    };
    let filtered: String = existing.lines().filter(|line| line.trim() != path).map(|line| format!("{line}\n")).collect();
    let _ = fs::write(shells_file, filtered);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_appends_and_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let shells_file = dir.path().join("shells");
        let path_str = shells_file.to_str().unwrap();

        register_at(path_str, "/usr/local/bin/fish");
        register_at(path_str, "/usr/local/bin/fish");

        let contents = fs::read_to_string(&shells_file).unwrap();
        assert_eq!(contents.lines().filter(|l| *l == "/usr/local/bin/fish").count(), 1);
    }

    #[test]
    fn unregister_removes_only_the_matching_line() {
        let dir = tempfile::tempdir().unwrap();
        let shells_file = dir.path().join("shells");
        let path_str = shells_file.to_str().unwrap();

        register_at(path_str, "/bin/bash");
        register_at(path_str, "/usr/local/bin/fish");
        unregister_at(path_str, "/usr/local/bin/fish");

        let contents = fs::read_to_string(&shells_file).unwrap();
        assert_eq!(contents.lines().collect::<Vec<_>>(), vec!["/bin/bash"]);
    }

    #[test]
    fn unregister_on_missing_file_is_a_no_op() {
        unregister_at("/nonexistent/path/for/this/test", "/bin/bash");
    }
}
