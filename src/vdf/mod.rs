//! [VDF](https://developer.valvesoftware.com/wiki/KeyValues) file processing.
//!
//! Reads and writes the Client's textual key-value tree format as a
//! mutable ordered tree, so the Cookie Store can autovivify paths and
//! write them back out (not just scan them once, read-only).

mod parser;
mod scanner;

pub use parser::Error as ParseError;
pub use scanner::{Error as ScanError, Scanner, Token, TokenType};

use indexmap::IndexMap;
use std::path::Path;

/// A VDF value: either a leaf string or a nested mapping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    Str(String),
    Map(Tree),
}

impl Value {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            Value::Map(_) => None,
        }
    }

    pub fn as_map(&self) -> Option<&Tree> {
        match self {
            Value::Map(m) => Some(m),
            Value::Str(_) => None,
        }
    }

    pub fn as_map_mut(&mut self) -> Option<&mut Tree> {
        match self {
            Value::Map(m) => Some(m),
            Value::Str(_) => None,
        }
    }
}

/// An ordered key-value mapping; key order is preserved across load/dump
/// because the client's own writer is order-sensitive in practice.
pub type Tree = IndexMap<String, Value>;

/// Reads a VDF file. A missing file is not an error — it yields an empty
/// tree, so a cold install with no config yet just starts from nothing.
pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Tree> {
    let path = path.as_ref();
    match std::fs::read(path) {
        Ok(bytes) => parser::parse(&bytes)
            .map_err(anyhow::Error::from)
            .map_err(|e| e.context(format!("parsing VDF file {}", path.display()))),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Tree::new()),
        Err(e) => Err(anyhow::Error::from(e).context(format!("reading VDF file {}", path.display()))),
    }
}

/// Writes a VDF file: UTF-8, tab-indented, LF-terminated. No atomic
/// rename — the lock manager is what excludes concurrent writers, so
/// last-writer-wins is acceptable here, matching the client's own
/// direct-write behavior.
pub fn dump(path: impl AsRef<Path>, tree: &Tree) -> anyhow::Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut out = String::new();
    write_tree(&mut out, tree, 0);
    std::fs::write(path, out)
        .map_err(|e| anyhow::Error::from(e).context(format!("writing VDF file {}", path.display())))
}

fn write_tree(out: &mut String, tree: &Tree, depth: usize) {
    let indent = "\t".repeat(depth);
    for (key, value) in tree {
        match value {
            Value::Str(s) => {
                out.push_str(&indent);
                write_quoted(out, key);
                out.push('\t');
                write_quoted(out, s);
                out.push('\n');
            }
            Value::Map(sub) => {
                out.push_str(&indent);
                write_quoted(out, key);
                out.push('\n');
                out.push_str(&indent);
                out.push_str("{\n");
                write_tree(out, sub, depth + 1);
                out.push_str(&indent);
                out.push_str("}\n");
            }
        }
    }
}

fn write_quoted(out: &mut String, s: &str) {
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            _ => out.push(c),
        }
    }
    out.push('"');
}

/// Looks up (and autovivifies) a backslash-separated path inside `tree`.
///
/// For each segment: try an exact key match first, then a case-folded
/// match (the client's files are observed with inconsistent casing in
/// the wild); if neither matches, insert an empty submapping under the
/// literal segment and descend. Never desynchronizes the case of
/// existing keys — only a global, on-demand lookup is case-folded, not
/// the keys themselves.
pub fn subkey_lookup<'a>(tree: &'a mut Tree, path: &str) -> &'a mut Tree {
    let mut current = tree;
    for segment in path.split('\\') {
        let existing_key = if current.contains_key(segment) {
            Some(segment.to_owned())
        } else {
            current
                .keys()
                .find(|k| k.eq_ignore_ascii_case(segment))
                .cloned()
        };
        let key = existing_key.unwrap_or_else(|| segment.to_owned());
        let entry = current
            .entry(key)
            .or_insert_with(|| Value::Map(Tree::new()));
        if !matches!(entry, Value::Map(_)) {
            *entry = Value::Map(Tree::new());
        }
        current = entry.as_map_mut().expect("just normalized to Map above");
    }
    current
}

/// Reads a string leaf at a backslash-separated path, without autovivifying.
pub fn get_str<'a>(tree: &'a Tree, path: &str) -> Option<&'a str> {
    let mut segments = path.split('\\').peekable();
    let mut current = tree;
    while let Some(segment) = segments.next() {
        let value = current
            .get(segment)
            .or_else(|| current.iter().find(|(k, _)| k.eq_ignore_ascii_case(segment)).map(|(_, v)| v))?;
        if segments.peek().is_none() {
            return value.as_str();
        }
        current = value.as_map()?;
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subkey_lookup_autovivifies_minimal_chain() {
        let mut tree = Tree::new();
        subkey_lookup(&mut tree, "A\\B\\C")
            .insert("leaf".into(), Value::Str("1".into()));
        assert_eq!(
            get_str(&tree, "A\\B\\C\\leaf"),
            Some("1")
        );
    }

    #[test]
    fn subkey_lookup_is_case_insensitive() {
        let mut tree = Tree::new();
        subkey_lookup(&mut tree, "Software\\Valve\\Steam")
            .insert("AutoLoginUser".into(), Value::Str("alice".into()));
        // second call uses different casing, must resolve to the same submapping
        subkey_lookup(&mut tree, "SOFTWARE\\VALVE\\steam")
            .insert("RememberPassword".into(), Value::Str("1".into()));
        assert_eq!(tree.len(), 1, "case-folded match must not create a duplicate subtree");
        assert_eq!(get_str(&tree, "Software\\Valve\\Steam\\AutoLoginUser"), Some("alice"));
        assert_eq!(get_str(&tree, "Software\\Valve\\Steam\\RememberPassword"), Some("1"));
    }

    #[test]
    fn round_trips_through_dump_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.vdf");
        let mut tree = Tree::new();
        subkey_lookup(&mut tree, "Accounts\\alice")
            .insert("Timestamp".into(), Value::Str("12345".into()));
        dump(&path, &tree).unwrap();
        let reloaded = load(&path).unwrap();
        assert_eq!(
            get_str(&reloaded, "Accounts\\alice\\Timestamp"),
            Some("12345")
        );
    }

    #[test]
    fn load_of_missing_file_is_empty_tree() {
        let tree = load("/nonexistent/path/does-not-exist.vdf").unwrap();
        assert!(tree.is_empty());
    }
}
