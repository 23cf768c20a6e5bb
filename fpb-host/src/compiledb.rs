//! Compile database lookup (spec §4.8 step 5, §6).
//!
//! `compile_commands.json` as emitted by CMake/Meson/bear: an array of
//! entries, each either a single shell `command` string or a pre-split
//! `arguments` list. The inject pipeline borrows the nearest sibling
//! entry's include paths and defines rather than requiring the user to
//! hand-maintain a second build description.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::HostError;

/// One compile database entry.
#[derive(Debug, Clone, Deserialize)]
pub struct Entry {
    /// Working directory the command was recorded under.
    pub directory: PathBuf,
    /// Source file the command compiles.
    pub file: PathBuf,
    /// Shell-quoted command line, if the database uses this form.
    #[serde(default)]
    pub command: Option<String>,
    /// Pre-split argv, if the database uses this form.
    #[serde(default)]
    pub arguments: Option<Vec<String>>,
}

impl Entry {
    /// Splits `command`/`arguments` into argv, skipping argv[0] (the
    /// compiler driver itself — the pipeline invokes its own configured
    /// compiler).
    fn flags(&self) -> Vec<String> {
        let argv: Vec<String> = if let Some(args) = &self.arguments {
            args.clone()
        } else if let Some(cmd) = &self.command {
            cmd.split_whitespace().map(str::to_string).collect()
        } else {
            Vec::new()
        };
        argv.into_iter().skip(1).collect()
    }

    /// `-I`/`-D`/`-std=`/`-m*` flags only — everything relevant to
    /// recompiling one function the same way the rest of the project was
    /// built, with output-file and source-file arguments stripped.
    pub fn inheritable_flags(&self) -> Vec<String> {
        let mut out = Vec::new();
        let mut iter = self.flags().into_iter().peekable();
        while let Some(flag) = iter.next() {
            if flag == "-o" {
                iter.next();
                continue;
            }
            if flag == "-c" || flag.ends_with(".c") || flag.ends_with(".o") {
                continue;
            }
            if flag.starts_with("-I")
                || flag.starts_with("-D")
                || flag.starts_with("-std=")
                || flag.starts_with("-m")
                || flag.starts_with("-f")
            {
                out.push(flag);
            }
        }
        out
    }
}

/// A parsed `compile_commands.json`.
pub struct CompileDatabase {
    entries: Vec<Entry>,
}

impl CompileDatabase {
    /// Loads and parses a compile database from `path`.
    pub fn load(path: &Path) -> Result<Self, HostError> {
        let text = fs::read_to_string(path)?;
        let entries: Vec<Entry> =
            serde_json::from_str(&text).map_err(|e| HostError::CompileFailed(format!("bad compile database: {e}")))?;
        Ok(CompileDatabase { entries })
    }

    /// Exact-path match.
    pub fn entry_for(&self, source: &Path) -> Option<&Entry> {
        self.entries.iter().find(|e| e.file == source)
    }

    /// Falls back to any entry in the same directory as `source` when no
    /// exact match exists — the inject source is usually a scratch file
    /// next to the function's real translation unit, not in the database
    /// itself.
    pub fn nearest(&self, source: &Path) -> Option<&Entry> {
        if let Some(exact) = self.entry_for(source) {
            return Some(exact);
        }
        let parent = source.parent()?;
        self.entries.iter().find(|e| e.file.parent() == Some(parent))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_db(dir: &Path) -> PathBuf {
        let path = dir.join("compile_commands.json");
        let json = serde_json::json!([
            {
                "directory": dir,
                "file": dir.join("main.c"),
                "arguments": ["arm-none-eabi-gcc", "-Iinc", "-DNDEBUG", "-mcpu=cortex-m4", "-c", "main.c", "-o", "main.o"]
            }
        ]);
        fs::write(&path, serde_json::to_string(&json).unwrap()).unwrap();
        path
    }

    #[test]
    fn exact_match_wins_over_nearest() {
        let dir = tempfile::tempdir().unwrap();
        let db = CompileDatabase::load(&write_db(dir.path())).unwrap();
        let entry = db.entry_for(&dir.path().join("main.c")).unwrap();
        assert_eq!(entry.inheritable_flags(), vec!["-Iinc", "-DNDEBUG", "-mcpu=cortex-m4"]);
    }

    #[test]
    fn nearest_falls_back_to_sibling_directory() {
        let dir = tempfile::tempdir().unwrap();
        let db = CompileDatabase::load(&write_db(dir.path())).unwrap();
        let scratch = dir.path().join("patch_target.c");
        let entry = db.nearest(&scratch).unwrap();
        assert_eq!(entry.file, dir.path().join("main.c"));
    }

    #[test]
    fn no_entry_for_unrelated_directory() {
        let dir = tempfile::tempdir().unwrap();
        let db = CompileDatabase::load(&write_db(dir.path())).unwrap();
        assert!(db.nearest(Path::new("/unrelated/dir/foo.c")).is_none());
    }
}
