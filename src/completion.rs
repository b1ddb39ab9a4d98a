/*
 *   Copyright (c) 2024 R3BL LLC
 *   All rights reserved.
 *
 *   Licensed under the Apache License, Version 2.0 (the "License");
 *   you may not use this file except in compliance with the License.
 *   You may obtain a copy of the License at
 *
 *   http://www.apache.org/licenses/LICENSE-2.0
 *
 *   Unless required by applicable law or agreed to in writing, software
 *   distributed under the License is distributed on an "AS IS" BASIS,
 *   WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 *   See the License for the specific language governing permissions and
 *   limitations under the License.
 */

//! Candidate gathering, merging, and multi-column display for Tab completion.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::error::EditorResult;
use crate::registry::Registry;

/// Byte appended (or not) after inserting a unique match. `Space` is the default;
/// `None` is the `NOSPACE` sentinel used by, e.g., directory completions that expect
/// the path to continue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Terminator {
    Space,
    Byte(u8),
    NoSpace,
}

pub struct Candidates {
    pub words: Vec<String>,
    pub terminator: Terminator,
}

/// Most completion sources (the word-zero command-name list, a completion table's
/// child names) have no opinion on the terminator; they always want `Space`.
impl From<Vec<String>> for Candidates {
    fn from(words: Vec<String>) -> Self { Self { words, terminator: Terminator::Space } }
}

/// Gathers every candidate for the in-progress `match_str` at argument index `word`
/// of `argv`, in the source order the specification defines: per-command
/// completion, default completion, completion table, and (only at `word == 0`)
/// every registered command name. A source's own [`Terminator`] wins over an
/// earlier, less specific one; when more than one source fires for the same
/// completion (a rare configuration), the last one to run decides.
pub fn gather(registry: &mut Registry, argv: &[String], word: usize, match_str: &str) -> Candidates {
    let mut words = Vec::new();
    let mut terminator = Terminator::Space;

    if word > 0 {
        if let Some(cmd) = registry.command_mut(&argv[0]) {
            if let Some(complete) = cmd.complete.as_mut() {
                let mut cands = complete(match_str);
                words.append(&mut cands.words);
                terminator = cands.terminator;
            }
        }
    }

    if words.is_empty() {
        if let Some(default) = registry.default_complete.as_mut() {
            let mut cands = default(match_str);
            words.append(&mut cands.words);
            terminator = cands.terminator;
        }
    }

    if let Some(table) = &mut registry.completion_table {
        let (node, depth) = table.resolve(&argv[..word.min(argv.len())]);
        if depth == word {
            if let Some(complete) = node.complete.as_mut() {
                let mut cands = complete(match_str);
                words.append(&mut cands.words);
                terminator = cands.terminator;
            }
            for child in &node.children {
                if let Some(name) = &child.name {
                    words.push(name.clone());
                }
            }
        }
    }

    if word == 0 {
        words.extend(registry.names().map(str::to_string));
    }

    words.sort();
    words.dedup();
    words.retain(|w| w.starts_with(match_str));

    tracing::debug!(word, match_str, candidates = words.len(), ?terminator, "completion resolved");

    Candidates { words, terminator }
}

/// Computes the longest common prefix across `words`, or `None` if `words` is empty.
pub fn longest_common_prefix(words: &[String]) -> Option<String> {
    let first = words.first()?;
    let mut prefix_len = first.len();
    for w in &words[1..] {
        let common = first.bytes().zip(w.bytes()).take_while(|(a, b)| a == b).count();
        prefix_len = prefix_len.min(common);
    }
    Some(first[..prefix_len].to_string())
}

/// Renders `words` in multi-column form sized to `term_width`, skipping the first
/// `skip_prefix_len` bytes of each entry (used by file completion to hide a long
/// common directory prefix). Falls back to one-per-line when `term_width` is `None`.
pub fn render_columns<W: Write>(
    out: &mut W,
    words: &[String],
    term_width: Option<usize>,
    skip_prefix_len: usize,
) -> EditorResult<()> {
    let displayed: Vec<&str> = words.iter().map(|w| &w[skip_prefix_len.min(w.len())..]).collect();
    let Some(width) = term_width else {
        for w in &displayed {
            writeln!(out, "{w}")?;
        }
        return Ok(());
    };
    let max_len = displayed.iter().map(|w| w.len()).max().unwrap_or(0) + 2;
    let cols = (width / max_len.max(1)).max(1);
    for chunk in displayed.chunks(cols) {
        let mut line = String::new();
        for w in chunk {
            line.push_str(&format!("{w:<width$}", width = max_len));
        }
        writeln!(out, "{}", line.trim_end())?;
    }
    Ok(())
}

/// Walks `dirs` (each a literal directory, or each `:`-separated entry of a PATH
/// string) collecting entries whose name has prefix `match_str`, filtered by
/// `want_dirs`/`want_files`, an optional extension allow-list, and, when
/// `require_executable` is set, the owner/group/other executable bits of the file's
/// mode (the `PATH`-search case: offering only things that can actually be run).
/// Directory entries always pass the executable filter regardless of their own
/// permission bits, since a directory's "x" bit means "searchable", not "runnable",
/// and excluding it would make path traversal impossible.
pub fn file_completion(
    dirs: &[PathBuf],
    match_str: &str,
    want_dirs: bool,
    want_files: bool,
    extensions: Option<&[&str]>,
    require_executable: bool,
) -> Candidates {
    let (dir_prefix, name_prefix) = match match_str.rfind('/') {
        Some(idx) => (&match_str[..=idx], &match_str[idx + 1..]),
        None => ("", match_str),
    };

    let mut words = Vec::new();
    let mut saw_dir_match = false;

    let search_roots: Vec<PathBuf> = if dir_prefix.is_empty() {
        dirs.to_vec()
    } else {
        vec![Path::new(dir_prefix).to_path_buf()]
    };

    for root in &search_roots {
        let Ok(entries) = fs::read_dir(root) else { continue };
        for entry in entries.flatten() {
            let name = entry.file_name().to_string_lossy().into_owned();
            if !name.starts_with(name_prefix) {
                continue;
            }
            let is_dir = entry.file_type().map(|t| t.is_dir()).unwrap_or(false);
            if is_dir {
                if !want_dirs {
                    continue;
                }
                words.push(format!("{dir_prefix}{name}/"));
                saw_dir_match = true;
            } else {
                if !want_files {
                    continue;
                }
                if let Some(exts) = extensions {
                    let ok = exts.iter().any(|e| name.ends_with(e));
                    if !ok {
                        continue;
                    }
                }
                if require_executable && !is_executable(&entry) {
                    continue;
                }
                words.push(format!("{dir_prefix}{name}"));
            }
        }
    }

    words.sort();
    words.dedup();
    let terminator = if saw_dir_match && words.len() == 1 { Terminator::NoSpace } else { Terminator::Space };
    Candidates { words, terminator }
}

/// Windows has no owner/group/other executable bit; there, anything is offered.
#[cfg(target_os = "windows")]
fn is_executable(_entry: &fs::DirEntry) -> bool { true }

#[cfg(not(target_os = "windows"))]
fn is_executable(entry: &fs::DirEntry) -> bool {
    use std::os::unix::fs::PermissionsExt as _;
    entry.metadata().map(|m| m.permissions().mode() & 0o111 != 0).unwrap_or(false)
}
