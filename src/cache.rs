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

//! Tagged-section persistence for history and aliases: `<START> <tag> N\n` followed
//! by N payload lines, then `<END> <tag>\n`. Several tagged sections may coexist in
//! one file; saving a tag excises any prior section with that tag before appending
//! the fresh one.

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use crate::error::{EditorError, EditorResult};

pub const START_SENTINEL: &str = "####---ccli---####";
pub const END_SENTINEL: &str = "%%%%---ccli---%%%%";

pub const HISTORY_TAG: &str = "ccli";
pub const ALIAS_TAG: &str = "ccli-alias";

/// Serialises one tagged section into `out`.
pub fn write_section<W: Write>(out: &mut W, tag: &str, lines: &[String]) -> EditorResult<()> {
    writeln!(out, "{START_SENTINEL} {tag} {}", lines.len())?;
    for line in lines {
        writeln!(out, "{line}")?;
    }
    writeln!(out, "{END_SENTINEL} {tag}")?;
    Ok(())
}

/// Finds and parses the first section tagged `tag` in `contents`. Returns `None` if
/// no such section exists or the section is malformed (missing lines, bad count, or
/// a mismatched end sentinel).
pub fn read_section(contents: &str, tag: &str) -> Option<Vec<String>> {
    let start_marker = format!("{START_SENTINEL} {tag} ");
    let end_marker = format!("{END_SENTINEL} {tag}");
    let mut lines = contents.lines();
    while let Some(line) = lines.next() {
        let Some(count_str) = line.strip_prefix(&start_marker) else { continue };
        let n: usize = count_str.trim().parse().ok()?;
        let mut payload = Vec::with_capacity(n);
        for _ in 0..n {
            payload.push(lines.next()?.to_string());
        }
        if lines.next()? != end_marker {
            return None;
        }
        return Some(payload);
    }
    None
}

/// Returns `contents` with any existing `tag` section removed and a fresh one
/// containing `lines` appended. Other tagged sections are preserved byte-for-byte,
/// in their original order.
pub fn replace_section(contents: &str, tag: &str, lines: &[String]) -> String {
    let start_marker = format!("{START_SENTINEL} {tag} ");
    let end_marker = format!("{END_SENTINEL} {tag}");
    let all: Vec<&str> = contents.lines().collect();

    let mut kept: Vec<&str> = Vec::with_capacity(all.len());
    let mut i = 0;
    while i < all.len() {
        if all[i].starts_with(&start_marker) {
            let mut j = i + 1;
            while j < all.len() && all[j] != end_marker {
                j += 1;
            }
            i = j + 1; // skip past the end sentinel line too
            continue;
        }
        kept.push(all[i]);
        i += 1;
    }

    let mut result = kept.join("\n");
    if !result.is_empty() {
        result.push('\n');
    }
    let mut fresh = Vec::new();
    write_section(&mut fresh, tag, lines).expect("writing to a Vec<u8> cannot fail");
    result.push_str(&String::from_utf8_lossy(&fresh));
    result
}

/// Loads the `tag` section from an already-open file descriptor-like handle,
/// reading from the current position to EOF.
pub fn load_section<T: Read>(file: &mut T, tag: &str) -> EditorResult<Option<Vec<String>>> {
    let mut contents = String::new();
    file.read_to_string(&mut contents)?;
    Ok(read_section(&contents, tag))
}

/// Excises any existing `tag` section from an already-open, seekable file and
/// appends a fresh one, truncating away any residual bytes from a shorter
/// replacement.
pub fn save_section(file: &mut File, tag: &str, lines: &[String]) -> EditorResult<()> {
    file.seek(SeekFrom::Start(0))?;
    let mut contents = String::new();
    file.read_to_string(&mut contents)?;
    let replaced = replace_section(&contents, tag, lines);
    file.seek(SeekFrom::Start(0))?;
    file.write_all(replaced.as_bytes())?;
    file.set_len(replaced.len() as u64)?;
    Ok(())
}

/// Loads the `tag` section from a named file. Returns `None` (not an error) if the
/// file does not exist.
pub fn load_from_path(path: &Path, tag: &str) -> EditorResult<Option<Vec<String>>> {
    match File::open(path) {
        Ok(mut file) => load_section(&mut file, tag),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(EditorError::Io(e)),
    }
}

/// Saves the `tag` section to a named file, creating it if necessary and preserving
/// any other tagged sections already present.
pub fn save_to_path(path: &Path, tag: &str, lines: &[String]) -> EditorResult<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let mut file = OpenOptions::new().read(true).write(true).create(true).open(path)?;
    save_section(&mut file, tag, lines)
}

/// `$XDG_CACHE_HOME/<name>` if set and non-empty, else `$HOME/.cache/<name>`. `None`
/// if neither environment variable is usable.
pub fn default_cache_path(name: &str) -> Option<PathBuf> {
    if let Ok(xdg) = std::env::var("XDG_CACHE_HOME") {
        if !xdg.is_empty() {
            return Some(PathBuf::from(xdg).join(name));
        }
    }
    if let Ok(home) = std::env::var("HOME") {
        if !home.is_empty() {
            return Some(PathBuf::from(home).join(".cache").join(name));
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_then_read_round_trips() {
        let mut buf = Vec::new();
        let lines = vec!["make clean".to_string(), "make test".to_string()];
        write_section(&mut buf, HISTORY_TAG, &lines).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert_eq!(read_section(&text, HISTORY_TAG), Some(lines));
    }

    #[test]
    fn missing_tag_reads_as_none() {
        let mut buf = Vec::new();
        write_section(&mut buf, HISTORY_TAG, &["a".to_string()]).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert_eq!(read_section(&text, ALIAS_TAG), None);
    }

    #[test]
    fn multiple_tags_coexist_in_one_file() {
        let mut buf = Vec::new();
        write_section(&mut buf, HISTORY_TAG, &["h1".to_string()]).unwrap();
        write_section(&mut buf, ALIAS_TAG, &["ll=ls -l".to_string()]).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert_eq!(read_section(&text, HISTORY_TAG), Some(vec!["h1".to_string()]));
        assert_eq!(read_section(&text, ALIAS_TAG), Some(vec!["ll=ls -l".to_string()]));
    }

    #[test]
    fn replace_keeps_other_sections_byte_for_byte() {
        let mut buf = Vec::new();
        write_section(&mut buf, HISTORY_TAG, &["h1".to_string()]).unwrap();
        write_section(&mut buf, ALIAS_TAG, &["ll=ls -l".to_string()]).unwrap();
        let original = String::from_utf8(buf).unwrap();

        let replaced = replace_section(&original, HISTORY_TAG, &["h2".to_string(), "h3".to_string()]);
        assert_eq!(read_section(&replaced, HISTORY_TAG), Some(vec!["h2".to_string(), "h3".to_string()]));
        assert_eq!(read_section(&replaced, ALIAS_TAG), Some(vec!["ll=ls -l".to_string()]));
    }

    #[test]
    fn save_then_load_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ccli");
        let lines = vec!["make clean".to_string(), "make test".to_string()];
        save_to_path(&path, HISTORY_TAG, &lines).unwrap();
        assert_eq!(load_from_path(&path, HISTORY_TAG).unwrap(), Some(lines));
    }

    #[test]
    fn save_replace_save_truncates_shorter_replacement() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ccli");
        save_to_path(&path, HISTORY_TAG, &["a very long original entry".to_string()]).unwrap();
        save_to_path(&path, HISTORY_TAG, &["x".to_string()]).unwrap();
        assert_eq!(load_from_path(&path, HISTORY_TAG).unwrap(), Some(vec!["x".to_string()]));
    }

    #[test]
    fn save_preserves_other_tag_when_replacing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ccli");
        save_to_path(&path, ALIAS_TAG, &["ll=ls -l".to_string()]).unwrap();
        save_to_path(&path, HISTORY_TAG, &["h1".to_string()]).unwrap();
        save_to_path(&path, HISTORY_TAG, &["h2".to_string()]).unwrap();
        assert_eq!(load_from_path(&path, ALIAS_TAG).unwrap(), Some(vec!["ll=ls -l".to_string()]));
        assert_eq!(load_from_path(&path, HISTORY_TAG).unwrap(), Some(vec!["h2".to_string()]));
    }

    #[test]
    fn loading_a_missing_file_is_none_not_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("does-not-exist");
        assert_eq!(load_from_path(&path, HISTORY_TAG).unwrap(), None);
    }
}
