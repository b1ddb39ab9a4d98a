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

//! Bounded ring of past submissions with a scratch slot for the in-progress line.

use crate::buffer::LineBuffer;

pub const DEFAULT_HISTORY_MAX: usize = 256;

/// A bounded ring of up to `history_max` entries plus the bookkeeping needed for
/// up/down navigation and `Ctrl-R` reverse search.
#[derive(Debug)]
pub struct History {
    ring: Vec<String>,
    history_max: usize,
    /// Total lines ever added (monotonic).
    size: usize,
    /// Logical index within `[0, size]` the user is currently viewing. `size` means
    /// "the line being composed", not a recalled entry.
    current: usize,
    /// Holds the in-progress line while the user has navigated away from `size`.
    scratch: Option<String>,
}

impl Default for History {
    fn default() -> Self { Self::new(DEFAULT_HISTORY_MAX) }
}

impl History {
    pub fn new(history_max: usize) -> Self {
        Self { ring: Vec::new(), history_max, size: 0, current: 0, scratch: None }
    }

    pub fn size(&self) -> usize { self.size }

    fn slot(&self, logical: usize) -> usize { logical % self.history_max }

    fn lowest_accessible(&self) -> usize { self.size.saturating_sub(self.history_max) }

    /// Appends a new entry, resetting navigation to the fresh line.
    pub fn add(&mut self, line: impl Into<String>) {
        let slot = self.slot(self.size);
        if slot < self.ring.len() {
            self.ring[slot] = line.into();
        } else {
            self.ring.push(line.into());
        }
        self.size += 1;
        self.current = self.size;
        self.scratch = None;
    }

    /// Fetches the entry `past` steps back from the most recent submission. `past =
    /// 1` is the most recent line; returns `None` once `past` exceeds `size` or
    /// `history_max`.
    pub fn at(&self, past: usize) -> Option<&str> {
        if past == 0 || past > self.size || past > self.history_max {
            return None;
        }
        let logical = self.size - past;
        self.ring.get(self.slot(logical)).map(String::as_str)
    }

    /// Saves `current_line` into the appropriate slot (ring entry being edited, or
    /// scratch for the fresh line) before navigating away from it.
    fn stash(&mut self, current_line: &LineBuffer) {
        if self.current == self.size {
            self.scratch = Some(String::from_utf8_lossy(current_line.as_bytes()).into_owned());
        } else {
            let slot = self.slot(self.current);
            if slot < self.ring.len() {
                self.ring[slot] = String::from_utf8_lossy(current_line.as_bytes()).into_owned();
            }
        }
    }

    fn recall(&self, logical: usize) -> String {
        if logical == self.size {
            self.scratch.clone().unwrap_or_default()
        } else {
            self.ring.get(self.slot(logical)).cloned().unwrap_or_default()
        }
    }

    /// Moves `current` back by `n`, clamped to the accessible window. Returns `true`
    /// if the view actually changed (the buffer should be repainted).
    pub fn up(&mut self, n: usize, current_line: &mut LineBuffer) -> bool {
        let floor = self.lowest_accessible();
        let target = self.current.saturating_sub(n).max(floor);
        if target == self.current {
            return false;
        }
        self.stash(current_line);
        self.current = target;
        current_line.reset();
        current_line.replace(self.recall(self.current).as_bytes());
        true
    }

    /// Moves `current` forward by `n`, clamped at `size`. Returns `true` if the view
    /// changed.
    pub fn down(&mut self, n: usize, current_line: &mut LineBuffer) -> bool {
        let target = (self.current + n).min(self.size);
        if target == self.current {
            return false;
        }
        self.stash(current_line);
        self.current = target;
        current_line.reset();
        current_line.replace(self.recall(self.current).as_bytes());
        true
    }

    /// Searches backward from `current - 1` for a slot containing `needle`, skipping
    /// consecutive duplicates of `skip`. Returns the matched logical index, its text,
    /// and the byte offset of the match within that text (so the caller can place the
    /// cursor at the end of the match rather than the end of the line).
    pub fn search_back(
        &self,
        needle: &str,
        start_before: usize,
        skip: Option<&str>,
    ) -> Option<(usize, String, usize)> {
        if needle.is_empty() {
            return None;
        }
        let floor = self.lowest_accessible();
        let mut logical = start_before;
        while logical > floor {
            logical -= 1;
            let text = self.recall(logical);
            if Some(text.as_str()) == skip {
                continue;
            }
            if let Some(offset) = text.find(needle) {
                return Some((logical, text, offset));
            }
        }
        None
    }

    pub fn current_index(&self) -> usize { self.current }

    /// Every accessible entry, oldest first — the order persisted to a cache file.
    pub fn entries(&self) -> Vec<String> {
        let floor = self.lowest_accessible();
        (floor..self.size).map(|logical| self.ring[self.slot(logical)].clone()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_and_at() {
        let mut h = History::new(4);
        h.add("a");
        h.add("b");
        h.add("c");
        assert_eq!(h.at(1), Some("c"));
        assert_eq!(h.at(3), Some("a"));
        assert_eq!(h.at(4), None);
    }

    #[test]
    fn ring_overwrite_boundaries() {
        let mut h = History::new(2);
        h.add("a");
        h.add("b");
        h.add("c"); // evicts "a"
        assert_eq!(h.at(1), Some("c"));
        assert_eq!(h.at(2), Some("b"));
        assert_eq!(h.at(3), None);
    }

    #[test]
    fn up_down_roundtrip_preserves_scratch() {
        let mut h = History::new(8);
        h.add("make clean");
        h.add("make test");

        let mut buf = LineBuffer::new();
        buf.replace(b"in progress");

        assert!(h.up(1, &mut buf));
        assert_eq!(buf.as_bytes(), b"make test");

        assert!(h.up(1, &mut buf));
        assert_eq!(buf.as_bytes(), b"make clean");

        assert!(h.down(1, &mut buf));
        assert_eq!(buf.as_bytes(), b"make test");

        assert!(h.down(1, &mut buf));
        assert_eq!(buf.as_bytes(), b"in progress");
    }

    #[test]
    fn entries_lists_oldest_first_within_the_accessible_window() {
        let mut h = History::new(2);
        h.add("a");
        h.add("b");
        h.add("c"); // evicts "a"
        assert_eq!(h.entries(), vec!["b".to_string(), "c".to_string()]);
    }

    #[test]
    fn reverse_search_finds_match_and_skips_duplicate() {
        let mut h = History::new(8);
        h.add("make clean");
        h.add("make test");
        let found = h.search_back("cle", h.current_index(), None);
        assert_eq!(found, Some((0, "make clean".to_string(), 5)));
        let none = h.search_back("cle", 0, None);
        assert_eq!(none, None);
    }
}
