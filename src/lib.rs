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

//! `shelline` is an embeddable interactive command-line editor for building
//! shell-like interfaces inside a host application: a prompt, in-place line
//! editing with history recall and incremental reverse search, Tab completion
//! from multiple sources, and dispatch of submitted lines to host-registered
//! commands (flat or organised into a hierarchical command table), with
//! alias expansion and optional command chaining.
//!
//! [`Editor`] owns a byte-oriented input endpoint and output endpoint for its
//! entire lifetime — typically a terminal placed into raw mode, though any
//! `Read`/`Write` pair works, which is what makes the editor's own test suite
//! possible without a real TTY. Input is treated as 8-bit bytes throughout:
//! there is no grapheme-cluster or wide-character accounting, matching a
//! terminal model where every byte occupies one column.
//!
//! ```no_run
//! use shelline::Editor;
//!
//! let mut editor = Editor::new("myapp> ", std::io::stdin(), std::io::stdout());
//! editor.register_command("hello", Box::new(|_, _, _| {
//!     println!("hello back");
//!     0
//! }), None);
//! editor.run().unwrap();
//! ```

pub mod buffer;
pub mod cache;
pub mod completion;
pub mod dispatch;
pub mod display;
pub mod error;
pub mod history;
pub mod keys;
pub mod logging;
pub mod registry;
#[cfg(test)]
pub(crate) mod test_support;
pub mod tokenizer;

use std::io::{Read, Write};
use std::path::{Path, PathBuf};

pub use buffer::LineBuffer;
pub use completion::Candidates;
pub use display::{Display, PageOutcome, Pager, Prompt};
pub use error::{EditorError, EditorResult};
pub use history::History;
pub use keys::{Intent, KeyDecoder};
pub use registry::{
    CommandFn, CommandNode, CompletionFn, CompletionNode, EnterHook, InterruptHook, Registry,
    UnknownHook,
};
pub use tokenizer::Tokenized;

/// A scrolled-history step for PageUp/PageDown, in lines.
const PAGE_STEP: usize = 10;

/// RAII guard around the terminal's raw-mode state. Construction puts the
/// terminal into non-canonical, no-echo, no-signal mode; dropping restores
/// whatever mode was active before. Equivalent to the paired
/// `console_acquire`/`console_release` calls a C implementation would expose,
/// except that restoration can never be forgotten.
///
/// Enabling raw mode touches the process's controlling terminal directly
/// (through `crossterm`, independent of whichever `Read`/`Write` pair an
/// [`Editor`] was built with), so it is simply not available when stdin/stdout
/// are not a TTY — a pipe, a test harness, a `Cursor<Vec<u8>>`. That failure is
/// tolerated rather than propagated: an `Editor` driven over plain byte
/// streams is a first-class, testable configuration, not a degraded one.
pub struct RawModeGuard {
    active: bool,
}

impl RawModeGuard {
    pub fn try_new() -> Self {
        match crossterm::terminal::enable_raw_mode() {
            Ok(()) => Self { active: true },
            Err(_) => Self { active: false },
        }
    }

    pub fn is_active(&self) -> bool { self.active }

    /// Temporarily restores the terminal's original attributes, e.g. before
    /// forking a child process that expects cooked mode.
    pub fn release(&mut self) {
        if self.active {
            let _ = crossterm::terminal::disable_raw_mode();
            self.active = false;
        }
    }

    /// Reclaims raw mode after a [`Self::release`].
    pub fn reacquire(&mut self) {
        if !self.active && crossterm::terminal::enable_raw_mode().is_ok() {
            self.active = true;
        }
    }
}

impl Drop for RawModeGuard {
    fn drop(&mut self) { self.release(); }
}

/// The interactive editor instance: owns the line buffer, history, registry,
/// and a pair of byte-oriented endpoints, and drives the read-edit-dispatch
/// event loop over them.
pub struct Editor<R: Read, W: Write> {
    buffer: LineBuffer,
    history: History,
    registry: Registry,
    display: Display<W>,
    decoder: KeyDecoder<R>,
    primary_prompt: String,
    continuation_prompt: String,
    tab_count: usize,
    last_was_tab: bool,
    /// Columns painted by the last repaint, so the next one knows how much
    /// trailing space to blank when the new frame is shorter.
    last_rendered_len: usize,
    raw_mode: RawModeGuard,
    pager: Pager,
}

impl<R: Read, W: Write> Editor<R, W> {
    /// Builds a new editor over `input`/`output`, attempts to place the
    /// terminal into raw mode (tolerating failure on a non-TTY endpoint), and
    /// registers the default `exit` command.
    pub fn new(prompt: impl Into<String>, input: R, output: W) -> Self {
        let mut registry = Registry::new();
        registry.register("exit", Box::new(|_, _, _| 1), None);
        let rows = crossterm::terminal::size().ok().map(|(_, rows)| rows as usize).unwrap_or(24);
        Self {
            buffer: LineBuffer::new(),
            history: History::default(),
            registry,
            display: Display::new(output),
            decoder: KeyDecoder::new(input),
            primary_prompt: prompt.into(),
            continuation_prompt: "> ".to_string(),
            tab_count: 0,
            last_was_tab: false,
            last_rendered_len: 0,
            raw_mode: RawModeGuard::try_new(),
            pager: Pager::new(rows),
        }
    }

    // ---- endpoint accessors -------------------------------------------------

    pub fn input_mut(&mut self) -> &mut R { self.decoder.reader_mut() }

    pub fn output_mut(&mut self) -> &mut W { self.display.writer_mut() }

    pub fn release_terminal(&mut self) { self.raw_mode.release(); }

    pub fn acquire_terminal(&mut self) { self.raw_mode.reacquire(); }

    pub fn is_raw_mode_active(&self) -> bool { self.raw_mode.is_active() }

    // ---- registration --------------------------------------------------------

    pub fn register_command(&mut self, name: impl Into<String>, run: CommandFn, complete: Option<CompletionFn>) {
        self.registry.register(name, run, complete);
    }

    pub fn unregister_command(&mut self, name: &str) { self.registry.unregister(name); }

    /// Validates `table` (rejecting duplicate sibling names) and installs it
    /// as the hierarchical command table consulted after the flat registry.
    pub fn register_command_table(&mut self, table: CommandNode) -> EditorResult<()> {
        self.registry.register_command_table(table)
    }

    /// Validates `table` and installs it as the hierarchical completion table.
    pub fn set_completion_table(&mut self, table: CompletionNode) -> EditorResult<()> {
        table.validate()?;
        self.registry.completion_table = Some(table);
        Ok(())
    }

    pub fn set_default_completion(&mut self, complete: CompletionFn) {
        self.registry.default_complete = Some(complete);
    }

    pub fn set_chain_delimiter(&mut self, delimiter: impl Into<String>) {
        self.registry.chain_delimiter = Some(delimiter.into());
    }

    pub fn clear_chain_delimiter(&mut self) { self.registry.chain_delimiter = None; }

    pub fn set_enter_hook(&mut self, hook: EnterHook) { self.registry.set_enter_hook(hook); }

    pub fn set_unknown_hook(&mut self, hook: UnknownHook) { self.registry.set_unknown_hook(hook); }

    pub fn set_interrupt_hook(&mut self, hook: InterruptHook) { self.registry.set_interrupt_hook(hook); }

    pub fn set_alias(&mut self, name: impl Into<String>, expansion: impl Into<String>) {
        self.registry.set_alias(name, expansion);
    }

    pub fn set_continuation_prompt(&mut self, prompt: impl Into<String>) {
        self.continuation_prompt = prompt.into();
    }

    // ---- execution -------------------------------------------------------------

    /// Runs the read-edit-dispatch loop until a callback returns non-zero, the
    /// interrupt hook ends the loop, or the input endpoint reaches end of
    /// input. Returns the terminating return code (0 on end of input).
    pub fn run(&mut self) -> EditorResult<i32> {
        self.last_rendered_len = 0;
        self.paint_prompt()?;
        loop {
            let intent = self.decoder.next_intent()?;
            if intent == Intent::EndOfInput {
                return Ok(0);
            }
            if !self.last_was_tab {
                self.tab_count = 0;
            }
            self.last_was_tab = matches!(intent, Intent::Tab);

            let effective = if matches!(intent, Intent::Enter) && self.buffer.is_last_byte_escape() {
                Intent::Continuation
            } else {
                intent
            };

            if let Some(rc) = self.handle_intent(effective)? {
                return Ok(rc);
            }
        }
    }

    /// Tokenises and dispatches `line` outside the interactive loop, under the
    /// same alias/flat-command/command-table/unknown-hook rules `run` uses.
    /// `record` selects whether `line` is appended to history.
    pub fn execute(&mut self, line: &str, record: bool) -> EditorResult<i32> {
        dispatch::execute(&mut self.registry, &mut self.history, line, record, self.display.writer_mut())
    }

    fn handle_intent(&mut self, intent: Intent) -> EditorResult<Option<i32>> {
        match intent {
            Intent::Enter => {
                let line = String::from_utf8_lossy(self.buffer.as_bytes()).into_owned();
                let rc = dispatch::execute(
                    &mut self.registry,
                    &mut self.history,
                    &line,
                    true,
                    self.display.writer_mut(),
                )?;
                if rc != 0 {
                    return Ok(Some(rc));
                }
                self.buffer.reset();
                self.last_rendered_len = 0;
                self.display.echo_str("\n")?;
                self.paint_prompt()?;
                Ok(None)
            }
            Intent::Continuation => {
                self.buffer.begin_continuation();
                self.display.echo_str("\n")?;
                let cont = self.continuation_prompt.clone();
                self.display.echo_str(&cont)?;
                self.last_rendered_len = 0;
                Ok(None)
            }
            Intent::Tab => {
                self.complete()?;
                self.tab_count += 1;
                Ok(None)
            }
            Intent::Interrupt => {
                let line = String::from_utf8_lossy(self.buffer.as_bytes()).into_owned();
                let pos = self.buffer.pos();
                let rc = self.registry.call_interrupt(&line, pos, self.display.writer_mut());
                if rc != 0 { Ok(Some(rc)) } else { Ok(None) }
            }
            Intent::ReverseSearch => {
                if let Some(replay) = self.reverse_search()? {
                    return self.handle_intent(replay);
                }
                Ok(None)
            }
            Intent::Backspace => { self.buffer.backspace(); self.repaint()?; Ok(None) }
            Intent::Delete => { self.buffer.delete(); self.repaint()?; Ok(None) }
            Intent::DeleteWord => { self.buffer.delete_word(); self.repaint()?; Ok(None) }
            Intent::DeleteToStart => { self.buffer.delete_to_start(); self.repaint()?; Ok(None) }
            Intent::Home => { self.buffer.home(); self.repaint()?; Ok(None) }
            Intent::End => { self.buffer.end(); self.repaint()?; Ok(None) }
            Intent::Left => { self.buffer.left(); self.repaint()?; Ok(None) }
            Intent::Right => { self.buffer.right(); self.repaint()?; Ok(None) }
            Intent::LeftWord => { self.buffer.left_word(); self.repaint()?; Ok(None) }
            Intent::RightWord => { self.buffer.right_word(); self.repaint()?; Ok(None) }
            Intent::Up => { self.history.up(1, &mut self.buffer); self.repaint()?; Ok(None) }
            Intent::Down => { self.history.down(1, &mut self.buffer); self.repaint()?; Ok(None) }
            Intent::PageUp => { self.history.up(PAGE_STEP, &mut self.buffer); self.repaint()?; Ok(None) }
            Intent::PageDown => { self.history.down(PAGE_STEP, &mut self.buffer); self.repaint()?; Ok(None) }
            Intent::Printable(b) => { self.buffer.insert(b); self.repaint()?; Ok(None) }
            Intent::Insert | Intent::Ignored | Intent::EndOfInput => Ok(None),
        }
    }

    fn paint_prompt(&mut self) -> EditorResult<()> {
        let text = if self.buffer.start() > 0 { self.continuation_prompt.clone() } else { self.primary_prompt.clone() };
        self.display.echo_prompt(&text)
    }

    /// Repaints the prompt and editable line, blanking whatever trailing
    /// columns the previous, possibly longer, frame left behind.
    fn repaint(&mut self) -> EditorResult<()> {
        let pad = self.last_rendered_len.saturating_sub(self.buffer.editable().len());
        let prompt = Prompt { primary: &self.primary_prompt, continuation: &self.continuation_prompt };
        self.display.refresh(&self.buffer, &prompt, pad)?;
        self.last_rendered_len = self.buffer.editable().len();
        Ok(())
    }

    /// Forces an immediate repaint; exposed so host callbacks that mutate the
    /// buffer directly (via [`Self::clear_buffer`]/[`Self::insert_str_at`]) can
    /// ask for a redraw.
    pub fn repaint_now(&mut self) -> EditorResult<()> { self.repaint() }

    // ---- Tab completion --------------------------------------------------------

    /// Bytes `[start, pos)` of the buffer, tokenised, to determine which
    /// argument the cursor is completing and what has been typed of it so far.
    fn completion_context(&self) -> (Vec<String>, usize, String) {
        let consumed_len = self.buffer.pos() - self.buffer.start();
        let consumed = &self.buffer.editable()[..consumed_len];
        let text = String::from_utf8_lossy(consumed).into_owned();
        let Tokenized { args, .. } =
            tokenizer::tokenize(&text, None).unwrap_or(Tokenized { args: Vec::new(), next: None });
        let ends_with_word = text.as_bytes().last().map(|b| !b.is_ascii_whitespace()).unwrap_or(false);
        if ends_with_word && !args.is_empty() {
            let word = args.len() - 1;
            let match_str = args[word].clone();
            (args, word, match_str)
        } else {
            let word = args.len();
            (args, word, String::new())
        }
    }

    fn complete(&mut self) -> EditorResult<()> {
        let (argv, word, match_str) = self.completion_context();
        let candidates = completion::gather(&mut self.registry, &argv, word, &match_str);
        if candidates.words.is_empty() {
            return Ok(());
        }

        if candidates.words.len() == 1 {
            let suffix = candidates.words[0][match_str.len()..].to_string();
            let pos = self.buffer.pos();
            self.buffer.insert_at(pos, suffix.as_bytes());
            match candidates.terminator {
                completion::Terminator::Space => {
                    let pos = self.buffer.pos();
                    self.buffer.insert_at(pos, b" ");
                }
                completion::Terminator::Byte(b) => {
                    let pos = self.buffer.pos();
                    self.buffer.insert_at(pos, &[b]);
                }
                completion::Terminator::NoSpace => {}
            }
            return self.repaint();
        }

        if let Some(lcp) = completion::longest_common_prefix(&candidates.words) {
            if lcp.len() > match_str.len() {
                let suffix = lcp[match_str.len()..].to_string();
                let pos = self.buffer.pos();
                self.buffer.insert_at(pos, suffix.as_bytes());
            }
        }
        self.repaint()?;

        if self.tab_count >= 1 {
            let width = crossterm::terminal::size().ok().map(|(cols, _)| cols as usize);
            self.display.echo_str("\n")?;
            completion::render_columns(self.display.writer_mut(), &candidates.words, width, 0)?;
            self.last_rendered_len = 0;
            self.repaint()?;
        }
        Ok(())
    }

    // ---- reverse search ----------------------------------------------------------

    /// Runs the `Ctrl-R` incremental search sub-loop, returning the key that
    /// ended it (to be replayed through [`Self::handle_intent`]) once the
    /// user commits a match, or `None` if they aborted with `Ctrl-C`.
    fn reverse_search(&mut self) -> EditorResult<Option<Intent>> {
        let floor_index = self.history.current_index();
        let mut needle = String::new();
        // (logical history index, matched text, byte offset of the match within it)
        let mut found: Option<(usize, String, usize)> = None;
        let mut failed = false;

        loop {
            self.paint_reverse_search(&needle, found.as_ref().map(|(_, t, _)| t.as_str()), failed)?;
            let intent = self.decoder.next_intent()?;
            match intent {
                Intent::Interrupt => {
                    self.last_rendered_len = 0;
                    self.repaint()?;
                    return Ok(None);
                }
                Intent::Backspace => {
                    needle.pop();
                }
                Intent::ReverseSearch => {
                    let before = found.as_ref().map(|(logical, _, _)| *logical).unwrap_or(floor_index);
                    let skip = found.as_ref().map(|(_, t, _)| t.as_str());
                    match self.history.search_back(&needle, before, skip) {
                        Some(next) => { found = Some(next); failed = false; }
                        None => failed = true,
                    }
                    continue;
                }
                Intent::Printable(b) => {
                    needle.push(b as char);
                }
                other => {
                    if let Some((_, text, offset)) = &found {
                        self.buffer.reset();
                        self.buffer.replace(text.as_bytes());
                        self.buffer.set_pos(offset + needle.len());
                    }
                    self.last_rendered_len = 0;
                    return Ok(Some(other));
                }
            }
            match self.history.search_back(&needle, floor_index, None) {
                Some(hit) => { found = Some(hit); failed = false; }
                None => {
                    failed = !needle.is_empty();
                    found = None;
                }
            }
        }
    }

    fn paint_reverse_search(&mut self, needle: &str, matched: Option<&str>, failed: bool) -> EditorResult<()> {
        let label = if failed { "failed " } else { "" };
        let shown = matched.unwrap_or("");
        let line = format!("{label}(reverse-i-search)`{needle}': {shown}");
        self.display.echo_str("\r")?;
        self.display.echo_str(&line)?;
        let pad = self.last_rendered_len.saturating_sub(line.len());
        self.display.echo_str(&" ".repeat(pad))?;
        self.display.echo_str(&"\u{8}".repeat(pad))?;
        self.last_rendered_len = line.len();
        Ok(())
    }

    // ---- line manipulation from callbacks ------------------------------------------

    pub fn clear_buffer(&mut self) { self.buffer.reset(); }

    /// Inserts `s` at byte offset `at`, or at the cursor when `at` is `None`;
    /// an offset past the end of the buffer is clamped to append.
    pub fn insert_str_at(&mut self, s: &str, at: Option<usize>) {
        let target = at.unwrap_or_else(|| self.buffer.pos());
        self.buffer.insert_at(target, s.as_bytes());
    }

    pub fn buffer(&self) -> &LineBuffer { &self.buffer }

    // ---- output ------------------------------------------------------------------

    pub fn print(&mut self, s: &str) -> EditorResult<()> { self.display.echo_str(s) }

    pub fn println(&mut self, s: &str) -> EditorResult<()> {
        self.display.echo_str(s)?;
        self.display.echo_str("\n")
    }

    pub fn set_pager_rows(&mut self, rows: usize) { self.pager = Pager::new(rows); }

    /// Writes `line` plus a trailing newline, paginating via
    /// `--Type <RET> for more, q to quit, c to continue without paging--` every
    /// configured number of rows. Returns `Some(outcome)` when the user was
    /// prompted and answered; `None` when no prompt was needed for this line.
    pub fn print_paged_line(&mut self, line: &str) -> EditorResult<Option<PageOutcome>> {
        self.display.echo_str(line)?;
        self.display.echo_str("\n")?;
        self.pager.line_emitted(&mut self.display, &mut self.decoder)
    }

    /// Reads a single decoded keystroke without going through the event loop
    /// (used by hosts implementing their own prompts, e.g. a y/n confirmation).
    pub fn read_intent(&mut self) -> EditorResult<Intent> { self.decoder.next_intent() }

    // ---- history access --------------------------------------------------------

    pub fn history_at(&self, past: usize) -> Option<&str> { self.history.at(past) }

    pub fn history_size(&self) -> usize { self.history.size() }

    pub fn load_history_from_file<T: Read>(&mut self, file: &mut T) -> EditorResult<()> {
        if let Some(lines) = cache::load_section(file, cache::HISTORY_TAG)? {
            for line in lines {
                self.history.add(line);
            }
        }
        Ok(())
    }

    pub fn save_history_to_file(&self, file: &mut std::fs::File) -> EditorResult<()> {
        cache::save_section(file, cache::HISTORY_TAG, &self.history.entries())
    }

    pub fn load_history_from_path(&mut self, path: &Path) -> EditorResult<()> {
        if let Some(lines) = cache::load_from_path(path, cache::HISTORY_TAG)? {
            for line in lines {
                self.history.add(line);
            }
        }
        Ok(())
    }

    pub fn save_history_to_path(&self, path: &Path) -> EditorResult<()> {
        cache::save_to_path(path, cache::HISTORY_TAG, &self.history.entries())
    }

    pub fn load_history_default(&mut self) -> EditorResult<()> {
        match cache::default_cache_path(cache::HISTORY_TAG) {
            Some(path) => self.load_history_from_path(&path),
            None => Ok(()),
        }
    }

    pub fn save_history_default(&self) -> EditorResult<()> {
        match cache::default_cache_path(cache::HISTORY_TAG) {
            Some(path) => self.save_history_to_path(&path),
            None => Ok(()),
        }
    }

    // ---- alias load/save ---------------------------------------------------------

    pub fn load_aliases_from_file<T: Read>(&mut self, file: &mut T) -> EditorResult<()> {
        if let Some(lines) = cache::load_section(file, cache::ALIAS_TAG)? {
            self.apply_alias_lines(lines);
        }
        Ok(())
    }

    pub fn save_aliases_to_file(&self, file: &mut std::fs::File) -> EditorResult<()> {
        cache::save_section(file, cache::ALIAS_TAG, &self.alias_lines())
    }

    pub fn load_aliases_from_path(&mut self, path: &Path) -> EditorResult<()> {
        if let Some(lines) = cache::load_from_path(path, cache::ALIAS_TAG)? {
            self.apply_alias_lines(lines);
        }
        Ok(())
    }

    pub fn save_aliases_to_path(&self, path: &Path) -> EditorResult<()> {
        cache::save_to_path(path, cache::ALIAS_TAG, &self.alias_lines())
    }

    pub fn load_aliases_default(&mut self) -> EditorResult<()> {
        match cache::default_cache_path(cache::ALIAS_TAG) {
            Some(path) => self.load_aliases_from_path(&path),
            None => Ok(()),
        }
    }

    pub fn save_aliases_default(&self) -> EditorResult<()> {
        match cache::default_cache_path(cache::ALIAS_TAG) {
            Some(path) => self.save_aliases_to_path(&path),
            None => Ok(()),
        }
    }

    fn alias_lines(&self) -> Vec<String> {
        self.registry.aliases().map(|(name, expansion)| format!("{name}={expansion}")).collect()
    }

    fn apply_alias_lines(&mut self, lines: Vec<String>) {
        for line in lines {
            if let Some((name, expansion)) = line.split_once('=') {
                self.registry.set_alias(name, expansion);
            }
        }
    }
}

/// Tokenises `line` standalone, outside any editor instance.
pub fn tokenize_line(line: &str) -> EditorResult<Vec<String>> { Ok(tokenizer::tokenize(line, None)?.args) }

/// Splits a `PATH`-style environment variable into its directory entries, for
/// passing to [`completion::file_completion`].
pub fn split_path_var(path_var: &str) -> Vec<PathBuf> {
    path_var.split(':').filter(|s| !s.is_empty()).map(PathBuf::from).collect()
}
