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

//! Writes bytes to the output endpoint: prompt painting, line repaint, and pagination
//! of long output.

use std::io::Write;

use crate::buffer::LineBuffer;
use crate::error::{EditorError, EditorResult};
use crate::keys::{Intent, KeyDecoder};

/// Everything the display surface needs to know about the line being edited.
pub struct Prompt<'a> {
    pub primary: &'a str,
    pub continuation: &'a str,
}

impl<'a> Default for Prompt<'a> {
    fn default() -> Self { Self { primary: "> ", continuation: "> " } }
}

pub struct Display<W: Write> {
    out: W,
}

impl<W: Write> Display<W> {
    pub fn new(out: W) -> Self { Self { out } }

    /// Escape hatch for callers that need to hand the raw output endpoint to a
    /// helper outside this module (e.g. multi-column candidate rendering).
    pub fn writer_mut(&mut self) -> &mut W { &mut self.out }

    pub fn echo(&mut self, byte: u8) -> EditorResult<()> {
        self.out.write_all(&[byte]).map_err(EditorError::Io)
    }

    pub fn echo_str(&mut self, s: &str) -> EditorResult<()> {
        self.out.write_all(s.as_bytes()).map_err(EditorError::Io)?;
        self.out.flush().map_err(EditorError::Io)
    }

    pub fn echo_bytes(&mut self, s: &[u8]) -> EditorResult<()> {
        self.out.write_all(s).map_err(EditorError::Io)?;
        self.out.flush().map_err(EditorError::Io)
    }

    pub fn echo_prompt(&mut self, prompt: &str) -> EditorResult<()> { self.echo_str(prompt) }

    /// Carriage-return, then blank out `prompt_len + len` columns.
    pub fn clear_line(&mut self, prompt_len: usize, len: usize) -> EditorResult<()> {
        self.echo_str("\r")?;
        self.echo_str(&" ".repeat(prompt_len + len))?;
        self.echo_str("\r")
    }

    /// Repaints the prompt and the editable portion of `line`, erasing `pad` extra
    /// trailing columns left over from a longer previous frame, then positions the
    /// cursor.
    pub fn refresh(&mut self, line: &LineBuffer, prompt: &Prompt, pad: usize) -> EditorResult<()> {
        self.echo_str("\r")?;
        let active_prompt = if line.start() > 0 { prompt.continuation } else { prompt.primary };
        self.echo_str(active_prompt)?;
        self.echo_bytes(line.editable())?;
        self.echo_str(&" ".repeat(pad + 2))?;
        self.echo_str(&"\u{8}".repeat(pad + 2))?;
        let back = line.editable().len() - (line.pos() - line.start());
        self.echo_str(&"\u{8}".repeat(back))
    }

    /// Prompts `--Type <RET> for more, q to quit, c to continue without paging--`,
    /// reads one byte via `decoder`, and returns it.
    pub fn page_stop<R: std::io::Read>(&mut self, decoder: &mut KeyDecoder<R>) -> EditorResult<Intent> {
        self.echo_str("--Type <RET> for more, q to quit, c to continue without paging--")?;
        let intent = decoder.next_intent()?;
        self.echo_str("\n")?;
        Ok(intent)
    }
}

/// Tracks output line count against the terminal's row count and invokes
/// [`Display::page_stop`] every `rows` lines.
pub struct Pager {
    rows: usize,
    lines_since_stop: usize,
}

pub enum PageOutcome {
    Continue,
    ContinueWithoutPaging,
    Abort,
}

impl Pager {
    pub fn new(rows: usize) -> Self { Self { rows: rows.max(1), lines_since_stop: 0 } }

    /// Call once per emitted line. Returns `Some(outcome)` when the user was prompted
    /// and answered; `None` when no prompt was needed yet.
    pub fn line_emitted<W: Write, R: std::io::Read>(
        &mut self,
        display: &mut Display<W>,
        decoder: &mut KeyDecoder<R>,
    ) -> EditorResult<Option<PageOutcome>> {
        self.lines_since_stop += 1;
        if self.lines_since_stop < self.rows {
            return Ok(None);
        }
        self.lines_since_stop = 0;
        match display.page_stop(decoder)? {
            Intent::Printable(b'q') | Intent::Interrupt => Ok(Some(PageOutcome::Abort)),
            Intent::Printable(b'c') => Ok(Some(PageOutcome::ContinueWithoutPaging)),
            _ => Ok(Some(PageOutcome::Continue)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::MockWriter;
    use std::io::Cursor;

    #[test]
    fn clear_line_blanks_prompt_and_content() {
        let mut d = Display::new(MockWriter::default());
        d.clear_line(2, 3).unwrap();
        assert_eq!(d.out.as_str(), "\r     \r");
    }

    #[test]
    fn refresh_paints_prompt_and_content() {
        let mut line = LineBuffer::new();
        line.replace(b"hi");
        let prompt = Prompt::default();
        let mut d = Display::new(MockWriter::default());
        d.refresh(&line, &prompt, 0).unwrap();
        assert!(d.out.as_str().starts_with("\r> hi"));
    }

    #[test]
    fn page_stop_prompts_and_reads_one_byte() {
        let mut d = Display::new(MockWriter::default());
        let mut decoder = KeyDecoder::new(Cursor::new(b"q".to_vec()));
        let intent = d.page_stop(&mut decoder).unwrap();
        assert_eq!(intent, Intent::Printable(b'q'));
        assert!(d.out.as_str().contains("for more"));
    }

    #[test]
    fn pager_stops_every_n_lines() {
        let mut d = Display::new(MockWriter::default());
        let mut decoder = KeyDecoder::new(Cursor::new(b"\n".to_vec()));
        let mut pager = Pager::new(2);
        assert!(pager.line_emitted(&mut d, &mut decoder).unwrap().is_none());
        assert!(pager.line_emitted(&mut d, &mut decoder).unwrap().is_some());
    }
}
