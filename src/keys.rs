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

//! Keystroke decoder: a small state machine over raw bytes that turns control bytes
//! and ANSI CSI sequences into editing intents.
//!
//! This decodes raw bytes directly rather than going through crossterm's own key
//! event parser, so the literal state table below is the single source of truth and
//! is directly testable against byte sequences. Crossterm is used elsewhere only for
//! raw-mode toggling and terminal size queries.

use std::io::Read;

use crate::error::{EditorError, EditorResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intent {
    Printable(u8),
    Enter,
    Tab,
    Backspace,
    Delete,
    DeleteWord,
    DeleteToStart,
    Home,
    End,
    Left,
    Right,
    LeftWord,
    RightWord,
    Up,
    Down,
    PageUp,
    PageDown,
    Interrupt,
    ReverseSearch,
    Insert,
    Continuation,
    EndOfInput,
    Ignored,
}

enum State {
    Ground,
    Esc,
    Csi,
    CsiParam(u32),
    CsiParamSemi(u32),
}

/// Reads keystrokes one byte at a time from any byte source and decodes them into
/// [`Intent`]s.
pub struct KeyDecoder<R: Read> {
    input: R,
    /// Small pushback ring so callers (e.g. the pager) can peek for Ctrl-C without
    /// consuming an unrelated byte.
    pushback: Vec<u8>,
}

impl<R: Read> KeyDecoder<R> {
    pub fn new(input: R) -> Self { Self { input, pushback: Vec::new() } }

    /// Escape hatch for callers that need to temporarily hand the raw input endpoint
    /// to another reader.
    pub fn reader_mut(&mut self) -> &mut R { &mut self.input }

    fn read_byte(&mut self) -> EditorResult<Option<u8>> {
        if let Some(b) = self.pushback.pop() {
            return Ok(Some(b));
        }
        let mut buf = [0u8; 1];
        match self.input.read(&mut buf) {
            Ok(0) => Ok(None),
            Ok(_) => Ok(Some(buf[0])),
            Err(e) => Err(EditorError::Io(e)),
        }
    }

    /// Pushes a byte back to be returned by the next `read_byte`.
    pub fn pushback(&mut self, byte: u8) { self.pushback.push(byte); }

    /// Peeks one byte without consuming unrelated input (used by the pager to poll
    /// for Ctrl-C). Returns `true` if a Ctrl-C byte was found; any other byte read is
    /// pushed back.
    pub fn check_for_ctrl_c(&mut self) -> EditorResult<bool> {
        match self.read_byte()? {
            Some(0x03) => Ok(true),
            Some(other) => {
                self.pushback(other);
                Ok(false)
            }
            None => Ok(false),
        }
    }

    /// Reads and decodes the next keystroke. Returns [`Intent::EndOfInput`] on EOF.
    pub fn next_intent(&mut self) -> EditorResult<Intent> {
        let intent = self.decode()?;
        tracing::debug!(?intent, "decoded keystroke");
        Ok(intent)
    }

    fn decode(&mut self) -> EditorResult<Intent> {
        let mut state = State::Ground;
        loop {
            let byte = match self.read_byte()? {
                Some(b) => b,
                None => return Ok(Intent::EndOfInput),
            };
            match state {
                State::Ground => match byte {
                    0x03 => return Ok(Intent::Interrupt),
                    0x09 => return Ok(Intent::Tab),
                    0x0A | 0x0D => return Ok(Intent::Enter),
                    0x12 => return Ok(Intent::ReverseSearch),
                    0x15 => return Ok(Intent::DeleteToStart),
                    0x17 => return Ok(Intent::DeleteWord),
                    0x1B => state = State::Esc,
                    0x7F => return Ok(Intent::Backspace),
                    b => return Ok(Intent::Printable(b)),
                },
                State::Esc => match byte {
                    b'[' => state = State::Csi,
                    0x7F => return Ok(Intent::DeleteWord),
                    _ => return Ok(Intent::Ignored),
                },
                State::Csi => match byte {
                    b'A' => return Ok(Intent::Up),
                    b'B' => return Ok(Intent::Down),
                    b'C' => return Ok(Intent::Right),
                    b'D' => return Ok(Intent::Left),
                    b'H' => return Ok(Intent::Home),
                    b'F' => return Ok(Intent::End),
                    b'0'..=b'9' => state = State::CsiParam((byte - b'0') as u32),
                    _ => return Ok(Intent::Ignored),
                },
                State::CsiParam(param) => match byte {
                    b'0'..=b'9' => state = State::CsiParam(param * 10 + (byte - b'0') as u32),
                    b';' => state = State::CsiParamSemi(param),
                    b'~' => return Ok(map_tilde_param(param)),
                    _ => return Ok(Intent::Ignored),
                },
                State::CsiParamSemi(param) => match byte {
                    // modifier digits are consumed but not distinguished further;
                    // only `;5` (ctrl) is meaningful to this decoder.
                    b'0'..=b'9' => state = State::CsiParamSemi(param),
                    b'C' if param == 1 => return Ok(Intent::RightWord),
                    b'D' if param == 1 => return Ok(Intent::LeftWord),
                    b'~' => return Ok(map_tilde_param(param)),
                    _ => return Ok(Intent::Ignored),
                },
            }
        }
    }
}

fn map_tilde_param(param: u32) -> Intent {
    match param {
        1 => Intent::Home,
        2 => Intent::Insert,
        3 => Intent::Delete,
        4 => Intent::End,
        5 => Intent::PageUp,
        6 => Intent::PageDown,
        _ => Intent::Ignored,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn decode_all(input: &[u8]) -> Vec<Intent> {
        let mut d = KeyDecoder::new(Cursor::new(input.to_vec()));
        let mut out = Vec::new();
        loop {
            match d.next_intent().unwrap() {
                Intent::EndOfInput => break,
                other => out.push(other),
            }
        }
        out
    }

    #[test]
    fn control_bytes() {
        assert_eq!(decode_all(&[0x03]), vec![Intent::Interrupt]);
        assert_eq!(decode_all(&[0x12]), vec![Intent::ReverseSearch]);
        assert_eq!(decode_all(&[0x15]), vec![Intent::DeleteToStart]);
        assert_eq!(decode_all(&[0x17]), vec![Intent::DeleteWord]);
        assert_eq!(decode_all(&[0x7F]), vec![Intent::Backspace]);
        assert_eq!(decode_all(b"a"), vec![Intent::Printable(b'a')]);
    }

    #[test]
    fn csi_arrows_and_home_end() {
        assert_eq!(decode_all(b"\x1b[A"), vec![Intent::Up]);
        assert_eq!(decode_all(b"\x1b[B"), vec![Intent::Down]);
        assert_eq!(decode_all(b"\x1b[C"), vec![Intent::Right]);
        assert_eq!(decode_all(b"\x1b[D"), vec![Intent::Left]);
        assert_eq!(decode_all(b"\x1b[H"), vec![Intent::Home]);
        assert_eq!(decode_all(b"\x1b[F"), vec![Intent::End]);
    }

    #[test]
    fn csi_tilde_params() {
        assert_eq!(decode_all(b"\x1b[3~"), vec![Intent::Delete]);
        assert_eq!(decode_all(b"\x1b[5~"), vec![Intent::PageUp]);
        assert_eq!(decode_all(b"\x1b[6~"), vec![Intent::PageDown]);
    }

    #[test]
    fn ctrl_arrow_word_motions() {
        assert_eq!(decode_all(b"\x1b[1;5C"), vec![Intent::RightWord]);
        assert_eq!(decode_all(b"\x1b[1;5D"), vec![Intent::LeftWord]);
    }

    #[test]
    fn esc_backspace_is_delete_word() {
        assert_eq!(decode_all(b"\x1b\x7F"), vec![Intent::DeleteWord]);
    }

    #[test]
    fn unknown_sequence_is_ignored() {
        assert_eq!(decode_all(b"\x1bZ"), vec![Intent::Ignored]);
    }

    #[test]
    fn eof_on_empty_input() {
        let mut d = KeyDecoder::new(Cursor::new(Vec::<u8>::new()));
        assert_eq!(d.next_intent().unwrap(), Intent::EndOfInput);
    }

    #[test]
    fn check_for_ctrl_c_pushes_back_other_bytes() {
        let mut d = KeyDecoder::new(Cursor::new(b"a".to_vec()));
        assert!(!d.check_for_ctrl_c().unwrap());
        assert_eq!(d.next_intent().unwrap(), Intent::Printable(b'a'));
    }
}
