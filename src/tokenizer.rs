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

//! Shell-style argument tokeniser: quoting, escaping, and an optional statement
//! delimiter for command chaining.

use crate::error::{EditorError, EditorResult};

/// The result of tokenising one statement out of a larger line.
pub struct Tokenized {
    pub args: Vec<String>,
    /// Byte offset into the input where the next statement begins, if a delimiter
    /// was supplied and matched.
    pub next: Option<usize>,
}

/// Tokenises `input` into an argument vector. If `delimiter` is `Some`, parsing stops
/// at the first unquoted occurrence of it and `next` points past it (with following
/// whitespace skipped); otherwise the whole input is consumed and `next` is `None`.
pub fn tokenize(input: &str, delimiter: Option<&str>) -> EditorResult<Tokenized> {
    let bytes = input.as_bytes();
    let mut i = 0;
    let mut args: Vec<String> = Vec::new();
    let mut next = None;

    loop {
        while i < bytes.len() && bytes[i].is_ascii_whitespace() {
            i += 1;
        }
        if i >= bytes.len() {
            break;
        }
        if let Some(delim) = delimiter {
            if input[i..].starts_with(delim) {
                i += delim.len();
                next = Some(i);
                break;
            }
        }

        let arg_start = i;
        let mut quote: Option<u8> = None;
        let mut raw = Vec::new();
        loop {
            if i >= bytes.len() {
                break;
            }
            let b = bytes[i];
            match quote {
                None => {
                    if let Some(delim) = delimiter {
                        if input[i..].starts_with(delim) {
                            break;
                        }
                    }
                    if b.is_ascii_whitespace() {
                        break;
                    }
                    if b == b'\'' || b == b'"' {
                        quote = Some(b);
                        raw.push(b);
                        i += 1;
                    } else if b == b'\\' {
                        raw.push(b);
                        i += 1;
                        if i < bytes.len() {
                            raw.push(bytes[i]);
                            i += 1;
                        }
                    } else {
                        raw.push(b);
                        i += 1;
                    }
                }
                Some(q) => {
                    if b == b'\\' {
                        raw.push(b);
                        i += 1;
                        if i < bytes.len() {
                            raw.push(bytes[i]);
                            i += 1;
                        }
                    } else if b == q {
                        raw.push(b);
                        quote = None;
                        i += 1;
                    } else {
                        raw.push(b);
                        i += 1;
                    }
                }
            }
        }
        if quote.is_some() {
            return Err(EditorError::parse_failure(format!(
                "unterminated quote starting at byte {arg_start}"
            )));
        }
        args.push(unescape(&raw));
    }

    Ok(Tokenized { args, next })
}

/// Second pass: strips unescaped quote bytes and resolves backslash escapes. A
/// trailing lone backslash is kept literally.
fn unescape(raw: &[u8]) -> String {
    let mut out = Vec::with_capacity(raw.len());
    let mut quote: Option<u8> = None;
    let mut i = 0;
    while i < raw.len() {
        let b = raw[i];
        match quote {
            None if b == b'\'' || b == b'"' => {
                quote = Some(b);
                i += 1;
            }
            Some(q) if b == q => {
                quote = None;
                i += 1;
            }
            _ if b == b'\\' => {
                if i + 1 < raw.len() {
                    out.push(raw[i + 1]);
                    i += 2;
                } else {
                    out.push(b'\\');
                    i += 1;
                }
            }
            _ => {
                out.push(b);
                i += 1;
            }
        }
    }
    String::from_utf8_lossy(&out).into_owned()
}

/// Tokenises every statement in `input` under `delimiter`, in order.
pub fn tokenize_all(input: &str, delimiter: &str) -> EditorResult<Vec<Vec<String>>> {
    let mut out = Vec::new();
    let mut rest = input;
    loop {
        let Tokenized { args, next } = tokenize(rest, Some(delimiter))?;
        if !args.is_empty() {
            out.push(args);
        }
        match next {
            Some(offset) => rest = &rest[offset..],
            None => break,
        }
    }
    Ok(out)
}

/// Like [`tokenize_all`], but pairs each statement's argv with the original substring
/// it came from (quoting and escaping intact), rather than a `join(" ")`
/// reconstruction that would lose both. The substring is trimmed of the surrounding
/// whitespace the tokeniser itself skips.
pub fn tokenize_statements(input: &str, delimiter: &str) -> EditorResult<Vec<(Vec<String>, String)>> {
    let mut out = Vec::new();
    let mut offset = 0;
    loop {
        let rest = &input[offset..];
        let Tokenized { args, next } = tokenize(rest, Some(delimiter))?;
        if !args.is_empty() {
            let end = match next {
                Some(n) => n - delimiter.len(),
                None => rest.len(),
            };
            let raw = rest[..end].trim().to_string();
            out.push((args, raw));
        }
        match next {
            Some(n) => offset += n,
            None => break,
        }
    }
    Ok(out)
}
