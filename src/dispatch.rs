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

//! Resolves a submitted line against the registry: aliases (with recursion
//! suppression), flat commands, the unknown hook, and an optional command-chaining
//! delimiter, then records it in history.

use std::io::Write;

use crate::error::EditorResult;
use crate::history::History;
use crate::registry::Registry;
use crate::tokenizer::{tokenize, tokenize_statements};

/// Tokenises and dispatches `line`. Returns the callback's return value; a non-zero
/// result tells the event loop to stop. The raw `line` is appended to `history`
/// unless `record` is false (the external `execute` API uses this to replay a line
/// without polluting recall order). Diagnostics (parse failures, the unknown-command
/// hook) are written to `out`, the editor's owned output endpoint, never to the
/// process's stdout/stderr.
pub fn execute(
    registry: &mut Registry,
    history: &mut History,
    line: &str,
    record: bool,
    out: &mut dyn Write,
) -> EditorResult<i32> {
    tracing::debug!(line, record, "dispatching line");
    let (rc, should_record) = execute_line(registry, line, out)?;
    if record && should_record {
        history.add(line);
    }
    Ok(rc)
}

/// One pass through the pipeline, without touching history. Aliases recurse back
/// into this function directly so an expansion never gets its own history entry.
/// The returned `bool` tells the caller whether this line is eligible to be recorded
/// at all: a parse failure or an empty (enter-only) line never is, regardless of the
/// caller's `record` flag.
fn execute_line(registry: &mut Registry, line: &str, out: &mut dyn Write) -> EditorResult<(i32, bool)> {
    let statements = match split_statements(registry, line) {
        Ok(s) => s,
        Err(_) => {
            let _ = writeln!(out, "Error parsing command");
            return Ok((0, false));
        }
    };

    if statements.is_empty() {
        return Ok((registry.call_enter(), false));
    }

    let mut rc = 0;
    for (argv, raw) in statements {
        rc = dispatch_statement(registry, &argv, &raw, out)?;
        if rc != 0 {
            break;
        }
    }
    Ok((rc, true))
}

/// Splits `line` into one or more `(argv, raw_text)` statements. With no chain
/// delimiter configured, this is always zero or one statement and `raw_text` is
/// `line` itself; with a delimiter, each statement's raw text is the original
/// substring the tokeniser consumed for it, quoting and escaping intact.
fn split_statements(registry: &Registry, line: &str) -> EditorResult<Vec<(Vec<String>, String)>> {
    match &registry.chain_delimiter {
        Some(delim) => tokenize_statements(line, delim),
        None => {
            let t = tokenize(line, None)?;
            if t.args.is_empty() {
                Ok(Vec::new())
            } else {
                Ok(vec![(t.args, line.to_string())])
            }
        }
    }
}

/// Resolves `argv[0]` against aliases, then the flat command registry, falling back
/// to the unknown hook.
fn dispatch_statement(registry: &mut Registry, argv: &[String], raw_line: &str, out: &mut dyn Write) -> EditorResult<i32> {
    let name = argv[0].as_str();

    if registry.alias_expansion(name).is_some() && !registry.alias_is_executing(name) {
        let expansion = registry.alias_expansion(name).unwrap().to_string();
        registry.set_alias_executing(name, true);
        let mut expanded = expansion;
        if argv.len() > 1 {
            expanded.push(' ');
            expanded.push_str(&argv[1..].join(" "));
        }
        let (rc, _) = execute_line(registry, &expanded, out)?;
        registry.set_alias_executing(name, false);
        return Ok(rc);
    }

    if let Some(cmd) = registry.command_mut(name) {
        let resolved_name = cmd.name.clone();
        tracing::debug!(command = resolved_name.as_str(), "dispatching to flat command");
        return Ok((cmd.run)(&resolved_name, raw_line, argv));
    }

    if let Some(rc) = registry.run_command_table(raw_line, argv) {
        tracing::debug!(command = name, "dispatching to command table");
        return Ok(rc);
    }

    tracing::debug!(command = name, "no command matched, firing unknown hook");
    Ok(registry.call_unknown(name, raw_line, argv, out))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::MockWriter;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[test]
    fn unknown_command_fires_unknown_hook_and_records_history() {
        let mut r = Registry::new();
        r.register("hello", Box::new(|_, _, _| 0), None);
        let seen: Rc<RefCell<Option<(String, Vec<String>)>>> = Rc::new(RefCell::new(None));
        let seen2 = seen.clone();
        r.set_unknown_hook(Box::new(move |name, _line, args, _out| {
            *seen2.borrow_mut() = Some((name.to_string(), args.to_vec()));
            0
        }));
        let mut h = History::new(8);
        let mut out = MockWriter::default();
        execute(&mut r, &mut h, "hello world", true, &mut out).unwrap();
        assert!(seen.borrow().is_none());

        execute(&mut r, &mut h, "goodbye world", true, &mut out).unwrap();
        let (name, args) = seen.borrow().clone().unwrap();
        assert_eq!(name, "goodbye");
        assert_eq!(args, vec!["goodbye", "world"]);
        assert_eq!(h.at(1), Some("goodbye world"));
        assert_eq!(h.at(2), Some("hello world"));
    }

    #[test]
    fn alias_expands_and_history_keeps_the_typed_form() {
        let mut r = Registry::new();
        let got: Rc<RefCell<Option<String>>> = Rc::new(RefCell::new(None));
        let got2 = got.clone();
        r.register(
            "ls",
            Box::new(move |_, raw, _| {
                *got2.borrow_mut() = Some(raw.to_string());
                0
            }),
            None,
        );
        r.set_alias("ll", "ls -l");
        let mut h = History::new(8);
        let mut out = MockWriter::default();
        execute(&mut r, &mut h, "ll /tmp", true, &mut out).unwrap();
        assert_eq!(got.borrow().as_deref(), Some("ls -l /tmp"));
        assert_eq!(h.at(1), Some("ll /tmp"));
    }

    #[test]
    fn alias_recursion_falls_through_to_unknown_hook() {
        let mut r = Registry::new();
        r.set_alias("ll", "ll -v");
        let fired: Rc<RefCell<bool>> = Rc::new(RefCell::new(false));
        let fired2 = fired.clone();
        r.set_unknown_hook(Box::new(move |_, _, _, _out| {
            *fired2.borrow_mut() = true;
            0
        }));
        let mut h = History::new(8);
        let mut out = MockWriter::default();
        execute(&mut r, &mut h, "ll", true, &mut out).unwrap();
        assert!(*fired.borrow());
    }

    #[test]
    fn chain_delimiter_dispatches_each_statement_in_order() {
        let mut r = Registry::new();
        r.chain_delimiter = Some(";".to_string());
        let order: Rc<RefCell<Vec<String>>> = Rc::new(RefCell::new(Vec::new()));
        for name in ["a", "b"] {
            let order2 = order.clone();
            let name_owned = name.to_string();
            r.register(
                name,
                Box::new(move |_, _, _| {
                    order2.borrow_mut().push(name_owned.clone());
                    0
                }),
                None,
            );
        }
        let mut h = History::new(8);
        let mut out = MockWriter::default();
        execute(&mut r, &mut h, "a ; b", true, &mut out).unwrap();
        assert_eq!(*order.borrow(), vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn chain_stops_at_first_nonzero_return() {
        let mut r = Registry::new();
        r.chain_delimiter = Some(";".to_string());
        let ran: Rc<RefCell<Vec<&'static str>>> = Rc::new(RefCell::new(Vec::new()));
        let ran1 = ran.clone();
        r.register("fail", Box::new(move |_, _, _| { ran1.borrow_mut().push("fail"); 1 }), None);
        let ran2 = ran.clone();
        r.register("after", Box::new(move |_, _, _| { ran2.borrow_mut().push("after"); 0 }), None);
        let mut h = History::new(8);
        let mut out = MockWriter::default();
        let rc = execute(&mut r, &mut h, "fail ; after", true, &mut out).unwrap();
        assert_eq!(rc, 1);
        assert_eq!(*ran.borrow(), vec!["fail"]);
    }

    #[test]
    fn empty_line_invokes_enter_hook() {
        let mut r = Registry::new();
        let fired: Rc<RefCell<bool>> = Rc::new(RefCell::new(false));
        let fired2 = fired.clone();
        r.set_enter_hook(Box::new(move || { *fired2.borrow_mut() = true; 0 }));
        let mut h = History::new(8);
        let mut out = MockWriter::default();
        execute(&mut r, &mut h, "", true, &mut out).unwrap();
        assert!(*fired.borrow());
        assert_eq!(h.size(), 0);
    }

    #[test]
    fn unsuppressed_record_flag_skips_history() {
        let mut r = Registry::new();
        r.register("go", Box::new(|_, _, _| 0), None);
        let mut h = History::new(8);
        let mut out = MockWriter::default();
        execute(&mut r, &mut h, "go", false, &mut out).unwrap();
        assert_eq!(h.size(), 0);
    }

    #[test]
    fn parse_failure_returns_zero_without_panicking() {
        let mut r = Registry::new();
        let mut h = History::new(8);
        let mut out = MockWriter::default();
        let rc = execute(&mut r, &mut h, "echo 'unterminated", true, &mut out).unwrap();
        assert_eq!(rc, 0);
    }

    #[test]
    fn parse_failure_diagnostic_lands_on_the_owned_output_endpoint() {
        let mut r = Registry::new();
        let mut h = History::new(8);
        let mut out = MockWriter::default();
        execute(&mut r, &mut h, "echo 'unterminated", true, &mut out).unwrap();
        assert!(out.as_str().contains("Error parsing command"));
    }

    #[test]
    fn default_unknown_hook_writes_to_the_owned_output_endpoint() {
        let mut r = Registry::new();
        let mut h = History::new(8);
        let mut out = MockWriter::default();
        execute(&mut r, &mut h, "nope", true, &mut out).unwrap();
        assert!(out.as_str().contains("Command not found: nope"));
    }
}
