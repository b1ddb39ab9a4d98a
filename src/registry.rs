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

//! Command and alias registry, command/completion tables, and the singleton hooks
//! (enter, unknown, interrupt).

use std::collections::HashMap;
use std::io::Write;

use crate::completion::Candidates;
use crate::error::{EditorError, EditorResult};

/// A host-supplied command callback. Takes the resolved command name, the raw line
/// as submitted, and the tokenised arguments; returns a loop-terminating status (zero
/// continues, non-zero stops the event loop).
pub type CommandFn = Box<dyn FnMut(&str, &str, &[String]) -> i32>;

/// A per-command completion callback: given the in-progress match, returns the
/// candidate set, including the terminator byte to append after a unique match
/// (`Candidates`'s `From<Vec<String>>` impl covers the common space-terminated case).
pub type CompletionFn = Box<dyn FnMut(&str) -> Candidates>;

pub struct Command {
    pub name: String,
    pub run: CommandFn,
    pub complete: Option<CompletionFn>,
}

/// One node in a hierarchical command table. The root node's `name` is ignored.
pub struct CommandNode {
    pub name: Option<String>,
    pub run: Option<CommandFn>,
    pub subcommands: Vec<CommandNode>,
}

impl CommandNode {
    pub fn root() -> Self { Self { name: None, run: None, subcommands: Vec::new() } }

    /// Validates that no two siblings share a name anywhere in the tree. The
    /// pointer-graph corruption this guards against in a C implementation cannot
    /// occur in an owned tree; what remains worth catching is a genuine modeling
    /// mistake — two subcommands registered under the same name at the same level.
    pub fn validate(&self) -> EditorResult<()> {
        let mut seen = std::collections::HashSet::new();
        for child in &self.subcommands {
            if let Some(name) = &child.name {
                if !seen.insert(name.clone()) {
                    return Err(EditorError::bad_structure(format!(
                        "duplicate subcommand name: {name}"
                    )));
                }
            }
            child.validate()?;
        }
        Ok(())
    }

    /// Walks `path` one component at a time, returning the deepest matching node and
    /// how many path components were consumed. `depth == 0` means `path[0]` did not
    /// name any top-level subcommand.
    pub fn resolve_mut<'a>(&'a mut self, path: &[String]) -> (&'a mut CommandNode, usize) {
        let mut node = self;
        let mut depth = 0;
        for component in path {
            let idx = node.subcommands.iter().position(|c| c.name.as_deref() == Some(component.as_str()));
            match idx {
                Some(i) => {
                    node = &mut node.subcommands[i];
                    depth += 1;
                }
                None => break,
            }
        }
        (node, depth)
    }
}

/// One node in a hierarchical completion table, mirroring [`CommandNode`]'s shape but
/// carrying a completion callback instead of a runnable one.
pub struct CompletionNode {
    pub name: Option<String>,
    pub complete: Option<CompletionFn>,
    pub children: Vec<CompletionNode>,
}

impl CompletionNode {
    pub fn root() -> Self { Self { name: None, complete: None, children: Vec::new() } }

    pub fn validate(&self) -> EditorResult<()> {
        let mut seen = std::collections::HashSet::new();
        for child in &self.children {
            if let Some(name) = &child.name {
                if !seen.insert(name.clone()) {
                    return Err(EditorError::bad_structure(format!(
                        "duplicate completion node name: {name}"
                    )));
                }
            }
            child.validate()?;
        }
        Ok(())
    }

    /// Walks `path` one component at a time; returns the deepest matching node and
    /// how many path components were consumed.
    pub fn resolve<'a>(&'a self, path: &[String]) -> (&'a CompletionNode, usize) {
        let mut node = self;
        let mut depth = 0;
        for component in path {
            match node.children.iter().find(|c| c.name.as_deref() == Some(component.as_str())) {
                Some(child) => {
                    node = child;
                    depth += 1;
                }
                None => break,
            }
        }
        (node, depth)
    }
}

pub type EnterHook = Box<dyn FnMut() -> i32>;
/// Takes the command name, raw line, tokenised arguments, and the editor's owned
/// output endpoint — the diagnostic this hook prints must land on the same stream as
/// everything else the editor writes, never on the process's own stdout/stderr.
pub type UnknownHook = Box<dyn FnMut(&str, &str, &[String], &mut dyn Write) -> i32>;
/// Takes the raw line, the cursor position, and the editor's owned output endpoint.
pub type InterruptHook = Box<dyn FnMut(&str, usize, &mut dyn Write) -> i32>;

/// Holds every registered command, alias, table, and hook for one editor instance.
pub struct Registry {
    commands: Vec<Command>,
    aliases: HashMap<String, AliasRecord>,
    pub command_table: Option<CommandNode>,
    pub completion_table: Option<CompletionNode>,
    pub default_complete: Option<CompletionFn>,
    pub chain_delimiter: Option<String>,
    enter_hook: EnterHook,
    unknown_hook: UnknownHook,
    interrupt_hook: InterruptHook,
}

struct AliasRecord {
    expansion: String,
    executing: bool,
}

impl Default for Registry {
    fn default() -> Self {
        Self {
            commands: Vec::new(),
            aliases: HashMap::new(),
            command_table: None,
            completion_table: None,
            default_complete: None,
            chain_delimiter: None,
            enter_hook: Box::new(|| 0),
            unknown_hook: Box::new(|name, _line, _args, out| {
                let _ = writeln!(out, "Command not found: {name}");
                0
            }),
            interrupt_hook: Box::new(|_line, _pos, out| {
                let _ = writeln!(out, "^C");
                1
            }),
        }
    }
}

impl Registry {
    pub fn new() -> Self { Self::default() }

    /// Registers a command, replacing an existing one of the same name in place.
    pub fn register(&mut self, name: impl Into<String>, run: CommandFn, complete: Option<CompletionFn>) {
        let name = name.into();
        if let Some(existing) = self.commands.iter_mut().find(|c| c.name == name) {
            existing.run = run;
            existing.complete = complete;
        } else {
            self.commands.push(Command { name, run, complete });
        }
    }

    pub fn unregister(&mut self, name: &str) { self.commands.retain(|c| c.name != name); }

    pub fn find(&self, name: &str) -> bool {
        self.commands.iter().any(|c| c.name == name) || self.command_table_has(name)
    }

    fn command_table_has(&self, name: &str) -> bool {
        self.command_table
            .as_ref()
            .map(|root| root.subcommands.iter().any(|c| c.name.as_deref() == Some(name)))
            .unwrap_or(false)
    }

    /// Every flat command name, followed by every top-level command-table subcommand
    /// name. Used as the word-zero completion source.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        let flat = self.commands.iter().map(|c| c.name.as_str());
        let table = self
            .command_table
            .iter()
            .flat_map(|root| root.subcommands.iter())
            .filter_map(|c| c.name.as_deref());
        flat.chain(table)
    }

    /// Validates `table` and installs it as the registry's command table.
    pub fn register_command_table(&mut self, table: CommandNode) -> EditorResult<()> {
        table.validate()?;
        self.command_table = Some(table);
        Ok(())
    }

    /// Resolves `argv` against the command table, re-entering the tree one path
    /// component at a time. Runs the deepest node reached that carries a callback,
    /// passing it the remaining (unconsumed) arguments. Returns `None` if `argv[0]`
    /// does not name a top-level subcommand, so the caller can fall through to the
    /// unknown hook.
    pub fn run_command_table(&mut self, raw_line: &str, argv: &[String]) -> Option<i32> {
        let root = self.command_table.as_mut()?;
        let (node, depth) = root.resolve_mut(argv);
        if depth == 0 {
            return None;
        }
        let run = node.run.as_mut()?;
        let resolved_name = node.name.clone().unwrap_or_default();
        Some(run(&resolved_name, raw_line, &argv[depth..]))
    }

    pub fn command_mut(&mut self, name: &str) -> Option<&mut Command> {
        self.commands.iter_mut().find(|c| c.name == name)
    }

    pub fn set_alias(&mut self, name: impl Into<String>, expansion: impl Into<String>) {
        let expansion = expansion.into();
        let name = name.into();
        if expansion.is_empty() {
            self.aliases.remove(&name);
        } else {
            self.aliases.insert(name, AliasRecord { expansion, executing: false });
        }
    }

    pub fn alias_expansion(&self, name: &str) -> Option<&str> {
        self.aliases.get(name).map(|r| r.expansion.as_str())
    }

    pub fn alias_is_executing(&self, name: &str) -> bool {
        self.aliases.get(name).map(|r| r.executing).unwrap_or(false)
    }

    pub fn set_alias_executing(&mut self, name: &str, executing: bool) {
        if let Some(r) = self.aliases.get_mut(name) {
            r.executing = executing;
        }
    }

    pub fn aliases(&self) -> impl Iterator<Item = (&str, &str)> {
        self.aliases.iter().map(|(k, v)| (k.as_str(), v.expansion.as_str()))
    }

    pub fn set_enter_hook(&mut self, hook: EnterHook) { self.enter_hook = hook; }
    pub fn set_unknown_hook(&mut self, hook: UnknownHook) { self.unknown_hook = hook; }
    pub fn set_interrupt_hook(&mut self, hook: InterruptHook) { self.interrupt_hook = hook; }

    pub fn call_enter(&mut self) -> i32 { (self.enter_hook)() }
    pub fn call_unknown(&mut self, name: &str, line: &str, args: &[String], out: &mut dyn Write) -> i32 {
        (self.unknown_hook)(name, line, args, out)
    }
    pub fn call_interrupt(&mut self, line: &str, pos: usize, out: &mut dyn Write) -> i32 {
        (self.interrupt_hook)(line, pos, out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn re_registering_replaces_in_place() {
        let mut r = Registry::new();
        r.register("go", Box::new(|_, _, _| 0), None);
        r.register("go", Box::new(|_, _, _| 7), None);
        assert_eq!(r.commands.len(), 1);
        let rc = (r.commands[0].run)("go", "go", &[]);
        assert_eq!(rc, 7);
    }

    #[test]
    fn alias_set_and_remove() {
        let mut r = Registry::new();
        r.set_alias("ll", "ls -l");
        assert_eq!(r.alias_expansion("ll"), Some("ls -l"));
        r.set_alias("ll", "");
        assert_eq!(r.alias_expansion("ll"), None);
    }

    #[test]
    fn command_table_rejects_duplicate_siblings() {
        let mut root = CommandNode::root();
        root.subcommands.push(CommandNode { name: Some("a".into()), run: None, subcommands: vec![] });
        root.subcommands.push(CommandNode { name: Some("a".into()), run: None, subcommands: vec![] });
        assert!(root.validate().is_err());
    }

    #[test]
    fn command_table_dispatches_to_the_deepest_matching_node() {
        let mut r = Registry::new();
        let mut root = CommandNode::root();
        root.subcommands.push(CommandNode {
            name: Some("remote".into()),
            run: None,
            subcommands: vec![CommandNode {
                name: Some("add".into()),
                run: Some(Box::new(|_, _, args| args.len() as i32)),
                subcommands: vec![],
            }],
        });
        r.register_command_table(root).unwrap();
        assert!(r.find("remote"));
        let rc = r.run_command_table("remote add origin url", &[
            "remote".to_string(),
            "add".to_string(),
            "origin".to_string(),
            "url".to_string(),
        ]);
        assert_eq!(rc, Some(2));
    }

    #[test]
    fn command_table_miss_falls_through_to_none() {
        let mut r = Registry::new();
        r.register_command_table(CommandNode::root()).unwrap();
        assert_eq!(r.run_command_table("nope", &["nope".to_string()]), None);
    }

    #[test]
    fn completion_table_resolves_path() {
        let mut root = CompletionNode::root();
        root.children.push(CompletionNode {
            name: Some("git".into()),
            complete: None,
            children: vec![CompletionNode { name: Some("commit".into()), complete: None, children: vec![] }],
        });
        let (node, depth) = root.resolve(&["git".to_string(), "commit".to_string()]);
        assert_eq!(depth, 2);
        assert_eq!(node.name.as_deref(), Some("commit"));
    }
}
