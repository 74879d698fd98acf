//! Command interpreter
//!
//! One line in, at most one line out. Every user-input failure is caught here
//! and turned into one of the fixed `** ... **` messages; nothing propagates
//! past a single command.

use crate::entities::{registry_key, AttrValue, Entity, EntityClass, PROTECTED};
use crate::errors::{HbnbError, Missing, Result};
use crate::parser::{
    next_token, parse_create_param, parse_update_value, rewrite_shorthand, split_verb, tokenize,
    Token,
};
use crate::storage::Storage;
use serde_json::{Map, Value};
use std::io::{self, BufRead, Write};
use tracing::{debug, error, warn};

pub const PROMPT: &str = "(hbnb) ";

/// Whether the loop should keep reading
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Exit,
}

enum Reply {
    Line(String),
    Silent,
    Exit,
}

const HELP: &[(&str, &str)] = &[
    ("create", "create <Class> [key=value ...]: create an instance and print its id"),
    ("show", "show <Class> <id>: print the string form of an instance"),
    ("destroy", "destroy <Class> <id>: delete an instance"),
    ("all", "all [Class]: print every instance, optionally of one class"),
    ("count", "count <Class>: print the number of instances of a class"),
    (
        "update",
        "update <Class> <id> <attribute> <value> | update <Class> <id> {json}: set attributes",
    ),
    ("quit", "quit: exit the console"),
    ("EOF", "EOF: exit the console"),
    ("help", "help [command]: list commands or describe one"),
];

pub struct Console<W: Write> {
    storage: Box<dyn Storage>,
    out: W,
}

impl<W: Write> Console<W> {
    pub fn new(storage: Box<dyn Storage>, out: W) -> Self {
        Console { storage, out }
    }

    pub fn storage(&self) -> &dyn Storage {
        self.storage.as_ref()
    }

    pub fn storage_mut(&mut self) -> &mut dyn Storage {
        self.storage.as_mut()
    }

    /// Read-eval-print until `quit` or end of input
    pub fn run<R: BufRead>(&mut self, mut input: R, interactive: bool) -> io::Result<()> {
        loop {
            if interactive {
                write!(self.out, "{}", PROMPT)?;
                self.out.flush()?;
            }

            let mut line = String::new();
            if input.read_line(&mut line)? == 0 {
                if interactive {
                    writeln!(self.out)?;
                }
                return Ok(());
            }

            if self.onecmd(&line)? == Flow::Exit {
                return Ok(());
            }
        }
    }

    /// Execute a single command line
    pub fn onecmd(&mut self, line: &str) -> io::Result<Flow> {
        let line = line.trim();
        if line.is_empty() {
            return Ok(Flow::Continue);
        }

        let canonical = rewrite_shorthand(line);
        let command = canonical.as_deref().unwrap_or(line);
        let (verb, args) = split_verb(command);
        debug!(verb = verb, "dispatching");

        let result = match verb {
            "create" => self.do_create(args),
            "show" => self.do_show(args),
            "destroy" => self.do_destroy(args),
            "all" => self.do_all(args),
            "count" => self.do_count(args),
            "update" => self.do_update(args),
            "help" => Ok(Reply::Line(help_text(args.trim()))),
            "quit" | "EOF" => Ok(Reply::Exit),
            _ => Ok(Reply::Line(format!("*** Unknown syntax: {}", line))),
        };

        match result {
            Ok(Reply::Line(text)) => writeln!(self.out, "{}", text)?,
            Ok(Reply::Silent) => {}
            Ok(Reply::Exit) => return Ok(Flow::Exit),
            Err(e) => {
                if !e.is_user_error() {
                    error!(error = %e, command = line, "command failed");
                }
                writeln!(self.out, "** {} **", e)?;
            }
        }
        Ok(Flow::Continue)
    }

    // ========================================================================
    // COMMANDS
    // ========================================================================

    fn do_create(&mut self, args: &str) -> Result<Reply> {
        let mut words = args.split_whitespace();
        let class = resolve_class(words.next())?;

        let mut entity = Entity::new(class);
        for param in words {
            match parse_create_param(param) {
                Some((name, value)) => {
                    entity.set(&name, value);
                }
                None => warn!(param = param, "dropping unparseable parameter"),
            }
        }

        entity.persist(self.storage.as_mut())?;
        Ok(Reply::Line(entity.id().to_string()))
    }

    fn do_show(&mut self, args: &str) -> Result<Reply> {
        let tokens = tokenize(args);
        let entity = self.lookup(&tokens)?;
        Ok(Reply::Line(entity.render()))
    }

    fn do_destroy(&mut self, args: &str) -> Result<Reply> {
        let tokens = tokenize(args);
        let entity = self.lookup(&tokens)?;
        entity.delete(self.storage.as_mut())?;
        Ok(Reply::Silent)
    }

    fn do_all(&mut self, args: &str) -> Result<Reply> {
        let tokens = tokenize(args);
        let filter = match tokens.first() {
            Some(token) => Some(resolve_class(Some(token.text.as_str()))?.name()),
            None => None,
        };

        let rendered: Vec<String> = self
            .storage
            .all(filter)?
            .values()
            .map(Entity::render)
            .collect();
        Ok(Reply::Line(format!("[{}]", rendered.join(", "))))
    }

    fn do_count(&mut self, args: &str) -> Result<Reply> {
        let tokens = tokenize(args);
        let class = resolve_class(tokens.first().map(|t| t.text.as_str()))?;
        let count = self.storage.count(Some(class.name()))?;
        Ok(Reply::Line(count.to_string()))
    }

    fn do_update(&mut self, args: &str) -> Result<Reply> {
        let (class_token, rest) =
            next_token(args).ok_or(HbnbError::MissingArgument(Missing::ClassName))?;
        let class = resolve_class(Some(class_token.text.as_str()))?;

        let (id_token, rest) =
            next_token(rest).ok_or(HbnbError::MissingArgument(Missing::InstanceId))?;
        let mut entity = self.fetch(class, &id_token.text)?;

        if let Some(changes) = parse_dict(rest) {
            let mut changed = false;
            for (name, value) in &changes {
                if PROTECTED.contains(&name.as_str()) {
                    continue;
                }
                if let Some(v) = AttrValue::from_json(value) {
                    changed |= entity.set(name, v);
                }
            }
            if changed {
                entity.persist(self.storage.as_mut())?;
            }
            return Ok(Reply::Silent);
        }

        let (name, rest) =
            next_token(rest).ok_or(HbnbError::MissingArgument(Missing::AttributeName))?;
        let (value, _) = next_token(rest).ok_or(HbnbError::MissingArgument(Missing::Value))?;

        if entity.set(&name.text, parse_update_value(&value)) {
            entity.persist(self.storage.as_mut())?;
        } else {
            debug!(attribute = %name.text, "ignoring update of protected attribute");
        }
        Ok(Reply::Silent)
    }

    // ========================================================================
    // VALIDATION LADDER
    // ========================================================================

    /// class name → known class → id → stored instance
    fn lookup(&self, tokens: &[Token]) -> Result<Entity> {
        let class = resolve_class(tokens.first().map(|t| t.text.as_str()))?;
        let id = tokens
            .get(1)
            .ok_or(HbnbError::MissingArgument(Missing::InstanceId))?;
        self.fetch(class, &id.text)
    }

    fn fetch(&self, class: EntityClass, id: &str) -> Result<Entity> {
        self.storage
            .get(class, id)?
            .ok_or_else(|| HbnbError::NotFound(registry_key(class, id)))
    }
}

impl Console<Vec<u8>> {
    /// Drain everything written so far (used by tests and the HTTP layer)
    pub fn take_output(&mut self) -> String {
        String::from_utf8_lossy(&std::mem::take(&mut self.out)).into_owned()
    }
}

fn resolve_class(name: Option<&str>) -> Result<EntityClass> {
    let name = name
        .filter(|n| !n.is_empty())
        .ok_or(HbnbError::MissingArgument(Missing::ClassName))?;
    EntityClass::from_name(name).ok_or_else(|| HbnbError::UnknownClass(name.to_string()))
}

fn parse_dict(rest: &str) -> Option<Map<String, Value>> {
    let rest = rest.trim();
    if !rest.starts_with('{') {
        return None;
    }
    serde_json::from_str(rest).ok()
}

fn help_text(topic: &str) -> String {
    if topic.is_empty() {
        let names: Vec<&str> = HELP.iter().map(|(name, _)| *name).collect();
        return format!("Documented commands: {}", names.join(" "));
    }
    HELP.iter()
        .find(|(name, _)| *name == topic)
        .map(|(_, text)| text.to_string())
        .unwrap_or_else(|| format!("*** No help on {}", topic))
}
