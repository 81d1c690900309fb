//! Verb table for one-off remote calls
//!
//! A call line looks like `messages_get id=18c1f0` or
//! `messages_batchModify ids=["a","b"] addLabelIds=["Label_3"]`. Values are
//! parsed as JSON and fall back to plain strings.

use std::collections::BTreeMap;

use log::debug;
use serde::Serialize;
use serde_json::Value;

use crate::error::{Error, Result};
use crate::models::{LabelId, MessageId};
use crate::service::MailService;

/// Named arguments of a call
pub type CallArgs = serde_json::Map<String, Value>;

/// Handler for one verb
pub type Handler = fn(&dyn MailService, &CallArgs) -> Result<Value>;

/// Mapping from verb names to handlers
#[derive(Clone)]
pub struct CallTable {
    handlers: BTreeMap<&'static str, Handler>,
}

impl Default for CallTable {
    fn default() -> Self {
        let mut table = Self::empty();
        table.register("profile_get", profile_get);
        table.register("labels_list", labels_list);
        table.register("labels_create", labels_create);
        table.register("messages_list", messages_list);
        table.register("messages_get", messages_get);
        table.register("history_list", history_list);
        table.register("messages_batchModify", messages_batch_modify);
        table
    }
}

impl CallTable {
    /// A table without any verbs
    pub fn empty() -> Self {
        Self {
            handlers: BTreeMap::new(),
        }
    }

    /// Register (or replace) the handler for `verb`
    pub fn register(&mut self, verb: &'static str, handler: Handler) {
        self.handlers.insert(verb, handler);
    }

    /// Known verbs, sorted
    pub fn verbs(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.handlers.keys().copied()
    }

    /// Run `verb` against `remote`
    pub fn execute(&self, remote: &dyn MailService, verb: &str, args: &CallArgs) -> Result<Value> {
        let handler = self
            .handlers
            .get(verb)
            .ok_or_else(|| Error::UnknownOperation(verb.to_string()))?;
        debug!("Calling {} with {} arguments", verb, args.len());
        handler(remote, args)
    }

    /// Parse and run a whole call line
    pub fn execute_line(&self, remote: &dyn MailService, line: &str) -> Result<Value> {
        let (verb, args) = parse_call_line(line)?;
        self.execute(remote, &verb, &args)
    }
}

/// Split a call line into its verb and arguments
pub fn parse_call_line(line: &str) -> Result<(String, CallArgs)> {
    let mut words = line.split_whitespace();
    let verb = words
        .next()
        .ok_or_else(|| Error::InvalidArgument("empty call".to_string()))?;
    let args = words.map(parse_argument).collect::<Result<CallArgs>>()?;
    Ok((verb.to_string(), args))
}

/// Parse one `key=value` argument
pub fn parse_argument(word: &str) -> Result<(String, Value)> {
    let (key, raw) = word
        .split_once('=')
        .filter(|(key, raw)| !key.is_empty() && !raw.is_empty())
        .ok_or_else(|| {
            Error::InvalidArgument(format!("'{word}' needs to be <arg>=<value>"))
        })?;
    let value = serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()));
    Ok((key.to_string(), value))
}

fn to_json<T: Serialize>(value: T) -> Result<Value> {
    serde_json::to_value(value)
        .map_err(|e| Error::protocol(format!("Failed to encode response: {e}")))
}

fn optional_str<'a>(args: &'a CallArgs, key: &str) -> Result<Option<&'a str>> {
    match args.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s)),
        Some(other) => Err(Error::InvalidArgument(format!(
            "'{key}' must be a string, got {other}"
        ))),
    }
}

fn required_str<'a>(args: &'a CallArgs, key: &str) -> Result<&'a str> {
    optional_str(args, key)?
        .ok_or_else(|| Error::InvalidArgument(format!("missing argument '{key}'")))
}

/// A history ID may be given as a number or a decimal string
fn required_u64(args: &CallArgs, key: &str) -> Result<u64> {
    match args.get(key) {
        Some(Value::Number(n)) => n.as_u64(),
        Some(Value::String(s)) => s.parse().ok(),
        _ => None,
    }
    .ok_or_else(|| Error::InvalidArgument(format!("'{key}' must be a non-negative integer")))
}

/// A list argument may be a JSON array of strings or a single string
fn string_list(args: &CallArgs, key: &str) -> Result<Vec<String>> {
    match args.get(key) {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(Value::String(s)) => Ok(vec![s.clone()]),
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| match item {
                Value::String(s) => Ok(s.clone()),
                other => Err(Error::InvalidArgument(format!(
                    "'{key}' must only hold strings, got {other}"
                ))),
            })
            .collect(),
        Some(other) => Err(Error::InvalidArgument(format!(
            "'{key}' must be a list of strings, got {other}"
        ))),
    }
}

fn profile_get(remote: &dyn MailService, _: &CallArgs) -> Result<Value> {
    to_json(remote.get_profile()?)
}

fn labels_list(remote: &dyn MailService, _: &CallArgs) -> Result<Value> {
    let mut labels = remote.list_labels()?;
    labels.sort_by(|a, b| a.name.cmp(&b.name));
    to_json(labels)
}

fn labels_create(remote: &dyn MailService, args: &CallArgs) -> Result<Value> {
    to_json(remote.create_label(required_str(args, "name")?)?)
}

fn messages_list(remote: &dyn MailService, args: &CallArgs) -> Result<Value> {
    to_json(remote.list_message_ids(optional_str(args, "pageToken")?)?)
}

fn messages_get(remote: &dyn MailService, args: &CallArgs) -> Result<Value> {
    to_json(remote.get_message(&MessageId::new(required_str(args, "id")?))?)
}

fn history_list(remote: &dyn MailService, args: &CallArgs) -> Result<Value> {
    let start = required_u64(args, "startHistoryId")?;
    to_json(remote.list_history(start, optional_str(args, "pageToken")?)?)
}

fn messages_batch_modify(remote: &dyn MailService, args: &CallArgs) -> Result<Value> {
    let ids: Vec<MessageId> = string_list(args, "ids")?.into_iter().map(MessageId::from).collect();
    if ids.is_empty() {
        return Err(Error::InvalidArgument("missing argument 'ids'".to_string()));
    }
    let add: Vec<LabelId> = string_list(args, "addLabelIds")?
        .into_iter()
        .map(LabelId::from)
        .collect();
    let remove: Vec<LabelId> = string_list(args, "removeLabelIds")?
        .into_iter()
        .map(LabelId::from)
        .collect();
    remote.batch_modify(&ids, &add, &remove)?;
    Ok(Value::Object(CallArgs::new()))
}
