//! Binding engine - lazy, memoized evaluation over a live graph
//!
//! `BoundConfig` mirrors the document: static subtrees are copied once,
//! containers become slot maps, and every keyword node becomes a slot that
//! computes on first read.
//!
//! ```text
//! Unevaluated(node) ──read──▶ Evaluating ──ok──▶ Evaluated(value)
//!                                 │
//!                                 └── re-entered ──▶ CircularReference
//! ```
//!
//! After the first read a slot holds a plain value: later reads never
//! re-run the keyword (or the function it calls). Any slot can be assigned
//! with [`BoundConfig::set`], before or after it was read.
//!
//! Unlike the resolution engine, binding is final: params are fixed for the
//! life of the graph, so an absent parameter is simply undefined and
//! `$function` nodes call into the registry.

use serde_json::{Map, Value};
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, trace};

use crate::error::{DollarError, Result};
use crate::function::FunctionRegistry;
use crate::node::{Node, DEFAULT_BRANCH};
use crate::params::{truthy, Params};
use crate::path::{self, DEFAULT_KEY};
use crate::template::{self, Substitution};

const ROOT: &[&str] = &[];

/// Observable state of one slot of the graph
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotStatus {
    /// Plain value or container, nothing to compute
    Static,
    Unevaluated,
    Evaluating,
    Evaluated,
}

#[derive(Debug)]
struct Slot {
    /// Dotted path of this slot, for error messages
    key: String,
    state: RefCell<State>,
}

#[derive(Debug)]
enum State {
    Static(Value),
    Container(Container),
    Unevaluated(Node),
    Evaluating,
    /// `None` is an undefined result
    Evaluated(Option<Value>),
}

#[derive(Debug)]
enum Container {
    Array(Vec<Slot>),
    Object(BTreeMap<String, Slot>),
}

impl Container {
    fn child(&self, segment: &str) -> Option<&Slot> {
        match self {
            Container::Array(slots) => segment.parse::<usize>().ok().and_then(|i| slots.get(i)),
            Container::Object(slots) => slots.get(segment),
        }
    }

    fn child_or_default(&self, segment: &str) -> Option<&Slot> {
        match self {
            Container::Object(slots) => slots.get(segment).or_else(|| slots.get(DEFAULT_KEY)),
            Container::Array(_) => self.child(segment),
        }
    }
}

impl Slot {
    fn build(node: &Node, key: String) -> Slot {
        let state = match node {
            Node::Scalar(value) => State::Static(value.clone()),
            _ if !node.is_dynamic() => State::Static(node.to_value()),
            Node::Array(items) => State::Container(Container::Array(
                items
                    .iter()
                    .enumerate()
                    .map(|(i, item)| Slot::build(item, path::join(&key, &i.to_string())))
                    .collect(),
            )),
            Node::Object(entries) => State::Container(Container::Object(
                entries
                    .iter()
                    .map(|(k, child)| (k.clone(), Slot::build(child, path::join(&key, k))))
                    .collect(),
            )),
            keyword => State::Unevaluated(keyword.clone()),
        };
        Slot {
            key,
            state: RefCell::new(state),
        }
    }

    fn fixed(key: String, value: Value) -> Slot {
        Slot {
            key,
            state: RefCell::new(State::Static(value)),
        }
    }

    fn circular(&self) -> DollarError {
        DollarError::CircularReference {
            key: if self.key.is_empty() {
                "<root>".to_string()
            } else {
                self.key.clone()
            },
        }
    }

    fn status(&self) -> SlotStatus {
        match &*self.state.borrow() {
            State::Static(_) | State::Container(_) => SlotStatus::Static,
            State::Unevaluated(_) => SlotStatus::Unevaluated,
            State::Evaluating => SlotStatus::Evaluating,
            State::Evaluated(_) => SlotStatus::Evaluated,
        }
    }
}

/// A live, lazily evaluated view of a config document
#[derive(Debug)]
pub struct BoundConfig {
    root: Slot,
    params: Params,
    functions: Arc<FunctionRegistry>,
    /// Param prefix under which the graph can read itself
    self_key: Option<String>,
}

impl BoundConfig {
    /// Bind a parsed document
    pub fn new(node: &Node, params: Params, functions: Arc<FunctionRegistry>) -> Self {
        Self {
            root: Slot::build(node, String::new()),
            params,
            functions,
            self_key: None,
        }
    }

    /// Expose the graph itself to keyword lookups under `key.`
    ///
    /// With `with_self_key("config")`, `{"$param": "config.a"}` reads the
    /// bound key `a`, so a key whose default reads itself is detected as a
    /// circular reference.
    pub fn with_self_key(mut self, key: impl Into<String>) -> Self {
        self.self_key = Some(key.into());
        self
    }

    pub fn params(&self) -> &Params {
        &self.params
    }

    /// Read a dot-path, computing lazy slots along the way
    ///
    /// The empty path returns the whole document.
    pub fn get(&self, path: &str) -> Result<Option<Value>> {
        let segments = path::parse(path)?;
        self.get_at(&segments)
    }

    /// Read a path given as segments
    pub fn get_at<S: AsRef<str>>(&self, segments: &[S]) -> Result<Option<Value>> {
        self.read(&self.root, segments)
    }

    /// Materialize the whole graph
    pub fn to_value(&self) -> Result<Option<Value>> {
        self.get_at(ROOT)
    }

    /// Assign a plain value; a lazy slot at `path` is replaced unevaluated
    pub fn set(&self, path: &str, value: Value) -> Result<()> {
        let segments = path::parse(path)?;
        match segments.split_last() {
            None => {
                *self.root.state.borrow_mut() = State::Static(value);
                Ok(())
            }
            Some((last, parents)) => self.write(&self.root, parents, last, value, path),
        }
    }

    /// State of the slot at `path`, without computing anything
    ///
    /// `None` when `path` does not end on a slot (missing, or inside a
    /// plain value).
    pub fn status(&self, path: &str) -> Result<Option<SlotStatus>> {
        let segments = path::parse(path)?;
        Ok(Self::find_slot(&self.root, &segments, |slot| slot.status()))
    }

    fn find_slot<T>(slot: &Slot, segments: &[String], f: impl FnOnce(&Slot) -> T) -> Option<T> {
        let Some((head, rest)) = segments.split_first() else {
            return Some(f(slot));
        };
        let state = slot.state.borrow();
        match &*state {
            State::Container(container) => {
                let child = container.child(head)?;
                Self::find_slot(child, rest, f)
            }
            _ => None,
        }
    }

    fn read<S: AsRef<str>>(&self, slot: &Slot, segments: &[S]) -> Result<Option<Value>> {
        self.force(slot)?;
        let state = slot.state.borrow();
        match &*state {
            State::Static(value) | State::Evaluated(Some(value)) => {
                Ok(path::get(value, segments).cloned())
            }
            State::Evaluated(None) => Ok(None),
            State::Container(container) => match segments.split_first() {
                None => self.materialize(container).map(Some),
                Some((head, rest)) => match container.child_or_default(head.as_ref()) {
                    Some(child) => self.read(child, rest),
                    None => Ok(None),
                },
            },
            State::Unevaluated(_) | State::Evaluating => Err(slot.circular()),
        }
    }

    fn materialize(&self, container: &Container) -> Result<Value> {
        match container {
            Container::Array(slots) => slots
                .iter()
                .map(|slot| Ok(self.read(slot, ROOT)?.unwrap_or(Value::Null)))
                .collect::<Result<Vec<_>>>()
                .map(Value::Array),
            Container::Object(slots) => {
                let mut map = Map::with_capacity(slots.len());
                for (key, slot) in slots {
                    if let Some(value) = self.read(slot, ROOT)? {
                        map.insert(key.clone(), value);
                    }
                }
                Ok(Value::Object(map))
            }
        }
    }

    /// Compute a lazy slot once; guarded against re-entry
    fn force(&self, slot: &Slot) -> Result<()> {
        match &*slot.state.borrow() {
            State::Unevaluated(_) => {}
            State::Evaluating => return Err(slot.circular()),
            _ => return Ok(()),
        }

        let node = {
            let mut state = slot.state.borrow_mut();
            match std::mem::replace(&mut *state, State::Evaluating) {
                State::Unevaluated(node) => node,
                other => {
                    *state = other;
                    return Ok(());
                }
            }
        };

        trace!(key = %slot.key, keyword = ?node.keyword(), "evaluating");
        let result = self.evaluate(&node);

        let mut state = slot.state.borrow_mut();
        match result {
            Ok(value) => {
                *state = State::Evaluated(value);
                Ok(())
            }
            Err(err) => {
                // Only this slot fails; a later read tries again
                *state = State::Unevaluated(node);
                Err(err)
            }
        }
    }

    fn write(
        &self,
        slot: &Slot,
        parents: &[String],
        last: &str,
        value: Value,
        full_path: &str,
    ) -> Result<()> {
        let not_writable = || DollarError::NotWritable {
            path: full_path.to_string(),
        };

        self.force(slot)?;

        if let Some((head, rest)) = parents.split_first() {
            let state = slot.state.borrow();
            if let State::Container(container) = &*state {
                let child = container.child(head).ok_or_else(not_writable)?;
                return self.write(child, rest, last, value, full_path);
            }
        }

        let mut state = slot.state.borrow_mut();
        match &mut *state {
            State::Container(Container::Object(slots)) => {
                let key = path::join(&slot.key, last);
                slots.insert(last.to_string(), Slot::fixed(key, value));
                Ok(())
            }
            State::Container(Container::Array(slots)) => {
                let index = last.parse::<usize>().map_err(|_| not_writable())?;
                let key = path::join(&slot.key, last);
                match index.cmp(&slots.len()) {
                    std::cmp::Ordering::Less => slots[index] = Slot::fixed(key, value),
                    std::cmp::Ordering::Equal => slots.push(Slot::fixed(key, value)),
                    std::cmp::Ordering::Greater => return Err(not_writable()),
                }
                Ok(())
            }
            State::Static(current) | State::Evaluated(Some(current)) => {
                let parent = path::find_mut(current, parents).ok_or_else(not_writable)?;
                assign(parent, last, value).ok_or_else(not_writable)
            }
            _ => Err(not_writable()),
        }
    }

    /// Look a path up in params, or in the graph itself under the self key
    fn lookup(&self, path: &str) -> Result<Option<Value>> {
        if let Some(self_key) = &self.self_key {
            if path == self_key {
                return self.to_value();
            }
            if let Some(rest) = path
                .strip_prefix(self_key.as_str())
                .and_then(|rest| rest.strip_prefix('.'))
            {
                return self.get(rest);
            }
        }
        Ok(self.params.lookup(path).value().cloned())
    }

    fn evaluate(&self, node: &Node) -> Result<Option<Value>> {
        match node {
            Node::Scalar(value) => Ok(Some(value.clone())),
            Node::Array(items) => items
                .iter()
                .map(|item| Ok(self.evaluate(item)?.unwrap_or(Value::Null)))
                .collect::<Result<Vec<_>>>()
                .map(|items| Some(Value::Array(items))),
            Node::Object(entries) => {
                let mut map = Map::with_capacity(entries.len());
                for (key, child) in entries {
                    if let Some(value) = self.evaluate(child)? {
                        map.insert(key.clone(), value);
                    }
                }
                Ok(Some(Value::Object(map)))
            }
            Node::Param { path, default } => match self.lookup(path)? {
                Some(value) => Ok(Some(value)),
                None => match default {
                    Some(default) => self.evaluate(default),
                    None => Ok(None),
                },
            },
            Node::Template(text) => {
                let mut failure = None;
                let substitution = template::substitute(text, |path| match self.lookup(path) {
                    Ok(value) => Some(template::coerce(value.as_ref())),
                    Err(err) => {
                        failure.get_or_insert(err);
                        Some(String::new())
                    }
                });
                if let Some(err) = failure {
                    return Err(err);
                }
                match substitution {
                    Substitution::Complete(text) | Substitution::Partial(text) => {
                        Ok(Some(Value::String(text)))
                    }
                }
            }
            Node::Guard(pairs) => {
                for (condition, value) in pairs {
                    if condition == DEFAULT_BRANCH
                        || self.lookup(condition)?.as_ref().is_some_and(truthy)
                    {
                        return self.evaluate(value);
                    }
                }
                Ok(None)
            }
            Node::Switch {
                discriminator,
                cases,
            } => {
                let test = self.lookup(discriminator)?;
                match cases.iter().find(|(case, _)| case.matches(test.as_ref())) {
                    Some((_, value)) => self.evaluate(value),
                    None => Ok(None),
                }
            }
            Node::Function { name, extra } => {
                let merged = self.params.merged_over(extra.as_ref());
                debug!(function = %name, "calling function");
                self.functions.call(name, &merged).map(Some)
            }
        }
    }
}

/// Put `value` at `key` of a container value
fn assign(parent: &mut Value, key: &str, value: Value) -> Option<()> {
    match parent {
        Value::Object(map) => {
            map.insert(key.to_string(), value);
            Some(())
        }
        Value::Array(items) => {
            let index = key.parse::<usize>().ok()?;
            if index < items.len() {
                items[index] = value;
            } else if index == items.len() {
                items.push(value);
            } else {
                return None;
            }
            Some(())
        }
        _ => None,
    }
}
