//! Guard obligations and the null-propagation wrapper around generated statements.
//!
//! A statement is emitted in two phases. Map elements it touches are materialized
//! first (fetched, or created and inserted when absent); then a single presence test
//! over every obligation wraps the statement itself.

use crate::emit::Emitter;
use std::collections::{BTreeMap, BTreeSet};

/// A lazily fetched-or-created map entry bound to a synthetic variable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementGuard {
    /// Allocation order; an element always depends only on lower ids.
    pub id: usize,
    pub var: String,
    pub map: String,
    pub key: String,
    /// Declared type of the variable.
    pub ty: String,
    /// Default-constructible implementation used on a miss.
    pub constructor: String,
    /// Obligations of the map and key expressions.
    pub requires: GuardSet,
}

/// A set of guard obligations: plain values that must be non-null, and map elements.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GuardSet {
    values: BTreeSet<String>,
    elements: BTreeMap<usize, ElementGuard>,
}

impl GuardSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn value(name: impl Into<String>) -> Self {
        let mut set = GuardSet::new();
        set.values.insert(name.into());
        set
    }

    pub fn element(guard: ElementGuard) -> Self {
        let mut set = GuardSet::new();
        set.elements.insert(guard.id, guard);
        set
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty() && self.elements.is_empty()
    }

    pub fn values(&self) -> impl Iterator<Item = &str> {
        self.values.iter().map(String::as_str)
    }

    pub fn union(mut self, other: GuardSet) -> Self {
        self.values.extend(other.values);
        self.elements.extend(other.elements);
        self
    }

    /// The element obligations alone.
    pub fn elements_only(&self) -> GuardSet {
        GuardSet { values: BTreeSet::new(), elements: self.elements.clone() }
    }

    /// Drop `Value` obligations on names that are always present, at every depth.
    pub fn without(mut self, always_present: impl Fn(&str) -> bool + Copy) -> Self {
        self.values.retain(|v| !always_present(v));
        for element in self.elements.values_mut() {
            let requires = std::mem::take(&mut element.requires);
            element.requires = requires.without(always_present);
        }
        self
    }

    /// Every element this set depends on, directly or through other elements, by id.
    fn all_elements(&self) -> BTreeMap<usize, &ElementGuard> {
        let mut out = BTreeMap::new();
        let mut pending: Vec<&ElementGuard> = self.elements.values().collect();
        while let Some(e) = pending.pop() {
            if out.insert(e.id, e).is_none() {
                pending.extend(e.requires.elements.values());
            }
        }
        out
    }

    /// The conjunctive presence test, or `None` when nothing needs testing.
    pub fn presence_test(&self) -> Option<String> {
        let mut tests: Vec<(&str, &str)> = self.values.iter().map(|v| (v.as_str(), "null")).collect();
        tests.extend(self.elements.values().map(|e| (e.var.as_str(), "undefined")));
        if tests.is_empty() {
            return None;
        }
        tests.sort();
        Some(
            tests
                .iter()
                .map(|(v, bad)| format!("({} != {})", v, bad))
                .collect::<Vec<_>>()
                .join(" && "),
        )
    }

    /// Fetch or create every element, dependencies first.
    pub fn materialize(&self, out: &mut Emitter) {
        for e in self.all_elements().into_values() {
            out.line(format!("let {}: {} | undefined;", e.var, e.ty));
            let fetch = |out: &mut Emitter| {
                out.line(format!("{} = {}.get({});", e.var, e.map, e.key));
                out.block(format!("if ({} == undefined) {{", e.var), |out| {
                    out.line(format!("{} = new {}();", e.var, e.constructor));
                    out.line(format!("{}.set({}, {});", e.map, e.key, e.var));
                });
            };
            match e.requires.presence_test() {
                Some(test) => out.block(format!("if ({}) {{", test), fetch),
                None => fetch(out),
            }
        }
    }
}

/// Emit `body` so that it runs only once every obligation in `guards` holds.
pub fn emit_guarded<T>(out: &mut Emitter, guards: &GuardSet, body: impl FnOnce(&mut Emitter) -> T) -> T {
    guards.materialize(out);
    emit_tested(out, guards, body)
}

/// [`emit_guarded`] for obligations whose elements an enclosing statement already materialized.
pub fn emit_tested<T>(out: &mut Emitter, guards: &GuardSet, body: impl FnOnce(&mut Emitter) -> T) -> T {
    match guards.presence_test() {
        Some(test) => out.block(format!("if ({}) {{", test), body),
        None => body(out),
    }
}
