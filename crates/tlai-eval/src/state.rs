//! TLA+ states: variable-to-value assignments
//!
//! A state maps every declared variable to a value or to the explicit
//! `Unassigned` sentinel. During next-state evaluation the state also
//! carries primed copies under keys like `x'`; `deprime` turns the
//! primed half back into an unprimed successor state.
//!
//! States are persistent (`im::OrdMap`), so evaluation branches fork in
//! O(log n) per update, and identified by a 64-bit FP64 fingerprint over
//! name/value pairs in name order.

use crate::fingerprint::{self, tags, FP64_INIT};
use crate::value::Value;
use im::OrdMap;
use std::fmt;
use std::sync::Arc;

/// A 64-bit state fingerprint
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Fingerprint(pub u64);

impl fmt::Debug for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FP({:016x})", self.0)
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

/// A variable slot: bound to a value, or not yet
#[derive(Clone, PartialEq)]
pub enum Binding {
    Assigned(Value),
    Unassigned,
}

impl Binding {
    pub fn value(&self) -> Option<&Value> {
        match self {
            Binding::Assigned(v) => Some(v),
            Binding::Unassigned => None,
        }
    }
}

/// A (possibly partial) assignment of variables to values
#[derive(Clone)]
pub struct State {
    vars: OrdMap<Arc<str>, Binding>,
}

impl State {
    /// An empty state with no variables at all
    pub fn empty() -> Self {
        State { vars: OrdMap::new() }
    }

    /// A state with every named variable unassigned
    pub fn unassigned(names: impl IntoIterator<Item = Arc<str>>) -> Self {
        State {
            vars: names
                .into_iter()
                .map(|n| (n, Binding::Unassigned))
                .collect(),
        }
    }

    /// A total state from name/value pairs
    pub fn from_pairs(pairs: impl IntoIterator<Item = (Arc<str>, Value)>) -> Self {
        State {
            vars: pairs
                .into_iter()
                .map(|(n, v)| (n, Binding::Assigned(v)))
                .collect(),
        }
    }

    pub fn has(&self, name: &str) -> bool {
        self.vars.contains_key(name)
    }

    /// The bound value of `name`, if assigned
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.vars.get(name).and_then(|b| b.value())
    }

    pub fn is_assigned(&self, name: &str) -> bool {
        matches!(self.vars.get(name), Some(Binding::Assigned(_)))
    }

    /// A copy with `name` bound to `value`
    pub fn with_var(&self, name: impl Into<Arc<str>>, value: Value) -> State {
        State {
            vars: self.vars.update(name.into(), Binding::Assigned(value)),
        }
    }

    /// A copy with an unassigned slot for `name`
    pub fn with_unassigned(&self, name: impl Into<Arc<str>>) -> State {
        State {
            vars: self.vars.update(name.into(), Binding::Unassigned),
        }
    }

    /// Variables (name, binding) in name order
    pub fn iter(&self) -> impl Iterator<Item = (&Arc<str>, &Binding)> {
        self.vars.iter()
    }

    /// Assigned (name, value) pairs in name order
    pub fn assigned(&self) -> impl Iterator<Item = (&Arc<str>, &Value)> {
        self.vars.iter().filter_map(|(n, b)| b.value().map(|v| (n, v)))
    }

    /// Names whose slot is unassigned
    pub fn unassigned_names(&self) -> impl Iterator<Item = &Arc<str>> {
        self.vars.iter().filter_map(|(n, b)| match b {
            Binding::Unassigned => Some(n),
            Binding::Assigned(_) => None,
        })
    }

    /// Names of primed slots (keys ending in `'`)
    pub fn primed_names(&self) -> impl Iterator<Item = &Arc<str>> {
        self.vars.keys().filter(|n| n.ends_with('\''))
    }

    /// Drop unprimed entries and strip the prime from the rest,
    /// producing the successor state
    pub fn deprime(&self) -> State {
        let vars = self
            .vars
            .iter()
            .filter_map(|(name, binding)| {
                name.strip_suffix('\'')
                    .map(|base| (Arc::from(base), binding.clone()))
            })
            .collect();
        State { vars }
    }

    /// FP64 fingerprint over name/value-fingerprint pairs in name order
    pub fn fingerprint(&self) -> Fingerprint {
        let mut fp = FP64_INIT;
        for (name, binding) in self.vars.iter() {
            fp = fingerprint::extend_str(fp, name);
            match binding {
                Binding::Assigned(v) => fp = fingerprint::extend_u64(fp, v.fingerprint()),
                Binding::Unassigned => fp = fingerprint::extend_i64(fp, tags::UNASSIGNED),
            }
        }
        Fingerprint(fp)
    }
}

impl PartialEq for State {
    fn eq(&self, other: &Self) -> bool {
        self.fingerprint() == other.fingerprint()
    }
}

impl Eq for State {}

impl fmt::Debug for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (name, binding)) in self.vars.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            match binding {
                Binding::Assigned(v) => write!(f, "/\\ {} = {}", name, v)?,
                Binding::Unassigned => write!(f, "/\\ {} = ?", name)?,
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn name(s: &str) -> Arc<str> {
        Arc::from(s)
    }

    #[test]
    fn unassigned_state_has_all_slots() {
        let s = State::unassigned([name("x"), name("y")]);
        assert!(s.has("x"));
        assert!(s.has("y"));
        assert!(!s.is_assigned("x"));
        assert_eq!(s.get("x"), None);
    }

    #[test]
    fn with_var_is_persistent() {
        let s = State::unassigned([name("x")]);
        let t = s.with_var("x", Value::int(1));
        assert!(!s.is_assigned("x"));
        assert_eq!(t.get("x"), Some(&Value::int(1)));
    }

    #[test]
    fn deprime_keeps_only_primed_renamed() {
        let s = State::from_pairs([(name("x"), Value::int(0)), (name("y"), Value::int(9))])
            .with_var("x'", Value::int(1))
            .with_var("y'", Value::int(9));
        let succ = s.deprime();
        assert_eq!(succ.get("x"), Some(&Value::int(1)));
        assert_eq!(succ.get("y"), Some(&Value::int(9)));
        assert!(!succ.has("x'"));
        assert_eq!(succ.iter().count(), 2);
    }

    #[test]
    fn fingerprint_is_order_insensitive_in_construction() {
        let a = State::from_pairs([(name("x"), Value::int(1)), (name("y"), Value::int(2))]);
        let b = State::from_pairs([(name("y"), Value::int(2)), (name("x"), Value::int(1))]);
        assert_eq!(a.fingerprint(), b.fingerprint());
    }

    #[test]
    fn fingerprint_distinguishes_values_and_names() {
        let a = State::from_pairs([(name("x"), Value::int(1))]);
        let b = State::from_pairs([(name("x"), Value::int(2))]);
        let c = State::from_pairs([(name("y"), Value::int(1))]);
        assert_ne!(a.fingerprint(), b.fingerprint());
        assert_ne!(a.fingerprint(), c.fingerprint());
    }

    #[test]
    fn unassigned_differs_from_any_value() {
        let a = State::unassigned([name("x")]);
        let b = a.with_var("x", Value::int(0));
        assert_ne!(a.fingerprint(), b.fingerprint());
    }

    #[test]
    fn display_is_tlc_style() {
        let s = State::from_pairs([(name("x"), Value::int(1))]);
        assert_eq!(s.to_string(), "/\\ x = 1");
    }
}
