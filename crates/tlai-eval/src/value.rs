//! Runtime values for TLA+ evaluation
//!
//! Values are immutable and shared via `Arc`, so cloning is cheap and
//! branch forking never copies payloads. Equality is fingerprint
//! equality throughout: sets and function domains have no meaningful
//! internal order, so structural comparison would be wrong as well as
//! slow.
//!
//! | TLA+ value | Representation |
//! |------------|----------------|
//! | BOOLEAN    | `Value::Bool`  |
//! | Int        | `Value::Int(BigInt)` |
//! | STRING     | `Value::Str(Arc<str>)` |
//! | Set        | `Value::Set(SetValue)` — fingerprint-sorted, uniqued |
//! | Tuple/Seq  | `Value::Tuple(Arc<[Value]>)` — 1-indexed |
//! | Function   | `Value::Fcn(FcnValue)` — parallel domain/range arrays |
//! | Record     | `Value::Fcn` whose domain is all strings |
//!
//! Tuples and functions over a `1..n` integer domain denote the same
//! TLA+ value, so they share a fingerprint; `to_fcn`/`to_tuple` convert
//! between the representations without changing identity.

use crate::error::{EvalError, EvalResult};
use crate::fingerprint::{self, tags, FP64_INIT};
use num_bigint::BigInt;
use num_traits::ToPrimitive;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, OnceLock};

/// A TLA+ runtime value
#[derive(Clone)]
pub enum Value {
    /// TRUE or FALSE
    Bool(bool),
    /// Arbitrary-precision integer
    Int(BigInt),
    /// String (doubles as record field key)
    Str(Arc<str>),
    /// Finite set, uniqued by fingerprint
    Set(SetValue),
    /// Tuple / sequence, 1-indexed
    Tuple(Arc<[Value]>),
    /// Function or record
    Fcn(FcnValue),
}

impl Value {
    pub fn int(n: impl Into<BigInt>) -> Value {
        Value::Int(n.into())
    }

    pub fn str(s: impl AsRef<str>) -> Value {
        Value::Str(Arc::from(s.as_ref()))
    }

    pub fn tuple(elems: Vec<Value>) -> Value {
        Value::Tuple(Arc::from(elems))
    }

    pub fn set(elems: impl IntoIterator<Item = Value>) -> Value {
        Value::Set(SetValue::from_iter(elems))
    }

    /// The name of this value's variant, for error messages
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Bool(_) => "boolean",
            Value::Int(_) => "integer",
            Value::Str(_) => "string",
            Value::Set(_) => "set",
            Value::Tuple(_) => "tuple",
            Value::Fcn(f) if f.is_record() => "record",
            Value::Fcn(_) => "function",
        }
    }

    /// Canonical 64-bit fingerprint; the sole basis for value equality
    pub fn fingerprint(&self) -> u64 {
        match self {
            Value::Bool(b) => {
                let fp = fingerprint::extend_i64(FP64_INIT, tags::BOOL);
                fingerprint::extend_byte(fp, *b as u8)
            }
            Value::Int(n) => {
                let fp = fingerprint::extend_i64(FP64_INIT, tags::INT);
                fingerprint::extend_bigint(fp, n)
            }
            Value::Str(s) => {
                let fp = fingerprint::extend_i64(FP64_INIT, tags::STR);
                fingerprint::extend_str(fp, s)
            }
            Value::Set(s) => s.fingerprint(),
            Value::Tuple(elems) => tuple_fingerprint(elems.iter()),
            Value::Fcn(f) => f.fingerprint(),
        }
    }

    pub fn as_bool(&self) -> EvalResult<bool> {
        match self {
            Value::Bool(b) => Ok(*b),
            other => Err(EvalError::type_error("boolean", other, None)),
        }
    }

    pub fn as_int(&self) -> EvalResult<&BigInt> {
        match self {
            Value::Int(n) => Ok(n),
            other => Err(EvalError::type_error("integer", other, None)),
        }
    }

    pub fn as_set(&self) -> EvalResult<&SetValue> {
        match self {
            Value::Set(s) => Ok(s),
            other => Err(EvalError::type_error("set", other, None)),
        }
    }

    /// View this value as a sequence: tuples directly, functions via
    /// their `1..n` integer domain
    pub fn as_seq(&self) -> EvalResult<Vec<Value>> {
        match self {
            Value::Tuple(elems) => Ok(elems.to_vec()),
            Value::Fcn(f) => f
                .to_tuple()
                .ok_or_else(|| EvalError::type_error("sequence", self, None)),
            other => Err(EvalError::type_error("sequence", other, None)),
        }
    }

    /// Apply this value as a function to `arg`
    pub fn apply(&self, arg: &Value) -> EvalResult<Value> {
        match self {
            Value::Fcn(f) => f.apply(arg).cloned().ok_or_else(|| EvalError::DomainError {
                arg: arg.to_string(),
                span: None,
            }),
            Value::Tuple(elems) => {
                let idx = tuple_index(arg, elems.len())?;
                Ok(elems[idx].clone())
            }
            other => Err(EvalError::type_error("function", other, None)),
        }
    }

    /// Apply along a path of arguments, recursively
    pub fn apply_path(&self, args: &[Value]) -> EvalResult<Value> {
        match args.split_first() {
            None => Ok(self.clone()),
            Some((head, rest)) => self.apply(head)?.apply_path(rest),
        }
    }

    /// Return a copy with `arg` remapped to `value`
    pub fn update(&self, arg: &Value, value: Value) -> EvalResult<Value> {
        match self {
            Value::Fcn(f) => Ok(Value::Fcn(f.update(arg, value))),
            Value::Tuple(elems) => {
                let idx = tuple_index(arg, elems.len())?;
                let mut out = elems.to_vec();
                out[idx] = value;
                Ok(Value::tuple(out))
            }
            other => Err(EvalError::type_error("function", other, None)),
        }
    }

    /// Nested update: replace the value reached through `args`
    pub fn update_path(&self, args: &[Value], value: Value) -> EvalResult<Value> {
        match args.split_first() {
            None => Ok(value),
            Some((head, rest)) => {
                let inner = self.apply(head)?.update_path(rest, value)?;
                self.update(head, inner)
            }
        }
    }

    /// View this value as a function: tuples become the function with
    /// domain `{1..n}`
    pub fn to_fcn(&self) -> EvalResult<FcnValue> {
        match self {
            Value::Fcn(f) => Ok(f.clone()),
            Value::Tuple(elems) => Ok(FcnValue::from_pairs(
                elems
                    .iter()
                    .enumerate()
                    .map(|(i, e)| (Value::int(i as i64 + 1), e.clone())),
            )),
            other => Err(EvalError::type_error("function", other, None)),
        }
    }

    /// The DOMAIN of this value
    pub fn domain(&self) -> EvalResult<SetValue> {
        match self {
            Value::Fcn(f) => Ok(f.domain_set()),
            Value::Tuple(elems) => Ok(SetValue::from_iter(
                (1..=elems.len() as i64).map(Value::int),
            )),
            other => Err(EvalError::type_error("function", other, None)),
        }
    }
}

/// 1-indexed tuple access; errors outside `1..=len`
fn tuple_index(arg: &Value, len: usize) -> EvalResult<usize> {
    let n = arg.as_int()?;
    match n.to_usize() {
        Some(i) if i >= 1 && i <= len => Ok(i - 1),
        _ => Err(EvalError::DomainError {
            arg: arg.to_string(),
            span: None,
        }),
    }
}

fn tuple_fingerprint<'a>(elems: impl Iterator<Item = &'a Value>) -> u64 {
    let mut fp = fingerprint::extend_i64(FP64_INIT, tags::TUPLE);
    let mut len = 0i64;
    let mut body = Vec::new();
    for e in elems {
        body.push(e.fingerprint());
        len += 1;
    }
    fp = fingerprint::extend_i64(fp, len);
    for child in body {
        fp = fingerprint::extend_u64(fp, child);
    }
    fp
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.fingerprint() == other.fingerprint()
    }
}

impl Eq for Value {}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u64(self.fingerprint());
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Bool(true) => write!(f, "TRUE"),
            Value::Bool(false) => write!(f, "FALSE"),
            Value::Int(n) => write!(f, "{}", n),
            Value::Str(s) => write!(f, "\"{}\"", s),
            Value::Set(s) => {
                write!(f, "{{")?;
                for (i, e) in s.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", e)?;
                }
                write!(f, "}}")
            }
            Value::Tuple(elems) => {
                write!(f, "<<")?;
                for (i, e) in elems.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", e)?;
                }
                write!(f, ">>")
            }
            Value::Fcn(fv) => fv.fmt(f),
        }
    }
}

// ============================================================================
// Sets
// ============================================================================

/// A finite set: elements sorted by fingerprint, uniqued by fingerprint
/// at construction
#[derive(Clone)]
pub struct SetValue {
    elems: Arc<[Value]>,
    /// Pure cache; copied on clone so it propagates through forks
    cached_fp: OnceLock<u64>,
}

impl SetValue {
    /// The empty set
    pub fn empty() -> Self {
        SetValue {
            elems: Arc::from([]),
            cached_fp: OnceLock::new(),
        }
    }

    /// Build from an iterator, sorting and deduplicating by fingerprint
    #[allow(clippy::should_implement_trait)]
    pub fn from_iter(iter: impl IntoIterator<Item = Value>) -> Self {
        let mut keyed: Vec<(u64, Value)> =
            iter.into_iter().map(|v| (v.fingerprint(), v)).collect();
        keyed.sort_by_key(|(fp, _)| *fp);
        keyed.dedup_by_key(|(fp, _)| *fp);
        SetValue {
            elems: keyed.into_iter().map(|(_, v)| v).collect(),
            cached_fp: OnceLock::new(),
        }
    }

    /// Build from a slice already sorted and deduplicated by fingerprint
    fn from_sorted_unchecked(elems: Arc<[Value]>) -> Self {
        SetValue {
            elems,
            cached_fp: OnceLock::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.elems.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elems.is_empty()
    }

    /// Elements in fingerprint order (stable per run)
    pub fn iter(&self) -> std::slice::Iter<'_, Value> {
        self.elems.iter()
    }

    pub fn elems(&self) -> &[Value] {
        &self.elems
    }

    /// Membership by fingerprint (binary search)
    pub fn contains(&self, v: &Value) -> bool {
        let fp = v.fingerprint();
        self.elems.binary_search_by_key(&fp, |e| e.fingerprint()).is_ok()
    }

    /// Set union (merge of two fingerprint-sorted sequences)
    pub fn union(&self, other: &SetValue) -> SetValue {
        if self.is_empty() {
            return other.clone();
        }
        if other.is_empty() {
            return self.clone();
        }
        let mut out = Vec::with_capacity(self.len() + other.len());
        let mut i = 0;
        let mut j = 0;
        let a = self.elems();
        let b = other.elems();
        while i < a.len() && j < b.len() {
            match a[i].fingerprint().cmp(&b[j].fingerprint()) {
                std::cmp::Ordering::Less => {
                    out.push(a[i].clone());
                    i += 1;
                }
                std::cmp::Ordering::Greater => {
                    out.push(b[j].clone());
                    j += 1;
                }
                std::cmp::Ordering::Equal => {
                    out.push(a[i].clone());
                    i += 1;
                    j += 1;
                }
            }
        }
        out.extend_from_slice(&a[i..]);
        out.extend_from_slice(&b[j..]);
        SetValue::from_sorted_unchecked(Arc::from(out))
    }

    /// Set intersection
    pub fn intersection(&self, other: &SetValue) -> SetValue {
        let out: Vec<Value> = self
            .iter()
            .filter(|e| other.contains(e))
            .cloned()
            .collect();
        SetValue::from_sorted_unchecked(Arc::from(out))
    }

    /// Set difference (self minus other)
    pub fn difference(&self, other: &SetValue) -> SetValue {
        let out: Vec<Value> = self
            .iter()
            .filter(|e| !other.contains(e))
            .cloned()
            .collect();
        SetValue::from_sorted_unchecked(Arc::from(out))
    }

    pub fn fingerprint(&self) -> u64 {
        *self.cached_fp.get_or_init(|| {
            let mut fp = fingerprint::extend_i64(FP64_INIT, tags::SET);
            fp = fingerprint::extend_i64(fp, self.elems.len() as i64);
            for e in self.elems.iter() {
                fp = fingerprint::extend_u64(fp, e.fingerprint());
            }
            fp
        })
    }
}

impl fmt::Debug for SetValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (i, e) in self.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", e)?;
        }
        write!(f, "}}")
    }
}

impl From<SetValue> for Value {
    fn from(s: SetValue) -> Value {
        Value::Set(s)
    }
}

impl From<FcnValue> for Value {
    fn from(f: FcnValue) -> Value {
        Value::Fcn(f)
    }
}

// ============================================================================
// Functions and records
// ============================================================================

/// A function as parallel domain/range arrays, sorted by domain-element
/// fingerprint. A record is a function whose domain is all strings.
#[derive(Clone)]
pub struct FcnValue {
    domain: Arc<[Value]>,
    range: Arc<[Value]>,
    cached_fp: OnceLock<u64>,
}

impl FcnValue {
    /// The empty function (also the empty sequence and empty record)
    pub fn empty() -> Self {
        FcnValue {
            domain: Arc::from([]),
            range: Arc::from([]),
            cached_fp: OnceLock::new(),
        }
    }

    /// Build from key/value pairs; keys are sorted and uniqued by
    /// fingerprint, first occurrence winning
    pub fn from_pairs(pairs: impl IntoIterator<Item = (Value, Value)>) -> Self {
        let mut keyed: Vec<(u64, Value, Value)> = pairs
            .into_iter()
            .map(|(k, v)| (k.fingerprint(), k, v))
            .collect();
        keyed.sort_by_key(|(fp, _, _)| *fp);
        keyed.dedup_by_key(|(fp, _, _)| *fp);
        let mut domain = Vec::with_capacity(keyed.len());
        let mut range = Vec::with_capacity(keyed.len());
        for (_, k, v) in keyed {
            domain.push(k);
            range.push(v);
        }
        FcnValue {
            domain: Arc::from(domain),
            range: Arc::from(range),
            cached_fp: OnceLock::new(),
        }
    }

    /// Build a record from field/value pairs
    pub fn record(fields: impl IntoIterator<Item = (String, Value)>) -> Self {
        FcnValue::from_pairs(fields.into_iter().map(|(k, v)| (Value::str(k), v)))
    }

    pub fn len(&self) -> usize {
        self.domain.len()
    }

    pub fn is_empty(&self) -> bool {
        self.domain.is_empty()
    }

    /// Whether this function is a record (non-empty, all-string domain)
    pub fn is_record(&self) -> bool {
        !self.domain.is_empty() && self.domain.iter().all(|k| matches!(k, Value::Str(_)))
    }

    /// Domain elements in fingerprint order
    pub fn domain_elems(&self) -> &[Value] {
        &self.domain
    }

    /// Range values, parallel to `domain_elems`
    pub fn values(&self) -> &[Value] {
        &self.range
    }

    pub fn pairs(&self) -> impl Iterator<Item = (&Value, &Value)> {
        self.domain.iter().zip(self.range.iter())
    }

    /// The domain as a set (already fingerprint-sorted and unique)
    pub fn domain_set(&self) -> SetValue {
        SetValue::from_sorted_unchecked(Arc::clone(&self.domain))
    }

    /// Look up `arg` in the domain by fingerprint
    pub fn apply(&self, arg: &Value) -> Option<&Value> {
        let fp = arg.fingerprint();
        self.domain
            .binary_search_by_key(&fp, |k| k.fingerprint())
            .ok()
            .map(|i| &self.range[i])
    }

    /// Replace or insert one mapping
    pub fn update(&self, arg: &Value, value: Value) -> FcnValue {
        let fp = arg.fingerprint();
        match self.domain.binary_search_by_key(&fp, |k| k.fingerprint()) {
            Ok(i) => {
                let mut range = self.range.to_vec();
                range[i] = value;
                FcnValue {
                    domain: Arc::clone(&self.domain),
                    range: Arc::from(range),
                    cached_fp: OnceLock::new(),
                }
            }
            Err(i) => {
                let mut domain = self.domain.to_vec();
                let mut range = self.range.to_vec();
                domain.insert(i, arg.clone());
                range.insert(i, value);
                FcnValue {
                    domain: Arc::from(domain),
                    range: Arc::from(range),
                    cached_fp: OnceLock::new(),
                }
            }
        }
    }

    /// Merge with `other`: domain union, self's values win on overlap
    pub fn compose(&self, other: &FcnValue) -> FcnValue {
        let mut pairs: Vec<(Value, Value)> = self
            .pairs()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        for (k, v) in other.pairs() {
            if self.apply(k).is_none() {
                pairs.push((k.clone(), v.clone()));
            }
        }
        FcnValue::from_pairs(pairs)
    }

    /// Convert to a tuple if the domain is exactly `{1..n}`
    pub fn to_tuple(&self) -> Option<Vec<Value>> {
        let mut indexed: Vec<(usize, &Value)> = Vec::with_capacity(self.len());
        for (k, v) in self.pairs() {
            match k {
                Value::Int(n) => indexed.push((n.to_usize()?, v)),
                _ => return None,
            }
        }
        indexed.sort_by_key(|(i, _)| *i);
        for (pos, (i, _)) in indexed.iter().enumerate() {
            if *i != pos + 1 {
                return None;
            }
        }
        Some(indexed.into_iter().map(|(_, v)| v.clone()).collect())
    }

    pub fn fingerprint(&self) -> u64 {
        *self.cached_fp.get_or_init(|| {
            // Functions over 1..n fingerprint as the equal tuple
            if let Some(seq) = self.to_tuple() {
                return tuple_fingerprint(seq.iter());
            }
            let mut fp = fingerprint::extend_i64(FP64_INIT, tags::FCN);
            fp = fingerprint::extend_i64(fp, self.len() as i64);
            for (k, v) in self.pairs() {
                fp = fingerprint::extend_u64(fp, k.fingerprint());
                fp = fingerprint::extend_u64(fp, v.fingerprint());
            }
            fp
        })
    }
}

impl fmt::Display for FcnValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return write!(f, "<<>>");
        }
        if self.is_record() {
            write!(f, "[")?;
            for (i, (k, v)) in self.pairs().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                match k {
                    Value::Str(s) => write!(f, "{} |-> {}", s, v)?,
                    _ => unreachable!("record keys are strings"),
                }
            }
            write!(f, "]")
        } else {
            write!(f, "(")?;
            for (i, (k, v)) in self.pairs().enumerate() {
                if i > 0 {
                    write!(f, " @@ ")?;
                }
                write!(f, "{} :> {}", k, v)?;
            }
            write!(f, ")")
        }
    }
}

impl fmt::Debug for FcnValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn iset(values: &[i64]) -> SetValue {
        SetValue::from_iter(values.iter().map(|&v| Value::int(v)))
    }

    #[test]
    fn set_construction_dedupes() {
        let s = iset(&[1, 2, 2, 3, 1]);
        assert_eq!(s.len(), 3);
    }

    #[test]
    fn set_equality_ignores_order() {
        let a = iset(&[1, 2, 3]);
        let b = iset(&[3, 1, 2]);
        assert_eq!(a.fingerprint(), b.fingerprint());
    }

    #[test]
    fn set_ops() {
        let a = iset(&[1, 2, 3]);
        let b = iset(&[2, 3, 4]);
        assert_eq!(a.union(&b).len(), 4);
        assert_eq!(a.intersection(&b).len(), 2);
        assert_eq!(a.difference(&b).len(), 1);
        assert!(a.contains(&Value::int(2)));
        assert!(!a.contains(&Value::int(9)));
    }

    #[test]
    fn union_commutes_by_fingerprint() {
        let a = iset(&[1, 5, 9]);
        let b = iset(&[2, 5]);
        assert_eq!(a.union(&b).fingerprint(), b.union(&a).fingerprint());
    }

    #[test]
    fn nested_set_equality() {
        let a = Value::set([Value::set([Value::int(1), Value::int(2)])]);
        let b = Value::set([Value::set([Value::int(2), Value::int(1)])]);
        assert_eq!(a, b);
    }

    #[test]
    fn fcn_apply_and_update() {
        let f = FcnValue::from_pairs([
            (Value::int(1), Value::str("a")),
            (Value::int(2), Value::str("b")),
        ]);
        assert_eq!(f.apply(&Value::int(1)), Some(&Value::str("a")));
        assert_eq!(f.apply(&Value::int(3)), None);

        let g = f.update(&Value::int(2), Value::str("c"));
        assert_eq!(g.apply(&Value::int(2)), Some(&Value::str("c")));
        // Original is untouched
        assert_eq!(f.apply(&Value::int(2)), Some(&Value::str("b")));
    }

    #[test]
    fn fcn_self_update_is_identity() {
        let f = FcnValue::from_pairs([
            (Value::int(1), Value::int(10)),
            (Value::int(2), Value::int(20)),
        ]);
        let g = f.update(&Value::int(1), f.apply(&Value::int(1)).unwrap().clone());
        assert_eq!(f.fingerprint(), g.fingerprint());
    }

    #[test]
    fn fcn_compose_left_wins() {
        let f = FcnValue::from_pairs([(Value::int(1), Value::str("f"))]);
        let g = FcnValue::from_pairs([
            (Value::int(1), Value::str("g")),
            (Value::int(2), Value::str("g")),
        ]);
        let h = f.compose(&g);
        assert_eq!(h.len(), 2);
        assert_eq!(h.apply(&Value::int(1)), Some(&Value::str("f")));
        assert_eq!(h.apply(&Value::int(2)), Some(&Value::str("g")));
    }

    #[test]
    fn record_is_fcn_with_string_domain() {
        let r = FcnValue::record([("a".to_string(), Value::int(1))]);
        assert!(r.is_record());
        assert_eq!(r.apply(&Value::str("a")), Some(&Value::int(1)));

        // Built as a plain function, it is still the same value
        let f = FcnValue::from_pairs([(Value::str("a"), Value::int(1))]);
        assert_eq!(r.fingerprint(), f.fingerprint());
    }

    #[test]
    fn tuple_and_integral_fcn_share_fingerprint() {
        let t = Value::tuple(vec![Value::str("x"), Value::str("y")]);
        let f = Value::Fcn(FcnValue::from_pairs([
            (Value::int(1), Value::str("x")),
            (Value::int(2), Value::str("y")),
        ]));
        assert_eq!(t, f);
    }

    #[test]
    fn to_tuple_requires_one_based_contiguous_domain() {
        let f = FcnValue::from_pairs([
            (Value::int(2), Value::str("b")),
            (Value::int(1), Value::str("a")),
        ]);
        assert_eq!(
            f.to_tuple(),
            Some(vec![Value::str("a"), Value::str("b")])
        );

        let g = FcnValue::from_pairs([(Value::int(0), Value::str("z"))]);
        assert_eq!(g.to_tuple(), None);

        let r = FcnValue::record([("a".to_string(), Value::int(1))]);
        assert_eq!(r.to_tuple(), None);
    }

    #[test]
    fn tuple_apply_is_one_indexed() {
        let t = Value::tuple(vec![Value::int(10), Value::int(20)]);
        assert_eq!(t.apply(&Value::int(1)).unwrap(), Value::int(10));
        assert_eq!(t.apply(&Value::int(2)).unwrap(), Value::int(20));
        assert!(t.apply(&Value::int(0)).is_err());
        assert!(t.apply(&Value::int(3)).is_err());
    }

    #[test]
    fn update_path_nested() {
        let inner = FcnValue::record([("a".to_string(), Value::int(0))]);
        let outer = FcnValue::from_pairs([(Value::int(1), Value::Fcn(inner))]);
        let updated = Value::Fcn(outer)
            .update_path(&[Value::int(1), Value::str("a")], Value::int(9))
            .unwrap();
        assert_eq!(
            updated.apply_path(&[Value::int(1), Value::str("a")]).unwrap(),
            Value::int(9)
        );
    }

    #[test]
    fn display_forms() {
        assert_eq!(Value::Bool(true).to_string(), "TRUE");
        assert_eq!(Value::int(5).to_string(), "5");
        assert_eq!(Value::str("hi").to_string(), "\"hi\"");
        assert_eq!(
            Value::tuple(vec![Value::int(1), Value::int(2)]).to_string(),
            "<<1, 2>>"
        );
        let r = Value::Fcn(FcnValue::record([
            ("a".to_string(), Value::int(1)),
            ("b".to_string(), Value::int(2)),
        ]));
        assert_eq!(r.to_string(), "[a |-> 1, b |-> 2]");
    }

    #[test]
    fn deep_clone_preserves_fingerprint() {
        let v = Value::set([
            Value::tuple(vec![Value::int(1), Value::str("x")]),
            Value::Fcn(FcnValue::record([("f".to_string(), Value::Bool(true))])),
        ]);
        let clone = v.clone();
        assert_eq!(v.fingerprint(), clone.fingerprint());
    }
}
