//! Informal Trace Format (ITF) serialization
//!
//! Every value serializes wrapped as `{"#type": T, "#value": v}` with
//! `T` one of `int`, `bool`, `string`, `set`, `tup`, `record`, `map`.
//! A state is a JSON object mapping variable names to ITF values; keys
//! come out sorted because states iterate in name order. Set elements
//! serialize in fingerprint order, the canonical order of `SetValue`.
//!
//! `value_from_itf`/`state_from_itf` read the same convention back,
//! which is how the CLI accepts a state for `next`.

use crate::state::State;
use crate::value::{FcnValue, SetValue, Value};
use num_bigint::BigInt;
use num_traits::ToPrimitive;
use serde_json::{json, Map, Value as Json};
use std::sync::Arc;
use thiserror::Error;

/// Malformed ITF input
#[derive(Debug, Clone, Error)]
#[error("invalid ITF: {message}")]
pub struct ItfError {
    pub message: String,
}

fn err(message: impl Into<String>) -> ItfError {
    ItfError {
        message: message.into(),
    }
}

/// Serialize a value to its ITF wrapping
pub fn value_to_itf(value: &Value) -> Json {
    match value {
        Value::Bool(b) => json!({ "#type": "bool", "#value": b }),
        Value::Int(n) => {
            let v = match n.to_i64() {
                Some(i) => json!(i),
                None => json!(n.to_string()),
            };
            json!({ "#type": "int", "#value": v })
        }
        Value::Str(s) => json!({ "#type": "string", "#value": &**s }),
        Value::Set(s) => {
            let elems: Vec<Json> = s.iter().map(value_to_itf).collect();
            json!({ "#type": "set", "#value": elems })
        }
        Value::Tuple(elems) => {
            let elems: Vec<Json> = elems.iter().map(value_to_itf).collect();
            json!({ "#type": "tup", "#value": elems })
        }
        Value::Fcn(f) if f.is_record() => {
            let mut fields = Map::new();
            for (k, v) in f.pairs() {
                let Value::Str(name) = k else {
                    unreachable!("record keys are strings")
                };
                fields.insert(name.to_string(), value_to_itf(v));
            }
            json!({ "#type": "record", "#value": fields })
        }
        Value::Fcn(f) => {
            let pairs: Vec<Json> = f
                .pairs()
                .map(|(k, v)| json!([value_to_itf(k), value_to_itf(v)]))
                .collect();
            json!({ "#type": "map", "#value": pairs })
        }
    }
}

/// Serialize a total state: `{"x": {...}, "y": {...}}` with sorted keys
pub fn state_to_itf(state: &State) -> Result<Json, ItfError> {
    let mut out = Map::new();
    for (name, binding) in state.iter() {
        match binding.value() {
            Some(v) => {
                out.insert(name.to_string(), value_to_itf(v));
            }
            None => return Err(err(format!("variable {} is unassigned", name))),
        }
    }
    Ok(Json::Object(out))
}

/// Read a value back from its ITF wrapping
pub fn value_from_itf(json: &Json) -> Result<Value, ItfError> {
    let obj = json
        .as_object()
        .ok_or_else(|| err("expected an ITF object"))?;
    let ty = obj
        .get("#type")
        .and_then(Json::as_str)
        .ok_or_else(|| err("missing #type"))?;
    let value = obj.get("#value").ok_or_else(|| err("missing #value"))?;
    match ty {
        "bool" => value
            .as_bool()
            .map(Value::Bool)
            .ok_or_else(|| err("#value of bool must be a boolean")),
        "int" => match value {
            Json::Number(n) => n
                .as_i64()
                .map(Value::int)
                .ok_or_else(|| err("integer out of range")),
            Json::String(s) => s
                .parse::<BigInt>()
                .map(Value::Int)
                .map_err(|_| err("invalid integer string")),
            _ => Err(err("#value of int must be a number or string")),
        },
        "string" => value
            .as_str()
            .map(Value::str)
            .ok_or_else(|| err("#value of string must be a string")),
        "set" => {
            let elems = value
                .as_array()
                .ok_or_else(|| err("#value of set must be an array"))?;
            let elems: Vec<Value> = elems
                .iter()
                .map(value_from_itf)
                .collect::<Result<_, _>>()?;
            Ok(Value::Set(SetValue::from_iter(elems)))
        }
        "tup" => {
            let elems = value
                .as_array()
                .ok_or_else(|| err("#value of tup must be an array"))?;
            let elems: Vec<Value> = elems
                .iter()
                .map(value_from_itf)
                .collect::<Result<_, _>>()?;
            Ok(Value::tuple(elems))
        }
        "record" => {
            let fields = value
                .as_object()
                .ok_or_else(|| err("#value of record must be an object"))?;
            let pairs: Vec<(String, Value)> = fields
                .iter()
                .map(|(k, v)| Ok((k.clone(), value_from_itf(v)?)))
                .collect::<Result<_, ItfError>>()?;
            Ok(Value::Fcn(FcnValue::record(pairs)))
        }
        "map" => {
            let pairs = value
                .as_array()
                .ok_or_else(|| err("#value of map must be an array of pairs"))?;
            let pairs: Vec<(Value, Value)> = pairs
                .iter()
                .map(|p| {
                    let pair = p
                        .as_array()
                        .filter(|a| a.len() == 2)
                        .ok_or_else(|| err("map entries must be [key, value] pairs"))?;
                    Ok((value_from_itf(&pair[0])?, value_from_itf(&pair[1])?))
                })
                .collect::<Result<_, ItfError>>()?;
            Ok(Value::Fcn(FcnValue::from_pairs(pairs)))
        }
        other => Err(err(format!("unknown #type {:?}", other))),
    }
}

/// Read a state from an ITF object
pub fn state_from_itf(json: &Json) -> Result<State, ItfError> {
    let obj = json
        .as_object()
        .ok_or_else(|| err("expected a state object"))?;
    let pairs: Vec<(Arc<str>, Value)> = obj
        .iter()
        .map(|(k, v)| Ok((Arc::from(k.as_str()), value_from_itf(v)?)))
        .collect::<Result<_, ItfError>>()?;
    Ok(State::from_pairs(pairs))
}
