//! Coercion of script-supplied values to declared parameter types
//!
//! Order of rules, first match wins:
//!
//! 1. the target accepts the value as is: pass through;
//! 2. the target is text: stringify;
//! 3. both sequences: convert element-wise;
//! 4. both mappings: convert every key and value;
//! 5. a converter registered for `(source kind, target kind)`.

use std::collections::HashMap;

use crate::error::{BridgeError, BridgeResult, CoercionError};
use crate::types::{Kind, TypeDesc};
use crate::value::{Mapping, Sequence, Value};

/// Converts a value of one kind to the target type
pub type Converter = fn(Value, &TypeDesc) -> Result<Value, CoercionError>;

fn unsupported(value: &Value, target: &TypeDesc) -> CoercionError {
    CoercionError::Unsupported {
        from: value.type_desc(),
        to: target.clone(),
    }
}

fn int_to_float(value: Value, target: &TypeDesc) -> Result<Value, CoercionError> {
    match value {
        Value::Int(i) => Ok(Value::Float(i as f64)),
        other => Err(unsupported(&other, target)),
    }
}

fn float_to_int(value: Value, target: &TypeDesc) -> Result<Value, CoercionError> {
    match value {
        // `as` truncates toward zero and saturates at the i64 bounds
        Value::Float(f) => Ok(Value::Int(f as i64)),
        other => Err(unsupported(&other, target)),
    }
}

fn text_to_bytes(value: Value, target: &TypeDesc) -> Result<Value, CoercionError> {
    match value {
        Value::Text(s) => Ok(Value::Bytes(s.into_bytes())),
        other => Err(unsupported(&other, target)),
    }
}

fn bytes_to_text(value: Value, target: &TypeDesc) -> Result<Value, CoercionError> {
    match value {
        Value::Bytes(b) => Ok(Value::Text(String::from_utf8_lossy(&b).into_owned())),
        other => Err(unsupported(&other, target)),
    }
}

// ============================================================================
// Converter table
// ============================================================================

/// Converters keyed by `(source kind, target kind)`
#[derive(Clone)]
pub struct ConverterTable {
    converters: HashMap<(Kind, Kind), Converter>,
}

impl ConverterTable {
    /// Table with no converters
    pub fn empty() -> Self {
        Self {
            converters: HashMap::new(),
        }
    }

    /// Table with the numeric and text/bytes converters
    pub fn with_defaults() -> Self {
        let mut table = Self::empty();
        table.register(Kind::Integer, Kind::Float, int_to_float);
        table.register(Kind::Float, Kind::Integer, float_to_int);
        table.register(Kind::Text, Kind::Bytes, text_to_bytes);
        table.register(Kind::Bytes, Kind::Text, bytes_to_text);
        table
    }

    /// Add or replace a converter
    pub fn register(&mut self, from: Kind, to: Kind, converter: Converter) {
        self.converters.insert((from, to), converter);
    }

    /// Look up a converter
    pub fn get(&self, from: Kind, to: Kind) -> Option<Converter> {
        self.converters.get(&(from, to)).copied()
    }

    /// Number of converters
    pub fn len(&self) -> usize {
        self.converters.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.converters.is_empty()
    }
}

impl Default for ConverterTable {
    fn default() -> Self {
        Self::with_defaults()
    }
}

// ============================================================================
// Coercer
// ============================================================================

/// Applies the coercion rules against a converter table
#[derive(Clone, Default)]
pub struct Coercer {
    table: ConverterTable,
}

impl Coercer {
    /// Coercer over the given table
    pub fn new(table: ConverterTable) -> Self {
        Self { table }
    }

    /// Converter table
    pub fn table(&self) -> &ConverterTable {
        &self.table
    }

    /// Mutable converter table, for registering host converters
    pub fn table_mut(&mut self) -> &mut ConverterTable {
        &mut self.table
    }

    /// Coerce a whole argument list. Lengths must match; the first failing
    /// argument is reported with its 1-based position.
    pub fn coerce_args(&self, args: Vec<Value>, types: &[TypeDesc]) -> BridgeResult<Vec<Value>> {
        if args.len() != types.len() {
            return Err(BridgeError::ArityMismatch {
                expected: types.len(),
                actual: args.len(),
            });
        }
        args.into_iter()
            .zip(types)
            .enumerate()
            .map(|(i, (arg, ty))| {
                self.coerce(arg, ty)
                    .map_err(|source| BridgeError::UnconvertibleType {
                        position: i + 1,
                        source,
                    })
            })
            .collect()
    }

    /// Coerce one value to `target`
    pub fn coerce(&self, value: Value, target: &TypeDesc) -> Result<Value, CoercionError> {
        if target.accepts(&value.type_desc()) {
            return Ok(value);
        }
        match (target, value) {
            (TypeDesc::Text, value) => Ok(Value::Text(value.render_text())),
            (TypeDesc::Seq(elem), Value::Seq(seq)) => {
                let items = seq
                    .into_items()
                    .into_iter()
                    .enumerate()
                    .map(|(index, item)| {
                        self.coerce(item, elem).map_err(|source| CoercionError::Element {
                            index,
                            source: Box::new(source),
                        })
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Value::Seq(Sequence::new((**elem).clone(), items)))
            }
            (TypeDesc::Map(key_ty, value_ty), Value::Map(map)) => {
                let mut out = Mapping::new((**key_ty).clone(), (**value_ty).clone());
                for (key, value) in map.into_entries() {
                    let rendered = key.render_text();
                    let key = self.coerce(key, key_ty).map_err(|source| CoercionError::Key {
                        key: rendered.clone(),
                        source: Box::new(source),
                    })?;
                    let value = self
                        .coerce(value, value_ty)
                        .map_err(|source| CoercionError::Entry {
                            key: rendered,
                            source: Box::new(source),
                        })?;
                    out.insert(key, value);
                }
                Ok(Value::Map(out))
            }
            (target, value) => self.convert(value, target),
        }
    }

    /// Accept-or-converter check only: no stringification and no
    /// element-wise container conversion.
    pub fn convert(&self, value: Value, target: &TypeDesc) -> Result<Value, CoercionError> {
        if target.accepts(&value.type_desc()) {
            return Ok(value);
        }
        match self.table.get(value.kind(), target.kind()) {
            Some(converter) => converter(value, target),
            None => Err(unsupported(&value, target)),
        }
    }
}
