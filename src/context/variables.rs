use std::collections::HashMap;
use std::fmt;

use thiserror::Error;

#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ValueKind {
    Bool,
    Int,
    Float,
    Text,
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ValueKind::Bool => "bool",
            ValueKind::Int => "int",
            ValueKind::Float => "float",
            ValueKind::Text => "text",
        };
        f.write_str(name)
    }
}

impl Value {
    pub fn kind(&self) -> ValueKind {
        match self {
            Value::Bool(_) => ValueKind::Bool,
            Value::Int(_) => ValueKind::Int,
            Value::Float(_) => ValueKind::Float,
            Value::Text(_) => ValueKind::Text,
        }
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum VarError {
    #[error("variable {0:?} does not exist")]
    NotFound(String),
    #[error("variable {name:?} holds {found}, not {expected}")]
    TypeMismatch {
        name: String,
        expected: ValueKind,
        found: ValueKind,
    },
}

/// Rust types that can be stored in and read back from the variable store.
pub trait VarType: Sized {
    const KIND: ValueKind;

    fn from_value(value: &Value) -> Option<Self>;

    fn into_value(self) -> Value;
}

impl VarType for bool {
    const KIND: ValueKind = ValueKind::Bool;

    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Bool(v) => Some(*v),
            _ => None,
        }
    }

    fn into_value(self) -> Value {
        Value::Bool(self)
    }
}

impl VarType for i64 {
    const KIND: ValueKind = ValueKind::Int;

    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Int(v) => Some(*v),
            _ => None,
        }
    }

    fn into_value(self) -> Value {
        Value::Int(self)
    }
}

impl VarType for f64 {
    const KIND: ValueKind = ValueKind::Float;

    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Float(v) => Some(*v),
            _ => None,
        }
    }

    fn into_value(self) -> Value {
        Value::Float(self)
    }
}

impl VarType for String {
    const KIND: ValueKind = ValueKind::Text;

    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Text(v) => Some(v.clone()),
            _ => None,
        }
    }

    fn into_value(self) -> Value {
        Value::Text(self)
    }
}

/// Named, dynamically typed values whose type is fixed when first added.
#[derive(Debug, Default)]
pub struct Variables {
    values: HashMap<String, Value>,
}

impl Variables {
    /// Create a variable. Returns false if it already exists.
    pub fn add<T: VarType>(&mut self, name: &str, initial: T) -> bool {
        if self.values.contains_key(name) {
            return false;
        }
        self.values.insert(name.to_string(), initial.into_value());
        true
    }

    pub fn get<T: VarType>(&self, name: &str) -> Result<T, VarError> {
        let value = self
            .values
            .get(name)
            .ok_or_else(|| VarError::NotFound(name.to_string()))?;
        T::from_value(value).ok_or_else(|| VarError::TypeMismatch {
            name: name.to_string(),
            expected: T::KIND,
            found: value.kind(),
        })
    }

    /// Update an existing variable; the new value must have the stored type.
    pub fn set<T: VarType>(&mut self, name: &str, value: T) -> Result<(), VarError> {
        let slot = self
            .values
            .get_mut(name)
            .ok_or_else(|| VarError::NotFound(name.to_string()))?;
        if slot.kind() != T::KIND {
            return Err(VarError::TypeMismatch {
                name: name.to_string(),
                expected: slot.kind(),
                found: T::KIND,
            });
        }
        *slot = value.into_value();
        Ok(())
    }

    pub fn remove(&mut self, name: &str) {
        self.values.remove(name);
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }
}
