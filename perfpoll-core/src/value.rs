//! Typed counter values and the raw-byte decode path.
//!
//! Providers report each property as a type tag plus raw bytes. This module
//! is the only place those bytes are interpreted: fixed-width kinds decode
//! little-endian through a type-checked match, text arrives as UTF-8. There
//! is no raw-cast accessor anywhere in the workspace.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ValueError;

/// Capacity of the scratch buffer used for fixed-width reads, in bytes.
///
/// Sized to the largest supported primitive with room to spare. A provider
/// that reports a fixed-width value longer than this is violating its
/// contract; the read path surfaces that as [`ValueError::Oversized`] rather
/// than truncating.
pub const FIXED_VALUE_CAPACITY: usize = 32;

/// Provider-reported primitive kind of a property.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TypeTag {
    Uint32,
    Sint32,
    Uint64,
    Sint64,
    Real32,
    Real64,
    Boolean,
    Text,
}

impl TypeTag {
    /// Encoded width in bytes for fixed-width kinds; `None` for text.
    pub fn fixed_width(&self) -> Option<usize> {
        match self {
            TypeTag::Uint32 | TypeTag::Sint32 | TypeTag::Real32 => Some(4),
            TypeTag::Uint64 | TypeTag::Sint64 | TypeTag::Real64 => Some(8),
            TypeTag::Boolean => Some(1),
            TypeTag::Text => None,
        }
    }

    pub fn is_text(&self) -> bool {
        matches!(self, TypeTag::Text)
    }
}

impl fmt::Display for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TypeTag::Uint32 => "uint32",
            TypeTag::Sint32 => "sint32",
            TypeTag::Uint64 => "uint64",
            TypeTag::Sint64 => "sint64",
            TypeTag::Real32 => "real32",
            TypeTag::Real64 => "real64",
            TypeTag::Boolean => "boolean",
            TypeTag::Text => "text",
        };
        f.write_str(name)
    }
}

/// One decoded property value.
///
/// 32-bit kinds widen on decode, so consumers match on five variants and
/// never touch raw bytes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CounterValue {
    Uint64(u64),
    Sint64(i64),
    Real64(f64),
    Bool(bool),
    Text(String),
}

impl CounterValue {
    /// Decode `bytes` according to `tag`.
    ///
    /// `bytes` must hold exactly the value as the provider wrote it:
    /// little-endian for fixed-width kinds, UTF-8 for text. Fewer bytes than
    /// the tag's width is [`ValueError::Short`].
    pub fn decode(tag: TypeTag, bytes: &[u8]) -> Result<Self, ValueError> {
        if let Some(width) = tag.fixed_width() {
            if bytes.len() < width {
                return Err(ValueError::Short {
                    tag,
                    expected: width,
                    actual: bytes.len(),
                });
            }
        }

        let value = match tag {
            TypeTag::Uint32 => {
                CounterValue::Uint64(u64::from(u32::from_le_bytes(take4(bytes))))
            }
            TypeTag::Sint32 => {
                CounterValue::Sint64(i64::from(i32::from_le_bytes(take4(bytes))))
            }
            TypeTag::Uint64 => CounterValue::Uint64(u64::from_le_bytes(take8(bytes))),
            TypeTag::Sint64 => CounterValue::Sint64(i64::from_le_bytes(take8(bytes))),
            TypeTag::Real32 => {
                CounterValue::Real64(f64::from(f32::from_le_bytes(take4(bytes))))
            }
            TypeTag::Real64 => CounterValue::Real64(f64::from_le_bytes(take8(bytes))),
            TypeTag::Boolean => CounterValue::Bool(bytes[0] != 0),
            TypeTag::Text => {
                let text = std::str::from_utf8(bytes).map_err(ValueError::Utf8)?;
                CounterValue::Text(text.to_owned())
            }
        };
        Ok(value)
    }

    pub fn as_u64(&self) -> Option<u64> {
        match self {
            CounterValue::Uint64(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            CounterValue::Sint64(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            CounterValue::Real64(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            CounterValue::Bool(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            CounterValue::Text(v) => Some(v),
            _ => None,
        }
    }
}

fn take4(bytes: &[u8]) -> [u8; 4] {
    let mut out = [0u8; 4];
    out.copy_from_slice(&bytes[..4]);
    out
}

fn take8(bytes: &[u8]) -> [u8; 8] {
    let mut out = [0u8; 8];
    out.copy_from_slice(&bytes[..8]);
    out
}
