//! The tagged value representation and Knight's coercion rules.
//!
//! `String` and `List` own their contents; Rust's derived `Clone` is
//! already the deep copy the data model requires, so "duplicate on
//! push" throughout the VM is just `.clone()`. `Block` is a bare index
//! into the program's blocks table — copying it copies the index, not
//! the code it names.
//!
//! `String` is backed by `Vec<u8>`, not `std::string::String`: Knight
//! strings are owned ASCII byte sequences, and `ASCII` can legitimately
//! push a byte anywhere in 0..256, not just the 0..128 range `char`/`str`
//! require. Keeping it as raw bytes means `HEAD`/`TAIL`/`GET`/`SET` can
//! always slice by byte index without a UTF-8 char-boundary check that
//! a `str` would force on them.

use std::cmp::Ordering;

use crate::error::{Error, Result};

/// Strict mode raises on type misuse; Lenient coerces or no-ops instead.
/// Only the handful of genuinely ambiguous cases (`Block` reaching an
/// arithmetic/comparison/coercion context, the stray `Invalid` opcode)
/// actually branch on this.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Strict,
    Lenient,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Number(i64),
    /// Raw ASCII byte sequence; see the module note on why this isn't
    /// `std::string::String`.
    String(Vec<u8>),
    List(Vec<Value>),
    Bool(bool),
    /// Index into the owning program's blocks table.
    Block(usize),
    Null,
}

impl Value {
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Number(_) => "Number",
            Value::String(_) => "String",
            Value::List(_) => "List",
            Value::Bool(_) => "Bool",
            Value::Block(_) => "Block",
            Value::Null => "Null",
        }
    }

    /// `LENGTH`: element count for containers, digit count for numbers,
    /// 0/1 for Bool, 0 for Null and Block.
    pub fn len(&self) -> i64 {
        match self {
            Value::List(items) => items.len() as i64,
            Value::String(s) => s.len() as i64,
            Value::Number(n) => n.unsigned_abs().to_string().len() as i64,
            Value::Bool(b) => *b as i64,
            Value::Null => 0,
            Value::Block(_) => 0,
        }
    }
}

pub fn to_bool(v: &Value) -> bool {
    match v {
        Value::Bool(b) => *b,
        Value::Null => false,
        Value::Number(n) => *n != 0,
        Value::String(s) => !s.is_empty(),
        Value::List(items) => !items.is_empty(),
        Value::Block(_) => false,
    }
}

pub fn to_number(v: &Value, mode: Mode) -> Result<i64> {
    Ok(match v {
        Value::Number(n) => *n,
        Value::Null => 0,
        Value::Bool(b) => *b as i64,
        Value::String(s) => parse_leading_integer(s),
        Value::List(items) => items.len() as i64,
        Value::Block(_) => block_or_err(mode, 0)?,
    })
}

pub fn to_knight_string(v: &Value, mode: Mode) -> Result<Vec<u8>> {
    Ok(match v {
        Value::String(s) => s.clone(),
        Value::Null => Vec::new(),
        Value::Number(n) => n.to_string().into_bytes(),
        Value::Bool(b) => if *b { "true" } else { "false" }.as_bytes().to_vec(),
        Value::List(items) => {
            let mut out = Vec::new();
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(b'\n');
                }
                out.extend(to_knight_string(item, mode)?);
            }
            out
        }
        Value::Block(_) => block_or_err(mode, Vec::new())?,
    })
}

pub fn to_list(v: &Value, mode: Mode) -> Result<Vec<Value>> {
    Ok(match v {
        Value::List(items) => items.clone(),
        Value::Null => Vec::new(),
        Value::Number(0) => vec![Value::Number(0)],
        Value::Number(n) => {
            let sign = n.signum();
            let digits = n.unsigned_abs().to_string();
            digits
                .bytes()
                .map(|b| Value::Number(sign * (b - b'0') as i64))
                .collect()
        }
        Value::Bool(true) => vec![Value::Bool(true)],
        Value::Bool(false) => Vec::new(),
        Value::String(s) => s.iter().map(|&b| Value::String(vec![b])).collect(),
        Value::Block(_) => block_or_err(mode, Vec::new())?,
    })
}

/// `order(a, b)`: total order used by `<`/`>`, dispatching on the type
/// of the left operand and coercing the right one.
pub fn order(a: &Value, b: &Value, mode: Mode) -> Result<Ordering> {
    Ok(match a {
        Value::Number(n) => n.cmp(&to_number(b, mode)?),
        Value::Bool(x) => (*x as u8).cmp(&(to_bool(b) as u8)),
        Value::String(s) => s.as_slice().cmp(to_knight_string(b, mode)?.as_slice()),
        Value::List(items) => {
            let other = to_list(b, mode)?;
            let mut result = Ordering::Equal;
            for (x, y) in items.iter().zip(other.iter()) {
                result = order(x, y, mode)?;
                if result != Ordering::Equal {
                    return Ok(result);
                }
            }
            items.len().cmp(&other.len())
        }
        Value::Null => {
            if matches!(b, Value::Null) {
                Ordering::Equal
            } else {
                Ordering::Less
            }
        }
        Value::Block(_) => block_or_err(mode, Ordering::Equal)?,
    })
}

/// `strict_equals`: same variant, equal payload, no coercion. `Block`
/// compares by table index and survives a deep copy unchanged.
pub fn strict_equals(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x == y,
        (Value::String(x), Value::String(y)) => x == y,
        (Value::Bool(x), Value::Bool(y)) => x == y,
        (Value::Null, Value::Null) => true,
        (Value::Block(x), Value::Block(y)) => x == y,
        (Value::List(x), Value::List(y)) => {
            x.len() == y.len() && x.iter().zip(y.iter()).all(|(x, y)| strict_equals(x, y))
        }
        _ => false,
    }
}

/// Canonical `DUMP` form: bit-exact, used as the test oracle for output.
/// Operates byte-by-byte so a raw byte pushed by `ASCII` (0..256, not
/// just the printable-ASCII range) passes through unescaped rather than
/// being reinterpreted as a `char`.
pub fn dump(v: &Value) -> Vec<u8> {
    match v {
        Value::Number(n) => n.to_string().into_bytes(),
        Value::String(s) => {
            let mut out = Vec::with_capacity(s.len() + 2);
            out.push(b'"');
            for &byte in s {
                match byte {
                    b'\t' => out.extend_from_slice(b"\\t"),
                    b'\n' => out.extend_from_slice(b"\\n"),
                    b'\r' => out.extend_from_slice(b"\\r"),
                    b'\\' => out.extend_from_slice(b"\\\\"),
                    b'"' => out.extend_from_slice(b"\\\""),
                    other => out.push(other),
                }
            }
            out.push(b'"');
            out
        }
        Value::Bool(b) => if *b { "true" } else { "false" }.as_bytes().to_vec(),
        Value::Null => "null".as_bytes().to_vec(),
        Value::List(items) => {
            let mut out = Vec::new();
            out.push(b'[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.extend_from_slice(b", ");
                }
                out.extend(dump(item));
            }
            out.push(b']');
            out
        }
        Value::Block(_) => Vec::new(),
    }
}

fn block_or_err<T>(mode: Mode, lenient_value: T) -> Result<T> {
    match mode {
        Mode::Strict => Err(Error::BlockNotAllowed),
        Mode::Lenient => Ok(lenient_value),
    }
}

fn parse_leading_integer(bytes: &[u8]) -> i64 {
    let mut i = 0;
    while i < bytes.len() && bytes[i].is_ascii_whitespace() {
        i += 1;
    }
    let negative = match bytes.get(i) {
        Some(b'-') => {
            i += 1;
            true
        }
        Some(b'+') => {
            i += 1;
            false
        }
        _ => false,
    };
    let start = i;
    while i < bytes.len() && bytes[i].is_ascii_digit() {
        i += 1;
    }
    if start == i {
        return 0;
    }
    let digits = std::str::from_utf8(&bytes[start..i]).expect("ASCII digits are valid UTF-8");
    let magnitude: i64 = digits.parse().unwrap_or(i64::MAX);
    if negative {
        -magnitude
    } else {
        magnitude
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn s(text: &str) -> Value {
        Value::String(text.as_bytes().to_vec())
    }

    #[test]
    fn to_number_parses_leading_digits_only() {
        assert_eq!(to_number(&s("  -12abc"), Mode::Strict).unwrap(), -12);
        assert_eq!(to_number(&s(""), Mode::Strict).unwrap(), 0);
    }

    #[test]
    fn to_list_of_negative_number_carries_sign_per_digit() {
        let list = to_list(&Value::Number(-12), Mode::Strict).unwrap();
        assert_eq!(list, vec![Value::Number(-1), Value::Number(-2)]);
    }

    #[test]
    fn order_on_lists_is_elementwise_with_length_tiebreak() {
        let a = Value::List(vec![Value::Number(1), Value::Number(2)]);
        let b = Value::List(vec![Value::Number(1), Value::Number(2), Value::Number(3)]);
        assert_eq!(order(&a, &b, Mode::Strict).unwrap(), Ordering::Less);
    }

    #[test]
    fn strict_equals_does_not_coerce() {
        assert!(!strict_equals(&Value::Number(0), &Value::Bool(false)));
        assert!(strict_equals(&Value::Number(0), &Value::Number(0)));
    }

    #[test]
    fn block_in_strict_mode_arithmetic_context_errors() {
        assert!(to_number(&Value::Block(0), Mode::Strict).is_err());
        assert_eq!(to_number(&Value::Block(0), Mode::Lenient).unwrap(), 0);
    }

    #[test]
    fn dump_escapes_control_characters() {
        assert_eq!(dump(&s("a\tb\n\"c\"")), b"\"a\\tb\\n\\\"c\\\"\"".to_vec());
    }

    #[test]
    fn dump_of_block_is_empty() {
        assert_eq!(dump(&Value::Block(3)), Vec::<u8>::new());
    }

    #[test]
    fn dump_passes_high_bytes_through_unescaped() {
        // The kind of byte `ASCII` can push (n mod 256 > 127): must
        // survive as a single raw byte, not get reinterpreted as a
        // multi-byte UTF-8 sequence.
        let v = Value::String(vec![200]);
        assert_eq!(dump(&v), vec![b'"', 200, b'"']);
    }

    #[test]
    fn to_list_of_string_splits_into_single_byte_strings() {
        let list = to_list(&Value::String(vec![b'h', 200, b'i']), Mode::Strict).unwrap();
        assert_eq!(
            list,
            vec![
                Value::String(vec![b'h']),
                Value::String(vec![200]),
                Value::String(vec![b'i']),
            ]
        );
    }
}
