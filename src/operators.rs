//! Arithmetic and concatenation operators.
//!
//! Each dispatches on the type of the *left* operand and coerces the
//! right one to match. Checked arithmetic is used for
//! `Add`/`Sub`/`Mult` under Strict mode; Lenient mode wraps instead.
//! `Exp` overflow always saturates to zero, matching the reference
//! interpreter's behavior in both modes.

use crate::error::{Error, Result};
use crate::value::{to_knight_string, to_list, to_number, Mode, Value};

pub fn add(a: &Value, b: &Value, mode: Mode) -> Result<Value> {
    match a {
        Value::Number(x) => {
            let y = to_number(b, mode)?;
            Ok(Value::Number(checked_or_wrapping(mode, *x, y, i64::checked_add, i64::wrapping_add)?))
        }
        Value::String(x) => {
            let mut bytes = x.clone();
            bytes.extend(to_knight_string(b, mode)?);
            Ok(Value::String(bytes))
        }
        Value::List(x) => {
            let mut items = x.clone();
            items.extend(to_list(b, mode)?);
            Ok(Value::List(items))
        }
        _ => Err(Error::BadAdd(a.type_name())),
    }
}

pub fn sub(a: &Value, b: &Value, mode: Mode) -> Result<Value> {
    match a {
        Value::Number(x) => {
            let y = to_number(b, mode)?;
            Ok(Value::Number(checked_or_wrapping(mode, *x, y, i64::checked_sub, i64::wrapping_sub)?))
        }
        _ => Err(Error::BadSub(a.type_name())),
    }
}

pub fn mult(a: &Value, b: &Value, mode: Mode) -> Result<Value> {
    match a {
        Value::Number(x) => {
            let y = to_number(b, mode)?;
            Ok(Value::Number(checked_or_wrapping(mode, *x, y, i64::checked_mul, i64::wrapping_mul)?))
        }
        Value::String(s) => {
            let n = to_number(b, mode)?.max(0) as usize;
            Ok(Value::String(s.repeat(n)))
        }
        Value::List(items) => {
            let n = to_number(b, mode)?.max(0) as usize;
            let mut result = Vec::with_capacity(items.len() * n);
            for _ in 0..n {
                result.extend(items.iter().cloned());
            }
            Ok(Value::List(result))
        }
        _ => Err(Error::BadMult(a.type_name())),
    }
}

pub fn div(a: &Value, b: &Value, mode: Mode) -> Result<Value> {
    match a {
        Value::Number(x) => {
            let y = to_number(b, mode)?;
            if y == 0 {
                return Err(Error::BadDiv("division by zero"));
            }
            Ok(Value::Number(x.wrapping_div(y)))
        }
        _ => Err(Error::BadDiv("left operand must be a Number")),
    }
}

pub fn rem(a: &Value, b: &Value, mode: Mode) -> Result<Value> {
    match a {
        Value::Number(x) => {
            let y = to_number(b, mode)?;
            if y == 0 {
                return Err(Error::BadMod("modulo by zero"));
            }
            if *x < 0 || y < 0 {
                return Err(Error::BadMod("operands must be non-negative"));
            }
            Ok(Value::Number(x.wrapping_rem(y)))
        }
        _ => Err(Error::BadMod("left operand must be a Number")),
    }
}

pub fn exp(a: &Value, b: &Value, mode: Mode) -> Result<Value> {
    match a {
        Value::Number(x) => {
            let y = to_number(b, mode)?;
            Ok(Value::Number(integer_pow(*x, y)))
        }
        Value::List(items) => {
            let sep = to_knight_string(b, mode)?;
            let mut parts = Vec::with_capacity(items.len());
            for item in items {
                parts.push(to_knight_string(item, mode)?);
            }
            Ok(Value::String(parts.join(sep.as_slice())))
        }
        _ => Err(Error::BadExp(a.type_name())),
    }
}

fn checked_or_wrapping(
    mode: Mode,
    x: i64,
    y: i64,
    checked: fn(&i64, i64) -> Option<i64>,
    wrapping: fn(&i64, i64) -> i64,
) -> Result<i64> {
    match mode {
        Mode::Strict => checked(&x, y).ok_or(Error::Overflow),
        Mode::Lenient => Ok(wrapping(&x, y)),
    }
}

fn integer_pow(base: i64, exponent: i64) -> i64 {
    if exponent < 0 {
        return 0;
    }
    match u32::try_from(exponent) {
        Ok(e) => base.checked_pow(e).unwrap_or(0),
        Err(_) => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn s(text: &str) -> Value {
        Value::String(text.as_bytes().to_vec())
    }

    #[test]
    fn add_dispatches_on_left_type() {
        assert_eq!(add(&Value::Number(1), &Value::Number(2), Mode::Strict).unwrap(), Value::Number(3));
        assert_eq!(add(&s("a"), &Value::Number(1), Mode::Strict).unwrap(), s("a1"));
    }

    #[test]
    fn mult_repeats_strings_and_lists() {
        assert_eq!(mult(&s("ab"), &Value::Number(2), Mode::Strict).unwrap(), s("abab"));
        assert_eq!(
            mult(&Value::List(vec![Value::Number(1)]), &Value::Number(3), Mode::Strict).unwrap(),
            Value::List(vec![Value::Number(1), Value::Number(1), Value::Number(1)])
        );
    }

    #[test]
    fn div_by_zero_errors() {
        assert!(div(&Value::Number(1), &Value::Number(0), Mode::Strict).is_err());
    }

    #[test]
    fn mod_rejects_negative_operands() {
        assert!(rem(&Value::Number(-1), &Value::Number(3), Mode::Strict).is_err());
    }

    #[test]
    fn exp_overflow_saturates_to_zero() {
        assert_eq!(exp(&Value::Number(i64::MAX), &Value::Number(2), Mode::Strict).unwrap(), Value::Number(0));
    }

    #[test]
    fn exp_on_list_joins_with_separator() {
        let list = Value::List(vec![Value::Number(1), Value::Number(2), Value::Number(3)]);
        assert_eq!(exp(&list, &s(","), Mode::Strict).unwrap(), s("1,2,3"));
    }

    #[test]
    fn add_overflow_strict_errors_lenient_wraps() {
        assert!(add(&Value::Number(i64::MAX), &Value::Number(1), Mode::Strict).is_err());
        assert_eq!(add(&Value::Number(i64::MAX), &Value::Number(1), Mode::Lenient).unwrap(), Value::Number(i64::MIN));
    }
}
