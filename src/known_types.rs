//! Known type handlers: native Rust values for the common Python types a
//! pickle stream reconstructs through REDUCE, and the constructor strategies
//! that build them from their argument tuples.
//!
//! Binary layouts follow CPython's `datetime` pickling: dates, times and
//! datetimes travel as one packed byte string (or, from Python 2, as a
//! legacy `str` holding the same bytes as Latin-1 code points).

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::str::FromStr;

use num_bigint::{BigInt, BigUint, Sign};

use crate::error::ShapeError;
use crate::escape::latin1_bytes;
use crate::value::{Heap, Instance, Native, Object, QualName, Value};

// ---------------------------------------------------------------------------
// Argument helpers shared by all strategies
// ---------------------------------------------------------------------------

pub(crate) fn expect_arity(args: &[Value], allowed: &[usize]) -> Result<(), ShapeError> {
    if allowed.contains(&args.len()) {
        return Ok(());
    }
    let expected = allowed
        .iter()
        .map(|n| n.to_string())
        .collect::<Vec<_>>()
        .join(" or ");
    Err(ShapeError::new(format!(
        "expected {expected} argument(s), got {}",
        args.len()
    )))
}

/// A packed byte argument, given either as bytes or as a Latin-1 string.
pub(crate) fn byte_argument(arg: &Value, expected_len: usize) -> Result<Vec<u8>, ShapeError> {
    let bytes = match arg {
        Value::Bytes(b) => b.clone(),
        Value::Str(s) => latin1_bytes(s)
            .ok_or_else(|| ShapeError::new("string argument has characters above U+00FF"))?,
        other => {
            return Err(ShapeError::new(format!(
                "expected str or bytes argument, got {}",
                other.type_name()
            )))
        }
    };
    if bytes.len() != expected_len {
        return Err(ShapeError::new(format!(
            "expected argument of length {expected_len}, got length {}",
            bytes.len()
        )));
    }
    Ok(bytes)
}

fn int_argument(arg: &Value, what: &str) -> Result<i64, ShapeError> {
    arg.as_int()
        .ok_or_else(|| ShapeError::new(format!("{what} must be an int, got {}", arg.type_name())))
}

fn text_argument<'v>(arg: &'v Value, what: &str) -> Result<&'v str, ShapeError> {
    arg.as_str()
        .ok_or_else(|| ShapeError::new(format!("{what} must be a str, got {}", arg.type_name())))
}

fn check_range(value: u32, max_exclusive: u32, field: &str) -> Result<(), ShapeError> {
    if value >= max_exclusive {
        return Err(ShapeError::new(format!("{field} {value} out of range")));
    }
    Ok(())
}

fn native_instance(heap: &mut Heap, module: &str, name: &str, native: Native) -> Value {
    heap.alloc_instance(Instance::new(QualName::new(module, name), native))
}

// ===========================================================================
// datetime.date / datetime.time / datetime.datetime
// ===========================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Date {
    pub year: u16,
    pub month: u8,
    pub day: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Time {
    pub hour: u8,
    pub minute: u8,
    pub second: u8,
    pub microsecond: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateTime {
    pub date: Date,
    pub time: Time,
}

impl Date {
    /// Decode 4-byte date binary: (year_hi, year_lo, month, day)
    pub fn from_packed(b: &[u8]) -> Result<Self, ShapeError> {
        if b.len() != 4 {
            return Err(ShapeError::new(format!(
                "date needs 4 bytes, got {}",
                b.len()
            )));
        }
        let date = Date {
            year: (b[0] as u16) * 256 + b[1] as u16,
            month: b[2],
            day: b[3],
        };
        if !(1..=12).contains(&date.month) {
            return Err(ShapeError::new(format!("month {} out of range", date.month)));
        }
        if !(1..=31).contains(&date.day) {
            return Err(ShapeError::new(format!("day {} out of range", date.day)));
        }
        Ok(date)
    }

    pub fn to_packed(self) -> Vec<u8> {
        vec![(self.year >> 8) as u8, (self.year & 0xff) as u8, self.month, self.day]
    }
}

impl Time {
    /// Decode 6-byte time binary: (hour, min, sec, us_hi, us_mid, us_lo)
    pub fn from_packed(b: &[u8]) -> Result<Self, ShapeError> {
        if b.len() != 6 {
            return Err(ShapeError::new(format!(
                "time needs 6 bytes, got {}",
                b.len()
            )));
        }
        let time = Time {
            hour: b[0],
            minute: b[1],
            second: b[2],
            microsecond: ((b[3] as u32) << 16) | ((b[4] as u32) << 8) | (b[5] as u32),
        };
        check_range(time.hour as u32, 24, "hour")?;
        check_range(time.minute as u32, 60, "minute")?;
        check_range(time.second as u32, 60, "second")?;
        check_range(time.microsecond, 1_000_000, "microsecond")?;
        Ok(time)
    }

    pub fn to_packed(self) -> Vec<u8> {
        let us = self.microsecond;
        vec![
            self.hour,
            self.minute,
            self.second,
            ((us >> 16) & 0xff) as u8,
            ((us >> 8) & 0xff) as u8,
            (us & 0xff) as u8,
        ]
    }
}

impl DateTime {
    /// Decode 10-byte datetime binary: the date layout followed by the time layout.
    pub fn from_packed(b: &[u8]) -> Result<Self, ShapeError> {
        if b.len() != 10 {
            return Err(ShapeError::new(format!(
                "datetime needs 10 bytes, got {}",
                b.len()
            )));
        }
        Ok(DateTime {
            date: Date::from_packed(&b[..4])?,
            time: Time::from_packed(&b[4..])?,
        })
    }

    pub fn to_packed(self) -> Vec<u8> {
        let mut out = self.date.to_packed();
        out.extend(self.time.to_packed());
        out
    }
}

impl fmt::Display for Date {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}-{:02}", self.year, self.month, self.day)
    }
}

impl fmt::Display for Time {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}:{:02}", self.hour, self.minute, self.second)?;
        if self.microsecond > 0 {
            write!(f, ".{:06}", self.microsecond)?;
        }
        Ok(())
    }
}

impl fmt::Display for DateTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}T{}", self.date, self.time)
    }
}

fn single_packed_arg(args: &[Value], len: usize) -> Result<Vec<u8>, ShapeError> {
    if args.len() == 2 {
        return Err(ShapeError::new("timezone-aware values are not supported"));
    }
    expect_arity(args, &[1])?;
    byte_argument(&args[0], len)
}

pub fn construct_date(args: Vec<Value>, heap: &mut Heap) -> Result<Value, ShapeError> {
    let date = Date::from_packed(&single_packed_arg(&args, 4)?)?;
    Ok(native_instance(heap, "datetime", "date", Native::Date(date)))
}

pub fn construct_time(args: Vec<Value>, heap: &mut Heap) -> Result<Value, ShapeError> {
    let time = Time::from_packed(&single_packed_arg(&args, 6)?)?;
    Ok(native_instance(heap, "datetime", "time", Native::Time(time)))
}

pub fn construct_datetime(args: Vec<Value>, heap: &mut Heap) -> Result<Value, ShapeError> {
    let dt = DateTime::from_packed(&single_packed_arg(&args, 10)?)?;
    Ok(native_instance(heap, "datetime", "datetime", Native::DateTime(dt)))
}

// ===========================================================================
// datetime.timedelta
// ===========================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeDelta {
    pub days: i64,
    pub seconds: i64,
    pub microseconds: i64,
}

impl TimeDelta {
    pub fn total_microseconds(&self) -> i128 {
        (self.days as i128 * 86_400 + self.seconds as i128) * 1_000_000 + self.microseconds as i128
    }
}

pub fn construct_timedelta(args: Vec<Value>, heap: &mut Heap) -> Result<Value, ShapeError> {
    expect_arity(&args, &[3])?;
    let td = TimeDelta {
        days: int_argument(&args[0], "days")?,
        seconds: int_argument(&args[1], "seconds")?,
        microseconds: int_argument(&args[2], "microseconds")?,
    };
    Ok(native_instance(heap, "datetime", "timedelta", Native::TimeDelta(td)))
}

// ===========================================================================
// decimal.Decimal
// ===========================================================================

// Python's decimal contexts cap exponents at MAX_EMAX; literals beyond it are rejected
const MAX_DECIMAL_EXPONENT: i64 = 999_999_999_999_999_999;

/// Arbitrary-precision decimal: `coefficient * 10^exponent`.
#[derive(Debug, Clone)]
pub enum Decimal {
    Finite { coefficient: BigInt, exponent: i64 },
    Infinite { negative: bool },
    /// Quiet or signalling NaN; a zero payload is written without digits
    NaN {
        negative: bool,
        signaling: bool,
        payload: BigUint,
    },
}

/// Coefficient with trailing zeros stripped and the matching exponent.
fn reduced(coefficient: &BigInt, exponent: i64) -> (BigInt, i128) {
    if coefficient.sign() == Sign::NoSign {
        return (BigInt::from(0), 0);
    }
    let ten = BigInt::from(10);
    let mut c = coefficient.clone();
    let mut e = i128::from(exponent);
    while (&c % &ten).sign() == Sign::NoSign {
        c /= &ten;
        e += 1;
    }
    (c, e)
}

impl Decimal {
    /// Quiet NaN without sign or payload.
    pub fn nan() -> Self {
        Decimal::NaN {
            negative: false,
            signaling: false,
            payload: BigUint::default(),
        }
    }

    pub fn is_nan(&self) -> bool {
        matches!(self, Decimal::NaN { .. })
    }

    pub fn to_f64(&self) -> f64 {
        match self {
            Decimal::NaN { .. } => f64::NAN,
            Decimal::Infinite { negative: true } => f64::NEG_INFINITY,
            Decimal::Infinite { negative: false } => f64::INFINITY,
            finite => finite.to_string().parse().unwrap_or(f64::NAN),
        }
    }
}

impl PartialEq for Decimal {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (
                Decimal::Finite {
                    coefficient: a,
                    exponent: x,
                },
                Decimal::Finite {
                    coefficient: b,
                    exponent: y,
                },
            ) => reduced(a, *x) == reduced(b, *y),
            (Decimal::Infinite { negative: a }, Decimal::Infinite { negative: b }) => a == b,
            (
                Decimal::NaN {
                    negative: a,
                    signaling: s,
                    payload: p,
                },
                Decimal::NaN {
                    negative: b,
                    signaling: t,
                    payload: q,
                },
            ) => a == b && s == t && p == q,
            _ => false,
        }
    }
}

impl FromStr for Decimal {
    type Err = ShapeError;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        let s = text.trim();
        let (negative, body) = match s.as_bytes().first() {
            Some(b'-') => (true, &s[1..]),
            Some(b'+') => (false, &s[1..]),
            _ => (false, s),
        };
        let invalid = || ShapeError::new(format!("invalid decimal literal {text:?}"));
        let out_of_range = || ShapeError::new(format!("decimal exponent out of range in {text:?}"));

        let lower = body.to_ascii_lowercase();
        if lower == "inf" || lower == "infinity" {
            return Ok(Decimal::Infinite { negative });
        }
        let nan = match lower.strip_prefix("snan") {
            Some(rest) => Some((true, rest)),
            None => lower.strip_prefix("nan").map(|rest| (false, rest)),
        };
        if let Some((signaling, digits)) = nan {
            if !digits.bytes().all(|b| b.is_ascii_digit()) {
                return Err(invalid());
            }
            let payload = if digits.is_empty() {
                BigUint::default()
            } else {
                digits.parse().map_err(|_| invalid())?
            };
            return Ok(Decimal::NaN {
                negative,
                signaling,
                payload,
            });
        }

        let (mantissa, exp_part) = match body.find(['e', 'E']) {
            Some(idx) => (&body[..idx], Some(&body[idx + 1..])),
            None => (body, None),
        };
        let (int_part, frac_part) = match mantissa.find('.') {
            Some(idx) => (&mantissa[..idx], &mantissa[idx + 1..]),
            None => (mantissa, ""),
        };
        let digits = format!("{int_part}{frac_part}");
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid());
        }
        let written: i64 = match exp_part {
            Some(e) => {
                let unsigned = e.strip_prefix(['+', '-']).unwrap_or(e);
                if unsigned.is_empty() || !unsigned.bytes().all(|b| b.is_ascii_digit()) {
                    return Err(invalid());
                }
                e.parse().map_err(|_| out_of_range())?
            }
            None => 0,
        };
        let exponent = i64::try_from(frac_part.len())
            .ok()
            .and_then(|shift| written.checked_sub(shift))
            .filter(|e| e.unsigned_abs() <= MAX_DECIMAL_EXPONENT as u64)
            .ok_or_else(out_of_range)?;
        let mut coefficient: BigInt = digits.parse().map_err(|_| invalid())?;
        if negative {
            coefficient = -coefficient;
        }
        Ok(Decimal::Finite {
            coefficient,
            exponent,
        })
    }
}

impl fmt::Display for Decimal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (coefficient, exponent) = match self {
            Decimal::NaN {
                negative,
                signaling,
                payload,
            } => {
                let sign = if *negative { "-" } else { "" };
                let s = if *signaling { "s" } else { "" };
                write!(f, "{sign}{s}NaN")?;
                if *payload != BigUint::default() {
                    write!(f, "{payload}")?;
                }
                return Ok(());
            }
            Decimal::Infinite { negative: true } => return f.write_str("-Infinity"),
            Decimal::Infinite { negative: false } => return f.write_str("Infinity"),
            Decimal::Finite {
                coefficient,
                exponent,
            } => (coefficient, i128::from(*exponent)),
        };
        // scientific-string rules of Python's decimal module
        if coefficient.sign() == Sign::Minus {
            f.write_str("-")?;
        }
        let digits = coefficient.magnitude().to_string();
        let n = digits.len() as i128;
        let leftdigits = exponent + n;
        let dotplace = if exponent <= 0 && leftdigits > -6 {
            leftdigits
        } else {
            1
        };
        if dotplace <= 0 {
            write!(f, "0.{}{}", "0".repeat((-dotplace) as usize), digits)?;
        } else if dotplace >= n {
            write!(f, "{}{}", digits, "0".repeat((dotplace - n) as usize))?;
        } else {
            let (int_part, frac_part) = digits.split_at(dotplace as usize);
            write!(f, "{int_part}.{frac_part}")?;
        }
        if leftdigits != dotplace {
            write!(f, "E{:+}", leftdigits - dotplace)?;
        }
        Ok(())
    }
}

pub fn construct_decimal(args: Vec<Value>, heap: &mut Heap) -> Result<Value, ShapeError> {
    expect_arity(&args, &[1])?;
    let dec: Decimal = text_argument(&args[0], "decimal value")?.parse()?;
    Ok(native_instance(heap, "decimal", "Decimal", Native::Decimal(dec)))
}

// ===========================================================================
// complex
// ===========================================================================

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Complex {
    pub re: f64,
    pub im: f64,
}

pub fn construct_complex(args: Vec<Value>, heap: &mut Heap) -> Result<Value, ShapeError> {
    expect_arity(&args, &[1, 2])?;
    let part = |v: &Value, what: &str| {
        v.as_f64().ok_or_else(|| {
            ShapeError::new(format!("{what} part must be a number, got {}", v.type_name()))
        })
    };
    let re = part(&args[0], "real")?;
    let im = match args.get(1) {
        Some(v) => part(v, "imaginary")?,
        None => 0.0,
    };
    Ok(native_instance(
        heap,
        "builtins",
        "complex",
        Native::Complex(Complex { re, im }),
    ))
}

// ===========================================================================
// set / frozenset (REDUCE in protocol 0-3)
// ===========================================================================

pub fn construct_set(args: Vec<Value>, heap: &mut Heap) -> Result<Value, ShapeError> {
    expect_arity(&args, &[0, 1])?;
    let items: Vec<Value> = match args.first() {
        None => Vec::new(),
        Some(Value::List(id)) => heap
            .list(*id)
            .ok_or_else(|| ShapeError::new("set argument list is not available"))?
            .to_vec(),
        Some(Value::Tuple(items)) => items.clone(),
        Some(other) => {
            return Err(ShapeError::new(format!(
                "set argument must be a list, got {}",
                other.type_name()
            )))
        }
    };
    let mut set = HashSet::with_capacity(items.len());
    for item in items {
        if !item.is_hashable() {
            return Err(ShapeError::new(format!(
                "unhashable set member of type {}",
                item.type_name()
            )));
        }
        set.insert(item);
    }
    Ok(heap.alloc(Object::Set(set)))
}

// ===========================================================================
// collections.OrderedDict
// ===========================================================================

/// `OrderedDict()` followed by SETITEMS, or `OrderedDict([[k, v], ...])`.
/// The result is a plain dict; insertion order is not kept.
pub fn construct_ordered_dict(args: Vec<Value>, heap: &mut Heap) -> Result<Value, ShapeError> {
    expect_arity(&args, &[0, 1])?;
    let pairs: Vec<Value> = match args.first() {
        None => Vec::new(),
        Some(Value::List(id)) => heap
            .list(*id)
            .ok_or_else(|| ShapeError::new("OrderedDict argument list is not available"))?
            .to_vec(),
        Some(Value::Tuple(items)) => items.clone(),
        Some(other) => {
            return Err(ShapeError::new(format!(
                "OrderedDict argument must be a list of pairs, got {}",
                other.type_name()
            )))
        }
    };
    let mut map = HashMap::with_capacity(pairs.len());
    for pair in &pairs {
        let (key, value) = match pair {
            Value::Tuple(kv) if kv.len() == 2 => (kv[0].clone(), kv[1].clone()),
            Value::List(id) => match heap.list(*id) {
                Some([k, v]) => (k.clone(), v.clone()),
                _ => return Err(ShapeError::new("OrderedDict item must be a key/value pair")),
            },
            _ => return Err(ShapeError::new("OrderedDict item must be a key/value pair")),
        };
        if !key.is_hashable() {
            return Err(ShapeError::new(format!(
                "unhashable OrderedDict key of type {}",
                key.type_name()
            )));
        }
        map.insert(key, value);
    }
    Ok(heap.alloc(Object::Dict(map)))
}

// ===========================================================================
// bytes / bytearray / _codecs.encode
// ===========================================================================

/// Encode text with one of the codecs pickles use for byte payloads.
pub fn encode_text(text: &str, encoding: &str) -> Result<Vec<u8>, ShapeError> {
    let norm = encoding.trim().to_ascii_lowercase().replace('_', "-");
    match norm.as_str() {
        "latin-1" | "latin1" | "iso-8859-1" | "iso8859-1" | "l1" => latin1_bytes(text)
            .ok_or_else(|| ShapeError::new("text is not encodable as latin-1")),
        "utf-8" | "utf8" => Ok(text.as_bytes().to_vec()),
        "ascii" | "us-ascii" => {
            if text.is_ascii() {
                Ok(text.as_bytes().to_vec())
            } else {
                Err(ShapeError::new("text is not encodable as ascii"))
            }
        }
        _ => Err(ShapeError::new(format!("unsupported encoding {encoding:?}"))),
    }
}

pub fn construct_bytes(args: Vec<Value>, heap: &mut Heap) -> Result<Value, ShapeError> {
    expect_arity(&args, &[0, 1, 2, 3])?;
    if let Some(errors) = args.get(2) {
        text_argument(errors, "errors")?;
    }
    let bytes = match (args.first(), args.get(1)) {
        (None, _) => Vec::new(),
        (Some(Value::Str(text)), Some(enc)) => encode_text(text, text_argument(enc, "encoding")?)?,
        (Some(Value::Bytes(b)), Some(enc)) => {
            text_argument(enc, "encoding")?;
            b.clone()
        }
        (Some(first), Some(_)) => {
            return Err(ShapeError::new(format!(
                "cannot encode a {} to bytes",
                first.type_name()
            )))
        }
        (Some(Value::Bytes(b)), None) => b.clone(),
        (Some(Value::Str(text)), None) => encode_text(text, "latin-1")?,
        (Some(Value::Int(n)), None) => {
            let n = usize::try_from(*n)
                .map_err(|_| ShapeError::new(format!("negative byte count {n}")))?;
            vec![0; n]
        }
        (Some(Value::List(id)), None) => {
            let items = heap
                .list(*id)
                .ok_or_else(|| ShapeError::new("byte list is not available"))?;
            items
                .iter()
                .map(|item| match item {
                    Value::Int(i) => u8::try_from(*i)
                        .map_err(|_| ShapeError::new(format!("byte value {i} out of range"))),
                    other => Err(ShapeError::new(format!(
                        "byte list items must be ints, got {}",
                        other.type_name()
                    ))),
                })
                .collect::<Result<Vec<u8>, _>>()?
        }
        (Some(other), None) => {
            return Err(ShapeError::new(format!(
                "cannot build bytes from {}",
                other.type_name()
            )))
        }
    };
    Ok(Value::Bytes(bytes))
}

// ===========================================================================
// Reverse direction: native -> (callable, args) for the encoder
// ===========================================================================

/// The REDUCE callable and argument tuple that rebuild a native payload.
/// `None` for payloads that have no wire form (plain and custom instances).
pub fn native_reduce(native: &Native) -> Option<(QualName, Vec<Value>)> {
    let reduce = match native {
        Native::Decimal(d) => (
            QualName::new("decimal", "Decimal"),
            vec![Value::Str(d.to_string())],
        ),
        Native::Date(d) => (
            QualName::new("datetime", "date"),
            vec![Value::Bytes(d.to_packed())],
        ),
        Native::Time(t) => (
            QualName::new("datetime", "time"),
            vec![Value::Bytes(t.to_packed())],
        ),
        Native::DateTime(dt) => (
            QualName::new("datetime", "datetime"),
            vec![Value::Bytes(dt.to_packed())],
        ),
        Native::TimeDelta(td) => (
            QualName::new("datetime", "timedelta"),
            vec![
                Value::Int(td.days),
                Value::Int(td.seconds),
                Value::Int(td.microseconds),
            ],
        ),
        Native::Complex(c) => (
            QualName::new("builtins", "complex"),
            vec![Value::Float(c.re), Value::Float(c.im)],
        ),
        Native::Plain | Native::Custom(_) => return None,
    };
    Some(reduce)
}

// ===========================================================================
// Tests
// ===========================================================================
