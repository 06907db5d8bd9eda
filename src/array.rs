//! Typed numeric arrays (`array.array`).
//!
//! Two wire forms exist. Protocol 0-2 producers reduce `array.array` with a
//! typecode and a list of elements; Python 3 at protocol 3 uses
//! `array._array_reconstructor(cls, typecode, mformat_code, bytes)` where the
//! bytes are the raw machine representation described by `mformat_code`.

use crate::error::ShapeError;
use crate::known_types::expect_arity;
use crate::value::{Heap, Object, Value};

/// Element storage, one variant per machine element type.
#[derive(Debug, Clone, PartialEq)]
pub enum ArrayItems {
    I8(Vec<i8>),
    U8(Vec<u8>),
    I16(Vec<i16>),
    U16(Vec<u16>),
    I32(Vec<i32>),
    U32(Vec<u32>),
    I64(Vec<i64>),
    U64(Vec<u64>),
    F32(Vec<f32>),
    F64(Vec<f64>),
    Char(Vec<char>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct TypedArray {
    typecode: char,
    items: ArrayItems,
}

impl TypedArray {
    pub fn typecode(&self) -> char {
        self.typecode
    }

    pub fn items(&self) -> &ArrayItems {
        &self.items
    }

    pub fn len(&self) -> usize {
        match &self.items {
            ArrayItems::I8(v) => v.len(),
            ArrayItems::U8(v) => v.len(),
            ArrayItems::I16(v) => v.len(),
            ArrayItems::U16(v) => v.len(),
            ArrayItems::I32(v) => v.len(),
            ArrayItems::U32(v) => v.len(),
            ArrayItems::I64(v) => v.len(),
            ArrayItems::U64(v) => v.len(),
            ArrayItems::F32(v) => v.len(),
            ArrayItems::F64(v) => v.len(),
            ArrayItems::Char(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Elements as plain values, in the shape `array.array(typecode, list)` takes.
    /// Fails only for unsigned 64-bit elements above `i64::MAX`.
    pub fn to_values(&self) -> Result<Vec<Value>, String> {
        fn ints<T: Copy + Into<i64>>(v: &[T]) -> Vec<Value> {
            v.iter().map(|&x| Value::Int(x.into())).collect()
        }
        Ok(match &self.items {
            ArrayItems::I8(v) => ints(v),
            ArrayItems::U8(v) => ints(v),
            ArrayItems::I16(v) => ints(v),
            ArrayItems::U16(v) => ints(v),
            ArrayItems::I32(v) => ints(v),
            ArrayItems::U32(v) => ints(v),
            ArrayItems::I64(v) => ints(v),
            ArrayItems::U64(v) => v
                .iter()
                .map(|&x| {
                    i64::try_from(x)
                        .map(Value::Int)
                        .map_err(|_| format!("array element {x} exceeds i64"))
                })
                .collect::<Result<_, _>>()?,
            ArrayItems::F32(v) => v.iter().map(|&x| Value::Float(x as f64)).collect(),
            ArrayItems::F64(v) => v.iter().map(|&x| Value::Float(x)).collect(),
            ArrayItems::Char(v) => v.iter().map(|c| Value::Str(c.to_string())).collect(),
        })
    }
}

impl TypedArray {
    /// Little-endian machine representation and its format code, the
    /// payload `_array_reconstructor` takes.
    pub fn to_machine_bytes(&self) -> (i64, Vec<u8>) {
        fn le<T, const N: usize>(v: &[T], to_bytes: impl Fn(&T) -> [u8; N]) -> Vec<u8> {
            v.iter().flat_map(to_bytes).collect()
        }
        match &self.items {
            ArrayItems::U8(v) => (0, v.clone()),
            ArrayItems::I8(v) => (1, v.iter().map(|&x| x as u8).collect()),
            ArrayItems::U16(v) => (2, le(v, |x| x.to_le_bytes())),
            ArrayItems::I16(v) => (4, le(v, |x| x.to_le_bytes())),
            ArrayItems::U32(v) => (6, le(v, |x| x.to_le_bytes())),
            ArrayItems::I32(v) => (8, le(v, |x| x.to_le_bytes())),
            ArrayItems::U64(v) => (10, le(v, |x| x.to_le_bytes())),
            ArrayItems::I64(v) => (12, le(v, |x| x.to_le_bytes())),
            ArrayItems::F32(v) => (14, le(v, |x| x.to_le_bytes())),
            ArrayItems::F64(v) => (16, le(v, |x| x.to_le_bytes())),
            ArrayItems::Char(v) => (20, le(v, |c| (*c as u32).to_le_bytes())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ElementKind {
    I8,
    U8,
    I16,
    U16,
    I32,
    U32,
    I64,
    U64,
    F32,
    F64,
    Char,
}

fn element_kind(typecode: char) -> Result<ElementKind, ShapeError> {
    Ok(match typecode {
        'b' => ElementKind::I8,
        'B' => ElementKind::U8,
        'h' => ElementKind::I16,
        'H' => ElementKind::U16,
        'i' => ElementKind::I32,
        'I' => ElementKind::U32,
        'l' | 'q' => ElementKind::I64,
        'L' | 'Q' => ElementKind::U64,
        'f' => ElementKind::F32,
        'd' => ElementKind::F64,
        'c' | 'u' => ElementKind::Char,
        other => {
            return Err(ShapeError::new(format!(
                "unsupported array typecode {other:?}"
            )))
        }
    })
}

fn typecode_argument(arg: &Value) -> Result<char, ShapeError> {
    let text = match arg {
        Value::Str(s) => s.clone(),
        Value::Bytes(b) => b.iter().map(|&b| b as char).collect(),
        other => {
            return Err(ShapeError::new(format!(
                "typecode must be a str, got {}",
                other.type_name()
            )))
        }
    };
    let mut chars = text.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) => Ok(c),
        _ => Err(ShapeError::new(format!(
            "typecode must be a single character, got {text:?}"
        ))),
    }
}

fn int_element<T: TryFrom<i64>>(v: &Value) -> Result<T, ShapeError> {
    let i = v.as_int().ok_or_else(|| {
        ShapeError::new(format!("array element must be an int, got {}", v.type_name()))
    })?;
    T::try_from(i).map_err(|_| ShapeError::new(format!("array element {i} out of range")))
}

fn u64_element(v: &Value) -> Result<u64, ShapeError> {
    int_element::<u64>(v)
}

fn float_element(v: &Value) -> Result<f64, ShapeError> {
    v.as_f64().ok_or_else(|| {
        ShapeError::new(format!("array element must be a float, got {}", v.type_name()))
    })
}

fn char_element(v: &Value) -> Result<char, ShapeError> {
    let mut chars: Vec<char> = match v {
        Value::Str(s) => s.chars().collect(),
        Value::Bytes(b) => b.iter().map(|&b| b as char).collect(),
        other => {
            return Err(ShapeError::new(format!(
                "array element must be a character, got {}",
                other.type_name()
            )))
        }
    };
    if chars.len() != 1 {
        return Err(ShapeError::new("array element must be a single character"));
    }
    Ok(chars.remove(0))
}

/// Build an array from the element list of `array.array(typecode, list)`.
pub fn from_values(typecode: char, values: &[Value]) -> Result<TypedArray, ShapeError> {
    fn collect<T>(
        values: &[Value],
        f: impl Fn(&Value) -> Result<T, ShapeError>,
    ) -> Result<Vec<T>, ShapeError> {
        values.iter().map(f).collect()
    }
    let items = match element_kind(typecode)? {
        ElementKind::I8 => ArrayItems::I8(collect(values, int_element)?),
        ElementKind::U8 => ArrayItems::U8(collect(values, int_element)?),
        ElementKind::I16 => ArrayItems::I16(collect(values, int_element)?),
        ElementKind::U16 => ArrayItems::U16(collect(values, int_element)?),
        ElementKind::I32 => ArrayItems::I32(collect(values, int_element)?),
        ElementKind::U32 => ArrayItems::U32(collect(values, int_element)?),
        ElementKind::I64 => ArrayItems::I64(collect(values, int_element)?),
        ElementKind::U64 => ArrayItems::U64(collect(values, u64_element)?),
        ElementKind::F32 => ArrayItems::F32(collect(values, |v| float_element(v).map(|f| f as f32))?),
        ElementKind::F64 => ArrayItems::F64(collect(values, float_element)?),
        ElementKind::Char => ArrayItems::Char(collect(values, char_element)?),
    };
    Ok(TypedArray { typecode, items })
}

fn chunks<const N: usize>(bytes: &[u8]) -> Result<impl Iterator<Item = [u8; N]> + '_, ShapeError> {
    if bytes.len() % N != 0 {
        return Err(ShapeError::new(format!(
            "array payload of {} bytes is not a multiple of {N}",
            bytes.len()
        )));
    }
    Ok(bytes.chunks_exact(N).map(|c| {
        let mut buf = [0u8; N];
        buf.copy_from_slice(c);
        buf
    }))
}

macro_rules! decode_fixed {
    ($bytes:expr, $ty:ty, $n:literal, $big:expr) => {
        chunks::<$n>($bytes)?
            .map(|c| {
                if $big {
                    <$ty>::from_be_bytes(c)
                } else {
                    <$ty>::from_le_bytes(c)
                }
            })
            .collect::<Vec<$ty>>()
    };
}

fn decode_chars(code_units: Vec<u32>) -> Result<Vec<char>, ShapeError> {
    code_units
        .into_iter()
        .map(|u| {
            char::from_u32(u)
                .ok_or_else(|| ShapeError::new(format!("invalid character U+{u:X} in array")))
        })
        .collect()
}

/// Build an array from the machine representation of
/// `_array_reconstructor`. Format codes follow CPython's
/// `enum machine_format_code`.
pub fn from_machine_bytes(
    typecode: char,
    mformat: i64,
    bytes: &[u8],
) -> Result<TypedArray, ShapeError> {
    let kind = element_kind(typecode)?;
    let big = mformat % 2 == 1;
    let items = match mformat {
        0 => ArrayItems::U8(bytes.to_vec()),
        1 => ArrayItems::I8(bytes.iter().map(|&b| b as i8).collect()),
        2 | 3 => ArrayItems::U16(decode_fixed!(bytes, u16, 2, big)),
        4 | 5 => ArrayItems::I16(decode_fixed!(bytes, i16, 2, big)),
        6 | 7 => ArrayItems::U32(decode_fixed!(bytes, u32, 4, big)),
        8 | 9 => ArrayItems::I32(decode_fixed!(bytes, i32, 4, big)),
        10 | 11 => ArrayItems::U64(decode_fixed!(bytes, u64, 8, big)),
        12 | 13 => ArrayItems::I64(decode_fixed!(bytes, i64, 8, big)),
        14 | 15 => ArrayItems::F32(decode_fixed!(bytes, f32, 4, big)),
        16 | 17 => ArrayItems::F64(decode_fixed!(bytes, f64, 8, big)),
        18 | 19 => {
            let units: Vec<u16> = decode_fixed!(bytes, u16, 2, big);
            let text: Vec<char> = char::decode_utf16(units)
                .collect::<Result<_, _>>()
                .map_err(|_| ShapeError::new("invalid UTF-16 in array payload"))?;
            ArrayItems::Char(text)
        }
        20 | 21 => ArrayItems::Char(decode_chars(decode_fixed!(bytes, u32, 4, big))?),
        other => {
            return Err(ShapeError::new(format!(
                "unknown array machine format code {other}"
            )))
        }
    };
    let matches = matches!(
        (kind, &items),
        (ElementKind::I8, ArrayItems::I8(_))
            | (ElementKind::U8, ArrayItems::U8(_))
            | (ElementKind::I16, ArrayItems::I16(_))
            | (ElementKind::U16, ArrayItems::U16(_))
            | (ElementKind::I32, ArrayItems::I32(_))
            | (ElementKind::U32, ArrayItems::U32(_))
            | (ElementKind::I64, ArrayItems::I64(_))
            | (ElementKind::U64, ArrayItems::U64(_))
            | (ElementKind::F32, ArrayItems::F32(_))
            | (ElementKind::F64, ArrayItems::F64(_))
            | (ElementKind::Char, ArrayItems::Char(_))
    );
    if !matches {
        return Err(ShapeError::new(format!(
            "machine format code {mformat} does not match typecode {typecode:?}"
        )));
    }
    Ok(TypedArray { typecode, items })
}

// ---------------------------------------------------------------------------
// Constructor strategies
// ---------------------------------------------------------------------------

/// `array.array(typecode, list)`
pub fn construct_array(args: Vec<Value>, heap: &mut Heap) -> Result<Value, ShapeError> {
    expect_arity(&args, &[1, 2])?;
    let typecode = typecode_argument(&args[0])?;
    let values: Vec<Value> = match args.get(1) {
        None => Vec::new(),
        Some(Value::List(id)) => heap
            .list(*id)
            .ok_or_else(|| ShapeError::new("array element list is not available"))?
            .to_vec(),
        Some(Value::Tuple(items)) => items.clone(),
        Some(other) => {
            return Err(ShapeError::new(format!(
                "array elements must be a list, got {}",
                other.type_name()
            )))
        }
    };
    let array = from_values(typecode, &values)?;
    Ok(heap.alloc(Object::Array(array)))
}

/// `array._array_reconstructor(cls, typecode, mformat_code, items)`; the
/// leading class argument may be omitted.
pub fn construct_array_reconstructor(
    args: Vec<Value>,
    heap: &mut Heap,
) -> Result<Value, ShapeError> {
    expect_arity(&args, &[3, 4])?;
    let rest = &args[args.len() - 3..];
    let typecode = typecode_argument(&rest[0])?;
    let mformat = rest[1].as_int().ok_or_else(|| {
        ShapeError::new(format!(
            "machine format code must be an int, got {}",
            rest[1].type_name()
        ))
    })?;
    let bytes = match &rest[2] {
        Value::Bytes(b) => b.as_slice(),
        other => {
            return Err(ShapeError::new(format!(
                "array payload must be bytes, got {}",
                other.type_name()
            )))
        }
    };
    let array = from_machine_bytes(typecode, mformat, bytes)?;
    Ok(heap.alloc(Object::Array(array)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::QualName;

    fn list(heap: &mut Heap, items: Vec<Value>) -> Value {
        heap.alloc_list(items)
    }

    #[test]
    fn test_signed_and_unsigned() {
        let a = from_values('b', &[Value::Int(1), Value::Int(-2)]).unwrap();
        assert_eq!(a.items(), &ArrayItems::I8(vec![1, -2]));
        let a = from_values('H', &[Value::Int(40000), Value::Int(65535)]).unwrap();
        assert_eq!(a.items(), &ArrayItems::U16(vec![40000, 65535]));
        let a = from_values('l', &[Value::Int(999_999_999_999)]).unwrap();
        assert_eq!(a.items(), &ArrayItems::I64(vec![999_999_999_999]));
    }

    #[test]
    fn test_element_range_checked() {
        let err = from_values('B', &[Value::Int(256)]).unwrap_err();
        assert!(err.0.contains("out of range"));
        assert!(from_values('I', &[Value::Int(-1)]).is_err());
        assert!(from_values('h', &[Value::Str("x".into())]).is_err());
    }

    #[test]
    fn test_floats_and_chars() {
        let a = from_values('d', &[Value::Float(-4.4), Value::Int(2)]).unwrap();
        assert_eq!(a.items(), &ArrayItems::F64(vec![-4.4, 2.0]));
        let a = from_values('f', &[Value::Float(4.400000095367432)]).unwrap();
        assert_eq!(a.items(), &ArrayItems::F32(vec![4.4f32]));
        let a = from_values('u', &[Value::Str("a".into()), Value::Str("\u{20ac}".into())]).unwrap();
        assert_eq!(a.items(), &ArrayItems::Char(vec!['a', '\u{20ac}']));
        assert!(from_values('c', &[Value::Str("ab".into())]).is_err());
    }

    #[test]
    fn test_unknown_typecode() {
        let err = from_values('z', &[]).unwrap_err();
        assert!(err.0.contains("unsupported array typecode"));
    }

    #[test]
    fn test_machine_bytes_little_and_big_endian() {
        let a = from_machine_bytes('h', 4, &[1, 0, 2, 0, 3, 0]).unwrap();
        assert_eq!(a.items(), &ArrayItems::I16(vec![1, 2, 3]));
        let a = from_machine_bytes('h', 5, &[0, 1, 0xff, 0xfe]).unwrap();
        assert_eq!(a.items(), &ArrayItems::I16(vec![1, -2]));
        let a = from_machine_bytes('d', 16, &1.5f64.to_le_bytes()).unwrap();
        assert_eq!(a.items(), &ArrayItems::F64(vec![1.5]));
        let a = from_machine_bytes('u', 20, &[0x41, 0, 0, 0, 0xac, 0x20, 0, 0]).unwrap();
        assert_eq!(a.items(), &ArrayItems::Char(vec!['A', '\u{20ac}']));
    }

    #[test]
    fn test_machine_bytes_errors() {
        assert!(from_machine_bytes('h', 4, &[1, 0, 2]).is_err());
        assert!(from_machine_bytes('h', 8, &[0; 4]).unwrap_err().0.contains("does not match"));
        assert!(from_machine_bytes('h', 22, &[]).is_err());
    }

    #[test]
    fn test_construct_array_from_list() {
        let mut heap = Heap::new();
        let items = list(&mut heap, vec![Value::Int(1), Value::Int(2), Value::Int(-1)]);
        let v = construct_array(vec![Value::Str("i".into()), items], &mut heap).unwrap();
        let arr = heap.array(v.object_id().unwrap()).unwrap();
        assert_eq!(arr.typecode(), 'i');
        assert_eq!(arr.len(), 3);
        assert_eq!(
            arr.to_values().unwrap(),
            vec![Value::Int(1), Value::Int(2), Value::Int(-1)]
        );
    }

    #[test]
    fn test_construct_reconstructor() {
        let mut heap = Heap::new();
        let args = vec![
            Value::Global(QualName::new("array", "array")),
            Value::Str("h".into()),
            Value::Int(4),
            Value::Bytes(vec![1, 0, 2, 0, 3, 0]),
        ];
        let v = construct_array_reconstructor(args, &mut heap).unwrap();
        let arr = heap.array(v.object_id().unwrap()).unwrap();
        assert_eq!(arr.items(), &ArrayItems::I16(vec![1, 2, 3]));

        let short = vec![Value::Str("B".into()), Value::Int(0), Value::Bytes(vec![9])];
        assert!(construct_array_reconstructor(short, &mut heap).is_ok());
        let err = construct_array_reconstructor(vec![Value::None], &mut heap).unwrap_err();
        assert!(err.0.contains("argument"));
    }
}
