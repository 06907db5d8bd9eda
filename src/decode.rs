use std::sync::Arc;

use num_bigint::BigInt;

use crate::config::DecodeOptions;
use crate::cursor::ByteCursor;
use crate::error::{DecodeError, ShapeError};
use crate::escape::{decode_raw_unicode_escape, decode_string_escape, latin1_string};
use crate::memo::MemoTable;
use crate::opcodes::*;
use crate::registry::{self, ConstructorRegistry};
use crate::value::{Graph, Heap, Native, Object, QualName, Value};

// LONG literals longer than this are rejected before BigInt parsing
const MAX_LONG_TEXT: usize = 10_000;

/// Decode one pickle into an object graph, using the process-wide registry
/// and default limits.
pub fn decode(data: &[u8]) -> Result<Graph, DecodeError> {
    decode_with(data, &DecodeOptions::default(), registry::global())
}

pub fn decode_with(
    data: &[u8],
    options: &DecodeOptions,
    registry: Arc<ConstructorRegistry>,
) -> Result<Graph, DecodeError> {
    let mut unpickler = Unpickler::with_registry(data, registry).with_options(options.clone());
    let root = unpickler.load()?;
    unpickler.check_trailing()?;
    Ok(unpickler.into_graph(root))
}

/// The pickle stack machine.
///
/// One `Unpickler` owns the operand stack, the mark stack, the memo and the
/// heap for a buffer. [`Unpickler::load`] runs until STOP; calling it again
/// decodes the next pickle in the same buffer with the memo and heap shared,
/// the way framed records concatenate pickles.
pub struct Unpickler<'a> {
    cursor: ByteCursor<'a>,
    stack: Vec<Value>,
    /// Operand stack heights at each open MARK
    marks: Vec<usize>,
    memo: MemoTable,
    heap: Heap,
    registry: Arc<ConstructorRegistry>,
    options: DecodeOptions,
    protocol: Option<u8>,
}

impl<'a> Unpickler<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self::with_registry(data, registry::global())
    }

    /// Decoder bound to a private registry instead of the process-wide one.
    pub fn with_registry(data: &'a [u8], registry: Arc<ConstructorRegistry>) -> Self {
        let options = DecodeOptions::default();
        Self {
            cursor: ByteCursor::new(data),
            stack: Vec::with_capacity(16),
            marks: Vec::with_capacity(4),
            memo: MemoTable::new(options.max_memo_entries),
            heap: Heap::new(),
            registry,
            options,
            protocol: None,
        }
    }

    pub fn with_options(mut self, options: DecodeOptions) -> Self {
        self.memo = MemoTable::new(options.max_memo_entries);
        self.options = options;
        self
    }

    pub fn position(&self) -> usize {
        self.cursor.position()
    }

    pub fn remaining(&self) -> usize {
        self.cursor.remaining()
    }

    /// Protocol declared by the last PROTO opcode, if any.
    pub fn protocol(&self) -> Option<u8> {
        self.protocol
    }

    pub fn heap(&self) -> &Heap {
        &self.heap
    }

    pub fn into_graph(self, root: Value) -> Graph {
        Graph::new(root, self.heap)
    }

    fn check_trailing(&self) -> Result<(), DecodeError> {
        let left = self.cursor.remaining();
        if left == 0 {
            return Ok(());
        }
        if self.options.strict_trailing_bytes {
            return Err(DecodeError::malformed(
                self.cursor.position(),
                format!("{left} trailing bytes after STOP"),
            ));
        }
        tracing::debug!(target: "pickle_graph::decode", left, "ignoring trailing bytes after STOP");
        Ok(())
    }

    /// Decode the next pickle in the buffer.
    pub fn load(&mut self) -> Result<Value, DecodeError> {
        self.stack.clear();
        self.marks.clear();
        loop {
            let offset = self.cursor.position();
            let op = self.cursor.read_u8()?;
            tracing::trace!(target: "pickle_graph::decode", offset, op, "opcode");
            match op {
                STOP => {
                    let value = self.finish(offset)?;
                    tracing::debug!(
                        target: "pickle_graph::decode",
                        protocol = ?self.protocol,
                        objects = self.heap.len(),
                        memo = self.memo.len(),
                        "decoded pickle"
                    );
                    return Ok(value);
                }
                PROTO => {
                    let version = self.cursor.read_u8()?;
                    if version > HIGHEST_PROTOCOL {
                        return Err(DecodeError::unsupported(
                            offset,
                            format!("protocol {version}"),
                        ));
                    }
                    tracing::debug!(target: "pickle_graph::decode", version, "protocol declared");
                    self.protocol = Some(version);
                }

                // -- None, Bool --
                NONE => self.push(Value::None),
                NEWTRUE => self.push(Value::Bool(true)),
                NEWFALSE => self.push(Value::Bool(false)),

                // -- Integers --
                BININT => {
                    let val = self.cursor.read_i32_le()?;
                    self.push(Value::Int(val as i64));
                }
                BININT1 => {
                    let val = self.cursor.read_u8()?;
                    self.push(Value::Int(val as i64));
                }
                BININT2 => {
                    let val = self.cursor.read_u16_le()?;
                    self.push(Value::Int(val as i64));
                }
                INT => {
                    let s = self.cursor.read_text_line()?;
                    // INT doubles as the protocol 0 bool: "00" = False, "01" = True
                    let val = match s.trim() {
                        "00" => Value::Bool(false),
                        "01" => Value::Bool(true),
                        _ => Value::Int(parse_int_literal(s, offset)?),
                    };
                    self.push(val);
                }
                LONG => {
                    let s = self.cursor.read_text_line()?;
                    let digits = s.trim().trim_end_matches('L');
                    if digits.len() > MAX_LONG_TEXT {
                        return Err(DecodeError::Overflow {
                            offset,
                            literal: format!("{}...", digits.chars().take(32).collect::<String>()),
                        });
                    }
                    let val: BigInt = digits.parse().map_err(|_| {
                        DecodeError::malformed(offset, format!("invalid LONG literal {s:?}"))
                    })?;
                    self.push(Value::Int(narrow(&val, offset)?));
                }
                LONG1 => {
                    let n = self.cursor.read_u8()? as usize;
                    let bytes = self.cursor.read_bytes(n)?;
                    let val = BigInt::from_signed_bytes_le(bytes);
                    self.push(Value::Int(narrow(&val, offset)?));
                }
                LONG4 => {
                    let n = self.counted_length_i32(offset, "LONG4")?;
                    let bytes = self.cursor.read_bytes(n)?;
                    let val = BigInt::from_signed_bytes_le(bytes);
                    self.push(Value::Int(narrow(&val, offset)?));
                }

                // -- Float --
                BINFLOAT => {
                    let val = self.cursor.read_f64_be()?;
                    self.push(Value::Float(val));
                }
                FLOAT => {
                    let s = self.cursor.read_text_line()?;
                    let val: f64 = s.trim().parse().map_err(|_| {
                        DecodeError::malformed(offset, format!("invalid FLOAT literal {s:?}"))
                    })?;
                    self.push(Value::Float(val));
                }

                // -- Legacy strings (Latin-1 code points) --
                STRING => {
                    let line = self.cursor.read_line()?;
                    let body = match line {
                        [q, body @ .., e] if q == e && (*q == b'\'' || *q == b'"') => body,
                        _ => {
                            return Err(DecodeError::malformed(
                                offset,
                                "STRING argument must be enclosed in matching quotes",
                            ))
                        }
                    };
                    let s = decode_string_escape(body)
                        .map_err(|reason| DecodeError::malformed(offset, reason))?;
                    self.push(Value::Str(s));
                }
                BINSTRING => {
                    let n = self.counted_length_i32(offset, "BINSTRING")?;
                    let bytes = self.cursor.read_bytes(n)?;
                    self.push(Value::Str(latin1_string(bytes)));
                }
                SHORT_BINSTRING => {
                    let n = self.cursor.read_u8()? as usize;
                    let bytes = self.cursor.read_bytes(n)?;
                    self.push(Value::Str(latin1_string(bytes)));
                }

                // -- Unicode strings --
                UNICODE => {
                    let line = self.cursor.read_line()?;
                    let s = decode_raw_unicode_escape(line)
                        .map_err(|reason| DecodeError::malformed(offset, reason))?;
                    self.push(Value::Str(s));
                }
                BINUNICODE => {
                    let n = self.counted_length_u32(offset, "BINUNICODE")?;
                    let bytes = self.cursor.read_bytes(n)?;
                    let s = std::str::from_utf8(bytes)
                        .map_err(|_| DecodeError::malformed(offset, "invalid UTF-8 in BINUNICODE"))?;
                    self.push(Value::Str(s.to_string()));
                }

                // -- Bytes --
                BINBYTES => {
                    let n = self.counted_length_u32(offset, "BINBYTES")?;
                    let bytes = self.cursor.read_bytes(n)?.to_vec();
                    self.push(Value::Bytes(bytes));
                }
                SHORT_BINBYTES => {
                    let n = self.cursor.read_u8()? as usize;
                    let bytes = self.cursor.read_bytes(n)?.to_vec();
                    self.push(Value::Bytes(bytes));
                }

                // -- Mark --
                MARK => self.marks.push(self.stack.len()),

                // -- Tuple --
                EMPTY_TUPLE => self.push(Value::Tuple(Vec::new())),
                TUPLE => {
                    let items = self.pop_mark(offset)?;
                    self.push(Value::Tuple(items));
                }
                TUPLE1 => {
                    let a = self.pop_value(offset)?;
                    self.push(Value::Tuple(vec![a]));
                }
                TUPLE2 => {
                    let b = self.pop_value(offset)?;
                    let a = self.pop_value(offset)?;
                    self.push(Value::Tuple(vec![a, b]));
                }
                TUPLE3 => {
                    let c = self.pop_value(offset)?;
                    let b = self.pop_value(offset)?;
                    let a = self.pop_value(offset)?;
                    self.push(Value::Tuple(vec![a, b, c]));
                }

                // -- List --
                EMPTY_LIST => {
                    let list = self.heap.alloc_list(Vec::new());
                    self.push(list);
                }
                LIST => {
                    let items = self.pop_mark(offset)?;
                    let list = self.heap.alloc_list(items);
                    self.push(list);
                }
                APPEND => {
                    let val = self.pop_value(offset)?;
                    self.extend_list(offset, vec![val])?;
                }
                APPENDS => {
                    let items = self.pop_mark(offset)?;
                    self.extend_list(offset, items)?;
                }

                // -- Dict --
                EMPTY_DICT => {
                    let dict = self.heap.alloc(Object::Dict(Default::default()));
                    self.push(dict);
                }
                DICT => {
                    let items = self.pop_mark(offset)?;
                    let dict = self.heap.alloc(Object::Dict(Default::default()));
                    self.push(dict.clone());
                    self.fill_dict(offset, &dict, items)?;
                }
                SETITEM => {
                    let val = self.pop_value(offset)?;
                    let key = self.pop_value(offset)?;
                    let target = self.top(offset)?.clone();
                    self.fill_dict(offset, &target, vec![key, val])?;
                }
                SETITEMS => {
                    let items = self.pop_mark(offset)?;
                    let target = self.top(offset)?.clone();
                    self.fill_dict(offset, &target, items)?;
                }

                // -- Objects --
                GLOBAL => {
                    let module = self.cursor.read_text_line()?;
                    let name = self.cursor.read_text_line()?;
                    let qualname = QualName::new(module, name);
                    if !self.registry.contains(&qualname) {
                        return Err(DecodeError::UnknownConstructor {
                            module: qualname.module,
                            name: qualname.name,
                        });
                    }
                    self.push(Value::Global(qualname));
                }
                REDUCE | NEWOBJ => {
                    let args = self.pop_value(offset)?;
                    let callable = self.pop_value(offset)?;
                    let value = self.construct(offset, op, callable, args)?;
                    self.push(value);
                }
                BUILD => {
                    let state = self.pop_value(offset)?;
                    let target = self.top(offset)?.clone();
                    self.build(offset, &target, &state)?;
                }

                // -- Memo --
                PUT => {
                    let key = self.text_memo_key(offset)?;
                    self.memo_put(key, offset)?;
                }
                BINPUT => {
                    let key = self.cursor.read_u8()? as u64;
                    self.memo_put(key, offset)?;
                }
                LONG_BINPUT => {
                    let key = self.cursor.read_u32_le()? as u64;
                    self.memo_put(key, offset)?;
                }
                GET => {
                    let key = self.text_memo_key(offset)?;
                    let val = self.memo.fetch(key)?;
                    self.push(val);
                }
                BINGET => {
                    let key = self.cursor.read_u8()? as u64;
                    let val = self.memo.fetch(key)?;
                    self.push(val);
                }
                LONG_BINGET => {
                    let key = self.cursor.read_u32_le()? as u64;
                    let val = self.memo.fetch(key)?;
                    self.push(val);
                }

                // -- Stack manipulation --
                POP => {
                    if self.stack.len() == self.frame_start() && !self.marks.is_empty() {
                        // popping an empty frame discards its mark
                        self.marks.pop();
                    } else {
                        self.pop_value(offset)?;
                    }
                }
                POP_MARK => {
                    self.pop_mark(offset)?;
                }
                DUP => {
                    let val = self.top(offset)?.clone();
                    self.push(val);
                }

                _ => {
                    return Err(match unsupported_name(op) {
                        Some(name) => DecodeError::unsupported(offset, name),
                        None => DecodeError::malformed(offset, format!("unknown opcode 0x{op:02x}")),
                    });
                }
            }
        }
    }

    // -- Stack operations --

    #[inline]
    fn push(&mut self, val: Value) {
        self.stack.push(val);
    }

    #[inline]
    fn frame_start(&self) -> usize {
        self.marks.last().copied().unwrap_or(0)
    }

    /// Pop one operand; never reaches below the most recent mark.
    fn pop_value(&mut self, offset: usize) -> Result<Value, DecodeError> {
        if self.stack.len() <= self.frame_start() {
            return Err(DecodeError::malformed(offset, "stack underflow"));
        }
        self.stack
            .pop()
            .ok_or_else(|| DecodeError::malformed(offset, "stack underflow"))
    }

    fn top(&self, offset: usize) -> Result<&Value, DecodeError> {
        if self.stack.len() <= self.frame_start() {
            return Err(DecodeError::malformed(offset, "stack underflow"));
        }
        self.stack
            .last()
            .ok_or_else(|| DecodeError::malformed(offset, "stack underflow"))
    }

    /// Pop everything above the most recent MARK, and the mark.
    fn pop_mark(&mut self, offset: usize) -> Result<Vec<Value>, DecodeError> {
        let start = self
            .marks
            .pop()
            .ok_or_else(|| DecodeError::malformed(offset, "no MARK on the stack"))?;
        Ok(self.stack.split_off(start))
    }

    fn finish(&mut self, offset: usize) -> Result<Value, DecodeError> {
        let depth = self.stack.len().saturating_sub(self.frame_start());
        if depth != 1 {
            return Err(DecodeError::malformed(
                offset,
                format!("STOP with {depth} values on the stack, expected exactly one"),
            ));
        }
        self.pop_value(offset)
    }

    // -- Argument helpers --

    fn check_size(&self, n: usize, offset: usize, what: &str) -> Result<usize, DecodeError> {
        if n > self.options.max_binary_size {
            return Err(DecodeError::malformed(
                offset,
                format!(
                    "{what} payload of {n} bytes exceeds limit of {}",
                    self.options.max_binary_size
                ),
            ));
        }
        Ok(n)
    }

    fn counted_length_i32(&mut self, offset: usize, what: &str) -> Result<usize, DecodeError> {
        let n = self.cursor.read_i32_le()?;
        if n < 0 {
            return Err(DecodeError::malformed(
                offset,
                format!("negative length {n} in {what}"),
            ));
        }
        self.check_size(n as usize, offset, what)
    }

    fn counted_length_u32(&mut self, offset: usize, what: &str) -> Result<usize, DecodeError> {
        let n = self.cursor.read_u32_le()? as usize;
        self.check_size(n, offset, what)
    }

    fn text_memo_key(&mut self, offset: usize) -> Result<u64, DecodeError> {
        let s = self.cursor.read_text_line()?;
        s.trim()
            .parse()
            .map_err(|_| DecodeError::malformed(offset, format!("invalid memo index {s:?}")))
    }

    // -- Memo operations --

    fn memo_put(&mut self, key: u64, offset: usize) -> Result<(), DecodeError> {
        let val = self.top(offset)?.clone();
        self.memo.store(key, val, offset)
    }

    // -- Containers --

    fn extend_list(&mut self, offset: usize, items: Vec<Value>) -> Result<(), DecodeError> {
        let target = self.top(offset)?.clone();
        let list = match &target {
            Value::List(id) => self.heap.list_mut(*id),
            _ => None,
        };
        match list {
            Some(list) => {
                list.extend(items);
                Ok(())
            }
            None => Err(DecodeError::malformed(
                offset,
                format!("cannot append to {}", target.type_name()),
            )),
        }
    }

    fn fill_dict(
        &mut self,
        offset: usize,
        target: &Value,
        items: Vec<Value>,
    ) -> Result<(), DecodeError> {
        if items.len() % 2 != 0 {
            return Err(DecodeError::malformed(offset, "odd number of items for dict"));
        }
        let dict = match target {
            Value::Dict(id) => self.heap.dict_mut(*id),
            _ => None,
        }
        .ok_or_else(|| {
            DecodeError::malformed(offset, format!("cannot set item on {}", target.type_name()))
        })?;
        let mut iter = items.into_iter();
        while let (Some(k), Some(v)) = (iter.next(), iter.next()) {
            if !k.is_hashable() {
                return Err(DecodeError::malformed(
                    offset,
                    format!("unhashable dict key of type {}", k.type_name()),
                ));
            }
            dict.insert(k, v);
        }
        Ok(())
    }

    // -- Object construction --

    fn construct(
        &mut self,
        offset: usize,
        op: u8,
        callable: Value,
        args: Value,
    ) -> Result<Value, DecodeError> {
        let opname = if op == NEWOBJ { "NEWOBJ" } else { "REDUCE" };
        let qualname = match callable {
            Value::Global(qualname) => qualname,
            other => {
                return Err(DecodeError::malformed(
                    offset,
                    format!("{opname} callable is a {}, not a class reference", other.type_name()),
                ))
            }
        };
        let args = match args {
            Value::Tuple(items) => items,
            other => {
                return Err(DecodeError::malformed(
                    offset,
                    format!("{opname} arguments are a {}, not a tuple", other.type_name()),
                ))
            }
        };
        let strategy = self
            .registry
            .resolve(&qualname)
            .ok_or_else(|| DecodeError::UnknownConstructor {
                module: qualname.module.clone(),
                name: qualname.name.clone(),
            })?;
        strategy
            .construct(args, &mut self.heap)
            .map_err(|e| shape_error(&qualname, e))
    }

    fn build(&mut self, offset: usize, target: &Value, state: &Value) -> Result<(), DecodeError> {
        let id = match target {
            Value::Instance(id) => *id,
            other => {
                return Err(DecodeError::malformed(
                    offset,
                    format!("BUILD target is a {}, not an instance", other.type_name()),
                ))
            }
        };
        let Some(Object::Instance(mut inst)) = self.heap.take(id) else {
            return Err(DecodeError::malformed(offset, "BUILD target is not available"));
        };
        let result = match &mut inst.native {
            Native::Custom(obj) => obj.set_state(id, state, &self.heap),
            _ => None,
        };
        let result = match result {
            Some(r) => r,
            None => merge_state(&mut inst.attrs, state, &self.heap),
        };
        let class = inst.class.clone();
        self.heap.restore(id, Object::Instance(inst));
        result.map_err(|e| shape_error(&class, e))
    }
}

fn shape_error(qualname: &QualName, e: ShapeError) -> DecodeError {
    DecodeError::ArgumentShape {
        module: qualname.module.clone(),
        name: qualname.name.clone(),
        reason: e.0,
    }
}

/// Merge a BUILD state into an attribute map. Accepts a dict, `None`, or the
/// `(dict | None, slots dict | None)` pair classes with `__slots__` produce.
fn merge_state(
    attrs: &mut std::collections::HashMap<String, Value>,
    state: &Value,
    heap: &Heap,
) -> Result<(), ShapeError> {
    match state {
        Value::None => Ok(()),
        Value::Dict(id) => {
            let dict = heap
                .dict(*id)
                .ok_or_else(|| ShapeError::new("state dict is not available"))?;
            for (k, v) in dict {
                let Value::Str(key) = k else {
                    return Err(ShapeError::new(format!(
                        "attribute name must be a str, got {}",
                        k.type_name()
                    )));
                };
                attrs.insert(key.clone(), v.clone());
            }
            Ok(())
        }
        Value::Tuple(parts) if parts.len() == 2 => {
            for part in parts {
                if !matches!(part, Value::None | Value::Dict(_)) {
                    return Err(ShapeError::new(format!(
                        "slot state must be a dict or None, got {}",
                        part.type_name()
                    )));
                }
                merge_state(attrs, part, heap)?;
            }
            Ok(())
        }
        other => Err(ShapeError::new(format!(
            "state must be a dict, None or a (dict, slots) pair, got {}",
            other.type_name()
        ))),
    }
}

fn parse_int_literal(s: &str, offset: usize) -> Result<i64, DecodeError> {
    let t = s.trim();
    if let Ok(v) = t.parse::<i64>() {
        return Ok(v);
    }
    let digits = t.strip_prefix(['-', '+']).unwrap_or(t);
    if !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(DecodeError::Overflow {
            offset,
            literal: t.to_string(),
        });
    }
    Err(DecodeError::malformed(
        offset,
        format!("invalid INT literal {s:?}"),
    ))
}

fn narrow(val: &BigInt, offset: usize) -> Result<i64, DecodeError> {
    i64::try_from(val).map_err(|_| DecodeError::Overflow {
        offset,
        literal: val.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::array::ArrayItems;
    use crate::error::ErrorKind;
    use crate::known_types::{Date, Decimal};
    use crate::registry::attribute_bag;
    use crate::value::{CustomObject, Instance, ObjectId};
    use std::any::Any;

    fn root(data: &[u8]) -> Value {
        decode(data).unwrap().root().clone()
    }

    fn kind(data: &[u8]) -> ErrorKind {
        decode(data).unwrap_err().kind()
    }

    fn with_shop_registry() -> Arc<ConstructorRegistry> {
        let mut reg = ConstructorRegistry::with_builtins();
        reg.register("shop", "Item", attribute_bag(QualName::new("shop", "Item")));
        Arc::new(reg)
    }

    // -- Literals --

    #[test]
    fn test_decode_none_and_bools() {
        assert_eq!(root(b"N."), Value::None);
        assert_eq!(root(b"\x80\x02\x88."), Value::Bool(true));
        assert_eq!(root(b"\x80\x02\x89."), Value::Bool(false));
        assert_eq!(root(b"I01\n."), Value::Bool(true));
        assert_eq!(root(b"I00\n."), Value::Bool(false));
        assert_eq!(root(b"I01\r\n."), Value::Bool(true));
        assert_eq!(root(b"I00 \n."), Value::Bool(false));
    }

    #[test]
    fn test_decode_ints() {
        assert_eq!(root(b"I42\n."), Value::Int(42));
        assert_eq!(root(b"I-7\n."), Value::Int(-7));
        assert_eq!(root(b"K\xff."), Value::Int(255));
        assert_eq!(root(b"M\xff\xff."), Value::Int(65535));
        assert_eq!(root(b"J\xff\xff\xff\xff."), Value::Int(-1));
        assert_eq!(root(b"J\x00\x00\x00\x80."), Value::Int(i32::MIN as i64));
        assert_eq!(kind(b"Iabc\n."), ErrorKind::MalformedStream);
    }

    #[test]
    fn test_text_integer_overflow_boundaries() {
        assert_eq!(root(b"I9223372036854775807\n."), Value::Int(i64::MAX));
        assert_eq!(root(b"I-9223372036854775808\n."), Value::Int(i64::MIN));
        assert_eq!(kind(b"I9223372036854775808\n."), ErrorKind::Overflow);
        assert_eq!(kind(b"I-9223372036854775809\n."), ErrorKind::Overflow);

        assert_eq!(root(b"L9223372036854775807L\n."), Value::Int(i64::MAX));
        assert_eq!(root(b"L-9223372036854775808L\n."), Value::Int(i64::MIN));
        assert_eq!(root(b"L123\n."), Value::Int(123));
        assert_eq!(kind(b"L9223372036854775808L\n."), ErrorKind::Overflow);
        assert_eq!(kind(b"L-9223372036854775809\n."), ErrorKind::Overflow);
        assert_eq!(kind(b"L12x\n."), ErrorKind::MalformedStream);
    }

    #[test]
    fn test_long1_overflow_boundaries() {
        let long1 = |payload: &[u8]| {
            let mut data = vec![LONG1, payload.len() as u8];
            data.extend_from_slice(payload);
            data.push(STOP);
            data
        };
        assert_eq!(root(&long1(&i64::MAX.to_le_bytes())), Value::Int(i64::MAX));
        assert_eq!(root(&long1(&i64::MIN.to_le_bytes())), Value::Int(i64::MIN));
        assert_eq!(root(&long1(&[])), Value::Int(0));
        assert_eq!(root(&long1(&[0xff, 0x00])), Value::Int(255));

        let err = decode(&long1(&[0, 0, 0, 0, 0, 0, 0, 0x80, 0x00])).unwrap_err();
        assert!(err.is_overflow());
        assert!(err.to_string().contains("9223372036854775808"));
        let below_min = [0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0x7f, 0xff];
        assert_eq!(kind(&long1(&below_min)), ErrorKind::Overflow);
    }

    #[test]
    fn test_long4_overflow_boundaries() {
        let long4 = |payload: &[u8]| {
            let mut data = vec![LONG4];
            data.extend_from_slice(&(payload.len() as i32).to_le_bytes());
            data.extend_from_slice(payload);
            data.push(STOP);
            data
        };
        assert_eq!(root(&long4(&i64::MAX.to_le_bytes())), Value::Int(i64::MAX));
        assert_eq!(root(&long4(&i64::MIN.to_le_bytes())), Value::Int(i64::MIN));
        assert_eq!(root(&long4(&[])), Value::Int(0));

        // 2**63 takes nine bytes
        let err = decode(&long4(&[0, 0, 0, 0, 0, 0, 0, 0x80, 0x00])).unwrap_err();
        assert!(err.is_overflow());
        assert!(err.to_string().contains("9223372036854775808"));
        let below_min = [0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0x7f, 0xff];
        assert_eq!(kind(&long4(&below_min)), ErrorKind::Overflow);
        assert_eq!(kind(&long4(&[0x01; 16])), ErrorKind::Overflow);
    }

    #[test]
    fn test_long4() {
        assert_eq!(root(b"\x8b\x02\x00\x00\x00\xff\x00."), Value::Int(255));
        let err = decode(b"\x80\x02\x8b\xff\xff\xff\xff").unwrap_err();
        assert!(err.is_malformed());
        assert!(err.to_string().contains("negative length"));
    }

    #[test]
    fn test_decode_floats() {
        assert_eq!(root(b"F1.5\n."), Value::Float(1.5));
        assert_eq!(root(b"F-1e+100\n."), Value::Float(-1e100));
        match root(b"Fnan\n.") {
            Value::Float(f) => assert!(f.is_nan()),
            other => panic!("expected float, got {other:?}"),
        }
        let mut data = vec![BINFLOAT];
        data.extend_from_slice(&1234.5678f64.to_be_bytes());
        data.push(STOP);
        assert_eq!(root(&data), Value::Float(1234.5678));
        assert_eq!(kind(b"Fabc\n."), ErrorKind::MalformedStream);
    }

    // -- Strings --

    #[test]
    fn test_string_opcode() {
        assert_eq!(root(b"S'abc'\n."), Value::Str("abc".into()));
        assert_eq!(root(b"S\"abc\"\n."), Value::Str("abc".into()));
        assert_eq!(
            root(b"S'\\xa1\\xa2\\xa3'\n."),
            Value::Str("\u{a1}\u{a2}\u{a3}".into())
        );
        assert_eq!(root(b"S'a\\\\x00y'\n."), Value::Str("a\\x00y".into()));
        assert_eq!(root(b"S''\n."), Value::Str(String::new()));
    }

    #[test]
    fn test_string_opcode_requires_matching_quotes() {
        assert_eq!(kind(b"S'abc\"\n."), ErrorKind::MalformedStream);
        assert_eq!(kind(b"Sabc\n."), ErrorKind::MalformedStream);
        assert_eq!(kind(b"S'\n."), ErrorKind::MalformedStream);
    }

    #[test]
    fn test_binary_strings_are_latin1() {
        assert_eq!(root(b"U\x03abc."), Value::Str("abc".into()));
        assert_eq!(root(b"T\x03\x00\x00\x00abc."), Value::Str("abc".into()));
        assert_eq!(root(b"U\x02\xa1\xff."), Value::Str("\u{a1}\u{ff}".into()));
        assert!(decode(b"T\xff\xff\xff\xff").unwrap_err().is_malformed());
    }

    #[test]
    fn test_unicode_opcodes() {
        assert_eq!(root(b"V\\u20ac\n."), Value::Str("\u{20ac}".into()));
        assert_eq!(root(b"Vab\xe9\n."), Value::Str("ab\u{e9}".into()));
        assert_eq!(root(b"Va\\u005cu00y\n."), Value::Str("a\\u00y".into()));
        assert_eq!(
            root(b"X\x05\x00\x00\x00\xe2\x82\xacab."),
            Value::Str("\u{20ac}ab".into())
        );
        assert_eq!(kind(b"X\x02\x00\x00\x00\xff\xfe."), ErrorKind::MalformedStream);
    }

    #[test]
    fn test_bytes_opcodes() {
        assert_eq!(root(b"\x80\x03C\x03abc."), Value::Bytes(b"abc".to_vec()));
        assert_eq!(
            root(b"\x80\x03B\x03\x00\x00\x00\x00\x01\x02."),
            Value::Bytes(vec![0, 1, 2])
        );
    }

    // -- Protocol and opcode gates --

    #[test]
    fn test_protocol_gate() {
        for version in 0..=3u8 {
            assert_eq!(root(&[PROTO, version, NONE, STOP]), Value::None);
        }
        let err = decode(&[PROTO, 4, NONE, STOP]).unwrap_err();
        assert!(err.is_unsupported());
        assert!(err.to_string().contains("protocol 4"));
    }

    #[test]
    fn test_unknown_opcode() {
        let err = decode(b"%.").unwrap_err();
        assert!(err.is_malformed());
        assert_eq!(err.to_string(), "malformed pickle at offset 0: unknown opcode 0x25");
    }

    #[test]
    fn test_unsupported_opcodes() {
        for data in [
            &b"Pabc\n."[..],
            b"NQ.",
            b"(i__main__\nThing\n.",
            b"\x82\x01.",
            b"\x83\x01\x00.",
            b"\x84\x01\x00\x00\x00.",
            b"\x95\x00\x00\x00\x00\x00\x00\x00\x00.",
            b"\x8c\x01a.",
        ] {
            assert_eq!(kind(data), ErrorKind::UnsupportedFeature, "{data:?}");
        }
    }

    #[test]
    fn test_premature_end() {
        assert_eq!(kind(b""), ErrorKind::MalformedStream);
        assert_eq!(kind(b"N"), ErrorKind::MalformedStream);
        assert_eq!(kind(b"I12"), ErrorKind::MalformedStream);
        assert_eq!(kind(b"U\x05ab"), ErrorKind::MalformedStream);
    }

    // -- Stack discipline --

    #[test]
    fn test_stop_requires_exactly_one_value() {
        let err = decode(b"NN.").unwrap_err();
        assert!(err.to_string().contains("STOP with 2 values"));
        assert_eq!(kind(b"."), ErrorKind::MalformedStream);
    }

    #[test]
    fn test_pop_mark() {
        assert_eq!(root(b"I1\n(I2\n(I3\nI4\n1."), Value::Int(2));
        assert_eq!(kind(b"N1."), ErrorKind::MalformedStream);
    }

    #[test]
    fn test_pop_and_dup() {
        assert_eq!(root(b"N}0."), Value::None);
        assert_eq!(root(b"(I42\n2t."), Value::Tuple(vec![Value::Int(42), Value::Int(42)]));
        assert_eq!(root(b"N(0."), Value::None);
        assert_eq!(kind(b"0."), ErrorKind::MalformedStream);
        assert_eq!(kind(b"2."), ErrorKind::MalformedStream);
    }

    #[test]
    fn test_pops_do_not_cross_marks() {
        assert_eq!(kind(b"K\x01(\x85."), ErrorKind::MalformedStream);
        assert_eq!(kind(b"t."), ErrorKind::MalformedStream);
    }

    #[test]
    fn test_trailing_bytes() {
        assert_eq!(root(b"N.xyz"), Value::None);
        let strict = DecodeOptions {
            strict_trailing_bytes: true,
            ..DecodeOptions::default()
        };
        let err = decode_with(b"N.xyz", &strict, registry::global()).unwrap_err();
        assert!(err.to_string().contains("3 trailing bytes"));
        assert!(decode_with(b"N.", &strict, registry::global()).is_ok());
    }

    // -- Containers --

    #[test]
    fn test_tuples() {
        assert_eq!(
            root(b"\x80\x02KaKbKc\x87."),
            Value::Tuple(vec![Value::Int(97), Value::Int(98), Value::Int(99)])
        );
        assert_eq!(root(b"\x80\x02K*\x85."), Value::Tuple(vec![Value::Int(42)]));
        assert_eq!(root(b")."), Value::Tuple(vec![]));
        assert_eq!(
            root(b"(I1\nI2\nt."),
            Value::Tuple(vec![Value::Int(1), Value::Int(2)])
        );
    }

    #[test]
    fn test_dict_from_mark() {
        let graph = decode(b"(S'a'\nI42\nS'b'\nI99\nd.").unwrap();
        let Value::Dict(id) = graph.root() else {
            panic!("expected dict");
        };
        let dict = graph.heap().dict(*id).unwrap();
        assert_eq!(dict.len(), 2);
        assert_eq!(dict[&Value::Str("a".into())], Value::Int(42));
        assert_eq!(dict[&Value::Str("b".into())], Value::Int(99));
    }

    #[test]
    fn test_dict_setitems_last_write_wins() {
        let graph = decode(b"}(U\x01aK\x01U\x01bK\x02U\x01aK\x03u.").unwrap();
        let dict = graph.heap().dict(graph.root().object_id().unwrap()).unwrap();
        assert_eq!(dict.len(), 2);
        assert_eq!(dict[&Value::Str("a".into())], Value::Int(3));
    }

    #[test]
    fn test_dict_errors() {
        assert_eq!(kind(b"(S'a'\nd."), ErrorKind::MalformedStream);
        let err = decode(b"(]I1\nd.").unwrap_err();
        assert!(err.to_string().contains("unhashable dict key of type list"));
        assert_eq!(kind(b"]K\x01K\x02s."), ErrorKind::MalformedStream);
    }

    #[test]
    fn test_append_requires_list() {
        let err = decode(b"}Na.").unwrap_err();
        assert!(err.to_string().contains("cannot append to dict"));
    }

    #[test]
    fn test_self_referential_list_text() {
        let graph = decode(b"(lp0\nS'a'\np1\naS'b'\np2\nag0\na.").unwrap();
        let id = graph.root().object_id().unwrap();
        let items = graph.heap().list(id).unwrap();
        assert_eq!(items.len(), 3);
        assert_eq!(items[0], Value::Str("a".into()));
        assert_eq!(items[1], Value::Str("b".into()));
        assert_eq!(items[2], Value::List(id));
    }

    #[test]
    fn test_self_referential_list_binary() {
        let graph = decode(b"\x80\x02]q\x00(U\x01aq\x01U\x01bq\x02h\x00e.").unwrap();
        let id = graph.root().object_id().unwrap();
        let items = graph.heap().list(id).unwrap();
        assert_eq!(items[2], Value::List(id));
        // walking the cycle returns to the same object
        let inner = items[2].object_id().unwrap();
        assert_eq!(graph.heap().list(inner).unwrap()[2], Value::List(id));
    }

    // -- Memo --

    #[test]
    fn test_memo_preserves_identity() {
        let graph = decode(b"]q\x00(]q\x01h\x01h\x01e.").unwrap();
        let items = graph.heap().list(graph.root().object_id().unwrap()).unwrap();
        assert_eq!(items.len(), 3);
        assert!(items.iter().all(|v| v == &items[0]));
        // one outer list plus one shared inner list
        assert_eq!(graph.heap().len(), 2);
    }

    #[test]
    fn test_memo_large_keys() {
        assert_eq!(
            root(b"Nr\x01\x02\x03\x04j\x01\x02\x03\x04\x86."),
            Value::Tuple(vec![Value::None, Value::None])
        );
        assert_eq!(root(b"I5\np12345\n0g12345\n."), Value::Int(5));
    }

    #[test]
    fn test_memo_missing_key() {
        let err = decode(b"g2\n.").unwrap_err();
        assert!(matches!(err, DecodeError::InvalidMemoKey(2)));
        assert_eq!(kind(b"h\x05."), ErrorKind::InvalidMemoKey);
        assert_eq!(kind(b"Np-1\n."), ErrorKind::MalformedStream);
    }

    #[test]
    fn test_limits() {
        let opts = DecodeOptions {
            max_memo_entries: 1,
            max_binary_size: 2,
            ..DecodeOptions::default()
        };
        let err = decode_with(b"Nq\x00q\x01.", &opts, registry::global()).unwrap_err();
        assert!(err.to_string().contains("memo exceeds maximum of 1 entries"));
        assert!(decode_with(b"C\x03abc.", &opts, registry::global()).is_ok());
        let err = decode_with(b"B\x03\x00\x00\x00abc.", &opts, registry::global()).unwrap_err();
        assert!(err.to_string().contains("exceeds limit"));
    }

    // -- Objects --

    #[test]
    fn test_decimal_via_reduce() {
        let graph = decode(b"cdecimal\nDecimal\n(S'123.456'\ntR.").unwrap();
        let inst = graph.heap().instance(graph.root().object_id().unwrap()).unwrap();
        assert_eq!(inst.class, QualName::new("decimal", "Decimal"));
        let expected: Decimal = "123.456".parse().unwrap();
        assert_eq!(inst.native, Native::Decimal(expected));
    }

    #[test]
    fn test_decimal_via_newobj() {
        let graph = decode(b"\x80\x02cdecimal\nDecimal\nX\x07\x00\x00\x00123.456\x85\x81.").unwrap();
        let inst = graph.heap().instance(graph.root().object_id().unwrap()).unwrap();
        assert_eq!(inst.native, Native::Decimal("123.4560".parse().unwrap()));
    }

    #[test]
    fn test_date_from_legacy_and_bytes() {
        let expected = Native::Date(Date {
            year: 2011,
            month: 12,
            day: 31,
        });
        for data in [
            &b"cdatetime\ndate\n(S'\\x07\\xdb\\x0c\\x1f'\ntR."[..],
            b"\x80\x03cdatetime\ndate\nC\x04\x07\xdb\x0c\x1f\x85R.",
        ] {
            let graph = decode(data).unwrap();
            let inst = graph.heap().instance(graph.root().object_id().unwrap()).unwrap();
            assert_eq!(inst.native, expected);
        }
    }

    #[test]
    fn test_unknown_constructor_fails_at_global() {
        let err = decode(b"cos\nsystem\n.").unwrap_err();
        assert!(matches!(
            &err,
            DecodeError::UnknownConstructor { module, name } if module == "os" && name == "system"
        ));
        assert_eq!(err.to_string(), "unknown constructor os.system");
    }

    #[test]
    fn test_reduce_shape_errors() {
        assert_eq!(kind(b"cdecimal\nDecimal\nS'1'\nR."), ErrorKind::MalformedStream);
        assert_eq!(kind(b"N)R."), ErrorKind::MalformedStream);
        let err = decode(b"cdatetime\ndate\n(S'abc'\ntR.").unwrap_err();
        assert!(matches!(
            &err,
            DecodeError::ArgumentShape { module, name, .. } if module == "datetime" && name == "date"
        ));
    }

    #[test]
    fn test_set_via_reduce() {
        let graph = decode(b"c__builtin__\nset\np0\n((lp1\nI1\naI2\naS'abc'\np2\natp3\nRp4\n.").unwrap();
        let set = graph.heap().set(graph.root().object_id().unwrap()).unwrap();
        assert_eq!(set.len(), 3);
        assert!(set.contains(&Value::Int(1)));
        assert!(set.contains(&Value::Int(2)));
        assert!(set.contains(&Value::Str("abc".into())));
    }

    #[test]
    fn test_ordered_dict_shapes() {
        // empty construction, then SETITEMS onto the reduced object
        let graph = decode(
            b"\x80\x02ccollections\nOrderedDict\nq\x00)Rq\x01(X\x01\x00\x00\x00aK\x01X\x01\x00\x00\x00bK\x02u.",
        )
        .unwrap();
        let map = graph.heap().dict(graph.root().object_id().unwrap()).unwrap();
        assert_eq!(map.len(), 2);
        assert_eq!(map.get(&Value::Str("a".into())), Some(&Value::Int(1)));

        // a list of [key, value] lists as the single argument
        let graph = decode(
            b"\x80\x02ccollections\nOrderedDict\n]q\x00(]q\x01(U\x01aK\x01e]q\x02(U\x01bK\x02ee\x85Rq\x03.",
        )
        .unwrap();
        let map = graph.heap().dict(graph.root().object_id().unwrap()).unwrap();
        assert_eq!(map.get(&Value::Str("b".into())), Some(&Value::Int(2)));
        assert_eq!(map.len(), 2);
    }

    #[test]
    fn test_bytearray_shapes() {
        assert_eq!(
            root(b"c__builtin__\nbytearray\np0\n(V\x01\x02\x7f\x80\xff\np1\nS'latin-1'\np2\ntp3\nRp4\n."),
            Value::Bytes(vec![1, 2, 127, 128, 255])
        );
        assert_eq!(
            root(b"\x80\x02c__builtin__\nbytearray\nX\x03\x00\x00\x00\x01\x02\x03X\x0a\x00\x00\x00iso-8859-1\x86R."),
            Value::Bytes(vec![1, 2, 3])
        );
        assert_eq!(
            root(b"c__builtin__\nbytes\n((lI97\naI98\natR."),
            Value::Bytes(b"ab".to_vec())
        );
        assert_eq!(
            root(b"\x80\x02c_codecs\nencode\nX\x02\x00\x00\x00hiX\x06\x00\x00\x00latin1\x86R."),
            Value::Bytes(b"hi".to_vec())
        );
    }

    #[test]
    fn test_array_from_list() {
        let graph = decode(
            b"carray\narray\np0\n(S'h'\np1\n(lp2\nI1\naI2\naI128\naI255\naI32700\naI-32700\natp3\nRp4\n.",
        )
        .unwrap();
        let arr = graph.heap().array(graph.root().object_id().unwrap()).unwrap();
        assert_eq!(
            arr.items(),
            &ArrayItems::I16(vec![1, 2, 128, 255, 32700, -32700])
        );
    }

    #[test]
    fn test_array_reconstructor() {
        let graph = decode(
            b"\x80\x03carray\n_array_reconstructor\nq\x00(carray\narray\nq\x01X\x01\x00\x00\x00hq\x02K\x04C\x06\x01\x00\x02\x00\x03\x00q\x03tq\x04Rq\x05.",
        )
        .unwrap();
        let arr = graph.heap().array(graph.root().object_id().unwrap()).unwrap();
        assert_eq!(arr.items(), &ArrayItems::I16(vec![1, 2, 3]));
    }

    // -- BUILD --

    #[test]
    fn test_build_merges_attributes_and_keeps_identity() {
        let data = b"\x80\x02cshop\nItem\n)\x81q\x00}(U\x04nameU\x03pinU\x03qtyK\x03ubh\x00\x86.";
        let graph = decode_with(data, &DecodeOptions::default(), with_shop_registry()).unwrap();
        let items = graph.root().as_tuple().unwrap();
        assert_eq!(items[0], items[1]);
        let inst = graph.heap().instance(items[0].object_id().unwrap()).unwrap();
        assert_eq!(inst.class, QualName::new("shop", "Item"));
        assert_eq!(inst.attrs["name"], Value::Str("pin".into()));
        assert_eq!(inst.attrs["qty"], Value::Int(3));
    }

    #[test]
    fn test_build_slot_state() {
        let data = b"\x80\x02cshop\nItem\n)\x81N}U\x01xK\x01s\x86b.";
        let graph = decode_with(data, &DecodeOptions::default(), with_shop_registry()).unwrap();
        let inst = graph.heap().instance(graph.root().object_id().unwrap()).unwrap();
        assert_eq!(inst.attrs.len(), 1);
        assert_eq!(inst.attrs["x"], Value::Int(1));
    }

    #[test]
    fn test_build_errors() {
        assert_eq!(kind(b"]}b."), ErrorKind::MalformedStream);
        let reg = with_shop_registry();
        let opts = DecodeOptions::default();
        let err = decode_with(b"\x80\x02cshop\nItem\n)\x81}K\x01K\x02sb.", &opts, reg.clone())
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ArgumentShape);
        assert!(err.to_string().contains("attribute name must be a str"));
        let err = decode_with(b"\x80\x02cshop\nItem\n)\x81K\x01b.", &opts, reg).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ArgumentShape);
    }

    #[derive(Debug, Default)]
    struct Thingy {
        value: i64,
        extra: Vec<i64>,
        owns_itself: bool,
    }

    impl CustomObject for Thingy {
        fn set_state(
            &mut self,
            this: ObjectId,
            state: &Value,
            heap: &Heap,
        ) -> Option<Result<(), ShapeError>> {
            let Value::Dict(id) = state else {
                return Some(Err(ShapeError::new("Thingy state must be a dict")));
            };
            let dict = heap.dict(*id)?;
            self.owns_itself = dict.get(&Value::Str("owner".into())) == Some(&Value::Instance(this));
            self.value = dict.get(&Value::Str("value".into()))?.as_int()?;
            if let Some(Value::List(list)) = dict.get(&Value::Str("extra".into())) {
                self.extra = heap.list(*list)?.iter().filter_map(Value::as_int).collect();
            }
            Some(Ok(()))
        }

        fn as_any(&self) -> &dyn Any {
            self
        }

        fn as_any_mut(&mut self) -> &mut dyn Any {
            self
        }
    }

    #[test]
    fn test_build_with_custom_state_setter() {
        let mut reg = ConstructorRegistry::with_builtins();
        reg.register("test", "Thingy", |_args: Vec<Value>, heap: &mut Heap| {
            Ok::<_, ShapeError>(heap.alloc_instance(Instance::new(
                QualName::new("test", "Thingy"),
                Native::Custom(Box::new(Thingy::default())),
            )))
        });
        let data = b"\x80\x02ctest\nThingy\n)\x81}(U\x05valueK*U\x05extra](K\x01K\x02eub.";
        let graph = decode_with(data, &DecodeOptions::default(), Arc::new(reg)).unwrap();
        let inst = graph.heap().instance(graph.root().object_id().unwrap()).unwrap();
        let thingy = inst.custom::<Thingy>().unwrap();
        assert_eq!(thingy.value, 42);
        assert_eq!(thingy.extra, vec![1, 2]);
        // the state setter consumed the state, nothing was merged
        assert!(inst.attrs.is_empty());
        assert!(!thingy.owns_itself);
    }

    #[test]
    fn test_custom_state_setter_sees_self_reference() {
        let mut reg = ConstructorRegistry::with_builtins();
        reg.register("test", "Thingy", |_args: Vec<Value>, heap: &mut Heap| {
            Ok::<_, ShapeError>(heap.alloc_instance(Instance::new(
                QualName::new("test", "Thingy"),
                Native::Custom(Box::new(Thingy::default())),
            )))
        });
        // t = Thingy(); t.__setstate__({'value': 7, 'owner': t})
        let data = b"\x80\x02ctest\nThingy\n)\x81q\x00}(U\x05valueK\x07U\x05ownerh\x00ub.";
        let graph = decode_with(data, &DecodeOptions::default(), Arc::new(reg)).unwrap();
        let inst = graph.heap().instance(graph.root().object_id().unwrap()).unwrap();
        let thingy = inst.custom::<Thingy>().unwrap();
        assert_eq!(thingy.value, 7);
        assert!(thingy.owns_itself);
    }

    // -- Unpickler surface --

    #[test]
    fn test_consecutive_pickles_share_memo() {
        let data = b"\x80\x02]q\x00K\x01a.\x80\x02h\x00.";
        let mut unpickler = Unpickler::new(data);
        let first = unpickler.load().unwrap();
        assert_eq!(unpickler.position(), 9);
        assert_eq!(unpickler.protocol(), Some(2));
        let second = unpickler.load().unwrap();
        assert_eq!(first, second);
        assert_eq!(unpickler.remaining(), 0);
        let graph = unpickler.into_graph(second);
        assert_eq!(graph.heap().list(ObjectId(0)).unwrap(), &[Value::Int(1)]);
    }

    #[test]
    fn test_private_registry_isolated() {
        let empty = Arc::new(ConstructorRegistry::empty());
        let err = decode_with(b"cdecimal\nDecimal\n(S'1'\ntR.", &DecodeOptions::default(), empty)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnknownConstructor);
    }
}
