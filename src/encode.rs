use std::collections::{HashMap, HashSet};

use num_bigint::BigInt;

use crate::config::EncodeOptions;
use crate::error::EncodeError;
use crate::escape::{encode_raw_unicode_escape, latin1_string};
use crate::known_types::native_reduce;
use crate::opcodes::*;
use crate::value::{Graph, Heap, Instance, Native, Object, ObjectId, QualName, Value};

/// Encode a decoded graph back into pickle bytes.
pub fn encode(graph: &Graph, options: &EncodeOptions) -> Result<Vec<u8>, EncodeError> {
    encode_value(graph.root(), graph.heap(), options)
}

/// Encode `value`, resolving object references against `heap`.
pub fn encode_value(
    value: &Value,
    heap: &Heap,
    options: &EncodeOptions,
) -> Result<Vec<u8>, EncodeError> {
    if !options.is_valid() {
        return Err(EncodeError::Unsupported(format!(
            "protocol {}",
            options.protocol
        )));
    }
    let mut encoder = Encoder::new(heap, options.protocol);
    if options.protocol >= 2 {
        encoder.write_u8(PROTO);
        encoder.write_u8(options.protocol);
    }
    encoder.encode_value(value)?;
    encoder.write_u8(STOP);
    Ok(encoder.buf)
}

struct Encoder<'h> {
    buf: Vec<u8>,
    heap: &'h Heap,
    protocol: u8,
    /// Memo index assigned to each emitted heap object
    memo: HashMap<ObjectId, u32>,
    /// Objects rebuilt through REDUCE whose arguments are still being written
    reducing: HashSet<ObjectId>,
}

impl<'h> Encoder<'h> {
    fn new(heap: &'h Heap, protocol: u8) -> Self {
        Self {
            buf: Vec::with_capacity(256),
            heap,
            protocol,
            memo: HashMap::new(),
            reducing: HashSet::new(),
        }
    }

    fn write_u8(&mut self, b: u8) {
        self.buf.push(b);
    }

    fn write_bytes(&mut self, data: &[u8]) {
        self.buf.extend_from_slice(data);
    }

    fn write_line(&mut self, op: u8, text: &str) {
        self.write_u8(op);
        self.write_bytes(text.as_bytes());
        self.write_u8(b'\n');
    }

    fn binary(&self) -> bool {
        self.protocol >= 1
    }

    fn object(&self, id: ObjectId) -> Result<&'h Object, EncodeError> {
        self.heap.get(id).ok_or(EncodeError::DanglingObject(id))
    }

    fn encode_value(&mut self, val: &Value) -> Result<(), EncodeError> {
        match val {
            Value::None => self.write_u8(NONE),
            Value::Bool(b) => self.encode_bool(*b),
            Value::Int(i) => self.encode_int(*i),
            Value::Float(f) => self.encode_float(*f),
            Value::Str(s) => self.encode_str(s),
            Value::Bytes(b) => self.encode_bytes(b)?,
            Value::Tuple(items) => self.encode_tuple(items)?,
            Value::Global(q) => self.write_global(q)?,
            Value::List(id)
            | Value::Dict(id)
            | Value::Set(id)
            | Value::Array(id)
            | Value::Instance(id) => self.encode_object(*id)?,
        }
        Ok(())
    }

    // -- Scalars --

    fn encode_bool(&mut self, b: bool) {
        if self.protocol >= 2 {
            self.write_u8(if b { NEWTRUE } else { NEWFALSE });
        } else {
            self.write_line(INT, if b { "01" } else { "00" });
        }
    }

    fn encode_int(&mut self, val: i64) {
        if !self.binary() {
            self.write_line(INT, &val.to_string());
        } else if (0..256).contains(&val) {
            self.write_u8(BININT1);
            self.write_u8(val as u8);
        } else if (0..65536).contains(&val) {
            self.write_u8(BININT2);
            self.write_bytes(&(val as u16).to_le_bytes());
        } else if let Ok(v) = i32::try_from(val) {
            self.write_u8(BININT);
            self.write_bytes(&v.to_le_bytes());
        } else if self.protocol >= 2 {
            let bytes = BigInt::from(val).to_signed_bytes_le();
            self.write_u8(LONG1);
            self.write_u8(bytes.len() as u8);
            self.write_bytes(&bytes);
        } else {
            self.write_line(LONG, &format!("{val}L"));
        }
    }

    fn encode_float(&mut self, f: f64) {
        if self.binary() {
            self.write_u8(BINFLOAT);
            self.write_bytes(&f.to_be_bytes());
        } else {
            let mut buffer = ryu::Buffer::new();
            let text = buffer.format(f).to_string();
            self.write_line(FLOAT, &text);
        }
    }

    fn encode_str(&mut self, s: &str) {
        if self.binary() {
            self.write_u8(BINUNICODE);
            self.write_bytes(&(s.len() as u32).to_le_bytes());
            self.write_bytes(s.as_bytes());
        } else {
            self.write_u8(UNICODE);
            self.write_bytes(&encode_raw_unicode_escape(s));
            self.write_u8(b'\n');
        }
    }

    fn encode_bytes(&mut self, b: &[u8]) -> Result<(), EncodeError> {
        if self.protocol >= 3 {
            if b.len() < 256 {
                self.write_u8(SHORT_BINBYTES);
                self.write_u8(b.len() as u8);
            } else {
                self.write_u8(BINBYTES);
                self.write_bytes(&(b.len() as u32).to_le_bytes());
            }
            self.write_bytes(b);
            return Ok(());
        }
        // no bytes opcode before protocol 3: _codecs.encode(latin-1 text, 'latin1')
        self.write_global(&QualName::new("_codecs", "encode"))?;
        self.encode_tuple(&[
            Value::Str(latin1_string(b)),
            Value::Str("latin1".to_string()),
        ])?;
        self.write_u8(REDUCE);
        Ok(())
    }

    fn encode_tuple(&mut self, items: &[Value]) -> Result<(), EncodeError> {
        if items.is_empty() && self.binary() {
            self.write_u8(EMPTY_TUPLE);
            return Ok(());
        }
        if self.protocol >= 2 && items.len() <= 3 {
            for item in items {
                self.encode_value(item)?;
            }
            self.write_u8(match items.len() {
                1 => TUPLE1,
                2 => TUPLE2,
                _ => TUPLE3,
            });
            return Ok(());
        }
        self.write_u8(MARK);
        for item in items {
            self.encode_value(item)?;
        }
        self.write_u8(TUPLE);
        Ok(())
    }

    fn write_global(&mut self, q: &QualName) -> Result<(), EncodeError> {
        if q.module.contains('\n') || q.name.contains('\n') {
            return Err(EncodeError::InvalidValue(format!(
                "qualified name {q:?} contains a newline"
            )));
        }
        // Python 2 readers know the builtins module as __builtin__
        let module = if q.module == "builtins" && self.protocol < 3 {
            "__builtin__"
        } else {
            q.module.as_str()
        };
        self.write_u8(GLOBAL);
        self.write_bytes(module.as_bytes());
        self.write_u8(b'\n');
        self.write_bytes(q.name.as_bytes());
        self.write_u8(b'\n');
        Ok(())
    }

    // -- Memo --

    fn memo_get(&mut self, id: ObjectId) -> bool {
        let Some(&index) = self.memo.get(&id) else {
            return false;
        };
        if !self.binary() {
            self.write_line(GET, &index.to_string());
        } else if index < 256 {
            self.write_u8(BINGET);
            self.write_u8(index as u8);
        } else {
            self.write_u8(LONG_BINGET);
            self.write_bytes(&index.to_le_bytes());
        }
        true
    }

    fn memoize(&mut self, id: ObjectId) {
        let index = self.memo.len() as u32;
        self.memo.insert(id, index);
        if !self.binary() {
            self.write_line(PUT, &index.to_string());
        } else if index < 256 {
            self.write_u8(BINPUT);
            self.write_u8(index as u8);
        } else {
            self.write_u8(LONG_BINPUT);
            self.write_bytes(&index.to_le_bytes());
        }
    }

    // -- Heap objects --

    fn encode_object(&mut self, id: ObjectId) -> Result<(), EncodeError> {
        if self.memo_get(id) {
            return Ok(());
        }
        if self.reducing.contains(&id) {
            return Err(EncodeError::Unsupported(format!(
                "object {id} is reachable from its own constructor arguments"
            )));
        }
        match self.object(id)? {
            Object::List(items) => {
                // empty, memoize, fill: a list may contain itself
                if self.binary() {
                    self.write_u8(EMPTY_LIST);
                } else {
                    self.write_u8(MARK);
                    self.write_u8(LIST);
                }
                self.memoize(id);
                self.append_items(items)?;
            }
            Object::Dict(map) => {
                if self.binary() {
                    self.write_u8(EMPTY_DICT);
                } else {
                    self.write_u8(MARK);
                    self.write_u8(DICT);
                }
                self.memoize(id);
                let mut pairs: Vec<(&Value, &Value)> = map.iter().collect();
                pairs.sort_by_cached_key(|(k, _)| canonical_key(k));
                self.set_items(&pairs)?;
            }
            Object::Set(set) => {
                let mut items: Vec<Value> = set.iter().cloned().collect();
                items.sort_by_cached_key(canonical_key);
                self.reduce_then_memoize(id, &QualName::new("builtins", "set"), |enc| {
                    enc.write_arg_tuple(1, |enc| enc.write_fresh_list(&items))
                })?;
            }
            Object::Array(arr) if self.protocol >= 3 => {
                let (mformat, bytes) = arr.to_machine_bytes();
                let args = [
                    Value::Global(QualName::new("array", "array")),
                    Value::Str(arr.typecode().to_string()),
                    Value::Int(mformat),
                    Value::Bytes(bytes),
                ];
                let callable = QualName::new("array", "_array_reconstructor");
                self.reduce_then_memoize(id, &callable, |enc| enc.encode_tuple(&args))?;
            }
            Object::Array(arr) => {
                let items = arr.to_values().map_err(EncodeError::InvalidValue)?;
                let typecode = Value::Str(arr.typecode().to_string());
                self.reduce_then_memoize(id, &QualName::new("array", "array"), |enc| {
                    enc.write_arg_tuple(2, |enc| {
                        enc.encode_value(&typecode)?;
                        enc.write_fresh_list(&items)
                    })
                })?;
            }
            Object::Instance(inst) => self.encode_instance(id, inst)?,
        }
        Ok(())
    }

    fn encode_instance(&mut self, id: ObjectId, inst: &'h Instance) -> Result<(), EncodeError> {
        match &inst.native {
            Native::Custom(_) => {
                return Err(EncodeError::Unsupported(format!(
                    "custom object of class {}",
                    inst.class
                )))
            }
            Native::Plain => {
                self.write_global(&inst.class)?;
                if self.protocol >= 2 {
                    self.write_u8(EMPTY_TUPLE);
                    self.write_u8(NEWOBJ);
                } else {
                    self.encode_tuple(&[])?;
                    self.write_u8(REDUCE);
                }
                self.memoize(id);
            }
            native => {
                let Some((callable, args)) = native_reduce(native) else {
                    return Err(EncodeError::Unsupported(format!(
                        "instance of class {}",
                        inst.class
                    )));
                };
                self.reduce_then_memoize(id, &callable, |enc| enc.encode_tuple(&args))?;
            }
        }
        if !inst.attrs.is_empty() {
            let mut keys: Vec<&String> = inst.attrs.keys().collect();
            keys.sort();
            let names: Vec<Value> = keys.iter().map(|k| Value::Str((*k).clone())).collect();
            let pairs: Vec<(&Value, &Value)> = names
                .iter()
                .zip(keys.iter().map(|k| &inst.attrs[*k]))
                .collect();
            if self.binary() {
                self.write_u8(EMPTY_DICT);
            } else {
                self.write_u8(MARK);
                self.write_u8(DICT);
            }
            self.set_items(&pairs)?;
            self.write_u8(BUILD);
        }
        Ok(())
    }

    /// GLOBAL callable, arguments, REDUCE, then memoize the result. The
    /// object cannot be referenced until REDUCE has run.
    fn reduce_then_memoize(
        &mut self,
        id: ObjectId,
        callable: &QualName,
        write_args: impl FnOnce(&mut Self) -> Result<(), EncodeError>,
    ) -> Result<(), EncodeError> {
        self.reducing.insert(id);
        self.write_global(callable)?;
        write_args(self)?;
        self.write_u8(REDUCE);
        self.reducing.remove(&id);
        self.memoize(id);
        Ok(())
    }

    /// Write an `n`-item argument tuple whose items come from `write_items`.
    fn write_arg_tuple(
        &mut self,
        n: usize,
        write_items: impl FnOnce(&mut Self) -> Result<(), EncodeError>,
    ) -> Result<(), EncodeError> {
        if self.protocol >= 2 && (1..=3).contains(&n) {
            write_items(self)?;
            self.write_u8(match n {
                1 => TUPLE1,
                2 => TUPLE2,
                _ => TUPLE3,
            });
        } else {
            self.write_u8(MARK);
            write_items(self)?;
            self.write_u8(TUPLE);
        }
        Ok(())
    }

    /// A list that exists only as a constructor argument (not a heap object).
    fn write_fresh_list(&mut self, items: &[Value]) -> Result<(), EncodeError> {
        if self.binary() {
            self.write_u8(EMPTY_LIST);
        } else {
            self.write_u8(MARK);
            self.write_u8(LIST);
        }
        self.append_items(items)
    }

    fn append_items(&mut self, items: &[Value]) -> Result<(), EncodeError> {
        if items.is_empty() {
            return Ok(());
        }
        if self.binary() {
            self.write_u8(MARK);
            for item in items {
                self.encode_value(item)?;
            }
            self.write_u8(APPENDS);
        } else {
            for item in items {
                self.encode_value(item)?;
                self.write_u8(APPEND);
            }
        }
        Ok(())
    }

    fn set_items(&mut self, pairs: &[(&Value, &Value)]) -> Result<(), EncodeError> {
        if pairs.is_empty() {
            return Ok(());
        }
        if self.binary() {
            self.write_u8(MARK);
            for (k, v) in pairs {
                self.encode_value(k)?;
                self.encode_value(v)?;
            }
            self.write_u8(SETITEMS);
        } else {
            for (k, v) in pairs {
                self.encode_value(k)?;
                self.encode_value(v)?;
                self.write_u8(SETITEM);
            }
        }
        Ok(())
    }
}

/// Sort key that gives hash containers a stable emission order.
fn canonical_key(value: &Value) -> String {
    format!("{value:?}")
}
