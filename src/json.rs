use std::collections::HashSet;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use serde_json::{json, Map, Value as Json};

use crate::array::ArrayItems;
use crate::error::ExportError;
use crate::value::{Graph, Heap, Instance, Native, Object, ObjectId, Value};

/// Convert a decoded graph to JSON with typed markers (`@t`, `@b`, `@set`,
/// `@dec`, `@cls`, ...).
///
/// Each heap object is rendered in full once, at its first occurrence in
/// depth-first order; every later occurrence, including cycles back to an
/// object still being rendered, is `{"@ref": id}` with the heap index.
pub fn graph_to_json(graph: &Graph) -> Result<Json, ExportError> {
    Renderer::new(graph.heap()).value(graph.root())
}

struct Renderer<'h> {
    heap: &'h Heap,
    /// Objects already rendered (or being rendered) in full
    seen: HashSet<ObjectId>,
}

impl<'h> Renderer<'h> {
    fn new(heap: &'h Heap) -> Self {
        Self {
            heap,
            seen: HashSet::new(),
        }
    }

    fn value(&mut self, val: &Value) -> Result<Json, ExportError> {
        Ok(match val {
            Value::None => Json::Null,
            Value::Bool(b) => Json::Bool(*b),
            Value::Int(i) => json!(*i),
            Value::Float(f) => float(*f),
            Value::Str(s) => Json::String(s.clone()),
            Value::Bytes(b) => json!({"@b": BASE64.encode(b)}),
            Value::Tuple(items) => json!({"@t": self.seq(items)?}),
            Value::Global(q) => json!({"@cls": [q.module, q.name]}),
            Value::List(id)
            | Value::Dict(id)
            | Value::Set(id)
            | Value::Array(id)
            | Value::Instance(id) => self.object(*id)?,
        })
    }

    fn seq<'v>(
        &mut self,
        items: impl IntoIterator<Item = &'v Value>,
    ) -> Result<Vec<Json>, ExportError> {
        items.into_iter().map(|item| self.value(item)).collect()
    }

    fn object(&mut self, id: ObjectId) -> Result<Json, ExportError> {
        if !self.seen.insert(id) {
            return Ok(json!({"@ref": id.index()}));
        }
        let obj = self.heap.get(id).ok_or(ExportError::DanglingObject(id))?;
        self.render(obj)
    }

    /// Ordering key for members of hash containers, rendered independently
    /// of what this renderer has already seen.
    fn sort_key(&self, val: &Value) -> String {
        Renderer::new(self.heap)
            .value(val)
            .map(|j| j.to_string())
            .unwrap_or_default()
    }

    fn render(&mut self, obj: &'h Object) -> Result<Json, ExportError> {
        Ok(match obj {
            Object::List(items) => Json::Array(self.seq(items)?),
            Object::Dict(map) => {
                if map.keys().all(|k| matches!(k, Value::Str(_))) {
                    let mut entries: Vec<(&String, &Value)> = map
                        .iter()
                        .filter_map(|(k, v)| match k {
                            Value::Str(key) => Some((key, v)),
                            _ => None,
                        })
                        .collect();
                    entries.sort_by(|a, b| a.0.cmp(b.0));
                    let mut out = Map::new();
                    for (key, v) in entries {
                        out.insert(key.clone(), self.value(v)?);
                    }
                    Json::Object(out)
                } else {
                    let mut entries: Vec<(String, &Value, &Value)> =
                        map.iter().map(|(k, v)| (self.sort_key(k), k, v)).collect();
                    entries.sort_by(|a, b| a.0.cmp(&b.0));
                    let mut pairs = Vec::with_capacity(entries.len());
                    for (_, k, v) in entries {
                        pairs.push(json!([self.value(k)?, self.value(v)?]));
                    }
                    json!({"@d": pairs})
                }
            }
            Object::Set(set) => {
                let mut members: Vec<(String, &Value)> =
                    set.iter().map(|v| (self.sort_key(v), v)).collect();
                members.sort_by(|a, b| a.0.cmp(&b.0));
                json!({"@set": self.seq(members.into_iter().map(|(_, v)| v))?})
            }
            Object::Array(arr) => {
                json!({"@array": {"type": arr.typecode().to_string(), "items": array_items(arr.items())}})
            }
            Object::Instance(inst) => self.instance(inst)?,
        })
    }

    fn instance(&mut self, inst: &'h Instance) -> Result<Json, ExportError> {
        let mut out = match &inst.native {
            Native::Decimal(d) => json!({"@dec": d.to_string()}),
            Native::Date(d) => json!({"@date": d.to_string()}),
            Native::Time(t) => json!({"@time": t.to_string()}),
            Native::DateTime(dt) => json!({"@dt": dt.to_string()}),
            Native::TimeDelta(td) => json!({"@td": [td.days, td.seconds, td.microseconds]}),
            Native::Complex(c) => json!({"@complex": [float(c.re), float(c.im)]}),
            Native::Plain | Native::Custom(_) => {
                json!({"@cls": [inst.class.module, inst.class.name], "@s": {}})
            }
        };
        if !inst.attrs.is_empty() || out.get("@s").is_some() {
            let mut names: Vec<&String> = inst.attrs.keys().collect();
            names.sort();
            let mut attrs = Map::new();
            for name in names {
                attrs.insert(name.clone(), self.value(&inst.attrs[name])?);
            }
            if let Json::Object(map) = &mut out {
                map.insert("@s".to_string(), Json::Object(attrs));
            }
        }
        Ok(out)
    }
}

/// Array elements straight from their machine storage, so unsigned 64-bit
/// values keep their full range.
fn array_items(items: &ArrayItems) -> Vec<Json> {
    fn ints<T: Copy + Into<serde_json::Number>>(v: &[T]) -> Vec<Json> {
        v.iter().map(|&x| Json::Number(x.into())).collect()
    }
    match items {
        ArrayItems::I8(v) => ints(v),
        ArrayItems::U8(v) => ints(v),
        ArrayItems::I16(v) => ints(v),
        ArrayItems::U16(v) => ints(v),
        ArrayItems::I32(v) => ints(v),
        ArrayItems::U32(v) => ints(v),
        ArrayItems::I64(v) => ints(v),
        ArrayItems::U64(v) => ints(v),
        ArrayItems::F32(v) => v.iter().map(|&x| float(f64::from(x))).collect(),
        ArrayItems::F64(v) => v.iter().map(|&x| float(x)).collect(),
        ArrayItems::Char(v) => v.iter().map(|c| Json::String(c.to_string())).collect(),
    }
}

fn float(f: f64) -> Json {
    serde_json::Number::from_f64(f)
        .map(Json::Number)
        .unwrap_or(Json::Null)
}
