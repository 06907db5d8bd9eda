//! Constructor registry: maps the `module.name` pairs a stream references to
//! strategies that rebuild typed values from an argument tuple.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, OnceLock, RwLock};

use crate::array::{construct_array, construct_array_reconstructor};
use crate::error::ShapeError;
use crate::known_types::{
    construct_bytes, construct_complex, construct_date, construct_datetime, construct_decimal,
    construct_ordered_dict, construct_set, construct_time, construct_timedelta,
};
use crate::value::{Heap, Instance, Native, QualName, Value};

/// Rebuilds a value from the argument tuple of REDUCE or NEWOBJ.
pub trait Constructor: Send + Sync {
    fn construct(&self, args: Vec<Value>, heap: &mut Heap) -> Result<Value, ShapeError>;
}

impl<F> Constructor for F
where
    F: Fn(Vec<Value>, &mut Heap) -> Result<Value, ShapeError> + Send + Sync,
{
    fn construct(&self, args: Vec<Value>, heap: &mut Heap) -> Result<Value, ShapeError> {
        self(args, heap)
    }
}

/// Strategy for user classes whose state arrives entirely through BUILD:
/// yields an empty [`Native::Plain`] instance of `class`.
pub fn attribute_bag(class: QualName) -> impl Constructor {
    move |args: Vec<Value>, heap: &mut Heap| {
        if !args.is_empty() {
            return Err(ShapeError::new(format!(
                "attribute bag takes no arguments, got {}",
                args.len()
            )));
        }
        Ok(heap.alloc_instance(Instance::new(class.clone(), Native::Plain)))
    }
}

#[derive(Clone, Default)]
pub struct ConstructorRegistry {
    entries: HashMap<QualName, Arc<dyn Constructor>>,
}

impl fmt::Debug for ConstructorRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<String> = self.entries.keys().map(|q| q.to_string()).collect();
        names.sort();
        f.debug_struct("ConstructorRegistry")
            .field("entries", &names)
            .finish()
    }
}

impl ConstructorRegistry {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Registry pre-populated with the standard-library types.
    pub fn with_builtins() -> Self {
        let mut reg = Self::empty();
        reg.insert("decimal", "Decimal", construct_decimal);
        reg.insert("datetime", "date", construct_date);
        reg.insert("datetime", "time", construct_time);
        reg.insert("datetime", "datetime", construct_datetime);
        reg.insert("datetime", "timedelta", construct_timedelta);
        // Python 2 streams name builtins `__builtin__`, Python 3 `builtins`
        for module in ["__builtin__", "builtins"] {
            reg.insert(module, "complex", construct_complex);
            reg.insert(module, "set", construct_set);
            reg.insert(module, "frozenset", construct_set);
            reg.insert(module, "bytearray", construct_bytes);
            reg.insert(module, "bytes", construct_bytes);
        }
        reg.insert("collections", "OrderedDict", construct_ordered_dict);
        reg.insert("_codecs", "encode", construct_bytes);
        reg.insert("array", "array", construct_array);
        reg.insert("array", "_array_reconstructor", construct_array_reconstructor);
        reg
    }

    fn insert(&mut self, module: &str, name: &str, strategy: impl Constructor + 'static) {
        self.entries
            .insert(QualName::new(module, name), Arc::new(strategy));
    }

    /// Register (or replace) the strategy for `module.name`.
    pub fn register(
        &mut self,
        module: impl Into<String>,
        name: impl Into<String>,
        strategy: impl Constructor + 'static,
    ) {
        let qualname = QualName::new(module, name);
        tracing::debug!(target: "pickle_graph::registry", %qualname, "registered constructor");
        self.entries.insert(qualname, Arc::new(strategy));
    }

    pub fn resolve(&self, qualname: &QualName) -> Option<Arc<dyn Constructor>> {
        self.entries.get(qualname).cloned()
    }

    pub fn contains(&self, qualname: &QualName) -> bool {
        self.entries.contains_key(qualname)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Process-wide registry
// ---------------------------------------------------------------------------

static GLOBAL: OnceLock<RwLock<Arc<ConstructorRegistry>>> = OnceLock::new();

fn global_cell() -> &'static RwLock<Arc<ConstructorRegistry>> {
    GLOBAL.get_or_init(|| RwLock::new(Arc::new(ConstructorRegistry::with_builtins())))
}

/// Snapshot of the process-wide registry. Later registrations do not affect
/// a snapshot already taken.
pub fn global() -> Arc<ConstructorRegistry> {
    let guard = global_cell()
        .read()
        .unwrap_or_else(|poisoned| poisoned.into_inner());
    Arc::clone(&guard)
}

/// Register a strategy in the process-wide registry. Decodes already in
/// progress keep the table they started with.
pub fn register_global(
    module: impl Into<String>,
    name: impl Into<String>,
    strategy: impl Constructor + 'static,
) {
    let mut guard = global_cell()
        .write()
        .unwrap_or_else(|poisoned| poisoned.into_inner());
    let mut next = ConstructorRegistry::clone(&guard);
    next.register(module, name, strategy);
    *guard = Arc::new(next);
}
