//! Decoder and paired encoder for the pickle wire format, protocols 0 to 3.
//!
//! [`decode`] runs the stack machine over a byte buffer and returns a
//! [`Graph`]: a root [`Value`] plus the [`Heap`] of mutable objects it refers
//! to. Shared references and cycles in the stream stay shared in the graph.
//! GLOBAL names resolve through a [`ConstructorRegistry`]; anything not
//! registered is rejected, so decoding never runs arbitrary callables.
//!
//! ```no_run
//! use pickle_graph::{decode, encode, EncodeOptions};
//!
//! let graph = decode(b"\x80\x02]q\x00(K\x01h\x00e.")?;
//! let bytes = encode(&graph, &EncodeOptions::default())?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

mod array;
mod config;
mod cursor;
mod decode;
mod encode;
mod error;
mod escape;
mod json;
mod known_types;
mod memo;
mod opcodes;
mod registry;
mod value;

pub use crate::array::{ArrayItems, TypedArray};
pub use crate::config::{DecodeOptions, EncodeOptions};
pub use crate::decode::{decode, decode_with, Unpickler};
pub use crate::encode::{encode, encode_value};
pub use crate::error::{DecodeError, EncodeError, ErrorKind, ExportError, ShapeError};
pub use crate::json::graph_to_json;
pub use crate::known_types::{Complex, Date, DateTime, Decimal, Time, TimeDelta};
pub use crate::opcodes::HIGHEST_PROTOCOL;
pub use crate::registry::{
    attribute_bag, global as global_registry, register_global, Constructor, ConstructorRegistry,
};
pub use crate::value::{
    CustomObject, Graph, Heap, Instance, Native, Object, ObjectId, QualName, Value,
};
