//! Kiln Schema - Runtime type resolution
//!
//! Maps string type tags discovered in export data to type descriptors:
//! a constructible default instance plus the reflective field list the
//! property deserializer walks. The catalog is loaded from TOML files at
//! startup; nothing here is mutated while a batch is being imported.

mod catalog;
mod descriptor;
mod registry;
mod value;

pub use descriptor::{FieldDescriptor, FieldKind, FloatWidth, IntWidth, TypeDescriptor, ValueCategory};
pub use registry::{FallbackFactory, TypeRegistry};
pub use value::{ChannelMask, Fields, PinLink, Value};
