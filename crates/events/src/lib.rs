// Shared event contract for the repair pipeline.
//
// Purpose
// - Define the Avro record both services agree on, the 5-byte wire envelope,
//   and the schema-registry client used to obtain the schema id at startup.
//
// Boundaries
// - No broker or database code here. Producers and consumers bring their own
//   transport; this crate only encodes and decodes payload bytes.

pub mod codec;
pub mod envelope;
pub mod record;
pub mod registry;

pub use codec::{CodecError, EventCodec};
pub use record::{LocationRecord, MechanicRecord, RepairEventRecord, RAW_SCHEMA};
pub use registry::{RegistryError, SchemaRegistry};
