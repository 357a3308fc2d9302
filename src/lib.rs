pub mod dumper;
pub mod emitter;
pub mod error;
pub mod keymap;
pub mod loader;
pub mod record;
pub mod registry;
pub mod stats;
pub mod tuple;
pub mod value;
pub mod wire;

pub use dumper::{DumpOptions, Dumper, Replicant};
pub use emitter::{Emitter, Listener};
pub use error::{ReplicateError, Result};
pub use keymap::Keymap;
pub use loader::{Loader, LoaderConfig, UnresolvedPolicy};
pub use registry::{load_fn, LoadReplicant, Loaded, TypeRegistry};
pub use stats::{Stats, Status, Verbosity};
pub use tuple::{attributes, Attributes, Tuple, TupleKey};
pub use value::{AttributeValue, RecordId};
pub use wire::{StreamReader, StreamWriter};
