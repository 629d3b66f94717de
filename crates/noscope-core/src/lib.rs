pub mod capability_store;
pub mod context;
pub mod deadline;
pub mod event_log;
pub mod redaction;
pub mod safety;
pub mod spec_parser;

pub use capability_store::*;
pub use context::*;
pub use deadline::*;
pub use event_log::*;
pub use redaction::*;
pub use safety::*;
pub use spec_parser::{parse_spec, parse_spec_str, spec_template};
