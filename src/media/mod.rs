// Media processing: encoder command assembly, streaming execution and
// system probes.
//
// - commands: abstract command value type with builder-style args and
//   line-streamed execution
// - encoder: full encode invocation assembly (inputs, filter graph,
//   rate control) and stderr progress parsing
// - probe: ffprobe wrappers and GPU detection

pub mod commands;
pub mod encoder;
pub mod probe;

pub use commands::MediaCommand;
pub use encoder::{parse_progress, EncodeCommandBuilder};
