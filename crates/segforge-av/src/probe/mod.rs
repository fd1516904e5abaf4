//! Probe backends that shell out to external tools.

pub mod ffprobe;

pub use self::ffprobe::{parse_ffprobe_json, probe_with_ffprobe};
