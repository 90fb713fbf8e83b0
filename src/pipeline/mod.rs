//! Pipeline construction and runtime (C2/C3, spec.md §4.2, §4.3): a pure
//! description layer (`description`, `builder`) the rest of the crate can
//! compare and log without touching GStreamer, plus the adapter that
//! actually runs one (`source`, `sink`, `handle`, `adapter`).

pub mod adapter;
pub mod builder;
pub mod description;
pub mod handle;
pub mod sink;
pub mod source;

pub use adapter::{DrainOutcome, MediaRuntimeAdapter};
pub use description::{
    AbsoluteCrop, EncoderParams, EncoderPreset, PipelineDescription, PipelineRole, SensorMode,
    SinkDescriptor,
};
pub use handle::{HandleEvent, HandleState, PipelineHandle};
