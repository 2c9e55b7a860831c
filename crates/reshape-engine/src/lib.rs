pub mod context;
pub mod dedupe;
pub mod engine;
pub mod mapping;
pub mod state;
pub mod transform;

pub use context::{DedupeConfig, DedupeStrategy, ProcessingContext};
pub use dedupe::{ConcatDedupe, DropDedupe};
pub use engine::{
    CancelToken, Processor, RunOutcome, ensure_engine_listener, install_engine_listener,
};
pub use mapping::{
    MappingError, Slot, collect_all_sources, default_output_path, output_columns,
    parse_source_id, validate_mapping,
};
pub use state::{FileFlags, FileList, FileStage, FileStatus, State, default_state};
pub use transform::{apply_mapping, combine_sources};
