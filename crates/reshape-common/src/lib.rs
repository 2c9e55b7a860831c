pub mod frame;
pub mod skiprows;
pub mod value;

pub use frame::{Frame, FrameError, Row};
pub use skiprows::{SkipRowsError, is_contiguous_prefix, parse_skip_rows, render_skip_rows};
pub use value::Value;
