pub mod backends;
pub mod error;
pub mod factory;
pub mod traits;

pub use backends::csv::CsvHandler;
pub use backends::xlsx::XlsxHandler;
pub use error::IoError;
pub use factory::{HandlerEntry, HandlerFactory, default_factory};
pub use traits::{FrameIter, HandlerId, TableHandler};
