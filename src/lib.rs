pub mod error;
mod shared_macros;

pub mod mapped_file;
pub mod format;
pub mod dictzip;
pub mod dict_data;
pub mod collation;
pub mod dictionary;
pub mod generator;

pub mod registry;
pub mod view;
pub mod app;
pub mod config;

pub use app::{Viewer, ViewerEvent};
pub use dictionary::{DictIterator, Dictionary, OpenOptions};
pub use error::{Result, StardictError};
pub use generator::DictionaryWriter;
pub use registry::Registry;
pub use view::{ViewModel, Viewport};
