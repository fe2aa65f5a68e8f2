pub mod entry;
pub mod gzip;
pub mod index;
pub mod info;

pub use entry::{decode_entry, DecodedEntry, EntryField, FieldType};
pub use gzip::{GzipHeader, RandomAccessField};
pub use index::{raw_order_cmp, IndexEntry, SynonymEntry};
pub use info::{DictVersion, DictionaryInfo};
