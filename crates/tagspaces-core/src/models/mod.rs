pub mod entry;
pub mod location;
pub mod meta;

pub use entry::{FileSystemEntry, Tag};
pub use location::{Location, LocationKind, LocationType};
pub use meta::EntryMeta;
