pub mod digest;
pub mod file_hasher;
pub mod ignore;
pub mod walker;

pub use digest::{Digest, DigestBuilder};
pub use file_hasher::{hash_file, hash_reader};
pub use ignore::IgnoreRules;
pub use walker::{scan, FileRecord, ScanFilters, SourceSummary};
