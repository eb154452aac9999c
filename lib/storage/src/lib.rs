pub mod store;
pub mod memory;
pub mod lmdb_storage;
pub mod migrate;

pub use store::{BulkWriteResult, CatalogSnapshot, CatalogStore};
pub use memory::MemoryStore;
pub use lmdb_storage::{CollectionMeta, LmdbCollection, LmdbStorage};
pub use migrate::{export_json, import_json, migrate, read_json_file, MigrationReport};
