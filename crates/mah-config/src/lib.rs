pub mod auth_key;
pub mod heartbeat;
pub mod paths;
pub mod report;
pub mod schema;
pub mod storage;
pub mod store;
pub mod validate;
pub mod watcher;

pub use auth_key::{AUTH_KEY_PREFIX, AuthKeyProvider, SessionKeyGenerator, UlidSessionKeys};
pub use heartbeat::{HeartbeatPayload, Schedule};
pub use schema::{
    ExtraMap, HeartBeat, RESTART_REQUIRED_KEYS, Report, Reportable, Setting, keys,
};
pub use storage::{
    FileStorage, MemoryStorage, RawDocument, RawValue, Storage, StorageFormat, write_atomic,
};
pub use store::{ConfigStore, SettingObserver};
pub use validate::validate_setting;
pub use watcher::ConfigWatcher;
