use super::*;
use crate::auth_key::{AUTH_KEY_PREFIX, UlidSessionKeys};
use crate::schema::keys;
use crate::storage::{FileStorage, MemoryStorage};
use serde_json::json;
use std::sync::{OnceLock, Weak};
use tempfile::tempdir;

#[derive(Default)]
struct RecordingObserver {
    seen: Mutex<Vec<(u16, u16)>>,
}

impl SettingObserver for RecordingObserver {
    fn on_changed(&self, previous: &Setting, current: &Setting) {
        self.seen
            .lock()
            .unwrap()
            .push((previous.port, current.port));
    }
}

fn memory_store(document: serde_json::Value) -> (Arc<MemoryStorage>, ConfigStore) {
    let storage = Arc::new(MemoryStorage::from_json(document));
    let store = ConfigStore::open(storage.clone(), Arc::new(UlidSessionKeys)).unwrap();
    (storage, store)
}

#[test]
fn test_open_publishes_loaded_setting() {
    let (storage, store) = memory_store(json!({"port": 9000}));
    assert_eq!(store.snapshot().port, 9000);
    assert!(storage.read(keys::AUTH_KEY).is_some());
}

#[test]
fn test_open_propagates_load_errors() {
    let storage = Arc::new(MemoryStorage::from_json(json!({"port": "x"})));
    let result = ConfigStore::open(storage, Arc::new(UlidSessionKeys));
    assert!(result.unwrap_err().is_parse());
}

#[test]
fn test_update_persists_and_notifies() {
    let (storage, store) = memory_store(json!({"authKey": "k"}));
    let observer = Arc::new(RecordingObserver::default());
    store.add_observer(observer.clone());
    let mut rx = store.subscribe();

    let updated = store.update(|s| s.port = 9100).unwrap();

    assert_eq!(updated.port, 9100);
    assert_eq!(storage.read(keys::PORT), Some(json!(9100)));
    assert!(rx.has_changed().unwrap());
    assert_eq!(rx.borrow_and_update().port, 9100);
    assert_eq!(*observer.seen.lock().unwrap(), vec![(8080, 9100)]);
}

#[test]
fn test_noop_update_publishes_nothing() {
    let (_storage, store) = memory_store(json!({"authKey": "k"}));
    let observer = Arc::new(RecordingObserver::default());
    store.add_observer(observer.clone());
    let rx = store.subscribe();

    store.update(|s| s.port = 8080).unwrap();

    assert!(!rx.has_changed().unwrap());
    assert!(observer.seen.lock().unwrap().is_empty());
}

#[test]
fn test_invalid_update_keeps_previous_snapshot() {
    let (storage, store) = memory_store(json!({"authKey": "k"}));
    let before = store.snapshot();

    let err = store
        .update(|s| {
            s.heartbeat.enable = true;
            s.heartbeat.period = 0;
        })
        .unwrap_err();

    assert!(err.is_validation());
    assert_eq!(*store.snapshot(), *before);
    assert!(storage.read(keys::HEARTBEAT).is_none());
}

#[test]
fn test_failed_persist_keeps_previous_snapshot() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("setting.yml");
    std::fs::write(&path, "authKey: k\n").unwrap();
    let store = ConfigStore::open(
        Arc::new(FileStorage::open(&path).unwrap()),
        Arc::new(UlidSessionKeys),
    )
    .unwrap();

    // Replace the file with a non-empty directory so the rename fails.
    std::fs::remove_file(&path).unwrap();
    std::fs::create_dir_all(path.join("blocker")).unwrap();

    let err = store.update(|s| s.port = 1).unwrap_err();
    assert!(err.is_persist());
    assert_eq!(store.snapshot().port, 8080);
}

#[test]
fn test_save_replaces_whole_setting() {
    let (storage, store) = memory_store(json!({"authKey": "k"}));
    let mut next = Setting::clone(&store.snapshot());
    next.host = "127.0.0.1".to_string();
    next.report.enable = true;

    assert!(store.save(next.clone()).unwrap());
    assert_eq!(*store.snapshot(), next);
    assert_eq!(storage.read(keys::HOST), Some(json!("127.0.0.1")));
    assert!(!store.save(next).unwrap());
}

#[test]
fn test_rotate_auth_key() {
    let (storage, store) = memory_store(json!({"authKey": "INITKEYold"}));

    let key = store.rotate_auth_key().unwrap();

    assert!(key.starts_with(AUTH_KEY_PREFIX));
    assert_ne!(key, "INITKEYold");
    assert_eq!(store.snapshot().auth_key, key);
    assert_eq!(storage.read(keys::AUTH_KEY), Some(json!(key)));
}

#[test]
fn test_reload_picks_up_external_edit() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("setting.toml");
    std::fs::write(&path, "authKey = \"k\"\nport = 1\n").unwrap();
    let store = ConfigStore::open(
        Arc::new(FileStorage::open(&path).unwrap()),
        Arc::new(UlidSessionKeys),
    )
    .unwrap();
    assert!(!store.reload().unwrap());

    std::fs::write(&path, "authKey = \"k\"\nport = 2\n").unwrap();
    assert!(store.reload().unwrap());
    assert_eq!(store.snapshot().port, 2);
}

#[test]
fn test_reload_rejects_invalid_document() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("setting.json");
    std::fs::write(&path, r#"{"authKey": "k", "port": 1}"#).unwrap();
    let store = ConfigStore::open(
        Arc::new(FileStorage::open(&path).unwrap()),
        Arc::new(UlidSessionKeys),
    )
    .unwrap();

    std::fs::write(&path, r#"{"authKey": "k", "port": "one"}"#).unwrap();
    assert!(store.reload().unwrap_err().is_parse());
    assert_eq!(store.snapshot().port, 1);

    std::fs::write(&path, "not json").unwrap();
    assert!(store.reload().is_err());
    assert_eq!(store.snapshot().port, 1);
}

#[test]
fn test_reload_restores_removed_auth_key() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("setting.yml");
    std::fs::write(&path, "authKey: INITKEYkeep\n").unwrap();
    let store = ConfigStore::open(
        Arc::new(FileStorage::open(&path).unwrap()),
        Arc::new(UlidSessionKeys),
    )
    .unwrap();

    std::fs::write(&path, "port: 9000\n").unwrap();
    assert!(store.reload().unwrap());

    let current = store.snapshot();
    assert_eq!(current.auth_key, "INITKEYkeep");
    assert_eq!(current.port, 9000);
    let on_disk = FileStorage::open(&path).unwrap();
    assert_eq!(on_disk.read(keys::AUTH_KEY), Some(json!("INITKEYkeep")));
}

/// Bumps 9100 to 9200 from inside the notification.
#[derive(Default)]
struct ChainedUpdate {
    store: OnceLock<Weak<ConfigStore>>,
}

impl SettingObserver for ChainedUpdate {
    fn on_changed(&self, _previous: &Setting, current: &Setting) {
        if current.port != 9100 {
            return;
        }
        if let Some(store) = self.store.get().and_then(Weak::upgrade) {
            store.update(|s| s.port = 9200).unwrap();
        }
    }
}

#[test]
fn test_observer_can_update_store() {
    let (storage, store) = memory_store(json!({"authKey": "k"}));
    let store = Arc::new(store);
    let observer = Arc::new(ChainedUpdate::default());
    observer.store.set(Arc::downgrade(&store)).unwrap();
    store.add_observer(observer);

    let (done_tx, done_rx) = std::sync::mpsc::channel();
    let worker = Arc::clone(&store);
    std::thread::spawn(move || {
        let result = worker.update(|s| s.port = 9100).map(|s| s.port);
        let _ = done_tx.send(result);
    });

    let returned = done_rx
        .recv_timeout(std::time::Duration::from_secs(5))
        .expect("update from an observer must not deadlock")
        .unwrap();
    assert_eq!(returned, 9100);
    assert_eq!(store.snapshot().port, 9200);
    assert_eq!(storage.read(keys::PORT), Some(json!(9200)));
}

#[test]
fn test_rejected_reload_leaves_storage_untouched() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("setting.json");
    std::fs::write(&path, r#"{"authKey": "k", "port": 1}"#).unwrap();
    let store = ConfigStore::open(
        Arc::new(FileStorage::open(&path).unwrap()),
        Arc::new(UlidSessionKeys),
    )
    .unwrap();

    std::fs::write(&path, r#"{"authKey": "k", "port": 2, "host": ""}"#).unwrap();
    assert!(store.reload().unwrap_err().is_validation());
    assert_eq!(store.storage().read(keys::PORT), Some(json!(1)));

    // A later unrelated update writes the last good document, not the rejected one.
    store.update(|s| s.cache_size = 10).unwrap();
    let on_disk = FileStorage::open(&path).unwrap();
    assert_eq!(on_disk.read(keys::PORT), Some(json!(1)));
    assert_eq!(on_disk.read(keys::HOST), Some(json!("0.0.0.0")));
    assert_eq!(on_disk.read(keys::CACHE_SIZE), Some(json!(10)));
}
