use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use mah_config::{
    AuthKeyProvider, ConfigStore, FileStorage, MemoryStorage, Setting, Storage, StorageFormat,
    UlidSessionKeys, keys, write_atomic,
};
use mah_core::OutputFormat;
use serde_json::Value;
use tracing::info;

const MASKED_KEY: &str = "********";

/// Open the setting file as a shared store. Generates an auth key if missing.
pub(crate) fn open_store(path: &Path) -> Result<Arc<ConfigStore>> {
    let storage = FileStorage::open(path)
        .with_context(|| format!("failed to read setting file {}", path.display()))?;
    let store = ConfigStore::open(Arc::new(storage), Arc::new(UlidSessionKeys))
        .with_context(|| format!("invalid setting file {}", path.display()))?;
    Ok(Arc::new(store))
}

pub(crate) fn handle_config_path(path: &Path) -> Result<()> {
    println!("{}", path.display());
    if !path.exists() {
        eprintln!("(does not exist yet; run 'mah config init' to create it)");
    }
    Ok(())
}

pub(crate) fn handle_config_show(path: &Path, format: OutputFormat, reveal: bool) -> Result<()> {
    let store = open_store(path)?;
    print!("{}", render_setting(&store.snapshot(), format, reveal)?);
    Ok(())
}

fn render_setting(setting: &Setting, format: OutputFormat, reveal: bool) -> Result<String> {
    let mut document = setting.to_document()?;
    if !reveal {
        document.insert(keys::AUTH_KEY.to_string(), Value::from(MASKED_KEY));
    }
    match format {
        OutputFormat::Json => Ok(serde_json::to_string_pretty(&document)? + "\n"),
        OutputFormat::Text => Ok(serde_yaml::to_string(&document)?),
    }
}

pub(crate) fn handle_config_validate(path: &Path) -> Result<()> {
    if !path.exists() {
        bail!(
            "No setting file at {}. Run 'mah config init' first.",
            path.display()
        );
    }
    let setting = check_setting_file(path)?;
    eprintln!(
        "{} is valid (server binds {})",
        path.display(),
        setting.bind_address()
    );
    Ok(())
}

/// Load the file into a scratch store so validation never writes to it.
fn check_setting_file(path: &Path) -> Result<Setting> {
    let file = FileStorage::open(path)
        .with_context(|| format!("failed to read setting file {}", path.display()))?;
    if file.read(keys::AUTH_KEY).is_none() {
        info!("no authKey set; one will be generated on first start");
    }
    let scratch = MemoryStorage::from_document(file.document());
    Setting::load(&scratch, &UlidSessionKeys)
        .with_context(|| format!("invalid setting file {}", path.display()))
}

pub(crate) fn handle_config_init(path: &Path, force: bool) -> Result<()> {
    if path.exists() && !force {
        bail!(
            "{} already exists; pass --force to overwrite it",
            path.display()
        );
    }
    let auth_key = AuthKeyProvider::new(&UlidSessionKeys).generate();
    write_default_setting(path, &auth_key)?;
    eprintln!("Initialized setting file at: {}", path.display());
    Ok(())
}

/// YAML files get the commented template; other formats a plain dump of defaults.
fn write_default_setting(path: &Path, auth_key: &str) -> Result<()> {
    let format = StorageFormat::from_path(path);
    if format == StorageFormat::Yaml {
        write_atomic(path, &Setting::default_template(auth_key))?;
        return Ok(());
    }

    let mut seed = serde_json::Map::new();
    seed.insert(keys::AUTH_KEY.to_string(), Value::from(auth_key));
    let setting = Setting::load(&MemoryStorage::from_document(seed), &UlidSessionKeys)?;
    let content = format.render_document(path, &setting.to_document()?)?;
    write_atomic(path, &content)?;
    Ok(())
}

pub(crate) fn handle_config_rotate_key(path: &Path, format: OutputFormat) -> Result<()> {
    let store = open_store(path)?;
    let key = store.rotate_auth_key()?;
    match format {
        OutputFormat::Json => println!("{}", serde_json::json!({ "authKey": key })),
        OutputFormat::Text => println!("{key}"),
    }
    eprintln!("API clients must use the new key from now on.");
    Ok(())
}

#[cfg(test)]
#[path = "config_cmds_tests.rs"]
mod tests;
