use std::{
    fs,
    path::Path,
    sync::{Mutex, MutexGuard},
};

use rusqlite::{params, Connection, OptionalExtension};

use crate::config::{AssistantConfig, TransportKind};
use crate::error::SettingsError;

pub const DB_FILE_NAME: &str = "assistant.db";

const SETTING_TRANSPORT: &str = "assistant_transport";
const SETTING_PROVIDER_BASE_URL: &str = "assistant_provider_base_url";
const SETTING_BACKEND_BASE_URL: &str = "assistant_backend_base_url";
const SETTING_DEFAULT_MODEL: &str = "assistant_default_model";
const SETTING_REQUEST_TIMEOUT: &str = "assistant_request_timeout_secs";

/// Key/value settings persisted in a local SQLite file.
pub struct SettingsStore {
    connection: Mutex<Connection>,
}

impl SettingsStore {
    pub fn open(path: &Path) -> Result<Self, SettingsError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        Self::from_connection(Connection::open(path)?)
    }

    pub fn open_in_memory() -> Result<Self, SettingsError> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(connection: Connection) -> Result<Self, SettingsError> {
        create_tables(&connection)?;
        Ok(Self {
            connection: Mutex::new(connection),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, SettingsError> {
        self.connection.lock().map_err(|_| SettingsError::Poisoned)
    }

    pub fn get_value(&self, key: &str) -> Result<Option<String>, SettingsError> {
        let connection = self.lock()?;
        Ok(get_setting_value(&connection, key)?)
    }

    pub fn set_value(&self, key: &str, value: &str) -> Result<(), SettingsError> {
        let connection = self.lock()?;
        Ok(set_setting_value(&connection, key, value)?)
    }

    /// Reads the stored configuration. Keys that were never written keep
    /// their default.
    pub fn load_config(&self) -> Result<AssistantConfig, SettingsError> {
        let connection = self.lock()?;
        let mut config = AssistantConfig::default();

        if let Some(value) = get_setting_value(&connection, SETTING_TRANSPORT)? {
            config.transport =
                TransportKind::parse(&value).ok_or_else(|| SettingsError::InvalidValue {
                    key: SETTING_TRANSPORT.to_string(),
                    value: value.clone(),
                })?;
        }
        if let Some(value) = non_empty(get_setting_value(&connection, SETTING_PROVIDER_BASE_URL)?)
        {
            config.provider_base_url = value;
        }
        if let Some(value) = non_empty(get_setting_value(&connection, SETTING_BACKEND_BASE_URL)?) {
            config.backend_base_url = value;
        }
        if let Some(value) = non_empty(get_setting_value(&connection, SETTING_DEFAULT_MODEL)?) {
            config.default_model = value;
        }
        if let Some(value) = get_setting_value(&connection, SETTING_REQUEST_TIMEOUT)? {
            config.request_timeout_secs =
                value
                    .trim()
                    .parse::<u64>()
                    .map_err(|_| SettingsError::InvalidValue {
                        key: SETTING_REQUEST_TIMEOUT.to_string(),
                        value: value.clone(),
                    })?;
        }

        Ok(config)
    }

    pub fn save_config(&self, config: &AssistantConfig) -> Result<(), SettingsError> {
        let mut connection = self.lock()?;
        let tx = connection.transaction()?;
        set_setting_value(&tx, SETTING_TRANSPORT, config.transport.as_str())?;
        set_setting_value(&tx, SETTING_PROVIDER_BASE_URL, &config.provider_base_url)?;
        set_setting_value(&tx, SETTING_BACKEND_BASE_URL, &config.backend_base_url)?;
        set_setting_value(&tx, SETTING_DEFAULT_MODEL, &config.default_model)?;
        set_setting_value(
            &tx,
            SETTING_REQUEST_TIMEOUT,
            &config.request_timeout_secs.to_string(),
        )?;
        tx.commit()?;
        tracing::info!(
            transport = config.transport.as_str(),
            model = %config.default_model,
            "assistant settings saved"
        );
        Ok(())
    }
}

fn create_tables(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute_batch(
        "
    CREATE TABLE IF NOT EXISTS settings (
      key TEXT PRIMARY KEY,
      value TEXT NOT NULL
    );
    ",
    )
}

fn set_setting_value(
    connection: &Connection,
    key: &str,
    value: &str,
) -> Result<(), rusqlite::Error> {
    connection.execute(
        "
    INSERT INTO settings (key, value)
    VALUES (?1, ?2)
    ON CONFLICT(key) DO UPDATE SET value = excluded.value
    ",
        params![key, value],
    )?;

    Ok(())
}

fn get_setting_value(
    connection: &Connection,
    key: &str,
) -> Result<Option<String>, rusqlite::Error> {
    connection
        .query_row(
            "SELECT value FROM settings WHERE key = ?1",
            params![key],
            |row| row.get(0),
        )
        .optional()
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|text| text.trim().to_string())
        .filter(|text| !text.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use uuid::Uuid;

    fn make_temp_dir(prefix: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("{prefix}-{}", Uuid::new_v4()));
        fs::create_dir_all(&dir).expect("temporary directory should be created");
        dir
    }

    #[test]
    fn empty_store_yields_default_config() {
        let store = SettingsStore::open_in_memory().expect("in-memory store should open");
        let config = store.load_config().expect("load should succeed");
        assert_eq!(config, AssistantConfig::default());
    }

    #[test]
    fn saved_config_survives_reopen() {
        let dir = make_temp_dir("assistant-settings");
        let db_path = dir.join(DB_FILE_NAME);
        let config = AssistantConfig {
            transport: TransportKind::Proxied,
            backend_base_url: "http://127.0.0.1:9000".to_string(),
            default_model: "gemini-1.5-pro".to_string(),
            request_timeout_secs: 12,
            ..AssistantConfig::default()
        };

        {
            let store = SettingsStore::open(&db_path).expect("store should open");
            store.save_config(&config).expect("save should succeed");
        }

        let reopened = SettingsStore::open(&db_path).expect("store should reopen");
        assert_eq!(reopened.load_config().expect("load should succeed"), config);

        let _ = fs::remove_dir_all(dir);
    }

    #[test]
    fn invalid_timeout_is_reported_with_its_key() {
        let store = SettingsStore::open_in_memory().expect("in-memory store should open");
        store
            .set_value(SETTING_REQUEST_TIMEOUT, "soon")
            .expect("raw write should succeed");

        match store.load_config() {
            Err(SettingsError::InvalidValue { key, value }) => {
                assert_eq!(key, SETTING_REQUEST_TIMEOUT);
                assert_eq!(value, "soon");
            }
            other => panic!("expected InvalidValue, got {other:?}"),
        }
    }

    #[test]
    fn blank_model_falls_back_to_default() {
        let store = SettingsStore::open_in_memory().expect("in-memory store should open");
        store
            .set_value(SETTING_DEFAULT_MODEL, "   ")
            .expect("raw write should succeed");
        let config = store.load_config().expect("load should succeed");
        assert_eq!(config.default_model, crate::config::DEFAULT_MODEL);
    }
}
