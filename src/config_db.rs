use std::path::Path;

use redb::{Database, ReadableDatabase, ReadableTable, TableDefinition};

use crate::error::Result;

const SETTINGS: TableDefinition<&str, &str> = TableDefinition::new("settings");

/// Setting key for the ColBERT model ID or local model path.
pub const MODEL_NAME_KEY: &str = "model_name";
/// Setting key for the embedder kind (`colbert` or `hashing`).
pub const EMBEDDER_KEY: &str = "embedder";
/// Setting key for the default number of results per question.
pub const TOP_K_KEY: &str = "top_k";

/// Keys accepted by `docqa config set`.
pub const KNOWN_KEYS: &[&str] = &[MODEL_NAME_KEY, EMBEDDER_KEY, TOP_K_KEY];

/// Persistent user settings stored in the data directory.
pub struct ConfigDb {
    db: Database,
}

impl ConfigDb {
    /// Open or create a settings database at the given path.
    ///
    /// # Examples
    ///
    /// ```
    /// # let tmp = tempfile::tempdir().unwrap();
    /// use docqa::ConfigDb;
    ///
    /// let db = ConfigDb::open(&tmp.path().join("config.redb")).unwrap();
    /// assert!(db.list_settings().unwrap().is_empty());
    /// ```
    pub fn open(path: &Path) -> Result<Self> {
        let db = Database::create(path).map_err(redb::Error::from)?;

        // Ensure the table exists by opening it in a write transaction.
        let txn = db.begin_write()?;
        txn.open_table(SETTINGS)?;
        txn.commit()?;

        Ok(Self { db })
    }

    pub fn set_setting(&self, key: &str, value: &str) -> Result<()> {
        let txn = self.db.begin_write()?;
        {
            let mut table = txn.open_table(SETTINGS)?;
            table.insert(key, value)?;
        }
        txn.commit()?;
        Ok(())
    }

    pub fn get_setting(&self, key: &str) -> Result<Option<String>> {
        let txn = self.db.begin_read()?;
        let table = txn.open_table(SETTINGS)?;
        Ok(table.get(key)?.map(|v| v.value().to_string()))
    }

    /// Get a setting, returning the default if not set.
    pub fn get_setting_or(&self, key: &str, default: &str) -> Result<String> {
        Ok(self
            .get_setting(key)?
            .unwrap_or_else(|| default.to_string()))
    }

    /// Remove a setting. Returns `true` if it was present.
    pub fn remove_setting(&self, key: &str) -> Result<bool> {
        let txn = self.db.begin_write()?;
        let removed = {
            let mut table = txn.open_table(SETTINGS)?;
            table.remove(key)?.is_some()
        };
        txn.commit()?;
        Ok(removed)
    }

    /// All stored settings, sorted by key.
    pub fn list_settings(&self) -> Result<Vec<(String, String)>> {
        let txn = self.db.begin_read()?;
        let table = txn.open_table(SETTINGS)?;
        let mut result = Vec::new();
        for entry in table.iter()? {
            let (k, v) = entry?;
            result.push((k.value().to_string(), v.value().to_string()));
        }
        Ok(result)
    }
}

impl std::fmt::Debug for ConfigDb {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConfigDb").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_db() -> (tempfile::TempDir, ConfigDb) {
        let tmp = tempfile::tempdir().unwrap();
        let db = ConfigDb::open(&tmp.path().join("config.db")).unwrap();
        (tmp, db)
    }

    #[test]
    fn settings_crud() {
        let (_tmp, db) = test_db();

        assert_eq!(db.get_setting(MODEL_NAME_KEY).unwrap(), None);
        assert_eq!(
            db.get_setting_or(MODEL_NAME_KEY, "default/model").unwrap(),
            "default/model"
        );

        db.set_setting(MODEL_NAME_KEY, "custom/model").unwrap();
        assert_eq!(
            db.get_setting(MODEL_NAME_KEY).unwrap(),
            Some("custom/model".to_string())
        );
        assert_eq!(
            db.get_setting_or(MODEL_NAME_KEY, "default/model").unwrap(),
            "custom/model"
        );

        db.set_setting(MODEL_NAME_KEY, "other/model").unwrap();
        assert_eq!(
            db.get_setting(MODEL_NAME_KEY).unwrap(),
            Some("other/model".to_string())
        );

        assert!(db.remove_setting(MODEL_NAME_KEY).unwrap());
        assert!(!db.remove_setting(MODEL_NAME_KEY).unwrap());
        assert_eq!(db.get_setting(MODEL_NAME_KEY).unwrap(), None);
    }

    #[test]
    fn list_is_sorted_by_key() {
        let (_tmp, db) = test_db();
        db.set_setting(TOP_K_KEY, "3").unwrap();
        db.set_setting(EMBEDDER_KEY, "hashing").unwrap();

        assert_eq!(
            db.list_settings().unwrap(),
            vec![
                (EMBEDDER_KEY.to_string(), "hashing".to_string()),
                (TOP_K_KEY.to_string(), "3".to_string()),
            ]
        );
    }

    #[test]
    fn reopen_preserves_data() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("config.db");

        {
            let db = ConfigDb::open(&path).unwrap();
            db.set_setting(TOP_K_KEY, "7").unwrap();
        }

        {
            let db = ConfigDb::open(&path).unwrap();
            assert_eq!(db.get_setting(TOP_K_KEY).unwrap(), Some("7".into()));
        }
    }
}
