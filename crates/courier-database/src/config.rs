//! Persistent key/value configuration store.
//!
//! Settings live in the `config` table. Getters take a caller-supplied
//! default that is returned when the key is absent; setting a key to `None`
//! deletes it.

use crate::SqlGuard;
use crate::SqlResult;
use rusqlite::params;
use tracing::warn;

impl SqlGuard<'_> {
    /// Get a config value, or `None` if the key is absent.
    pub fn get_raw_config(&self, key: &str) -> SqlResult<Option<String>> {
        let mut stmt = self
            .conn()?
            .prepare_cached("SELECT value FROM config WHERE keyname=?1")?;

        let result = stmt.query_row(params![key], |row| row.get(0));
        match result {
            Ok(value) => Ok(Some(value)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Set a config value. `None` deletes the key.
    pub fn set_config(&self, key: &str, value: Option<&str>) -> SqlResult<()> {
        match value {
            Some(value) => {
                self.execute(
                    "INSERT INTO config (keyname, value) VALUES (?1, ?2)
                     ON CONFLICT(keyname) DO UPDATE SET value = ?2",
                    params![key, value],
                )?;
            }
            None => {
                self.execute("DELETE FROM config WHERE keyname=?1", params![key])?;
            }
        }
        Ok(())
    }

    /// Get a string config value, falling back to `default` when absent.
    pub fn get_config(&self, key: &str, default: &str) -> SqlResult<String> {
        Ok(self
            .get_raw_config(key)?
            .unwrap_or_else(|| default.to_string()))
    }

    /// Get an integer config value, falling back to `default` when absent
    /// or unparsable.
    pub fn get_config_int(&self, key: &str, default: i32) -> SqlResult<i32> {
        Ok(self.get_config_i64(key, i64::from(default))? as i32)
    }

    /// Set an integer config value.
    pub fn set_config_int(&self, key: &str, value: i32) -> SqlResult<()> {
        self.set_config(key, Some(&value.to_string()))
    }

    /// Get a 64-bit integer config value, falling back to `default` when
    /// absent or unparsable.
    pub fn get_config_i64(&self, key: &str, default: i64) -> SqlResult<i64> {
        match self.get_raw_config(key)? {
            Some(raw) => match raw.parse() {
                Ok(value) => Ok(value),
                Err(_) => {
                    warn!(key, value = %raw, "Non-numeric config value, using default");
                    Ok(default)
                }
            },
            None => Ok(default),
        }
    }

    /// Set a 64-bit integer config value.
    pub fn set_config_i64(&self, key: &str, value: i64) -> SqlResult<()> {
        self.set_config(key, Some(&value.to_string()))
    }

    /// Get a boolean config value (stored as `0`/`1`), falling back to
    /// `default` when absent.
    pub fn get_config_bool(&self, key: &str, default: bool) -> SqlResult<bool> {
        Ok(self.get_config_i64(key, i64::from(default))? != 0)
    }

    /// Set a boolean config value.
    pub fn set_config_bool(&self, key: &str, value: bool) -> SqlResult<()> {
        self.set_config(key, Some(if value { "1" } else { "0" }))
    }
}
