use std::{
    collections::HashMap,
    sync::{Mutex, PoisonError},
};

use serde_json::Value;

/// Key/value scope that lives exactly as long as one request.
#[derive(Debug, Default)]
pub struct RequestStorage {
    values: Mutex<HashMap<String, Value>>,
}

impl RequestStorage {
    pub fn get(&self, key: &str) -> Option<Value> {
        self.lock().get(key).cloned()
    }

    pub fn set(&self, key: impl Into<String>, value: impl Into<Value>) {
        self.lock().insert(key.into(), value.into());
    }

    pub fn delete(&self, key: &str) -> Option<Value> {
        self.lock().remove(key)
    }

    /// Return the stored value, computing and storing it first when absent.
    ///
    /// `load` runs with the storage lock released.
    pub fn get_or_load(&self, key: &str, load: impl FnOnce() -> Value) -> Value {
        if let Some(v) = self.get(key) {
            return v;
        }
        let loaded = load();
        self.lock()
            .entry(key.to_string())
            .or_insert(loaded)
            .clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, Value>> {
        self.values.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
