//! Named non-volatile properties with change notification.
//!
//! A [`PropertyContainer`] owns the settings store and one
//! [`NonVolatileProperty`] per key. Every write goes through to the store and
//! then notifies subscribers synchronously, before the setter returns.
//!
//! ## Rust concepts
//! - `Box<dyn Trait>` to own "some store" without making the container generic
//! - Boxed `FnMut` closures as subscribers

use crate::error::LedError;
use crate::settings::{SettingValue, SettingsStore};
use std::collections::BTreeMap;

/// One persisted setting.
#[derive(Clone, Debug, PartialEq)]
pub struct NonVolatileProperty {
    key: String,
    value: SettingValue,
}

impl NonVolatileProperty {
    /// Read `key` from the store, or write `default` when it is missing or
    /// holds a value of the wrong type.
    pub fn load(
        store: &mut dyn SettingsStore,
        key: &str,
        default: SettingValue,
    ) -> Result<Self, LedError> {
        let value = match store.get(key) {
            Some(stored) if stored.kind() == default.kind() => stored,
            _ => {
                store.set(key, default)?;
                default
            }
        };
        Ok(Self {
            key: key.to_string(),
            value,
        })
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn value(&self) -> SettingValue {
        self.value
    }
}

/// Passed to subscribers after a property changed.
#[derive(Clone, Debug, PartialEq)]
pub struct PropertyChange {
    pub key: String,
    pub value: SettingValue,
}

type Listener = Box<dyn FnMut(&PropertyChange) + Send>;

pub struct PropertyContainer {
    store: Box<dyn SettingsStore>,
    properties: BTreeMap<String, NonVolatileProperty>,
    listeners: Vec<Listener>,
}

impl PropertyContainer {
    pub fn new(store: Box<dyn SettingsStore>) -> Self {
        Self {
            store,
            properties: BTreeMap::new(),
            listeners: Vec::new(),
        }
    }

    /// Register a property, loading its persisted value or initializing it.
    pub fn add_property(&mut self, key: &str, default: SettingValue) -> Result<(), LedError> {
        let property = NonVolatileProperty::load(self.store.as_mut(), key, default)?;
        self.properties.insert(key.to_string(), property);
        Ok(())
    }

    pub fn get(&self, key: &str) -> Result<&NonVolatileProperty, LedError> {
        self.properties
            .get(key)
            .ok_or_else(|| LedError::PropertyNotFound(key.to_string()))
    }

    pub fn get_bool(&self, key: &str) -> Result<bool, LedError> {
        self.get(key)?.value().as_bool().ok_or(LedError::PropertyType {
            key: key.to_string(),
            expected: "bool",
        })
    }

    pub fn get_float(&self, key: &str) -> Result<f64, LedError> {
        self.get(key)?.value().as_float().ok_or(LedError::PropertyType {
            key: key.to_string(),
            expected: "float",
        })
    }

    /// Write a new value through to the store. Returns whether the value
    /// changed; subscribers are only told about actual changes.
    pub fn set_property_value(&mut self, key: &str, value: SettingValue) -> Result<bool, LedError> {
        let property = self
            .properties
            .get_mut(key)
            .ok_or_else(|| LedError::PropertyNotFound(key.to_string()))?;
        if property.value.kind() != value.kind() {
            return Err(LedError::PropertyType {
                key: key.to_string(),
                expected: property.value.kind(),
            });
        }

        self.store.set(key, value)?;
        let changed = property.value != value;
        property.value = value;

        if changed {
            let change = PropertyChange {
                key: key.to_string(),
                value,
            };
            for listener in &mut self.listeners {
                listener(&change);
            }
        }
        Ok(changed)
    }

    pub fn subscribe(&mut self, listener: impl FnMut(&PropertyChange) + Send + 'static) {
        self.listeners.push(Box::new(listener));
    }

    /// All properties, ordered by key.
    pub fn iter(&self) -> impl Iterator<Item = &NonVolatileProperty> {
        self.properties.values()
    }

    pub fn force_save(&mut self) -> Result<(), LedError> {
        self.store.force_save()
    }
}

impl std::fmt::Debug for PropertyContainer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PropertyContainer")
            .field("properties", &self.properties)
            .field("listeners", &self.listeners.len())
            .finish()
    }
}
