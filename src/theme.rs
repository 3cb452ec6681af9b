// Persisted light/dark preference

use crate::kv::{DARK_MODE_KEY, KeyValueStore};
use eyre::{Context, Result};
use std::rc::Rc;
use tracing::{debug, warn};

type ThemeListener = Box<dyn FnMut(bool)>;

/// Owns the dark mode flag. `true` is dark, `false` (the default) light.
pub struct ThemeStore {
    storage: Rc<dyn KeyValueStore>,
    listeners: Vec<ThemeListener>,
}

impl ThemeStore {
    pub fn new(storage: Rc<dyn KeyValueStore>) -> Self {
        Self {
            storage,
            listeners: Vec::new(),
        }
    }

    /// Persisted preference; anything but the literal `"true"` is light
    pub fn load(&self) -> bool {
        match self.storage.get(DARK_MODE_KEY) {
            Ok(Some(value)) => {
                if value != "true" && value != "false" {
                    warn!(value = %value, "Unrecognized theme value, using light");
                }
                value == "true"
            }
            Ok(None) => false,
            Err(e) => {
                warn!(error = %e, "Failed to read theme, using light");
                false
            }
        }
    }

    /// Flip the preference, persist it and tell listeners
    pub fn toggle(&mut self, current: bool) -> Result<bool> {
        let next = !current;
        self.storage
            .set(DARK_MODE_KEY, if next { "true" } else { "false" })
            .context("Failed to persist theme")?;
        debug!(dark = next, "Theme changed");

        for listener in self.listeners.iter_mut() {
            listener(next);
        }

        Ok(next)
    }

    /// Called with the new value after each toggle
    pub fn on_change(&mut self, listener: impl FnMut(bool) + 'static) {
        self.listeners.push(Box::new(listener));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kv::MemoryStorage;
    use std::cell::Cell;

    #[test]
    fn test_load_defaults_to_light() {
        let theme = ThemeStore::new(Rc::new(MemoryStorage::new()));
        assert!(!theme.load());
    }

    #[test]
    fn test_toggle_persists_literal() {
        let storage = Rc::new(MemoryStorage::new());
        let mut theme = ThemeStore::new(storage.clone());

        assert!(theme.toggle(false).unwrap());
        assert_eq!(storage.get(DARK_MODE_KEY).unwrap().as_deref(), Some("true"));
        assert!(theme.load());

        assert!(!theme.toggle(true).unwrap());
        assert_eq!(storage.get(DARK_MODE_KEY).unwrap().as_deref(), Some("false"));
        assert!(!theme.load());
    }

    #[test]
    fn test_malformed_value_is_light() {
        let storage = Rc::new(MemoryStorage::new());
        storage.set(DARK_MODE_KEY, "yes please").unwrap();
        assert!(!ThemeStore::new(storage.clone()).load());

        storage.set(DARK_MODE_KEY, "TRUE").unwrap();
        assert!(!ThemeStore::new(storage).load());
    }

    #[test]
    fn test_listeners_receive_new_value() {
        let mut theme = ThemeStore::new(Rc::new(MemoryStorage::new()));
        let applied = Rc::new(Cell::new(false));

        let sink = applied.clone();
        theme.on_change(move |dark| sink.set(dark));

        let dark = theme.toggle(theme.load()).unwrap();
        assert!(dark);
        assert!(applied.get());

        theme.toggle(dark).unwrap();
        assert!(!applied.get());
    }
}
