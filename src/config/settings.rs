use once_cell::sync::Lazy;
use std::collections::HashMap;
use std::env;
use std::sync::RwLock;

pub static GLOBAL_CONFIG: Lazy<Config> = Lazy::new(Config::new);

const DEFAULT_DIFFICULTY: u32 = 2;

const INITIAL_DIFFICULTY_KEY: &str = "INITIAL_DIFFICULTY";
const MINING_ADDRESS_KEY: &str = "MINING_ADDRESS";

pub struct Config {
    inner: RwLock<HashMap<String, String>>,
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}

impl Config {
    pub fn new() -> Config {
        let mut map = HashMap::new();

        if let Ok(difficulty) = env::var("MESHCOIN_DIFFICULTY") {
            map.insert(String::from(INITIAL_DIFFICULTY_KEY), difficulty);
        }
        if let Ok(addr) = env::var("MESHCOIN_MINING_ADDRESS") {
            map.insert(String::from(MINING_ADDRESS_KEY), addr);
        }

        Config {
            inner: RwLock::new(map),
        }
    }

    /// The difficulty new genesis blocks start at. Retarget takes over from
    /// there.
    pub fn get_initial_difficulty(&self) -> u32 {
        let inner = self
            .inner
            .read()
            .expect("Failed to acquire read lock on config - this should never happen");
        inner
            .get(INITIAL_DIFFICULTY_KEY)
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_DIFFICULTY)
    }

    pub fn set_initial_difficulty(&self, difficulty: u32) {
        let mut inner = self
            .inner
            .write()
            .expect("Failed to acquire write lock on config - this should never happen");
        inner.insert(String::from(INITIAL_DIFFICULTY_KEY), difficulty.to_string());
    }

    pub fn set_mining_addr(&self, addr: String) {
        let mut inner = self
            .inner
            .write()
            .expect("Failed to acquire write lock on config - this should never happen");
        let _ = inner.insert(String::from(MINING_ADDRESS_KEY), addr);
    }

    pub fn get_mining_addr(&self) -> Option<String> {
        let inner = self
            .inner
            .read()
            .expect("Failed to acquire read lock on config - this should never happen");
        inner.get(MINING_ADDRESS_KEY).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_difficulty_without_override() {
        let config = Config {
            inner: RwLock::new(HashMap::new()),
        };
        assert_eq!(config.get_initial_difficulty(), DEFAULT_DIFFICULTY);
    }

    #[test]
    fn test_set_and_get_initial_difficulty() {
        let config = Config {
            inner: RwLock::new(HashMap::new()),
        };
        config.set_initial_difficulty(5);
        assert_eq!(config.get_initial_difficulty(), 5);
    }

    #[test]
    fn test_unparsable_difficulty_falls_back_to_default() {
        let mut map = HashMap::new();
        map.insert(String::from(INITIAL_DIFFICULTY_KEY), String::from("many"));
        let config = Config {
            inner: RwLock::new(map),
        };
        assert_eq!(config.get_initial_difficulty(), DEFAULT_DIFFICULTY);
    }
}
