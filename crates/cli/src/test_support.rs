//! Process-environment helpers for tests that exercise `TOOLGATE_*` overrides.

use std::sync::{Mutex, OnceLock};

fn env_lock() -> &'static Mutex<()> {
    static LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    LOCK.get_or_init(|| Mutex::new(()))
}

/// Runs `run` with `keys` unset, holding the env lock for the whole body.
/// Previous values are restored afterwards.
pub(crate) fn with_clean_env<R>(keys: &[&str], run: impl FnOnce() -> R) -> R {
    let _guard = env_lock().lock().unwrap_or_else(|e| e.into_inner());
    let saved: Vec<(&str, Option<String>)> =
        keys.iter().map(|k| (*k, std::env::var(k).ok())).collect();
    for key in keys {
        remove_env_var(key);
    }

    let result = run();

    for (key, value) in saved {
        match value {
            Some(v) => set_env_var(key, &v),
            None => remove_env_var(key),
        }
    }
    result
}

/// Sets an environment variable. Only call inside `with_clean_env`.
pub(crate) fn set_env_var(key: &str, value: &str) {
    // SAFETY: callers hold the env lock, so no other test thread mutates the environment.
    unsafe {
        std::env::set_var(key, value);
    }
}

fn remove_env_var(key: &str) {
    // SAFETY: see `set_env_var`.
    unsafe {
        std::env::remove_var(key);
    }
}
