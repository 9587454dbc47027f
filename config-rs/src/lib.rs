//! config-rs/lib.rs
//! Shared configuration utilities for consistent component configuration
//! Every crate in the workspace builds its `from_env()` constructor on top of
//! these helpers, so parsing rules and fallbacks stay identical everywhere.

use std::env;
use std::str::FromStr;
use std::sync::Once;
use std::time::Duration;

static DOTENV: Once = Once::new();

/// Load a `.env` file from the working directory (or its parents) once.
///
/// Missing files are not an error; variables already present in the process
/// environment take precedence over the file.
pub fn load_dotenv() {
    DOTENV.call_once(|| match dotenv::dotenv() {
        Ok(path) => log::debug!("Loaded environment overrides from {}", path.display()),
        Err(err) if err.not_found() => log::debug!("No .env file found; using process environment"),
        Err(err) => log::warn!("Failed to load .env file: {}", err),
    });
}

/// Read a variable, treating empty strings as unset.
pub fn get_optional_var(name: &str) -> Option<String> {
    match env::var(name) {
        Ok(value) if !value.trim().is_empty() => Some(value.trim().to_string()),
        _ => None,
    }
}

/// Read and parse a variable with a default fallback
///
/// # Arguments
/// * `name` - The environment variable name (e.g., "REPAIR_MAX_ITERATIONS")
/// * `default` - The value to use when the variable is unset or unparseable
///
/// # Returns
/// The parsed value, or `default`
pub fn get_env_var<T: FromStr>(name: &str, default: T) -> T {
    match get_optional_var(name) {
        Some(raw) => raw.parse::<T>().unwrap_or_else(|_| {
            log::warn!("Invalid value {:?} in {}, using default", raw, name);
            default
        }),
        None => default,
    }
}

/// Read a boolean flag. Truthy values are "1", "true", "yes", "on" and falsy
/// values are "0", "false", "no", "off" (case-insensitive).
pub fn get_bool_var(name: &str, default: bool) -> bool {
    match get_optional_var(name) {
        Some(raw) => match raw.to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => true,
            "0" | "false" | "no" | "off" => false,
            _ => {
                log::warn!("Invalid boolean {:?} in {}, using default {}", raw, name, default);
                default
            }
        },
        None => default,
    }
}

/// Read a duration expressed in whole seconds.
pub fn get_duration_secs(name: &str, default_secs: u64) -> Duration {
    Duration::from_secs(get_env_var(name, default_secs))
}

/// Read a duration expressed in milliseconds.
pub fn get_duration_ms(name: &str, default_ms: u64) -> Duration {
    Duration::from_millis(get_env_var(name, default_ms))
}
