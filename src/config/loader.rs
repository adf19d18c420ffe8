//! Configuration loader with TOML parsing and environment variable overrides

use super::schema::KarstConfig;
use super::secret::secret_string;
use crate::domain::errors::KarstError;
use crate::domain::result::Result;
use regex::Regex;
use std::fs;
use std::path::Path;
use std::sync::OnceLock;

/// Loads configuration from a TOML file
///
/// This function:
/// 1. Reads the TOML file
/// 2. Performs environment variable substitution (${VAR} syntax)
/// 3. Parses the TOML into KarstConfig
/// 4. Applies environment variable overrides (KARST_* prefix)
/// 5. Validates the configuration
///
/// # Errors
///
/// Returns an error if:
/// - File cannot be read
/// - TOML parsing fails
/// - Environment variable substitution fails
/// - Configuration validation fails
///
/// # Examples
///
/// ```no_run
/// use karst::config::loader::load_config;
///
/// let config = load_config("karst.toml").expect("Failed to load config");
/// ```
pub fn load_config(path: impl AsRef<Path>) -> Result<KarstConfig> {
    let path = path.as_ref();

    if !path.exists() {
        return Err(KarstError::Configuration(format!(
            "Configuration file not found: {}",
            path.display()
        )));
    }

    let contents = fs::read_to_string(path).map_err(|e| {
        KarstError::Configuration(format!(
            "Failed to read configuration file {}: {}",
            path.display(),
            e
        ))
    })?;

    parse_config(&contents)
}

/// Parses and validates configuration from TOML text
///
/// Same pipeline as [`load_config`] minus the file read.
pub fn parse_config(contents: &str) -> Result<KarstConfig> {
    let contents = substitute_env_vars(contents)?;

    let mut config: KarstConfig = toml::from_str(&contents)
        .map_err(|e| KarstError::Configuration(format!("Failed to parse TOML: {}", e)))?;

    apply_env_overrides(&mut config);

    config.validate().map_err(|e| {
        KarstError::Configuration(format!("Configuration validation failed: {}", e))
    })?;

    Ok(config)
}

fn env_var_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)\}").expect("env var pattern is valid")
    })
}

/// Substitutes environment variables in the format ${VAR_NAME}
///
/// # Errors
///
/// Returns an error if a referenced environment variable is not set
fn substitute_env_vars(input: &str) -> Result<String> {
    let re = env_var_pattern();
    let mut result = String::new();
    let mut missing_vars = Vec::new();

    for line in input.lines() {
        let trimmed = line.trim_start();

        // Comments may mention ${VAR} without requiring it to be set
        if trimmed.starts_with('#') {
            result.push_str(line);
            result.push('\n');
            continue;
        }

        let mut processed_line = line.to_string();
        for cap in re.captures_iter(line) {
            let var_name = &cap[1];
            match std::env::var(var_name) {
                Ok(value) => {
                    let placeholder = format!("${{{}}}", var_name);
                    processed_line = processed_line.replace(&placeholder, &value);
                }
                Err(_) => {
                    if !missing_vars.contains(&var_name.to_string()) {
                        missing_vars.push(var_name.to_string());
                    }
                }
            }
        }
        result.push_str(&processed_line);
        result.push('\n');
    }

    if !missing_vars.is_empty() {
        return Err(KarstError::Configuration(format!(
            "Missing required environment variables: {}",
            missing_vars.join(", ")
        )));
    }

    Ok(result)
}

/// Applies environment variable overrides using KARST_* prefix
///
/// Environment variables follow the pattern: KARST_<SECTION>_<KEY>
/// For example: KARST_IMPORT_CHUNK_SIZE, KARST_POSTGRESQL_CONNECTION_STRING
fn apply_env_overrides(config: &mut KarstConfig) {
    // Application overrides
    if let Ok(val) = std::env::var("KARST_APPLICATION_LOG_LEVEL") {
        config.application.log_level = val;
    }
    if let Ok(val) = std::env::var("KARST_APPLICATION_DRY_RUN") {
        config.application.dry_run = val.parse().unwrap_or(false);
    }

    // Import overrides
    if let Ok(val) = std::env::var("KARST_IMPORT_CHUNK_SIZE") {
        if let Ok(size) = val.parse() {
            config.import.chunk_size = size;
        }
    }
    if let Ok(val) = std::env::var("KARST_IMPORT_STAGING_SCHEMA") {
        config.import.staging_schema = val;
    }
    if let Ok(val) = std::env::var("KARST_IMPORT_SHUTDOWN_TIMEOUT_SECS") {
        if let Ok(secs) = val.parse() {
            config.import.shutdown_timeout_secs = secs;
        }
    }

    // PostgreSQL overrides
    if let Ok(val) = std::env::var("KARST_POSTGRESQL_CONNECTION_STRING") {
        config.postgresql.connection_string = secret_string(val);
    }
    if let Ok(val) = std::env::var("KARST_POSTGRESQL_MAX_CONNECTIONS") {
        if let Ok(max) = val.parse() {
            config.postgresql.max_connections = max;
        }
    }
    if let Ok(val) = std::env::var("KARST_POSTGRESQL_STATEMENT_TIMEOUT_SECONDS") {
        if let Ok(secs) = val.parse() {
            config.postgresql.statement_timeout_seconds = secs;
        }
    }
    if let Ok(val) = std::env::var("KARST_POSTGRESQL_SSL_MODE") {
        config.postgresql.ssl_mode = val;
    }

    // Logging overrides
    if let Ok(val) = std::env::var("KARST_LOGGING_LOCAL_ENABLED") {
        config.logging.local_enabled = val.parse().unwrap_or(true);
    }
    if let Ok(val) = std::env::var("KARST_LOGGING_LOCAL_PATH") {
        config.logging.local_path = val;
    }
    if let Ok(val) = std::env::var("KARST_LOGGING_LOCAL_ROTATION") {
        config.logging.local_rotation = val;
    }
}
