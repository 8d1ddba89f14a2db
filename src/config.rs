use std::{env, net::SocketAddr, path::PathBuf};

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),
    #[error("invalid value for {name}: {value:?}")]
    Invalid { name: &'static str, value: String },
}

/// Server configuration, read from the environment.
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub database_path: PathBuf,
    pub jwt_secret: String,
    pub polka_key: String,
    /// Start from an empty database and expose the admin reset endpoint.
    pub debug: bool,
}

impl Config {
    /// Load configuration from environment variables, after reading a `.env` file if there is one.
    ///
    /// `JWT_SECRET` and `POLKA_KEY` are required; the server must not run without them.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let host = env::var("CHIRPY_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = match env::var("CHIRPY_PORT") {
            Ok(value) => value.parse().map_err(|_| ConfigError::Invalid {
                name: "CHIRPY_PORT",
                value,
            })?,
            Err(_) => 8080,
        };

        let database_path = env::var("DATABASE_PATH")
            .unwrap_or_else(|_| "database.json".to_string())
            .into();

        let jwt_secret = required("JWT_SECRET")?;
        let polka_key = required("POLKA_KEY")?;

        let debug = match env::var("CHIRPY_DEBUG") {
            Ok(value) => parse_flag("CHIRPY_DEBUG", value)?,
            Err(_) => false,
        };

        Ok(Self {
            host,
            port,
            database_path,
            jwt_secret,
            polka_key,
            debug,
        })
    }

    pub fn server_address(&self) -> Result<SocketAddr, ConfigError> {
        let address = format!("{}:{}", self.host, self.port);

        address.parse().map_err(|_| ConfigError::Invalid {
            name: "CHIRPY_HOST",
            value: self.host.clone(),
        })
    }
}

fn required(name: &'static str) -> Result<String, ConfigError> {
    match env::var(name) {
        Ok(value) if !value.is_empty() => Ok(value),
        _ => Err(ConfigError::Missing(name)),
    }
}

fn parse_flag(name: &'static str, value: String) -> Result<bool, ConfigError> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" => Ok(true),
        "0" | "false" | "no" | "" => Ok(false),
        _ => Err(ConfigError::Invalid { name, value }),
    }
}
