use crate::auth::PasswordScheme;
use crate::error::{Error, Result};
use log::warn;
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

const DEFAULT_BIND: &str = "127.0.0.1:8000";
const DEFAULT_DATABASE_PATH: &str = "cineclub.db";
const DEFAULT_SECRET_KEY: &str = "EDIT_THE_DOT_ENV_IN_PRODUCTION_OR_GET_FIRED";
const DEFAULT_TMDB_BASE_URL: &str = "https://api.themoviedb.org/3";
const DEFAULT_TMDB_TIMEOUT_SECS: u64 = 10;

/// Unset and empty variables are treated alike.
fn lookup<'a>(vars: &'a HashMap<String, String>, key: &str) -> Option<&'a str> {
    vars.get(key).map(String::as_str).filter(|value| !value.is_empty())
}

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub bind: String,
    pub database_path: PathBuf,
    pub secret_key: String,
    pub tmdb_api_key: String,
    pub tmdb_base_url: String,
    pub tmdb_timeout: Duration,
    pub password_scheme: PasswordScheme,
    pub seed_demo_data: bool,
}

impl Config {
    /// Reads the process environment, after loading a `.env` file if present.
    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok();
        let vars: HashMap<String, String> = dotenv::vars().collect();
        Self::from_vars(&vars)
    }

    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self> {
        let get = |key| lookup(vars, key);

        let tmdb_api_key = get("TMDB_API_KEY")
            .ok_or_else(|| Error::Config("missing TMDB_API_KEY".to_owned()))?
            .to_owned();

        let secret_key = match get("SECRET_KEY") {
            Some(key) => key.to_owned(),
            None => {
                warn!("SECRET_KEY is not set, signing tokens with the default key");
                DEFAULT_SECRET_KEY.to_owned()
            }
        };

        let tmdb_timeout = match get("TMDB_TIMEOUT_SECS") {
            Some(secs) => Duration::from_secs(secs.parse::<u64>().map_err(|_| {
                Error::Config(format!("invalid TMDB_TIMEOUT_SECS {:?}", secs))
            })?),
            None => Duration::from_secs(DEFAULT_TMDB_TIMEOUT_SECS),
        };

        let password_scheme = match get("PASSWORD_SCHEME") {
            Some(scheme) => scheme.parse()?,
            None => PasswordScheme::Plain,
        };

        let seed_demo_data = match get("SEED_DEMO_DATA") {
            Some(flag) => flag.parse::<bool>().map_err(|_| {
                Error::Config(format!("invalid SEED_DEMO_DATA {:?}", flag))
            })?,
            None => false,
        };

        Ok(Config {
            bind: get("CINECLUB_BIND").unwrap_or(DEFAULT_BIND).to_owned(),
            database_path: PathBuf::from(get("DATABASE_PATH").unwrap_or(DEFAULT_DATABASE_PATH)),
            secret_key,
            tmdb_api_key,
            tmdb_base_url: get("TMDB_BASE_URL")
                .unwrap_or(DEFAULT_TMDB_BASE_URL)
                .to_owned(),
            tmdb_timeout,
            password_scheme,
            seed_demo_data,
        })
    }
}
