//! Configuración del servicio, leída de variables de entorno (y `.env`).
//!
//! | Variable | Default |
//! |---|---|
//! | `BIND_ADDRESS` | `0.0.0.0:8002` |
//! | `MONGODB_URI` | `mongodb://localhost:27017` |
//! | `MONGODB_DATABASE` | `hotel_service` |
//! | `JWT_SECRET_KEY` | obligatoria |
//! | `RESERVATION_STORE` | `mongodb` (o `memory`) |
//! | `ROOMS_FILE` | sin valor; JSON con las habitaciones del almacén en memoria |

use std::env;
use std::str::FromStr;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Falta la variable de entorno obligatoria '{0}'")]
    Missing(&'static str),

    #[error("Valor inválido para '{var}': {reason}")]
    Invalid { var: &'static str, reason: String },
}

/// Backend de almacenamiento de reservas
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Mongo,
    Memory,
}

impl FromStr for StoreBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mongodb" | "mongo" => Ok(Self::Mongo),
            "memory" => Ok(Self::Memory),
            other => Err(format!("se esperaba 'mongodb' o 'memory', no '{}'", other)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub bind_address: String,
    pub mongodb_uri: String,
    pub mongodb_database: String,
    pub jwt_secret: String,
    pub store: StoreBackend,
    pub rooms_file: Option<String>,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Construye la configuración a partir de una función de búsqueda,
    /// lo que permite probarla sin tocar el entorno del proceso.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let jwt_secret = lookup("JWT_SECRET_KEY")
            .filter(|s| !s.trim().is_empty())
            .ok_or(ConfigError::Missing("JWT_SECRET_KEY"))?;

        let store = match lookup("RESERVATION_STORE") {
            Some(raw) => raw.parse().map_err(|reason| ConfigError::Invalid {
                var: "RESERVATION_STORE",
                reason,
            })?,
            None => StoreBackend::Mongo,
        };

        Ok(Config {
            bind_address: lookup("BIND_ADDRESS").unwrap_or_else(|| "0.0.0.0:8002".to_string()),
            mongodb_uri: lookup("MONGODB_URI")
                .unwrap_or_else(|| "mongodb://localhost:27017".to_string()),
            mongodb_database: lookup("MONGODB_DATABASE")
                .unwrap_or_else(|| "hotel_service".to_string()),
            jwt_secret,
            store,
            rooms_file: lookup("ROOMS_FILE").filter(|s| !s.trim().is_empty()),
        })
    }
}
