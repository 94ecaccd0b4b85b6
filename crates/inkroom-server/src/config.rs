//! Server configuration from the environment.

use std::net::SocketAddr;

use thiserror::Error;

use crate::persistence::Room;

/// Default listen address.
pub const DEFAULT_ADDR: &str = "0.0.0.0:8080";
/// Default HS256 signing secret.
pub const DEFAULT_JWT_SECRET: &str = "secret";
/// Default number of rows sent in a join-time replay.
pub const DEFAULT_REPLAY_LIMIT: usize = 100;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("INKROOM_ADDR is not a socket address: {value}")]
    Addr {
        value: String,
        source: std::net::AddrParseError,
    },
    #[error("INKROOM_REPLAY_LIMIT is not a positive integer: {value}")]
    ReplayLimit { value: String },
    #[error("INKROOM_ROOMS entry must be id:slug:admin, got {0:?}")]
    Room(String),
}

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub addr: SocketAddr,
    pub jwt_secret: String,
    pub replay_limit: usize,
    /// Rooms seeded into the in-memory repository.
    pub rooms: Vec<Room>,
}

impl ServerConfig {
    /// Read `INKROOM_ADDR`, `INKROOM_JWT_SECRET`, `INKROOM_REPLAY_LIMIT` and
    /// `INKROOM_ROOMS`.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let addr_value = lookup("INKROOM_ADDR").unwrap_or_else(|| DEFAULT_ADDR.to_string());
        let addr = addr_value.parse().map_err(|source| ConfigError::Addr {
            value: addr_value.clone(),
            source,
        })?;

        let jwt_secret = lookup("INKROOM_JWT_SECRET").unwrap_or_else(|| DEFAULT_JWT_SECRET.to_string());

        let replay_limit = match lookup("INKROOM_REPLAY_LIMIT") {
            None => DEFAULT_REPLAY_LIMIT,
            Some(value) => match value.trim().parse::<usize>() {
                Ok(n) if n > 0 => n,
                _ => return Err(ConfigError::ReplayLimit { value }),
            },
        };

        let rooms = match lookup("INKROOM_ROOMS") {
            None => Vec::new(),
            Some(value) => parse_rooms(&value)?,
        };

        Ok(Self {
            addr,
            jwt_secret,
            replay_limit,
            rooms,
        })
    }
}

fn parse_rooms(value: &str) -> Result<Vec<Room>, ConfigError> {
    value
        .split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| {
            let mut parts = entry.split(':').map(str::trim);
            match (parts.next(), parts.next(), parts.next(), parts.next()) {
                (Some(id), Some(slug), Some(admin), None)
                    if !id.is_empty() && !slug.is_empty() && !admin.is_empty() =>
                {
                    Ok(Room {
                        id: id.to_string(),
                        slug: slug.to_string(),
                        admin: admin.to_string(),
                    })
                }
                _ => Err(ConfigError::Room(entry.to_string())),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> Result<ServerConfig, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ServerConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config(&[]).unwrap();
        assert_eq!(config.addr, DEFAULT_ADDR.parse().unwrap());
        assert_eq!(config.jwt_secret, "secret");
        assert_eq!(config.replay_limit, 100);
        assert!(config.rooms.is_empty());
    }

    #[test]
    fn test_rooms_parse() {
        let config = config(&[("INKROOM_ROOMS", "1:sketch:alice, 2:plans:bob")]).unwrap();
        assert_eq!(config.rooms.len(), 2);
        assert_eq!(config.rooms[1].id, "2");
        assert_eq!(config.rooms[1].slug, "plans");
        assert_eq!(config.rooms[1].admin, "bob");
    }

    #[test]
    fn test_invalid_values() {
        assert!(matches!(config(&[("INKROOM_ADDR", "nowhere")]), Err(ConfigError::Addr { .. })));
        assert!(matches!(
            config(&[("INKROOM_REPLAY_LIMIT", "0")]),
            Err(ConfigError::ReplayLimit { .. })
        ));
        assert!(matches!(config(&[("INKROOM_ROOMS", "1:sketch")]), Err(ConfigError::Room(_))));
    }
}
