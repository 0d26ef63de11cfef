use std::{net::SocketAddr, time::Duration};
use tracing::warn;

pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:5000";
pub const DEFAULT_WAIT_MIN_SECS: f64 = 1.0;
pub const DEFAULT_WAIT_MAX_SECS: f64 = 5.0;

/// Rango (en segundos) del que se sortea la duración de un job
/// cuando la entrada no trae `wait_time`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WaitRange {
    pub min_secs: f64,
    pub max_secs: f64,
}

impl WaitRange {
    /// Normaliza: si vienen al revés se intercambian.
    pub fn new(a: f64, b: f64) -> Self {
        if a <= b {
            Self { min_secs: a, max_secs: b }
        } else {
            Self { min_secs: b, max_secs: a }
        }
    }

    /// Ambos extremos tienen que poder convertirse en `Duration`.
    pub fn is_valid(&self) -> bool {
        valid_secs(self.min_secs) && valid_secs(self.max_secs)
    }
}

impl Default for WaitRange {
    fn default() -> Self {
        Self::new(DEFAULT_WAIT_MIN_SECS, DEFAULT_WAIT_MAX_SECS)
    }
}

/// Configuración del servidor, leída de variables de entorno:
///
/// | Variable                | Default        |
/// |-------------------------|----------------|
/// | `BIND_ADDR`             | `0.0.0.0:5000` |
/// | `DEFAULT_WAIT_MIN_SECS` | `1.0`          |
/// | `DEFAULT_WAIT_MAX_SECS` | `5.0`          |
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind_addr: SocketAddr,
    pub wait_range: WaitRange,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 5000)),
            wait_range: WaitRange::default(),
        }
    }
}

impl ServerConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Igual que `from_env` pero con una función de lookup inyectable (para tests).
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let bind_addr = parse_or_default(&lookup, "BIND_ADDR", defaults.bind_addr);

        let min = parse_or_default(&lookup, "DEFAULT_WAIT_MIN_SECS", DEFAULT_WAIT_MIN_SECS);
        let max = parse_or_default(&lookup, "DEFAULT_WAIT_MAX_SECS", DEFAULT_WAIT_MAX_SECS);

        let wait_range = if valid_secs(min) && valid_secs(max) {
            WaitRange::new(min, max)
        } else {
            warn!(
                "rango de espera inválido ({}, {}), usando {:?}",
                min, max, defaults.wait_range
            );
            defaults.wait_range
        };

        Self {
            bind_addr,
            wait_range,
        }
    }
}

fn valid_secs(v: f64) -> bool {
    Duration::try_from_secs_f64(v).is_ok()
}

fn parse_or_default<F, T>(lookup: &F, key: &str, default: T) -> T
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr + std::fmt::Debug,
{
    match lookup(key) {
        Some(raw) => match raw.trim().parse::<T>() {
            Ok(v) => v,
            Err(_) => {
                warn!("{}={:?} no es válido, usando {:?}", key, raw, default);
                default
            }
        },
        None => default,
    }
}
