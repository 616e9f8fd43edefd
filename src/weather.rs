//! Weather collaborator contract.
//!
//! The station never sees a raw fetch failure: the service degrades from
//! fresh cache to a stale cached value to a synthetic default, in that
//! order, so callers always receive a valid `WeatherData`.

use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

/// Current conditions as consumed by announcement generation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherData {
    pub temperature_c: f32,
    pub condition: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub humidity: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wind_kph: Option<f32>,
}

impl WeatherData {
    /// Neutral fallback used when no real data has ever been fetched.
    pub fn synthetic_default() -> Self {
        WeatherData {
            temperature_c: 20.0,
            condition: "fair".to_string(),
            humidity: None,
            wind_kph: None,
        }
    }

    /// One-line announcement text.
    pub fn summary(&self) -> String {
        format!("{}, {:.0} degrees", self.condition, self.temperature_c)
    }
}

/// Upstream weather source (HTTP API, test stub, ...).
pub trait WeatherProvider: Send {
    fn fetch(&self) -> Result<WeatherData, String>;
}

/// Provider serving a fixed value. Stands in when no live upstream is
/// configured; also convenient in tests.
#[derive(Debug, Clone)]
pub struct StaticWeatherProvider {
    pub data: WeatherData,
}

impl Default for StaticWeatherProvider {
    fn default() -> Self {
        StaticWeatherProvider {
            data: WeatherData::synthetic_default(),
        }
    }
}

impl WeatherProvider for StaticWeatherProvider {
    fn fetch(&self) -> Result<WeatherData, String> {
        Ok(self.data.clone())
    }
}

/// A fetched value plus when it was fetched.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub data: WeatherData,
    pub fetched_at: Instant,
}

impl CacheEntry {
    fn is_fresh(&self, ttl: Duration) -> bool {
        self.fetched_at.elapsed() < ttl
    }
}

/// Caching wrapper around a provider.
pub struct WeatherService {
    provider: Box<dyn WeatherProvider>,
    ttl: Duration,
    cache: Option<CacheEntry>,
}

impl WeatherService {
    pub fn new(provider: Box<dyn WeatherProvider>, ttl: Duration) -> Self {
        WeatherService {
            provider,
            ttl,
            cache: None,
        }
    }

    /// Current conditions. Fresh cache wins; otherwise fetch and cache; on
    /// fetch failure serve the stale cache; with no cache at all serve the
    /// synthetic default.
    pub fn current(&mut self) -> WeatherData {
        if let Some(entry) = &self.cache {
            if entry.is_fresh(self.ttl) {
                return entry.data.clone();
            }
        }

        match self.provider.fetch() {
            Ok(data) => {
                self.cache = Some(CacheEntry {
                    data: data.clone(),
                    fetched_at: Instant::now(),
                });
                data
            }
            Err(_) => match &self.cache {
                Some(stale) => stale.data.clone(),
                None => WeatherData::synthetic_default(),
            },
        }
    }
}
