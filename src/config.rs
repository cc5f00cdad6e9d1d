use std::env;

#[derive(Clone, Debug)]
pub struct Config {
    /// `None` runs the service on the in-memory store.
    pub database_url: Option<String>,
    pub bind_addr: String,
    pub session_ttl_hours: i64,
    /// Registration only accepts addresses under this domain.
    pub email_domain: String,
    pub max_bookings_per_day: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_url: None,
            bind_addr: "127.0.0.1:8080".to_string(),
            session_ttl_hours: 24,
            email_domain: "clinic.example".to_string(),
            max_bookings_per_day: 2,
        }
    }
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        let defaults = Self::default();

        let database_url = env::var("DATABASE_URL").ok().filter(|s| !s.trim().is_empty());
        let bind_addr = env::var("BIND_ADDR").unwrap_or(defaults.bind_addr);
        let session_ttl_hours = env::var("SESSION_TTL_HOURS")
            .ok()
            .and_then(|s| s.parse::<i64>().ok())
            .unwrap_or(defaults.session_ttl_hours);
        let email_domain = env::var("EMAIL_DOMAIN")
            .map(|s| s.trim().trim_start_matches('@').to_ascii_lowercase())
            .unwrap_or(defaults.email_domain);
        let max_bookings_per_day = match env::var("MAX_BOOKINGS_PER_DAY") {
            Ok(raw) => raw
                .parse::<usize>()
                .map_err(|e| anyhow::anyhow!("MAX_BOOKINGS_PER_DAY must be a number: {e}"))?,
            Err(_) => defaults.max_bookings_per_day,
        };

        Ok(Self {
            database_url,
            bind_addr,
            session_ttl_hours,
            email_domain,
            max_bookings_per_day,
        })
    }
}
