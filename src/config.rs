use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} is not set")]
    Missing(&'static str),
    #[error("{name} must be a positive number, got {value:?}")]
    Invalid { name: &'static str, value: String },
}

#[derive(Debug, Clone)]
pub struct Config {
    pub chatgpt_api_key: String,
    pub data_dir: PathBuf,
    pub quiz_length: usize,
    pub service_timeout: Duration,
    pub profile_ttl: chrono::Duration,
    pub refresh_every: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            chatgpt_api_key: String::new(),
            data_dir: PathBuf::from("data"),
            quiz_length: 5,
            service_timeout: Duration::from_secs(15),
            profile_ttl: chrono::Duration::minutes(30),
            refresh_every: 5,
        }
    }
}

impl Config {
    /// Reads the process environment, after `.env` has been loaded.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&'static str) -> Option<String>,
    {
        let defaults = Config::default();
        let number = |name: &'static str, default: u64| -> Result<u64, ConfigError> {
            match lookup(name) {
                None => Ok(default),
                Some(value) => match value.trim().parse::<u64>() {
                    Ok(n) if n > 0 => Ok(n),
                    _ => Err(ConfigError::Invalid { name, value }),
                },
            }
        };

        Ok(Self {
            chatgpt_api_key: lookup("CHATGPT_API_KEY")
                .filter(|key| !key.trim().is_empty())
                .ok_or(ConfigError::Missing("CHATGPT_API_KEY"))?,
            data_dir: lookup("DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.data_dir),
            quiz_length: number("QUIZ_LENGTH", defaults.quiz_length as u64)? as usize,
            service_timeout: Duration::from_secs(number(
                "SERVICE_TIMEOUT_SECS",
                defaults.service_timeout.as_secs(),
            )?),
            profile_ttl: chrono::Duration::minutes(number(
                "PROFILE_TTL_MINUTES",
                defaults.profile_ttl.num_minutes() as u64,
            )? as i64),
            refresh_every: number("REFRESH_EVERY_MESSAGES", defaults.refresh_every as u64)? as usize,
        })
    }

    pub fn user_data_path(&self) -> PathBuf {
        self.data_dir.join("user_data.json")
    }

    pub fn sessions_dir(&self) -> PathBuf {
        self.data_dir.join("sessions")
    }

    pub fn vocab_path(&self) -> PathBuf {
        self.data_dir.join("vocab_data.json")
    }

    pub fn dialogue_db_path(&self) -> PathBuf {
        self.data_dir.join("dialogues.sqlite")
    }
}
