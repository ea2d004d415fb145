use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

use pulpit_algo::DEFAULT_BATCH_SIZE;

const DEFAULT_DATA_DIR: &str = "assets/bible_data";
const DEFAULT_SESSION_IDLE_MINUTES: u64 = 120;
const DEFAULT_SWEEP_SCHEDULE: &str = "0 */5 * * * *";
const DEFAULT_MAX_AUDIO_BYTES: usize = 25 * 1024 * 1024;
/// Room for the JSON fields around a base64 recording
const JSON_ENVELOPE_BYTES: usize = 64 * 1024;

#[derive(Debug, Clone)]
pub struct Config {
    pub host: IpAddr,
    pub port: u16,
    pub log_level: String,
    pub data_dir: PathBuf,
    pub batch_size: usize,
    pub session_idle: Duration,
    pub sweep_schedule: String,
    /// Largest accepted recording, raw bytes
    pub max_audio_bytes: usize,
}

impl Config {
    pub fn from_env() -> Self {
        let port = std::env::var("PORT")
            .ok()
            .and_then(|value| value.parse::<u16>().ok())
            .unwrap_or(3000);

        let host = std::env::var("HOST")
            .ok()
            .and_then(|value| value.parse::<IpAddr>().ok())
            .unwrap_or(IpAddr::V4(Ipv4Addr::new(0, 0, 0, 0)));

        let log_level = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());

        let data_dir = std::env::var("DATA_DIR")
            .ok()
            .filter(|value| !value.trim().is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_DIR));

        let batch_size = std::env::var("BATCH_SIZE")
            .ok()
            .and_then(|value| value.parse::<usize>().ok())
            .filter(|size| *size > 0)
            .unwrap_or(DEFAULT_BATCH_SIZE);

        let idle_minutes = std::env::var("SESSION_IDLE_MINUTES")
            .ok()
            .and_then(|value| value.parse::<u64>().ok())
            .filter(|minutes| *minutes > 0)
            .unwrap_or(DEFAULT_SESSION_IDLE_MINUTES);

        let sweep_schedule = std::env::var("SESSION_SWEEP_SCHEDULE")
            .ok()
            .filter(|value| !value.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_SWEEP_SCHEDULE.to_string());

        let max_audio_bytes = std::env::var("MAX_AUDIO_BYTES")
            .ok()
            .and_then(|value| value.parse::<usize>().ok())
            .filter(|bytes| *bytes > 0)
            .unwrap_or(DEFAULT_MAX_AUDIO_BYTES);

        Self {
            host,
            port,
            log_level,
            data_dir,
            batch_size,
            session_idle: Duration::from_secs(idle_minutes * 60),
            sweep_schedule,
            max_audio_bytes,
        }
    }

    /// Body limit for JSON requests carrying a base64 recording
    pub fn max_audio_json_bytes(&self) -> usize {
        self.max_audio_bytes.div_ceil(3).saturating_mul(4).saturating_add(JSON_ENVELOPE_BYTES)
    }

    pub fn bind_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: IpAddr::V4(Ipv4Addr::new(0, 0, 0, 0)),
            port: 3000,
            log_level: "info".to_string(),
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
            batch_size: DEFAULT_BATCH_SIZE,
            session_idle: Duration::from_secs(DEFAULT_SESSION_IDLE_MINUTES * 60),
            sweep_schedule: DEFAULT_SWEEP_SCHEDULE.to_string(),
            max_audio_bytes: DEFAULT_MAX_AUDIO_BYTES,
        }
    }
}
