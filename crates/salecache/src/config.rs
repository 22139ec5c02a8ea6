use std::env;
use std::path::PathBuf;
use std::time::Duration;

use feed::DEFAULT_ENDPOINT;

pub const DEFAULT_DB_PATH: &str = "sale_records.db";
pub const DEFAULT_PAGE_SIZE: u32 = 50;
pub const DEFAULT_TOTAL_LIMIT: u64 = 100;
pub const DEFAULT_DECAY_RATE: f64 = 0.05;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid value for {key}: {value}")]
    Invalid { key: String, value: String },

    #[error("decay rate must be a finite, non-negative number (got {0})")]
    DecayRate(f64),
}

/// 수집 실행 파라미터
#[derive(Debug, Clone)]
pub struct IngestConfig {
    /// 피드 한 페이지 크기
    pub page_size: u32,
    /// 아이템당 새로 받을 최대 거래 수이자 반환 윈도우 크기
    pub total_limit: u64,
    /// 동시에 처리할 아이템 수 (1이면 순차 처리)
    pub concurrency: usize,
    /// 실행 전체 제한 시간
    pub timeout: Option<Duration>,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            total_limit: DEFAULT_TOTAL_LIMIT,
            concurrency: 1,
            timeout: None,
        }
    }
}

impl IngestConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.page_size == 0 {
            return Err(invalid("INGEST_PAGE_SIZE", self.page_size));
        }
        if self.concurrency == 0 {
            return Err(invalid("INGEST_CONCURRENCY", self.concurrency));
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct FeedConfig {
    pub endpoint: String,
    pub token: Option<String>,
    pub audience: Option<String>,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            token: None,
            audience: None,
        }
    }
}

/// 가치 추정 파라미터
#[derive(Debug, Clone, PartialEq)]
pub struct ValuationConfig {
    /// 첫 번째 값이 매입가 비교 기준이 된다
    pub decay_rates: Vec<f64>,
}

impl Default for ValuationConfig {
    fn default() -> Self {
        Self {
            decay_rates: vec![DEFAULT_DECAY_RATE],
        }
    }
}

impl ValuationConfig {
    pub fn new(decay_rates: Vec<f64>) -> Result<Self, ConfigError> {
        if decay_rates.is_empty() {
            return Err(invalid("VALUATION_DECAY_RATES", ""));
        }
        validate_decay_rates(&decay_rates)?;
        Ok(Self { decay_rates })
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub db_path: PathBuf,
    pub inventory_path: Option<PathBuf>,
    pub feed: FeedConfig,
    pub ingest: IngestConfig,
    pub valuation: ValuationConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from(DEFAULT_DB_PATH),
            inventory_path: None,
            feed: FeedConfig::default(),
            ingest: IngestConfig::default(),
            valuation: ValuationConfig::default(),
        }
    }
}

impl AppConfig {
    /// 환경 변수에서 설정을 읽는다 (.env는 lib.rs에서 자동으로 로드됨)
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let ingest = IngestConfig {
            page_size: parse_or(get("INGEST_PAGE_SIZE"), "INGEST_PAGE_SIZE", DEFAULT_PAGE_SIZE)?,
            total_limit: parse_or(
                get("INGEST_TOTAL_LIMIT"),
                "INGEST_TOTAL_LIMIT",
                DEFAULT_TOTAL_LIMIT,
            )?,
            concurrency: parse_or(get("INGEST_CONCURRENCY"), "INGEST_CONCURRENCY", 1)?,
            timeout: match get("INGEST_TIMEOUT_SECS") {
                Some(raw) => Some(Duration::from_secs(parse_value(&raw, "INGEST_TIMEOUT_SECS")?)),
                None => None,
            },
        };
        ingest.validate()?;

        let valuation = match get("VALUATION_DECAY_RATES") {
            Some(raw) => ValuationConfig::new(parse_decay_rates(&raw)?)?,
            None => defaults.valuation,
        };

        Ok(Self {
            db_path: get("DB_PATH").map(PathBuf::from).unwrap_or(defaults.db_path),
            inventory_path: get("INVENTORY_PATH").map(PathBuf::from),
            feed: FeedConfig {
                endpoint: get("SALE_FEED_URL").unwrap_or(defaults.feed.endpoint),
                token: get("SALE_FEED_TOKEN"),
                audience: get("SALE_FEED_AUDIENCE"),
            },
            ingest,
            valuation,
        })
    }
}

/// "0,0.05,0.1" 형식의 감쇠율 목록
pub fn parse_decay_rates(raw: &str) -> Result<Vec<f64>, ConfigError> {
    let rates = raw
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| parse_value::<f64>(s, "VALUATION_DECAY_RATES"))
        .collect::<Result<Vec<_>, _>>()?;

    if rates.is_empty() {
        return Err(invalid("VALUATION_DECAY_RATES", raw));
    }
    validate_decay_rates(&rates)?;
    Ok(rates)
}

pub fn validate_decay_rates(rates: &[f64]) -> Result<(), ConfigError> {
    match rates.iter().find(|r| !r.is_finite() || **r < 0.0) {
        Some(bad) => Err(ConfigError::DecayRate(*bad)),
        None => Ok(()),
    }
}

fn parse_value<T: std::str::FromStr>(raw: &str, key: &str) -> Result<T, ConfigError> {
    raw.trim().parse().map_err(|_| invalid(key, raw))
}

fn parse_or<T: std::str::FromStr>(raw: Option<String>, key: &str, default: T) -> Result<T, ConfigError> {
    match raw {
        Some(raw) => parse_value(&raw, key),
        None => Ok(default),
    }
}

fn invalid(key: &str, value: impl ToString) -> ConfigError {
    ConfigError::Invalid {
        key: key.to_string(),
        value: value.to_string(),
    }
}
