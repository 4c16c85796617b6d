//! 구조화된 로깅 초기화.
//!
//! 개발 중에는 `pretty`, 로그 수집기가 붙는 운영 환경에서는 `json`을 사용합니다.
//! JSON 출력에만 파일/줄 번호를 포함합니다.
//!
//! 비밀번호, 비밀 키, 해시, 원본 토큰은 어떤 로그 필드에도 기록하지 않습니다.

use tracing_subscriber::{
    fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer, Registry,
};

use crate::config::LoggingConfig;

/// 로그 출력 형식.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
    Compact,
}

impl std::str::FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            "compact" => Ok(Self::Compact),
            _ => Err(format!("Unknown log format: {}", s)),
        }
    }
}

/// 검증된 로깅 설정.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogConfig {
    /// `EnvFilter` 지시자 (예: "info,tasktrace_api=debug")
    pub level: String,
    pub format: LogFormat,
}

impl From<&LoggingConfig> for LogConfig {
    /// 알 수 없는 형식은 pretty로 처리합니다.
    fn from(config: &LoggingConfig) -> Self {
        Self {
            level: config.level.clone(),
            format: config.format.parse().unwrap_or_default(),
        }
    }
}

impl LogConfig {
    fn fmt_layer(&self) -> Box<dyn Layer<Registry> + Send + Sync> {
        let with_location = self.format == LogFormat::Json;
        let layer = fmt::layer()
            .with_target(true)
            .with_file(with_location)
            .with_line_number(with_location);

        match self.format {
            LogFormat::Pretty => layer.pretty().boxed(),
            LogFormat::Json => layer.json().boxed(),
            LogFormat::Compact => layer.compact().boxed(),
        }
    }
}

/// 전역 tracing subscriber를 설치합니다.
///
/// `RUST_LOG`가 설정되어 있으면 `level`보다 우선합니다.
/// 이미 설치된 subscriber가 있으면 에러를 반환합니다.
pub fn init_logging(config: LogConfig) -> Result<(), Box<dyn std::error::Error>> {
    let env_filter =
        EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(&config.level))?;

    tracing_subscriber::registry()
        .with(config.fmt_layer())
        .with(env_filter)
        .try_init()?;

    tracing::info!(format = ?config.format, level = %config.level, "Logging initialized");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_format_from_str() {
        assert_eq!("pretty".parse::<LogFormat>().unwrap(), LogFormat::Pretty);
        assert_eq!(" JSON ".parse::<LogFormat>().unwrap(), LogFormat::Json);
        assert_eq!("compact".parse::<LogFormat>().unwrap(), LogFormat::Compact);
        assert!("xml".parse::<LogFormat>().is_err());
    }

    #[test]
    fn test_log_config_from_logging_config() {
        let config = LogConfig::from(&LoggingConfig {
            level: "tasktrace_api=debug".to_string(),
            format: "json".to_string(),
        });
        assert_eq!(
            config,
            LogConfig {
                level: "tasktrace_api=debug".to_string(),
                format: LogFormat::Json,
            }
        );

        let fallback = LogConfig::from(&LoggingConfig {
            level: "info".to_string(),
            format: "fancy".to_string(),
        });
        assert_eq!(fallback.format, LogFormat::Pretty);
    }
}
