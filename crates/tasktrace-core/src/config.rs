//! 설정 관리.
//!
//! 이 모듈은 애플리케이션 설정을 정의하고 관리합니다.
//!
//! 설정은 다음 순서로 병합됩니다 (뒤쪽이 우선):
//! 1. 내장 기본값
//! 2. TOML 설정 파일 (선택)
//! 3. `TASKTRACE__<SECTION>__<KEY>` 환경 변수
//! 4. 기존 서비스와 호환되는 단일 환경 변수
//!    (`JWT_SECRET_KEY`, `ALGORITHM`, `ACCESS_TOKEN_EXPIRE_MINUTES`, `API_HOST`, `API_PORT`,
//!    `DATABASE_URL`)
//!
//! 인증 설정은 [`AppConfig::auth_settings`]로 검증된 뒤에만 사용됩니다.
//! 비밀 키가 없거나 약하면 서버는 시작되지 않습니다.

use std::fmt;
use std::net::SocketAddr;
use std::path::Path;
use std::str::FromStr;

use chrono::Duration;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Deserializer};

use crate::error::{ConfigError, ConfigResult};

/// HMAC 서명 키의 최소 길이 (바이트).
pub const MIN_SECRET_LEN: usize = 32;

/// 기본 Access Token 만료 시간 (분).
pub const DEFAULT_TOKEN_TTL_MINUTES: i64 = 60;

/// 애플리케이션 설정.
#[derive(Debug, Deserialize)]
pub struct AppConfig {
    /// 서버 설정
    pub server: ServerConfig,
    /// 데이터베이스 설정
    pub database: DatabaseConfig,
    /// 인증 설정
    pub auth: AuthConfig,
    /// 비밀번호 해싱 설정
    pub hashing: HashingConfig,
    /// 로깅 설정
    pub logging: LoggingConfig,
}

/// 서버 설정.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// 바인딩할 호스트
    pub host: String,
    /// 리스닝할 포트
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8000,
        }
    }
}

impl ServerConfig {
    /// 소켓 주소 반환.
    ///
    /// # Errors
    /// `host:port` 형식이 유효하지 않으면 `AddrParseError`를 반환합니다.
    pub fn socket_addr(&self) -> Result<SocketAddr, std::net::AddrParseError> {
        format!("{}:{}", self.host, self.port).parse()
    }
}

/// 데이터베이스 설정.
///
/// `url`이 없으면 저장소는 메모리에만 유지됩니다.
#[derive(Debug, Deserialize)]
pub struct DatabaseConfig {
    /// PostgreSQL 연결 URL (비밀번호 포함 가능)
    #[serde(default, deserialize_with = "deserialize_secret")]
    pub url: Option<SecretString>,
    /// 최대 연결 수
    pub max_connections: u32,
    /// 연결 획득 타임아웃 (초)
    pub acquire_timeout_secs: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: None,
            max_connections: 10,
            acquire_timeout_secs: 10,
        }
    }
}

impl DatabaseConfig {
    /// 연결 획득 타임아웃.
    pub fn acquire_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.acquire_timeout_secs)
    }
}

/// 인증 설정 (검증 전 원본).
///
/// 비밀 값은 [`SecretString`]으로 보관되어 `Debug` 출력에서 가려집니다.
#[derive(Debug, Deserialize)]
pub struct AuthConfig {
    /// JWT 서명 비밀 키
    #[serde(default, deserialize_with = "deserialize_secret")]
    pub jwt_secret_key: Option<SecretString>,
    /// 서명 알고리즘 (HS256, HS384, HS512)
    pub algorithm: String,
    /// Access Token 기본 만료 시간 (분)
    pub access_token_expire_minutes: i64,
    /// 회원가입 시 admin 역할 요청 허용 여부
    #[serde(default)]
    pub allow_admin_signup: bool,
    /// 시작 시 생성할 관리자 이메일
    #[serde(default)]
    pub bootstrap_admin_email: Option<String>,
    /// 시작 시 생성할 관리자 비밀번호
    #[serde(default, deserialize_with = "deserialize_secret")]
    pub bootstrap_admin_password: Option<SecretString>,
}

fn deserialize_secret<'de, D>(deserializer: D) -> Result<Option<SecretString>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.map(SecretString::from))
}

/// Argon2 비밀번호 해싱 비용 설정.
///
/// 기본값은 Argon2id 권장 파라미터 (19 MiB, 2회 반복, 병렬도 1)입니다.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct HashingConfig {
    /// 메모리 비용 (KiB)
    pub memory_kib: u32,
    /// 반복 횟수
    pub iterations: u32,
    /// 병렬도
    pub parallelism: u32,
}

impl Default for HashingConfig {
    fn default() -> Self {
        Self {
            memory_kib: 19 * 1024,
            iterations: 2,
            parallelism: 1,
        }
    }
}

/// 로깅 설정.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// 로그 레벨
    pub level: String,
    /// 로그 형식 (pretty, json, compact)
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

/// 토큰 서명 알고리즘.
///
/// 공유 비밀 키 기반 HMAC 계열만 지원합니다.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SigningAlgorithm {
    HS256,
    HS384,
    HS512,
}

impl FromStr for SigningAlgorithm {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "HS256" => Ok(Self::HS256),
            "HS384" => Ok(Self::HS384),
            "HS512" => Ok(Self::HS512),
            _ => Err(ConfigError::UnsupportedAlgorithm(s.to_string())),
        }
    }
}

impl fmt::Display for SigningAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::HS256 => "HS256",
            Self::HS384 => "HS384",
            Self::HS512 => "HS512",
        };
        write!(f, "{}", s)
    }
}

/// 검증된 인증 설정.
///
/// 시작 시 한 번 생성되고 이후 변경되지 않습니다. 토큰 코덱만 비밀 키를 읽습니다.
#[derive(Debug)]
pub struct AuthSettings {
    secret: SecretString,
    algorithm: SigningAlgorithm,
    access_token_ttl: Duration,
}

impl AuthSettings {
    /// 인증 설정을 검증하여 생성합니다.
    ///
    /// # Errors
    ///
    /// - 비밀 키가 공백이면 [`ConfigError::MissingSecret`]
    /// - 비밀 키가 [`MIN_SECRET_LEN`]보다 짧으면 [`ConfigError::WeakSecret`]
    /// - 만료 시간이 0 이하이면 [`ConfigError::InvalidTokenLifetime`]
    pub fn new(
        secret: SecretString,
        algorithm: SigningAlgorithm,
        ttl_minutes: i64,
    ) -> ConfigResult<Self> {
        let len = secret.expose_secret().len();
        if secret.expose_secret().trim().is_empty() {
            return Err(ConfigError::MissingSecret);
        }
        if len < MIN_SECRET_LEN {
            return Err(ConfigError::WeakSecret {
                min: MIN_SECRET_LEN,
                actual: len,
            });
        }
        if ttl_minutes <= 0 {
            return Err(ConfigError::InvalidTokenLifetime(ttl_minutes));
        }

        Ok(Self {
            secret,
            algorithm,
            access_token_ttl: Duration::minutes(ttl_minutes),
        })
    }

    /// 서명 비밀 키.
    pub fn secret(&self) -> &SecretString {
        &self.secret
    }

    /// 서명 알고리즘.
    pub fn algorithm(&self) -> SigningAlgorithm {
        self.algorithm
    }

    /// Access Token 기본 만료 시간.
    pub fn access_token_ttl(&self) -> Duration {
        self.access_token_ttl
    }
}

/// 시작 시 생성할 관리자 계정.
#[derive(Debug)]
pub struct BootstrapAdmin {
    pub email: String,
    pub password: SecretString,
}

impl AppConfig {
    /// 파일(선택)과 환경 변수에서 설정을 로드합니다.
    ///
    /// 파일이 존재하지 않으면 건너뜁니다.
    pub fn load<P: AsRef<Path>>(path: Option<P>) -> ConfigResult<Self> {
        let mut builder = Self::builder_with_defaults()?;

        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path.as_ref()).required(false));
        }

        let builder = builder
            // 환경 변수로 오버라이드
            .add_source(
                config::Environment::with_prefix("TASKTRACE")
                    .separator("__")
                    .try_parsing(true),
            )
            // 기존 서비스 호환 환경 변수
            .set_override_option("auth.jwt_secret_key", std::env::var("JWT_SECRET_KEY").ok())?
            .set_override_option("auth.algorithm", std::env::var("ALGORITHM").ok())?
            .set_override_option(
                "auth.access_token_expire_minutes",
                std::env::var("ACCESS_TOKEN_EXPIRE_MINUTES").ok(),
            )?
            .set_override_option("server.host", std::env::var("API_HOST").ok())?
            .set_override_option("server.port", std::env::var("API_PORT").ok())?
            .set_override_option("database.url", std::env::var("DATABASE_URL").ok())?;

        Ok(builder.build()?.try_deserialize()?)
    }

    /// 기본 경로에서 설정을 로드합니다.
    pub fn load_default() -> ConfigResult<Self> {
        Self::load(Some("config/default.toml"))
    }

    /// TOML 문자열에서 설정을 로드합니다 (환경 변수 미사용).
    pub fn from_toml_str(toml: &str) -> ConfigResult<Self> {
        let config = Self::builder_with_defaults()?
            .add_source(config::File::from_str(toml, config::FileFormat::Toml))
            .build()?;
        Ok(config.try_deserialize()?)
    }

    fn builder_with_defaults(
    ) -> Result<config::ConfigBuilder<config::builder::DefaultState>, config::ConfigError> {
        let server = ServerConfig::default();
        let database = DatabaseConfig::default();
        let hashing = HashingConfig::default();
        let logging = LoggingConfig::default();

        config::Config::builder()
            .set_default("server.host", server.host)?
            .set_default("server.port", i64::from(server.port))?
            .set_default("database.max_connections", i64::from(database.max_connections))?
            .set_default(
                "database.acquire_timeout_secs",
                database.acquire_timeout_secs as i64,
            )?
            .set_default("auth.algorithm", SigningAlgorithm::HS256.to_string())?
            .set_default("auth.access_token_expire_minutes", DEFAULT_TOKEN_TTL_MINUTES)?
            .set_default("auth.allow_admin_signup", false)?
            .set_default("hashing.memory_kib", i64::from(hashing.memory_kib))?
            .set_default("hashing.iterations", i64::from(hashing.iterations))?
            .set_default("hashing.parallelism", i64::from(hashing.parallelism))?
            .set_default("logging.level", logging.level)?
            .set_default("logging.format", logging.format)
    }

    /// 검증된 인증 설정을 생성합니다.
    ///
    /// 비밀 키가 없으면 기본값으로 대체하지 않고 에러를 반환합니다.
    pub fn auth_settings(&self) -> ConfigResult<AuthSettings> {
        let secret = self
            .auth
            .jwt_secret_key
            .as_ref()
            .ok_or(ConfigError::MissingSecret)?;
        let algorithm: SigningAlgorithm = self.auth.algorithm.parse()?;

        AuthSettings::new(
            SecretString::from(secret.expose_secret().to_owned()),
            algorithm,
            self.auth.access_token_expire_minutes,
        )
    }

    /// bootstrap 관리자 설정을 반환합니다.
    ///
    /// 이메일과 비밀번호 중 하나만 설정된 경우 에러입니다.
    pub fn bootstrap_admin(&self) -> ConfigResult<Option<BootstrapAdmin>> {
        match (
            &self.auth.bootstrap_admin_email,
            &self.auth.bootstrap_admin_password,
        ) {
            (None, None) => Ok(None),
            (Some(email), Some(password)) => Ok(Some(BootstrapAdmin {
                email: email.trim().to_string(),
                password: SecretString::from(password.expose_secret().to_owned()),
            })),
            _ => Err(ConfigError::IncompleteBootstrapAdmin),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "test-secret-key-for-jwt-testing-minimum-32-chars";

    #[test]
    fn test_defaults_without_secret() {
        let config = AppConfig::from_toml_str("").unwrap();

        assert_eq!(config.server.port, 8000);
        assert_eq!(config.auth.algorithm, "HS256");
        assert_eq!(config.auth.access_token_expire_minutes, 60);
        assert!(!config.auth.allow_admin_signup);
        assert_eq!(config.hashing, HashingConfig::default());
        assert!(config.database.url.is_none());
        assert_eq!(config.database.max_connections, 10);

        // 비밀 키가 없으면 시작 불가
        assert!(matches!(
            config.auth_settings(),
            Err(ConfigError::MissingSecret)
        ));
    }

    #[test]
    fn test_auth_settings_from_toml() {
        let toml = format!(
            r#"
            [auth]
            jwt_secret_key = "{SECRET}"
            algorithm = "hs512"
            access_token_expire_minutes = 15
            "#
        );
        let config = AppConfig::from_toml_str(&toml).unwrap();
        let settings = config.auth_settings().unwrap();

        assert_eq!(settings.algorithm(), SigningAlgorithm::HS512);
        assert_eq!(settings.access_token_ttl(), Duration::minutes(15));
        assert_eq!(settings.secret().expose_secret(), SECRET);
    }

    #[test]
    fn test_unsupported_algorithm() {
        let toml = format!(
            r#"
            [auth]
            jwt_secret_key = "{SECRET}"
            algorithm = "RS256"
            "#
        );
        let config = AppConfig::from_toml_str(&toml).unwrap();
        assert!(matches!(
            config.auth_settings(),
            Err(ConfigError::UnsupportedAlgorithm(_))
        ));
    }

    #[test]
    fn test_blank_and_short_secrets_rejected() {
        let blank = AuthSettings::new(SecretString::from("   "), SigningAlgorithm::HS256, 60);
        assert!(matches!(blank, Err(ConfigError::MissingSecret)));

        let short = AuthSettings::new(SecretString::from("short"), SigningAlgorithm::HS256, 60);
        assert!(matches!(
            short,
            Err(ConfigError::WeakSecret { min: 32, actual: 5 })
        ));
    }

    #[test]
    fn test_non_positive_ttl_rejected() {
        let result = AuthSettings::new(SecretString::from(SECRET), SigningAlgorithm::HS256, 0);
        assert!(matches!(result, Err(ConfigError::InvalidTokenLifetime(0))));
    }

    #[test]
    fn test_debug_redacts_secret() {
        let settings =
            AuthSettings::new(SecretString::from(SECRET), SigningAlgorithm::HS256, 60).unwrap();
        let debug = format!("{:?}", settings);
        assert!(!debug.contains(SECRET));
    }

    #[test]
    fn test_signing_algorithm_parse() {
        assert_eq!("HS256".parse::<SigningAlgorithm>().unwrap(), SigningAlgorithm::HS256);
        assert_eq!(" hs384 ".parse::<SigningAlgorithm>().unwrap(), SigningAlgorithm::HS384);
        assert!("none".parse::<SigningAlgorithm>().is_err());
        assert!("ES256".parse::<SigningAlgorithm>().is_err());
    }

    #[test]
    fn test_bootstrap_admin_requires_both_fields() {
        let toml = r#"
            [auth]
            bootstrap_admin_email = "root@example.com"
        "#;
        let config = AppConfig::from_toml_str(toml).unwrap();
        assert!(matches!(
            config.bootstrap_admin(),
            Err(ConfigError::IncompleteBootstrapAdmin)
        ));

        let toml = r#"
            [auth]
            bootstrap_admin_email = " root@example.com "
            bootstrap_admin_password = "change-me-please"
        "#;
        let config = AppConfig::from_toml_str(toml).unwrap();
        let admin = config.bootstrap_admin().unwrap().unwrap();
        assert_eq!(admin.email, "root@example.com");
        assert_eq!(admin.password.expose_secret(), "change-me-please");
    }

    #[test]
    fn test_database_section() {
        let toml = r#"
            [database]
            url = "postgres://tasktrace:pw@localhost/tasktrace"
            max_connections = 4
            acquire_timeout_secs = 3
        "#;
        let config = AppConfig::from_toml_str(toml).unwrap();

        assert_eq!(
            config.database.url.as_ref().unwrap().expose_secret(),
            "postgres://tasktrace:pw@localhost/tasktrace"
        );
        assert_eq!(config.database.max_connections, 4);
        assert_eq!(config.database.acquire_timeout(), std::time::Duration::from_secs(3));
        assert!(!format!("{:?}", config.database).contains("pw@"));
    }

    #[test]
    fn test_socket_addr() {
        let server = ServerConfig::default();
        assert_eq!(server.socket_addr().unwrap().port(), 8000);

        let bad = ServerConfig {
            host: "not a host".to_string(),
            port: 1,
        };
        assert!(bad.socket_addr().is_err());
    }
}
