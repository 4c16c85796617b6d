//! JWT 토큰 처리.
//!
//! Access Token 발급 및 검증 로직. 코덱은 사용자 저장소에 접근하지 않으며
//! (토큰, 비밀 키, 알고리즘, 시계)만으로 결과가 결정됩니다.

use std::sync::Arc;

use chrono::Duration;
use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use secrecy::ExposeSecret;
use serde::{Deserialize, Deserializer, Serialize};
use tasktrace_core::{AuthSettings, Role, SigningAlgorithm};

use super::Clock;

/// JWT Access Token 페이로드.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Subject - 사용자 ID (문자열)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub: Option<String>,
    /// 발급 시점의 사용자 역할.
    ///
    /// 감사/디버그 로그용이며 권한 판단에는 사용하지 않습니다.
    /// 알 수 없는 값이나 누락은 토큰을 무효로 만들지 않고 `None`이 됩니다.
    #[serde(
        default,
        deserialize_with = "lenient_role",
        skip_serializing_if = "Option::is_none"
    )]
    pub role: Option<Role>,
    /// Issued At - 토큰 발급 시간 (Unix timestamp)
    #[serde(default)]
    pub iat: i64,
    /// Expiration - 토큰 만료 시간 (Unix timestamp)
    pub exp: i64,
    /// JWT ID - 토큰 고유 식별자
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jti: Option<String>,
}

fn lenient_role<'de, D>(deserializer: D) -> Result<Option<Role>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(value.as_str().and_then(Role::parse))
}

/// 발급된 Access Token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IssuedToken {
    /// Access Token
    pub access_token: String,
    /// 만료까지 남은 시간 (초)
    pub expires_in: i64,
}

/// 토큰 처리 에러.
///
/// 식별자 해석기는 이 구분을 로그에만 남기고 호출자에게는 하나의 인증 에러로 통일합니다.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TokenError {
    #[error("잘못된 토큰 형식")]
    Malformed,
    #[error("토큰 서명이 유효하지 않습니다")]
    InvalidSignature,
    #[error("허용되지 않는 서명 알고리즘")]
    WrongAlgorithm,
    #[error("토큰이 만료되었습니다")]
    Expired,
    #[error("토큰 만료 시간은 양수여야 합니다")]
    InvalidLifetime,
    #[error("토큰 인코딩 실패: {0}")]
    Encoding(String),
}

impl TokenError {
    /// 로그 필드용 짧은 사유.
    pub fn reason(&self) -> &'static str {
        match self {
            TokenError::Malformed => "malformed",
            TokenError::InvalidSignature => "invalid_signature",
            TokenError::WrongAlgorithm => "wrong_algorithm",
            TokenError::Expired => "expired",
            TokenError::InvalidLifetime => "invalid_lifetime",
            TokenError::Encoding(_) => "encoding",
        }
    }
}

fn jwt_algorithm(algorithm: SigningAlgorithm) -> Algorithm {
    match algorithm {
        SigningAlgorithm::HS256 => Algorithm::HS256,
        SigningAlgorithm::HS384 => Algorithm::HS384,
        SigningAlgorithm::HS512 => Algorithm::HS512,
    }
}

/// 토큰 코덱.
///
/// 서명 키는 생성 시 한 번 만들어지며, 비밀 키를 읽는 유일한 구성 요소입니다.
pub struct TokenCodec {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    algorithm: Algorithm,
    default_ttl: Duration,
    clock: Arc<dyn Clock>,
}

impl TokenCodec {
    /// 검증된 인증 설정과 시계로 코덱 생성.
    pub fn new(settings: &AuthSettings, clock: Arc<dyn Clock>) -> Self {
        let secret = settings.secret().expose_secret().as_bytes();
        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            algorithm: jwt_algorithm(settings.algorithm()),
            default_ttl: settings.access_token_ttl(),
            clock,
        }
    }

    /// 기본 만료 시간.
    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    /// 기본 만료 시간으로 Access Token 발급.
    ///
    /// # Arguments
    ///
    /// * `subject` - 사용자 ID (문자열 형태)
    /// * `role` - 발급 시점의 사용자 역할
    pub fn issue_token(
        &self,
        subject: impl Into<String>,
        role: Role,
    ) -> Result<IssuedToken, TokenError> {
        self.issue_token_with_ttl(subject, role, None)
    }

    /// 만료 시간을 지정하여 Access Token 발급.
    ///
    /// `ttl`이 `None`이면 설정된 기본값을 사용합니다.
    ///
    /// # Errors
    ///
    /// - `ttl`이 0 이하이면 [`TokenError::InvalidLifetime`]
    /// - 서명 실패 시 [`TokenError::Encoding`]
    pub fn issue_token_with_ttl(
        &self,
        subject: impl Into<String>,
        role: Role,
        ttl: Option<Duration>,
    ) -> Result<IssuedToken, TokenError> {
        let ttl = ttl.unwrap_or(self.default_ttl);
        if ttl <= Duration::zero() {
            return Err(TokenError::InvalidLifetime);
        }

        let now = self.clock.now();
        let claims = Claims {
            sub: Some(subject.into()),
            role: Some(role),
            iat: now.timestamp(),
            exp: (now + ttl).timestamp(),
            jti: Some(uuid::Uuid::new_v4().to_string()),
        };

        let access_token = encode(&Header::new(self.algorithm), &claims, &self.encoding_key)
            .map_err(|e| TokenError::Encoding(e.to_string()))?;

        Ok(IssuedToken {
            access_token,
            expires_in: ttl.num_seconds(),
        })
    }

    /// 토큰 디코딩 및 검증.
    ///
    /// 서명과 알고리즘을 확인한 뒤, 주입된 시계 기준으로 `exp > now`일 때만 통과합니다.
    pub fn validate_token(&self, token: &str) -> Result<Claims, TokenError> {
        let mut validation = Validation::new(self.algorithm);
        // 만료는 주입된 시계로 직접 확인
        validation.validate_exp = false;
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp"]);

        let data = decode::<Claims>(token, &self.decoding_key, &validation).map_err(|e| {
            match e.kind() {
                ErrorKind::InvalidSignature => TokenError::InvalidSignature,
                ErrorKind::InvalidAlgorithm => TokenError::WrongAlgorithm,
                _ => TokenError::Malformed,
            }
        })?;

        if data.claims.exp <= self.clock.now().timestamp() {
            return Err(TokenError::Expired);
        }

        Ok(data.claims)
    }
}
