//! 비밀번호 해싱 유틸리티.
//!
//! Argon2id 기반 비밀번호 해싱 및 검증. 비용 파라미터는 설정에서 주입됩니다.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Algorithm, Argon2, Params, Version,
};
use tasktrace_core::{ConfigError, ConfigResult, HashingConfig};

/// 허용되는 최대 비밀번호 길이 (바이트).
pub const MAX_PASSWORD_BYTES: usize = 1024;

/// 비밀번호 처리 에러.
#[derive(Debug, thiserror::Error)]
pub enum PasswordError {
    #[error("비밀번호가 비어 있습니다")]
    Empty,
    #[error("비밀번호는 최대 {max}바이트까지 허용됩니다")]
    TooLong { max: usize },
    #[error("비밀번호 해싱 실패")]
    HashingFailed,
}

/// 더미 해시의 평문. 어떤 계정의 비밀번호와도 비교되지 않습니다.
const DUMMY_PASSWORD: &[u8] = b"tasktrace-unknown-account";

/// 자격 증명 해셔.
///
/// 시작 시 한 번 생성되어 요청 간에 공유됩니다.
/// 같은 비용 설정으로 만든 더미 해시를 함께 보관합니다.
#[derive(Clone)]
pub struct CredentialHasher {
    argon2: Argon2<'static>,
    dummy_digest: Arc<str>,
    verifications: Arc<AtomicU64>,
}

impl CredentialHasher {
    /// 해싱 설정으로 해셔 생성.
    ///
    /// # Errors
    ///
    /// Argon2 파라미터가 허용 범위를 벗어나면 [`ConfigError::InvalidHashing`]
    pub fn new(config: &HashingConfig) -> ConfigResult<Self> {
        let params = Params::new(
            config.memory_kib,
            config.iterations,
            config.parallelism,
            None,
        )
        .map_err(|e| ConfigError::InvalidHashing(e.to_string()))?;
        let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);

        let salt = SaltString::generate(&mut OsRng);
        let dummy_digest = argon2
            .hash_password(DUMMY_PASSWORD, &salt)
            .map_err(|e| ConfigError::InvalidHashing(e.to_string()))?
            .to_string();

        Ok(Self {
            argon2,
            dummy_digest: dummy_digest.into(),
            verifications: Arc::new(AtomicU64::new(0)),
        })
    }

    /// 비밀번호 해싱.
    ///
    /// 솔트는 매번 새로 생성되므로 같은 비밀번호도 다른 해시가 됩니다.
    ///
    /// # Arguments
    ///
    /// * `password` - 해싱할 평문 비밀번호
    ///
    /// # Returns
    ///
    /// PHC 형식의 해시 문자열 (솔트 및 파라미터 포함)
    pub fn hash_password(&self, password: &str) -> Result<String, PasswordError> {
        if password.is_empty() {
            return Err(PasswordError::Empty);
        }
        if password.len() > MAX_PASSWORD_BYTES {
            return Err(PasswordError::TooLong {
                max: MAX_PASSWORD_BYTES,
            });
        }

        let salt = SaltString::generate(&mut OsRng);
        let hash = self
            .argon2
            .hash_password(password.as_bytes(), &salt)
            .map_err(|_| PasswordError::HashingFailed)?;

        Ok(hash.to_string())
    }

    /// 비밀번호 검증.
    ///
    /// 불일치, 손상된 해시, 허용 길이 초과 입력은 모두 `false`입니다.
    /// 검증은 해시에 기록된 파라미터로 수행됩니다.
    pub fn verify_password(&self, password: &str, digest: &str) -> bool {
        if password.len() > MAX_PASSWORD_BYTES {
            return false;
        }
        let Ok(parsed) = PasswordHash::new(digest) else {
            return false;
        };

        self.verifications.fetch_add(1, Ordering::Relaxed);
        self.argon2
            .verify_password(password.as_bytes(), &parsed)
            .is_ok()
    }

    /// 로그인용 검증.
    ///
    /// 계정이 없으면(`digest`가 `None`) 더미 해시로 같은 비용의 검증을 수행한 뒤
    /// `false`를 반환합니다. 응답 시간으로 등록된 이메일을 구분할 수 없습니다.
    pub fn verify_credentials(&self, password: &str, digest: Option<&str>) -> bool {
        match digest {
            Some(digest) => self.verify_password(password, digest),
            None => {
                let _ = self.verify_password(password, &self.dummy_digest);
                false
            }
        }
    }

    /// 지금까지 실행된 Argon2 검증 횟수.
    pub fn verification_count(&self) -> u64 {
        self.verifications.load(Ordering::Relaxed)
    }
}
