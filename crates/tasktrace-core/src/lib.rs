//! # TaskTrace Core
//!
//! 작업 관리 서비스의 핵심 도메인 모델 및 공통 인프라를 제공합니다.
//!
//! 이 크레이트는 서비스 전반에서 사용되는 기본 타입을 제공합니다:
//! - 사용자, 역할, 작업 도메인 모델
//! - 설정 관리 (인증 설정 검증 포함)
//! - 로깅 인프라
//! - 에러 타입

pub mod config;
pub mod domain;
pub mod error;
pub mod logging;

pub use crate::config::*;
pub use domain::*;
pub use error::*;
pub use logging::*;
