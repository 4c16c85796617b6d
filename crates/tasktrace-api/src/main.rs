//! 작업 관리 API 서버.
//!
//! 설정을 검증한 뒤 Axum 기반 REST API 서버를 시작합니다.
//! 인증 설정이 유효하지 않으면 서버는 시작되지 않습니다.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use axum::{http::StatusCode, Router};
use secrecy::ExposeSecret;
use sqlx::postgres::PgPoolOptions;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use tasktrace_api::auth::SystemClock;
use tasktrace_api::repository::ensure_schema;
use tasktrace_api::routes::create_api_router;
use tasktrace_api::state::AppState;
use tasktrace_core::{init_logging, AppConfig, LogConfig};

/// 전체 라우터 생성.
fn create_router(state: Arc<AppState>) -> Router {
    create_api_router()
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        // 전역 타임아웃 (30초) - 408 상태 코드 반환
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            Duration::from_secs(30),
        ))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // .env 파일 로드 (있는 경우)
    let _ = dotenvy::dotenv();

    let config = AppConfig::load_default().context("설정 로드 실패")?;

    init_logging(LogConfig::from(&config.logging))
        .map_err(|e| anyhow::anyhow!("로깅 초기화 실패: {}", e))?;

    // 인증 설정 검증 (실패 시 시작 중단)
    let auth_settings = match config.auth_settings() {
        Ok(settings) => settings,
        Err(e) => {
            error!(auth_related = e.is_auth_related(), "Invalid auth configuration: {}", e);
            return Err(e.into());
        }
    };
    info!(
        algorithm = %auth_settings.algorithm(),
        token_ttl_minutes = auth_settings.access_token_ttl().num_minutes(),
        "Auth settings loaded"
    );

    let mut state = AppState::new(&auth_settings, &config.hashing, Arc::new(SystemClock))
        .context("애플리케이션 상태 생성 실패")?
        .with_admin_signup(config.auth.allow_admin_signup);

    // 데이터베이스 연결 (DATABASE_URL 없으면 메모리 저장소)
    if let Some(url) = &config.database.url {
        let pool = PgPoolOptions::new()
            .max_connections(config.database.max_connections)
            .acquire_timeout(config.database.acquire_timeout())
            .connect(url.expose_secret())
            .await
            .context("데이터베이스 연결 실패")?;
        ensure_schema(&pool)
            .await
            .context("데이터베이스 스키마 생성 실패")?;
        info!(
            max_connections = config.database.max_connections,
            "Connected to database"
        );
        state = state.with_database(pool);
    } else {
        warn!("DATABASE_URL not set, using in-memory stores");
    }

    if state.allow_admin_signup {
        warn!("Admin self-signup is enabled");
    }

    if let Some(admin) = config.bootstrap_admin()? {
        state
            .bootstrap_admin(&admin)
            .await
            .context("bootstrap 관리자 생성 실패")?;
    }

    let state = Arc::new(state);
    info!(version = %state.version, "Application state initialized");

    let addr = config
        .server
        .socket_addr()
        .context("잘못된 서버 주소")?;
    let app = create_router(state);

    info!(%addr, "API server listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            warn!("Received Ctrl+C, initiating graceful shutdown...");
        }
        _ = terminate => {
            warn!("Received SIGTERM, initiating graceful shutdown...");
        }
    }
}
