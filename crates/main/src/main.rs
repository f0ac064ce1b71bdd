//! 主应用程序入口
//!
//! 读取环境变量配置，装配存储与服务，启动 Axum Web API 服务。

use std::sync::Arc;

use application::{
    MembershipService, MembershipServiceDependencies, UserService, UserServiceDependencies,
};
use config::AppConfig;
use infrastructure::Infrastructure;
use tracing_subscriber::EnvFilter;
use web_api::{router, AppState, JwtService};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 初始化日志
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = AppConfig::from_env()?;
    config.validate()?;
    tracing::info!(backend = ?config.database.backend, "configuration loaded");

    let infra = Infrastructure::from_config(&config).await?;

    // 创建应用层服务
    let user_service = UserService::new(UserServiceDependencies {
        user_repository: infra.user_repository.clone(),
        password_hasher: infra.password_hasher.clone(),
    });
    let membership_service = MembershipService::new(MembershipServiceDependencies {
        user_repository: infra.user_repository.clone(),
        chat_repository: infra.chat_repository.clone(),
        password_hasher: infra.password_hasher.clone(),
    });
    let jwt_service = JwtService::new(config.jwt.clone());

    let state = AppState::new(
        Arc::new(user_service),
        Arc::new(membership_service),
        Arc::new(jwt_service),
    );

    // 启动 Web 服务器
    let app = router(state);
    let address = config.server.bind_address();
    let listener = tokio::net::TcpListener::bind(&address).await?;

    tracing::info!("server listening on http://{}", address);
    axum::serve(listener, app).await?;

    Ok(())
}
