//! 主应用程序入口
//!
//! 组装私聊核心：数据库连接池、仓储适配器、用例服务、
//! 过期消息清扫任务与 Axum Web 服务。

use std::sync::Arc;
use std::time::Duration;

use application::presence::MemoryPresenceTracker;
use application::{
    ConnectionService, ConnectionServiceDependencies, KeyLocks, MessageService,
    MessageServiceDependencies, RetentionService, RetentionServiceDependencies, RoomRouter,
    SystemClock,
};
use config::AppConfig;
use infrastructure::{
    MessageSweeper, PgConnectionRepository, PgMessageRepository, PgProfileStore,
    PgRetentionRepository, PgTeamDirectory, PgTeamMessageRepository,
};
use tracing_subscriber::EnvFilter;
use web_api::{router, AppState, JwtService};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 初始化日志
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let config = AppConfig::from_env();
    tracing::info!(
        host = %config.server.host,
        port = config.server.port,
        "starting teamchat"
    );

    let pool = Arc::new(
        infrastructure::create_pool(&config.database.url, config.database.max_connections)
            .await?,
    );
    sqlx::migrate!("../../migrations").run(&*pool).await?;

    // 仓储与外部目录适配器
    let connections = Arc::new(PgConnectionRepository::new(pool.clone()));
    let messages = Arc::new(PgMessageRepository::new(pool.clone()));
    let team_messages = Arc::new(PgTeamMessageRepository::new(pool.clone()));
    let settings = Arc::new(PgRetentionRepository::new(pool.clone()));
    let profiles = Arc::new(PgProfileStore::new(pool.clone()));
    let teams = Arc::new(PgTeamDirectory::new(pool));

    // 共享组件
    let clock: Arc<dyn application::Clock> = Arc::new(SystemClock);
    let locks = Arc::new(KeyLocks::new());
    let room_router = Arc::new(RoomRouter::new());
    let presence = Arc::new(MemoryPresenceTracker::new());

    // 应用层服务
    let connection_service = Arc::new(ConnectionService::new(ConnectionServiceDependencies {
        connections,
        profiles,
        clock: clock.clone(),
        router: room_router.clone(),
        locks: locks.clone(),
    }));
    let retention_service = Arc::new(RetentionService::new(RetentionServiceDependencies {
        settings,
        clock: clock.clone(),
    }));
    let message_service = Arc::new(MessageService::new(MessageServiceDependencies {
        messages,
        team_messages,
        connections: connection_service.clone(),
        retention: retention_service.clone(),
        teams: teams.clone(),
        clock,
        locks,
    }));

    // 过期消息清扫任务
    let sweeper = MessageSweeper::new(
        message_service.clone(),
        Duration::from_secs(config.realtime.sweep_interval_secs),
    );
    tokio::spawn(sweeper.run());

    let jwt_service = Arc::new(JwtService::new(config.jwt.clone()));
    let state = AppState {
        connection_service,
        message_service,
        retention_service,
        presence,
        router: room_router,
        teams,
        jwt_service,
        realtime: config.realtime.clone(),
    };

    let app = router(state);
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("teamchat listening on http://{addr}");
    axum::serve(listener, app).await?;

    Ok(())
}
