// 機能モジュール構造
pub mod features;
pub mod shared;

use features::bot::{run_polling, BotHandler, TelegramClient};
use features::conversation::SessionStore;
use features::notifications::{
    MinuteMatchPolicy, NotificationScheduler, PersistedWindowPolicy, TriggerPolicy,
};
use features::subscriptions::SqliteSubscriptionStore;
use log::{error, info};
use shared::clock::SystemClock;
use shared::config::{
    initialize_logging_system, load_environment_variables, BotConfig, SchedulerPolicyKind,
};
use shared::database::initialize_database;
use shared::errors::{AppError, AppResult};
use std::sync::{Arc, Mutex};
use tokio_util::sync::CancellationToken;

/// ボットを起動し、Ctrl-Cで停止するまで動かす
pub async fn run() -> AppResult<()> {
    // .envファイルを読み込んでからログシステムを初期化する
    load_environment_variables();
    initialize_logging_system();

    info!("ボットの初期化を開始します...");
    let config = BotConfig::from_env()?;
    info!("設定を読み込みました: {config:?}");

    let conn = initialize_database(&config.database_path)?;
    info!(
        "データベースを初期化しました: {}",
        config.database_path.display()
    );
    let conn = Arc::new(Mutex::new(conn));

    let store = Arc::new(SqliteSubscriptionStore::new(Arc::clone(&conn)));
    let sessions = Arc::new(SessionStore::new(config.session_ttl));
    let clock = Arc::new(SystemClock::new(config.timezone));
    let telegram = Arc::new(TelegramClient::new(config.telegram.clone())?);

    let handler = BotHandler::new(
        store.clone(),
        sessions,
        telegram.clone(),
        clock.clone(),
    );

    let policy: Arc<dyn TriggerPolicy> = match config.scheduler_policy {
        SchedulerPolicyKind::MinuteMatch => Arc::new(MinuteMatchPolicy::new()),
        SchedulerPolicyKind::PersistedWindow => Arc::new(PersistedWindowPolicy::new(conn)),
    };
    let scheduler = NotificationScheduler::new(
        store,
        telegram.clone(),
        clock,
        policy,
        config.scheduler_interval,
    );

    let cancel = CancellationToken::new();
    let scheduler_task = {
        let cancel = cancel.clone();
        tokio::spawn(async move { scheduler.run(cancel).await })
    };

    let shutdown = {
        let cancel = cancel.clone();
        async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => info!("停止シグナルを受信しました"),
                Err(e) => error!("停止シグナルの待機に失敗しました: {e}"),
            }
            cancel.cancel();
        }
    };

    info!("ボットを起動しました");
    tokio::join!(run_polling(&telegram, &handler, cancel.clone()), shutdown);

    scheduler_task
        .await
        .map_err(|e| AppError::ExternalService(format!("スケジューラーの終了待ちに失敗しました: {e}")))?;

    info!("ボットを停止しました");
    Ok(())
}
