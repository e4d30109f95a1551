use crate::shared::errors::{AppError, AppResult};
use rusqlite::Connection;
use std::path::Path;
use std::time::Duration;

/// データベース接続を初期化し、テーブルを作成する
///
/// # 引数
/// * `database_path` - データベースファイルのパス
///
/// # 戻り値
/// データベース接続、または失敗時はエラー
///
/// # 処理内容
/// 1. データベースファイルのディレクトリの確保
/// 2. データベース接続の開設
/// 3. テーブル作成
pub fn initialize_database(database_path: &Path) -> AppResult<Connection> {
    if let Some(parent) = database_path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            std::fs::create_dir_all(parent).map_err(|e| {
                AppError::configuration(format!("データベースディレクトリの作成に失敗: {e}"))
            })?;
            log::info!("データベースディレクトリを作成: {}", parent.display());
        }
    }

    let conn = Connection::open(database_path)?;
    conn.busy_timeout(Duration::from_secs(5))?;

    create_tables(&conn)?;

    log::info!("データベースを初期化しました: {}", database_path.display());

    Ok(conn)
}

/// テスト・一時利用向けのインメモリ接続を作成する（テーブル作成済み）
pub fn create_in_memory_connection() -> AppResult<Connection> {
    let conn = Connection::open_in_memory()?;
    create_tables(&conn)?;
    Ok(conn)
}

/// データベーステーブルを作成する
///
/// 何度実行しても既存データは変更されない。
pub fn create_tables(conn: &Connection) -> AppResult<()> {
    create_subscriptions_table(conn)?;
    create_scheduler_marks_table(conn)?;
    create_indexes(conn)?;
    Ok(())
}

/// サブスクリプションテーブルを作成する
fn create_subscriptions_table(conn: &Connection) -> AppResult<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS subscriptions (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            owner_id INTEGER NOT NULL,
            name TEXT NOT NULL CHECK(length(trim(name)) > 0),
            amount REAL NOT NULL CHECK(amount > 0),
            period TEXT NOT NULL CHECK(period IN ('monthly', 'yearly')),
            next_payment TEXT NOT NULL,
            created_at TEXT NOT NULL
        )",
        [],
    )?;

    Ok(())
}

/// スケジューラーの発火済みマーカーテーブルを作成する
fn create_scheduler_marks_table(conn: &Connection) -> AppResult<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS scheduler_marks (
            job TEXT NOT NULL,
            window_key TEXT NOT NULL,
            fired_at TEXT NOT NULL,
            PRIMARY KEY (job, window_key)
        )",
        [],
    )?;

    Ok(())
}

/// インデックスを作成する
fn create_indexes(conn: &Connection) -> AppResult<()> {
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_subscriptions_owner ON subscriptions(owner_id)",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_subscriptions_next_payment ON subscriptions(next_payment)",
        [],
    )?;

    Ok(())
}
