use super::models::{NewSubscription, OwnerId, Subscription};
use crate::shared::errors::{AppError, AppResult};
use chrono::{Local, NaiveDate};
use rusqlite::{params, Connection, Row};
use std::collections::BTreeSet;

const SELECT_COLUMNS: &str =
    "SELECT id, owner_id, name, amount, period, next_payment, created_at FROM subscriptions";

fn map_row(row: &Row<'_>) -> rusqlite::Result<Subscription> {
    Ok(Subscription {
        id: row.get(0)?,
        owner_id: row.get(1)?,
        name: row.get(2)?,
        amount: row.get(3)?,
        period: row.get(4)?,
        next_payment: row.get(5)?,
        created_at: row.get(6)?,
    })
}

/// サブスクリプションを作成する
///
/// # 引数
/// * `conn` - データベース接続
/// * `owner_id` - 所有ユーザーID
/// * `new_subscription` - 会話で確定した内容
///
/// # 戻り値
/// 作成されたサブスクリプション、または失敗時はエラー
pub fn create(
    conn: &Connection,
    owner_id: OwnerId,
    new_subscription: &NewSubscription,
) -> AppResult<Subscription> {
    new_subscription.validate()?;

    let now = Local::now().to_rfc3339();

    conn.execute(
        "INSERT INTO subscriptions (owner_id, name, amount, period, next_payment, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            owner_id,
            new_subscription.name,
            new_subscription.amount,
            new_subscription.period,
            new_subscription.next_payment,
            now
        ],
    )?;

    let id = conn.last_insert_rowid();
    find_by_id(conn, id, owner_id)
}

/// IDでサブスクリプションを取得する（所有者一致のみ）
///
/// # 戻り値
/// サブスクリプション、存在しないか他人のものの場合はNotFoundOrForbidden
pub fn find_by_id(conn: &Connection, id: i64, owner_id: OwnerId) -> AppResult<Subscription> {
    conn.query_row(
        &format!("{SELECT_COLUMNS} WHERE id = ?1 AND owner_id = ?2"),
        params![id, owner_id],
        map_row,
    )
    .map_err(|e| match e {
        rusqlite::Error::QueryReturnedNoRows => {
            AppError::not_found_or_forbidden(format!("subscription {id} for owner {owner_id}"))
        }
        _ => AppError::Database(e.to_string()),
    })
}

/// ユーザーのサブスクリプション一覧を取得する
///
/// # 戻り値
/// 次回支払日順のリスト、または失敗時はエラー
pub fn find_all(conn: &Connection, owner_id: OwnerId) -> AppResult<Vec<Subscription>> {
    let mut stmt = conn.prepare(&format!(
        "{SELECT_COLUMNS} WHERE owner_id = ?1 ORDER BY next_payment, id"
    ))?;
    let subscriptions = stmt.query_map([owner_id], map_row)?;

    subscriptions
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| AppError::Database(e.to_string()))
}

/// 指定日に支払いがあるサブスクリプションを全ユーザー分取得する
pub fn find_due_on(conn: &Connection, date: NaiveDate) -> AppResult<Vec<Subscription>> {
    let mut stmt = conn.prepare(&format!(
        "{SELECT_COLUMNS} WHERE next_payment = ?1 ORDER BY owner_id, id"
    ))?;
    let subscriptions = stmt.query_map(params![date], map_row)?;

    subscriptions
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| AppError::Database(e.to_string()))
}

/// サブスクリプションを1件以上持つユーザーIDの一覧
pub fn distinct_owners(conn: &Connection) -> AppResult<BTreeSet<OwnerId>> {
    let mut stmt = conn.prepare("SELECT DISTINCT owner_id FROM subscriptions")?;
    let owners = stmt.query_map([], |row| row.get::<_, OwnerId>(0))?;

    owners
        .collect::<Result<BTreeSet<_>, _>>()
        .map_err(|e| AppError::Database(e.to_string()))
}

/// サブスクリプションを削除する
///
/// 存在しない場合と他ユーザーのものの場合は同じエラーを返す。
///
/// # 戻り値
/// 削除されたサブスクリプション、または失敗時はエラー
pub fn delete(conn: &mut Connection, id: i64, owner_id: OwnerId) -> AppResult<Subscription> {
    let tx = conn.transaction()?;

    let existing = find_by_id(&tx, id, owner_id)?;
    let rows_affected = tx.execute(
        "DELETE FROM subscriptions WHERE id = ?1 AND owner_id = ?2",
        params![id, owner_id],
    )?;

    if rows_affected == 0 {
        return Err(AppError::not_found_or_forbidden(format!(
            "subscription {id} for owner {owner_id}"
        )));
    }

    tx.commit()?;
    Ok(existing)
}
