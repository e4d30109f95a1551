use super::models::{NewSubscription, OwnerId, Subscription};
use super::repository;
use crate::shared::database::create_in_memory_connection;
use crate::shared::errors::{AppError, AppResult};
use chrono::NaiveDate;
use rusqlite::Connection;
use std::collections::BTreeSet;
use std::sync::{Arc, Mutex, MutexGuard};

/// サブスクリプションの永続化契約
///
/// 変更系の操作は戻る前にコミットされ、途中状態は観測されない。
pub trait SubscriptionStore: Send + Sync {
    /// ユーザーのサブスクリプション一覧（順序は保証しない）
    fn list(&self, owner_id: OwnerId) -> AppResult<Vec<Subscription>>;

    /// 新しいサブスクリプションを保存する
    fn insert(&self, owner_id: OwnerId, draft: &NewSubscription) -> AppResult<Subscription>;

    /// 所有者が一致する場合のみ削除し、削除したレコードを返す
    fn delete_by_id(&self, id: i64, owner_id: OwnerId) -> AppResult<Subscription>;

    /// サブスクリプションを1件以上持つユーザー
    fn distinct_owners(&self) -> AppResult<BTreeSet<OwnerId>>;

    /// 指定日に支払いがあるサブスクリプション（全ユーザー）
    fn due_on(&self, date: NaiveDate) -> AppResult<Vec<Subscription>>;
}

/// SQLiteによるSubscriptionStoreの実装
#[derive(Clone)]
pub struct SqliteSubscriptionStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteSubscriptionStore {
    /// # 引数
    /// * `conn` - テーブル作成済みのデータベース接続
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    /// インメモリDBを使うストアを作成する
    pub fn in_memory() -> AppResult<Self> {
        let conn = create_in_memory_connection()?;
        Ok(Self::new(Arc::new(Mutex::new(conn))))
    }

    /// 共有しているデータベース接続
    pub fn connection(&self) -> Arc<Mutex<Connection>> {
        Arc::clone(&self.conn)
    }

    fn lock(&self) -> AppResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| AppError::Database(format!("データベースロックエラー: {e}")))
    }
}

impl SubscriptionStore for SqliteSubscriptionStore {
    fn list(&self, owner_id: OwnerId) -> AppResult<Vec<Subscription>> {
        let conn = self.lock()?;
        repository::find_all(&conn, owner_id)
    }

    fn insert(&self, owner_id: OwnerId, draft: &NewSubscription) -> AppResult<Subscription> {
        let conn = self.lock()?;
        let created = repository::create(&conn, owner_id, draft)?;
        log::info!(
            "サブスクリプションを作成しました: id={}, owner_id={owner_id}",
            created.id
        );
        Ok(created)
    }

    fn delete_by_id(&self, id: i64, owner_id: OwnerId) -> AppResult<Subscription> {
        let mut conn = self.lock()?;
        let deleted = repository::delete(&mut conn, id, owner_id)?;
        log::info!("サブスクリプションを削除しました: id={id}, owner_id={owner_id}");
        Ok(deleted)
    }

    fn distinct_owners(&self) -> AppResult<BTreeSet<OwnerId>> {
        let conn = self.lock()?;
        repository::distinct_owners(&conn)
    }

    fn due_on(&self, date: NaiveDate) -> AppResult<Vec<Subscription>> {
        let conn = self.lock()?;
        repository::find_due_on(&conn, date)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::subscriptions::models::Period;
    use crate::shared::database::initialize_database;
    use tempfile::TempDir;

    fn draft(name: &str, period: Period) -> NewSubscription {
        NewSubscription {
            name: name.to_string(),
            amount: 1990.0,
            period,
            next_payment: NaiveDate::from_ymd_opt(2027, 1, 15).unwrap(),
        }
    }

    #[test]
    fn test_insert_then_list_round_trip() {
        let store = SqliteSubscriptionStore::in_memory().unwrap();

        let inserted = store.insert(7, &draft("Яндекс Плюс", Period::Yearly)).unwrap();
        let listed = store.list(7).unwrap();

        assert_eq!(listed, vec![inserted.clone()]);
        assert_eq!(listed[0].name, "Яндекс Плюс");
        assert_eq!(listed[0].amount, 1990.0);
        assert_eq!(listed[0].period, Period::Yearly);
        assert_eq!(
            listed[0].next_payment,
            NaiveDate::from_ymd_opt(2027, 1, 15).unwrap()
        );
    }

    #[test]
    fn test_delete_by_foreign_owner_is_rejected() {
        let store = SqliteSubscriptionStore::in_memory().unwrap();
        let inserted = store.insert(7, &draft("Netflix", Period::Monthly)).unwrap();

        let result = store.delete_by_id(inserted.id, 8);
        assert!(matches!(result, Err(AppError::NotFoundOrForbidden(_))));
        assert_eq!(store.list(7).unwrap().len(), 1);
    }

    #[test]
    fn test_data_survives_reopen() {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("subscriptions.db");

        {
            let conn = initialize_database(&db_path).unwrap();
            let store = SqliteSubscriptionStore::new(Arc::new(Mutex::new(conn)));
            store.insert(1, &draft("Netflix", Period::Monthly)).unwrap();
        }

        let conn = initialize_database(&db_path).unwrap();
        let store = SqliteSubscriptionStore::new(Arc::new(Mutex::new(conn)));
        assert_eq!(store.list(1).unwrap().len(), 1);
        assert!(store.distinct_owners().unwrap().contains(&1));
    }
}
