use super::state::ConversationState;
use crate::features::subscriptions::OwnerId;
use chrono::{Duration, NaiveDateTime};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// 1ユーザー分の会話セッション
#[derive(Debug)]
pub struct OwnerSession {
    state: Option<ConversationState>,
    touched_at: Option<NaiveDateTime>,
    ttl: Option<Duration>,
}

impl OwnerSession {
    fn new(ttl: Option<Duration>) -> Self {
        Self {
            state: None,
            touched_at: None,
            ttl,
        }
    }

    fn is_expired(&self, now: NaiveDateTime) -> bool {
        match (self.ttl, self.touched_at) {
            (Some(ttl), Some(touched_at)) => now - touched_at > ttl,
            _ => false,
        }
    }

    /// 現在の状態（期限切れの場合は破棄してNone）
    pub fn current(&mut self, now: NaiveDateTime) -> Option<&ConversationState> {
        if self.state.is_some() && self.is_expired(now) {
            log::info!(
                "期限切れの会話セッションを破棄しました: state={}",
                self.state.as_ref().map(|s| s.label()).unwrap_or_default()
            );
            self.clear();
        }
        self.state.as_ref()
    }

    /// 状態を更新し、最終操作時刻を記録する
    pub fn set(&mut self, state: ConversationState, now: NaiveDateTime) {
        self.state = Some(state);
        self.touched_at = Some(now);
    }

    /// セッションを破棄する
    ///
    /// # 戻り値
    /// 破棄前にセッションが存在した場合はtrue
    pub fn clear(&mut self) -> bool {
        self.touched_at = None;
        self.state.take().is_some()
    }

    fn is_idle_at(&self, now: NaiveDateTime) -> bool {
        self.state.is_none() || self.is_expired(now)
    }
}

/// ユーザーごとの会話セッションを保持するストア
///
/// `lock` で得たガードを保持している間、同じユーザーの他のイベントは待たされる。
pub struct SessionStore {
    slots: Mutex<HashMap<OwnerId, Arc<AsyncMutex<OwnerSession>>>>,
    ttl: Option<Duration>,
}

impl SessionStore {
    /// # 引数
    /// * `ttl` - 放置されたセッションの有効期限（Noneの場合は無期限）
    pub fn new(ttl: Option<Duration>) -> Self {
        Self {
            slots: Mutex::new(HashMap::new()),
            ttl,
        }
    }

    fn slots(&self) -> MutexGuard<'_, HashMap<OwnerId, Arc<AsyncMutex<OwnerSession>>>> {
        self.slots
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// ユーザーのセッションを排他的に取得する
    pub async fn lock(&self, owner_id: OwnerId) -> OwnedMutexGuard<OwnerSession> {
        let slot = {
            let mut slots = self.slots();
            Arc::clone(
                slots
                    .entry(owner_id)
                    .or_insert_with(|| Arc::new(AsyncMutex::new(OwnerSession::new(self.ttl)))),
            )
        };
        slot.lock_owned().await
    }

    /// 使われていない・期限切れのセッションを削除する
    ///
    /// 処理中（ロック中・ロック待ち）のユーザーは対象外。
    ///
    /// # 戻り値
    /// 削除したユーザー数
    pub fn purge_expired(&self, now: NaiveDateTime) -> usize {
        let mut slots = self.slots();
        let before = slots.len();

        slots.retain(|_, slot| {
            if Arc::strong_count(slot) > 1 {
                return true;
            }
            match slot.try_lock() {
                Ok(session) => !session.is_idle_at(now),
                Err(_) => true,
            }
        });

        let removed = before - slots.len();
        if removed > 0 {
            log::debug!("会話セッションを{removed}件整理しました");
        }
        removed
    }

    /// 保持しているユーザー数
    pub fn len(&self) -> usize {
        self.slots().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
