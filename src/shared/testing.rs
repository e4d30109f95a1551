//! テスト用のダブル

use crate::features::bot::messenger::{Messenger, OutgoingMessage};
use crate::features::subscriptions::{NewSubscription, OwnerId, Subscription, SubscriptionStore};
use crate::shared::errors::{AppError, AppResult};
use async_trait::async_trait;
use chrono::NaiveDate;
use std::collections::{BTreeSet, HashSet};
use std::sync::Mutex;

/// コールバック応答の記録
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnsweredCallback {
    pub callback_id: String,
    pub text: Option<String>,
    pub show_alert: bool,
}

/// 送信内容を記録するだけのメッセンジャー
#[derive(Default)]
pub struct RecordingMessenger {
    sent: Mutex<Vec<(OwnerId, OutgoingMessage)>>,
    answered: Mutex<Vec<AnsweredCallback>>,
    edited: Mutex<Vec<(OwnerId, i64, String)>>,
    failing_owners: Mutex<HashSet<OwnerId>>,
}

impl RecordingMessenger {
    pub fn new() -> Self {
        Self::default()
    }

    /// 指定ユーザーへの送信を失敗させる
    pub fn fail_for(&self, owner_id: OwnerId) {
        self.failing_owners.lock().unwrap().insert(owner_id);
    }

    pub fn sent(&self) -> Vec<(OwnerId, OutgoingMessage)> {
        self.sent.lock().unwrap().clone()
    }

    pub fn sent_to(&self, owner_id: OwnerId) -> Vec<OutgoingMessage> {
        self.sent()
            .into_iter()
            .filter(|(owner, _)| *owner == owner_id)
            .map(|(_, message)| message)
            .collect()
    }

    /// 指定ユーザーに送ったテキストの一覧
    pub fn texts_to(&self, owner_id: OwnerId) -> Vec<String> {
        self.sent_to(owner_id)
            .into_iter()
            .filter_map(|message| match message {
                OutgoingMessage::Text { text, .. } => Some(text),
                OutgoingMessage::Document { .. } => None,
            })
            .collect()
    }

    pub fn last_text_to(&self, owner_id: OwnerId) -> Option<String> {
        self.texts_to(owner_id).pop()
    }

    pub fn answered(&self) -> Vec<AnsweredCallback> {
        self.answered.lock().unwrap().clone()
    }

    pub fn edited(&self) -> Vec<(OwnerId, i64, String)> {
        self.edited.lock().unwrap().clone()
    }
}

#[async_trait]
impl Messenger for RecordingMessenger {
    async fn send(&self, owner_id: OwnerId, message: OutgoingMessage) -> AppResult<()> {
        if self.failing_owners.lock().unwrap().contains(&owner_id) {
            return Err(AppError::external_service(
                "test".to_string(),
                format!("chat {owner_id} is unreachable"),
            ));
        }
        self.sent.lock().unwrap().push((owner_id, message));
        Ok(())
    }

    async fn answer_callback(
        &self,
        callback_id: &str,
        text: Option<&str>,
        show_alert: bool,
    ) -> AppResult<()> {
        self.answered.lock().unwrap().push(AnsweredCallback {
            callback_id: callback_id.to_string(),
            text: text.map(str::to_string),
            show_alert,
        });
        Ok(())
    }

    async fn edit_text(&self, owner_id: OwnerId, message_id: i64, text: &str) -> AppResult<()> {
        self.edited
            .lock()
            .unwrap()
            .push((owner_id, message_id, text.to_string()));
        Ok(())
    }
}

/// すべての操作が永続化エラーになるストア
pub struct FailingStore;

impl FailingStore {
    fn error() -> AppError {
        AppError::Database("disk I/O error".to_string())
    }
}

impl SubscriptionStore for FailingStore {
    fn list(&self, _owner_id: OwnerId) -> AppResult<Vec<Subscription>> {
        Err(Self::error())
    }

    fn insert(&self, _owner_id: OwnerId, _draft: &NewSubscription) -> AppResult<Subscription> {
        Err(Self::error())
    }

    fn delete_by_id(&self, _id: i64, _owner_id: OwnerId) -> AppResult<Subscription> {
        Err(Self::error())
    }

    fn distinct_owners(&self) -> AppResult<BTreeSet<OwnerId>> {
        Err(Self::error())
    }

    fn due_on(&self, _date: NaiveDate) -> AppResult<Vec<Subscription>> {
        Err(Self::error())
    }
}
