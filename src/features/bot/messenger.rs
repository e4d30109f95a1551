use crate::features::subscriptions::OwnerId;
use crate::shared::errors::AppResult;
use async_trait::async_trait;
use std::path::PathBuf;

/// インラインボタン1つ分
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InlineOption {
    /// ボタンに表示するラベル
    pub label: String,
    /// 押されたときに返ってくるデータ
    pub data: String,
}

/// メッセージに付けるキーボード
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Markup {
    #[default]
    None,
    /// 1回だけ表示する返信キーボード（1行1ボタン）
    ReplyKeyboard(Vec<String>),
    /// 表示中の返信キーボードを消す
    RemoveKeyboard,
    /// メッセージに付くインラインボタン（1行1ボタン）
    InlineOptions(Vec<InlineOption>),
}

/// 送信するメッセージ
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutgoingMessage {
    Text {
        text: String,
        markup: Markup,
    },
    Document {
        path: PathBuf,
        file_name: String,
        caption: String,
    },
}

impl OutgoingMessage {
    /// キーボードなしのテキストメッセージ
    pub fn text<S: Into<String>>(text: S) -> Self {
        OutgoingMessage::Text {
            text: text.into(),
            markup: Markup::None,
        }
    }

    /// キーボード付きのテキストメッセージ
    pub fn with_markup<S: Into<String>>(text: S, markup: Markup) -> Self {
        OutgoingMessage::Text {
            text: text.into(),
            markup,
        }
    }
}

/// メッセンジャーから届いたイベント
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundEvent {
    /// テキストメッセージ
    Message {
        owner_id: OwnerId,
        first_name: Option<String>,
        text: String,
    },
    /// インラインボタンの押下
    Callback {
        owner_id: OwnerId,
        callback_id: String,
        message_id: Option<i64>,
        data: String,
    },
}

impl InboundEvent {
    /// イベントを送ったユーザー
    pub fn owner_id(&self) -> OwnerId {
        match self {
            InboundEvent::Message { owner_id, .. } | InboundEvent::Callback { owner_id, .. } => {
                *owner_id
            }
        }
    }
}

/// チャットへの送信を抽象化するトレイト
///
/// ユーザーIDをそのままチャットIDとして扱う。
#[async_trait]
pub trait Messenger: Send + Sync {
    /// メッセージを送信する
    async fn send(&self, owner_id: OwnerId, message: OutgoingMessage) -> AppResult<()>;

    /// インラインボタンの押下に応答する
    ///
    /// # 引数
    /// * `callback_id` - 押下イベントのID
    /// * `text` - 通知として表示するテキスト
    /// * `show_alert` - trueの場合はダイアログとして表示する
    async fn answer_callback(
        &self,
        callback_id: &str,
        text: Option<&str>,
        show_alert: bool,
    ) -> AppResult<()>;

    /// 送信済みメッセージの本文を書き換える
    async fn edit_text(&self, owner_id: OwnerId, message_id: i64, text: &str) -> AppResult<()>;
}
