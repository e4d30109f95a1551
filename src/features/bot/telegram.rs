//! Telegram Bot API クライアント
//!
//! ロングポーリングで更新を受信し、Messengerトレイトの送信操作を実装する。
use super::handlers::BotHandler;
use super::messenger::{InboundEvent, Markup, Messenger, OutgoingMessage};
use crate::features::subscriptions::OwnerId;
use crate::shared::config::TelegramConfig;
use crate::shared::errors::{AppError, AppResult};
use async_trait::async_trait;
use log::{debug, info, warn};
use reqwest::multipart::{Form, Part};
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// 取得失敗後に再度ポーリングするまでの待ち時間
const POLL_ERROR_DELAY: Duration = Duration::from_secs(5);

/// Bot APIの共通レスポンス
#[derive(Debug, Deserialize)]
pub struct TelegramResponse<T> {
    pub ok: bool,
    pub result: Option<T>,
    pub description: Option<String>,
    pub error_code: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TelegramUser {
    pub id: i64,
    pub first_name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TelegramChat {
    pub id: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TelegramMessage {
    pub message_id: i64,
    pub from: Option<TelegramUser>,
    pub chat: TelegramChat,
    pub text: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CallbackQuery {
    pub id: String,
    pub from: TelegramUser,
    pub message: Option<TelegramMessage>,
    pub data: Option<String>,
}

/// getUpdatesで受け取る更新1件
#[derive(Debug, Clone, Deserialize)]
pub struct Update {
    pub update_id: i64,
    pub message: Option<TelegramMessage>,
    pub callback_query: Option<CallbackQuery>,
}

impl Update {
    /// 扱う種類の更新であれば受信イベントに変換する
    pub fn into_event(self) -> Option<InboundEvent> {
        if let Some(message) = self.message {
            let from = message.from?;
            let text = message.text?;
            return Some(InboundEvent::Message {
                owner_id: from.id,
                first_name: from.first_name,
                text,
            });
        }

        let query = self.callback_query?;
        Some(InboundEvent::Callback {
            owner_id: query.from.id,
            callback_id: query.id,
            message_id: query.message.map(|m| m.message_id),
            data: query.data.unwrap_or_default(),
        })
    }
}

/// キーボード指定をreply_markupのJSONに変換する
pub fn markup_json(markup: &Markup) -> Option<Value> {
    match markup {
        Markup::None => None,
        Markup::ReplyKeyboard(labels) => {
            let rows: Vec<Value> = labels.iter().map(|label| json!([{ "text": label }])).collect();
            Some(json!({
                "keyboard": rows,
                "resize_keyboard": true,
                "one_time_keyboard": true,
            }))
        }
        Markup::RemoveKeyboard => Some(json!({ "remove_keyboard": true })),
        Markup::InlineOptions(options) => {
            let rows: Vec<Value> = options
                .iter()
                .map(|option| json!([{ "text": option.label, "callback_data": option.data }]))
                .collect();
            Some(json!({ "inline_keyboard": rows }))
        }
    }
}

/// 応答が届かなかったときに同じリクエストを再送してよいメソッドか
///
/// sendMessage/sendDocumentはサーバーに届いている可能性があり、再送すると二重送信になる。
fn is_idempotent(method: &str) -> bool {
    !matches!(method, "sendMessage" | "sendDocument")
}

/// 通信エラー後にリトライするかどうか
fn should_retry(method: &str, connect_failed: bool, attempts: u32, max_retries: u32) -> bool {
    attempts < max_retries && (connect_failed || is_idempotent(method))
}

/// Telegram Bot API クライアント
pub struct TelegramClient {
    client: Client,
    config: TelegramConfig,
}

impl TelegramClient {
    /// 設定を指定してクライアントを作成
    pub fn new(config: TelegramConfig) -> AppResult<Self> {
        // ロングポーリングの待ち時間より長くする
        let timeout = Duration::from_secs(config.poll_timeout_seconds + 10);
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::configuration(format!("HTTPクライアント初期化失敗: {e}")))?;

        info!(
            "Telegramクライアントを初期化しました: api_url={}, token={}",
            config.api_url,
            config.masked_token()
        );
        Ok(Self { client, config })
    }

    fn method_url(&self, method: &str) -> String {
        format!(
            "{}/bot{}/{method}",
            self.config.api_url.trim_end_matches('/'),
            self.config.bot_token
        )
    }

    /// JSONボディでAPIメソッドを呼び出す
    async fn call<T>(&self, method: &str, body: &Value) -> AppResult<T>
    where
        T: DeserializeOwned,
    {
        let url = self.method_url(method);
        self.send_with_retry(method, || self.client.post(&url).json(body))
            .await
    }

    /// リトライ機能付きでリクエストを送信
    ///
    /// 通信エラーのみ2^n秒の間隔でリトライする。APIが`ok: false`を返した場合はリトライしない。
    /// メッセージ送信系のメソッドは接続自体に失敗したときだけリトライする。
    async fn send_with_retry<T, F>(&self, method: &str, build: F) -> AppResult<T>
    where
        T: DeserializeOwned,
        F: Fn() -> RequestBuilder,
    {
        let mut attempts = 0;
        loop {
            match build().send().await {
                Ok(response) => {
                    let status = response.status();
                    let body: TelegramResponse<T> = response.json().await.map_err(|e| {
                        AppError::external_service(
                            "telegram".to_string(),
                            format!(
                                "レスポンス解析エラー: method={method}, status={status}, error={}",
                                e.without_url()
                            ),
                        )
                    })?;

                    return match (body.ok, body.result) {
                        (true, Some(result)) => {
                            debug!("{method}リクエスト成功");
                            Ok(result)
                        }
                        (true, None) => Err(AppError::external_service(
                            "telegram".to_string(),
                            format!("{method}: resultがありません"),
                        )),
                        (false, _) => Err(AppError::external_service(
                            "telegram".to_string(),
                            format!(
                                "{method}: code={} description={}",
                                body.error_code.unwrap_or_else(|| i64::from(status.as_u16())),
                                body.description.unwrap_or_default()
                            ),
                        )),
                    };
                }
                Err(e) => {
                    if should_retry(method, e.is_connect(), attempts, self.config.max_retries) {
                        attempts += 1;
                        let delay = Duration::from_secs(2_u64.pow(attempts));
                        warn!(
                            "{method}リクエスト失敗、リトライします: attempt={attempts}/{}, delay={delay:?}",
                            self.config.max_retries
                        );
                        tokio::time::sleep(delay).await;
                        continue;
                    }
                    // URLにトークンが含まれるため取り除いてから記録する
                    return Err(AppError::external_service(
                        "telegram".to_string(),
                        format!("{method}: 接続に失敗しました: {}", e.without_url()),
                    ));
                }
            }
        }
    }

    /// 新しい更新をロングポーリングで取得する
    ///
    /// # 引数
    /// * `offset` - 次に受け取る更新ID（前回の最大update_id + 1）
    pub async fn get_updates(&self, offset: Option<i64>) -> AppResult<Vec<Update>> {
        let mut body = json!({
            "timeout": self.config.poll_timeout_seconds,
            "allowed_updates": ["message", "callback_query"],
        });
        if let Some(offset) = offset {
            body["offset"] = json!(offset);
        }

        self.call("getUpdates", &body).await
    }

    async fn send_document(
        &self,
        owner_id: OwnerId,
        path: &std::path::Path,
        file_name: &str,
        caption: &str,
    ) -> AppResult<()> {
        let bytes = tokio::fs::read(path).await?;
        let url = self.method_url("sendDocument");

        let _: Value = self
            .send_with_retry("sendDocument", || {
                let part = Part::bytes(bytes.clone()).file_name(file_name.to_string());
                let form = Form::new()
                    .text("chat_id", owner_id.to_string())
                    .text("caption", caption.to_string())
                    .part("document", part);
                self.client.post(&url).multipart(form)
            })
            .await?;
        Ok(())
    }
}

#[async_trait]
impl Messenger for TelegramClient {
    async fn send(&self, owner_id: OwnerId, message: OutgoingMessage) -> AppResult<()> {
        match message {
            OutgoingMessage::Text { text, markup } => {
                let mut body = json!({ "chat_id": owner_id, "text": text });
                if let Some(reply_markup) = markup_json(&markup) {
                    body["reply_markup"] = reply_markup;
                }
                let _: Value = self.call("sendMessage", &body).await?;
                Ok(())
            }
            OutgoingMessage::Document {
                path,
                file_name,
                caption,
            } => {
                self.send_document(owner_id, &path, &file_name, &caption)
                    .await
            }
        }
    }

    async fn answer_callback(
        &self,
        callback_id: &str,
        text: Option<&str>,
        show_alert: bool,
    ) -> AppResult<()> {
        let mut body = json!({ "callback_query_id": callback_id, "show_alert": show_alert });
        if let Some(text) = text {
            body["text"] = json!(text);
        }
        let _: bool = self.call("answerCallbackQuery", &body).await?;
        Ok(())
    }

    async fn edit_text(&self, owner_id: OwnerId, message_id: i64, text: &str) -> AppResult<()> {
        let body = json!({ "chat_id": owner_id, "message_id": message_id, "text": text });
        let _: Value = self.call("editMessageText", &body).await?;
        Ok(())
    }
}

/// キャンセルされるまで更新を受信してハンドラーに渡す
pub async fn run_polling(client: &TelegramClient, handler: &BotHandler, cancel: CancellationToken) {
    info!("ロングポーリングを開始します");
    let mut offset: Option<i64> = None;

    loop {
        let result = tokio::select! {
            _ = cancel.cancelled() => break,
            result = client.get_updates(offset) => result,
        };

        match result {
            Ok(updates) => {
                if let Some(last) = updates.last() {
                    offset = Some(last.update_id + 1);
                }
                let events: Vec<InboundEvent> =
                    updates.into_iter().filter_map(Update::into_event).collect();
                if !events.is_empty() {
                    debug!("更新を受信しました: events={}", events.len());
                    handler.handle_batch(events).await;
                }
                handler.purge_expired_sessions();
            }
            Err(e) => {
                warn!("更新の取得に失敗しました: {e}");
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = tokio::time::sleep(POLL_ERROR_DELAY) => {}
                }
            }
        }
    }

    info!("ロングポーリングを停止しました");
}
