use super::commands::Command;
use super::messenger::{InboundEvent, InlineOption, Markup, Messenger, OutgoingMessage};
use crate::features::conversation::{
    advance, period_options, prompt, start, ConversationState, OwnerSession, SessionStore, Step,
};
use crate::features::reports::{
    export_csv, format_created, format_delete_option, format_subscription_list, format_totals,
    generate_report, welcome_text,
};
use crate::features::subscriptions::{OwnerId, Subscription, SubscriptionStore};
use crate::shared::clock::Clock;
use crate::shared::errors::{handle_error, AppError, AppResult};
use futures::future::join_all;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

const NO_SUBSCRIPTIONS: &str = "У тебя пока нет активных подписок";
const NO_SUBSCRIPTIONS_TO_DELETE: &str = "У тебя пока нет активных подписок для удаления";
const CHOOSE_TO_DELETE: &str = "Выбери подписку для удаления:";
const EXPORT_CAPTION: &str = "Твои подписки в формате CSV";
const ADD_CANCELLED: &str = "Добавление отменено";
const NOTHING_TO_CANCEL: &str = "Нечего отменять";

/// 削除ボタンのコールバックデータの接頭辞
pub const DELETE_CALLBACK_PREFIX: &str = "delete_";

/// 受信イベントをコマンド処理または会話に振り分けるハンドラー
pub struct BotHandler {
    store: Arc<dyn SubscriptionStore>,
    sessions: Arc<SessionStore>,
    messenger: Arc<dyn Messenger>,
    clock: Arc<dyn Clock>,
    export_dir: PathBuf,
}

impl BotHandler {
    pub fn new(
        store: Arc<dyn SubscriptionStore>,
        sessions: Arc<SessionStore>,
        messenger: Arc<dyn Messenger>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            sessions,
            messenger,
            clock,
            export_dir: std::env::temp_dir(),
        }
    }

    /// CSVの書き出し先を変更する
    pub fn with_export_dir(mut self, dir: PathBuf) -> Self {
        self.export_dir = dir;
        self
    }

    pub fn sessions(&self) -> &Arc<SessionStore> {
        &self.sessions
    }

    /// 期限切れの会話セッションを整理する
    pub fn purge_expired_sessions(&self) -> usize {
        self.sessions.purge_expired(self.clock.now())
    }

    /// 受信したイベントをまとめて処理する
    ///
    /// ユーザーごとに受信順で処理し、異なるユーザーは並行して処理する。
    pub async fn handle_batch(&self, events: Vec<InboundEvent>) {
        let mut by_owner: BTreeMap<OwnerId, Vec<InboundEvent>> = BTreeMap::new();
        for event in events {
            by_owner.entry(event.owner_id()).or_default().push(event);
        }

        let tasks = by_owner.into_values().map(|events| async move {
            for event in events {
                self.handle(event).await;
            }
        });
        join_all(tasks).await;
    }

    /// イベントを1件処理する
    ///
    /// 処理中は同じユーザーのセッションをロックする。
    /// エラーはログに記録してユーザーに通知し、呼び出し元には返さない。
    pub async fn handle(&self, event: InboundEvent) {
        let owner_id = event.owner_id();
        let mut session = self.sessions.lock(owner_id).await;

        let result = match event {
            InboundEvent::Message {
                first_name, text, ..
            } => {
                self.handle_message(&mut session, owner_id, first_name.as_deref(), &text)
                    .await
            }
            InboundEvent::Callback {
                callback_id,
                message_id,
                data,
                ..
            } => {
                self.handle_callback(owner_id, &callback_id, message_id, &data)
                    .await
            }
        };

        if let Err(e) = result {
            let message = handle_error(&e, &format!("owner_id={owner_id}"));
            // 送信自体の失敗はもう一度送っても届かない
            if !matches!(e, AppError::ExternalService(_)) {
                if let Err(send_error) = self
                    .messenger
                    .send(owner_id, OutgoingMessage::text(message))
                    .await
                {
                    log::warn!("エラー通知の送信に失敗しました: owner_id={owner_id}, error={send_error}");
                }
            }
        }
    }

    async fn handle_message(
        &self,
        session: &mut OwnerSession,
        owner_id: OwnerId,
        first_name: Option<&str>,
        text: &str,
    ) -> AppResult<()> {
        if let Some(command) = Command::parse(text) {
            log::debug!("コマンドを受信しました: owner_id={owner_id}, command={}", command.as_str());
            return self
                .handle_command(session, owner_id, first_name, command)
                .await;
        }

        let now = self.clock.now();
        match session.current(now).cloned() {
            Some(state) => self.handle_conversation(session, owner_id, &state, text).await,
            None => {
                log::debug!("会話外のテキストを無視しました: owner_id={owner_id}");
                Ok(())
            }
        }
    }

    async fn handle_command(
        &self,
        session: &mut OwnerSession,
        owner_id: OwnerId,
        first_name: Option<&str>,
        command: Command,
    ) -> AppResult<()> {
        match command {
            Command::Start => self.send_text(owner_id, welcome_text(first_name)).await,
            Command::Add => self.start_add(session, owner_id).await,
            Command::Cancel => self.cancel_add(session, owner_id).await,
            Command::List => {
                let subscriptions = self.store.list(owner_id)?;
                if subscriptions.is_empty() {
                    return self.send_text(owner_id, NO_SUBSCRIPTIONS).await;
                }
                self.send_text(owner_id, format_subscription_list(&subscriptions))
                    .await
            }
            Command::Total => {
                let subscriptions = self.store.list(owner_id)?;
                if subscriptions.is_empty() {
                    return self.send_text(owner_id, format!("{NO_SUBSCRIPTIONS}.")).await;
                }
                self.send_text(owner_id, format_totals(&subscriptions)).await
            }
            Command::Report => {
                let subscriptions = self.store.list(owner_id)?;
                if subscriptions.is_empty() {
                    return self.send_text(owner_id, NO_SUBSCRIPTIONS).await;
                }
                let report = generate_report(&subscriptions, self.clock.today());
                self.send_text(owner_id, report).await
            }
            Command::Delete => self.offer_delete(owner_id).await,
            Command::Export => self.export(owner_id).await,
        }
    }

    async fn start_add(&self, session: &mut OwnerSession, owner_id: OwnerId) -> AppResult<()> {
        let now = self.clock.now();
        let restarted = session.current(now).is_some();
        if restarted {
            log::info!("追加フローをやり直します: owner_id={owner_id}");
        }

        let state = start();
        let markup = if restarted {
            Markup::RemoveKeyboard
        } else {
            Markup::None
        };
        self.messenger
            .send(owner_id, OutgoingMessage::with_markup(prompt(&state), markup))
            .await?;
        session.set(state, now);
        Ok(())
    }

    async fn cancel_add(&self, session: &mut OwnerSession, owner_id: OwnerId) -> AppResult<()> {
        let active = session.current(self.clock.now()).is_some();
        if !active {
            return self.send_text(owner_id, NOTHING_TO_CANCEL).await;
        }

        session.clear();
        log::info!("追加フローを取り消しました: owner_id={owner_id}");
        self.messenger
            .send(
                owner_id,
                OutgoingMessage::with_markup(ADD_CANCELLED, Markup::RemoveKeyboard),
            )
            .await
    }

    /// 会話中の入力を1件処理する
    async fn handle_conversation(
        &self,
        session: &mut OwnerSession,
        owner_id: OwnerId,
        state: &ConversationState,
        text: &str,
    ) -> AppResult<()> {
        let now = self.clock.now();

        match advance(state, text, now.date()) {
            Ok(Step::Continue(next)) => {
                log::debug!(
                    "会話を進めました: owner_id={owner_id}, {} -> {}",
                    state.label(),
                    next.label()
                );
                let markup = markup_for(&next);
                session.set(next.clone(), now);
                self.messenger
                    .send(owner_id, OutgoingMessage::with_markup(prompt(&next), markup))
                    .await
            }
            Ok(Step::Complete(draft)) => {
                // 保存に失敗した場合は日付入力待ちのまま再入力できるようにする
                let created = self.store.insert(owner_id, &draft)?;
                session.clear();
                self.send_text(owner_id, format_created(&created)).await
            }
            Err(AppError::Validation(message)) => {
                log::debug!(
                    "入力が不正です: owner_id={owner_id}, state={}",
                    state.label()
                );
                let markup = match state {
                    ConversationState::AwaitingPeriod { .. } => period_keyboard(),
                    _ => Markup::None,
                };
                self.messenger
                    .send(owner_id, OutgoingMessage::with_markup(message, markup))
                    .await
            }
            Err(e) => Err(e),
        }
    }

    async fn offer_delete(&self, owner_id: OwnerId) -> AppResult<()> {
        let subscriptions = self.store.list(owner_id)?;
        if subscriptions.is_empty() {
            return self.send_text(owner_id, NO_SUBSCRIPTIONS_TO_DELETE).await;
        }

        let options = subscriptions.iter().map(delete_option).collect();
        self.messenger
            .send(
                owner_id,
                OutgoingMessage::with_markup(CHOOSE_TO_DELETE, Markup::InlineOptions(options)),
            )
            .await
    }

    async fn export(&self, owner_id: OwnerId) -> AppResult<()> {
        let file = self
            .store
            .list(owner_id)
            .and_then(|subscriptions| export_csv(&subscriptions, owner_id, &self.export_dir))
            .map_err(|e| match e {
                AppError::Export(_) => e,
                other => AppError::export(other.details()),
            })?;

        let message = OutgoingMessage::Document {
            path: file.path().to_path_buf(),
            file_name: file.file_name().to_string(),
            caption: EXPORT_CAPTION.to_string(),
        };
        let sent = self.messenger.send(owner_id, message).await;
        drop(file);

        sent.map_err(|e| AppError::export(e.details()))?;
        log::info!("CSVを送信しました: owner_id={owner_id}");
        Ok(())
    }

    async fn handle_callback(
        &self,
        owner_id: OwnerId,
        callback_id: &str,
        message_id: Option<i64>,
        data: &str,
    ) -> AppResult<()> {
        let Some(id) = parse_delete_callback(data) else {
            log::debug!("未知のコールバックを無視しました: owner_id={owner_id}, data={data}");
            return self.messenger.answer_callback(callback_id, None, false).await;
        };

        match self.store.delete_by_id(id, owner_id) {
            Ok(deleted) => {
                let text = format!("❌ Подписка {} успешно удалена!", deleted.name);
                match message_id {
                    Some(message_id) => {
                        self.messenger
                            .edit_text(owner_id, message_id, &text)
                            .await?
                    }
                    None => self.send_text(owner_id, text).await?,
                }
                self.messenger.answer_callback(callback_id, None, false).await
            }
            Err(e) => {
                let message = handle_error(&e, &format!("delete id={id}, owner_id={owner_id}"));
                self.messenger
                    .answer_callback(callback_id, Some(&message), true)
                    .await
            }
        }
    }

    async fn send_text(&self, owner_id: OwnerId, text: impl Into<String>) -> AppResult<()> {
        self.messenger
            .send(owner_id, OutgoingMessage::text(text))
            .await
    }
}

fn period_keyboard() -> Markup {
    Markup::ReplyKeyboard(period_options().iter().map(|s| s.to_string()).collect())
}

/// 遷移先の状態に合わせたキーボード
fn markup_for(next: &ConversationState) -> Markup {
    match next {
        ConversationState::AwaitingPeriod { .. } => period_keyboard(),
        ConversationState::AwaitingDate { .. } => Markup::RemoveKeyboard,
        _ => Markup::None,
    }
}

fn delete_option(subscription: &Subscription) -> InlineOption {
    InlineOption {
        label: format_delete_option(subscription),
        data: format!("{DELETE_CALLBACK_PREFIX}{}", subscription.id),
    }
}

fn parse_delete_callback(data: &str) -> Option<i64> {
    data.strip_prefix(DELETE_CALLBACK_PREFIX)?.parse().ok()
}
