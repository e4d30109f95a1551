/// チャットボット機能モジュール
///
/// - コマンドの解析と各処理への振り分け
/// - 送信先を抽象化したMessengerトレイト
/// - Telegram Bot API アダプター
pub mod commands;
pub mod handlers;
pub mod messenger;
pub mod telegram;

pub use commands::Command;
pub use handlers::BotHandler;
pub use messenger::{InboundEvent, InlineOption, Markup, Messenger, OutgoingMessage};
pub use telegram::{run_polling, TelegramClient};
