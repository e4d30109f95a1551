/// サブスクリプション追加会話モジュール
///
/// - 状態と入力から次の状態を決める純粋な遷移関数
/// - ユーザーごとのセッションストア（排他制御と有効期限）
pub mod machine;
pub mod sessions;
pub mod state;

pub use machine::{advance, period_options, prompt, start, Step, MONTHLY_LABEL, YEARLY_LABEL};
pub use sessions::{OwnerSession, SessionStore};
pub use state::ConversationState;
