use crate::features::subscriptions::Period;
use serde::{Deserialize, Serialize};

/// サブスクリプション追加会話の状態
///
/// 各状態がそれまでに入力された値（ドラフト）を保持するため、
/// 値が欠けたまま次の状態へ進むことはない。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ConversationState {
    /// サービス名の入力待ち
    AwaitingName,
    /// 金額の入力待ち
    AwaitingAmount { name: String },
    /// 支払いサイクルの選択待ち
    AwaitingPeriod { name: String, amount: f64 },
    /// 次回支払日の入力待ち
    AwaitingDate {
        name: String,
        amount: f64,
        period: Period,
    },
}

impl ConversationState {
    /// ログ出力用の状態名
    pub fn label(&self) -> &'static str {
        match self {
            ConversationState::AwaitingName => "AWAITING_NAME",
            ConversationState::AwaitingAmount { .. } => "AWAITING_AMOUNT",
            ConversationState::AwaitingPeriod { .. } => "AWAITING_PERIOD",
            ConversationState::AwaitingDate { .. } => "AWAITING_DATE",
        }
    }
}
