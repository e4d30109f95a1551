/// 通知スケジューラーモジュール
///
/// - 毎日10:00の支払いリマインダー
/// - 毎月1日9:00の月次レポート
/// - 発火判定方式（分一致・期間記録）の切り替え
pub mod policy;
pub mod scheduler;

pub use policy::{MinuteMatchPolicy, PersistedWindowPolicy, ScheduledJob, TriggerPolicy};
pub use scheduler::{NotificationScheduler, PassOutcome, TickSummary};
