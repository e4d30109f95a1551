/// サブスクリプション機能モジュール
///
/// このモジュールは、サブスクリプション管理に関連する機能を提供します：
/// - サブスクリプションの作成、一覧取得、削除
/// - 支払日による検索と所有ユーザーの列挙
/// - 月額・年額の換算
pub mod cost;
pub mod models;
pub mod repository;
pub mod store;

// 公開インターフェース
pub use cost::{monthly_cost, total_monthly, yearly_projection};
pub use models::{NewSubscription, OwnerId, Period, Subscription};
pub use store::{SqliteSubscriptionStore, SubscriptionStore};
