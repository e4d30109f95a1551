use super::policy::{ScheduledJob, TriggerPolicy};
use crate::features::bot::messenger::{Messenger, OutgoingMessage};
use crate::features::reports::{format_payment_reminder, generate_report};
use crate::features::subscriptions::SubscriptionStore;
use crate::shared::clock::Clock;
use crate::shared::errors::AppResult;
use chrono::{Duration as ChronoDuration, NaiveDate, NaiveDateTime};
use log::{debug, error, info, warn};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

/// 1回のパスの送信結果
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PassOutcome {
    pub sent: usize,
    pub failed: usize,
}

/// 1ティック分の実行結果
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickSummary {
    /// 実行されたジョブとその結果
    pub completed: Vec<(ScheduledJob, PassOutcome)>,
    /// 途中で中断されたジョブ
    pub aborted: Vec<ScheduledJob>,
}

/// 支払いリマインダーと月次レポートを送信するスケジューラー
pub struct NotificationScheduler {
    store: Arc<dyn SubscriptionStore>,
    messenger: Arc<dyn Messenger>,
    clock: Arc<dyn Clock>,
    policy: Arc<dyn TriggerPolicy>,
    interval: Duration,
}

impl NotificationScheduler {
    /// # 引数
    /// * `interval` - ティックの間隔
    pub fn new(
        store: Arc<dyn SubscriptionStore>,
        messenger: Arc<dyn Messenger>,
        clock: Arc<dyn Clock>,
        policy: Arc<dyn TriggerPolicy>,
        interval: Duration,
    ) -> Self {
        Self {
            store,
            messenger,
            clock,
            policy,
            interval,
        }
    }

    /// キャンセルされるまでティックを繰り返す
    ///
    /// ティックの途中ではキャンセルせず、次の待機に入るところで停止する。
    pub async fn run(&self, cancel: CancellationToken) {
        info!("通知スケジューラーを開始します: interval={:?}", self.interval);

        let mut interval_timer = tokio::time::interval(self.interval);
        interval_timer.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = interval_timer.tick() => {}
            }
            self.tick(self.clock.now()).await;
        }

        info!("通知スケジューラーを停止しました");
    }

    /// 指定時刻で1回分の判定と送信を行う
    pub async fn tick(&self, now: NaiveDateTime) -> TickSummary {
        let mut summary = TickSummary::default();

        for job in ScheduledJob::ALL {
            match self.policy.should_fire(job, now) {
                Ok(true) => {}
                Ok(false) => continue,
                Err(e) => {
                    error!("ジョブの発火判定に失敗しました: job={}, error={e}", job.as_str());
                    continue;
                }
            }

            let result = match job {
                ScheduledJob::PaymentReminders => self.send_payment_reminders(now.date()).await,
                ScheduledJob::MonthlyReports => self.send_monthly_reports(now.date()).await,
            };

            match result {
                Ok(outcome) => {
                    info!(
                        "ジョブを実行しました: job={}, sent={}, failed={}",
                        job.as_str(),
                        outcome.sent,
                        outcome.failed
                    );
                    if let Err(e) = self.policy.mark_fired(job, now) {
                        error!("ジョブの実行記録に失敗しました: job={}, error={e}", job.as_str());
                    }
                    summary.completed.push((job, outcome));
                }
                Err(e) => {
                    // 記録しないので、期間記録方式なら次のティックで再試行される
                    error!("ジョブを中断しました: job={}, error={e}", job.as_str());
                    summary.aborted.push(job);
                }
            }
        }

        summary
    }

    /// 翌日が支払日のサブスクリプションごとにリマインダーを送る
    async fn send_payment_reminders(&self, today: NaiveDate) -> AppResult<PassOutcome> {
        let tomorrow = today + ChronoDuration::days(1);
        let due = self.store.due_on(tomorrow)?;
        debug!("リマインダー対象: date={tomorrow}, count={}", due.len());

        let mut outcome = PassOutcome::default();
        for subscription in &due {
            let message = OutgoingMessage::text(format_payment_reminder(subscription));
            match self.messenger.send(subscription.owner_id, message).await {
                Ok(()) => outcome.sent += 1,
                Err(e) => {
                    error!(
                        "リマインダーの送信に失敗しました: owner_id={}, subscription_id={}, error={e}",
                        subscription.owner_id, subscription.id
                    );
                    outcome.failed += 1;
                }
            }
        }

        Ok(outcome)
    }

    /// サブスクリプションを持つユーザーごとに月次レポートを送る
    async fn send_monthly_reports(&self, today: NaiveDate) -> AppResult<PassOutcome> {
        let owners = self.store.distinct_owners()?;
        debug!("月次レポート対象: owners={}", owners.len());

        let mut outcome = PassOutcome::default();
        for owner_id in owners {
            let subscriptions = match self.store.list(owner_id) {
                Ok(subscriptions) => subscriptions,
                Err(e) => {
                    warn!("サブスクリプションの取得に失敗しました: owner_id={owner_id}, error={e}");
                    outcome.failed += 1;
                    continue;
                }
            };
            if subscriptions.is_empty() {
                continue;
            }

            let report = generate_report(&subscriptions, today);
            match self
                .messenger
                .send(owner_id, OutgoingMessage::text(report))
                .await
            {
                Ok(()) => outcome.sent += 1,
                Err(e) => {
                    error!("月次レポートの送信に失敗しました: owner_id={owner_id}, error={e}");
                    outcome.failed += 1;
                }
            }
        }

        Ok(outcome)
    }
}
