use crate::shared::errors::{AppError, AppResult};
use chrono::{Datelike, NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

/// 支払いリマインダーを送る時刻（毎日）
pub const REMINDER_HOUR: u32 = 10;
/// 月次レポートを送る日
pub const REPORT_DAY: u32 = 1;
/// 月次レポートを送る時刻
pub const REPORT_HOUR: u32 = 9;

/// スケジューラーが実行するジョブ
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScheduledJob {
    /// 毎日10:00、翌日が支払日のサブスクリプションを通知
    PaymentReminders,
    /// 毎月1日9:00、月次レポートを送信
    MonthlyReports,
}

impl ScheduledJob {
    pub const ALL: [ScheduledJob; 2] = [ScheduledJob::PaymentReminders, ScheduledJob::MonthlyReports];

    pub fn as_str(&self) -> &'static str {
        match self {
            ScheduledJob::PaymentReminders => "payment_reminders",
            ScheduledJob::MonthlyReports => "monthly_reports",
        }
    }

    /// 現在時刻がちょうど発火する分かどうか
    pub fn is_trigger_minute(&self, now: NaiveDateTime) -> bool {
        match self {
            ScheduledJob::PaymentReminders => now.hour() == REMINDER_HOUR && now.minute() == 0,
            ScheduledJob::MonthlyReports => {
                now.day() == REPORT_DAY && now.hour() == REPORT_HOUR && now.minute() == 0
            }
        }
    }

    /// 現在時刻が属する期間の発火時刻
    ///
    /// リマインダーは当日、レポートは当月1日が期間になる。
    pub fn window_start(&self, now: NaiveDateTime) -> NaiveDateTime {
        match self {
            ScheduledJob::PaymentReminders => now.date().and_time(trigger_time(REMINDER_HOUR)),
            ScheduledJob::MonthlyReports => {
                let first = NaiveDate::from_ymd_opt(now.year(), now.month(), REPORT_DAY)
                    .unwrap_or_else(|| now.date());
                first.and_time(trigger_time(REPORT_HOUR))
            }
        }
    }

    /// 期間を識別するキー
    pub fn window_key(&self, now: NaiveDateTime) -> String {
        match self {
            ScheduledJob::PaymentReminders => now.format("%Y-%m-%d").to_string(),
            ScheduledJob::MonthlyReports => now.format("%Y-%m").to_string(),
        }
    }
}

fn trigger_time(hour: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(hour, 0, 0).unwrap_or(NaiveTime::MIN)
}

/// ジョブを発火させるかどうかの判定方式
pub trait TriggerPolicy: Send + Sync {
    /// このティックでジョブを実行すべきか
    fn should_fire(&self, job: ScheduledJob, now: NaiveDateTime) -> AppResult<bool>;

    /// ジョブの実行完了を記録する
    fn mark_fired(&self, job: ScheduledJob, now: NaiveDateTime) -> AppResult<()>;
}

/// 発火する分に一致したときだけ実行する方式
///
/// その分にプロセスが動いていなければ実行されない。
/// 同じ分に複数回ティックしても実行は1回だけ。
#[derive(Debug, Default)]
pub struct MinuteMatchPolicy {
    last_fired: Mutex<HashMap<ScheduledJob, (NaiveDate, u32, u32)>>,
}

impl MinuteMatchPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    fn minute_key(now: NaiveDateTime) -> (NaiveDate, u32, u32) {
        (now.date(), now.hour(), now.minute())
    }

    fn last_fired(&self) -> MutexGuard<'_, HashMap<ScheduledJob, (NaiveDate, u32, u32)>> {
        self.last_fired
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl TriggerPolicy for MinuteMatchPolicy {
    fn should_fire(&self, job: ScheduledJob, now: NaiveDateTime) -> AppResult<bool> {
        if !job.is_trigger_minute(now) {
            return Ok(false);
        }
        let already_fired = self.last_fired().get(&job) == Some(&Self::minute_key(now));
        Ok(!already_fired)
    }

    fn mark_fired(&self, job: ScheduledJob, now: NaiveDateTime) -> AppResult<()> {
        self.last_fired().insert(job, Self::minute_key(now));
        Ok(())
    }
}

/// 実行済みの期間をデータベースに記録する方式
///
/// 発火時刻を過ぎていて、その期間の記録がまだ無ければ実行する。
/// 再起動しても同じ期間に重複して実行されず、停止中に過ぎた発火時刻は同じ期間内であれば取り戻す。
#[derive(Clone)]
pub struct PersistedWindowPolicy {
    conn: Arc<Mutex<Connection>>,
}

impl PersistedWindowPolicy {
    /// # 引数
    /// * `conn` - scheduler_marksテーブル作成済みのデータベース接続
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn lock(&self) -> AppResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| AppError::Database(format!("データベースロックエラー: {e}")))
    }
}

impl TriggerPolicy for PersistedWindowPolicy {
    fn should_fire(&self, job: ScheduledJob, now: NaiveDateTime) -> AppResult<bool> {
        if now < job.window_start(now) {
            return Ok(false);
        }

        let conn = self.lock()?;
        let marked = conn
            .query_row(
                "SELECT 1 FROM scheduler_marks WHERE job = ?1 AND window_key = ?2",
                params![job.as_str(), job.window_key(now)],
                |_| Ok(()),
            )
            .optional()?;

        Ok(marked.is_none())
    }

    fn mark_fired(&self, job: ScheduledJob, now: NaiveDateTime) -> AppResult<()> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT OR IGNORE INTO scheduler_marks (job, window_key, fired_at) VALUES (?1, ?2, ?3)",
            params![
                job.as_str(),
                job.window_key(now),
                now.format("%Y-%m-%dT%H:%M:%S").to_string()
            ],
        )?;

        log::debug!(
            "ジョブの実行を記録しました: job={}, window={}",
            job.as_str(),
            job.window_key(now)
        );
        Ok(())
    }
}
