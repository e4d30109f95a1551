use chrono::{Local, NaiveDate, NaiveDateTime, Utc};
use chrono_tz::Tz;
use std::sync::Mutex;

/// 現在時刻の取得元
///
/// スケジューラーと会話処理はこのトレイト経由でのみ時刻を参照する。
pub trait Clock: Send + Sync {
    /// 壁時計としての現在時刻（タイムゾーン適用済み）
    fn now(&self) -> NaiveDateTime;

    /// 今日の日付
    fn today(&self) -> NaiveDate {
        self.now().date()
    }
}

/// システム時刻を返す時計
#[derive(Debug, Clone, Default)]
pub struct SystemClock {
    timezone: Option<Tz>,
}

impl SystemClock {
    /// # 引数
    /// * `timezone` - 使用するタイムゾーン（Noneの場合はシステムのローカル時刻）
    pub fn new(timezone: Option<Tz>) -> Self {
        Self { timezone }
    }
}

impl Clock for SystemClock {
    fn now(&self) -> NaiveDateTime {
        match self.timezone {
            Some(tz) => Utc::now().with_timezone(&tz).naive_local(),
            None => Local::now().naive_local(),
        }
    }
}

/// 任意の時刻に固定できる時計
#[derive(Debug)]
pub struct FixedClock {
    now: Mutex<NaiveDateTime>,
}

impl FixedClock {
    pub fn new(now: NaiveDateTime) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    /// 時刻を差し替える
    pub fn set(&self, now: NaiveDateTime) {
        if let Ok(mut guard) = self.now.lock() {
            *guard = now;
        }
    }
}

impl Clock for FixedClock {
    fn now(&self) -> NaiveDateTime {
        match self.now.lock() {
            Ok(guard) => *guard,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_clock() {
        let start = NaiveDate::from_ymd_opt(2026, 10, 18)
            .unwrap()
            .and_hms_opt(10, 0, 0)
            .unwrap();
        let clock = FixedClock::new(start);
        assert_eq!(clock.now(), start);
        assert_eq!(clock.today(), start.date());

        let later = start + chrono::Duration::days(1);
        clock.set(later);
        assert_eq!(clock.today(), later.date());
    }

    #[test]
    fn test_system_clock_with_timezone() {
        // UTCと東京の差は常に9時間
        let utc = SystemClock::new(Some(chrono_tz::UTC)).now();
        let tokyo = SystemClock::new(Some(chrono_tz::Asia::Tokyo)).now();
        let diff = (tokyo - utc).num_minutes();
        assert!((539..=541).contains(&diff));
    }
}
