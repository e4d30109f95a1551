use super::models::{Period, Subscription};

/// 1か月あたりの金額に換算する
///
/// # 引数
/// * `amount` - 登録された金額
/// * `period` - 支払いサイクル
///
/// # 戻り値
/// 月額（年額の場合は12で割った値）
pub fn monthly_cost(amount: f64, period: Period) -> f64 {
    match period {
        Period::Monthly => amount,
        Period::Yearly => amount / 12.0,
    }
}

/// サブスクリプション全体の月額合計を計算する
pub fn total_monthly(subscriptions: &[Subscription]) -> f64 {
    subscriptions.iter().fold(0.0, |acc, sub| {
        acc + monthly_cost(sub.amount, sub.period)
    })
}

/// 月額合計から年額を見積もる
///
/// 年額サブスクリプションも登録額ではなく月額換算値の12倍で再計算する。
pub fn yearly_projection(monthly_total: f64) -> f64 {
    monthly_total * 12.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use quickcheck_macros::quickcheck;

    const EPSILON: f64 = 1e-9;

    fn subscription(amount: f64, period: Period) -> Subscription {
        Subscription {
            id: 1,
            owner_id: 1,
            name: "Test".to_string(),
            amount,
            period,
            next_payment: NaiveDate::from_ymd_opt(2026, 11, 1).unwrap(),
            created_at: "2026-10-18T10:00:00+03:00".to_string(),
        }
    }

    fn positive_amount(raw: u32) -> f64 {
        // 0.01 〜 42949672.96 の範囲の正の金額
        (raw as f64 + 1.0) / 100.0
    }

    #[quickcheck]
    fn prop_monthly_amount_is_unchanged(raw: u32) -> bool {
        let amount = positive_amount(raw);
        (monthly_cost(amount, Period::Monthly) - amount).abs() < EPSILON
    }

    #[quickcheck]
    fn prop_yearly_amount_is_divided_by_twelve(raw: u32) -> bool {
        let amount = positive_amount(raw);
        let expected = amount / 12.0;
        (monthly_cost(amount, Period::Yearly) - expected).abs() <= EPSILON * amount.max(1.0)
    }

    #[test]
    fn test_total_monthly_mixes_periods() {
        let subs = vec![
            subscription(599.0, Period::Monthly),
            subscription(1200.0, Period::Yearly),
        ];
        assert!((total_monthly(&subs) - 699.0).abs() < EPSILON);
    }

    #[test]
    fn test_total_monthly_empty() {
        assert_eq!(total_monthly(&[]), 0.0);
    }

    #[test]
    fn test_yearly_projection_reconstructs_from_monthly() {
        // 年額1000は月額83.33...に換算されてから12倍される
        let subs = vec![subscription(1000.0, Period::Yearly)];
        let yearly = yearly_projection(total_monthly(&subs));
        assert!((yearly - 1000.0).abs() < 1e-6);
        assert_eq!(format!("{yearly:.2}"), "1000.00");

        let subs = vec![
            subscription(299.0, Period::Monthly),
            subscription(1990.0, Period::Yearly),
        ];
        let yearly = yearly_projection(total_monthly(&subs));
        assert!((yearly - (299.0 * 12.0 + 1990.0)).abs() < 1e-6);
    }
}
