use crate::features::subscriptions::{
    monthly_cost, total_monthly, yearly_projection, Subscription,
};
use chrono::{Datelike, NaiveDate};

/// 金額を表示用に整形する（整数ならそのまま、端数があれば小数2桁）
pub fn format_amount(amount: f64) -> String {
    if amount.fract() == 0.0 {
        format!("{amount:.0}")
    } else {
        format!("{amount:.2}")
    }
}

/// 日付を表示用（DD.MM.YYYY）に整形する
pub fn format_date(date: NaiveDate) -> String {
    date.format("%d.%m.%Y").to_string()
}

/// 月次レポートを生成する
///
/// 明細には次回支払日が今月のものだけを載せるが、合計は渡された全件の月額を足し合わせる。
/// そのため明細と合計は一致しないことがある。
///
/// # 引数
/// * `subscriptions` - ユーザーのサブスクリプション
/// * `today` - 「今月」を決める日付
pub fn generate_report(subscriptions: &[Subscription], today: NaiveDate) -> String {
    let mut report = String::from("📊 Отчет за текущий месяц:\n\n");

    for sub in subscriptions {
        let in_current_month = sub.next_payment.year() == today.year()
            && sub.next_payment.month() == today.month();
        if in_current_month {
            let cost = monthly_cost(sub.amount, sub.period);
            report.push_str(&format!("• {}: {cost:.2} ₽/мес\n", sub.name));
        }
    }

    report.push_str(&format!(
        "\n💳 Итого в месяц: {:.2} ₽",
        total_monthly(subscriptions)
    ));
    report
}

/// サブスクリプション一覧のテキスト
pub fn format_subscription_list(subscriptions: &[Subscription]) -> String {
    let mut response = String::from("📋 Твои подписки:\n\n");

    for sub in subscriptions {
        response.push_str(&format!(
            "• {}: {} ₽/{}\n  След. платеж: {}\n\n",
            sub.name,
            format_amount(sub.amount),
            sub.period.short_label(),
            format_date(sub.next_payment)
        ));
    }

    response.trim_end().to_string()
}

/// 月額・年額合計のテキスト
pub fn format_totals(subscriptions: &[Subscription]) -> String {
    let monthly = total_monthly(subscriptions);
    format!(
        "💳 Общая сумма всех подписок:\n• В месяц: {monthly:.2} ₽\n• В год: {:.2} ₽",
        yearly_projection(monthly)
    )
}

/// 支払い前日のリマインダーテキスト
pub fn format_payment_reminder(subscription: &Subscription) -> String {
    format!(
        "🔔 Напоминание о платеже!\n\nЗавтра ({}) будет списано:\n• {}: {} ₽",
        format_date(subscription.next_payment),
        subscription.name,
        format_amount(subscription.amount)
    )
}

/// 追加完了時の確認テキスト
pub fn format_created(subscription: &Subscription) -> String {
    format!(
        "✅ Подписка {} успешно добавлена!\nСледующий платеж: {}",
        subscription.name,
        format_date(subscription.next_payment)
    )
}

/// 削除ボタンのラベル
pub fn format_delete_option(subscription: &Subscription) -> String {
    format!("{} - {}₽", subscription.name, format_amount(subscription.amount))
}

/// /start の案内文
pub fn welcome_text(first_name: Option<&str>) -> String {
    let greeting = match first_name {
        Some(name) if !name.trim().is_empty() => format!("👋 Привет, {name}!"),
        _ => "👋 Привет!".to_string(),
    };

    format!(
        "{greeting}\n\
         Я помогу отслеживать твои подписки (Netflix, Spotify и др.)\n\n\
         ✨ Возможности:\n\
         - Добавлять и удалять подписки\n\
         - Напоминать о предстоящих платежах\n\
         - Показывать общие расходы\n\
         - Формировать месячные отчеты\n\
         - Экспортировать данные в CSV\n\n\
         Используй команды:\n\
         /add - добавить подписку\n\
         /cancel - отменить добавление\n\
         /delete - удалить подписку\n\
         /list - мои подписки\n\
         /total - общая сумма\n\
         /report - отчет за месяц\n\
         /export - экспорт данных"
    )
}
