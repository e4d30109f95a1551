use super::state::ConversationState;
use crate::features::subscriptions::{NewSubscription, Period};
use crate::shared::errors::{AppError, AppResult};
use chrono::NaiveDate;

/// 月額を選ぶボタンのラベル
pub const MONTHLY_LABEL: &str = "Ежемесячно";
/// 年額を選ぶボタンのラベル
pub const YEARLY_LABEL: &str = "Ежегодно";

const ASK_NAME: &str = "Введи название подписки (например, Netflix):";
const ASK_AMOUNT: &str = "Введи стоимость подписки (например, 599):";
const ASK_PERIOD: &str = "Выбери период оплаты:";
const ASK_DATE: &str =
    "Введи дату следующего платежа в формате ГГГГ-ММ-ДД\n(например, 2023-12-01):";

const INVALID_NAME: &str = "Название не может быть пустым. Введи название подписки:";
const INVALID_AMOUNT: &str = "Пожалуйста, введи корректную сумму (число больше 0):";
const INVALID_PERIOD: &str = "Пожалуйста, выбери вариант из клавиатуры:";
const INVALID_DATE_FORMAT: &str = "Неверный формат даты! Используй формат ГГГГ-ММ-ДД:";
const DATE_IN_PAST: &str = "Дата не может быть в прошлом! Введи корректную дату:";

/// 1回の入力を処理した結果
#[derive(Debug, Clone, PartialEq)]
pub enum Step {
    /// 次の状態へ進む
    Continue(ConversationState),
    /// すべての値が揃った
    Complete(NewSubscription),
}

/// 追加コマンドで始まる最初の状態
pub fn start() -> ConversationState {
    ConversationState::AwaitingName
}

/// 状態に入ったときに送る案内文
pub fn prompt(state: &ConversationState) -> &'static str {
    match state {
        ConversationState::AwaitingName => ASK_NAME,
        ConversationState::AwaitingAmount { .. } => ASK_AMOUNT,
        ConversationState::AwaitingPeriod { .. } => ASK_PERIOD,
        ConversationState::AwaitingDate { .. } => ASK_DATE,
    }
}

/// 支払いサイクル選択で提示する2つの選択肢
pub fn period_options() -> [&'static str; 2] {
    [MONTHLY_LABEL, YEARLY_LABEL]
}

/// 現在の状態に入力を1つ適用する
///
/// # 引数
/// * `state` - 現在の状態
/// * `input` - ユーザーの入力テキスト
/// * `today` - 過去日付判定に使う今日の日付
///
/// # 戻り値
/// 次の状態または確定したサブスクリプション。
/// 入力が不正な場合は再入力を促すメッセージを持つバリデーションエラー（状態は変わらない）
pub fn advance(state: &ConversationState, input: &str, today: NaiveDate) -> AppResult<Step> {
    match state {
        ConversationState::AwaitingName => accept_name(input),
        ConversationState::AwaitingAmount { name } => accept_amount(name, input),
        ConversationState::AwaitingPeriod { name, amount } => accept_period(name, *amount, input),
        ConversationState::AwaitingDate {
            name,
            amount,
            period,
        } => accept_date(name, *amount, *period, input, today),
    }
}

fn accept_name(input: &str) -> AppResult<Step> {
    if input.trim().is_empty() {
        return Err(AppError::validation(INVALID_NAME));
    }

    Ok(Step::Continue(ConversationState::AwaitingAmount {
        name: input.to_string(),
    }))
}

fn accept_amount(name: &str, input: &str) -> AppResult<Step> {
    let amount = parse_amount(input)?;

    Ok(Step::Continue(ConversationState::AwaitingPeriod {
        name: name.to_string(),
        amount,
    }))
}

fn accept_period(name: &str, amount: f64, input: &str) -> AppResult<Step> {
    let period = parse_period(input)?;

    Ok(Step::Continue(ConversationState::AwaitingDate {
        name: name.to_string(),
        amount,
        period,
    }))
}

fn accept_date(
    name: &str,
    amount: f64,
    period: Period,
    input: &str,
    today: NaiveDate,
) -> AppResult<Step> {
    let next_payment = NaiveDate::parse_from_str(input.trim(), "%Y-%m-%d")
        .map_err(|_| AppError::validation(INVALID_DATE_FORMAT))?;

    if next_payment < today {
        return Err(AppError::validation(DATE_IN_PAST));
    }

    Ok(Step::Complete(NewSubscription {
        name: name.to_string(),
        amount,
        period,
        next_payment,
    }))
}

/// 金額を解析する（小数点にカンマも使える）
pub fn parse_amount(input: &str) -> AppResult<f64> {
    let normalized = input.trim().replace(',', ".");
    let amount: f64 = normalized
        .parse()
        .map_err(|_| AppError::validation(INVALID_AMOUNT))?;

    if !amount.is_finite() || amount <= 0.0 {
        return Err(AppError::validation(INVALID_AMOUNT));
    }

    Ok(amount)
}

/// ボタンのラベルを支払いサイクルに変換する（大文字小文字は区別しない）
pub fn parse_period(input: &str) -> AppResult<Period> {
    let normalized = input.trim().to_lowercase();

    if normalized == MONTHLY_LABEL.to_lowercase() {
        Ok(Period::Monthly)
    } else if normalized == YEARLY_LABEL.to_lowercase() {
        Ok(Period::Yearly)
    } else {
        Err(AppError::validation(INVALID_PERIOD))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, 18).unwrap()
    }

    fn continue_state(step: Step) -> ConversationState {
        match step {
            Step::Continue(state) => state,
            Step::Complete(sub) => panic!("unexpected completion: {sub:?}"),
        }
    }

    fn awaiting_date() -> ConversationState {
        ConversationState::AwaitingDate {
            name: "Netflix".to_string(),
            amount: 599.0,
            period: Period::Monthly,
        }
    }

    #[test]
    fn test_full_flow_completes() {
        let mut state = start();
        state = continue_state(advance(&state, "Netflix", today()).unwrap());
        state = continue_state(advance(&state, "599", today()).unwrap());
        state = continue_state(advance(&state, "Ежемесячно", today()).unwrap());

        let step = advance(&state, "2026-11-01", today()).unwrap();
        assert_eq!(
            step,
            Step::Complete(NewSubscription {
                name: "Netflix".to_string(),
                amount: 599.0,
                period: Period::Monthly,
                next_payment: NaiveDate::from_ymd_opt(2026, 11, 1).unwrap(),
            })
        );
    }

    #[test]
    fn test_name_is_kept_verbatim() {
        let state = continue_state(advance(&start(), "Яндекс Плюс", today()).unwrap());
        assert_eq!(
            state,
            ConversationState::AwaitingAmount {
                name: "Яндекс Плюс".to_string()
            }
        );
    }

    #[test]
    fn test_blank_name_is_rejected() {
        let result = advance(&start(), "   ", today());
        assert!(matches!(result, Err(AppError::Validation(msg)) if msg == INVALID_NAME));
    }

    #[test]
    fn test_amount_accepts_comma_separator() {
        assert_eq!(parse_amount("199,99").unwrap(), 199.99);
        assert_eq!(parse_amount(" 599 ").unwrap(), 599.0);
    }

    #[test]
    fn test_amount_rejects_invalid_input() {
        for input in ["-5", "abc", "0", "", "inf", "NaN"] {
            let state = ConversationState::AwaitingAmount {
                name: "Netflix".to_string(),
            };
            let result = advance(&state, input, today());
            assert!(
                matches!(result, Err(AppError::Validation(ref msg)) if msg == INVALID_AMOUNT),
                "input {input:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_period_is_case_insensitive() {
        assert_eq!(parse_period("ежегодно").unwrap(), Period::Yearly);
        assert_eq!(parse_period("ЕЖЕМЕСЯЧНО").unwrap(), Period::Monthly);
        assert!(parse_period("weekly").is_err());
    }

    #[test]
    fn test_period_step_keeps_draft() {
        let state = ConversationState::AwaitingPeriod {
            name: "Spotify".to_string(),
            amount: 169.0,
        };
        let next = continue_state(advance(&state, "Ежегодно", today()).unwrap());
        assert_eq!(
            next,
            ConversationState::AwaitingDate {
                name: "Spotify".to_string(),
                amount: 169.0,
                period: Period::Yearly,
            }
        );
    }

    #[test]
    fn test_date_validation() {
        let state = awaiting_date();

        let bad_format = advance(&state, "01.11.2026", today());
        assert!(matches!(bad_format, Err(AppError::Validation(msg)) if msg == INVALID_DATE_FORMAT));

        let impossible = advance(&state, "2026-02-30", today());
        assert!(matches!(impossible, Err(AppError::Validation(msg)) if msg == INVALID_DATE_FORMAT));

        let past = advance(&state, "2026-10-17", today());
        assert!(matches!(past, Err(AppError::Validation(msg)) if msg == DATE_IN_PAST));
    }

    #[test]
    fn test_today_is_accepted() {
        let step = advance(&awaiting_date(), "2026-10-18", today()).unwrap();
        assert!(matches!(step, Step::Complete(sub) if sub.next_payment == today()));
    }

    #[test]
    fn test_prompts_and_options() {
        assert_eq!(prompt(&start()), ASK_NAME);
        assert_eq!(prompt(&awaiting_date()), ASK_DATE);
        assert_eq!(period_options(), ["Ежемесячно", "Ежегодно"]);
    }
}
