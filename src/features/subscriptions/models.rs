use crate::shared::errors::{AppError, AppResult};
use chrono::NaiveDate;
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// メッセンジャーが付与するユーザー識別子
pub type OwnerId = i64;

/// 支払いサイクル
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Period {
    Monthly,
    Yearly,
}

impl Period {
    /// 保存・エクスポート用のタグ文字列
    pub fn as_str(&self) -> &'static str {
        match self {
            Period::Monthly => "monthly",
            Period::Yearly => "yearly",
        }
    }

    /// 一覧表示用の短い単位（"₽/мес" など）
    pub fn short_label(&self) -> &'static str {
        match self {
            Period::Monthly => "мес",
            Period::Yearly => "год",
        }
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Period {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "monthly" => Ok(Period::Monthly),
            "yearly" => Ok(Period::Yearly),
            other => Err(AppError::validation(format!("未知の支払いサイクルです: {other}"))),
        }
    }
}

impl ToSql for Period {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for Period {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        let text = value.as_str()?;
        text.parse()
            .map_err(|e: AppError| FromSqlError::Other(Box::new(e)))
    }
}

/// サブスクリプションデータモデル
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Subscription {
    pub id: i64,
    pub owner_id: OwnerId,
    pub name: String,            // 空でないサービス名
    pub amount: f64,             // 正の数値
    pub period: Period,          // 支払いサイクル
    pub next_payment: NaiveDate, // 次回支払日
    pub created_at: String,      // RFC3339形式
}

/// 会話の完了時に作成される新規サブスクリプション
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct NewSubscription {
    pub name: String,
    pub amount: f64,
    pub period: Period,
    pub next_payment: NaiveDate,
}

impl NewSubscription {
    /// 保存前の不変条件チェック
    ///
    /// # 戻り値
    /// 名前が空でなく金額が正の有限値であればOk(())
    pub fn validate(&self) -> AppResult<()> {
        if self.name.trim().is_empty() {
            return Err(AppError::validation("Название не может быть пустым"));
        }

        if !self.amount.is_finite() || self.amount <= 0.0 {
            return Err(AppError::validation(
                "Сумма должна быть числом больше 0",
            ));
        }

        Ok(())
    }
}
