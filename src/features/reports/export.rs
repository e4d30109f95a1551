use crate::features::subscriptions::{OwnerId, Subscription};
use crate::shared::errors::{AppError, AppResult};
use std::fs;
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// CSVのヘッダー行
pub const CSV_HEADER: &str = "Name,Amount,Period,NextPaymentDate";

/// 送信用に書き出した一時CSVファイル
///
/// ドロップ時にファイルを削除する。送信に失敗した場合も残らない。
#[derive(Debug)]
pub struct ExportFile {
    path: PathBuf,
    file_name: String,
}

impl ExportFile {
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// 受信者に見せるファイル名
    pub fn file_name(&self) -> &str {
        &self.file_name
    }
}

impl Drop for ExportFile {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.path) {
            if e.kind() != std::io::ErrorKind::NotFound {
                log::warn!(
                    "一時ファイルの削除に失敗しました: path={}, error={e}",
                    self.path.display()
                );
            }
        }
    }
}

/// フィールドをCSV用にエスケープする
///
/// カンマ・ダブルクォート・改行を含む場合のみダブルクォートで囲む。
fn escape_field(field: &str) -> String {
    if field.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

/// サブスクリプションをCSV文字列に変換する
///
/// ヘッダー1行とサブスクリプション1件につき1行。
/// 金額は丸めずに保存値のまま書き出す。
pub fn render_csv(subscriptions: &[Subscription]) -> String {
    let mut csv = String::from(CSV_HEADER);
    csv.push('\n');

    for sub in subscriptions {
        csv.push_str(&format!(
            "{},{},{},{}\n",
            escape_field(&sub.name),
            sub.amount,
            sub.period.as_str(),
            sub.next_payment.format("%Y-%m-%d")
        ));
    }

    csv
}

/// ユーザーのサブスクリプションを一時CSVファイルに書き出す
///
/// # 引数
/// * `subscriptions` - 書き出すサブスクリプション
/// * `owner_id` - ファイル名に使うユーザーID
/// * `dir` - 書き出し先ディレクトリ
///
/// # 戻り値
/// 一時ファイル（ドロップで削除される）
pub fn export_csv(
    subscriptions: &[Subscription],
    owner_id: OwnerId,
    dir: &Path,
) -> AppResult<ExportFile> {
    let file_name = format!("subscriptions_{owner_id}.csv");
    let path = dir.join(format!("subscriptions_{owner_id}_{}.csv", Uuid::new_v4()));

    let file = ExportFile {
        path,
        file_name,
    };

    fs::write(&file.path, render_csv(subscriptions)).map_err(|e| {
        AppError::export(format!(
            "CSVファイルの書き込みに失敗しました: path={}, error={e}",
            file.path.display()
        ))
    })?;

    log::debug!(
        "CSVを書き出しました: owner_id={owner_id}, rows={}",
        subscriptions.len()
    );
    Ok(file)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::subscriptions::Period;
    use chrono::NaiveDate;
    use tempfile::TempDir;

    fn subscription(id: i64, name: &str, amount: f64, period: Period) -> Subscription {
        Subscription {
            id,
            owner_id: 42,
            name: name.to_string(),
            amount,
            period,
            next_payment: NaiveDate::from_ymd_opt(2026, 12, 1).unwrap(),
            created_at: "2026-10-01T00:00:00+03:00".to_string(),
        }
    }

    #[test]
    fn test_render_csv_has_header_and_one_row_per_subscription() {
        let subs = vec![
            subscription(1, "Netflix", 599.0, Period::Monthly),
            subscription(2, "iCloud", 1200.0, Period::Yearly),
            subscription(3, "Spotify", 169.5, Period::Monthly),
        ];

        let csv = render_csv(&subs);
        let lines: Vec<&str> = csv.lines().collect();

        assert_eq!(lines.len(), subs.len() + 1);
        assert_eq!(lines[0], "Name,Amount,Period,NextPaymentDate");
        assert_eq!(lines[1], "Netflix,599,monthly,2026-12-01");
        assert_eq!(lines[2], "iCloud,1200,yearly,2026-12-01");
        assert_eq!(lines[3], "Spotify,169.5,monthly,2026-12-01");
    }

    #[test]
    fn test_render_csv_keeps_exact_amounts() {
        let subs = vec![
            subscription(1, "X", 9.999, Period::Monthly),
            subscription(2, "X", 0.004, Period::Monthly),
        ];

        let csv = render_csv(&subs);
        let lines: Vec<&str> = csv.lines().collect();

        assert_eq!(lines[1], "X,9.999,monthly,2026-12-01");
        assert_eq!(lines[2], "X,0.004,monthly,2026-12-01");
    }

    #[test]
    fn test_render_csv_quotes_special_characters() {
        let subs = vec![subscription(1, "Кино, \"Премиум\"", 299.0, Period::Monthly)];

        let csv = render_csv(&subs);
        assert!(csv.contains("\"Кино, \"\"Премиум\"\"\",299,monthly"));
    }

    #[test]
    fn test_export_file_is_removed_on_drop() {
        let temp_dir = TempDir::new().unwrap();
        let subs = vec![subscription(1, "Netflix", 599.0, Period::Monthly)];

        let file = export_csv(&subs, 42, temp_dir.path()).unwrap();
        let path = file.path().to_path_buf();

        assert!(path.exists());
        assert_eq!(file.file_name(), "subscriptions_42.csv");
        let content = fs::read_to_string(&path).unwrap();
        assert_eq!(content.lines().count(), 2);

        drop(file);
        assert!(!path.exists());
    }

    #[test]
    fn test_export_into_missing_directory_fails() {
        let temp_dir = TempDir::new().unwrap();
        let missing = temp_dir.path().join("missing");

        let result = export_csv(&[], 42, &missing);
        assert!(matches!(result, Err(AppError::Export(_))));
    }
}
