/// レポート・集計テキストとCSVエクスポート
pub mod export;
pub mod generator;

pub use export::{export_csv, render_csv, ExportFile, CSV_HEADER};
pub use generator::{
    format_amount, format_created, format_date, format_delete_option, format_payment_reminder,
    format_subscription_list, format_totals, generate_report, welcome_text,
};
