/// 機能横断で使用する共通モジュール
pub mod clock;
pub mod config;
pub mod database;
pub mod errors;

#[cfg(test)]
pub(crate) mod testing;
