use crate::shared::errors::{AppError, AppResult};
use chrono_tz::Tz;
use std::path::PathBuf;
use std::time::Duration;

/// アプリケーションの実行環境を表す列挙型
#[derive(Debug, Clone, PartialEq)]
pub enum Environment {
    /// 開発環境
    Development,
    /// プロダクション環境
    Production,
}

/// 環境設定を管理する構造体
#[derive(Debug, Clone)]
pub struct EnvironmentConfig {
    /// 実行環境
    pub environment: String,
    /// デバッグモードの有効/無効
    pub debug_mode: bool,
    /// ログレベル
    pub log_level: String,
}

impl EnvironmentConfig {
    /// 環境変数から設定を読み込む
    pub fn from_env() -> Self {
        let environment = get_environment();
        let debug_mode = environment == Environment::Development;
        let log_level = std::env::var("LOG_LEVEL").unwrap_or_else(|_| {
            if debug_mode {
                "debug".to_string()
            } else {
                "info".to_string()
            }
        });

        Self {
            environment: format!("{environment:?}").to_lowercase(),
            debug_mode,
            log_level,
        }
    }
}

/// 現在の実行環境を判定する
///
/// # 判定ロジック
/// 1. 実行時環境変数 ENVIRONMENT を確認
/// 2. デバッグビルドの場合は Development
/// 3. リリースビルドの場合は Production
pub fn get_environment() -> Environment {
    if let Ok(env_var) = std::env::var("ENVIRONMENT") {
        let env = match env_var.as_str() {
            "production" => Environment::Production,
            _ => Environment::Development,
        };
        log::debug!("環境判定: 実行時環境変数を使用 -> {env_var} -> {env:?}");
        return env;
    }

    let env = if cfg!(debug_assertions) {
        Environment::Development
    } else {
        Environment::Production
    };
    log::debug!(
        "環境判定: ビルド設定を使用 -> debug_assertions={} -> {env:?}",
        cfg!(debug_assertions)
    );
    env
}

/// 環境に応じたデータベースファイル名を取得する
///
/// # ファイル名の規則
/// - 開発環境: "dev_subscriptions.db"
/// - プロダクション環境: "subscriptions.db"
pub fn get_database_filename(env: Environment) -> &'static str {
    match env {
        Environment::Development => "dev_subscriptions.db",
        Environment::Production => "subscriptions.db",
    }
}

/// 環境変数の読み込みを行う
///
/// 開発ビルドの場合のみ.envファイルを読み込む。
/// 本番環境では環境変数は実行時に設定されることを前提とする。
pub fn load_environment_variables() {
    if cfg!(debug_assertions) {
        eprintln!("開発環境: .envファイルを読み込みます");

        match dotenv::dotenv() {
            Ok(path) => {
                eprintln!("環境ファイルを読み込みました: {}", path.display());
            }
            Err(e) => {
                eprintln!("環境ファイルの読み込みに失敗: {e}");
                eprintln!("環境変数が設定されていることを確認してください");
            }
        }
    } else {
        eprintln!("本番環境: 環境変数は実行時に設定されます");
    }
}

/// ログシステムを初期化する
///
/// # 処理内容
/// 1. 環境設定を取得
/// 2. ログレベルを設定
/// 3. env_loggerを初期化
pub fn initialize_logging_system() {
    let env_config = EnvironmentConfig::from_env();

    let log_level = match env_config.log_level.to_lowercase().as_str() {
        "error" => log::LevelFilter::Error,
        "warn" => log::LevelFilter::Warn,
        "info" => log::LevelFilter::Info,
        "debug" => log::LevelFilter::Debug,
        "trace" => log::LevelFilter::Trace,
        _ => log::LevelFilter::Info,
    };

    env_logger::Builder::from_default_env()
        .filter_level(log_level)
        .format_timestamp_secs()
        .format_module_path(false)
        .format_target(false)
        .init();

    log::info!(
        "ログシステムを初期化しました: level={}, environment={}",
        env_config.log_level,
        env_config.environment
    );
}

/// スケジューラーの発火判定方式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerPolicyKind {
    /// 指定の分ちょうどにだけ発火する（既定）
    MinuteMatch,
    /// 発火済みマーカーをDBに記録し、同じ枠内なら取りこぼしを補う
    PersistedWindow,
}

impl SchedulerPolicyKind {
    fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "minute" => Some(Self::MinuteMatch),
            "window" => Some(Self::PersistedWindow),
            _ => None,
        }
    }
}

/// Telegram Bot API の接続設定
#[derive(Clone)]
pub struct TelegramConfig {
    /// ボットトークン（ログには出さない）
    pub bot_token: String,
    /// APIのベースURL
    pub api_url: String,
    /// ロングポーリングのタイムアウト（秒）
    pub poll_timeout_seconds: u64,
    /// 通信失敗時の最大リトライ回数
    pub max_retries: u32,
}

impl TelegramConfig {
    /// ログ出力用にマスクしたトークン
    pub fn masked_token(&self) -> String {
        let chars: Vec<char> = self.bot_token.chars().collect();
        if chars.len() > 8 {
            let head: String = chars[..4].iter().collect();
            let tail: String = chars[chars.len() - 4..].iter().collect();
            format!("{head}****{tail}")
        } else {
            "****".to_string()
        }
    }
}

impl std::fmt::Debug for TelegramConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelegramConfig")
            .field("bot_token", &self.masked_token())
            .field("api_url", &self.api_url)
            .field("poll_timeout_seconds", &self.poll_timeout_seconds)
            .field("max_retries", &self.max_retries)
            .finish()
    }
}

/// ボット全体の設定
#[derive(Debug, Clone)]
pub struct BotConfig {
    /// メッセンジャー接続設定
    pub telegram: TelegramConfig,
    /// データベースファイルのパス
    pub database_path: PathBuf,
    /// スケジューラーのポーリング間隔
    pub scheduler_interval: Duration,
    /// スケジューラーの発火判定方式
    pub scheduler_policy: SchedulerPolicyKind,
    /// 時刻判定に使うタイムゾーン（Noneの場合はシステムのローカル時刻）
    pub timezone: Option<Tz>,
    /// 会話セッションの有効期限（Noneの場合は期限なし）
    pub session_ttl: Option<chrono::Duration>,
}

impl BotConfig {
    /// 環境変数からボット設定を読み込む
    ///
    /// # 戻り値
    /// ボット設定、またはBOT_TOKENが無いなどの場合は設定エラー
    ///
    /// トークンは起動時の環境変数からのみ読み込む（バイナリには埋め込まない）
    pub fn from_env() -> AppResult<Self> {
        let bot_token = std::env::var("BOT_TOKEN")
            .map_err(|_| AppError::configuration("BOT_TOKENが設定されていません"))?;

        Self::from_lookup(bot_token, |name| std::env::var(name).ok())
    }

    /// トークンと任意の値取得関数から設定を組み立てる
    ///
    /// # 引数
    /// * `bot_token` - メッセンジャーのシークレットトークン
    /// * `lookup` - 変数名から値を返す関数
    pub fn from_lookup<F>(bot_token: String, lookup: F) -> AppResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        if bot_token.trim().is_empty() {
            return Err(AppError::configuration("BOT_TOKENが空です"));
        }
        if !bot_token.chars().all(|c| c.is_ascii_graphic()) {
            return Err(AppError::configuration(
                "BOT_TOKENに使用できない文字が含まれています",
            ));
        }

        let database_path = match lookup("DATABASE_PATH").filter(|p| !p.trim().is_empty()) {
            Some(path) => PathBuf::from(path),
            None => default_database_path(),
        };

        let scheduler_interval_seconds =
            parse_or_default(&lookup, "SCHEDULER_INTERVAL_SECONDS", 60u64).max(1);

        let scheduler_policy = match lookup("SCHEDULER_POLICY") {
            Some(value) => SchedulerPolicyKind::parse(&value).unwrap_or_else(|| {
                log::warn!("SCHEDULER_POLICYの値が不正です: {value}。minuteを使用します");
                SchedulerPolicyKind::MinuteMatch
            }),
            None => SchedulerPolicyKind::MinuteMatch,
        };

        let timezone = match lookup("BOT_TIMEZONE").filter(|v| !v.trim().is_empty()) {
            Some(name) => Some(name.trim().parse::<Tz>().map_err(|e| {
                AppError::configuration(format!("BOT_TIMEZONEが不正です: {name} ({e})"))
            })?),
            None => None,
        };

        let ttl_minutes = parse_or_default(&lookup, "SESSION_TTL_MINUTES", 30i64);
        let session_ttl = (ttl_minutes > 0).then(|| chrono::Duration::minutes(ttl_minutes));

        let telegram = TelegramConfig {
            bot_token,
            api_url: lookup("TELEGRAM_API_URL")
                .filter(|v| !v.trim().is_empty())
                .unwrap_or_else(|| "https://api.telegram.org".to_string()),
            poll_timeout_seconds: parse_or_default(&lookup, "TELEGRAM_POLL_TIMEOUT_SECONDS", 30u64),
            max_retries: parse_or_default(&lookup, "TELEGRAM_MAX_RETRIES", 3u32),
        };

        let config = Self {
            telegram,
            database_path,
            scheduler_interval: Duration::from_secs(scheduler_interval_seconds),
            scheduler_policy,
            timezone,
            session_ttl,
        };

        log::info!(
            "ボット設定を読み込みました: database={}, interval={}s, policy={:?}, timezone={:?}, session_ttl={:?}",
            config.database_path.display(),
            scheduler_interval_seconds,
            config.scheduler_policy,
            config.timezone,
            config.session_ttl,
        );

        Ok(config)
    }
}

/// 数値の環境変数を読み込む（不正な値はデフォルト値）
fn parse_or_default<F, T>(lookup: &F, name: &str, default: T) -> T
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr + std::fmt::Display + Copy,
{
    match lookup(name) {
        Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
            log::warn!("{name}のパースに失敗しました。デフォルト値{default}を使用します");
            default
        }),
        None => default,
    }
}

/// アプリデータディレクトリ内の既定のデータベースパス
fn default_database_path() -> PathBuf {
    let base_dir = dirs::data_dir().unwrap_or_else(|| PathBuf::from("."));
    base_dir
        .join("subscription-memo")
        .join(get_database_filename(get_environment()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_get_database_filename() {
        assert_eq!(
            get_database_filename(Environment::Development),
            "dev_subscriptions.db"
        );
        assert_eq!(
            get_database_filename(Environment::Production),
            "subscriptions.db"
        );
    }

    #[test]
    fn test_bot_config_defaults() {
        let config = BotConfig::from_lookup("123456:ABCDEFGH".to_string(), lookup_from(&[]))
            .unwrap();

        assert_eq!(config.scheduler_interval, Duration::from_secs(60));
        assert_eq!(config.scheduler_policy, SchedulerPolicyKind::MinuteMatch);
        assert_eq!(config.session_ttl, Some(chrono::Duration::minutes(30)));
        assert!(config.timezone.is_none());
        assert_eq!(config.telegram.api_url, "https://api.telegram.org");
        assert_eq!(config.telegram.poll_timeout_seconds, 30);
        assert_eq!(config.telegram.max_retries, 3);
    }

    #[test]
    fn test_bot_config_overrides() {
        let config = BotConfig::from_lookup(
            "123456:ABCDEFGH".to_string(),
            lookup_from(&[
                ("DATABASE_PATH", "/tmp/bot.db"),
                ("SCHEDULER_INTERVAL_SECONDS", "15"),
                ("SCHEDULER_POLICY", "window"),
                ("BOT_TIMEZONE", "Europe/Moscow"),
                ("SESSION_TTL_MINUTES", "0"),
            ]),
        )
        .unwrap();

        assert_eq!(config.database_path, PathBuf::from("/tmp/bot.db"));
        assert_eq!(config.scheduler_interval, Duration::from_secs(15));
        assert_eq!(config.scheduler_policy, SchedulerPolicyKind::PersistedWindow);
        assert_eq!(config.timezone, Some(chrono_tz::Europe::Moscow));
        assert!(config.session_ttl.is_none());
    }

    #[test]
    fn test_bot_config_invalid_numbers_fall_back() {
        let config = BotConfig::from_lookup(
            "123456:ABCDEFGH".to_string(),
            lookup_from(&[("SCHEDULER_INTERVAL_SECONDS", "soon"), ("SCHEDULER_POLICY", "cron")]),
        )
        .unwrap();

        assert_eq!(config.scheduler_interval, Duration::from_secs(60));
        assert_eq!(config.scheduler_policy, SchedulerPolicyKind::MinuteMatch);
    }

    #[test]
    fn test_bot_config_rejects_bad_values() {
        let empty_token = BotConfig::from_lookup("  ".to_string(), lookup_from(&[]));
        assert!(matches!(empty_token, Err(AppError::Configuration(_))));

        let bad_timezone = BotConfig::from_lookup(
            "123456:ABCDEFGH".to_string(),
            lookup_from(&[("BOT_TIMEZONE", "Mars/Olympus")]),
        );
        assert!(matches!(bad_timezone, Err(AppError::Configuration(_))));
    }

    #[test]
    fn test_token_is_masked_in_debug_output() {
        let config = BotConfig::from_lookup(
            "123456789:SECRETSECRETSECRET".to_string(),
            lookup_from(&[]),
        )
        .unwrap();

        let debug = format!("{config:?}");
        assert!(!debug.contains("SECRETSECRETSECRET"));
        assert!(debug.contains("1234****CRET"));
    }

    #[test]
    fn test_bot_config_rejects_non_ascii_token() {
        let result = BotConfig::from_lookup("aéééééééé".to_string(), lookup_from(&[]));
        assert!(matches!(result, Err(AppError::Configuration(_))));

        let with_space = BotConfig::from_lookup("123456:ABC DEFGH".to_string(), lookup_from(&[]));
        assert!(matches!(with_space, Err(AppError::Configuration(_))));
    }

    #[test]
    fn test_masked_token_counts_characters() {
        let config = TelegramConfig {
            bot_token: "aéééééééé".to_string(),
            api_url: "https://api.telegram.org".to_string(),
            poll_timeout_seconds: 30,
            max_retries: 3,
        };

        assert_eq!(config.masked_token(), "aééé****éééé");
        assert!(format!("{config:?}").contains("aééé****éééé"));

        let short = TelegramConfig {
            bot_token: "ééé".to_string(),
            ..config
        };
        assert_eq!(short.masked_token(), "****");
    }
}
