use thiserror::Error;

/// アプリケーション全体で使用される統一エラー型
#[derive(Debug, Error)]
pub enum AppError {
    /// データベース関連のエラー（永続化エラー）
    #[error("データベースエラー: {0}")]
    Database(String),

    /// 入力値のバリデーションエラー
    #[error("バリデーションエラー: {0}")]
    Validation(String),

    /// 存在しない、または他ユーザーのリソースへのアクセス
    ///
    /// 存在しないのか他人のものなのかは区別しない
    #[error("リソースが見つからないかアクセスできません: {0}")]
    NotFoundOrForbidden(String),

    /// CSVエクスポートでのエラー
    #[error("エクスポートエラー: {0}")]
    Export(String),

    /// 外部サービス（メッセンジャー）連携でのエラー
    #[error("外部サービスエラー: {0}")]
    ExternalService(String),

    /// 設定関連のエラー
    #[error("設定エラー: {0}")]
    Configuration(String),

    /// I/O関連のエラー
    #[error("I/Oエラー: {0}")]
    Io(#[from] std::io::Error),
}

/// エラーの重要度を表す列挙型
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum ErrorSeverity {
    /// 低重要度（ユーザー入力エラーなど）
    Low,
    /// 中重要度（外部サービス一時的エラーなど）
    Medium,
    /// 高重要度（データベースエラーなど）
    High,
    /// 最重要（起動できない設定エラーなど）
    Critical,
}

impl AppError {
    /// ユーザーに表示するためのメッセージを取得
    ///
    /// # 戻り値
    /// チャットにそのまま送信できるメッセージ
    pub fn user_message(&self) -> &str {
        match self {
            AppError::Database(_) => "Произошла ошибка. Попробуй позже.",
            AppError::Validation(msg) => msg,
            AppError::NotFoundOrForbidden(_) => "Подписка не найдена или недоступна",
            AppError::Export(_) => "Произошла ошибка при экспорте данных. Попробуй позже.",
            AppError::ExternalService(_) => "Сервис временно недоступен. Попробуй позже.",
            AppError::Configuration(_) => "Бот настроен некорректно",
            AppError::Io(_) => "Произошла ошибка. Попробуй позже.",
        }
    }

    /// エラーの詳細情報を取得（ログ出力用）
    pub fn details(&self) -> String {
        format!("{self}")
    }

    /// エラーの重要度を取得
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            AppError::Database(_) => ErrorSeverity::High,
            AppError::Validation(_) => ErrorSeverity::Low,
            AppError::NotFoundOrForbidden(_) => ErrorSeverity::Low,
            AppError::Export(_) => ErrorSeverity::Medium,
            AppError::ExternalService(_) => ErrorSeverity::Medium,
            AppError::Configuration(_) => ErrorSeverity::Critical,
            AppError::Io(_) => ErrorSeverity::Medium,
        }
    }

    /// バリデーションエラーを作成するヘルパー関数
    ///
    /// # 引数
    /// * `message` - ユーザーに再入力を促すメッセージ
    pub fn validation<S: Into<String>>(message: S) -> Self {
        AppError::Validation(message.into())
    }

    /// アクセスできないリソースのエラーを作成するヘルパー関数
    ///
    /// # 引数
    /// * `resource` - 対象リソースの説明（ログ用）
    pub fn not_found_or_forbidden<S: Into<String>>(resource: S) -> Self {
        AppError::NotFoundOrForbidden(resource.into())
    }

    /// エクスポートエラーを作成するヘルパー関数
    pub fn export<S: Into<String>>(message: S) -> Self {
        AppError::Export(message.into())
    }

    /// 外部サービスエラーを作成するヘルパー関数
    ///
    /// # 引数
    /// * `service` - サービス名
    /// * `message` - エラーメッセージ
    pub fn external_service<S: Into<String>>(service: S, message: S) -> Self {
        AppError::ExternalService(format!("{}: {}", service.into(), message.into()))
    }

    /// 設定エラーを作成するヘルパー関数
    pub fn configuration<S: Into<String>>(message: S) -> Self {
        AppError::Configuration(message.into())
    }
}

/// rusqlite::ErrorからAppErrorへの変換
impl From<rusqlite::Error> for AppError {
    fn from(error: rusqlite::Error) -> Self {
        AppError::Database(error.to_string())
    }
}

/// reqwest::ErrorからAppErrorへの変換（URLにはトークンが含まれるため除去する）
impl From<reqwest::Error> for AppError {
    fn from(error: reqwest::Error) -> Self {
        AppError::ExternalService(error.without_url().to_string())
    }
}

/// Result型のエイリアス（アプリケーション全体で使用）
pub type AppResult<T> = Result<T, AppError>;

/// エラーを重要度に応じたレベルでログに記録し、ユーザー向けメッセージを返す
///
/// # 引数
/// * `error` - 発生したエラー
/// * `context` - 発生箇所の説明（ログ用）
pub fn handle_error(error: &AppError, context: &str) -> String {
    match error.severity() {
        ErrorSeverity::Critical => log::error!("重大なエラー: {context} - {error}"),
        ErrorSeverity::High => log::error!("高レベルエラー: {context} - {error}"),
        ErrorSeverity::Medium => log::warn!("中レベルエラー: {context} - {error}"),
        ErrorSeverity::Low => log::info!("低レベルエラー: {context} - {error}"),
    }

    error.user_message().to_string()
}
