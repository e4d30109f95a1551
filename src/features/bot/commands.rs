/// ボットが受け付けるコマンド
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Start,
    Add,
    List,
    Total,
    Report,
    Delete,
    Export,
    Cancel,
}

impl Command {
    /// メッセージテキストをコマンドとして解析する
    ///
    /// `/list@my_bot` のようなボット名付きの形式と、コマンド後の引数を受け付ける。
    /// 未知のコマンドや通常のテキストの場合はNone。
    pub fn parse(text: &str) -> Option<Self> {
        let word = text.split_whitespace().next()?;
        let name = word.strip_prefix('/')?;
        let name = name.split('@').next().unwrap_or(name);

        match name.to_ascii_lowercase().as_str() {
            "start" | "help" => Some(Command::Start),
            "add" => Some(Command::Add),
            "list" => Some(Command::List),
            "total" => Some(Command::Total),
            "report" => Some(Command::Report),
            "delete" => Some(Command::Delete),
            "export" => Some(Command::Export),
            "cancel" => Some(Command::Cancel),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Command::Start => "/start",
            Command::Add => "/add",
            Command::List => "/list",
            Command::Total => "/total",
            Command::Report => "/report",
            Command::Delete => "/delete",
            Command::Export => "/export",
            Command::Cancel => "/cancel",
        }
    }
}
