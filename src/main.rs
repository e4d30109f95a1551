#[tokio::main]
async fn main() {
    if let Err(e) = subscription_memo_lib::run().await {
        eprintln!("ボットの起動に失敗しました: {e}");
        std::process::exit(1);
    }
}
