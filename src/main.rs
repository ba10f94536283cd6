use anyhow::Result;
use env_logger::Env;
use std::sync::Arc;
use teloxide::Bot;
use voice_rag_bot::bot::{self, TelegramTransport};
use voice_rag_bot::config::{Config, Secrets};
use voice_rag_bot::context::Services;
use voice_rag_bot::orchestrator::MessageOrchestrator;

#[tokio::main]
async fn main() -> Result<()> {
    // ロガーを初期化（RUST_LOG が無ければ設定ファイルのレベルを後で反映）
    let level_from_env = std::env::var_os("RUST_LOG").is_some();
    env_logger::Builder::from_env(Env::default().default_filter_or("trace"))
        .format_timestamp(None)
        .filter_module("reqwest", log::LevelFilter::Warn)
        .filter_module("hyper", log::LevelFilter::Warn)
        .init();
    if !level_from_env {
        log::set_max_level(log::LevelFilter::Info);
    }

    // コマンドライン引数をパース
    let args: Vec<String> = std::env::args().collect();

    // 設定ファイル生成モード
    if args.len() > 1 && args[1] == "--generate-config" {
        let config_path = if args.len() > 2 {
            args[2].as_str()
        } else {
            "config.toml"
        };
        Config::write_default(config_path)?;
        println!("設定ファイルを生成しました: {}", config_path);
        return Ok(());
    }

    // 設定ファイルのパス
    let config_path = if args.len() > 1 && !args[1].starts_with("--") {
        args[1].as_str()
    } else {
        "config.toml"
    };

    // 設定を読み込み
    let config = Config::load_or_default(config_path)?;

    if !level_from_env {
        match config.output.level_filter() {
            Some(level) => log::set_max_level(level),
            None => log::warn!("不明なログレベル: {}", config.output.log_level),
        }
    }

    log::info!("voice-rag-bot を起動します");
    log::info!("設定: {:?}", config);

    // ボットトークンがなければ起動しない
    let secrets = Secrets::from_env()?;

    let services = Services::from_config(&config, &secrets)?;

    let bot = Bot::new(secrets.bot_token.clone());
    let transport = Arc::new(TelegramTransport::new(bot.clone()));
    let orchestrator = Arc::new(MessageOrchestrator::new(services, transport));

    bot::run(bot, orchestrator, config.bot.long_poll_timeout_secs).await;

    log::info!("voice-rag-bot を終了しました");

    Ok(())
}
