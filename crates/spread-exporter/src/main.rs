use color_eyre::eyre;
use tokio_util::sync::CancellationToken;
use tracing::info;

use spread_exporter::{app, logger, ExporterConfig};

#[tokio::main]
async fn main() -> eyre::Result<()> {
    // init error reporting
    color_eyre::install()?;

    dotenv::dotenv().ok();

    // 설정이 잘못되면 루프를 시작하기 전에 종료
    let cfg = ExporterConfig::from_env()?;

    let _guards = logger::init_tracing(cfg.log_dir.as_deref())?;

    info!("spread exporter 시작 중...");

    let shutdown = CancellationToken::new();
    {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            app::wait_for_shutdown_signal().await;
            shutdown.cancel();
        });
    }

    app::run(cfg, shutdown).await?;

    info!("종료");
    Ok(())
}
