use std::fs::{self, OpenOptions};
use std::path::Path;

use chrono::Local;
use tracing_appender::non_blocking;
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

/// Tracing guards를 보관하는 구조체
/// 이 구조체가 drop되기 전까지 로깅이 계속 작동합니다
pub struct TracingGuards {
    _file: Option<WorkerGuard>,
    _stdout: WorkerGuard,
}

/// Tracing 초기화.
/// stdout 로깅은 항상, `log_dir` 이 있으면 일별 파일 로깅도 함께 설정합니다
pub fn init_tracing(log_dir: Option<&Path>) -> eyre::Result<TracingGuards> {
    let (stdout_writer, stdout_guard) = non_blocking(std::io::stdout());

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let (file_layer, file_guard) = match log_dir {
        Some(dir) => {
            let (file_writer, guard) = daily_file_writer(dir, "spread-exporter")?;
            // 파일 로깅: INFO 레벨 이상만 기록
            let layer = fmt::layer()
                .with_ansi(false)
                .with_writer(file_writer)
                .with_filter(LevelFilter::INFO);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer)
        .with(fmt::layer().with_writer(stdout_writer).with_ansi(true))
        .try_init()?;

    Ok(TracingGuards {
        _file: file_guard,
        _stdout: stdout_guard,
    })
}

/// `<dir>/<prefix>.2025-11-29.log` 형식의 파일을 연다
fn daily_file_writer(dir: &Path, prefix: &str) -> eyre::Result<(NonBlocking, WorkerGuard)> {
    fs::create_dir_all(dir)?;

    let date = Local::now().format("%Y-%m-%d").to_string();
    let path = dir.join(format!("{prefix}.{date}.log"));

    let file = OpenOptions::new().create(true).append(true).open(&path)?;

    Ok(non_blocking(file))
}
