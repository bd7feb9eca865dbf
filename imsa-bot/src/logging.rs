use file_rotate::compression::Compression;
use file_rotate::suffix::AppendCount;
use file_rotate::{ContentLimit, FileRotate};
use std::fs;
use std::path::Path;
use std::sync::Mutex;
use teloxide::types::Message;
use tracing_subscriber::filter::{EnvFilter, LevelFilter};
use tracing_subscriber::prelude::*;

pub const MAX_LOG_BYTES: usize = 5 * 1024 * 1024;
pub const LOG_BACKUPS: usize = 10;

/// DEBUG for our own crates only; dependencies stay at INFO in the file.
const FILE_DIRECTIVES: &str = "info,imsa_core=debug,imsa_bot=debug";

/// Size-bounded log file: `path`, then `path.1` .. `path.<backups>`.
pub fn rotating_file(path: &Path, max_bytes: usize, backups: usize) -> FileRotate<AppendCount> {
    FileRotate::new(
        path,
        AppendCount::new(backups),
        ContentLimit::Bytes(max_bytes),
        Compression::None,
        #[cfg(unix)]
        None,
    )
}

/// Console at INFO (or `RUST_LOG`), rotated log file at DEBUG for the workspace crates.
///
/// Every process writes its own file, rotation is not shared across processes.
pub fn init(log_file: &Path) -> anyhow::Result<()> {
    if let Some(parent) = log_file.parent() {
        fs::create_dir_all(parent)?;
    }
    let file = rotating_file(log_file, MAX_LOG_BYTES, LOG_BACKUPS);

    let console_filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy();

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_filter(console_filter))
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(Mutex::new(file))
                .with_ansi(false)
                .with_filter(EnvFilter::new(FILE_DIRECTIVES)),
        )
        .try_init()?;
    Ok(())
}

/// Sender identity for log lines.
pub fn sender_label(msg: &Message) -> String {
    match msg.from.as_ref() {
        Some(user) => format!(
            "Telegram User Info: id={}, username={}",
            user.id.0,
            user.username.as_deref().unwrap_or("-")
        ),
        None => format!("Telegram User Info: unknown sender, chat={}", msg.chat.id.0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_log_file_is_bounded() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("imsa.log");
        {
            let mut log = rotating_file(&path, 16, 2);
            for _ in 0..10 {
                log.write_all(b"0123456789\n").unwrap();
            }
            log.flush().unwrap();
        }

        assert!(path.exists());
        assert!(tmp.path().join("imsa.log.1").exists());
        assert!(tmp.path().join("imsa.log.2").exists());
        assert!(!tmp.path().join("imsa.log.3").exists());
        assert!(fs::metadata(&path).unwrap().len() <= 16);
    }
}
