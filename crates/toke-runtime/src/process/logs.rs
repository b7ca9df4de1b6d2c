//! Backend stdout/stderr forwarding into `tracing`.

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Child;
use tokio_util::sync::CancellationToken;
use toke_core::Provider;
use tracing::{debug, error, info};

/// Level a backend output line is logged at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Error,
    Info,
    Debug,
}

/// Lines mentioning errors are errors; load and bind announcements are info;
/// everything else is debug noise.
pub fn classify_line(line: &str) -> LogLevel {
    if line.contains("error") || line.contains("ERROR") {
        LogLevel::Error
    } else if line.contains("Model loaded") || line.contains("Server running") {
        LogLevel::Info
    } else {
        LogLevel::Debug
    }
}

fn emit(provider: Provider, stream: &'static str, line: &str) {
    match classify_line(line) {
        LogLevel::Error => error!(%provider, stream, "{line}"),
        LogLevel::Info => info!(%provider, stream, "{line}"),
        LogLevel::Debug => debug!(%provider, stream, "{line}"),
    }
}

/// Spawn tasks that forward the child's stdout and stderr line by line.
///
/// They end when the pipe closes or `cancel` fires.
pub fn spawn_log_readers(child: &mut Child, provider: Provider, cancel: &CancellationToken) {
    if let Some(stdout) = child.stdout.take() {
        tokio::spawn(drain(stdout, provider, "stdout", cancel.clone()));
    }
    if let Some(stderr) = child.stderr.take() {
        tokio::spawn(drain(stderr, provider, "stderr", cancel.clone()));
    }
}

async fn drain<R>(reader: R, provider: Provider, stream: &'static str, cancel: CancellationToken)
where
    R: AsyncRead + Unpin,
{
    let mut lines = BufReader::new(reader).lines();
    loop {
        tokio::select! {
            () = cancel.cancelled() => break,
            line = lines.next_line() => match line {
                Ok(Some(text)) => emit(provider, stream, &text),
                Ok(None) | Err(_) => break,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_lines_are_errors() {
        assert_eq!(classify_line("llama: error loading model"), LogLevel::Error);
        assert_eq!(classify_line("ERROR: out of memory"), LogLevel::Error);
    }

    #[test]
    fn lifecycle_announcements_are_info() {
        assert_eq!(classify_line("Model loaded in 3.2s"), LogLevel::Info);
        assert_eq!(classify_line("Server running on /tmp/s.sock"), LogLevel::Info);
    }

    #[test]
    fn everything_else_is_debug() {
        assert_eq!(classify_line("slot 0: prompt processed"), LogLevel::Debug);
        assert_eq!(classify_line("Error-free startup"), LogLevel::Debug);
    }

    #[tokio::test]
    #[cfg(unix)]
    async fn readers_finish_when_process_exits() {
        let mut child = tokio::process::Command::new("sh")
            .args(["-c", "echo 'Model loaded'; echo 'error: boom' >&2"])
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::piped())
            .spawn()
            .unwrap();

        spawn_log_readers(&mut child, Provider::LlamaCpp, &CancellationToken::new());
        assert!(child.stdout.is_none());
        assert!(child.stderr.is_none());
        assert!(child.wait().await.unwrap().success());
    }
}
