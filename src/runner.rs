use crate::errors::AppError;
use crate::models::OperationResult;
use crate::operations::CommandSpec;
use std::process::{ExitStatus, Stdio};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};
use tokio::task::JoinHandle;
use tokio::time::{timeout, Duration};

const MAX_CAPTURED_OUTPUT_BYTES: usize = 256 * 1024;
const TERMINATE_GRACE: Duration = Duration::from_millis(1500);
const KILL_GRACE: Duration = Duration::from_secs(2);
const OUTPUT_DRAIN_GRACE: Duration = Duration::from_millis(500);
const MAX_SPAWN_ATTEMPTS: u32 = 4;

/// Runs one process per call with a hard deadline. Each child gets its own
/// process group so a timeout takes down anything the script started.
#[derive(Debug, Clone)]
pub struct CommandRunner {
    timeout: Duration,
    spawned: Arc<AtomicU64>,
}

impl CommandRunner {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            spawned: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn spawn_count(&self) -> u64 {
        self.spawned.load(Ordering::Relaxed)
    }

    pub async fn run(&self, spec: &CommandSpec) -> OperationResult {
        let label = spec.label();
        let mut command = Command::new(&spec.program);
        command
            .args(&spec.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(cwd) = &spec.cwd {
            command.current_dir(cwd);
        }
        #[cfg(unix)]
        {
            command.process_group(0);
        }

        let mut spawn_attempt = 0_u32;
        let mut child = loop {
            spawn_attempt = spawn_attempt.saturating_add(1);
            match command.spawn() {
                Ok(child) => break child,
                Err(error) if is_text_file_busy(&error) && spawn_attempt < MAX_SPAWN_ATTEMPTS => {
                    let delay_ms = 50_u64.saturating_mul(2_u64.saturating_pow(spawn_attempt - 1));
                    tracing::debug!(program = %label, attempt = spawn_attempt, delay_ms, "executable busy, retrying spawn");
                    tokio::time::sleep(Duration::from_millis(delay_ms)).await;
                }
                Err(error) => {
                    tracing::warn!(program = %label, error = %error, "failed to spawn process");
                    let error = AppError::Subprocess(format!("failed to spawn {}: {}", label, error));
                    return OperationResult::rejected(&error);
                }
            }
        };
        self.spawned.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(program = %label, pid = child.id(), args = ?spec.args, "process spawned");

        let stdout_task = child.stdout.take().map(|stream| tokio::spawn(read_capped(stream)));
        let stderr_task = child.stderr.take().map(|stream| tokio::spawn(read_capped(stream)));

        let waited = timeout(self.timeout, child.wait()).await;
        if waited.is_err() {
            tracing::warn!(program = %label, timeout_ms = self.timeout.as_millis() as u64, "process timed out");
            terminate_then_kill(&mut child).await;
        }

        let stdout = collect_output(stdout_task).await;
        let stderr = collect_output(stderr_task).await;

        match waited {
            Err(_) => {
                let error = AppError::Timeout(format!(
                    "{} did not finish within {} ms",
                    label,
                    self.timeout.as_millis()
                ));
                OperationResult::failed(&error, stdout, stderr)
            }
            Ok(Err(error)) => {
                let error = AppError::Subprocess(format!("failed to wait for {}: {}", label, error));
                OperationResult::failed(&error, stdout, stderr)
            }
            Ok(Ok(status)) if status.success() => OperationResult::succeeded(stdout, stderr),
            Ok(Ok(status)) => {
                tracing::info!(program = %label, code = status.code(), "process exited unsuccessfully");
                let error = AppError::Subprocess(describe_exit(&label, status, &stderr));
                OperationResult::failed(&error, stdout, stderr)
            }
        }
    }
}

async fn terminate_then_kill(child: &mut Child) {
    #[cfg(unix)]
    let group = child.id().map(|pid| nix::unistd::Pid::from_raw(pid as i32));

    #[cfg(unix)]
    {
        if let Some(group) = group {
            let _ = nix::sys::signal::killpg(group, nix::sys::signal::Signal::SIGTERM);
        }
    }

    if timeout(TERMINATE_GRACE, child.wait()).await.is_ok() {
        return;
    }

    #[cfg(unix)]
    {
        if let Some(group) = group {
            let _ = nix::sys::signal::killpg(group, nix::sys::signal::Signal::SIGKILL);
        }
    }
    let _ = child.start_kill();
    let _ = timeout(KILL_GRACE, child.wait()).await;
}

async fn read_capped<R>(mut stream: R) -> String
where
    R: AsyncRead + Unpin,
{
    let mut captured = Vec::new();
    let mut chunk = [0u8; 8192];
    loop {
        match stream.read(&mut chunk).await {
            Ok(0) | Err(_) => break,
            Ok(read) => {
                let room = MAX_CAPTURED_OUTPUT_BYTES.saturating_sub(captured.len());
                captured.extend_from_slice(&chunk[..read.min(room)]);
            }
        }
    }
    String::from_utf8_lossy(&captured).into_owned()
}

async fn collect_output(task: Option<JoinHandle<String>>) -> String {
    let Some(mut task) = task else {
        return String::new();
    };
    match timeout(OUTPUT_DRAIN_GRACE, &mut task).await {
        Ok(Ok(text)) => text,
        Ok(Err(_)) => String::new(),
        Err(_) => {
            task.abort();
            String::new()
        }
    }
}

// ETXTBSY: the script was still open for writing when exec ran.
fn is_text_file_busy(error: &std::io::Error) -> bool {
    error.raw_os_error() == Some(26)
}

fn describe_exit(label: &str, status: ExitStatus, stderr: &str) -> String {
    let outcome = match status.code() {
        Some(code) => format!("exited with status {}", code),
        None => {
            #[cfg(unix)]
            {
                use std::os::unix::process::ExitStatusExt;
                match status.signal() {
                    Some(signal) => format!("was terminated by signal {}", signal),
                    None => "exited abnormally".to_string(),
                }
            }
            #[cfg(not(unix))]
            {
                "exited abnormally".to_string()
            }
        }
    };
    let stderr = stderr.trim();
    if stderr.is_empty() {
        format!("{} {}", label, outcome)
    } else {
        format!("{} {}: {}", label, outcome, stderr)
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::CommandRunner;
    use crate::models::OperationErrorKind;
    use crate::operations::CommandSpec;
    use crate::testing::write_script;
    use std::time::{Duration, Instant};

    #[tokio::test]
    async fn captures_stdout_and_stderr_on_success() {
        let dir = tempfile::tempdir().expect("tempdir");
        let script = write_script(dir.path(), "both.sh", "echo \"out $1\"\necho warn >&2\n");
        let runner = CommandRunner::new(Duration::from_secs(5));

        let result = runner
            .run(&CommandSpec::new(script, vec!["a b".to_string()]).in_dir(dir.path()))
            .await;
        assert!(result.success);
        assert_eq!(result.stdout.trim(), "out a b");
        assert_eq!(result.stderr.trim(), "warn");
        assert_eq!(result.error, None);
        assert_eq!(runner.spawn_count(), 1);
    }

    #[tokio::test]
    async fn arguments_are_not_shell_interpreted() {
        let dir = tempfile::tempdir().expect("tempdir");
        let marker = dir.path().join("pwned");
        let script = write_script(dir.path(), "echo.sh", "printf '%s' \"$1\"\n");
        let runner = CommandRunner::new(Duration::from_secs(5));

        let payload = format!("x; touch {}", marker.display());
        let result = runner.run(&CommandSpec::new(script, vec![payload.clone()])).await;
        assert!(result.success);
        assert_eq!(result.stdout, payload);
        assert!(!marker.exists());
    }

    #[tokio::test]
    async fn non_zero_exit_carries_stderr_in_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let script = write_script(dir.path(), "deny.sh", "echo 'permission denied' >&2\nexit 3\n");
        let runner = CommandRunner::new(Duration::from_secs(5));

        let result = runner.run(&CommandSpec::new(script, Vec::new())).await;
        assert!(!result.success);
        assert_eq!(result.error_kind, Some(OperationErrorKind::SubprocessFailure));
        let error = result.error.expect("error text");
        assert!(error.contains("permission denied"));
        assert!(error.contains("status 3"));
    }

    #[tokio::test]
    async fn missing_program_is_a_subprocess_failure() {
        let dir = tempfile::tempdir().expect("tempdir");
        let runner = CommandRunner::new(Duration::from_secs(5));

        let result = runner
            .run(&CommandSpec::new(dir.path().join("absent.sh"), Vec::new()))
            .await;
        assert!(!result.success);
        assert_eq!(result.error_kind, Some(OperationErrorKind::SubprocessFailure));
        assert_eq!(runner.spawn_count(), 0);
    }

    #[tokio::test]
    async fn timeout_kills_the_process_within_bound() {
        let dir = tempfile::tempdir().expect("tempdir");
        let pid_file = dir.path().join("pid");
        let script = write_script(
            dir.path(),
            "hang.sh",
            &format!("echo $$ > '{}'\nexec sleep 30\n", pid_file.display()),
        );
        let runner = CommandRunner::new(Duration::from_millis(300));

        let started = Instant::now();
        let result = runner.run(&CommandSpec::new(script, Vec::new())).await;
        let elapsed = started.elapsed();

        assert!(!result.success);
        assert_eq!(result.error_kind, Some(OperationErrorKind::Timeout));
        assert!(elapsed < Duration::from_secs(5), "took {:?}", elapsed);

        let pid: i32 = std::fs::read_to_string(&pid_file)
            .expect("pid file")
            .trim()
            .parse()
            .expect("pid");
        let alive = nix::sys::signal::kill(nix::unistd::Pid::from_raw(pid), None).is_ok();
        assert!(!alive, "timed out process {} is still running", pid);
    }

    #[tokio::test]
    async fn oversized_output_is_capped() {
        let dir = tempfile::tempdir().expect("tempdir");
        let script = write_script(dir.path(), "flood.sh", "head -c 600000 /dev/zero | tr '\\0' 'a'\n");
        let runner = CommandRunner::new(Duration::from_secs(5));

        let result = runner.run(&CommandSpec::new(script, Vec::new())).await;
        assert!(result.success);
        assert_eq!(result.stdout.len(), super::MAX_CAPTURED_OUTPUT_BYTES);
    }
}
