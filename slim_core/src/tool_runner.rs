//! External tool invocation over pipes.
//!
//! Every CLI encoder is driven the same way: bytes in via stdin, bytes
//! out via stdout, no temp files. Pipe buffers are only ~64KB, so a
//! child that emits lots of stderr while we read stdout (or that stops
//! reading stdin) will deadlock a naive implementation; stdin writing and
//! both output reads therefore run on dedicated threads while the caller
//! polls for exit against a deadline.

use crate::errors::{Result, SlimError};
use std::io::{Read, Write};
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};
use tracing::{debug, error, info};

/// External tools the optimizers may invoke.
pub const EXTERNAL_TOOLS: [&str; 7] = [
    "pngquant", "jpegtran", "cjpeg", "gifsicle", "cwebp", "cjxl", "djxl",
];

#[derive(Debug)]
pub struct ToolOutput {
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    pub exit_code: i32,
}

pub fn is_tool_available(name: &str) -> bool {
    which::which(name).is_ok()
}

/// Availability report for every known external tool.
pub fn installed_tools() -> Vec<(&'static str, bool)> {
    EXTERNAL_TOOLS
        .iter()
        .map(|&name| (name, is_tool_available(name)))
        .collect()
}

/// Run a tool with stdin/stdout piping.
///
/// # Arguments
/// * `cmd` - Command and arguments (e.g. `["gifsicle", "--optimize=3"]`).
/// * `input` - Raw bytes piped to stdin.
/// * `timeout` - Wall-clock limit; the process is killed on expiry.
/// * `allowed_exit_codes` - Non-zero exit codes that are not errors
///   (e.g. 99 for pngquant's "quality not met").
///
/// # Errors
/// `ToolNotFound` when the binary is missing, `ToolTimeout` on expiry,
/// `Optimization` (with a stderr tail) on an unexpected exit code.
pub fn run_tool(
    cmd: &[&str],
    input: &[u8],
    timeout: Duration,
    allowed_exit_codes: &[i32],
) -> Result<ToolOutput> {
    let tool = cmd[0].to_string();
    let started = Instant::now();

    debug!(tool = %tool, command = ?cmd, input_bytes = input.len(), "Executing external tool");

    let mut child = Command::new(cmd[0])
        .args(&cmd[1..])
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                SlimError::ToolNotFound(tool.clone())
            } else {
                SlimError::Io(e)
            }
        })?;

    let mut stdin = child.stdin.take().expect("stdin was piped");
    let mut stdout = child.stdout.take().expect("stdout was piped");
    let mut stderr = child.stderr.take().expect("stderr was piped");

    let input_owned = input.to_vec();
    let writer = std::thread::spawn(move || {
        // Broken pipe here just means the child stopped reading; its exit
        // code tells the real story.
        let _ = stdin.write_all(&input_owned);
        drop(stdin);
    });
    let stdout_reader = std::thread::spawn(move || {
        let mut buf = Vec::new();
        let _ = stdout.read_to_end(&mut buf);
        buf
    });
    let stderr_reader = std::thread::spawn(move || {
        let mut buf = Vec::new();
        let _ = stderr.read_to_end(&mut buf);
        buf
    });

    let deadline = started + timeout;
    let status = loop {
        match child.try_wait()? {
            Some(status) => break status,
            None => {
                if Instant::now() >= deadline {
                    let _ = child.kill();
                    let _ = child.wait();
                    error!(
                        tool = %tool,
                        timeout_secs = timeout.as_secs(),
                        "External tool timed out, killed"
                    );
                    return Err(SlimError::ToolTimeout {
                        tool,
                        timeout_secs: timeout.as_secs(),
                    });
                }
                std::thread::sleep(Duration::from_millis(20));
            }
        }
    };

    let _ = writer.join();
    let stdout = stdout_reader.join().unwrap_or_default();
    let stderr = stderr_reader.join().unwrap_or_default();
    let exit_code = status.code().unwrap_or(-1);
    let duration = started.elapsed();

    if exit_code == 0 {
        info!(
            tool = %tool,
            exit_code,
            duration_secs = duration.as_secs_f64(),
            output_bytes = stdout.len(),
            "External tool completed"
        );
    } else if allowed_exit_codes.contains(&exit_code) {
        info!(
            tool = %tool,
            exit_code,
            duration_secs = duration.as_secs_f64(),
            "External tool exited with allowed non-zero code"
        );
    } else {
        let stderr_tail = tail_utf8(&stderr, 500);
        error!(
            tool = %tool,
            exit_code,
            duration_secs = duration.as_secs_f64(),
            stderr = %stderr_tail,
            "External tool failed"
        );
        return Err(SlimError::Optimization {
            tool,
            exit_code,
            stderr_tail,
        });
    }

    Ok(ToolOutput {
        stdout,
        stderr,
        exit_code,
    })
}

fn tail_utf8(bytes: &[u8], max: usize) -> String {
    let start = bytes.len().saturating_sub(max);
    String::from_utf8_lossy(&bytes[start..]).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_tool_pipes_stdin_to_stdout() {
        if !is_tool_available("cat") {
            return;
        }
        let out = run_tool(&["cat"], b"hello pipes", Duration::from_secs(5), &[]).unwrap();
        assert_eq!(out.stdout, b"hello pipes");
        assert_eq!(out.exit_code, 0);
    }

    #[test]
    fn test_run_tool_missing_binary() {
        let err = run_tool(
            &["definitely_not_a_real_tool_xyz"],
            b"",
            Duration::from_secs(1),
            &[],
        )
        .unwrap_err();
        assert!(matches!(err, SlimError::ToolNotFound(_)));
    }

    #[test]
    fn test_run_tool_unexpected_exit_code() {
        if !is_tool_available("false") {
            return;
        }
        let err = run_tool(&["false"], b"", Duration::from_secs(5), &[]).unwrap_err();
        match err {
            SlimError::Optimization { exit_code, .. } => assert_eq!(exit_code, 1),
            other => panic!("expected Optimization error, got {:?}", other),
        }
    }

    #[test]
    fn test_run_tool_allowed_exit_code() {
        if !is_tool_available("false") {
            return;
        }
        let out = run_tool(&["false"], b"", Duration::from_secs(5), &[1]).unwrap();
        assert_eq!(out.exit_code, 1);
    }

    #[test]
    fn test_run_tool_timeout_kills_process() {
        if !is_tool_available("sleep") {
            return;
        }
        let started = Instant::now();
        let err = run_tool(&["sleep", "30"], b"", Duration::from_millis(200), &[]).unwrap_err();
        assert!(matches!(err, SlimError::ToolTimeout { .. }));
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn test_large_input_does_not_deadlock() {
        if !is_tool_available("cat") {
            return;
        }
        // Larger than any OS pipe buffer; exercises the writer thread.
        let input = vec![0x42u8; 1 << 20];
        let out = run_tool(&["cat"], &input, Duration::from_secs(30), &[]).unwrap();
        assert_eq!(out.stdout.len(), input.len());
    }

    #[test]
    fn test_installed_tools_reports_all_names() {
        let report = installed_tools();
        assert_eq!(report.len(), EXTERNAL_TOOLS.len());
    }
}
