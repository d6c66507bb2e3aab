// Child-process plumbing: spawning external tools, feeding decompressed
// file bytes to stdin, and collecting stdout/stderr.

use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use anyhow::{anyhow, Result};
use log::debug;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader as TokioBufReader};
use tokio::process::{Child, ChildStdin, Command};
use tokio::sync::mpsc;

use crate::utils::fastx::FileReader;

const STDIN_CHUNK_SIZE: usize = 64 * 1024;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ChildStream {
    Stdout,
    Stderr,
}

/// Spawns `tool` with all three standard streams piped.
pub fn spawn_tool(tool: &str, args: &[String]) -> Result<Child> {
    Command::new(tool)
        .args(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| anyhow!("Failed to spawn {}: {}. Is it installed?", tool, e))
}

/// Reads one of a child's output streams to EOF, returning its lines.
pub async fn read_child_output_to_vec(child: &mut Child, stream: ChildStream) -> Result<Vec<String>> {
    let mut lines = Vec::new();
    match stream {
        ChildStream::Stdout => {
            let stdout = child
                .stdout
                .take()
                .ok_or_else(|| anyhow!("Child stdout was not piped"))?;
            let mut reader = TokioBufReader::new(stdout).lines();
            while let Some(line) = reader.next_line().await? {
                lines.push(line);
            }
        }
        ChildStream::Stderr => {
            let stderr = child
                .stderr
                .take()
                .ok_or_else(|| anyhow!("Child stderr was not piped"))?;
            let mut reader = TokioBufReader::new(stderr).lines();
            while let Some(line) = reader.next_line().await? {
                lines.push(line);
            }
        }
    }
    Ok(lines)
}

/// Runs an external tool to completion. Stdout and stderr are collected;
/// stdout is logged at debug level. A non-zero exit status is an error
/// carrying the tail of the tool's stderr.
pub async fn run_tool(tool: &str, args: &[String]) -> Result<()> {
    debug!("{} {}", tool, args.join(" "));
    let mut child = Command::new(tool)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| anyhow!("Failed to spawn {}: {}. Is it installed?", tool, e))?;

    let stderr_task = {
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| anyhow!("Child stderr was not piped"))?;
        tokio::spawn(async move {
            let mut lines = Vec::new();
            let mut reader = TokioBufReader::new(stderr).lines();
            while let Ok(Some(line)) = reader.next_line().await {
                lines.push(line);
            }
            lines
        })
    };

    let stdout_lines = read_child_output_to_vec(&mut child, ChildStream::Stdout).await?;
    for line in &stdout_lines {
        debug!("{}: {}", tool, line);
    }

    let status = child.wait().await?;
    let stderr_lines = stderr_task.await.unwrap_or_default();
    if !status.success() {
        return Err(anyhow!(
            "{} exited with {}: {}",
            tool,
            status,
            stderr_tail(&stderr_lines)
        ));
    }
    Ok(())
}

/// Runs an external tool that consumes records on stdin and emits records
/// on stdout: `input` (decompressed on the fly if gzip-compressed) is
/// streamed to the child's stdin in chunks, stdout is written to `output`.
pub async fn run_tool_streamed(
    tool: &str,
    args: &[String],
    input: &Path,
    output: &Path,
) -> Result<()> {
    debug!("{} {} < {} > {}", tool, args.join(" "), input.display(), output.display());
    let mut child = spawn_tool(tool, args)?;

    let stdin = child
        .stdin
        .take()
        .ok_or_else(|| anyhow!("Child stdin was not piped"))?;
    let feed_task = feed_file_to_stdin(stdin, input.to_path_buf());

    let stderr_task = {
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| anyhow!("Child stderr was not piped"))?;
        tokio::spawn(async move {
            let mut lines = Vec::new();
            let mut reader = TokioBufReader::new(stderr).lines();
            while let Ok(Some(line)) = reader.next_line().await {
                lines.push(line);
            }
            lines
        })
    };

    let copy_task = {
        let mut stdout = child
            .stdout
            .take()
            .ok_or_else(|| anyhow!("Child stdout was not piped"))?;
        let output = output.to_path_buf();
        async move {
            let mut out_file = tokio::fs::File::create(&output)
                .await
                .map_err(|e| anyhow!("Cannot create {}: {}", output.display(), e))?;
            tokio::io::copy(&mut stdout, &mut out_file).await?;
            Ok::<(), anyhow::Error>(())
        }
    };

    let (feed_result, copy_result) = tokio::join!(feed_task, copy_task);
    let status = child.wait().await?;
    let stderr_lines = stderr_task.await.unwrap_or_default();

    if !status.success() {
        return Err(anyhow!(
            "{} exited with {}: {}",
            tool,
            status,
            stderr_tail(&stderr_lines)
        ));
    }
    // A broken stdin pipe only matters if the tool itself failed; checked
    // after the status so the tool's own diagnostic wins.
    feed_result?;
    copy_result?;
    Ok(())
}

/// Streams a file into a child's stdin, decompressing gzip input on the
/// fly. File reading happens on a blocking thread; chunks cross to the
/// async writer over a bounded channel.
async fn feed_file_to_stdin(mut stdin: ChildStdin, path: PathBuf) -> Result<()> {
    let (tx, mut rx) = mpsc::channel::<Vec<u8>>(100);

    let read_task = tokio::task::spawn_blocking(move || -> Result<()> {
        let mut reader = FileReader::open(&path)
            .map_err(|e| anyhow!("Cannot open {}: {}", path.display(), e))?;
        let mut buf = vec![0u8; STDIN_CHUNK_SIZE];
        loop {
            let n = reader.read(&mut buf)?;
            if n == 0 {
                break;
            }
            if tx.blocking_send(buf[..n].to_vec()).is_err() {
                break; // Writer hung up; child decides the outcome
            }
        }
        Ok(())
    });

    let mut write_result: Result<()> = Ok(());
    while let Some(chunk) = rx.recv().await {
        if let Err(e) = stdin.write_all(&chunk).await {
            write_result = Err(anyhow!("Stdin write failed: {}", e));
            break;
        }
    }
    drop(stdin); // EOF for the child

    read_task.await??;
    write_result
}

fn stderr_tail(lines: &[String]) -> String {
    let tail: Vec<&str> = lines.iter().rev().take(5).rev().map(|s| s.as_str()).collect();
    if tail.is_empty() {
        "(no stderr output)".to_string()
    } else {
        tail.join(" | ")
    }
}
