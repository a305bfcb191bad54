//! Log retrieval: the abstract interface over where raw log text comes from.
//!
//! The merge engine only consumes text. [`LogSource`] is the seam:
//! [`KubectlSource`] shells out to `kubectl logs`, [`FileSource`] reads
//! `<dir>/<source>.log` files. Tests provide their own in-memory doubles.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::process::Stdio;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncSeekExt, BufReader};
use tokio_stream::Stream;

/// A retrieval failure for one source.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct SourceError {
    pub message: String,
}

impl SourceError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl From<std::io::Error> for SourceError {
    fn from(e: std::io::Error) -> Self {
        Self::new(e.to_string())
    }
}

/// Live feed of raw text chunks for one source.
pub type ChunkStream = Pin<Box<dyn Stream<Item = Result<String, SourceError>> + Send>>;

type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Unified async interface over a log backend.
///
/// Object-safe thanks to boxed futures, so sessions can hold an
/// `Arc<dyn LogSource>`.
pub trait LogSource: Send + Sync {
    /// Fetch the complete (or last `tail` lines of the) log text.
    fn fetch<'a>(
        &'a self,
        source_id: &'a str,
        tail: Option<usize>,
    ) -> BoxFuture<'a, Result<String, SourceError>>;

    /// Follow the log, starting from the last `tail` lines.
    fn follow<'a>(
        &'a self,
        source_id: &'a str,
        tail: Option<usize>,
    ) -> BoxFuture<'a, Result<ChunkStream, SourceError>>;

    /// Names of the sources this backend can read, in backend order.
    fn list_sources(&self) -> BoxFuture<'_, Result<Vec<String>, SourceError>> {
        Box::pin(async {
            Err::<Vec<String>, _>(SourceError::new("listing sources is not supported"))
        })
    }
}

/// Keep only the last `n` non-empty lines of `text`.
pub fn tail_lines(text: &str, n: usize) -> String {
    let lines: Vec<&str> = text.split('\n').filter(|l| !l.is_empty()).collect();
    let start = lines.len().saturating_sub(n);
    let mut out = lines[start..].join("\n");
    if !out.is_empty() {
        out.push('\n');
    }
    out
}

// ── kubectl ─────────────────────────────────────────────────────

/// One row of `kubectl config get-contexts`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KubeContext {
    pub name: String,
    pub namespace: Option<String>,
    pub current: bool,
}

/// Reads pod logs through the `kubectl` CLI.
#[derive(Debug, Clone)]
pub struct KubectlSource {
    program: String,
    context: Option<String>,
    namespace: Option<String>,
}

impl KubectlSource {
    pub fn new(namespace: Option<String>) -> Self {
        Self {
            program: "kubectl".to_string(),
            context: None,
            namespace,
        }
    }

    /// Use a different executable (a wrapper script, a test stub).
    #[must_use]
    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    /// Talk to this kubeconfig context instead of the current one.
    #[must_use]
    pub fn with_context(mut self, context: Option<String>) -> Self {
        self.context = context;
        self
    }

    fn command_args(&self, subcommand: &[&str]) -> Vec<String> {
        let mut args = Vec::new();
        if let Some(ref ctx) = self.context {
            args.push("--context".to_string());
            args.push(ctx.clone());
        }
        args.extend(subcommand.iter().map(|s| (*s).to_string()));
        if let Some(ref ns) = self.namespace {
            args.push("-n".to_string());
            args.push(ns.clone());
        }
        args
    }

    fn args(&self, pod: &str, tail: Option<usize>, follow: bool) -> Vec<String> {
        let mut args = self.command_args(&["logs"]);
        args.push(pod.to_string());
        if follow {
            args.push("-f".to_string());
        }
        if let Some(n) = tail {
            args.push(format!("--tail={n}"));
        }
        args
    }

    /// Run `kubectl` to completion; a non-zero exit becomes a [`SourceError`].
    async fn run(&self, args: Vec<String>) -> Result<String, SourceError> {
        let output = tokio::process::Command::new(&self.program)
            .args(args)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| SourceError::new(format!("{}: {e}", self.program)))?;
        if !output.status.success() {
            return Err(self.exit_error(output.status, &output.stderr));
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    fn exit_error(&self, status: std::process::ExitStatus, stderr: &[u8]) -> SourceError {
        let stderr = String::from_utf8_lossy(stderr);
        let message = stderr.trim();
        SourceError::new(if message.is_empty() {
            format!("{} exited with {status}", self.program)
        } else {
            message.to_string()
        })
    }

    /// Contexts known to the kubeconfig.
    pub async fn list_contexts(&self) -> Result<Vec<KubeContext>, SourceError> {
        let table = self
            .run(vec!["config".to_string(), "get-contexts".to_string()])
            .await?;
        Ok(parse_contexts(&table))
    }
}

/// Parse the `get-contexts` table: `CURRENT NAME CLUSTER AUTHINFO [NAMESPACE]`.
fn parse_contexts(table: &str) -> Vec<KubeContext> {
    table
        .lines()
        .skip(1)
        .filter_map(|line| {
            let mut columns: Vec<&str> = line.split_whitespace().collect();
            let current = columns.first() == Some(&"*");
            if current {
                columns.remove(0);
            }
            let name = (*columns.first()?).to_string();
            Some(KubeContext {
                name,
                namespace: columns.get(3).map(|ns| (*ns).to_string()),
                current,
            })
        })
        .collect()
}

/// First column of a `kubectl get` table, header skipped.
fn parse_names(table: &str) -> Vec<String> {
    table
        .lines()
        .skip(1)
        .filter_map(|line| line.split_whitespace().next())
        .map(str::to_string)
        .collect()
}

impl LogSource for KubectlSource {
    fn fetch<'a>(
        &'a self,
        source_id: &'a str,
        tail: Option<usize>,
    ) -> BoxFuture<'a, Result<String, SourceError>> {
        Box::pin(self.run(self.args(source_id, tail, false)))
    }

    fn follow<'a>(
        &'a self,
        source_id: &'a str,
        tail: Option<usize>,
    ) -> BoxFuture<'a, Result<ChunkStream, SourceError>> {
        Box::pin(async move {
            let mut child = tokio::process::Command::new(&self.program)
                .args(self.args(source_id, tail, true))
                .stdin(Stdio::null())
                .stdout(Stdio::piped())
                .stderr(Stdio::piped())
                .kill_on_drop(true)
                .spawn()
                .map_err(|e| SourceError::new(format!("{}: {e}", self.program)))?;
            let stdout = child
                .stdout
                .take()
                .ok_or_else(|| SourceError::new("kubectl stdout not captured"))?;
            let mut stderr = child
                .stderr
                .take()
                .ok_or_else(|| SourceError::new("kubectl stderr not captured"))?;
            // Drained concurrently so a chatty stderr cannot block the child.
            let stderr_task = tokio::spawn(async move {
                let mut buf = Vec::new();
                let _ = stderr.read_to_end(&mut buf).await;
                buf
            });
            let source = self.clone();

            let stream = async_stream::stream! {
                let mut reader = BufReader::new(stdout);
                let mut buf = Vec::new();
                let mut read_error = None;
                loop {
                    buf.clear();
                    match reader.read_until(b'\n', &mut buf).await {
                        Ok(0) => break,
                        Ok(_) => {
                            let mut line = String::from_utf8_lossy(&buf).into_owned();
                            if !line.ends_with('\n') {
                                line.push('\n');
                            }
                            yield Ok(line);
                        }
                        Err(e) => {
                            read_error = Some(SourceError::from(e));
                            break;
                        }
                    }
                }
                // Dropping the stream before this point drops the child, which kills it.
                if let Some(e) = read_error {
                    yield Err(e);
                } else {
                    match child.wait().await {
                        Ok(status) if status.success() => {}
                        Ok(status) => {
                            let stderr = stderr_task.await.unwrap_or_default();
                            yield Err(source.exit_error(status, &stderr));
                        }
                        Err(e) => {
                            yield Err(SourceError::from(e));
                        }
                    }
                }
            };
            Ok::<ChunkStream, SourceError>(Box::pin(stream))
        })
    }

    fn list_sources(&self) -> BoxFuture<'_, Result<Vec<String>, SourceError>> {
        Box::pin(async move {
            let table = self.run(self.command_args(&["get", "pods"])).await?;
            Ok::<_, SourceError>(parse_names(&table))
        })
    }
}

// ── files ───────────────────────────────────────────────────────

/// Reads `<dir>/<source>.log`; following polls for appended bytes.
#[derive(Debug, Clone)]
pub struct FileSource {
    dir: PathBuf,
    poll_interval: Duration,
}

impl FileSource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            poll_interval: Duration::from_millis(250),
        }
    }

    #[must_use]
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn path_for(&self, source_id: &str) -> PathBuf {
        self.dir.join(format!("{source_id}.log"))
    }
}

/// Bytes read by one poll of a followed file.
struct Appended {
    /// The file shrank and was re-read from the start.
    restarted: bool,
    offset: u64,
    bytes: Vec<u8>,
}

/// Read bytes appended after `offset`; a shrunk file is re-read from the start.
async fn read_appended(path: &Path, offset: u64) -> std::io::Result<Appended> {
    let mut file = tokio::fs::File::open(path).await?;
    let len = file.metadata().await?.len();
    let restarted = len < offset;
    let start = if restarted { 0 } else { offset };
    file.seek(std::io::SeekFrom::Start(start)).await?;
    let mut bytes = Vec::new();
    file.read_to_end(&mut bytes).await?;
    Ok(Appended {
        restarted,
        offset: start + bytes.len() as u64,
        bytes,
    })
}

/// Length of a trailing UTF-8 sequence that is cut short at the end of `bytes`.
fn incomplete_utf8_tail(bytes: &[u8]) -> usize {
    for back in 1..=bytes.len().min(4) {
        let b = bytes[bytes.len() - back];
        if b & 0xC0 != 0x80 {
            let needed = match b {
                0xC0..=0xDF => 2,
                0xE0..=0xEF => 3,
                0xF0..=0xF7 => 4,
                _ => 1,
            };
            return if needed > back { back } else { 0 };
        }
    }
    0
}

/// Decode `pending` lossily, keeping a cut-off trailing character for the next read.
fn take_decoded(pending: &mut Vec<u8>) -> String {
    let keep = incomplete_utf8_tail(pending);
    let tail = pending.split_off(pending.len() - keep);
    let text = String::from_utf8_lossy(pending).into_owned();
    *pending = tail;
    text
}

impl LogSource for FileSource {
    fn fetch<'a>(
        &'a self,
        source_id: &'a str,
        tail: Option<usize>,
    ) -> BoxFuture<'a, Result<String, SourceError>> {
        Box::pin(async move {
            let path = self.path_for(source_id);
            let bytes = tokio::fs::read(&path)
                .await
                .map_err(|e| SourceError::new(format!("{}: {e}", path.display())))?;
            let text = String::from_utf8_lossy(&bytes).into_owned();
            Ok::<_, SourceError>(match tail {
                Some(n) => tail_lines(&text, n),
                None => text,
            })
        })
    }

    fn follow<'a>(
        &'a self,
        source_id: &'a str,
        tail: Option<usize>,
    ) -> BoxFuture<'a, Result<ChunkStream, SourceError>> {
        Box::pin(async move {
            let path = self.path_for(source_id);
            let first = read_appended(&path, 0)
                .await
                .map_err(|e| SourceError::new(format!("{}: {e}", path.display())))?;
            let mut pending = first.bytes;
            let initial = take_decoded(&mut pending);
            let initial = match tail {
                Some(n) => tail_lines(&initial, n),
                None => initial,
            };
            let interval = self.poll_interval;

            let stream = async_stream::stream! {
                let mut offset = first.offset;
                let mut pending = pending;
                if !initial.is_empty() {
                    yield Ok(initial);
                }
                let mut ticker = tokio::time::interval(interval);
                loop {
                    ticker.tick().await;
                    match read_appended(&path, offset).await {
                        Ok(appended) => {
                            offset = appended.offset;
                            if appended.restarted {
                                pending.clear();
                            }
                            pending.extend_from_slice(&appended.bytes);
                            let text = take_decoded(&mut pending);
                            if !text.is_empty() {
                                yield Ok(text);
                            }
                        }
                        Err(e) => {
                            yield Err(SourceError::new(format!("{}: {e}", path.display())));
                            break;
                        }
                    }
                }
            };
            Ok::<ChunkStream, SourceError>(Box::pin(stream))
        })
    }

    fn list_sources(&self) -> BoxFuture<'_, Result<Vec<String>, SourceError>> {
        Box::pin(async move {
            let read_error =
                |e: std::io::Error| SourceError::new(format!("{}: {e}", self.dir.display()));
            let mut dir = tokio::fs::read_dir(&self.dir).await.map_err(read_error)?;
            let mut names = Vec::new();
            while let Some(entry) = dir.next_entry().await.map_err(read_error)? {
                let path = entry.path();
                if path.extension().is_some_and(|ext| ext == "log")
                    && let Some(stem) = path.file_stem().and_then(|s| s.to_str())
                {
                    names.push(stem.to_string());
                }
            }
            names.sort();
            Ok::<_, SourceError>(names)
        })
    }
}
