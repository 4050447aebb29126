use std::{
    future::Future,
    io::ErrorKind,
    ops::Deref,
    path::{Path, PathBuf},
};

use anyhow::Result;
use chrono::{Duration, NaiveDate};
use fs4::tokio::AsyncFileExt;
use tokio::{
    fs::File,
    io::{
        AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncSeek, AsyncSeekExt, AsyncWrite,
        AsyncWriteExt, BufReader,
    },
};
use tracing::{debug, warn};

use crate::{fs::operations::seek_previous_line, utils::time::date_to_ledger_name};

use super::entities::{ActivityMark, ActivitySpanEntity, SessionSummary};

/// Interface for abstracting storage of activity ledgers.
pub trait LedgerStorage {
    type DayFile: DayFileHandle;

    /// Opens or creates the ledger file for a day. One file per day keeps
    /// reads for reports cheap.
    fn create_or_append(&self, date: NaiveDate) -> impl Future<Output = Result<Self::DayFile>>;

    /// Retrieves all spans recorded for a day.
    fn spans_for(
        &self,
        date: NaiveDate,
    ) -> impl Future<Output = Result<Vec<ActivitySpanEntity>>> + Send;

    /// Writes an end-of-session rollup and returns its path.
    fn save_session(
        &self,
        summary: &SessionSummary,
    ) -> impl Future<Output = Result<PathBuf>> + Send;
}

impl<T: Deref> LedgerStorage for T
where
    T::Target: LedgerStorage,
{
    type DayFile = <T::Target as LedgerStorage>::DayFile;

    fn create_or_append(&self, date: NaiveDate) -> impl Future<Output = Result<Self::DayFile>> {
        self.deref().create_or_append(date)
    }

    fn spans_for(
        &self,
        date: NaiveDate,
    ) -> impl Future<Output = Result<Vec<ActivitySpanEntity>>> + Send {
        self.deref().spans_for(date)
    }

    fn save_session(
        &self,
        summary: &SessionSummary,
    ) -> impl Future<Output = Result<PathBuf>> + Send {
        self.deref().save_session(summary)
    }
}

pub trait DayFileHandle {
    fn append(&mut self, marks: Vec<ActivityMark>) -> impl Future<Output = Result<()>>;
    fn get_date(&self) -> NaiveDate;
    fn flush(&mut self) -> impl Future<Output = Result<()>>;
}

/// The main realization of [LedgerStorage]. Ledgers live under `ledger/`,
/// session summaries under `sessions/`.
pub struct LedgerStorageImpl {
    ledger_dir: PathBuf,
    session_dir: PathBuf,
}

impl LedgerStorageImpl {
    pub fn new(root: PathBuf) -> Result<Self, std::io::Error> {
        let ledger_dir = root.join("ledger");
        let session_dir = root.join("sessions");
        std::fs::create_dir_all(&ledger_dir)?;
        std::fs::create_dir_all(&session_dir)?;

        Ok(Self {
            ledger_dir,
            session_dir,
        })
    }

    async fn get_all_inner(&self, path: &Path) -> Result<Vec<ActivitySpanEntity>> {
        async fn extract(
            path: &Path,
        ) -> std::result::Result<Vec<ActivitySpanEntity>, std::io::Error> {
            debug!("Extracting {path:?}");
            let file = File::open(path).await?;
            file.lock_shared()?;
            let buffer = BufReader::new(file);
            let mut lines = buffer.lines();
            let mut spans = vec![];
            while let Ok(Some(v)) = lines.next_line().await {
                match serde_json::from_str::<ActivitySpanEntity>(&v) {
                    Ok(v) => spans.push(v),
                    Err(e) => {
                        // ignore illegal values. Might happen after shutdowns
                        warn!(
                            "During parsing in path {:?} found illegal json string {}:  {e}",
                            path, &v
                        )
                    }
                }
            }

            lines.into_inner().into_inner().unlock_async().await?;

            Ok(spans)
        }

        match extract(path).await {
            Ok(s) => Ok(s),
            Err(e) => {
                if e.kind() == ErrorKind::NotFound {
                    Ok(vec![])
                } else {
                    Err(e)?
                }
            }
        }
    }
}

impl LedgerStorage for LedgerStorageImpl {
    type DayFile = ActivitySpanFile<File>;

    async fn create_or_append(&self, date: NaiveDate) -> Result<Self::DayFile> {
        let file_name = date_to_ledger_name(date);
        let path = self.ledger_dir.join(file_name);

        let v = File::options()
            .write(true)
            .create(true)
            .read(true)
            .truncate(false)
            .open(path)
            .await?;

        Ok(ActivitySpanFile::new(v, date))
    }

    async fn spans_for(&self, date: NaiveDate) -> Result<Vec<ActivitySpanEntity>> {
        let file_name = date_to_ledger_name(date);
        let path = self.ledger_dir.join(file_name);
        let data = self.get_all_inner(&path).await?;
        Ok(data)
    }

    async fn save_session(&self, summary: &SessionSummary) -> Result<PathBuf> {
        let file_name = format!("{}.json", summary.started_at.format("%Y-%m-%dT%H-%M-%S"));
        let path = self.session_dir.join(file_name);
        let json = serde_json::to_vec_pretty(summary)?;
        tokio::fs::write(&path, json).await?;
        Ok(path)
    }
}

pub struct ActivitySpanFile<F> {
    file: F,
    date: NaiveDate,
}

impl<F: AsyncSeek + AsyncRead + AsyncWrite + fs4::tokio::AsyncFileExt + Unpin> DayFileHandle
    for ActivitySpanFile<F>
{
    async fn append(&mut self, marks: Vec<ActivityMark>) -> Result<()> {
        self.append_inner(marks).await
    }

    fn get_date(&self) -> NaiveDate {
        self.date
    }

    async fn flush(&mut self) -> Result<()> {
        Ok(())
    }
}

impl<F: AsyncSeek + AsyncRead + AsyncWrite + fs4::tokio::AsyncFileExt + Unpin> ActivitySpanFile<F> {
    fn new(file: F, date: NaiveDate) -> Self {
        Self { file, date }
    }

    /// Tries to read out the previously written span.
    async fn extract_line_backwards(file: &mut F) -> Result<String, anyhow::Error> {
        seek_previous_line(file, &mut vec![0; 1024]).await?;
        let mut last_line = String::new();
        file.read_to_string(&mut last_line).await?;
        Ok(last_line)
    }

    async fn append_inner(&mut self, marks: Vec<ActivityMark>) -> Result<()> {
        // Semi-safe acquire-release for a file
        self.file.lock_exclusive()?;
        let result = Self::append_with_file(&mut self.file, marks).await;
        self.file.unlock_async().await?;
        result
    }

    async fn append_with_file(file: &mut F, marks: Vec<ActivityMark>) -> Result<()> {
        // The process of appending marks is as such.
        // 1. Get the last span from the file.
        // 2. Collapse the span with the added marks.
        // 3. Overwrite the last span with its updated version and append new spans.

        file.seek(std::io::SeekFrom::End(0)).await?;

        let last_line = Self::extract_line_backwards(file).await?;

        file.seek(std::io::SeekFrom::Current(-(last_line.len() as i64)))
            .await?;

        let last_span: Option<ActivitySpanEntity> = if last_line.is_empty() {
            None
        } else {
            match serde_json::from_str::<ActivitySpanEntity>(&last_line) {
                Ok(v) => Some(v),
                Err(e) => {
                    // Might happen due to shutdown cutting of the write into a file.
                    warn!("Last span was corrupted {e}");
                    None
                }
            }
        };

        let collapsed = collapse_marks(last_span, marks);

        let mut buffer = Vec::<u8>::new();
        for span in collapsed {
            serde_json::to_writer(&mut buffer, &span)?;
            buffer.push(b'\n');
        }

        file.write_all(&buffer).await?;
        file.flush().await?;
        Ok(())
    }
}

/// Largest gap a mark is allowed to bridge. Marks arrive every sampling
/// cycle, so anything beyond this means the daemon was not running and the
/// time in between must not be attributed to the old state.
const MAX_MERGE_DURATION: Duration = Duration::seconds(15);

/// Collapses point-in-time marks into a minimal span sequence. A mark of the
/// same state extends the open span; a state change first extends the old
/// span up to the transition moment so the recorded time has no hole, then
/// starts a new span there.
fn collapse_marks(
    last_span: Option<ActivitySpanEntity>,
    marks: impl IntoIterator<Item = ActivityMark>,
) -> Vec<ActivitySpanEntity> {
    let mut spans = Vec::new();
    if let Some(last) = last_span {
        spans.push(last);
    }

    for mark in marks {
        match spans.last_mut() {
            Some(span)
                if span.state == mark.state && mark.at - span.end() < MAX_MERGE_DURATION =>
            {
                span.set_end(mark.at);
                span.earned += mark.earned;
            }
            Some(previous) if mark.at - previous.end() < MAX_MERGE_DURATION => {
                previous.set_end(mark.at);
                spans.push(mark.into());
            }
            Some(_) | None => {
                spans.push(mark.into());
            }
        }
    }

    spans
}
