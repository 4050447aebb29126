use tokio::io::{self, AsyncRead, AsyncReadExt, AsyncSeek, AsyncSeekExt};

/// Moves the cursor back to the start of the previous line. The ledger
/// appender uses this to overwrite the last span instead of duplicating it.
///
/// The cursor is expected to sit on a line boundary, usually the end of the
/// file; the newline directly before it is skipped so the scan does not get
/// stuck on its own terminator.
pub async fn seek_previous_line(
    file: &mut (impl AsyncSeek + AsyncRead + Unpin),
    chunk: &mut [u8],
) -> Result<(), io::Error> {
    let mut skip_terminator = 1usize;
    loop {
        let position = file.stream_position().await?;
        if position == 0 {
            return Ok(());
        }

        let len = u64::min(position, chunk.len() as u64) as usize;
        file.seek(std::io::SeekFrom::Current(-(len as i64))).await?;
        file.read_exact(&mut chunk[..len]).await?;

        let searched = len.saturating_sub(skip_terminator);
        if let Some(at) = chunk[..searched].iter().rposition(|b| *b == b'\n') {
            // The line starts right after the newline found at `at`.
            let back = (len - 1 - at) as i64;
            file.seek(std::io::SeekFrom::Current(-back)).await?;
            return Ok(());
        }

        skip_terminator = 0;
        file.seek(std::io::SeekFrom::Current(-(len as i64))).await?;
    }
}
