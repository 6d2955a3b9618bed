use tokio::io::{AsyncBufRead, AsyncBufReadExt};

/// Read one newline-terminated frame into `buf` (without the terminator).
///
/// Returns `Ok(false)` on a clean end of stream before any frame byte, and an
/// `InvalidData` error once an unterminated line exceeds `max_len` bytes so
/// the caller can drop the connection instead of buffering without bound.
pub async fn read_frame<R>(
    reader: &mut R,
    max_len: usize,
    buf: &mut Vec<u8>,
) -> std::io::Result<bool>
where
    R: AsyncBufRead + Unpin,
{
    buf.clear();

    loop {
        let chunk = reader.fill_buf().await?;
        if chunk.is_empty() {
            // EOF: a partial trailing frame is treated as connection close.
            return Ok(false);
        }

        if let Some(pos) = chunk.iter().position(|&b| b == b'\n') {
            if buf.len() + pos > max_len {
                reader.consume(pos + 1);
                return Err(oversized(max_len));
            }
            buf.extend_from_slice(&chunk[..pos]);
            reader.consume(pos + 1);
            return Ok(true);
        }

        let taken = chunk.len();
        if buf.len() + taken > max_len {
            reader.consume(taken);
            return Err(oversized(max_len));
        }
        buf.extend_from_slice(chunk);
        reader.consume(taken);
    }
}

fn oversized(max_len: usize) -> std::io::Error {
    std::io::Error::new(
        std::io::ErrorKind::InvalidData,
        format!("frame exceeds {max_len} byte line limit"),
    )
}
