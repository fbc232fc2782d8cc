use std::{io, str::Utf8Error};

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, Split};

/// Byte that terminates every line on the wire.
pub const TERMINATOR: u8 = b'\n';

/// Splits a buffered reader into wire lines.
///
/// `Split::next_segment` is cancel safe, so the returned source can sit in one
/// arm of a `select!` and be re-armed after the other arm fires without losing
/// a partially received line.
pub fn line_source<R>(reader: R) -> Split<R>
where
    R: AsyncBufRead + Unpin,
{
    reader.split(TERMINATOR)
}

/// Decodes one segment produced by [`line_source`], dropping a trailing `\r`
/// so netcat-style peers sending CRLF behave like everyone else.
pub fn decode_line(segment: &[u8]) -> Result<&str, Utf8Error> {
    let segment = segment.strip_suffix(b"\r").unwrap_or(segment);
    std::str::from_utf8(segment)
}

/// Writes `message` followed by the terminator and flushes.
///
/// Messages may themselves span several physical lines (rendered cows do);
/// the caller owns the writer exclusively, so those lines reach the peer
/// back to back.
pub async fn write_line<W>(writer: &mut W, message: &str) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    let mut encoded = Vec::with_capacity(message.len() + 1);
    encoded.extend_from_slice(message.as_bytes());
    encoded.push(TERMINATOR);
    writer.write_all(&encoded).await?;
    writer.flush().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_strips_carriage_return() {
        assert_eq!(decode_line(b"who\r").expect("valid utf-8"), "who");
        assert_eq!(decode_line(b"who").expect("valid utf-8"), "who");
    }

    #[test]
    fn decode_rejects_invalid_utf8() {
        assert!(decode_line(&[0x77, 0xff, 0x6f]).is_err());
    }

    #[tokio::test]
    async fn lines_survive_the_pipe_in_order() {
        let (mut writer, reader) = tokio::io::duplex(1024);
        let mut lines = line_source(tokio::io::BufReader::new(reader));

        write_line(&mut writer, "first").await.expect("write first");
        write_line(&mut writer, "second").await.expect("write second");
        drop(writer);

        let first = lines.next_segment().await.expect("read").expect("segment");
        let second = lines.next_segment().await.expect("read").expect("segment");
        assert_eq!(decode_line(&first).expect("utf-8"), "first");
        assert_eq!(decode_line(&second).expect("utf-8"), "second");
        assert!(lines.next_segment().await.expect("read").is_none());
    }
}
