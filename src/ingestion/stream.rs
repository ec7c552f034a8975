//! Newline-delimited JSON framing for ingestion sessions
//!
//! Turns a stream of body chunks into a stream of [`MetricEvent`]s, one JSON
//! object per line. Chunk boundaries are arbitrary; a line may span any number
//! of chunks. Blank lines are skipped and a final line without a trailing
//! newline is accepted. End of the body is the session's end-of-input.
//!
//! The first framing or transport error is yielded once and the stream ends.

use crate::error::IngestionError;
use crate::types::MetricEvent;

use bytes::Bytes;
use futures::{future, Stream, StreamExt};
use std::fmt::Display;
use std::io;
use tokio_util::codec::{FramedRead, LinesCodec, LinesCodecError};
use tokio_util::io::StreamReader;

/// Default upper bound on a single NDJSON line
pub const DEFAULT_MAX_LINE_BYTES: usize = 64 * 1024;

/// Frame a byte-chunk body as a stream of events
pub fn ndjson_events<S, E>(
    body: S,
    max_line_bytes: usize,
) -> impl Stream<Item = Result<MetricEvent, IngestionError>>
where
    S: Stream<Item = Result<Bytes, E>>,
    E: Display,
{
    let reader = StreamReader::new(
        body.map(|chunk| chunk.map_err(|e| io::Error::new(io::ErrorKind::Other, e.to_string()))),
    );
    let lines = FramedRead::new(reader, LinesCodec::new_with_max_length(max_line_bytes));

    lines
        .scan(0u64, |line_no, line| {
            *line_no += 1;
            future::ready(Some((*line_no, line)))
        })
        .filter_map(move |(line_no, line)| {
            future::ready(match line {
                Ok(line) => parse_line(line_no, &line),
                Err(e) => Some(Err(framing_error(line_no, max_line_bytes, e))),
            })
        })
        // First error is the last item
        .scan(false, |failed, item| {
            if *failed {
                return future::ready(None);
            }
            *failed = item.is_err();
            future::ready(Some(item))
        })
}

/// Parse one line; `None` for blank lines
fn parse_line(line_no: u64, line: &str) -> Option<Result<MetricEvent, IngestionError>> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }

    Some(serde_json::from_str::<MetricEvent>(line).map_err(|e| {
        IngestionError::Stream(format!("line {}: invalid event: {}", line_no, e))
    }))
}

fn framing_error(line_no: u64, max_line_bytes: usize, err: LinesCodecError) -> IngestionError {
    match err {
        LinesCodecError::MaxLineLengthExceeded => IngestionError::Stream(format!(
            "line {} exceeds {} bytes",
            line_no, max_line_bytes
        )),
        LinesCodecError::Io(e) if e.kind() == io::ErrorKind::InvalidData => {
            IngestionError::Stream(format!("line {}: {}", line_no, e))
        },
        LinesCodecError::Io(e) => IngestionError::Stream(format!(
            "transport failed after line {}: {}",
            line_no - 1,
            e
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream;

    fn chunks(parts: &[&str]) -> impl Stream<Item = Result<Bytes, std::io::Error>> {
        let parts: Vec<_> = parts
            .iter()
            .map(|p| Ok(Bytes::copy_from_slice(p.as_bytes())))
            .collect();
        stream::iter(parts)
    }

    async fn collect(
        parts: &[&str],
        max_line_bytes: usize,
    ) -> Vec<Result<MetricEvent, IngestionError>> {
        ndjson_events(chunks(parts), max_line_bytes).collect().await
    }

    #[tokio::test]
    async fn test_lines_split_across_chunks() {
        let items = collect(
            &[
                r#"{"entity_id":"a","co"#,
                r#"unt":1}"#,
                "\n{\"uid\":\"b\",\"count\":-2}\n",
            ],
            DEFAULT_MAX_LINE_BYTES,
        )
        .await;

        let events: Vec<_> = items.into_iter().map(|r| r.unwrap()).collect();
        assert_eq!(
            events,
            vec![MetricEvent::new("a", 1), MetricEvent::new("b", -2)]
        );
    }

    #[tokio::test]
    async fn test_blank_lines_and_trailing_line() {
        let items = collect(
            &["\n\r\n{\"entity_id\":\"a\",\"count\":1}\r\n\n", "{\"entity_id\":\"a\",\"count\":2}"],
            DEFAULT_MAX_LINE_BYTES,
        )
        .await;

        assert_eq!(items.len(), 2);
        assert_eq!(items[1].as_ref().unwrap().count, 2);
    }

    #[tokio::test]
    async fn test_empty_body_is_empty_session() {
        assert!(collect(&[], DEFAULT_MAX_LINE_BYTES).await.is_empty());
        assert!(collect(&["\n\n  "], DEFAULT_MAX_LINE_BYTES).await.is_empty());
    }

    #[tokio::test]
    async fn test_bad_json_ends_stream() {
        let items = collect(
            &["{\"entity_id\":\"a\",\"count\":1}\nnot json\n{\"entity_id\":\"a\",\"count\":2}\n"],
            DEFAULT_MAX_LINE_BYTES,
        )
        .await;

        assert_eq!(items.len(), 2);
        assert!(items[0].is_ok());
        let err = items[1].as_ref().unwrap_err();
        assert!(err.is_stream_error());
        assert!(err.to_string().contains("line 2"));
    }

    #[tokio::test]
    async fn test_oversize_line_rejected() {
        let long = format!("{{\"entity_id\":\"{}\",\"count\":1}}", "x".repeat(100));

        // Terminated line
        let items = collect(&[&long, "\n"], 32).await;
        assert_eq!(items.len(), 1);
        assert!(items[0].as_ref().unwrap_err().to_string().contains("exceeds 32"));

        // Unterminated line still buffering
        let items = collect(&[&long, &long], 32).await;
        assert_eq!(items.len(), 1);
        assert!(items[0].is_err());
    }

    #[tokio::test]
    async fn test_invalid_utf8_line_rejected() {
        let body = stream::iter(vec![Ok::<_, std::io::Error>(Bytes::from_static(
            b"{\"entity_id\":\"a\",\"count\":1}\n\xff\xfe\n",
        ))]);
        let items: Vec<_> = ndjson_events(body, DEFAULT_MAX_LINE_BYTES).collect().await;

        assert_eq!(items.len(), 2);
        assert!(items[0].is_ok());
        assert!(items[1].as_ref().unwrap_err().to_string().contains("line 2"));
    }

    #[tokio::test]
    async fn test_transport_error_ends_stream() {
        let body = stream::iter(vec![
            Ok(Bytes::from_static(b"{\"entity_id\":\"a\",\"count\":1}\n")),
            Err(std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset")),
            Ok(Bytes::from_static(b"{\"entity_id\":\"a\",\"count\":2}\n")),
        ]);
        let items: Vec<_> = ndjson_events(body, DEFAULT_MAX_LINE_BYTES).collect().await;

        assert_eq!(items.len(), 2);
        assert!(items[1].as_ref().unwrap_err().to_string().contains("reset"));
    }
}
