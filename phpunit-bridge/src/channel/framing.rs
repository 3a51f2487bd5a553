// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! LSP base-protocol framing: a `Content-Length` header block followed by a JSON body.

use crate::errors::ChannelError;
use serde_json::Value;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWrite, AsyncWriteExt};

const CONTENT_LENGTH: &str = "content-length";

/// The largest message body accepted from the server.
const MAX_CONTENT_LENGTH: usize = 64 * 1024 * 1024;

/// Reads one framed message. Returns `Ok(None)` on a clean end of stream between messages.
///
/// A body that isn't valid JSON is consumed in full before [`ChannelError::Serialize`] is
/// returned, so the stream stays aligned on the next frame. Every other error leaves the
/// stream in an unknown position.
pub(super) async fn read_message<R>(reader: &mut R) -> Result<Option<Value>, ChannelError>
where
    R: AsyncBufRead + Unpin,
{
    let mut content_length = None;
    let mut line = String::new();
    let mut seen_header = false;

    loop {
        line.clear();
        let n = reader
            .read_line(&mut line)
            .await
            .map_err(ChannelError::Io)?;
        if n == 0 {
            if seen_header {
                return Err(ChannelError::protocol("stream ended inside a header block"));
            }
            return Ok(None);
        }

        let header = line.trim_end_matches(['\r', '\n']);
        if header.is_empty() {
            if seen_header {
                break;
            }
            // Tolerate blank lines between messages.
            continue;
        }
        seen_header = true;

        let Some((name, value)) = header.split_once(':') else {
            return Err(ChannelError::protocol(format!(
                "malformed header line `{header}`"
            )));
        };
        if name.trim().eq_ignore_ascii_case(CONTENT_LENGTH) {
            let len = value.trim().parse::<usize>().map_err(|_| {
                ChannelError::protocol(format!("invalid Content-Length `{}`", value.trim()))
            })?;
            content_length = Some(len);
        }
    }

    let len = content_length
        .ok_or_else(|| ChannelError::protocol("header block without Content-Length"))?;
    if len > MAX_CONTENT_LENGTH {
        return Err(ChannelError::protocol(format!(
            "Content-Length {len} exceeds the limit of {MAX_CONTENT_LENGTH} bytes"
        )));
    }
    let mut body = vec![0; len];
    reader
        .read_exact(&mut body)
        .await
        .map_err(ChannelError::Io)?;
    serde_json::from_slice(&body)
        .map(Some)
        .map_err(ChannelError::Serialize)
}

/// Writes one framed message and flushes the writer.
pub(super) async fn write_message<W>(writer: &mut W, message: &Value) -> Result<(), ChannelError>
where
    W: AsyncWrite + Unpin,
{
    let body = serde_json::to_vec(message).map_err(ChannelError::Serialize)?;
    let header = format!("Content-Length: {}\r\n\r\n", body.len());
    writer
        .write_all(header.as_bytes())
        .await
        .map_err(ChannelError::Io)?;
    writer.write_all(&body).await.map_err(ChannelError::Io)?;
    writer.flush().await.map_err(ChannelError::Io)
}
