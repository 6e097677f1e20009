//! Websocket implementation of the streaming analysis channel.

use async_trait::async_trait;
use futures::{
    stream::{self, SplitSink, SplitStream},
    SinkExt, StreamExt,
};
use serde::Deserialize;
use shared::protocol::{StudioJobRequest, StudioUpdate};
use tokio::net::TcpStream;
use tokio_tungstenite::{
    connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream,
};
use tracing::{debug, info, warn};

use crate::{
    backend::{AnalysisStreamConnector, UpdateStream},
    error::{PipelineError, PipelineResult},
};

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

pub struct WsAnalysisConnector {
    ws_url: String,
}

impl WsAnalysisConnector {
    pub fn new(ws_url: impl Into<String>) -> Self {
        Self {
            ws_url: ws_url.into(),
        }
    }
}

/// Bare `{ "error": ... }` frame the server sends when it rejects the
/// initiation message outright.
#[derive(Deserialize)]
struct RejectionFrame {
    error: String,
}

pub(crate) fn decode_update(text: &str) -> PipelineResult<StudioUpdate> {
    match serde_json::from_str::<StudioUpdate>(text) {
        Ok(update) => Ok(update),
        Err(err) => match serde_json::from_str::<RejectionFrame>(text) {
            Ok(rejection) => Ok(StudioUpdate::Error {
                message: rejection.error,
            }),
            Err(_) => Err(PipelineError::from(err)),
        },
    }
}

struct ChannelState {
    // Held so the socket stays open for as long as the stream lives.
    _writer: SplitSink<Socket, Message>,
    reader: SplitStream<Socket>,
    finished: bool,
}

async fn next_update(
    mut state: ChannelState,
) -> Option<(PipelineResult<StudioUpdate>, ChannelState)> {
    if state.finished {
        return None;
    }
    loop {
        let frame = match state.reader.next().await {
            Some(Ok(frame)) => frame,
            Some(Err(err)) => {
                warn!(error = %err, "analysis channel receive failed");
                state.finished = true;
                return Some((Err(PipelineError::from(err)), state));
            }
            None => return None,
        };
        match frame {
            Message::Text(text) => {
                let update = decode_update(&text);
                if update.as_ref().map(StudioUpdate::is_terminal).unwrap_or(true) {
                    state.finished = true;
                }
                return Some((update, state));
            }
            Message::Close(frame) => {
                debug!(?frame, "analysis channel closed by server");
                return None;
            }
            _ => continue,
        }
    }
}

#[async_trait]
impl AnalysisStreamConnector for WsAnalysisConnector {
    async fn open(&self, request: StudioJobRequest) -> PipelineResult<UpdateStream> {
        let (socket, _) = connect_async(self.ws_url.as_str()).await?;
        let (mut writer, reader) = socket.split();
        let initiation = serde_json::to_string(&request)?;
        writer.send(Message::Text(initiation)).await?;
        info!(
            ws_url = %self.ws_url,
            url = %request.url,
            duration_minutes = request.duration_minutes,
            language = %request.language,
            "analysis channel opened"
        );

        let state = ChannelState {
            _writer: writer,
            reader,
            finished: false,
        };
        Ok(stream::unfold(state, next_update).boxed())
    }
}

#[cfg(test)]
#[path = "tests/transport_tests.rs"]
mod tests;
