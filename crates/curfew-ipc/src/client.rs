//! IPC client implementation

use curfew_api::{Command, Event, Request, Response, ResponseResult};
use std::path::Path;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::UnixStream;
use tracing::trace;

use crate::{IpcError, IpcResult};

/// IPC Client for connecting to curfewd
pub struct IpcClient {
    reader: BufReader<tokio::net::unix::OwnedReadHalf>,
    writer: tokio::net::unix::OwnedWriteHalf,
    next_request_id: u64,
}

impl IpcClient {
    /// Connect to curfewd
    pub async fn connect(socket_path: impl AsRef<Path>) -> IpcResult<Self> {
        let stream = UnixStream::connect(socket_path).await?;
        let (read_half, write_half) = stream.into_split();

        Ok(Self {
            reader: BufReader::new(read_half),
            writer: write_half,
            next_request_id: 1,
        })
    }

    /// Send a command and wait for its response.
    ///
    /// Events that arrive first (the connection may already be subscribed)
    /// are discarded.
    pub async fn send(&mut self, command: Command) -> IpcResult<Response> {
        let request_id = self.next_request_id;
        self.next_request_id += 1;

        let request = Request::new(request_id, command);
        let mut json = serde_json::to_string(&request)?;
        json.push('\n');

        self.writer.write_all(json.as_bytes()).await?;

        let mut line = String::new();
        loop {
            line.clear();
            let n = self.reader.read_line(&mut line).await?;
            if n == 0 {
                return Err(IpcError::ConnectionClosed);
            }

            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            match serde_json::from_str::<Response>(line) {
                Ok(response) if response.request_id == request_id => return Ok(response),
                Ok(response) => {
                    return Err(IpcError::InvalidMessage(format!(
                        "expected response {}, got {}",
                        request_id, response.request_id
                    )));
                }
                Err(_) => {
                    // Events carry no request_id
                    if serde_json::from_str::<Event>(line).is_ok() {
                        trace!("Skipping event while awaiting response");
                        continue;
                    }
                    return Err(IpcError::InvalidMessage(line.to_string()));
                }
            }
        }
    }

    /// Subscribe to events and consume this client to return an event stream
    pub async fn subscribe(mut self) -> IpcResult<EventStream> {
        let response = self.send(Command::SubscribeEvents).await?;

        match response.result {
            ResponseResult::Ok(_) => {}
            ResponseResult::Err(e) => {
                return Err(IpcError::ServerError(e.message));
            }
        }

        Ok(EventStream {
            reader: self.reader,
        })
    }
}

/// Stream of events from curfewd
pub struct EventStream {
    reader: BufReader<tokio::net::unix::OwnedReadHalf>,
}

impl EventStream {
    /// Wait for the next event
    pub async fn next(&mut self) -> IpcResult<Event> {
        let mut line = String::new();
        loop {
            line.clear();
            let n = self.reader.read_line(&mut line).await?;
            if n == 0 {
                return Err(IpcError::ConnectionClosed);
            }
            if !line.trim().is_empty() {
                break;
            }
        }

        let event: Event = serde_json::from_str(line.trim())?;
        Ok(event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;
    use tokio::net::UnixListener;

    #[tokio::test]
    async fn send_skips_interleaved_events() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("fake.sock");
        let listener = UnixListener::bind(&path).unwrap();

        tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let (read_half, mut write_half) = stream.into_split();
            let mut reader = BufReader::new(read_half);
            let mut line = String::new();
            reader.read_line(&mut line).await.unwrap();

            let request: Request = serde_json::from_str(line.trim()).unwrap();
            let event = Event::new(curfew_api::EventPayload::SystemShutdown);
            let response =
                Response::success(request.request_id, curfew_api::ResponsePayload::Pong);

            let mut out = serde_json::to_string(&event).unwrap();
            out.push('\n');
            out.push_str(&serde_json::to_string(&response).unwrap());
            out.push('\n');
            write_half.write_all(out.as_bytes()).await.unwrap();
        });

        let mut client = IpcClient::connect(&path).await.unwrap();
        let response = client.send(Command::Ping).await.unwrap();
        assert_eq!(response.request_id, 1);
        assert!(matches!(
            response.result,
            ResponseResult::Ok(curfew_api::ResponsePayload::Pong)
        ));
    }

    #[tokio::test]
    async fn closed_connection_is_reported() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("closed.sock");
        let listener = UnixListener::bind(&path).unwrap();

        tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            drop(stream);
        });

        let mut client = IpcClient::connect(&path).await.unwrap();
        assert!(matches!(
            client.send(Command::Ping).await,
            Err(IpcError::ConnectionClosed) | Err(IpcError::Io(_))
        ));
    }
}
