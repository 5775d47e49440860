/*
 * Copyright (c) 2024 Elide Technologies, Inc.
 *
 * Licensed under the MIT license (the "License"); you may not use this file except in compliance
 * with the License. You may obtain a copy of the License at
 *
 *   https://opensource.org/license/mit/
 *
 * Unless required by applicable law or agreed to in writing, software distributed under the License is distributed on
 * an "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied. See the
 * License for the specific language governing permissions and limitations under the License.
 */

//! The Relay↔Controller TCP tunnel transport (§4.7): one `TcpTunnelIo` wraps one `TcpStream` and
//! speaks the length-prefixed framing in `protocol::relay_framing`. Default ports per §6: 8741
//! inbound (controller listens for relays), 8908 outbound (relay connects to controller).

use protocol::relay_framing::{
  check_length, decode_message, frame as frame_message, read_length_prefix, RelayMessage, WiredControl,
  LENGTH_PREFIX_BYTES,
};
use thiserror::Error;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;

/// Default controller-listening port (controller -> relay direction per §6).
pub const CONTROLLER_PORT: u16 = 8741;
/// Default relay-outbound port (relay -> controller direction per §6).
pub const RELAY_PORT: u16 = 8908;

/// Ceiling on a single tunnelled message, generous enough for one un-fragmented Configuration
/// payload (127 * 1400, the §4.5 cap) plus header overhead.
const MAX_MESSAGE_BYTES: u32 = 127 * 1400 + 256;

#[derive(Debug, Error)]
pub enum TcpTunnelError {
  #[error("connection closed")]
  Closed,
  #[error(transparent)]
  Io(#[from] std::io::Error),
  #[error(transparent)]
  Framing(#[from] protocol::relay_framing::RelayFramingError),
}

pub struct TcpTunnelIo {
  stream: TcpStream,
}

impl TcpTunnelIo {
  pub fn new(stream: TcpStream) -> TcpTunnelIo {
    TcpTunnelIo { stream }
  }

  pub async fn connect(addr: &str, port: u16) -> Result<TcpTunnelIo, TcpTunnelError> {
    let stream = TcpStream::connect((addr, port)).await?;
    Ok(TcpTunnelIo { stream })
  }

  pub async fn send_action_frame(&mut self, field: u8, body: &[u8]) -> Result<(), TcpTunnelError> {
    let framed = protocol::relay_framing::encode_action_frame(field, body);
    self.stream.write_all(&framed).await?;
    Ok(())
  }

  pub async fn send_wired_control(
    &mut self,
    control: &protocol::relay_framing::WiredControl,
  ) -> Result<(), TcpTunnelError> {
    let framed = protocol::relay_framing::encode_wired_control(control);
    self.stream.write_all(&framed).await?;
    Ok(())
  }

  /// Read one length-prefixed message off the wire; `Err(Closed)` once the peer has hung up
  /// cleanly (the caller tears down the associated client state, §3 Client state lifecycle).
  pub async fn recv_message(&mut self) -> Result<RelayMessage, TcpTunnelError> {
    let mut len_buf = [0u8; LENGTH_PREFIX_BYTES];
    let read = self.stream.read_exact(&mut len_buf).await;
    match read {
      Ok(_) => {}
      Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Err(TcpTunnelError::Closed),
      Err(e) => return Err(e.into()),
    }
    let declared = read_length_prefix(&len_buf).expect("4 bytes always parse");
    check_length(declared, MAX_MESSAGE_BYTES)?;
    let mut payload = vec![0u8; declared as usize];
    self.stream.read_exact(&mut payload).await?;
    Ok(decode_message(&payload)?)
  }

  /// Used only for test fixtures and logging; production code routes by client state.
  pub fn peer_addr(&self) -> std::io::Result<std::net::SocketAddr> {
    self.stream.peer_addr()
  }

  pub async fn shutdown(&mut self) -> std::io::Result<()> {
    self.stream.shutdown().await
  }

  /// Split into independently ownable halves so a reader task (controller -> air direction) and
  /// the owning client-state table (air -> controller direction, §4.7) don't have to share one
  /// `&mut TcpTunnelIo` across an `.await` point.
  pub fn into_split(self) -> (TcpTunnelReader, TcpTunnelWriter) {
    let (read, write) = self.stream.into_split();
    (TcpTunnelReader { read }, TcpTunnelWriter { write })
  }
}

pub struct TcpTunnelReader {
  read: OwnedReadHalf,
}

impl TcpTunnelReader {
  pub async fn recv_message(&mut self) -> Result<RelayMessage, TcpTunnelError> {
    let mut len_buf = [0u8; LENGTH_PREFIX_BYTES];
    let read = self.read.read_exact(&mut len_buf).await;
    match read {
      Ok(_) => {}
      Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Err(TcpTunnelError::Closed),
      Err(e) => return Err(e.into()),
    }
    let declared = read_length_prefix(&len_buf).expect("4 bytes always parse");
    check_length(declared, MAX_MESSAGE_BYTES)?;
    let mut payload = vec![0u8; declared as usize];
    self.read.read_exact(&mut payload).await?;
    Ok(decode_message(&payload)?)
  }
}

pub struct TcpTunnelWriter {
  write: OwnedWriteHalf,
}

impl TcpTunnelWriter {
  pub async fn send_action_frame(&mut self, field: u8, body: &[u8]) -> Result<(), TcpTunnelError> {
    let framed = protocol::relay_framing::encode_action_frame(field, body);
    self.write.write_all(&framed).await?;
    Ok(())
  }

  pub async fn send_wired_control(&mut self, control: &WiredControl) -> Result<(), TcpTunnelError> {
    let framed = protocol::relay_framing::encode_wired_control(control);
    self.write.write_all(&framed).await?;
    Ok(())
  }

  pub async fn shutdown(&mut self) -> std::io::Result<()> {
    self.write.shutdown().await
  }
}

/// Re-exported so callers that only want to build a framed message without owning a socket (e.g.
/// queuing it for a not-yet-connected client state) can do so.
pub fn encode_frame(payload: &[u8]) -> Vec<u8> {
  frame_message(payload)
}
