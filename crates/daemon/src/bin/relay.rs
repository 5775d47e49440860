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

//! `relay`: tunnels DPP/PKEX action frames between an over-the-air peer and a wired Controller
//! (§1, §4.7). Does not take `-p`/`-c`/`-e` (§6): the Relay carries no cryptographic state of its
//! own, it only demultiplexes by MAC/bootstrap-key-hash and forwards bytes.
//!
//! Correlation (§4.7): an inbound `AUTH_REQ` from the air with no matching client state opens a
//! new TCP connection to the Controller and enrolls a `ClientState`; an inbound `AUTH_RESP` or
//! `PKEX_RESP` matches either by exact peer MAC or, while the recorded peer is still broadcast, by
//! the frame's bootstrap-key-hash TLV, rewriting broadcast to the sender on that match. The
//! Controller may also dial in: a `TcpListener` on `CONTROLLER_PORT` accepts inbound connections
//! and reads their `wired_control` preamble before the connection's `ClientState` is created,
//! matching the ordering `protocol::relay_framing` documents for that message.
//!
//! GAS fragmentation (§4.5) is entirely this role's responsibility: the Controller only ever hands
//! the Relay one logical Configuration payload as a non-deferred `GAS_INITIAL_RESPONSE`; if it's
//! larger than the air MTU, this binary fragments it with `ClientState::begin_fragmentation` and
//! answers subsequent `GAS_COMEBACK_REQUEST`s locally rather than round-tripping them to the wire.

use base::mac::MacAddr;
use clap::Parser;
use core_dpp::client_state::{ClientState, DEFAULT_TIMEOUT_SECS};
use daemon::config::{Config, DEFAULT_CHANNEL, DEFAULT_OPCLASS};
use daemon::relay_clients::{RelayClient, RelayClients};
use protocol::gas::parse_gas_initial_response;
use protocol::oui::{ActionField, FrameType};
use protocol::relay_framing::{RelayMessage, WiredControl};
use protocol::tlv;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use transport::loopback::LoopbackIo;
use transport::tcp::{TcpTunnelError, TcpTunnelIo, TcpTunnelReader};

#[derive(Parser, Debug)]
#[command(name = "relay", about = "Over-the-air <-> wired-controller DPP tunnel")]
struct Args {
  /// `-I`
  #[arg(short = 'I', long = "iface")]
  iface: String,
  /// `-B`
  #[arg(short = 'B', long = "bootstrap-file")]
  bootstrap_file: PathBuf,
  /// `-g`
  #[arg(short = 'g', long = "opclass", default_value_t = DEFAULT_OPCLASS)]
  opclass: u8,
  /// `-f`
  #[arg(short = 'f', long = "channel", default_value_t = DEFAULT_CHANNEL)]
  channel: u8,
  /// `-C`: the Controller's dial address (§6: "dial address" for the Relay).
  #[arg(short = 'C', long = "controller")]
  controller: String,
}

fn main() -> ExitCode {
  daemon::logging::init();
  let args = Args::parse();
  let config = Config {
    iface: args.iface,
    bootstrap_file: args.bootstrap_file,
    keyfile: None,
    sign_key: None,
    enrollee_role: None,
    is_initiator: false,
    mutual_auth: true,
    password: None,
    identifier: None,
    key_index: None,
    peer_mac: None,
    opclass: args.opclass,
    channel: args.channel,
    chirp: false,
    quit_at_fin: false,
    controller_addr: Some(args.controller),
    dpp_version: daemon::config::DEFAULT_DPP_VERSION,
  };
  if let Err(e) = config.validate() {
    log::error!("configuration error: {e}");
    return ExitCode::from(1);
  }

  let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
    Ok(rt) => rt,
    Err(e) => {
      log::error!("failed to start runtime: {e}");
      return ExitCode::from(1);
    }
  };
  runtime.block_on(run(config))
}

/// A message read off one Controller TCP connection, tagged with the stable `id` of the
/// `RelayClient` a spawned reader task read it from (§4.7's note on `RelayClients::next_id`).
type WiredEvent = (u64, Result<RelayMessage, TcpTunnelError>);

async fn run(config: Config) -> ExitCode {
  let my_mac = MacAddr::random_local();
  let io = match LoopbackIo::bind(my_mac).await {
    Ok(io) => io,
    Err(e) => {
      log::error!("failed to bind {}: {e}", config.iface);
      return ExitCode::from(1);
    }
  };
  let listener = match TcpListener::bind(("0.0.0.0", transport::tcp::CONTROLLER_PORT)).await {
    Ok(l) => l,
    Err(e) => {
      log::error!("failed to listen on controller port: {e}");
      return ExitCode::from(1);
    }
  };
  log::info!(
    "relay up on {} ({my_mac}), dialing controller at {:?}, listening for controller dial-in on {}",
    config.iface,
    config.controller_addr,
    transport::tcp::CONTROLLER_PORT,
  );

  let mtu = protocol::gas::MTU_NL80211;
  let mut clients = RelayClients::new();
  let mut sweep = tokio::time::interval(Duration::from_secs(1));
  let (wired_tx, mut wired_rx) = mpsc::channel::<WiredEvent>(256);

  loop {
    tokio::select! {
      frame = io.recv_frame() => {
        let frame = match frame {
          Ok(f) => f,
          Err(e) => { log::warn!("relay: recv error: {e}"); continue; }
        };
        if frame.is_beacon {
          continue;
        }
        if let Err(e) = handle_air_frame(&config, &io, my_mac, frame, &mut clients, &wired_tx).await {
          log::warn!("relay: {e}");
        }
      }
      accepted = listener.accept() => {
        match accepted {
          Ok((stream, peer)) => {
            if let Err(e) = accept_controller_connection(stream, my_mac, &mut clients, &wired_tx).await {
              log::warn!("relay: controller dial-in from {peer} failed: {e}");
            }
          }
          Err(e) => log::warn!("relay: accept error: {e}"),
        }
      }
      Some((id, msg)) = wired_rx.recv() => {
        if let Err(e) = handle_wired_message(&io, my_mac, mtu, id, msg, &mut clients).await {
          log::warn!("relay: {e}");
        }
      }
      _ = sweep.tick() => {
        for expired in clients.drain_expired(DEFAULT_TIMEOUT_SECS) {
          log::debug!("relay: client {} timed out", expired.state.peer_mac);
        }
      }
      _ = tokio::signal::ctrl_c() => {
        log::info!("relay shutting down on signal");
        return ExitCode::from(0);
      }
    }
  }
}

/// A connection the Controller dialed in on: the `wired_control` preamble must be read in full
/// before the resulting `ClientState` exists, since it's what supplies the peer MAC the state is
/// keyed on (§4.7).
async fn accept_controller_connection(
  stream: tokio::net::TcpStream,
  my_mac: MacAddr,
  clients: &mut RelayClients,
  wired_tx: &mpsc::Sender<WiredEvent>,
) -> anyhow::Result<()> {
  let mut io = TcpTunnelIo::new(stream);
  let control = match io.recv_message().await? {
    RelayMessage::WiredControl(c) => c,
    RelayMessage::ActionFrame { .. } => {
      anyhow::bail!("controller dial-in did not begin with a wired_control preamble");
    }
  };
  let (reader, writer) = io.into_split();
  let id = clients.next_id();
  clients.insert(RelayClient {
    id,
    tcp: writer,
    state: ClientState::new(control.peer_mac, my_mac, [0u8; 32]),
  });
  spawn_reader(id, reader, wired_tx.clone());
  Ok(())
}

fn spawn_reader(id: u64, mut reader: TcpTunnelReader, tx: mpsc::Sender<WiredEvent>) {
  tokio::spawn(async move {
    loop {
      let msg = reader.recv_message().await;
      let closed = matches!(msg, Err(TcpTunnelError::Closed));
      if tx.send((id, msg)).await.is_err() {
        return;
      }
      if closed {
        return;
      }
    }
  });
}

async fn handle_air_frame(
  config: &Config,
  io: &LoopbackIo,
  my_mac: MacAddr,
  frame: transport::RecvFrame,
  clients: &mut RelayClients,
  wired_tx: &mpsc::Sender<WiredEvent>,
) -> anyhow::Result<()> {
  if !matches!(frame.field, ActionField::Vendor) {
    // GAS fields are routed by exact peer MAC alone once a client state exists; a Comeback
    // Request against a client mid-fragmentation is answered locally (§4.5) instead of crossing
    // the wire, since the Relay itself holds the queued fragments.
    let Some(client) = clients.find_by_peer_mac(frame.src) else {
      return Ok(());
    };
    client.state.touch();
    if matches!(frame.field, ActionField::GasComebackRequest) && client.state.is_fragmenting() {
      let response = client.state.next_comeback_response()?;
      io.send_action_frame(my_mac, frame.src, ActionField::GasComebackResponse, &response).await?;
      return Ok(());
    }
    if client.state.is_fragmenting() {
      log::warn!("relay: dropping {:?} from {} mid-fragmentation", frame.field, frame.src);
      return Ok(());
    }
    client.tcp.send_action_frame(frame.field.into(), &frame.payload).await?;
    return Ok(());
  }

  let Some((&frame_type_byte, attrs)) = frame.payload.split_first() else {
    return Ok(());
  };
  let Some(frame_type) = FrameType::from_byte(frame_type_byte) else {
    return Ok(());
  };

  match frame_type {
    FrameType::AuthRequest => {
      if let Some(client) = clients.find_by_peer_mac(frame.src) {
        client.state.touch();
        client.tcp.send_action_frame(frame.field.into(), &frame.payload).await?;
        return Ok(());
      }
      let bkhash = tlv::bootstrap_key_hash(attrs).unwrap_or([0u8; 32]);
      open_gratuitous_client(config, my_mac, frame.src, bkhash, frame.field.into(), &frame.payload, clients, wired_tx).await
    }
    FrameType::AuthResponse | FrameType::PkexExchResponse => {
      let bkhash = tlv::bootstrap_key_hash(attrs).unwrap_or([0u8; 32]);
      let Some(client) = clients.find_by_mac_or_bkhash(frame.src, &bkhash) else {
        log::info!("relay: no client state for {frame_type:?} from {}", frame.src);
        return Ok(());
      };
      client.state.touch();
      client.tcp.send_action_frame(frame.field.into(), &frame.payload).await
        .map_err(anyhow::Error::from)
    }
    _ => {
      let Some(client) = clients.find_by_peer_mac(frame.src) else {
        log::info!("relay: no client state for {frame_type:?} from {}", frame.src);
        return Ok(());
      };
      client.state.touch();
      client.tcp.send_action_frame(frame.field.into(), &frame.payload).await
        .map_err(anyhow::Error::from)
    }
  }
}

async fn open_gratuitous_client(
  config: &Config,
  my_mac: MacAddr,
  peer_mac: MacAddr,
  bkhash: [u8; 32],
  field: u8,
  body: &[u8],
  clients: &mut RelayClients,
  wired_tx: &mpsc::Sender<WiredEvent>,
) -> anyhow::Result<()> {
  let Some(controller_addr) = &config.controller_addr else {
    anyhow::bail!("no controller address configured");
  };
  let (host, port) = split_host_port(controller_addr);
  let mut tcp = TcpTunnelIo::connect(&host, port).await?;
  tcp
    .send_wired_control(&WiredControl {
      peer_mac,
      opclass: config.opclass,
      channel: config.channel,
    })
    .await?;
  tcp.send_action_frame(field, body).await?;
  let (reader, writer) = tcp.into_split();
  let state = ClientState::new(peer_mac, my_mac, bkhash);
  let id = clients.next_id();
  clients.insert(RelayClient { id, tcp: writer, state });
  spawn_reader(id, reader, wired_tx.clone());
  Ok(())
}

/// Dispatch one message read from a Controller connection (§4.7). A non-deferred
/// `GAS_INITIAL_RESPONSE` larger than the air MTU is fragmented here and only the deferred
/// Initial Response crosses the air immediately; everything else is forwarded byte-for-byte.
async fn handle_wired_message(
  io: &LoopbackIo,
  my_mac: MacAddr,
  mtu: usize,
  id: u64,
  msg: Result<RelayMessage, TcpTunnelError>,
  clients: &mut RelayClients,
) -> anyhow::Result<()> {
  let msg = match msg {
    Ok(m) => m,
    Err(TcpTunnelError::Closed) => {
      if let Some(client) = clients.find_by_id(id) {
        log::debug!("relay: controller connection for {} closed", client.state.peer_mac);
      }
      clients.remove_by_id(id);
      return Ok(());
    }
    Err(e) => anyhow::bail!("controller connection {id}: {e}"),
  };

  let Some(client) = clients.find_by_id(id) else {
    log::debug!("relay: message for unknown controller connection {id}");
    return Ok(());
  };
  client.state.touch();
  let peer = client.state.peer_mac;

  match msg {
    RelayMessage::WiredControl(_) => {
      log::warn!("relay: unexpected second wired_control from controller connection {id}");
      Ok(())
    }
    RelayMessage::ActionFrame { field, body } if field == u8::from(ActionField::GasInitialResponse) => {
      let parsed = parse_gas_initial_response(&body)?;
      if parsed.query_resp.len() > mtu {
        let deferred = client.state.begin_fragmentation(parsed.header, &parsed.query_resp, mtu)?;
        io.send_action_frame(my_mac, peer, ActionField::GasInitialResponse, &deferred).await?;
      } else {
        io.send_action_frame(my_mac, peer, ActionField::GasInitialResponse, &body).await?;
      }
      Ok(())
    }
    RelayMessage::ActionFrame { field, body } if field == u8::from(ActionField::Vendor) => {
      // §4.7/§8 "Relay correlation": a Controller-originated AUTH_REQ or PKEX_EXCH_REQ still
      // addressed to a broadcast peer carries the `Br`/Identifier TLV that a later unicast
      // AUTH_RESP or PKEX_RESP from the air will echo back; record it now so
      // `find_by_mac_or_bkhash` has something to match against when that response arrives.
      if peer.is_broadcast() {
        if let Some((&frame_type_byte, attrs)) = body.split_first() {
          if matches!(
            FrameType::from_byte(frame_type_byte),
            Some(FrameType::AuthRequest | FrameType::PkexExchRequest | FrameType::PkexExchV1Request)
          ) {
            if let Some(hash) = tlv::bootstrap_key_hash(attrs) {
              client.state.bkhash = hash;
            }
          }
        }
      }
      io.send_action_frame(my_mac, peer, ActionField::Vendor, &body).await?;
      Ok(())
    }
    RelayMessage::ActionFrame { field, body } => {
      io.send_action_frame(my_mac, peer, ActionField::from(field), &body).await?;
      Ok(())
    }
  }
}

fn split_host_port(addr: &str) -> (String, u16) {
  match addr.rsplit_once(':') {
    Some((host, port)) => (host.to_string(), port.parse().unwrap_or(transport::tcp::RELAY_PORT)),
    None => (addr.to_string(), transport::tcp::RELAY_PORT),
  }
}
