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

//! `controller`: the wired DPP terminator (§1, §4.7). Takes the same flag set as `sss` (§6) since
//! it may act as either Configurator or Enrollee, but never opens a radio interface of its own —
//! every DPP/PKEX frame it sees arrives already stripped to an action-frame body over a Relay TCP
//! connection, and `-C` here means the address this binary *listens* on rather than dials.
//!
//! One `Demultiplexer<StubEngine>` serves every Relay connection: its Session Registry is already
//! keyed by `(my_mac, peer_mac)`, so frames arriving over distinct TCP connections (distinct
//! over-the-air peers) never collide as long as each is fed with the controller's one fixed
//! logical `my_mac`. `RelayClients` — the bookkeeping module shared with `relay.rs` — tracks one
//! TCP connection per peer for timeout purposes; this binary never fragments (§4.5: that's the
//! Relay's job alone), so its `ClientState`s never enter `is_fragmenting()`.

use base::mac::MacAddr;
use clap::Parser;
use core_dpp::client_state::{ClientState, DEFAULT_TIMEOUT_SECS};
use core_dpp::demux::Demultiplexer;
use core_dpp::testing::StubEngine;
use daemon::config::{Config, EnrolleeRole, DEFAULT_CHANNEL, DEFAULT_DPP_VERSION, DEFAULT_OPCLASS};
use daemon::relay_clients::{RelayClient, RelayClients};
use protocol::oui::ActionField;
use protocol::relay_framing::RelayMessage;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use transport::tcp::{TcpTunnelError, TcpTunnelIo, TcpTunnelReader};

#[derive(Parser, Debug)]
#[command(name = "controller", about = "Wired DPP/PKEX terminator")]
struct Args {
  /// `-I`: logical interface name, used only for logging (no radio is opened, §1).
  #[arg(short = 'I', long = "iface")]
  iface: String,
  /// `-B`
  #[arg(short = 'B', long = "bootstrap-file")]
  bootstrap_file: PathBuf,
  /// `-k`
  #[arg(short = 'k', long = "keyfile")]
  keyfile: Option<PathBuf>,
  /// `-c`: configurator sign-key; mutually exclusive with `-e`.
  #[arg(short = 'c', long = "sign-key")]
  sign_key: Option<PathBuf>,
  /// `-e`: enrollee sub-role, `sta` or `ap`.
  #[arg(short = 'e', long = "enrollee-role")]
  role: Option<EnrolleeRole>,
  /// `-i`: act as DPP initiator.
  #[arg(short = 'i', long = "initiator")]
  initiator: bool,
  /// `-r`: act as DPP responder (explicit form of the default).
  #[arg(short = 'r', long = "responder")]
  responder: bool,
  /// `-a`: disable mutual authentication.
  #[arg(short = 'a', long = "no-mutual-auth")]
  no_mutual_auth: bool,
  /// `-p`: PKEX password.
  #[arg(short = 'p', long = "password")]
  password: Option<String>,
  /// `-n`: PKEX identifier.
  #[arg(short = 'n', long = "identifier")]
  identifier: Option<String>,
  /// `-x`: bootstrap key index for a file-based PKEX peer lookup.
  #[arg(short = 'x', long = "key-index")]
  key_index: Option<u32>,
  /// `-m`: override the peer MAC instead of broadcasting.
  #[arg(short = 'm', long = "peer-mac")]
  peer_mac: Option<MacAddr>,
  /// `-g`: operating class, recorded only for parity with the other roles' flag set.
  #[arg(short = 'g', long = "opclass", default_value_t = DEFAULT_OPCLASS)]
  opclass: u8,
  /// `-f`: channel, recorded only for parity with the other roles' flag set.
  #[arg(short = 'f', long = "channel", default_value_t = DEFAULT_CHANNEL)]
  channel: u8,
  /// `-t`: advertise via Chirp instead of waiting passively.
  #[arg(short = 't', long = "chirp")]
  chirp: bool,
  /// `-q`: exit once the DPP exchange reaches a terminal state.
  #[arg(short = 'q', long = "quit-at-fin")]
  quit_at_fin: bool,
  /// `-v`: DPP protocol version.
  #[arg(short = 'v', long = "dpp-version", default_value_t = DEFAULT_DPP_VERSION)]
  dpp_version: u8,
  /// `-C`: the address this binary listens on for Relay connections (§6: "listen address" for
  /// the Controller, as opposed to the Relay's "dial address").
  #[arg(short = 'C', long = "listen")]
  listen: String,
}

impl From<Args> for Config {
  fn from(args: Args) -> Config {
    Config {
      iface: args.iface,
      bootstrap_file: args.bootstrap_file,
      keyfile: args.keyfile,
      sign_key: args.sign_key,
      enrollee_role: args.role,
      is_initiator: args.initiator || !args.responder,
      mutual_auth: !args.no_mutual_auth,
      password: args.password,
      identifier: args.identifier,
      key_index: args.key_index,
      peer_mac: args.peer_mac,
      opclass: args.opclass,
      channel: args.channel,
      chirp: args.chirp,
      quit_at_fin: args.quit_at_fin,
      controller_addr: Some(args.listen),
      dpp_version: args.dpp_version,
    }
  }
}

fn main() -> ExitCode {
  daemon::logging::init();
  let args = Args::parse();
  let config: Config = args.into();
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

type WiredEvent = (u64, Result<RelayMessage, TcpTunnelError>);

async fn run(config: Config) -> ExitCode {
  let Some(listen_addr) = &config.controller_addr else {
    log::error!("configuration error: -C (listen address) is required");
    return ExitCode::from(1);
  };
  let (host, port) = split_host_port(listen_addr);
  let listener = match TcpListener::bind((host.as_str(), port)).await {
    Ok(l) => l,
    Err(e) => {
      log::error!("failed to listen on {host}:{port}: {e}");
      return ExitCode::from(1);
    }
  };

  let my_mac = MacAddr::random_local();
  let mtu = protocol::gas::MTU_NL80211;
  let mut demux = Demultiplexer::new(
    StubEngine::new(),
    config.bootstrap_file.clone(),
    None,
    mtu,
    daemon::config::DEFAULT_PKEX_VERSION,
  );
  log::info!("controller up on {} ({my_mac}), listening on {host}:{port}", config.iface);

  let mut clients = RelayClients::new();
  let mut sweep = tokio::time::interval(Duration::from_secs(1));
  let (wired_tx, mut wired_rx) = mpsc::channel::<WiredEvent>(256);

  loop {
    tokio::select! {
      accepted = listener.accept() => {
        match accepted {
          Ok((stream, peer)) => {
            if let Err(e) = accept_relay_connection(stream, my_mac, &mut clients, &wired_tx).await {
              log::warn!("controller: relay dial-in from {peer} failed: {e}");
            }
          }
          Err(e) => log::warn!("controller: accept error: {e}"),
        }
      }
      Some((id, msg)) = wired_rx.recv() => {
        handle_wired_message(&mut demux, my_mac, id, msg, &mut clients);
      }
      _ = sweep.tick() => {
        for expired in clients.drain_expired(DEFAULT_TIMEOUT_SECS) {
          log::debug!("controller: relay connection for {} timed out", expired.state.peer_mac);
        }
      }
      _ = tokio::signal::ctrl_c() => {
        log::info!("controller shutting down on signal");
        return ExitCode::from(0);
      }
    }
  }
}

/// A Relay dialing in gratuitously (§4.7): its `wired_control` preamble names the over-the-air
/// peer this connection now speaks for, and must be read before the `ClientState` exists.
async fn accept_relay_connection(
  stream: tokio::net::TcpStream,
  my_mac: MacAddr,
  clients: &mut RelayClients,
  wired_tx: &mpsc::Sender<WiredEvent>,
) -> anyhow::Result<()> {
  let mut io = TcpTunnelIo::new(stream);
  let control = match io.recv_message().await? {
    RelayMessage::WiredControl(c) => c,
    RelayMessage::ActionFrame { .. } => {
      anyhow::bail!("relay dial-in did not begin with a wired_control preamble");
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

/// Feed one message from a Relay connection into the shared Demultiplexer (§4.4). Transmitting a
/// reply back down the same connection is the external engine's job via `EngineCallbacks`
/// (§1's one Non-goal); this binary, like `sss`, only drives the receiving half.
fn handle_wired_message(
  demux: &mut Demultiplexer<StubEngine>,
  my_mac: MacAddr,
  id: u64,
  msg: Result<RelayMessage, TcpTunnelError>,
  clients: &mut RelayClients,
) {
  let msg = match msg {
    Ok(m) => m,
    Err(TcpTunnelError::Closed) => {
      if let Some(client) = clients.remove_by_id(id) {
        log::debug!("controller: relay connection for {} closed", client.state.peer_mac);
      }
      return;
    }
    Err(e) => {
      log::warn!("controller: relay connection {id}: {e}");
      return;
    }
  };

  let Some(client) = clients.find_by_id(id) else {
    log::debug!("controller: message for unknown relay connection {id}");
    return;
  };
  client.state.touch();
  let peer = client.state.peer_mac;

  match msg {
    RelayMessage::WiredControl(_) => {
      log::warn!("controller: unexpected second wired_control from relay connection {id}");
    }
    RelayMessage::ActionFrame { field, body } => {
      demux.handle_frame(my_mac, peer, ActionField::from(field), &body);
    }
  }
}

fn split_host_port(addr: &str) -> (String, u16) {
  match addr.rsplit_once(':') {
    Some((host, port)) => (host.to_string(), port.parse().unwrap_or(transport::tcp::RELAY_PORT)),
    None => (addr.to_string(), transport::tcp::RELAY_PORT),
  }
}
