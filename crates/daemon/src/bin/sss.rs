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

//! `sss`: the standalone station/AP DPP/PKEX endpoint (§1, §6). Takes the full flag set, since it
//! alone may act as either a Configurator (`-c`) or an Enrollee (`-e sta|ap`), either role's
//! initiator or responder, with or without PKEX bootstrapping (`-p`).
//!
//! This reference binary wires `core_dpp::endpoint::Endpoint` to the loopback Frame I/O Adapter
//! and a deterministic stand-in DPP/PKEX engine (`core_dpp::testing::StubEngine`); a production
//! deployment links a real engine satisfying `DppEngine + PkexEngine` plus its own
//! `EngineCallbacks` wiring to actually transmit frames and reach terminal states (§6 — the engine
//! itself is this repository's one explicit Non-goal, §1).

use base::mac::MacAddr;
use clap::Parser;
use core_dpp::endpoint::Endpoint;
use core_dpp::interface::Interface;
use core_dpp::testing::StubEngine;
use daemon::config::{
  Config, EnrolleeRole, DEFAULT_CHANNEL, DEFAULT_DPP_VERSION, DEFAULT_OPCLASS, DEFAULT_PKEX_VERSION,
};
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser, Debug)]
#[command(name = "sss", about = "Standalone DPP/PKEX station or AP endpoint")]
struct Args {
  /// `-I`: interface to bridge frames through (loopback-simulated in this build).
  #[arg(short = 'I', long = "iface")]
  iface: String,
  /// `-B`: bootstrap-key store path.
  #[arg(short = 'B', long = "bootstrap-file")]
  bootstrap_file: PathBuf,
  /// `-k`: this endpoint's own DPP key file (out of scope §1: PEM/ASN.1 plumbing is not parsed
  /// here, the path is only recorded for the external engine).
  #[arg(short = 'k', long = "keyfile")]
  keyfile: Option<PathBuf>,
  /// `-c`: configurator sign-key; mutually exclusive with `-e`.
  #[arg(short = 'c', long = "sign-key")]
  sign_key: Option<PathBuf>,
  /// `-e`: enrollee sub-role, `sta` or `ap`.
  #[arg(short = 'e', long = "enrollee-role")]
  role: Option<EnrolleeRole>,
  /// `-i`: act as DPP initiator (default is responder unless `-r` is also absent and PKEX implies
  /// initiator via `-p`).
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
  /// `-g`: operating class.
  #[arg(short = 'g', long = "opclass", default_value_t = DEFAULT_OPCLASS)]
  opclass: u8,
  /// `-f`: channel.
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
  /// `-s`: provisioned SSID this endpoint discovers against (ambient addition: the original reads
  /// this from the same config file as `-k`; this build takes it directly since PEM/config-file
  /// parsing beyond the bootstrap store is out of scope, §1).
  #[arg(short = 's', long = "ssid")]
  ssid: Option<String>,
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
      controller_addr: None,
      dpp_version: args.dpp_version,
    }
  }
}

fn main() -> ExitCode {
  daemon::logging::init();
  let args = Args::parse();
  let ssid = args.ssid.clone();
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
  runtime.block_on(run(config, ssid))
}

async fn run(config: Config, ssid: Option<String>) -> ExitCode {
  let mtu = protocol::gas::MTU_NL80211;
  let mut endpoint = Endpoint::new(
    StubEngine::new(),
    config.bootstrap_file.clone(),
    ssid,
    mtu,
    DEFAULT_PKEX_VERSION,
  );
  endpoint.add_interface(Interface::new_loopback(config.iface.clone()));

  if let Err(e) = endpoint.bind_loopback().await {
    log::error!("failed to bind interface {}: {e}", config.iface);
    return ExitCode::from(1);
  }
  log::info!(
    "sss endpoint up on {} (role={:?}, initiator={})",
    config.iface,
    config.enrollee_role,
    config.is_initiator
  );

  tokio::select! {
    _ = endpoint.run() => {}
    _ = tokio::signal::ctrl_c() => {
      log::info!("shutting down on signal");
    }
  }
  ExitCode::from(0)
}
