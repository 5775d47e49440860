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

//! `Endpoint` (design notes §9): replaces the original's process-wide globals (`srvctx`,
//! `our_ssid`, `discovered`, `bootstrapfile`, `opclass`, `channel`) with one explicit record
//! passed to every callback, following the lifecycle `new() -> run() -> drop`. This module wires
//! up the standalone station/AP role (`sss`, §1); the Relay and Controller roles additionally
//! drive a Relay TCP Framing loop the daemon binaries assemble directly from `Demultiplexer`,
//! `ClientState`, and `transport::tcp`, since their wiring differs enough from the loopback/radio
//! case that forcing them through this same struct would obscure rather than share code.

use crate::demux::{beacon_ssid, Demultiplexer};
use crate::engine::{DppEngine, PkexEngine};
use crate::eventloop::{spawn_ticker, LoopEvent, Scheduler};
use crate::interface::Interface;
use base::mac::MacAddr;
use std::path::PathBuf;
use std::time::Duration;
use tokio::sync::mpsc;
use transport::loopback::LoopbackIo;

/// The 10s client-state sweep interval doubles as this role's idle tick; §3 gives the client
/// timeout, not a standalone-role tick, so any value fine-grained enough not to starve beacon
/// dispatch works here.
const TICK_PERIOD: Duration = Duration::from_secs(1);

pub struct Endpoint<E> {
  pub interfaces: Vec<Interface>,
  pub demux: Demultiplexer<E>,
  scheduler: Scheduler,
}

impl<E: DppEngine + PkexEngine> Endpoint<E> {
  pub fn new(engine: E, bootstrap_path: PathBuf, our_ssid: Option<String>, mtu: usize, pkex_version: u8) -> Endpoint<E> {
    Endpoint {
      interfaces: Vec::new(),
      demux: Demultiplexer::new(engine, bootstrap_path, our_ssid, mtu, pkex_version),
      scheduler: Scheduler::new(256),
    }
  }

  pub fn add_interface(&mut self, iface: Interface) {
    self.interfaces.push(iface);
  }

  /// Bind every registered loopback interface to the shared medium and spawn one reader task per
  /// interface, each forwarding parsed frames (and the beacon pseudo-frame) into the scheduler's
  /// single channel so `run` sees them in a well-defined, per-interface-ordered sequence (§5).
  pub async fn bind_loopback(&mut self) -> Result<(), transport::IoError> {
    for iface in &self.interfaces {
      let io = LoopbackIo::bind(iface.mac).await?;
      let tx = self.scheduler.sender();
      let my_mac = iface.mac;
      tokio::spawn(async move {
        run_loopback_reader(io, my_mac, tx).await;
      });
    }
    spawn_ticker(self.scheduler.sender(), TICK_PERIOD);
    Ok(())
  }

  /// Drive the loop until the scheduler's senders are all dropped (process shutdown). Frames are
  /// dispatched to the Demultiplexer in arrival order; the standalone role has no client-state
  /// table to sweep, so `Tick` is a no-op here (the Relay/Controller sweep their own table, see
  /// module docs).
  pub async fn run(&mut self) {
    while let Some(event) = self.scheduler.next().await {
      match event {
        LoopEvent::FrameIn { my_mac, frame } => {
          self.demux.handle_frame(my_mac, frame.src, frame.field, &frame.payload);
        }
        LoopEvent::BeaconSeen { my_mac, ssid } => {
          self.demux.handle_beacon(my_mac, &ssid);
        }
        LoopEvent::Tick => {}
      }
    }
  }
}

async fn run_loopback_reader(io: LoopbackIo, my_mac: MacAddr, tx: mpsc::Sender<LoopEvent>) {
  loop {
    match io.recv_frame().await {
      Ok(frame) if frame.is_beacon => {
        let Some(ssid) = beacon_ssid(&frame.payload) else {
          continue;
        };
        if tx
          .send(LoopEvent::BeaconSeen { my_mac, ssid: ssid.to_string() })
          .await
          .is_err()
        {
          return;
        }
      }
      Ok(frame) => {
        if tx.send(LoopEvent::FrameIn { my_mac, frame }).await.is_err() {
          return;
        }
      }
      Err(e) => {
        // §4.1: a receive error logs and continues reading; the socket is not closed.
        log::warn!("loopback[{my_mac}]: recv error: {e}");
      }
    }
  }
}
