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

//! Event Loop Glue (§4.8): a single-threaded cooperative scheduler. §5 forbids callbacks from
//! re-entering the loop synchronously and requires frames to be processed strictly in arrival
//! order per interface; we get both for free by running on a single-threaded tokio runtime and
//! multiplexing every frame source into one ordered channel rather than polling raw fds directly
//! — `tokio::select!`/`mpsc` stand in for the platform poll primitive and the min-heap of timers
//! the original spec describes, with the same single-thread, no-blocking-callback discipline.

use base::mac::MacAddr;
use tokio::sync::mpsc;
use transport::RecvFrame;

/// One event the loop delivers to `Endpoint::run`: an inbound frame on a given local interface,
/// a beacon SSID sighting, or a periodic timer tick (client-state sweep, §3).
pub enum LoopEvent {
  FrameIn { my_mac: MacAddr, frame: RecvFrame },
  BeaconSeen { my_mac: MacAddr, ssid: String },
  Tick,
}

/// The one channel every frame-source task and the timer task feed into; `Endpoint::run` is the
/// sole reader, so ordering across sources is whatever order events are sent, and dispatch never
/// runs two callbacks concurrently (§5).
pub struct Scheduler {
  tx: mpsc::Sender<LoopEvent>,
  rx: mpsc::Receiver<LoopEvent>,
}

impl Scheduler {
  pub fn new(capacity: usize) -> Scheduler {
    let (tx, rx) = mpsc::channel(capacity);
    Scheduler { tx, rx }
  }

  pub fn sender(&self) -> mpsc::Sender<LoopEvent> {
    self.tx.clone()
  }

  /// Blocks until the next event; `None` once every sender has been dropped (all frame sources
  /// and the timer task have ended, which only happens at shutdown).
  pub async fn next(&mut self) -> Option<LoopEvent> {
    self.rx.recv().await
  }
}

/// Spawn the periodic tick task that drives the client-state sweep (§3: 10s default timeout).
pub fn spawn_ticker(tx: mpsc::Sender<LoopEvent>, period: std::time::Duration) {
  tokio::spawn(async move {
    let mut interval = tokio::time::interval(period);
    loop {
      interval.tick().await;
      if tx.send(LoopEvent::Tick).await.is_err() {
        return;
      }
    }
  });
}
