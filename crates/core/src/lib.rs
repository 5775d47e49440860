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

//! The DPP/PKEX reference endpoint's core logic: bootstrap storage, session bookkeeping,
//! fragmentation, frame demultiplexing, and the event loop that ties them to a Frame I/O Adapter.
//! Transport-specific I/O lives in the `transport` crate; wire formats live in `protocol`. This
//! crate is the part that would be identical whether the frames arrive over a real radio, a relay
//! TCP tunnel, or the loopback medium used in tests.

pub mod bootstrap_store;
pub mod chirp;
pub mod client_state;
pub mod demux;
pub mod endpoint;
pub mod engine;
pub mod error;
pub mod eventloop;
pub mod interface;
pub mod session;
pub mod testing;

pub use bootstrap_store::{BootstrapEntry, BootstrapStoreError};
pub use client_state::ClientState;
pub use demux::Demultiplexer;
pub use endpoint::Endpoint;
pub use engine::{DppEngine, EngineCallbacks, EngineError, EngineHandle, PkexEngine};
pub use error::{DaemonError, DaemonResult};
pub use interface::Interface;
pub use session::{DppSession, PeerAddr, PkexSession, Role, SessionRegistry};
