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

//! The error taxonomy of §7: transport, parse, routing, and protocol errors are non-fatal and are
//! handled by logging at the call site; only configuration errors at startup are fatal. This type
//! exists so every fallible public operation in `core-dpp` returns a value from the same small
//! vocabulary instead of ad hoc strings.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DaemonError {
  /// §7(a): send/recv syscall failure. Logged; the session or socket continues.
  #[error("transport error: {0}")]
  Transport(#[from] transport::IoError),

  /// §7(b): truncated frame, unknown frame_type, TLV overrun. The frame is dropped.
  #[error("parse error: {0}")]
  Parse(String),

  /// §7(c): no session matches an inbound frame that is not allowed to gratuitously create one.
  #[error("no session found for {0}")]
  NoRoute(String),

  /// §7(d): the external DPP/PKEX engine rejected a frame or could not allocate a handle.
  #[error("engine error: {0}")]
  Engine(String),

  /// §7(e): fatal configuration error at startup. The only variant that should cause a
  /// non-zero process exit outside of CLI argument parsing.
  #[error("configuration error: {0}")]
  Config(String),

  #[error("I/O error: {0}")]
  Io(#[from] std::io::Error),
}

pub type DaemonResult<T> = Result<T, DaemonError>;
