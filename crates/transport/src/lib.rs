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

#![forbid(unsafe_op_in_unsafe_fn)]

//! The Frame I/O Adapter (§4.1): transport polymorphism over loopback, real-radio (nl80211 on
//! Linux, BPF on FreeBSD), and the Relay↔Controller TCP tunnel. Per design notes §9, the
//! Demultiplexer and Session Registry are written against the capability set in [`io`], not
//! against these concrete variants.

pub mod io;
pub mod loopback;
pub mod regulatory;
pub mod tcp;

#[cfg(target_os = "linux")]
pub mod nl80211;

#[cfg(target_os = "freebsd")]
pub mod bpf;

pub use io::{Capabilities, IoError, RecvFrame};
