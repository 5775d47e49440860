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

//! The real-radio Frame I/O Adapter on FreeBSD (§4.1): assembled 802.11 bytes written directly
//! to a BPF device configured with `DLT_IEEE802_11` and `BIOCSHDRCMPLT=1`, so the kernel trusts
//! our synthesized header instead of prepending its own link-layer source address.

#![cfg(target_os = "freebsd")]

use crate::io::{Capabilities, IoError};
use base::mac::MacAddr;
use protocol::ieee80211::{build_header, parse_mgmt_frame, parse_public_action, SUBTYPE_ACTION};
use protocol::ActionField;
use std::ffi::CString;
use std::os::unix::io::{AsRawFd, RawFd};

const DLT_IEEE802_11: libc::c_uint = 105;

/// `BIOCSHDRCMPLT`, `BIOCSDLT`, `BIOCSETIF`, `BIOCIMMEDIATE` ioctl numbers from `<net/bpf.h>`.
mod ioctl {
  pub const BIOCSETIF: libc::c_ulong = 0x8020_4269;
  pub const BIOCSDLT: libc::c_ulong = 0x8004_4278;
  pub const BIOCSHDRCMPLT: libc::c_ulong = 0x8004_4275;
  pub const BIOCIMMEDIATE: libc::c_ulong = 0x8004_4270;
}

#[repr(C)]
struct Ifreq {
  ifr_name: [libc::c_char; libc::IFNAMSIZ],
  ifr_ifru: [u8; 16],
}

pub struct BpfIo {
  fd: RawFd,
  local_mac: MacAddr,
  caps: Capabilities,
}

impl BpfIo {
  /// Opens the first free `/dev/bpf*` device, binds it to `ifname`, and configures
  /// `DLT_IEEE802_11` + `BIOCSHDRCMPLT` per §4.1.
  pub fn open(ifname: &str, local_mac: MacAddr, caps: Capabilities) -> Result<BpfIo, IoError> {
    let fd = Self::open_bpf_device()?;
    let mut ifreq = Ifreq {
      ifr_name: [0; libc::IFNAMSIZ],
      ifr_ifru: [0; 16],
    };
    let name = CString::new(ifname).map_err(|e| IoError::ChannelChange(e.to_string()))?;
    let bytes = name.as_bytes_with_nul();
    for (dst, src) in ifreq.ifr_name.iter_mut().zip(bytes.iter()) {
      *dst = *src as libc::c_char;
    }
    unsafe {
      if libc::ioctl(fd, ioctl::BIOCSETIF, &ifreq as *const _) < 0 {
        return Err(IoError::ChannelChange("BIOCSETIF failed".into()));
      }
      let dlt: libc::c_uint = DLT_IEEE802_11;
      if libc::ioctl(fd, ioctl::BIOCSDLT, &dlt as *const _) < 0 {
        return Err(IoError::ChannelChange("BIOCSDLT failed".into()));
      }
      let one: libc::c_uint = 1;
      if libc::ioctl(fd, ioctl::BIOCSHDRCMPLT, &one as *const _) < 0 {
        return Err(IoError::ChannelChange("BIOCSHDRCMPLT failed".into()));
      }
      if libc::ioctl(fd, ioctl::BIOCIMMEDIATE, &one as *const _) < 0 {
        return Err(IoError::ChannelChange("BIOCIMMEDIATE failed".into()));
      }
    }
    Ok(BpfIo { fd, local_mac, caps })
  }

  fn open_bpf_device() -> Result<RawFd, IoError> {
    for n in 0..16 {
      let path = CString::new(format!("/dev/bpf{n}")).expect("no interior nul");
      let fd = unsafe { libc::open(path.as_ptr(), libc::O_RDWR) };
      if fd >= 0 {
        return Ok(fd);
      }
    }
    Err(IoError::ChannelChange("no free /dev/bpf* device".into()))
  }

  pub fn capabilities(&self) -> Capabilities {
    self.caps
  }

  pub fn send_action_frame(
    &self,
    src: MacAddr,
    dst: MacAddr,
    field: ActionField,
    body: &[u8],
  ) -> Result<usize, IoError> {
    let mut out = build_header(SUBTYPE_ACTION, src, dst, MacAddr::BROADCAST);
    let _ = field;
    out.extend_from_slice(body);
    let n = unsafe { libc::write(self.fd, out.as_ptr() as *const libc::c_void, out.len()) };
    if n < 0 {
      return Err(IoError::Send(std::io::Error::last_os_error()));
    }
    Ok(n as usize)
  }

  pub fn recv_frame_blocking(&self) -> Result<Option<(MacAddr, MacAddr, ActionField, Vec<u8>)>, IoError> {
    let mut buf = vec![0u8; 4096];
    let n = unsafe { libc::read(self.fd, buf.as_mut_ptr() as *mut libc::c_void, buf.len()) };
    if n < 0 {
      return Err(IoError::Recv(std::io::Error::last_os_error()));
    }
    let mgmt = match parse_mgmt_frame(&buf[..n as usize]) {
      Ok(m) => m,
      Err(_) => return Ok(None),
    };
    if !crate::io::passes_receive_filters(mgmt.src, mgmt.dst, &[self.local_mac]) {
      return Ok(None);
    }
    let action = match parse_public_action(mgmt.body) {
      Ok(a) => a,
      Err(_) => return Ok(None),
    };
    Ok(Some((mgmt.src, mgmt.dst, action.field, action.payload.to_vec())))
  }
}

impl AsRawFd for BpfIo {
  fn as_raw_fd(&self) -> RawFd {
    self.fd
  }
}

impl Drop for BpfIo {
  fn drop(&mut self) {
    unsafe {
      libc::close(self.fd);
    }
  }
}
