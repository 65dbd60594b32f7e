//! Capture sources.
//!
//! The [`Radio`] trait is the seam between the core and the platform: a
//! monitor-mode handle that yields raw RadioTap-prefixed frames and accepts
//! frames for injection. The default Linux backend is a raw `AF_PACKET`
//! socket; anything that can read and write frames (including test doubles)
//! can stand in.

use std::time::SystemTime;

use crate::error::Result;
use crate::frames::Frame;

/// Data-link type for 802.11 frames with a RadioTap prefix.
pub const DLT_IEEE802_11_RADIO: u16 = 127;

/// An open monitor-mode radio handle.
pub trait Radio: Send {
    /// Read the next raw frame. Returns `Ok(None)` on read timeout so
    /// callers can poll cancellation flags.
    fn read_frame(&mut self) -> Result<Option<Vec<u8>>>;

    /// Inject a raw frame (RadioTap prefix included). Returns bytes written.
    fn write_frame(&mut self, frame: &[u8]) -> Result<usize>;

    /// Install a BPF-style filter expression at the capture source.
    ///
    /// Backends without kernel filtering return
    /// [`WirelessError::Unsupported`](crate::error::WirelessError::Unsupported);
    /// callers fall back to user-space filtering.
    fn set_bpf(&mut self, filter: &str) -> Result<()>;

    /// Link type of frames produced by this handle.
    fn link_type(&self) -> u16 {
        DLT_IEEE802_11_RADIO
    }

    /// Release the underlying handle. Also performed on drop.
    fn close(&mut self) {}
}

/// Factory for radio handles plus the best-effort platform controls the
/// attack flow needs. Monitor-mode toggling and MAC manipulation stay
/// behind this seam.
pub trait RadioProvider: Send + Sync {
    /// Open a monitor-mode capture/injection handle on an interface.
    fn open_monitor(&self, iface: &str) -> Result<Box<dyn Radio>>;

    /// Tune the interface to a channel. Best effort; failures are reported
    /// for logging only.
    fn set_channel(&self, iface: &str, channel: u8) -> Result<()>;
}

/// A frame pulled from a radio, with capture metadata.
#[derive(Debug, Clone)]
pub struct CapturedFrame {
    /// Wall-clock capture time (drives the capture-file record header).
    pub timestamp: SystemTime,
    /// Raw bytes as read from the radio, RadioTap included.
    pub raw: Vec<u8>,
    /// Parsed view of the frame.
    pub frame: Frame,
}

/// Read and parse the next frame from a radio.
///
/// Returns `Ok(None)` on read timeout and on frames the codec rejects;
/// malformed frames are dropped, never propagated.
pub fn next_frame(radio: &mut dyn Radio) -> Result<Option<CapturedFrame>> {
    let raw = match radio.read_frame()? {
        Some(raw) => raw,
        None => return Ok(None),
    };
    let timestamp = SystemTime::now();

    match Frame::parse(&raw) {
        Ok(frame) => Ok(Some(CapturedFrame {
            timestamp,
            raw,
            frame,
        })),
        Err(err) => {
            tracing::trace!(%err, "dropping malformed frame");
            Ok(None)
        }
    }
}

#[cfg(target_os = "linux")]
pub use linux::{LinuxRadioProvider, PacketSocket};

#[cfg(target_os = "linux")]
mod linux {
    use std::io;
    use std::mem;
    use std::os::unix::io::{AsRawFd, RawFd};
    use std::process::Command;

    use libc::{c_int, c_void, sockaddr_ll, AF_PACKET, SOCK_RAW};

    use super::{Radio, RadioProvider};
    use crate::error::{Result, WirelessError};

    /// Receive buffer size; matches the capture snap length.
    const CAPTURE_BUFFER_SIZE: usize = 65536;

    /// Check for the privileges raw sockets require.
    pub fn has_capture_privileges() -> bool {
        unsafe { libc::geteuid() == 0 }
    }

    /// Raw `AF_PACKET` capture/injection socket bound to one interface.
    pub struct PacketSocket {
        fd: RawFd,
        buffer: Vec<u8>,
    }

    impl PacketSocket {
        /// Open a raw socket on a monitor-mode interface.
        pub fn open(interface: &str) -> Result<Self> {
            if !has_capture_privileges() {
                return Err(WirelessError::permission(
                    "root privileges required for raw packet capture",
                ));
            }

            let ifindex = nix::net::if_::if_nametoindex(interface)
                .map_err(WirelessError::from)? as i32;

            let fd = unsafe {
                libc::socket(AF_PACKET, SOCK_RAW, (libc::ETH_P_ALL as u16).to_be() as c_int)
            };
            if fd < 0 {
                return Err(WirelessError::socket(format!(
                    "failed to create capture socket: {}",
                    io::Error::last_os_error()
                )));
            }

            let mut addr: sockaddr_ll = unsafe { mem::zeroed() };
            addr.sll_family = AF_PACKET as u16;
            addr.sll_ifindex = ifindex;
            addr.sll_protocol = (libc::ETH_P_ALL as u16).to_be();

            let bind_result = unsafe {
                libc::bind(
                    fd,
                    &addr as *const sockaddr_ll as *const libc::sockaddr,
                    mem::size_of::<sockaddr_ll>() as u32,
                )
            };
            if bind_result < 0 {
                let err = io::Error::last_os_error();
                unsafe { libc::close(fd) };
                return Err(WirelessError::socket(format!(
                    "failed to bind capture socket to {}: {}",
                    interface, err
                )));
            }

            // Receive timeout so read loops can poll cancellation.
            let timeout = libc::timeval {
                tv_sec: 1,
                tv_usec: 0,
            };
            unsafe {
                libc::setsockopt(
                    fd,
                    libc::SOL_SOCKET,
                    libc::SO_RCVTIMEO,
                    &timeout as *const _ as *const c_void,
                    mem::size_of::<libc::timeval>() as u32,
                );
            }

            tracing::debug!(interface, ifindex, "opened raw capture socket");

            Ok(Self {
                fd,
                buffer: vec![0u8; CAPTURE_BUFFER_SIZE],
            })
        }
    }

    impl Radio for PacketSocket {
        fn read_frame(&mut self) -> Result<Option<Vec<u8>>> {
            let received = unsafe {
                libc::recv(
                    self.fd,
                    self.buffer.as_mut_ptr() as *mut c_void,
                    self.buffer.len(),
                    0,
                )
            };

            if received < 0 {
                let err = io::Error::last_os_error();
                if err.kind() == io::ErrorKind::WouldBlock || err.kind() == io::ErrorKind::TimedOut
                {
                    return Ok(None);
                }
                return Err(WirelessError::Capture(format!("receive failed: {}", err)));
            }
            if received == 0 {
                return Ok(None);
            }

            Ok(Some(self.buffer[..received as usize].to_vec()))
        }

        fn write_frame(&mut self, frame: &[u8]) -> Result<usize> {
            let sent = unsafe {
                libc::send(self.fd, frame.as_ptr() as *const c_void, frame.len(), 0)
            };
            if sent < 0 {
                return Err(WirelessError::Injection(format!(
                    "send failed: {}",
                    io::Error::last_os_error()
                )));
            }
            Ok(sent as usize)
        }

        fn set_bpf(&mut self, _filter: &str) -> Result<()> {
            // Raw packet sockets carry no compiled-filter support here;
            // callers filter in user space.
            Err(WirelessError::Unsupported(
                "kernel filters not available on raw packet sockets".into(),
            ))
        }

        fn close(&mut self) {
            if self.fd >= 0 {
                unsafe { libc::close(self.fd) };
                self.fd = -1;
            }
        }
    }

    impl AsRawFd for PacketSocket {
        fn as_raw_fd(&self) -> RawFd {
            self.fd
        }
    }

    impl Drop for PacketSocket {
        fn drop(&mut self) {
            self.close();
        }
    }

    /// Default Linux radio provider: raw sockets for frames, `iw` for
    /// best-effort channel tuning.
    #[derive(Debug, Default, Clone)]
    pub struct LinuxRadioProvider;

    impl RadioProvider for LinuxRadioProvider {
        fn open_monitor(&self, iface: &str) -> Result<Box<dyn Radio>> {
            Ok(Box::new(PacketSocket::open(iface)?))
        }

        fn set_channel(&self, iface: &str, channel: u8) -> Result<()> {
            let status = Command::new("iw")
                .args(["dev", iface, "set", "channel", &channel.to_string()])
                .status()
                .map_err(|e| {
                    WirelessError::Channel(format!("failed to invoke iw: {}", e))
                })?;

            if !status.success() {
                return Err(WirelessError::Channel(format!(
                    "iw dev {} set channel {} exited with {}",
                    iface, channel, status
                )));
            }
            Ok(())
        }
    }
}
