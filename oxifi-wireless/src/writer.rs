//! Targeted capture: write frames to a capture file while assembling
//! handshakes.
//!
//! The writer asks the radio for a kernel filter
//! (`ether host <bssid> or ether proto 0x888e`); when the backend cannot
//! compile filters it captures everything and filters in user space. Every
//! accepted frame is appended to the capture file and then fed through the
//! handshake tracker, so EAPOL frames reach the tracker in arrival order.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

use crate::capture::{next_frame, Radio};
use crate::error::{Result, WirelessError};
use crate::frames::MacAddress;
use crate::handshake::{FourWayHandshake, HandshakeTracker};
use crate::pcap::{PcapReader, PcapWriter};

struct WriterShared {
    tracker: HandshakeTracker,
    pcap: Mutex<Option<PcapWriter<std::io::BufWriter<std::fs::File>>>>,
    frames_written: AtomicU64,
    kernel_filtered: AtomicBool,
}

/// Captures frames for one BSSID into a capture file.
pub struct CaptureWriter {
    shared: Arc<WriterShared>,
    path: PathBuf,
    bssid: MacAddress,
    ingest: Option<JoinHandle<()>>,
    stop: Arc<AtomicBool>,
}

impl CaptureWriter {
    /// Create the capture file and the tracker for a target BSSID.
    pub fn create(path: &Path, bssid: MacAddress, link_type: u16) -> Result<Self> {
        let pcap = PcapWriter::create(path, link_type)?;

        Ok(Self {
            shared: Arc::new(WriterShared {
                tracker: HandshakeTracker::new(bssid),
                pcap: Mutex::new(Some(pcap)),
                frames_written: AtomicU64::new(0),
                kernel_filtered: AtomicBool::new(false),
            }),
            path: path.to_path_buf(),
            bssid,
            ingest: None,
            stop: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Register the handshake-completion callback. Must be called before
    /// [`CaptureWriter::start`].
    pub fn on_handshake<F>(&self, callback: F)
    where
        F: FnMut(FourWayHandshake) + Send + 'static,
    {
        self.shared.tracker.on_handshake(callback);
    }

    /// Take ownership of the radio and start the ingest thread.
    ///
    /// The loop runs until [`CaptureWriter::stop`] is called (or the writer
    /// is dropped); cancellation is delivered by calling `stop`.
    pub fn start(&mut self, mut radio: Box<dyn Radio>) -> Result<()> {
        if self.ingest.is_some() {
            return Err(WirelessError::Capture("capture already running".into()));
        }

        let filter = format!("ether host {} or ether proto 0x888e", self.bssid);
        match radio.set_bpf(&filter) {
            Ok(()) => {
                self.shared.kernel_filtered.store(true, Ordering::Relaxed);
                tracing::debug!(%filter, "kernel filter installed");
            }
            Err(err) if err.is_unsupported() => {
                tracing::debug!("kernel filter unsupported, filtering in user space");
            }
            Err(err) => {
                tracing::warn!(%err, "kernel filter failed, filtering in user space");
            }
        }

        let shared = self.shared.clone();
        let stop = self.stop.clone();
        let bssid = self.bssid;

        let handle = thread::Builder::new()
            .name("capture-ingest".into())
            .spawn(move || {
                ingest_loop(radio.as_mut(), &shared, &stop, bssid);
                radio.close();
            })
            .map_err(|e| WirelessError::Capture(format!("spawn ingest thread: {}", e)))?;

        self.ingest = Some(handle);
        Ok(())
    }

    /// Stop the ingest thread and flush the capture file.
    pub fn stop(&mut self) -> Result<()> {
        self.stop.store(true, Ordering::SeqCst);
        if let Some(handle) = self.ingest.take() {
            let _ = handle.join();
        }

        if let Some(mut pcap) = self.shared.pcap.lock().unwrap().take() {
            pcap.flush()?;
        }
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn bssid(&self) -> MacAddress {
        self.bssid
    }

    /// True once any client's handshake is complete.
    pub fn has_handshake(&self) -> bool {
        self.shared.tracker.has_handshake()
    }

    /// Number of classified EAPOL-Key frames observed.
    pub fn eapol_count(&self) -> u64 {
        self.shared.tracker.eapol_count()
    }

    /// Frames written to the capture file.
    pub fn frames_written(&self) -> u64 {
        self.shared.frames_written.load(Ordering::Relaxed)
    }

    /// Snapshot of complete handshakes.
    pub fn complete_handshakes(&self) -> Vec<FourWayHandshake> {
        self.shared.tracker.complete_handshakes()
    }
}

impl Drop for CaptureWriter {
    fn drop(&mut self) {
        let _ = self.stop();
    }
}

fn ingest_loop(
    radio: &mut dyn Radio,
    shared: &WriterShared,
    stop: &AtomicBool,
    bssid: MacAddress,
) {
    let kernel_filtered = shared.kernel_filtered.load(Ordering::Relaxed);

    while !stop.load(Ordering::SeqCst) {
        let captured = match next_frame(radio) {
            Ok(Some(captured)) => captured,
            Ok(None) => continue,
            Err(err) => {
                tracing::warn!(%err, "capture read failed, stopping ingest");
                break;
            }
        };

        if !kernel_filtered && !frame_matches(&captured.frame, bssid) {
            continue;
        }

        {
            let mut guard = shared.pcap.lock().unwrap();
            if let Some(pcap) = guard.as_mut() {
                if let Err(err) = pcap.write_frame(captured.timestamp, &captured.raw) {
                    tracing::warn!(%err, "capture file write failed, stopping ingest");
                    break;
                }
            } else {
                break;
            }
        }
        shared.frames_written.fetch_add(1, Ordering::Relaxed);

        // The frame is fully persisted before the tracker sees it, and the
        // tracker sees frames strictly in arrival order.
        shared.tracker.process(&captured.frame);
    }
}

/// User-space equivalent of `ether host <bssid> or ether proto 0x888e`.
fn frame_matches(frame: &crate::frames::Frame, bssid: MacAddress) -> bool {
    let h = &frame.header;
    h.addr1 == bssid || h.addr2 == bssid || h.addr3 == bssid || frame.eapol_body().is_some()
}

/// Handshake state recovered from a stored capture file.
pub struct CaptureScan {
    pub handshakes: Vec<FourWayHandshake>,
    pub eapol_frames: u64,
    pub frames: u64,
}

impl CaptureScan {
    /// First complete handshake, if any.
    pub fn complete(&self) -> Option<&FourWayHandshake> {
        self.handshakes.iter().find(|hs| hs.is_complete())
    }
}

/// Re-parse a capture file and assemble handshakes for a BSSID.
pub fn scan_capture_file(path: &Path, bssid: MacAddress) -> Result<CaptureScan> {
    let mut reader = PcapReader::open(path)?;
    let tracker = HandshakeTracker::new(bssid);
    let mut frames = 0u64;

    while let Some(record) = reader.next_record()? {
        frames += 1;
        if let Ok(frame) = crate::frames::Frame::parse(&record.data) {
            tracker.process(&frame);
        }
    }

    let handshakes = tracker.complete_handshakes();

    Ok(CaptureScan {
        handshakes,
        eapol_frames: tracker.eapol_count(),
        frames,
    })
}
