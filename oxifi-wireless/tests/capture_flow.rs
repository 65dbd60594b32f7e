//! End-to-end capture flow: a scripted radio feeds frames through the
//! capture writer, and the written file is re-parsed into handshake state.

use std::collections::VecDeque;
use std::sync::mpsc::sync_channel;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use oxifi_wireless::eapol::EapolType;
use oxifi_wireless::frames::LLC_SNAP_EAPOL;
use oxifi_wireless::radiotap::INJECTION_HEADER;
use oxifi_wireless::{
    scan_capture_file, CaptureWriter, MacAddress, Radio, Result, WirelessError,
    DLT_IEEE802_11_RADIO,
};

const BSSID: MacAddress = MacAddress([0x00, 0x14, 0x6C, 0x7E, 0x40, 0x80]);
const CLIENT: MacAddress = MacAddress([0x00, 0x0F, 0xB5, 0xFD, 0xFB, 0xC2]);

/// Replays a fixed frame sequence, then reports timeouts.
struct ScriptedRadio {
    frames: Arc<Mutex<VecDeque<Vec<u8>>>>,
}

impl ScriptedRadio {
    fn new(frames: Vec<Vec<u8>>) -> Self {
        Self {
            frames: Arc::new(Mutex::new(frames.into())),
        }
    }
}

impl Radio for ScriptedRadio {
    fn read_frame(&mut self) -> Result<Option<Vec<u8>>> {
        match self.frames.lock().unwrap().pop_front() {
            Some(frame) => Ok(Some(frame)),
            None => {
                std::thread::sleep(Duration::from_millis(5));
                Ok(None)
            }
        }
    }

    fn write_frame(&mut self, frame: &[u8]) -> Result<usize> {
        Ok(frame.len())
    }

    fn set_bpf(&mut self, _filter: &str) -> Result<()> {
        Err(WirelessError::Unsupported("scripted radio".into()))
    }
}

fn eapol_key(key_info: u16, replay: u64, nonce: [u8; 32], mic: [u8; 16]) -> Vec<u8> {
    let mut out = Vec::with_capacity(99);
    out.push(2);
    out.push(EapolType::Key as u8);
    out.extend_from_slice(&95u16.to_be_bytes());
    out.push(2);
    out.extend_from_slice(&key_info.to_be_bytes());
    out.extend_from_slice(&16u16.to_be_bytes());
    out.extend_from_slice(&replay.to_be_bytes());
    out.extend_from_slice(&nonce);
    out.extend_from_slice(&[0u8; 32]);
    out.extend_from_slice(&mic);
    out.extend_from_slice(&0u16.to_be_bytes());
    out
}

fn data_frame(from_ap: bool, eapol: &[u8]) -> Vec<u8> {
    let fc: u16 = if from_ap { 0x0208 } else { 0x0108 };
    let (addr1, addr2) = if from_ap { (CLIENT, BSSID) } else { (BSSID, CLIENT) };

    let mut raw = Vec::new();
    raw.extend_from_slice(&INJECTION_HEADER);
    raw.extend_from_slice(&fc.to_le_bytes());
    raw.extend_from_slice(&0u16.to_le_bytes());
    raw.extend_from_slice(&addr1.0);
    raw.extend_from_slice(&addr2.0);
    raw.extend_from_slice(&BSSID.0);
    raw.extend_from_slice(&0u16.to_le_bytes());
    raw.extend_from_slice(&LLC_SNAP_EAPOL);
    raw.extend_from_slice(eapol);
    raw
}

/// A data frame for an unrelated network; the user-space filter must drop it.
fn foreign_frame() -> Vec<u8> {
    let other = MacAddress([0x66; 6]);
    let mut raw = Vec::new();
    raw.extend_from_slice(&INJECTION_HEADER);
    raw.extend_from_slice(&0x0108u16.to_le_bytes());
    raw.extend_from_slice(&0u16.to_le_bytes());
    raw.extend_from_slice(&other.0);
    raw.extend_from_slice(&other.0);
    raw.extend_from_slice(&other.0);
    raw.extend_from_slice(&0u16.to_le_bytes());
    raw.extend_from_slice(&[0u8; 32]);
    raw
}

fn temp_path(name: &str) -> std::path::PathBuf {
    let mut path = std::env::temp_dir();
    path.push(format!(
        "oxifi-capture-{}-{}.cap",
        name,
        std::process::id()
    ));
    path
}

#[test]
fn capture_writes_and_reports_handshake() {
    let path = temp_path("flow");
    let _ = std::fs::remove_file(&path);

    let frames = vec![
        foreign_frame(),
        data_frame(true, &eapol_key(0x008A, 1, [0x11; 32], [0; 16])),
        data_frame(false, &eapol_key(0x010A, 1, [0x22; 32], [0xCC; 16])),
    ];

    let mut writer = CaptureWriter::create(&path, BSSID, DLT_IEEE802_11_RADIO).unwrap();

    let (tx, rx) = sync_channel(1);
    writer.on_handshake(move |hs| {
        let _ = tx.try_send((hs.bssid, hs.client));
    });

    writer.start(Box::new(ScriptedRadio::new(frames))).unwrap();

    let (bssid, client) = rx
        .recv_timeout(Duration::from_secs(5))
        .expect("handshake notification");
    assert_eq!(bssid, BSSID);
    assert_eq!(client, CLIENT);

    // Wait for both target frames to be persisted before stopping.
    let deadline = Instant::now() + Duration::from_secs(5);
    while writer.frames_written() < 2 && Instant::now() < deadline {
        std::thread::sleep(Duration::from_millis(10));
    }

    assert!(writer.has_handshake());
    assert_eq!(writer.eapol_count(), 2);
    writer.stop().unwrap();

    // The foreign frame must not have been written.
    assert_eq!(writer.frames_written(), 2);

    // Re-parse the capture file from disk.
    let scan = scan_capture_file(&path, BSSID).unwrap();
    assert_eq!(scan.frames, 2);
    assert_eq!(scan.eapol_frames, 2);
    let hs = scan.complete().expect("complete handshake in capture");
    assert_eq!(hs.client, CLIENT);
    assert_eq!(hs.anonce(), Some([0x11; 32]));
    assert_eq!(hs.snonce(), Some([0x22; 32]));

    let _ = std::fs::remove_file(&path);
}

#[test]
fn capture_without_handshake_reports_counts() {
    let path = temp_path("partial");
    let _ = std::fs::remove_file(&path);

    // Only M1: incomplete.
    let frames = vec![data_frame(true, &eapol_key(0x008A, 1, [0x11; 32], [0; 16]))];

    let mut writer = CaptureWriter::create(&path, BSSID, DLT_IEEE802_11_RADIO).unwrap();
    writer.start(Box::new(ScriptedRadio::new(frames))).unwrap();

    let deadline = Instant::now() + Duration::from_secs(5);
    while writer.eapol_count() < 1 && Instant::now() < deadline {
        std::thread::sleep(Duration::from_millis(10));
    }

    writer.stop().unwrap();
    assert!(!writer.has_handshake());
    assert_eq!(writer.eapol_count(), 1);

    let scan = scan_capture_file(&path, BSSID).unwrap();
    assert!(scan.complete().is_none());
    assert_eq!(scan.eapol_frames, 1);

    let _ = std::fs::remove_file(&path);
}
