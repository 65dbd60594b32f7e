//! Classic libpcap capture-file container.
//!
//! Written captures must replay in external tools, so the writer is
//! bit-exact: magic `0xA1B2C3D4`, version 2.4, snap length 65536, and the
//! 16-byte per-record header. The reader also accepts files written on the
//! other byte order (swapped magic).

use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use byteorder::{BigEndian, ByteOrder, LittleEndian, WriteBytesExt};

use crate::error::{Result, WirelessError};

/// Capture-file magic, native byte order.
pub const MAGIC: u32 = 0xA1B2_C3D4;

/// Magic as seen when the file was written on the opposite byte order.
pub const MAGIC_SWAPPED: u32 = 0xD4C3_B2A1;

/// Major/minor format version.
pub const VERSION_MAJOR: u16 = 2;
pub const VERSION_MINOR: u16 = 4;

/// Snap length used for all captures.
pub const SNAP_LEN: u32 = 65536;

/// Size of the per-record header.
const RECORD_HEADER_LEN: usize = 16;

/// Streaming capture-file writer.
pub struct PcapWriter<W: Write> {
    writer: W,
}

impl PcapWriter<BufWriter<File>> {
    /// Create a capture file on disk.
    pub fn create(path: &Path, link_type: u16) -> Result<Self> {
        let file = File::create(path)?;
        Self::new(BufWriter::new(file), link_type)
    }
}

impl<W: Write> PcapWriter<W> {
    /// Wrap a writer and emit the global file header.
    pub fn new(mut writer: W, link_type: u16) -> Result<Self> {
        writer.write_u32::<LittleEndian>(MAGIC)?;
        writer.write_u16::<LittleEndian>(VERSION_MAJOR)?;
        writer.write_u16::<LittleEndian>(VERSION_MINOR)?;
        writer.write_i32::<LittleEndian>(0)?; // thiszone
        writer.write_u32::<LittleEndian>(0)?; // sigfigs
        writer.write_u32::<LittleEndian>(SNAP_LEN)?;
        writer.write_u32::<LittleEndian>(link_type as u32)?;
        Ok(Self { writer })
    }

    /// Append one frame. The captured length is clamped to the snap length;
    /// `original_len` records the on-air size.
    pub fn write_frame(&mut self, timestamp: SystemTime, data: &[u8]) -> Result<()> {
        let since_epoch = timestamp
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default();

        let captured = data.len().min(SNAP_LEN as usize);

        self.writer
            .write_u32::<LittleEndian>(since_epoch.as_secs() as u32)?;
        self.writer
            .write_u32::<LittleEndian>(since_epoch.subsec_micros())?;
        self.writer.write_u32::<LittleEndian>(captured as u32)?;
        self.writer.write_u32::<LittleEndian>(data.len() as u32)?;
        self.writer.write_all(&data[..captured])?;
        Ok(())
    }

    pub fn flush(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }
}

/// One record read back from a capture file.
#[derive(Debug, Clone)]
pub struct PcapRecord {
    pub ts_secs: u32,
    pub ts_micros: u32,
    pub original_len: u32,
    pub data: Vec<u8>,
}

/// Streaming capture-file reader.
pub struct PcapReader<R: Read> {
    reader: R,
    swapped: bool,
    link_type: u16,
    snap_len: u32,
}

impl PcapReader<BufReader<File>> {
    /// Open a capture file from disk.
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        Self::new(BufReader::new(file))
    }
}

impl<R: Read> PcapReader<R> {
    /// Wrap a reader and parse the global file header.
    pub fn new(mut reader: R) -> Result<Self> {
        let mut header = [0u8; 24];
        reader.read_exact(&mut header).map_err(|e| {
            WirelessError::InvalidCapture(format!("short file header: {}", e))
        })?;

        let magic = LittleEndian::read_u32(&header[0..4]);
        let swapped = match magic {
            MAGIC => false,
            MAGIC_SWAPPED => true,
            other => {
                return Err(WirelessError::InvalidCapture(format!(
                    "bad magic: {:#010X}",
                    other
                )))
            }
        };

        let (major, snap_len, link_type) = if swapped {
            (
                BigEndian::read_u16(&header[4..6]),
                BigEndian::read_u32(&header[16..20]),
                BigEndian::read_u32(&header[20..24]) as u16,
            )
        } else {
            (
                LittleEndian::read_u16(&header[4..6]),
                LittleEndian::read_u32(&header[16..20]),
                LittleEndian::read_u32(&header[20..24]) as u16,
            )
        };

        if major != VERSION_MAJOR {
            return Err(WirelessError::InvalidCapture(format!(
                "unsupported version: {}",
                major
            )));
        }

        Ok(Self {
            reader,
            swapped,
            link_type,
            snap_len,
        })
    }

    pub fn link_type(&self) -> u16 {
        self.link_type
    }

    pub fn snap_len(&self) -> u32 {
        self.snap_len
    }

    /// Read the next record; `Ok(None)` at a clean end of file.
    pub fn next_record(&mut self) -> Result<Option<PcapRecord>> {
        let mut header = [0u8; RECORD_HEADER_LEN];
        match read_fully(&mut self.reader, &mut header)? {
            0 => return Ok(None),
            RECORD_HEADER_LEN => {}
            n => {
                return Err(WirelessError::InvalidCapture(format!(
                    "truncated record header: {} bytes",
                    n
                )))
            }
        }

        let read_u32 = |buf: &[u8]| -> u32 {
            if self.swapped {
                BigEndian::read_u32(buf)
            } else {
                LittleEndian::read_u32(buf)
            }
        };

        let ts_secs = read_u32(&header[0..4]);
        let ts_micros = read_u32(&header[4..8]);
        let captured_len = read_u32(&header[8..12]);
        let original_len = read_u32(&header[12..16]);

        if captured_len > self.snap_len.max(SNAP_LEN) {
            return Err(WirelessError::InvalidCapture(format!(
                "record larger than snap length: {}",
                captured_len
            )));
        }

        let mut data = vec![0u8; captured_len as usize];
        self.reader.read_exact(&mut data).map_err(|e| {
            WirelessError::InvalidCapture(format!("truncated record body: {}", e))
        })?;

        Ok(Some(PcapRecord {
            ts_secs,
            ts_micros,
            original_len,
            data,
        }))
    }
}

/// Read as many bytes as possible into `buf`; returns bytes read. Used to
/// tell a clean EOF (0 bytes) from a truncated header.
fn read_fully<R: Read>(reader: &mut R, buf: &mut [u8]) -> Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(ref e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        }
    }
    Ok(filled)
}
