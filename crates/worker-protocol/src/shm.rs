//! Fixed byte-layout shared-memory headers (spec.md §3/§4.G).
//!
//! Endianness is an explicit Open Question in spec.md §9; this
//! implementation picks little-endian, as the spec recommends, and commits
//! to it everywhere a header is packed or unpacked.

use crate::error::Error;

/// Size in bytes of the common [`SharedMemoryHeader`] prefix.
pub const HEADER_SIZE: usize = 64 + 8 + 4 + 4 + 8 + 1; // = 89

const HANDLE_LEN: usize = 64;
const FORMAT_LEN: usize = 16;

/// Common prefix present at the start of every shared-memory region handed
/// from a worker process back to the supervisor.
#[derive(Debug, Clone, PartialEq)]
pub struct SharedMemoryHeader {
    /// Cross-process-unique handle name, printable ASCII, zero-padded.
    pub handle: String,
    /// Total size in bytes of the region, header included.
    pub size: u64,
    /// PID of the process that produced this region.
    pub producer_pid: u32,
    /// Monotonic counter per handle name, guards against ABA handle reuse.
    pub generation: u32,
    /// Creation timestamp (unix seconds, fractional).
    pub created_at: f64,
    /// Whether the region still holds valid data.
    pub valid: bool,
}

impl SharedMemoryHeader {
    /// Packs the header into its fixed 89-byte little-endian layout.
    pub fn pack(&self) -> [u8; HEADER_SIZE] {
        let mut buf = [0u8; HEADER_SIZE];
        pack_handle(&self.handle, &mut buf[0..HANDLE_LEN]);
        buf[64..72].copy_from_slice(&self.size.to_le_bytes());
        buf[72..76].copy_from_slice(&self.producer_pid.to_le_bytes());
        buf[76..80].copy_from_slice(&self.generation.to_le_bytes());
        buf[80..88].copy_from_slice(&self.created_at.to_le_bytes());
        buf[88] = u8::from(self.valid);
        buf
    }

    /// Unpacks a header from its fixed 89-byte little-endian layout.
    pub fn unpack(buf: &[u8]) -> Result<Self, Error> {
        if buf.len() < HEADER_SIZE {
            return Err(Error::MissingField("shared_memory_header"));
        }
        Ok(Self {
            handle: unpack_handle(&buf[0..HANDLE_LEN]),
            size: u64::from_le_bytes(buf[64..72].try_into().expect("8 bytes")),
            producer_pid: u32::from_le_bytes(buf[72..76].try_into().expect("4 bytes")),
            generation: u32::from_le_bytes(buf[76..80].try_into().expect("4 bytes")),
            created_at: f64::from_le_bytes(buf[80..88].try_into().expect("8 bytes")),
            valid: buf[88] != 0,
        })
    }

    /// Checks that a consumer may trust this header: `valid` must be set
    /// and `generation` must match what the referencing message claimed.
    pub fn check_fresh(&self, expected_generation: u32) -> Result<(), Error> {
        if !self.valid {
            return Err(Error::StaleHandle {
                handle: self.handle.clone(),
                reason: "valid flag unset",
            });
        }
        if self.generation != expected_generation {
            return Err(Error::StaleHandle {
                handle: self.handle.clone(),
                reason: "generation mismatch",
            });
        }
        Ok(())
    }
}

/// [`SharedMemoryHeader`] extended with RGBA8 image framing.
#[derive(Debug, Clone, PartialEq)]
pub struct RgbaHeader {
    /// The common shared-memory prefix.
    pub base: SharedMemoryHeader,
    /// Image width in pixels.
    pub width: u32,
    /// Image height in pixels.
    pub height: u32,
    /// Row stride in bytes; invariant: `stride >= width * 4`.
    pub stride: u32,
    /// Pixel format tag, e.g. `"RGBA8"`.
    pub format: String,
}

/// Offset at which RGBA8 pixel data begins within the shared region.
pub const RGBA_PAYLOAD_OFFSET: usize = HEADER_SIZE + 4 + 4 + 4 + FORMAT_LEN;

impl RgbaHeader {
    /// Constructs a header, validating the `stride >= width * 4` invariant.
    pub fn new(base: SharedMemoryHeader, width: u32, height: u32, stride: u32) -> Self {
        debug_assert!(stride >= width * 4, "stride must cover 4 bytes per pixel");
        Self {
            base,
            width,
            height,
            stride,
            format: "RGBA8".to_string(),
        }
    }

    /// Packs base header + RGBA extension fields.
    pub fn pack(&self) -> Vec<u8> {
        let mut buf = self.base.pack().to_vec();
        buf.extend_from_slice(&self.width.to_le_bytes());
        buf.extend_from_slice(&self.height.to_le_bytes());
        buf.extend_from_slice(&self.stride.to_le_bytes());
        let mut format_field = [0u8; FORMAT_LEN];
        pack_handle(&self.format, &mut format_field);
        buf.extend_from_slice(&format_field);
        buf
    }

    /// Unpacks base header + RGBA extension fields.
    pub fn unpack(buf: &[u8]) -> Result<Self, Error> {
        let base = SharedMemoryHeader::unpack(buf)?;
        let mut off = HEADER_SIZE;
        let width = read_u32(buf, off)?;
        off += 4;
        let height = read_u32(buf, off)?;
        off += 4;
        let stride = read_u32(buf, off)?;
        off += 4;
        let format = unpack_handle(buf.get(off..off + FORMAT_LEN).ok_or(Error::MissingField("format"))?);
        Ok(Self {
            base,
            width,
            height,
            stride,
            format,
        })
    }
}

/// [`SharedMemoryHeader`] extended with FFT analysis parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct FftHeader {
    /// The common shared-memory prefix.
    pub base: SharedMemoryHeader,
    /// Number of output bars/bins.
    pub bins: u32,
    /// Analysis window size in samples.
    pub window: u32,
    /// Input sample rate in Hz.
    pub sample_rate: u32,
    /// Smoothing time constant.
    pub tau: f64,
    /// Decay rate applied between frames.
    pub decay: f64,
}

impl FftHeader {
    /// Packs base header + FFT extension fields.
    pub fn pack(&self) -> Vec<u8> {
        let mut buf = self.base.pack().to_vec();
        buf.extend_from_slice(&self.bins.to_le_bytes());
        buf.extend_from_slice(&self.window.to_le_bytes());
        buf.extend_from_slice(&self.sample_rate.to_le_bytes());
        buf.extend_from_slice(&self.tau.to_le_bytes());
        buf.extend_from_slice(&self.decay.to_le_bytes());
        buf
    }

    /// Unpacks base header + FFT extension fields.
    pub fn unpack(buf: &[u8]) -> Result<Self, Error> {
        let base = SharedMemoryHeader::unpack(buf)?;
        let mut off = HEADER_SIZE;
        let bins = read_u32(buf, off)?;
        off += 4;
        let window = read_u32(buf, off)?;
        off += 4;
        let sample_rate = read_u32(buf, off)?;
        off += 4;
        let tau = read_f64(buf, off)?;
        off += 8;
        let decay = read_f64(buf, off)?;
        Ok(Self {
            base,
            bins,
            window,
            sample_rate,
            tau,
            decay,
        })
    }
}

fn pack_handle(s: &str, out: &mut [u8]) {
    let bytes = s.as_bytes();
    let n = bytes.len().min(out.len());
    out[..n].copy_from_slice(&bytes[..n]);
}

fn unpack_handle(buf: &[u8]) -> String {
    let end = buf.iter().position(|&b| b == 0).unwrap_or(buf.len());
    String::from_utf8_lossy(&buf[..end]).into_owned()
}

fn read_u32(buf: &[u8], off: usize) -> Result<u32, Error> {
    buf.get(off..off + 4)
        .map(|b| u32::from_le_bytes(b.try_into().expect("4 bytes")))
        .ok_or(Error::MissingField("u32 field"))
}

fn read_f64(buf: &[u8], off: usize) -> Result<f64, Error> {
    buf.get(off..off + 8)
        .map(|b| f64::from_le_bytes(b.try_into().expect("8 bytes")))
        .ok_or(Error::MissingField("f64 field"))
}

/// Builds a cross-process-unique shared-memory handle name for image
/// payloads, per spec.md §6: `srpss_img_{12 hex chars}`.
pub fn new_image_handle_name(generation: u32, pid: u32) -> String {
    format!("srpss_img_{:012x}", (u64::from(pid) << 32) ^ u64::from(generation))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn sample_base() -> SharedMemoryHeader {
        SharedMemoryHeader {
            handle: "srpss_img_000000000001".to_string(),
            size: 4096,
            producer_pid: 1234,
            generation: 7,
            created_at: 1_700_000_000.5,
            valid: true,
        }
    }

    #[test]
    fn base_header_round_trips() {
        let h = sample_base();
        let packed = h.pack();
        assert_eq!(packed.len(), HEADER_SIZE);
        let unpacked = SharedMemoryHeader::unpack(&packed).unwrap();
        assert_eq!(unpacked, h);
    }

    #[test]
    fn rgba_header_round_trips_and_enforces_stride() {
        let rgba = RgbaHeader::new(sample_base(), 1920, 1080, 1920 * 4);
        let packed = rgba.pack();
        let unpacked = RgbaHeader::unpack(&packed).unwrap();
        assert_eq!(unpacked, rgba);
        assert!(unpacked.stride >= unpacked.width * 4);
    }

    #[test]
    fn fft_header_round_trips() {
        let fft = FftHeader {
            base: sample_base(),
            bins: 64,
            window: 2048,
            sample_rate: 44100,
            tau: 0.35,
            decay: 0.85,
        };
        let packed = fft.pack();
        let unpacked = FftHeader::unpack(&packed).unwrap();
        assert_eq!(unpacked, fft);
    }

    #[test]
    fn stale_generation_is_rejected() {
        let h = sample_base();
        assert!(h.check_fresh(7).is_ok());
        assert!(h.check_fresh(8).is_err());
        let mut invalid = h.clone();
        invalid.valid = false;
        assert!(invalid.check_fresh(7).is_err());
    }
}
