//! Shared-memory delivery for results at or above the inline-payload size
//! threshold (spec.md §4.G, §6).
//!
//! Segments are kept alive in-process until evicted by `cap`, since
//! dropping a `Shmem` unmaps (and on most platforms unlinks) the backing
//! region the supervisor still needs to read.

use std::collections::VecDeque;
use std::time::{SystemTime, UNIX_EPOCH};
use worker_protocol::shm::{new_image_handle_name, RgbaHeader, SharedMemoryHeader, RGBA_PAYLOAD_OFFSET};
use shared_memory::{Shmem, ShmemConf};

const MAX_LIVE_SEGMENTS: usize = 32;

/// Owns every shared-memory segment this process has handed out that has
/// not yet been evicted.
pub struct ShmStore {
    generation: u32,
    segments: VecDeque<(String, Shmem)>,
}

impl ShmStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self {
            generation: 0,
            segments: VecDeque::new(),
        }
    }

    /// Writes `pixels` (already RGBA8) plus a packed [`RgbaHeader`] into a
    /// freshly created shared-memory segment, returning its handle name.
    pub fn store_rgba(&mut self, width: u32, height: u32, pixels: &[u8]) -> Result<String, std::io::Error> {
        self.generation = self.generation.wrapping_add(1);
        let pid = std::process::id();
        let handle_name = new_image_handle_name(self.generation, pid);

        let header = RgbaHeader::new(
            SharedMemoryHeader {
                handle: handle_name.clone(),
                size: (RGBA_PAYLOAD_OFFSET + pixels.len()) as u64,
                producer_pid: pid,
                generation: self.generation,
                created_at: unix_timestamp(),
                valid: true,
            },
            width,
            height,
            width * 4,
        );
        let packed_header = header.pack();
        let total_len = packed_header.len() + pixels.len();

        let shmem = ShmemConf::new()
            .size(total_len)
            .os_id(&handle_name)
            .create()
            .map_err(|err| std::io::Error::other(err.to_string()))?;

        // SAFETY: `shmem` was just created by this call with exactly
        // `total_len` bytes and has not yet been published (its handle
        // name is returned to the caller only after this write), so
        // nothing else observes the region while it is filled.
        unsafe {
            let region = std::slice::from_raw_parts_mut(shmem.as_ptr(), total_len);
            region[..packed_header.len()].copy_from_slice(&packed_header);
            region[packed_header.len()..].copy_from_slice(pixels);
        }

        self.segments.push_back((handle_name.clone(), shmem));
        if self.segments.len() > MAX_LIVE_SEGMENTS {
            self.segments.pop_front();
        }
        Ok(handle_name)
    }
}

impl Default for ShmStore {
    fn default() -> Self {
        Self::new()
    }
}

fn unix_timestamp() -> f64 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_secs_f64()
}
