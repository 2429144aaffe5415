// Licensed under the Apache-2.0 license

//! Turns the raw bytes of an image region into the buffer that is streamed to the device.
//!
//! The device stores 32-bit words little-endian, so every 4-byte group of the region is
//! reversed before transmission. The region is first rounded up to a whole number of
//! words, and the final transfer buffer is padded with `0xFF` (erased flash) to a whole
//! number of payloads.

pub const WORD_SIZE: usize = 4;
pub const PADDING_BYTE: u8 = 0xff;

pub fn align4(size: usize) -> usize {
    match size % WORD_SIZE {
        0 => size,
        rem => size + (WORD_SIZE - rem),
    }
}

/// Total length of `chunks`, rounded up to a multiple of 4.
pub fn calculate_size<C: AsRef<[u8]>>(chunks: &[C]) -> usize {
    align4(chunks.iter().map(|c| c.as_ref().len()).sum())
}

pub fn flatten_raw<C: AsRef<[u8]>>(chunks: &[C]) -> Vec<u8> {
    chunks.iter().flat_map(|c| c.as_ref().iter().copied()).collect()
}

/// Reverses each 4-byte group of `raw`, zero-filling the last group, and returns exactly
/// `size` bytes. `size` must be a multiple of 4.
pub fn convert_to_little_endian(raw: &[u8], size: usize) -> Vec<u8> {
    let mut words = raw.to_vec();
    words.resize(align4(size), 0);
    words
        .chunks_exact(WORD_SIZE)
        .flat_map(|word| word.iter().rev().copied())
        .collect()
}

/// Appends `0xFF` until `data` holds a whole number of `payload_size` chunks.
pub fn pad_to_payload_size(data: &mut Vec<u8>, payload_size: usize) {
    let rem = data.len() % payload_size;
    if rem != 0 {
        data.resize(data.len() + payload_size - rem, PADDING_BYTE);
    }
}

/// Payload `index` of `data`, or `None` past the end.
pub fn chunk(data: &[u8], payload_size: usize, index: usize) -> Option<&[u8]> {
    let start = index.checked_mul(payload_size)?;
    data.get(start..start.checked_add(payload_size)?)
}

/// A named region of the firmware image, ready for transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    name: String,
    raw_data: Vec<u8>,
    converted_data: Vec<u8>,
    size: usize,
}

impl Segment {
    pub fn new<C: AsRef<[u8]>>(name: &str, chunks: &[C]) -> Self {
        let size = calculate_size(chunks);
        let raw_data = flatten_raw(chunks);
        let converted_data = convert_to_little_endian(&raw_data, size);
        Self {
            name: name.to_string(),
            raw_data,
            converted_data,
            size,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn raw_data(&self) -> &[u8] {
        &self.raw_data
    }

    /// Word-swapped bytes, `size()` long.
    pub fn converted_data(&self) -> &[u8] {
        &self.converted_data
    }

    /// Region size rounded up to a multiple of 4.
    pub fn size(&self) -> usize {
        self.size
    }

    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    pub fn packet_count(&self, payload_size: usize) -> usize {
        self.size.div_ceil(payload_size)
    }

    /// Converted data padded with `0xFF` to a multiple of `payload_size`.
    pub fn transfer_buffer(&self, payload_size: usize) -> Vec<u8> {
        let mut data = self.converted_data.clone();
        pad_to_payload_size(&mut data, payload_size);
        data
    }
}
