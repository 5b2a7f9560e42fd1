//! Style vectors from the `voices-*.bin` archive.
//!
//! The archive is a NumPy `.npz` (a zip of `.npy` files), one entry per
//! voice. Each entry is a little-endian f32 array whose first axis is indexed
//! by token count; the remaining axes flatten into one style row.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use anyhow::{anyhow, bail, Context, Result};

/// Refuse to inflate absurdly large entries from an untrusted archive.
const MAX_NPY_ENTRY_BYTES: u64 = 64 * 1024 * 1024;

#[derive(Debug)]
pub struct VoiceStyle {
    rows: usize,
    cols: usize,
    data: Vec<f32>,
}

impl VoiceStyle {
    /// Style row for a batch of `token_count` tokens, clamped to the last row.
    pub fn row_for(&self, token_count: usize) -> &[f32] {
        let index = token_count.min(self.rows - 1);
        let start = index * self.cols;
        &self.data[start..start + self.cols]
    }

    pub fn cols(&self) -> usize {
        self.cols
    }
}

#[derive(Debug)]
pub struct VoiceTable {
    voices: BTreeMap<String, VoiceStyle>,
}

impl VoiceTable {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)
            .with_context(|| format!("Failed to open voices archive: {}", path.display()))?;
        let mut archive = zip::ZipArchive::new(file)
            .with_context(|| format!("Failed to read npz archive: {}", path.display()))?;

        let mut voices = BTreeMap::new();
        for i in 0..archive.len() {
            let mut entry = archive.by_index(i)?;
            let name = entry.name().to_string();
            let Some(key) = name.strip_suffix(".npy") else {
                continue;
            };

            let mut raw = Vec::new();
            (&mut entry)
                .take(MAX_NPY_ENTRY_BYTES + 1)
                .read_to_end(&mut raw)?;
            if raw.len() as u64 > MAX_NPY_ENTRY_BYTES {
                bail!("voice entry '{name}' exceeds {MAX_NPY_ENTRY_BYTES} bytes");
            }

            let style = parse_npy(&raw).with_context(|| format!("Invalid voice entry: {name}"))?;
            voices.insert(key.to_string(), style);
        }

        if voices.is_empty() {
            bail!("voices archive {} contains no .npy entries", path.display());
        }
        Ok(Self { voices })
    }

    pub fn get(&self, voice: &str) -> Result<&VoiceStyle> {
        self.voices
            .get(voice)
            .ok_or_else(|| anyhow!("voice '{voice}' not found in voices archive"))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.voices.keys().map(String::as_str)
    }
}

fn parse_npy(bytes: &[u8]) -> Result<VoiceStyle> {
    if bytes.len() < 10 || &bytes[0..6] != b"\x93NUMPY" {
        bail!("not an npy payload");
    }

    let (header_len, header_start) = match bytes[6] {
        1 => (u16::from_le_bytes([bytes[8], bytes[9]]) as usize, 10),
        2 | 3 if bytes.len() >= 12 => (
            u32::from_le_bytes([bytes[8], bytes[9], bytes[10], bytes[11]]) as usize,
            12,
        ),
        v => bail!("unsupported npy version {v}"),
    };
    let header_end = header_start + header_len;
    if bytes.len() < header_end {
        bail!("npy header runs past end of payload");
    }
    let header = std::str::from_utf8(&bytes[header_start..header_end])
        .context("npy header is not utf-8")?;

    if !header.contains("'descr': '<f4'") {
        bail!("expected little-endian f32 data, header: {}", header.trim());
    }
    if header.contains("'fortran_order': True") {
        bail!("fortran-ordered arrays are not supported");
    }
    let shape = parse_shape(header).ok_or_else(|| anyhow!("npy header has no shape"))?;
    let (&rows, rest) = shape
        .split_first()
        .ok_or_else(|| anyhow!("npy array is zero-dimensional"))?;
    let cols: usize = rest.iter().product();
    if rows == 0 || cols == 0 {
        bail!("empty style array {shape:?}");
    }

    let data_bytes = &bytes[header_end..];
    if data_bytes.len() != rows * cols * 4 {
        bail!(
            "npy data size mismatch: expected {} bytes, got {}",
            rows * cols * 4,
            data_bytes.len()
        );
    }
    let data = data_bytes
        .chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect();

    Ok(VoiceStyle { rows, cols, data })
}

fn parse_shape(header: &str) -> Option<Vec<usize>> {
    let start = header.find("'shape':")? + "'shape':".len();
    let rest = &header[start..];
    let open = rest.find('(')?;
    let close = rest.find(')')?;
    rest[open + 1..close]
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| s.parse().ok())
        .collect()
}
