use std::borrow::Cow;
use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use super::model::KokoroError;

/// Style vector dimension for Kokoro.
pub const STYLE_DIM: usize = 256;

const NPY_MAGIC: &[u8] = b"\x93NUMPY";

/// The style vectors of one voice (or blend), indexed by phoneme token count.
#[derive(Debug, Clone, PartialEq)]
pub struct StyleTable(Vec<[f32; STYLE_DIM]>);

impl StyleTable {
    /// Style for an utterance of `idx` tokens. Out-of-range indexes clamp to
    /// the last entry.
    pub fn style_at(&self, idx: usize) -> [f32; STYLE_DIM] {
        let clamped = idx.min(self.0.len().saturating_sub(1));
        self.0.get(clamped).copied().unwrap_or([0.0; STYLE_DIM])
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Serialize as a `.npy` file holding a little-endian `float32` array of
    /// shape `[len, 256]`, the same layout the voice archive uses.
    pub fn to_npy(&self) -> Vec<u8> {
        let dict = format!(
            "{{'descr': '<f4', 'fortran_order': False, 'shape': ({}, {STYLE_DIM}), }}",
            self.0.len()
        );
        // Header (magic + version + length + dict + '\n') is padded to 64 bytes.
        let unpadded = NPY_MAGIC.len() + 4 + dict.len() + 1;
        let padding = (64 - unpadded % 64) % 64;
        let header_len = dict.len() + padding + 1;

        let mut out = Vec::with_capacity(unpadded + padding + self.0.len() * STYLE_DIM * 4);
        out.extend_from_slice(NPY_MAGIC);
        out.extend_from_slice(&[1, 0]);
        out.extend_from_slice(&(header_len as u16).to_le_bytes());
        out.extend_from_slice(dict.as_bytes());
        out.resize(out.len() + padding, b' ');
        out.push(b'\n');
        for vector in &self.0 {
            for value in vector {
                out.extend_from_slice(&value.to_le_bytes());
            }
        }
        out
    }
}

/// Storage for all loaded voice style tables.
pub struct VoiceStore {
    voices: HashMap<String, StyleTable>,
}

impl VoiceStore {
    /// Load all voices from a .npz (numpy zip) archive whose entries are
    /// named after the voice, e.g. `af_heart.npy`.
    pub fn load(path: &Path) -> Result<Self, KokoroError> {
        let file = File::open(path)?;
        let mut zip = zip::ZipArchive::new(file)
            .map_err(|e| KokoroError::VoiceParse(format!("Failed to open zip archive: {e}")))?;

        let mut voices = HashMap::new();
        for i in 0..zip.len() {
            let mut entry = zip.by_index(i).map_err(|e| {
                KokoroError::VoiceParse(format!("Failed to read zip entry {i}: {e}"))
            })?;

            let raw_name = entry.name().to_string();
            if raw_name.ends_with('/') {
                continue;
            }
            let voice_name = raw_name.trim_end_matches(".npy").to_string();
            if voice_name.is_empty() {
                continue;
            }

            let mut data = Vec::new();
            entry
                .read_to_end(&mut data)
                .map_err(|e| KokoroError::VoiceParse(format!("Failed to read {raw_name}: {e}")))?;
            voices.insert(voice_name, parse_npy(&data, &raw_name)?);
        }

        log::info!("Loaded {} voices", voices.len());
        Ok(Self { voices })
    }

    #[cfg(test)]
    pub(crate) fn from_tables(voices: HashMap<String, StyleTable>) -> Self {
        Self { voices }
    }

    /// Style table for a voice id or a `+`-joined blend.
    pub fn resolve(&self, voice: &str) -> Result<Cow<'_, StyleTable>, KokoroError> {
        if voice.contains('+') {
            let ids: Vec<&str> = voice.split('+').map(str::trim).collect();
            return self.blend(&ids).map(Cow::Owned);
        }
        self.voices
            .get(voice.trim())
            .map(Cow::Borrowed)
            .ok_or_else(|| KokoroError::VoiceNotFound(voice.to_string()))
    }

    /// Element-wise mean of the named voices' style tables, truncated to the
    /// shortest table.
    pub fn blend(&self, ids: &[&str]) -> Result<StyleTable, KokoroError> {
        if ids.len() < 2 || ids.iter().any(|id| id.is_empty()) {
            return Err(KokoroError::InvalidBlend(ids.join("+")));
        }
        let tables = ids
            .iter()
            .map(|id| {
                self.voices
                    .get(*id)
                    .ok_or_else(|| KokoroError::VoiceNotFound(id.to_string()))
            })
            .collect::<Result<Vec<_>, _>>()?;

        let rows = tables.iter().map(|t| t.len()).min().unwrap_or(0);
        let weight = 1.0 / tables.len() as f32;
        let blended = (0..rows)
            .map(|row| {
                let mut mixed = [0f32; STYLE_DIM];
                for table in &tables {
                    for (acc, value) in mixed.iter_mut().zip(table.0[row].iter()) {
                        *acc += value * weight;
                    }
                }
                mixed
            })
            .collect();
        Ok(StyleTable(blended))
    }

    /// All voice names in sorted order.
    pub fn list_voices(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.voices.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

/// Parse a numpy .npy file holding a little-endian `float32` array of shape
/// `[N, 256]`.
pub fn parse_npy(data: &[u8], name: &str) -> Result<StyleTable, KokoroError> {
    let parse_err = |msg: String| KokoroError::VoiceParse(format!("{name}: {msg}"));

    if data.len() < 10 {
        return Err(parse_err(format!("file too short ({} bytes)", data.len())));
    }
    if &data[..6] != NPY_MAGIC {
        return Err(parse_err("invalid numpy magic bytes".to_string()));
    }

    // major version at [6], minor at [7], header_len at [8..10]
    let header_len = u16::from_le_bytes([data[8], data[9]]) as usize;
    let data_offset = 10 + header_len;
    let Some(float_data) = data.get(data_offset..) else {
        return Err(parse_err(format!(
            "header truncated (need {data_offset} bytes, got {})",
            data.len()
        )));
    };

    let row_bytes = STYLE_DIM * 4;
    if float_data.len() % row_bytes != 0 {
        return Err(parse_err(format!(
            "{} data bytes do not form whole {STYLE_DIM}-float style vectors",
            float_data.len()
        )));
    }

    let rows = float_data
        .chunks_exact(row_bytes)
        .map(|row| {
            let mut vector = [0f32; STYLE_DIM];
            for (slot, bytes) in vector.iter_mut().zip(row.chunks_exact(4)) {
                *slot = f32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
            }
            vector
        })
        .collect();
    Ok(StyleTable(rows))
}
