use std::collections::HashMap;
use std::io::{Read, Seek};

use lazy_static::lazy_static;
use ndarray::{Array2, ArrayView1};
use regex::Regex;

use crate::error::AppError;

pub const STYLE_DIM: usize = 256;

const NPY_MAGIC: &[u8] = b"\x93NUMPY";

lazy_static! {
    static ref DESCR_REGEX: Regex = Regex::new(r"'descr'\s*:\s*'([^']*)'").unwrap();
    static ref FORTRAN_REGEX: Regex = Regex::new(r"'fortran_order'\s*:\s*(True|False)").unwrap();
    static ref SHAPE_REGEX: Regex = Regex::new(r"'shape'\s*:\s*\(([^)]*)\)").unwrap();
}

/// Per-voice style matrices, one row per input token count.
#[derive(Debug, Default)]
pub struct VoiceBank {
    styles: HashMap<String, Array2<f32>>,
}

impl VoiceBank {
    /// Read an npz archive of `<voice>.npy` float32 arrays shaped
    /// `(rows, 1, 256)` or `(rows, 256)`.
    pub fn from_npz<R: Read + Seek>(reader: R) -> Result<Self, AppError> {
        let mut archive = zip::ZipArchive::new(reader)
            .map_err(|e| AppError::Engine(format!("Invalid voice bank: {}", e)))?;

        let mut styles = HashMap::new();
        for index in 0..archive.len() {
            let mut entry = archive
                .by_index(index)
                .map_err(|e| AppError::Engine(format!("Invalid voice bank: {}", e)))?;
            let Some(voice) = entry.name().strip_suffix(".npy").map(str::to_string) else {
                continue;
            };

            let mut raw = Vec::with_capacity(entry.size() as usize);
            entry.read_to_end(&mut raw)?;
            let (shape, data) = parse_npy(&raw)
                .map_err(|e| AppError::Engine(format!("Voice {}: {}", voice, e)))?;

            let columns = shape.last().copied().unwrap_or(0);
            if columns != STYLE_DIM {
                return Err(AppError::Engine(format!(
                    "Voice {}: expected style width {}, got {:?}",
                    voice, STYLE_DIM, shape
                )));
            }
            let rows = data.len() / STYLE_DIM;
            let matrix = Array2::from_shape_vec((rows, STYLE_DIM), data)
                .map_err(|e| AppError::Engine(format!("Voice {}: {}", voice, e)))?;
            styles.insert(voice, matrix);
        }

        Ok(Self { styles })
    }

    pub fn contains(&self, voice: &str) -> bool {
        self.styles.contains_key(voice)
    }

    pub fn len(&self) -> usize {
        self.styles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.styles.is_empty()
    }

    pub fn voices(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.styles.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// The style row for an utterance of `token_count` tokens.
    pub fn style(&self, voice: &str, token_count: usize) -> Option<ArrayView1<'_, f32>> {
        let matrix = self.styles.get(voice)?;
        if matrix.nrows() == 0 {
            return None;
        }
        let row = token_count.min(matrix.nrows() - 1);
        Some(matrix.row(row))
    }
}

/// Minimal reader for little-endian float32 `.npy` payloads.
fn parse_npy(raw: &[u8]) -> Result<(Vec<usize>, Vec<f32>), String> {
    if raw.len() < 10 || &raw[..6] != NPY_MAGIC {
        return Err("not an npy array".to_string());
    }

    let major = raw[6];
    let (header_len, header_start) = match major {
        1 => (u16::from_le_bytes([raw[8], raw[9]]) as usize, 10),
        2 | 3 => {
            if raw.len() < 12 {
                return Err("truncated npy header".to_string());
            }
            (
                u32::from_le_bytes([raw[8], raw[9], raw[10], raw[11]]) as usize,
                12,
            )
        }
        other => return Err(format!("unsupported npy version {}", other)),
    };

    let data_start = header_start + header_len;
    if raw.len() < data_start {
        return Err("truncated npy header".to_string());
    }
    let header = std::str::from_utf8(&raw[header_start..data_start])
        .map_err(|_| "npy header is not text".to_string())?;

    let descr = DESCR_REGEX
        .captures(header)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
        .ok_or("npy header missing descr")?;
    if descr != "<f4" {
        return Err(format!("unsupported dtype {}", descr));
    }

    if FORTRAN_REGEX
        .captures(header)
        .and_then(|c| c.get(1))
        .is_some_and(|m| m.as_str() == "True")
    {
        return Err("fortran-ordered arrays are not supported".to_string());
    }

    let shape: Vec<usize> = SHAPE_REGEX
        .captures(header)
        .and_then(|c| c.get(1))
        .ok_or("npy header missing shape")?
        .as_str()
        .split(',')
        .map(str::trim)
        .filter(|dim| !dim.is_empty())
        .map(|dim| dim.parse::<usize>().map_err(|_| format!("bad dimension {}", dim)))
        .collect::<Result<_, _>>()?;

    let expected = shape.iter().product::<usize>() * 4;
    let payload = &raw[data_start..];
    if payload.len() < expected {
        return Err(format!(
            "expected {} bytes of data, found {}",
            expected,
            payload.len()
        ));
    }

    let data = payload[..expected]
        .chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect();

    Ok((shape, data))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::io::{Cursor, Write};

    /// Encode a float32 array the way numpy.save does (format 1.0).
    pub(crate) fn npy_bytes(shape: &[usize], data: &[f32]) -> Vec<u8> {
        let dims: Vec<String> = shape.iter().map(|d| d.to_string()).collect();
        let shape_text = if dims.len() == 1 {
            format!("({},)", dims[0])
        } else {
            format!("({})", dims.join(", "))
        };
        let mut header = format!(
            "{{'descr': '<f4', 'fortran_order': False, 'shape': {}, }}",
            shape_text
        );
        while (10 + header.len() + 1) % 64 != 0 {
            header.push(' ');
        }
        header.push('\n');

        let mut out = Vec::new();
        out.extend_from_slice(NPY_MAGIC);
        out.extend_from_slice(&[1, 0]);
        out.extend_from_slice(&(header.len() as u16).to_le_bytes());
        out.extend_from_slice(header.as_bytes());
        for value in data {
            out.extend_from_slice(&value.to_le_bytes());
        }
        out
    }

    /// An npz archive holding one `(rows, 1, 256)` style matrix per voice,
    /// where every value of row `r` equals `r`.
    pub(crate) fn npz_bytes(voices: &[(&str, usize)]) -> Vec<u8> {
        let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
        let options = zip::write::SimpleFileOptions::default()
            .compression_method(zip::CompressionMethod::Stored);
        for (name, rows) in voices {
            let data: Vec<f32> = (0..*rows)
                .flat_map(|r| std::iter::repeat(r as f32).take(STYLE_DIM))
                .collect();
            writer.start_file(format!("{}.npy", name), options).unwrap();
            writer
                .write_all(&npy_bytes(&[*rows, 1, STYLE_DIM], &data))
                .unwrap();
        }
        writer.finish().unwrap().into_inner()
    }

    #[test]
    fn test_parse_npy() {
        let raw = npy_bytes(&[2, 3], &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        let (shape, data) = parse_npy(&raw).unwrap();
        assert_eq!(shape, vec![2, 3]);
        assert_eq!(data, vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
    }

    #[test]
    fn test_parse_npy_rejects_other_dtypes() {
        let mut raw = npy_bytes(&[1], &[1.0]);
        let pos = raw.windows(3).position(|w| w == b"<f4").unwrap();
        raw[pos + 2] = b'8';
        assert!(parse_npy(&raw).unwrap_err().contains("unsupported dtype"));
    }

    #[test]
    fn test_parse_npy_rejects_truncated_data() {
        let mut raw = npy_bytes(&[4], &[1.0, 2.0, 3.0, 4.0]);
        raw.truncate(raw.len() - 4);
        assert!(parse_npy(&raw).is_err());
        assert!(parse_npy(b"RIFF0000WAVE").is_err());
    }

    #[test]
    fn test_voice_bank_from_npz() {
        let bank = VoiceBank::from_npz(Cursor::new(npz_bytes(&[("af_heart", 8), ("am_adam", 4)])))
            .unwrap();
        assert_eq!(bank.len(), 2);
        assert_eq!(bank.voices(), vec!["af_heart", "am_adam"]);
        assert!(bank.contains("af_heart"));
        assert!(!bank.contains("bf_emma"));

        let style = bank.style("af_heart", 5).unwrap();
        assert_eq!(style.len(), STYLE_DIM);
        assert!(style.iter().all(|v| *v == 5.0));

        // Long inputs use the last row
        let style = bank.style("am_adam", 100).unwrap();
        assert!(style.iter().all(|v| *v == 3.0));

        assert!(bank.style("bf_emma", 1).is_none());
    }

    #[test]
    fn test_voice_bank_rejects_garbage() {
        assert!(matches!(
            VoiceBank::from_npz(Cursor::new(b"not a zip".to_vec())),
            Err(AppError::Engine(_))
        ));
    }
}
