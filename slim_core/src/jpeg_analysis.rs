//! JPEG header analysis.
//!
//! Walks the marker stream directly: quantization tables (for source
//! quality estimation), SOF dimensions and component layout, progressive
//! flag, APP1/EXIF and APP2/ICC presence. No entropy-coded data is
//! touched.

#![allow(clippy::needless_range_loop)]

use serde::{Deserialize, Serialize};

const MARKER_SOI: u8 = 0xD8;
const MARKER_DQT: u8 = 0xDB;
const MARKER_SOS: u8 = 0xDA;
const MARKER_EOI: u8 = 0xD9;
const MARKER_SOF0: u8 = 0xC0;
const MARKER_SOF2: u8 = 0xC2;
const MARKER_APP1: u8 = 0xE1;
const MARKER_APP2: u8 = 0xE2;

const ZIGZAG_ORDER: [usize; 64] = [
    0, 1, 8, 16, 9, 2, 3, 10, 17, 24, 32, 25, 18, 11, 4, 5, 12, 19, 26, 33, 40, 48, 41, 34, 27, 20,
    13, 6, 7, 14, 21, 28, 35, 42, 49, 56, 57, 50, 43, 36, 29, 22, 15, 23, 30, 37, 44, 51, 58, 59,
    52, 45, 38, 31, 39, 46, 53, 60, 61, 54, 47, 55, 62, 63,
];

/// Average value of the standard IJG luminance base table; the anchor of
/// the inverse quality mapping.
const IJG_LUMA_BASE_AVG: f64 = 57.625;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JpegHeader {
    pub width: u32,
    pub height: u32,
    pub component_count: u8,
    pub estimated_quality: Option<u8>,
    pub is_progressive: bool,
    pub has_exif: bool,
    pub has_icc_profile: bool,
}

/// Parse the marker stream up to SOS. Total: returns whatever could be
/// read even from truncated input.
pub fn analyze(data: &[u8]) -> JpegHeader {
    let mut header = JpegHeader::default();

    let tables = extract_quantization_tables(data);
    if let Some(table) = tables.first() {
        header.estimated_quality = Some(estimate_quality_from_table(table));
    }

    let mut pos = 2;
    if data.len() < 2 || data[0] != 0xFF || data[1] != MARKER_SOI {
        return header;
    }

    while pos + 1 < data.len() {
        if data[pos] != 0xFF {
            pos += 1;
            continue;
        }
        while pos < data.len() && data[pos] == 0xFF {
            pos += 1;
        }
        if pos >= data.len() {
            break;
        }
        let marker = data[pos];
        pos += 1;

        if marker == MARKER_SOI || marker == MARKER_EOI || (0xD0..=0xD7).contains(&marker) {
            continue;
        }
        if pos + 2 > data.len() {
            break;
        }
        let length = ((data[pos] as usize) << 8) | (data[pos + 1] as usize);
        let seg_start = (pos + 2).min(data.len());
        let seg_end = (pos + length).min(data.len()).max(seg_start);
        let segment = &data[seg_start..seg_end];

        match marker {
            MARKER_SOF2 => {
                header.is_progressive = true;
                read_sof(segment, &mut header);
            }
            // Baseline and the other non-differential Huffman SOFs.
            MARKER_SOF0 | 0xC1 | 0xC3 => {
                read_sof(segment, &mut header);
            }
            MARKER_APP1 => {
                if segment.starts_with(b"Exif\0\0") {
                    header.has_exif = true;
                }
            }
            MARKER_APP2 => {
                if segment.starts_with(b"ICC_PROFILE\0") {
                    header.has_icc_profile = true;
                }
            }
            MARKER_SOS => break,
            _ => {}
        }

        pos += length;
    }

    header
}

fn read_sof(segment: &[u8], header: &mut JpegHeader) {
    if segment.len() >= 6 {
        header.height = u16::from_be_bytes([segment[1], segment[2]]) as u32;
        header.width = u16::from_be_bytes([segment[3], segment[4]]) as u32;
        header.component_count = segment[5];
    }
}

/// Extract all quantization tables (de-zigzagged) from DQT segments.
/// Handles both 8-bit and 16-bit precision tables.
pub fn extract_quantization_tables(data: &[u8]) -> Vec<[[u16; 8]; 8]> {
    let mut tables = Vec::new();

    if data.len() < 2 || data[0] != 0xFF || data[1] != MARKER_SOI {
        return tables;
    }
    let mut pos = 2;

    while pos + 1 < data.len() {
        if data[pos] != 0xFF {
            pos += 1;
            continue;
        }
        while pos < data.len() && data[pos] == 0xFF {
            pos += 1;
        }
        if pos >= data.len() {
            break;
        }
        let marker = data[pos];
        pos += 1;

        if marker == MARKER_SOI || marker == MARKER_EOI || (0xD0..=0xD7).contains(&marker) {
            continue;
        }
        if pos + 2 > data.len() {
            break;
        }
        let length = ((data[pos] as usize) << 8) | (data[pos + 1] as usize);

        if marker == MARKER_DQT {
            let segment_end = (pos + length).min(data.len());
            let mut seg_pos = pos + 2;

            while seg_pos < segment_end {
                let pq_tq = data[seg_pos];
                let precision = (pq_tq >> 4) & 0x0F;
                seg_pos += 1;

                let mut table = [[0u16; 8]; 8];
                if precision == 0 {
                    if seg_pos + 64 > data.len() {
                        break;
                    }
                    for i in 0..64 {
                        let row = ZIGZAG_ORDER[i] / 8;
                        let col = ZIGZAG_ORDER[i] % 8;
                        table[row][col] = data[seg_pos] as u16;
                        seg_pos += 1;
                    }
                } else {
                    if seg_pos + 128 > data.len() {
                        break;
                    }
                    for i in 0..64 {
                        let row = ZIGZAG_ORDER[i] / 8;
                        let col = ZIGZAG_ORDER[i] % 8;
                        table[row][col] = ((data[seg_pos] as u16) << 8) | (data[seg_pos + 1] as u16);
                        seg_pos += 2;
                    }
                }
                tables.push(table);
            }
        }

        pos += length;
        if marker == MARKER_SOS {
            break;
        }
    }

    tables
}

/// Estimate source quality from a quantization table via the inverse IJG
/// mapping.
///
/// The IJG scaling is `scale = 5000/q` for q < 50 and `200 - 2q`
/// otherwise; the table average approximates `base_avg * scale / 100`,
/// so inverting through the luminance base average recovers q.
pub fn estimate_quality_from_table(table: &[[u16; 8]; 8]) -> u8 {
    let sum: u32 = table.iter().flatten().map(|&v| v as u32).sum();
    let avg_q = sum as f64 / 64.0;
    estimate_quality_from_avg(avg_q)
}

pub fn estimate_quality_from_avg(avg_q: f64) -> u8 {
    if avg_q <= 0.5 {
        return 100;
    }
    let scale = (avg_q / IJG_LUMA_BASE_AVG) * 100.0;
    let quality = if scale < 100.0 {
        (200.0 - scale) / 2.0
    } else {
        5000.0 / scale
    };
    (quality as i32).clamp(1, 100) as u8
}

/// Standard IJG quantization table generation. Used by tests to verify
/// the inverse mapping round-trips, and kept public because the mozjpeg
/// cap search reuses it to sanity-check re-encoded output.
pub fn generate_standard_qt(quality: u8, base_table: &[[u16; 8]; 8]) -> [[u16; 8]; 8] {
    let q = quality.clamp(1, 100) as f64;
    let scale = if q < 50.0 { 5000.0 / q } else { 200.0 - 2.0 * q };

    let mut result = [[0u16; 8]; 8];
    for i in 0..8 {
        for j in 0..8 {
            let value = ((scale * base_table[i][j] as f64) + 50.0) / 100.0;
            result[i][j] = value.floor().clamp(1.0, 255.0) as u16;
        }
    }
    result
}

pub const IJG_LUMINANCE_BASE: [[u16; 8]; 8] = [
    [16, 11, 10, 16, 24, 40, 51, 61],
    [12, 12, 14, 19, 26, 58, 60, 55],
    [14, 13, 16, 24, 40, 57, 69, 56],
    [14, 17, 22, 29, 51, 87, 80, 62],
    [18, 22, 37, 56, 68, 109, 103, 77],
    [24, 35, 55, 64, 81, 104, 113, 92],
    [49, 64, 78, 87, 103, 121, 120, 101],
    [72, 92, 95, 98, 112, 100, 103, 99],
];


#[cfg(test)]
mod prop_tests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        /// Table extraction and header analysis never panic on arbitrary
        /// bytes.
        #[test]
        fn prop_analyze_total(data in proptest::collection::vec(any::<u8>(), 0..2048)) {
            let _ = extract_quantization_tables(&data);
            let _ = analyze(&data);
        }

        /// The estimate is always a valid quality value.
        #[test]
        fn prop_estimate_in_range(avg in 0.0f64..4096.0) {
            let q = estimate_quality_from_avg(avg);
            prop_assert!((1..=100).contains(&q));
        }
    }
}
