//! Format-specific container utilities and helpers.
//!
//! Byte-level walkers shared by detection, header analysis, and metadata
//! stripping. Nothing here decodes pixel data.

/// PNG chunk stream helpers.
pub mod png {
    /// One chunk in a PNG stream. `raw` spans length + type + data + CRC
    /// so callers can copy chunks verbatim.
    #[derive(Debug, Clone, Copy)]
    pub struct Chunk<'a> {
        pub chunk_type: [u8; 4],
        pub data: &'a [u8],
        pub raw: &'a [u8],
    }

    pub const SIGNATURE: [u8; 8] = [0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];

    /// Iterates chunks after the signature. Stops at the first chunk
    /// whose declared length runs past the buffer; `trailing()` then
    /// returns the unparseable remainder.
    pub struct ChunkIter<'a> {
        data: &'a [u8],
        offset: usize,
    }

    impl<'a> ChunkIter<'a> {
        pub fn new(data: &'a [u8]) -> Option<Self> {
            if data.len() < 8 || data[..8] != SIGNATURE {
                return None;
            }
            Some(Self { data, offset: 8 })
        }

        /// Bytes not consumed by complete chunks (empty on well-formed
        /// input).
        pub fn trailing(&self) -> &'a [u8] {
            &self.data[self.offset.min(self.data.len())..]
        }
    }

    impl<'a> Iterator for ChunkIter<'a> {
        type Item = Chunk<'a>;

        fn next(&mut self) -> Option<Chunk<'a>> {
            let data = self.data;
            let offset = self.offset;
            if offset + 8 > data.len() {
                return None;
            }
            let length =
                u32::from_be_bytes([data[offset], data[offset + 1], data[offset + 2], data[offset + 3]])
                    as usize;
            let end = offset.checked_add(8 + length + 4)?;
            if end > data.len() {
                // Truncated chunk; leave it for trailing().
                return None;
            }
            let chunk_type = [data[offset + 4], data[offset + 5], data[offset + 6], data[offset + 7]];
            let chunk = Chunk {
                chunk_type,
                data: &data[offset + 8..offset + 8 + length],
                raw: &data[offset..end],
            };
            self.offset = end;
            Some(chunk)
        }
    }

    /// True when an acTL chunk appears before the first IDAT.
    pub fn is_apng(data: &[u8]) -> bool {
        let Some(iter) = ChunkIter::new(data) else {
            return false;
        };
        for chunk in iter {
            match &chunk.chunk_type {
                b"acTL" => return true,
                b"IDAT" => return false,
                _ => {}
            }
        }
        false
    }

    /// PLTE color count, when the image is palette-mode.
    pub fn palette_color_count(data: &[u8]) -> Option<usize> {
        let iter = ChunkIter::new(data)?;
        for chunk in iter {
            if &chunk.chunk_type == b"PLTE" {
                return Some(chunk.data.len() / 3);
            }
            if &chunk.chunk_type == b"IDAT" {
                break;
            }
        }
        None
    }

    /// tEXt / iTXt / zTXt presence before the image data.
    pub fn has_text_chunks(data: &[u8]) -> bool {
        let Some(iter) = ChunkIter::new(data) else {
            return false;
        };
        for chunk in iter {
            match &chunk.chunk_type {
                b"tEXt" | b"iTXt" | b"zTXt" => return true,
                b"IDAT" => return false,
                _ => {}
            }
        }
        false
    }

    /// IHDR fields needed without a decode: (width, height, bit_depth,
    /// color_type).
    pub fn ihdr(data: &[u8]) -> Option<(u32, u32, u8, u8)> {
        let mut iter = ChunkIter::new(data)?;
        let chunk = iter.next()?;
        if &chunk.chunk_type != b"IHDR" || chunk.data.len() < 13 {
            return None;
        }
        let d = chunk.data;
        let width = u32::from_be_bytes([d[0], d[1], d[2], d[3]]);
        let height = u32::from_be_bytes([d[4], d[5], d[6], d[7]]);
        Some((width, height, d[8], d[9]))
    }
}

/// WebP RIFF container helpers.
pub mod webp {
    pub fn is_lossless(data: &[u8]) -> bool {
        data.windows(4).any(|w| w == b"VP8L")
    }

    pub fn is_animated(data: &[u8]) -> bool {
        data.windows(4).any(|w| w == b"ANIM")
    }

    pub fn frame_count(data: &[u8]) -> u32 {
        let count = data.windows(4).filter(|w| *w == b"ANMF").count() as u32;
        count.max(1)
    }

    /// Canvas dimensions from VP8X, VP8L, or VP8 headers.
    pub fn dimensions(data: &[u8]) -> Option<(u32, u32)> {
        if data.len() < 30 || &data[..4] != b"RIFF" || &data[8..12] != b"WEBP" {
            return None;
        }
        let chunk = &data[12..16];
        match chunk {
            b"VP8X" => {
                // 24-bit canvas width/height minus one at offset 24.
                let w = 1 + u32::from_le_bytes([data[24], data[25], data[26], 0]);
                let h = 1 + u32::from_le_bytes([data[27], data[28], data[29], 0]);
                Some((w, h))
            }
            b"VP8L" => {
                // 14-bit width/height minus one packed after the 0x2F tag.
                if data[20] != 0x2F {
                    return None;
                }
                let bits = u32::from_le_bytes([data[21], data[22], data[23], data[24]]);
                let w = 1 + (bits & 0x3FFF);
                let h = 1 + ((bits >> 14) & 0x3FFF);
                Some((w, h))
            }
            b"VP8 " => {
                // Keyframe header: 3-byte frame tag, then 3-byte start
                // code 9D 01 2A, then 14-bit width/height.
                if data[23] != 0x9D || data[24] != 0x01 || data[25] != 0x2A {
                    return None;
                }
                let w = u16::from_le_bytes([data[26], data[27]]) as u32 & 0x3FFF;
                let h = u16::from_le_bytes([data[28], data[29]]) as u32 & 0x3FFF;
                Some((w, h))
            }
            _ => None,
        }
    }
}

/// GIF container helpers.
pub mod gif {
    pub fn dimensions(data: &[u8]) -> Option<(u32, u32)> {
        if data.len() < 10 || &data[..3] != b"GIF" {
            return None;
        }
        let w = u16::from_le_bytes([data[6], data[7]]) as u32;
        let h = u16::from_le_bytes([data[8], data[9]]) as u32;
        Some((w, h))
    }

    pub fn frame_count(data: &[u8]) -> u32 {
        if data.len() < 13 || &data[..3] != b"GIF" {
            return 0;
        }

        let mut pos = 6;
        let packed = data[pos + 4];
        let has_gct = (packed & 0x80) != 0;
        let gct_size = if has_gct {
            3 * (1usize << ((packed & 0x07) + 1))
        } else {
            0
        };
        pos += 7 + gct_size;

        let mut frames = 0u32;
        while pos < data.len() {
            match data[pos] {
                0x2C => {
                    frames += 1;
                    if pos + 10 > data.len() {
                        break;
                    }
                    let img_packed = data[pos + 9];
                    let lct_size = if (img_packed & 0x80) != 0 {
                        3 * (1usize << ((img_packed & 0x07) + 1))
                    } else {
                        0
                    };
                    pos += 10 + lct_size;
                    if pos >= data.len() {
                        break;
                    }
                    pos += 1; // LZW minimum code size
                    pos = skip_sub_blocks(data, pos);
                }
                0x21 => {
                    if pos + 2 >= data.len() {
                        break;
                    }
                    pos += 2;
                    pos = skip_sub_blocks(data, pos);
                }
                0x3B => break,
                _ => pos += 1,
            }
        }
        frames
    }

    pub fn is_animated(data: &[u8]) -> bool {
        frame_count(data) > 1
    }

    fn skip_sub_blocks(data: &[u8], mut pos: usize) -> usize {
        while pos < data.len() {
            let block_size = data[pos] as usize;
            pos += 1;
            if block_size == 0 {
                break;
            }
            pos += block_size;
        }
        pos
    }
}

/// BMP header helpers.
pub mod bmp {
    /// (width, height, bits_per_pixel) from the BITMAPINFOHEADER.
    pub fn header(data: &[u8]) -> Option<(u32, u32, u16)> {
        if data.len() < 30 || &data[..2] != b"BM" {
            return None;
        }
        let w = i32::from_le_bytes([data[18], data[19], data[20], data[21]]).unsigned_abs();
        let h = i32::from_le_bytes([data[22], data[23], data[24], data[25]]).unsigned_abs();
        let bpp = u16::from_le_bytes([data[28], data[29]]);
        Some((w, h, bpp))
    }
}

/// ISO-BMFF box helpers for AVIF / HEIC containers.
pub mod bmff {
    /// Container boxes that hold further boxes rather than payload.
    const CONTAINERS: [&[u8; 4]; 5] = [b"meta", b"iprp", b"ipco", b"moov", b"trak"];

    fn walk<'a, F: FnMut(&[u8; 4], &'a [u8])>(data: &'a [u8], visit: &mut F, depth: usize) {
        if depth > 6 {
            return;
        }
        let mut offset = 0usize;
        while offset + 8 <= data.len() {
            let size =
                u32::from_be_bytes([data[offset], data[offset + 1], data[offset + 2], data[offset + 3]])
                    as usize;
            let box_type: [u8; 4] = [
                data[offset + 4],
                data[offset + 5],
                data[offset + 6],
                data[offset + 7],
            ];
            // size 0 = "to end of file", size 1 = 64-bit size; both rare
            // in still images and not worth chasing here.
            if size < 8 {
                break;
            }
            let end = (offset + size).min(data.len());
            let body = &data[offset + 8..end];
            visit(&box_type, body);
            if CONTAINERS.iter().any(|c| **c == box_type) {
                // meta is a FullBox: 4 bytes of version/flags before
                // children.
                let skip = if &box_type == b"meta" { 4 } else { 0 };
                if body.len() > skip {
                    walk(&body[skip..], visit, depth + 1);
                }
            }
            offset = end;
        }
    }

    /// Image spatial extents from the first ispe property box.
    pub fn dimensions(data: &[u8]) -> Option<(u32, u32)> {
        let mut dims = None;
        walk(
            data,
            &mut |box_type, body| {
                if box_type == b"ispe" && body.len() >= 12 && dims.is_none() {
                    let w = u32::from_be_bytes([body[4], body[5], body[6], body[7]]);
                    let h = u32::from_be_bytes([body[8], body[9], body[10], body[11]]);
                    dims = Some((w, h));
                }
            },
            0,
        );
        dims
    }

    /// colr box with an ICC payload ('prof' or 'rICC').
    pub fn has_icc_profile(data: &[u8]) -> bool {
        let mut found = false;
        walk(
            data,
            &mut |box_type, body| {
                if box_type == b"colr" && body.len() >= 4 && (&body[..4] == b"prof" || &body[..4] == b"rICC")
                {
                    found = true;
                }
            },
            0,
        );
        found
    }

    /// Exif metadata item referenced from the meta box.
    pub fn has_exif(data: &[u8]) -> bool {
        let mut found = false;
        walk(
            data,
            &mut |box_type, body| {
                if box_type == b"infe" && body.windows(4).any(|w| w == b"Exif") {
                    found = true;
                }
            },
            0,
        );
        found
    }
}

/// JPEG XL signature helpers.
pub mod jxl {
    pub const CODESTREAM_SIG: [u8; 2] = [0xFF, 0x0A];
    pub const CONTAINER_SIG: [u8; 12] = [
        0x00, 0x00, 0x00, 0x0C, 0x4A, 0x58, 0x4C, 0x20, 0x0D, 0x0A, 0x87, 0x0A,
    ];

    pub fn is_codestream(data: &[u8]) -> bool {
        data.len() >= 2 && data[..2] == CODESTREAM_SIG
    }

    pub fn is_container(data: &[u8]) -> bool {
        data.len() >= 12 && data[..12] == CONTAINER_SIG
    }
}
