//! Minimal reader for portable graymaps (`P2` and `P5`).

use image::GrayImage;

/// Parse a PGM file. Samples are rescaled from `0..=maxval` to `0..=255`.
pub(crate) fn parse_pgm(data: &[u8]) -> Result<GrayImage, String> {
    let mut header = Header { data, pos: 0 };
    let magic = header.token()?;
    let binary = match magic {
        b"P5" => true,
        b"P2" => false,
        other => {
            return Err(format!(
                "unsupported magic number '{}'",
                String::from_utf8_lossy(other)
            ))
        }
    };
    let width = header.number("width")?;
    let height = header.number("height")?;
    let maxval = header.number("maxval")?;
    if width == 0 || height == 0 {
        return Err(format!("invalid size {width}x{height}"));
    }
    if maxval == 0 || maxval > u16::MAX as u32 {
        return Err(format!("maxval {maxval} is outside 1..=65535"));
    }
    let n_pixels = width as usize * height as usize;

    let samples: Vec<u32> = if binary {
        // exactly one whitespace character separates the header from the raster
        let start = header.pos + 1;
        let bytes_per_sample = if maxval < 256 { 1 } else { 2 };
        let raster = data
            .get(start..)
            .filter(|r| r.len() >= n_pixels * bytes_per_sample)
            .ok_or_else(|| format!("truncated raster, expected {n_pixels} samples"))?;
        if bytes_per_sample == 1 {
            raster[..n_pixels].iter().map(|v| u32::from(*v)).collect()
        } else {
            raster[..2 * n_pixels]
                .chunks_exact(2)
                .map(|c| u32::from(u16::from_be_bytes([c[0], c[1]])))
                .collect()
        }
    } else {
        (0..n_pixels)
            .map(|_| header.number("sample"))
            .collect::<Result<_, _>>()?
    };

    let pixels = samples
        .into_iter()
        .map(|v| {
            if v > maxval {
                return Err(format!("sample {v} exceeds maxval {maxval}"));
            }
            Ok(((v * 255 + maxval / 2) / maxval) as u8)
        })
        .collect::<Result<Vec<u8>, _>>()?;
    GrayImage::from_raw(width, height, pixels).ok_or_else(|| "raster size mismatch".to_string())
}

/// Whitespace separated header tokens, `#` starts a comment running to the end of the line.
struct Header<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Header<'a> {
    fn token(&mut self) -> Result<&'a [u8], String> {
        loop {
            match self.data.get(self.pos) {
                Some(b'#') => {
                    while self.data.get(self.pos).is_some_and(|c| *c != b'\n') {
                        self.pos += 1;
                    }
                }
                Some(c) if c.is_ascii_whitespace() => self.pos += 1,
                Some(_) => break,
                None => return Err("unexpected end of file".to_string()),
            }
        }
        let start = self.pos;
        while self
            .data
            .get(self.pos)
            .is_some_and(|c| !c.is_ascii_whitespace() && *c != b'#')
        {
            self.pos += 1;
        }
        Ok(&self.data[start..self.pos])
    }

    fn number(&mut self, what: &str) -> Result<u32, String> {
        let token = self.token()?;
        std::str::from_utf8(token)
            .ok()
            .and_then(|t| t.parse().ok())
            .ok_or_else(|| format!("invalid {what} '{}'", String::from_utf8_lossy(token)))
    }
}
