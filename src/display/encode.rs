//! Device bitmap encodings
//!
//! Pure functions from a [`Canvas`] to the bytes a device expects.

use embedded_graphics::prelude::RgbColor;

use super::canvas::Canvas;

/// Bitmap format understood by a device
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameFormat {
    /// 1 bit per pixel in 2x8 pixel cells (Move)
    Mono,
    /// 16-bit BGR565 with the Push 2 header and XOR pattern
    Bgr565,
}

/// Brightness above which a mono pixel is lit
pub const MONO_THRESHOLD: u8 = 100;

/// Pixels per transmitted line, including filler
pub const LINE_PIXELS: usize = 1024;

pub const FRAME_HEADER: [u8; 16] = [
    0xFF, 0xCC, 0xAA, 0x88, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
];

// Applied to alternating pixels; the device undoes it
const XOR_MASK: [u16; 2] = [0xF3E7, 0xFFE7];

pub fn encode(format: FrameFormat, canvas: &Canvas) -> Vec<u8> {
    match format {
        FrameFormat::Mono => encode_mono(canvas),
        FrameFormat::Bgr565 => encode_bgr565(canvas),
    }
}

/// Pack into 16-bit cells covering 2 columns by 8 rows
///
/// Cells are emitted row-major as little-endian words. Bit `i` of a cell is
/// the pixel at column `2 * cell_x + i / 8`, row `8 * cell_y + i % 8`.
pub fn encode_mono(canvas: &Canvas) -> Vec<u8> {
    let block_rows = canvas.height().div_ceil(8);
    let block_columns = canvas.width().div_ceil(2);
    let mut out = Vec::with_capacity((block_rows * block_columns * 2) as usize);

    for block_y in 0..block_rows {
        for block_x in 0..block_columns {
            let mut word: u16 = 0;
            for bit in 0..16u32 {
                let x = block_x * 2 + bit / 8;
                let y = block_y * 8 + bit % 8;
                if canvas.brightness(x, y) > MONO_THRESHOLD {
                    word |= 1 << bit;
                }
            }
            out.extend_from_slice(&word.to_le_bytes());
        }
    }
    out
}

/// One pixel as masked BGR565
fn bgr565(r: u8, g: u8, b: u8, x: usize) -> u16 {
    let packed = ((b as u16 & 0xF8) << 8) | ((g as u16 & 0xFC) << 3) | (r as u16 >> 3);
    packed ^ XOR_MASK[x % 2]
}

/// Header followed by every line padded to [`LINE_PIXELS`]
pub fn encode_bgr565(canvas: &Canvas) -> Vec<u8> {
    let height = canvas.height() as usize;
    let mut out = Vec::with_capacity(FRAME_HEADER.len() + height * LINE_PIXELS * 2);
    out.extend_from_slice(&FRAME_HEADER);

    for y in 0..height {
        for x in 0..LINE_PIXELS {
            let word = if (x as u32) < canvas.width() {
                let p = canvas.pixel(x as u32, y as u32);
                bgr565(p.r(), p.g(), p.b(), x)
            } else {
                bgr565(0, 0, 0, x)
            };
            out.extend_from_slice(&word.to_le_bytes());
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use embedded_graphics::pixelcolor::Rgb888;
    use embedded_graphics::prelude::*;

    #[test]
    fn test_mono_frame_size() {
        let canvas = Canvas::new(128, 64);
        let frame = encode_mono(&canvas);
        assert_eq!(frame.len(), 1024);
        assert!(frame.iter().all(|&b| b == 0));
    }

    #[test]
    fn test_mono_bit_layout() {
        let mut canvas = Canvas::new(128, 64);
        // Second column of the first cell, third row: bit 8 + 2
        Pixel(Point::new(1, 2), Rgb888::WHITE).draw(&mut canvas).unwrap();
        // First cell of the second block row
        Pixel(Point::new(0, 8), Rgb888::WHITE).draw(&mut canvas).unwrap();

        let frame = encode_mono(&canvas);
        assert_eq!(u16::from_le_bytes([frame[0], frame[1]]), 1 << 10);
        let second_row = 64 * 2;
        assert_eq!(u16::from_le_bytes([frame[second_row], frame[second_row + 1]]), 1);
    }

    #[test]
    fn test_mono_threshold() {
        let mut canvas = Canvas::new(2, 8);
        canvas.fill(Rgb888::new(100, 100, 100));
        assert_eq!(encode_mono(&canvas), vec![0, 0]);
        canvas.fill(Rgb888::new(101, 101, 101));
        assert_eq!(encode_mono(&canvas), vec![0xFF, 0xFF]);
    }

    #[test]
    fn test_bgr565_frame_layout() {
        let canvas = Canvas::new(960, 160);
        let frame = encode_bgr565(&canvas);
        assert_eq!(frame.len(), 16 + 160 * 2048);
        assert_eq!(&frame[..4], &[0xFF, 0xCC, 0xAA, 0x88]);
        // Black pixels carry only the mask
        assert_eq!(&frame[16..20], &[0xE7, 0xF3, 0xE7, 0xFF]);
    }

    #[test]
    fn test_bgr565_channel_packing() {
        let mut canvas = Canvas::new(960, 160);
        Pixel(Point::new(0, 0), Rgb888::new(0xFF, 0, 0)).draw(&mut canvas).unwrap();
        Pixel(Point::new(1, 0), Rgb888::new(0, 0, 0xFF)).draw(&mut canvas).unwrap();
        let frame = encode_bgr565(&canvas);

        let red = u16::from_le_bytes([frame[16], frame[17]]) ^ 0xF3E7;
        let blue = u16::from_le_bytes([frame[18], frame[19]]) ^ 0xFFE7;
        assert_eq!(red, 0x001F);
        assert_eq!(blue, 0xF800);
    }
}
