//! Off-screen pixel buffer
//!
//! Implements `embedded-graphics`' [`DrawTarget`] so the compositor can use
//! its text and primitive drawing; the device encoders read pixels back out.

use core::convert::Infallible;
use embedded_graphics::{pixelcolor::Rgb888, prelude::*};

/// RGB frame buffer, row-major from the top-left
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Canvas {
    width: u32,
    height: u32,
    pixels: Vec<Rgb888>,
}

impl Canvas {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            pixels: vec![Rgb888::BLACK; (width * height) as usize],
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn fill(&mut self, color: Rgb888) {
        self.pixels.iter_mut().for_each(|p| *p = color);
    }

    /// Black outside the buffer
    pub fn pixel(&self, x: u32, y: u32) -> Rgb888 {
        if x >= self.width || y >= self.height {
            return Rgb888::BLACK;
        }
        self.pixels[(y * self.width + x) as usize]
    }

    /// Mean of the three channels
    pub fn brightness(&self, x: u32, y: u32) -> u8 {
        let p = self.pixel(x, y);
        ((p.r() as u16 + p.g() as u16 + p.b() as u16) / 3) as u8
    }

    /// Number of pixels brighter than `threshold`
    pub fn lit_pixels(&self, threshold: u8) -> usize {
        (0..self.height)
            .flat_map(|y| (0..self.width).map(move |x| (x, y)))
            .filter(|&(x, y)| self.brightness(x, y) > threshold)
            .count()
    }
}

impl OriginDimensions for Canvas {
    fn size(&self) -> Size {
        Size::new(self.width, self.height)
    }
}

impl DrawTarget for Canvas {
    type Color = Rgb888;
    type Error = Infallible;

    fn draw_iter<I>(&mut self, pixels: I) -> Result<(), Self::Error>
    where
        I: IntoIterator<Item = Pixel<Self::Color>>,
    {
        for Pixel(coord, color) in pixels {
            if coord.x >= 0
                && coord.y >= 0
                && (coord.x as u32) < self.width
                && (coord.y as u32) < self.height
            {
                let index = coord.y as u32 * self.width + coord.x as u32;
                self.pixels[index as usize] = color;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use embedded_graphics::primitives::{PrimitiveStyle, Rectangle};

    #[test]
    fn test_drawing_clips_to_bounds() {
        let mut canvas = Canvas::new(16, 8);
        Rectangle::new(Point::new(-4, -4), Size::new(8, 8))
            .into_styled(PrimitiveStyle::with_fill(Rgb888::WHITE))
            .draw(&mut canvas)
            .unwrap();

        assert_eq!(canvas.pixel(0, 0), Rgb888::WHITE);
        assert_eq!(canvas.pixel(3, 3), Rgb888::WHITE);
        assert_eq!(canvas.pixel(4, 4), Rgb888::BLACK);
        assert_eq!(canvas.lit_pixels(100), 16);
    }

    #[test]
    fn test_fill_and_brightness() {
        let mut canvas = Canvas::new(2, 2);
        canvas.fill(Rgb888::new(30, 60, 90));
        assert_eq!(canvas.brightness(1, 1), 60);
        assert_eq!(canvas.pixel(5, 5), Rgb888::BLACK);
    }
}
