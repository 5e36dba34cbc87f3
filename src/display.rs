//! Raster display compositor
//!
//! Every tick the engine hands a [`DisplayModel`] to the [`Compositor`],
//! which redraws the whole screen into an off-screen [`Canvas`] and packs it
//! into the device bitmap format. A timed override message replaces normal
//! drawing until it expires.

pub mod canvas;
pub mod encode;

use embedded_graphics::{
    mono_font::{ascii::FONT_6X10, MonoTextStyle},
    pixelcolor::Rgb888,
    prelude::*,
    primitives::{Line, PrimitiveStyle, Rectangle},
    text::{Alignment, Text},
};
use std::time::{Duration, Instant};
use tracing::trace;

pub use canvas::Canvas;
pub use encode::{encode, FrameFormat};

/// Columns narrower than this get no per-column label
const MIN_LABEL_WIDTH: u32 = 48;
const CHAR_WIDTH: u32 = 6;
/// Step counts with more positions are drawn without ticks
const MAX_TICKS: u32 = 20;

/// The value bar for the displayed parameter
#[derive(Debug, Clone, PartialEq)]
pub struct ValueBar {
    pub name: String,
    pub text: String,
    /// Fill, 0..=1
    pub normalized: f32,
    /// Discrete positions, for tick marks
    pub steps: Option<u32>,
}

/// Page indicator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Scroll {
    pub page: usize,
    pub pages: usize,
}

/// What to show on the screen this tick
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DisplayModel {
    pub title: String,
    pub context: Option<String>,
    /// One label per encoder column
    pub labels: Vec<String>,
    pub value: Option<ValueBar>,
    pub scroll: Option<Scroll>,
}

impl DisplayModel {
    pub fn titled(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone)]
struct OverrideMessage {
    text: String,
    until: Instant,
}

/// Draws display models and encodes frames for one device
#[derive(Debug)]
pub struct Compositor {
    canvas: Canvas,
    format: FrameFormat,
    columns: usize,
    message: Option<OverrideMessage>,
}

impl Compositor {
    pub fn new(width: u32, height: u32, columns: usize, format: FrameFormat) -> Self {
        Self {
            canvas: Canvas::new(width, height),
            format,
            columns,
            message: None,
        }
    }

    pub fn canvas(&self) -> &Canvas {
        &self.canvas
    }

    pub fn format(&self) -> FrameFormat {
        self.format
    }

    /// Show `text` instead of the normal screen for `duration`
    pub fn show_message(&mut self, text: impl Into<String>, duration: Duration, now: Instant) {
        let text = text.into();
        trace!("Display message '{}' for {:?}", text, duration);
        self.message = Some(OverrideMessage {
            text,
            until: now + duration,
        });
    }

    pub fn message_active(&self, now: Instant) -> bool {
        self.message.as_ref().is_some_and(|m| now < m.until)
    }

    pub fn clear_message(&mut self) {
        self.message = None;
    }

    /// Redraw from scratch and return the encoded frame
    pub fn render(&mut self, model: &DisplayModel, now: Instant) -> Vec<u8> {
        if !self.message_active(now) {
            self.message = None;
        }

        self.canvas.fill(Rgb888::BLACK);
        match &self.message {
            Some(message) => draw_message(&mut self.canvas, &message.text).ok(),
            None => draw_model(&mut self.canvas, model, self.columns).ok(),
        };
        encode(self.format, &self.canvas)
    }
}

fn fit(text: &str, width: u32) -> &str {
    let max = (width / CHAR_WIDTH) as usize;
    match text.char_indices().nth(max) {
        Some((end, _)) => &text[..end],
        None => text,
    }
}

/// Centered text in a framed box
fn draw_message<D>(display: &mut D, text: &str) -> Result<(), D::Error>
where
    D: DrawTarget<Color = Rgb888> + OriginDimensions,
{
    let size = display.size();
    let style = MonoTextStyle::new(&FONT_6X10, Rgb888::WHITE);

    Rectangle::new(Point::new(1, 1), Size::new(size.width - 2, size.height - 2))
        .into_styled(PrimitiveStyle::with_stroke(Rgb888::WHITE, 1))
        .draw(display)?;
    Text::with_alignment(
        fit(text, size.width - 8),
        Point::new(size.width as i32 / 2, size.height as i32 / 2 + 3),
        style,
        Alignment::Center,
    )
    .draw(display)?;
    Ok(())
}

fn draw_model<D>(display: &mut D, model: &DisplayModel, columns: usize) -> Result<(), D::Error>
where
    D: DrawTarget<Color = Rgb888> + OriginDimensions,
{
    let size = display.size();
    let (w, h) = (size.width as i32, size.height as i32);
    let style = MonoTextStyle::new(&FONT_6X10, Rgb888::WHITE);
    let dim = MonoTextStyle::new(&FONT_6X10, Rgb888::CSS_GRAY);

    // Title line, context right-aligned
    let context_width = model
        .context
        .as_ref()
        .map_or(0, |c| (c.chars().count() as u32 + 1) * CHAR_WIDTH);
    let title_width = size.width.saturating_sub(context_width + 4);
    Text::new(fit(&model.title, title_width), Point::new(2, 9), style).draw(display)?;
    if let Some(context) = &model.context {
        Text::with_alignment(context, Point::new(w - 2, 9), dim, Alignment::Right).draw(display)?;
    }

    // Per-column labels on wide screens
    if columns > 0 {
        let column_width = size.width / columns as u32;
        if column_width >= MIN_LABEL_WIDTH {
            for (column, label) in model.labels.iter().take(columns).enumerate() {
                let centre = column as i32 * column_width as i32 + column_width as i32 / 2;
                Text::with_alignment(
                    fit(label, column_width - 4),
                    Point::new(centre, 30),
                    style,
                    Alignment::Center,
                )
                .draw(display)?;
            }
        }
    }

    if let Some(value) = &model.value {
        draw_value_bar(display, value)?;
    }

    if let Some(scroll) = model.scroll.filter(|s| s.pages > 1) {
        let track = (w - 8).max(1);
        let segment = (track / scroll.pages as i32).max(2);
        let offset = (scroll.page.min(scroll.pages - 1) as i32) * track / scroll.pages as i32;
        Rectangle::new(Point::new(4, h - 6), Size::new(track as u32, 6))
            .into_styled(PrimitiveStyle::with_stroke(Rgb888::CSS_GRAY, 1))
            .draw(display)?;
        Rectangle::new(Point::new(4 + offset, h - 6), Size::new(segment as u32, 6))
            .into_styled(PrimitiveStyle::with_fill(Rgb888::WHITE))
            .draw(display)?;
    }

    Ok(())
}

fn draw_value_bar<D>(display: &mut D, value: &ValueBar) -> Result<(), D::Error>
where
    D: DrawTarget<Color = Rgb888> + OriginDimensions,
{
    let size = display.size();
    let (w, h) = (size.width as i32, size.height as i32);
    let style = MonoTextStyle::new(&FONT_6X10, Rgb888::WHITE);

    let text_width = (value.text.chars().count() as u32 + 1) * CHAR_WIDTH;
    Text::new(
        fit(&value.name, size.width.saturating_sub(text_width + 10)),
        Point::new(5, h - 25),
        style,
    )
    .draw(display)?;
    Text::with_alignment(&value.text, Point::new(w - 6, h - 25), style, Alignment::Right)
        .draw(display)?;

    let bar_width = (w - 11).max(1);
    let bar = Rectangle::new(Point::new(5, h - 22), Size::new(bar_width as u32, 10));
    bar.into_styled(PrimitiveStyle::with_stroke(Rgb888::WHITE, 1))
        .draw(display)?;

    let filled = (value.normalized.clamp(0.0, 1.0) * bar_width as f32).round() as u32;
    if filled > 0 {
        Rectangle::new(Point::new(5, h - 22), Size::new(filled, 10))
            .into_styled(PrimitiveStyle::with_fill(Rgb888::WHITE))
            .draw(display)?;
    }

    if let Some(steps) = value.steps.filter(|s| (1..MAX_TICKS).contains(s)) {
        for i in 0..=steps as i32 {
            let x = 5 + i * (bar_width - 1) / steps as i32;
            Line::new(Point::new(x, h - 12), Point::new(x, h - 10))
                .into_styled(PrimitiveStyle::with_stroke(Rgb888::WHITE, 1))
                .draw(display)?;
        }
    }
    Ok(())
}
