//! Terminal previews of images using half-block cells.
//!
//! Each cell shows two pixels: the upper one as the `▀` foreground and the
//! lower one as the background, so a `w x h` cell area holds `w x 2h` pixels.

use image::{DynamicImage, Rgba};
use ratatui::style::{Color, Style};
use ratatui::text::{Line, Span};

/// Transparent pixels are blended onto this (blueprint paper white).
const PAPER: [u8; 3] = [250, 250, 250];

pub struct Preview {
    image: DynamicImage,
    cached: Option<((u16, u16), Vec<Line<'static>>)>,
}

impl Preview {
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        match image::load_from_memory(bytes) {
            Ok(image) => Some(Self { image, cached: None }),
            Err(e) => {
                tracing::warn!("could not decode image for preview: {e}");
                None
            }
        }
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.image.width(), self.image.height())
    }

    /// Lines that fit inside `width x height` cells, aspect preserved.
    /// The last rendering is cached per size.
    pub fn lines(&mut self, width: u16, height: u16) -> &[Line<'static>] {
        let stale = self.cached.as_ref().map(|(size, _)| *size) != Some((width, height));
        if stale {
            let lines = render_half_blocks(&self.image, width, height);
            self.cached = Some(((width, height), lines));
        }
        self.cached
            .as_ref()
            .map(|(_, lines)| lines.as_slice())
            .unwrap_or_default()
    }
}

fn blend(pixel: &Rgba<u8>) -> Color {
    let [r, g, b, a] = pixel.0;
    let a = a as u16;
    let mix = |c: u8, p: u8| ((c as u16 * a + p as u16 * (255 - a)) / 255) as u8;
    Color::Rgb(mix(r, PAPER[0]), mix(g, PAPER[1]), mix(b, PAPER[2]))
}

fn render_half_blocks(image: &DynamicImage, width: u16, height: u16) -> Vec<Line<'static>> {
    if width == 0 || height == 0 {
        return Vec::new();
    }

    let thumb = image
        .thumbnail(width as u32, height as u32 * 2)
        .to_rgba8();
    let (w, h) = thumb.dimensions();

    let mut lines = Vec::with_capacity(h.div_ceil(2) as usize);
    for y in (0..h).step_by(2) {
        let spans: Vec<Span<'static>> = (0..w)
            .map(|x| {
                let top = blend(thumb.get_pixel(x, y));
                let bottom = if y + 1 < h {
                    blend(thumb.get_pixel(x, y + 1))
                } else {
                    Color::Reset
                };
                Span::styled("▀", Style::default().fg(top).bg(bottom))
            })
            .collect();
        lines.push(Line::from(spans));
    }
    lines
}
