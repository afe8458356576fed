//! Display-mode scaling and downscale sharpening (spec.md §4.I "Image
//! worker").

use image::imageops::{overlay, FilterType};
use image::{DynamicImage, Rgba, RgbaImage};

const CANVAS_BACKGROUND: Rgba<u8> = Rgba([0, 0, 0, 255]);

/// How a decoded image is fitted into the requested target dimensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayMode {
    /// Scale to cover the target, centre-cropping the excess.
    Fill,
    /// Scale to fit within the target, centred on black.
    Fit,
    /// Like `Fit`, but only scales down; smaller-than-target sources are
    /// centred at native size.
    Shrink,
}

impl DisplayMode {
    /// Parses the wire string (`"fill"`/`"fit"`/`"shrink"`), defaulting to
    /// `None` for anything else so callers can apply their own fallback.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "fill" => Some(Self::Fill),
            "fit" => Some(Self::Fit),
            "shrink" => Some(Self::Shrink),
            _ => None,
        }
    }
}

/// Scales `source` per `mode` and returns an RGBA8 buffer of exactly
/// `target_w x target_h` pixels, applying the downscale sharpening rule
/// from spec.md §4.I.
pub fn prescale(source: &DynamicImage, target_w: u32, target_h: u32, mode: DisplayMode) -> RgbaImage {
    let (src_w, src_h) = (source.width(), source.height());
    match mode {
        DisplayMode::Fill => {
            let scale = cover_scale(src_w, src_h, target_w, target_h);
            let resized = sharpened(source.resize_to_fill(target_w, target_h, FilterType::Lanczos3), scale);
            resized.to_rgba8()
        }
        DisplayMode::Fit => {
            let scale = fit_scale(src_w, src_h, target_w, target_h);
            let resized = sharpened(source.resize(target_w, target_h, FilterType::Lanczos3), scale);
            center_on_background(&resized.to_rgba8(), target_w, target_h)
        }
        DisplayMode::Shrink => {
            if src_w <= target_w && src_h <= target_h {
                center_on_background(&source.to_rgba8(), target_w, target_h)
            } else {
                let scale = fit_scale(src_w, src_h, target_w, target_h);
                let resized = sharpened(source.resize(target_w, target_h, FilterType::Lanczos3), scale);
                center_on_background(&resized.to_rgba8(), target_w, target_h)
            }
        }
    }
}

fn cover_scale(src_w: u32, src_h: u32, target_w: u32, target_h: u32) -> f32 {
    let rw = target_w as f32 / src_w as f32;
    let rh = target_h as f32 / src_h as f32;
    rw.max(rh)
}

fn fit_scale(src_w: u32, src_h: u32, target_w: u32, target_h: u32) -> f32 {
    let rw = target_w as f32 / src_w as f32;
    let rh = target_h as f32 / src_h as f32;
    rw.min(rh)
}

/// Applies a stronger unsharpen below a 0.5 downscale factor, a mild one
/// below 1.0, and none when upscaling or at native size.
fn sharpened(image: DynamicImage, scale: f32) -> DynamicImage {
    if scale < 0.5 {
        image.unsharpen(1.2, 6)
    } else if scale < 1.0 {
        image.unsharpen(0.6, 3)
    } else {
        image
    }
}

fn center_on_background(src: &RgbaImage, target_w: u32, target_h: u32) -> RgbaImage {
    let mut canvas = RgbaImage::from_pixel(target_w, target_h, CANVAS_BACKGROUND);
    let x = (target_w.saturating_sub(src.width())) / 2;
    let y = (target_h.saturating_sub(src.height())) / 2;
    overlay(&mut canvas, src, i64::from(x), i64::from(y));
    canvas
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn solid_source(w: u32, h: u32) -> DynamicImage {
        DynamicImage::ImageRgba8(RgbaImage::from_pixel(w, h, Rgba([200, 10, 10, 255])))
    }

    #[test]
    fn fill_produces_exact_target_dimensions() {
        let out = prescale(&solid_source(400, 200), 100, 100, DisplayMode::Fill);
        assert_eq!(out.dimensions(), (100, 100));
    }

    #[test]
    fn fit_centers_within_black_canvas() {
        let out = prescale(&solid_source(400, 200), 100, 100, DisplayMode::Fit);
        assert_eq!(out.dimensions(), (100, 100));
        // Top-left corner should be untouched black background, since the
        // 400x200 source fits as 100x50 centred vertically.
        assert_eq!(*out.get_pixel(0, 0), CANVAS_BACKGROUND);
    }

    #[test]
    fn shrink_leaves_smaller_than_target_sources_untouched() {
        let out = prescale(&solid_source(50, 50), 100, 100, DisplayMode::Shrink);
        assert_eq!(out.dimensions(), (100, 100));
        assert_eq!(*out.get_pixel(25, 25), Rgba([200, 10, 10, 255]));
    }
}
