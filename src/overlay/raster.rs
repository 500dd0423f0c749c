use image::{DynamicImage, Pixel, Rgba, RgbImage, RgbaImage};

use crate::geometry::PixelRect;

use super::{OverlayLayer, StrokeStyle};

/// Draw every layer element onto a copy of `base`.
pub fn compose(base: &RgbImage, layer: &OverlayLayer) -> RgbaImage {
    let mut out = DynamicImage::ImageRgb8(base.clone()).into_rgba8();
    for element in layer.elements() {
        draw_outline(&mut out, element.rect, element.style);
    }
    out
}

/// Draw a rectangle border, `style.width` pixels thick, inward from the rect
/// edge. Pixels outside the image are clipped; degenerate rects draw nothing.
pub fn draw_outline(img: &mut RgbaImage, rect: PixelRect, style: StrokeStyle) {
    if rect.is_degenerate()
        || !(rect.x.is_finite()
            && rect.y.is_finite()
            && rect.width.is_finite()
            && rect.height.is_finite())
    {
        return;
    }
    let (w, h) = img.dimensions();
    if w == 0 || h == 0 {
        return;
    }
    let thickness = (style.width.round() as i64).max(1);
    let x0 = rect.x.floor() as i64;
    let y0 = rect.y.floor() as i64;
    let x1 = (rect.x + rect.width).ceil() as i64 - 1;
    let y1 = (rect.y + rect.height).ceil() as i64 - 1;
    if x1 < 0 || y1 < 0 || x0 >= w as i64 || y0 >= h as i64 {
        return;
    }
    let color = Rgba(style.color.0);

    for py in y0.max(0)..=y1.min(h as i64 - 1) {
        for px in x0.max(0)..=x1.min(w as i64 - 1) {
            let on_border = px - x0 < thickness
                || x1 - px < thickness
                || py - y0 < thickness
                || y1 - py < thickness;
            if on_border {
                img.get_pixel_mut(px as u32, py as u32).blend(&color);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::overlay::Color;

    fn rect(x: f32, y: f32, width: f32, height: f32) -> PixelRect {
        PixelRect {
            x,
            y,
            width,
            height,
        }
    }

    fn painted(img: &RgbaImage) -> usize {
        img.pixels().filter(|p| p.0 == [255, 0, 0, 255]).count()
    }

    #[test]
    fn outline_leaves_interior_untouched() {
        let mut img = RgbaImage::from_pixel(10, 10, Rgba([0, 0, 0, 255]));
        draw_outline(&mut img, rect(2.0, 2.0, 5.0, 5.0), StrokeStyle::camera());
        // 5x5 box with 2px border leaves a 1x1 hole.
        assert_eq!(painted(&img), 24);
        assert_eq!(img.get_pixel(4, 4).0, [0, 0, 0, 255]);
        assert_eq!(img.get_pixel(2, 2).0, [255, 0, 0, 255]);
        assert_eq!(img.get_pixel(6, 6).0, [255, 0, 0, 255]);
        assert_eq!(img.get_pixel(7, 7).0, [0, 0, 0, 255]);
    }

    #[test]
    fn outline_is_clipped_to_image() {
        let mut img = RgbaImage::from_pixel(4, 4, Rgba([0, 0, 0, 255]));
        draw_outline(&mut img, rect(-10.0, -10.0, 100.0, 100.0), StrokeStyle::camera());
        assert_eq!(painted(&img), 0);
        draw_outline(&mut img, rect(2.0, 2.0, 100.0, 100.0), StrokeStyle::camera());
        assert_eq!(painted(&img), 4);
    }

    #[test]
    fn degenerate_rect_draws_nothing() {
        let mut img = RgbaImage::from_pixel(4, 4, Rgba([0, 0, 0, 255]));
        draw_outline(&mut img, rect(1.0, 1.0, 0.0, 2.0), StrokeStyle::still());
        draw_outline(&mut img, rect(f32::NAN, 1.0, 2.0, 2.0), StrokeStyle::still());
        assert_eq!(painted(&img), 0);
    }

    #[test]
    fn compose_draws_all_layer_elements() {
        let base = RgbImage::new(20, 10);
        let mut layer = OverlayLayer::new();
        let style = StrokeStyle {
            color: Color::RED,
            width: 1.0,
        };
        layer.render(&[rect(0.0, 0.0, 3.0, 3.0), rect(10.0, 5.0, 3.0, 3.0)], style);
        let out = compose(&base, &layer);
        assert_eq!(out.dimensions(), (20, 10));
        assert_eq!(painted(&out), 16);
        assert_eq!(out.get_pixel(1, 1).0, [0, 0, 0, 255]);
    }
}
