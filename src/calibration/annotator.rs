/// Burn overlay shapes into the source image.
///
/// Correct problems are outlined green, incorrect ones red, each with a
/// faint fill and a round badge on the top-right corner carrying a tick or
/// a cross. The selected problem gets the thicker stroke.
use crate::calibration::render::OverlayShape;
use crate::calibration::types::CANONICAL_MAX;
use crate::errors::{CalibError, CalibResult};

const CORRECT: [u8; 3] = [34, 197, 94];
const INCORRECT: [u8; 3] = [239, 68, 68];
const FILL_ALPHA: u8 = 26;
/// Badge radius in canonical units.
const BADGE_RADIUS: f64 = 20.0;

fn shape_colour(shape: &OverlayShape) -> [u8; 3] {
    if shape.is_correct {
        CORRECT
    } else {
        INCORRECT
    }
}

/// Annotate `src_bytes` (JPEG/PNG) with `shapes`, which must already be in
/// the image's natural pixel space. Returns PNG-encoded bytes.
pub fn annotate_image(src_bytes: &[u8], shapes: &[OverlayShape]) -> CalibResult<Vec<u8>> {
    let img = image::load_from_memory(src_bytes)
        .map_err(|e| CalibError::Image(format!("annotate load: {e}")))?;
    let mut canvas = img.to_rgba8();
    let (w, h) = canvas.dimensions();

    // Strokes are specified against the canonical span; scale them with the image.
    let unit = (w.max(h) as f64 / CANONICAL_MAX).max(1.0);

    for shape in shapes {
        let [r, g, b] = shape_colour(shape);
        let x1 = shape.rect.left.round() as i32;
        let y1 = shape.rect.top.round() as i32;
        let x2 = shape.rect.right().round() as i32;
        let y2 = shape.rect.bottom().round() as i32;

        fill_rect(&mut canvas, x1, y1, x2, y2, [r, g, b, FILL_ALPHA]);
        let thickness = (shape.stroke_width * unit).round().max(1.0) as i32;
        draw_rect(&mut canvas, x1, y1, x2, y2, [r, g, b, 255], thickness);

        let radius = (BADGE_RADIUS * unit).round() as i32;
        draw_badge(&mut canvas, x2, y1, radius, [r, g, b, 255], shape.is_correct);
    }

    let mut out = Vec::new();
    image::DynamicImage::ImageRgba8(canvas)
        .write_to(&mut std::io::Cursor::new(&mut out), image::ImageFormat::Png)
        .map_err(|e| CalibError::Image(format!("PNG encode: {e}")))?;

    tracing::debug!(shapes = shapes.len(), bytes = out.len(), "annotated image encoded");
    Ok(out)
}

// ── Drawing primitives ──────────────────────────────────────────────────────

fn in_bounds(canvas: &image::RgbaImage, x: i32, y: i32) -> bool {
    let (w, h) = canvas.dimensions();
    x >= 0 && y >= 0 && x < w as i32 && y < h as i32
}

fn blend(canvas: &mut image::RgbaImage, x: i32, y: i32, col: [u8; 4]) {
    if !in_bounds(canvas, x, y) {
        return;
    }
    let p = canvas.get_pixel_mut(x as u32, y as u32);
    let a = col[3] as f32 / 255.0;
    p[0] = (p[0] as f32 * (1.0 - a) + col[0] as f32 * a).round() as u8;
    p[1] = (p[1] as f32 * (1.0 - a) + col[1] as f32 * a).round() as u8;
    p[2] = (p[2] as f32 * (1.0 - a) + col[2] as f32 * a).round() as u8;
    p[3] = 255;
}

fn fill_rect(canvas: &mut image::RgbaImage, x1: i32, y1: i32, x2: i32, y2: i32, col: [u8; 4]) {
    for y in y1..=y2 {
        for x in x1..=x2 {
            blend(canvas, x, y, col);
        }
    }
}

fn draw_rect(
    canvas: &mut image::RgbaImage,
    x1: i32,
    y1: i32,
    x2: i32,
    y2: i32,
    col: [u8; 4],
    thickness: i32,
) {
    // Centred on the outline, like an SVG stroke.
    let outer = thickness / 2;
    for t in -outer..(thickness - outer) {
        for x in (x1 - outer)..=(x2 + outer) {
            blend(canvas, x, y1 + t, col);
            blend(canvas, x, y2 - t, col);
        }
        for y in (y1 - outer)..=(y2 + outer) {
            blend(canvas, x1 + t, y, col);
            blend(canvas, x2 - t, y, col);
        }
    }
}

fn draw_badge(
    canvas: &mut image::RgbaImage,
    cx: i32,
    cy: i32,
    radius: i32,
    col: [u8; 4],
    tick: bool,
) {
    let r2 = radius * radius;
    for dy in -radius..=radius {
        for dx in -radius..=radius {
            if dx * dx + dy * dy <= r2 {
                blend(canvas, cx + dx, cy + dy, col);
            }
        }
    }

    let white = [255, 255, 255, 255];
    let s = (radius / 2).max(1);
    let pen = (radius / 8).max(1);
    if tick {
        draw_line(canvas, (cx - s, cy), (cx - s / 3, cy + s * 2 / 3), pen, white);
        draw_line(canvas, (cx - s / 3, cy + s * 2 / 3), (cx + s, cy - s * 2 / 3), pen, white);
    } else {
        draw_line(canvas, (cx - s, cy - s), (cx + s, cy + s), pen, white);
        draw_line(canvas, (cx - s, cy + s), (cx + s, cy - s), pen, white);
    }
}

fn draw_line(
    canvas: &mut image::RgbaImage,
    from: (i32, i32),
    to: (i32, i32),
    pen: i32,
    col: [u8; 4],
) {
    let steps = (to.0 - from.0).abs().max((to.1 - from.1).abs()).max(1);
    for i in 0..=steps {
        let x = from.0 + (to.0 - from.0) * i / steps;
        let y = from.1 + (to.1 - from.1) * i / steps;
        for oy in 0..pen {
            for ox in 0..pen {
                blend(canvas, x + ox, y + oy, col);
            }
        }
    }
}
