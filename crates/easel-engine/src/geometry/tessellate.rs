//! Triangle-list tessellation shared by every backend.
//!
//! Output is a flat list of logical-pixel vertices, three per triangle, all
//! wound the same way. Degenerate input yields an empty list.

use std::f32::consts::TAU;

use super::{Circle, Line, Rect, Vec2};

/// Lower bound on circle segments; fewer would not enclose any area.
pub const MIN_CIRCLE_SEGMENTS: u32 = 3;

/// Two triangles covering the rectangle.
pub fn rect_triangles(rect: Rect) -> Vec<Vec2> {
    let r = rect.normalized();
    if r.is_empty() || !r.is_finite() {
        return Vec::new();
    }

    let tl = r.origin;
    let br = r.max();
    let tr = Vec2::new(br.x, tl.y);
    let bl = Vec2::new(tl.x, br.y);

    vec![tl, tr, br, tl, br, bl]
}

/// Triangle fan around the center, expanded to a list.
pub fn circle_triangles(circle: Circle, segments: u32) -> Vec<Vec2> {
    let Circle { center, radius } = circle;
    if !(radius > 0.0) || !radius.is_finite() || !center.is_finite() {
        return Vec::new();
    }

    let n = segments.max(MIN_CIRCLE_SEGMENTS);
    let rim = |i: u32| {
        let theta = TAU * (i % n) as f32 / n as f32;
        center + Vec2::new(theta.cos(), theta.sin()) * radius
    };

    let mut out = Vec::with_capacity(n as usize * 3);
    for i in 0..n {
        out.extend([center, rim(i), rim(i + 1)]);
    }
    out
}

/// Quad offset by half the width along the segment normal.
pub fn line_triangles(line: Line) -> Vec<Vec2> {
    let Line { from, to, width } = line;
    let dir = to - from;
    let len = dir.length();
    if !(len > 0.0) || !(width > 0.0) || !len.is_finite() || !width.is_finite() {
        return Vec::new();
    }

    let n = dir.perp() * (width * 0.5 / len);
    let (a0, a1) = (from + n, from - n);
    let (b0, b1) = (to + n, to - n);

    vec![a0, b0, b1, a0, b1, a1]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signed_area(t: &[Vec2]) -> f32 {
        let (a, b, c) = (t[0], t[1], t[2]);
        0.5 * ((b.x - a.x) * (c.y - a.y) - (c.x - a.x) * (b.y - a.y))
    }

    fn total_area(tris: &[Vec2]) -> f32 {
        tris.chunks(3).map(|t| signed_area(t).abs()).sum()
    }

    #[test]
    fn rect_is_two_triangles() {
        let tris = rect_triangles(Rect::new(10.0, 20.0, 30.0, 40.0));
        assert_eq!(tris.len(), 6);
        assert!((total_area(&tris) - 1200.0).abs() < 1e-3);
    }

    #[test]
    fn negative_rect_is_flipped() {
        let a = rect_triangles(Rect::new(40.0, 60.0, -30.0, -40.0));
        let b = rect_triangles(Rect::new(10.0, 20.0, 30.0, 40.0));
        assert_eq!(a, b);
    }

    #[test]
    fn degenerate_shapes_are_empty() {
        assert!(rect_triangles(Rect::new(0.0, 0.0, 0.0, 5.0)).is_empty());
        assert!(circle_triangles(Circle::new(0.0, 0.0, 0.0), 64).is_empty());
        assert!(circle_triangles(Circle::new(0.0, 0.0, f32::NAN), 64).is_empty());
        assert!(line_triangles(Line::new(3.0, 3.0, 3.0, 3.0)).is_empty());
        assert!(line_triangles(Line::new(0.0, 0.0, 5.0, 0.0).with_width(0.0)).is_empty());
    }

    #[test]
    fn circle_uses_fixed_segment_count() {
        let tris = circle_triangles(Circle::new(50.0, 50.0, 10.0), 64);
        assert_eq!(tris.len(), 64 * 3);

        let area = total_area(&tris);
        let exact = std::f32::consts::PI * 100.0;
        assert!(area < exact && area > exact * 0.99);
    }

    #[test]
    fn circle_segments_have_a_floor() {
        let tris = circle_triangles(Circle::new(0.0, 0.0, 1.0), 1);
        assert_eq!(tris.len(), MIN_CIRCLE_SEGMENTS as usize * 3);
    }

    #[test]
    fn windings_are_consistent() {
        let tris = circle_triangles(Circle::new(0.0, 0.0, 5.0), 16);
        let sign = signed_area(&tris[0..3]).signum();
        assert!(tris.chunks(3).all(|t| signed_area(t).signum() == sign));

        let tris = line_triangles(Line::new(0.0, 0.0, 10.0, 10.0).with_width(2.0));
        assert_eq!(signed_area(&tris[0..3]).signum(), signed_area(&tris[3..6]).signum());
    }

    #[test]
    fn line_quad_has_requested_width() {
        let tris = line_triangles(Line::new(0.0, 0.0, 10.0, 0.0).with_width(4.0));
        assert_eq!(tris.len(), 6);
        assert!((total_area(&tris) - 40.0).abs() < 1e-3);

        let ys: Vec<f32> = tris.iter().map(|p| p.y).collect();
        assert!(ys.iter().all(|y| (y.abs() - 2.0).abs() < 1e-5));
    }
}
