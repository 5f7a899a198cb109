use glam::{Mat2, Vec2};

/// Triangles with less area than this cover no pixel.
const MIN_AREA: f32 = 1e-12;

/// Undefined if point is exactly on the edge.
///
/// Due to floating point precision a sample point rarely lands exactly on an edge, and for points that
/// close to it the answer does not matter much.
pub fn is_point_in_triangle(p: Vec2, triangle: &[Vec2; 3]) -> bool {
	#[inline]
	fn sign(p1: Vec2, p2: Vec2, p3: Vec2) -> f32 {
		Mat2::from_cols(p1, p2).sub_mat2(&Mat2::from_cols(p3, p3)).determinant()
	}

	let [p1, p2, p3] = *triangle;

	let d1 = sign(p, p1, p2);
	let d2 = sign(p, p2, p3);
	let d3 = sign(p, p3, p1);

	let has_neg = d1.is_sign_negative() || d2.is_sign_negative() || d3.is_sign_negative();
	let has_pos = d1.is_sign_positive() || d2.is_sign_positive() || d3.is_sign_positive();

	!(has_neg && has_pos)
}

/// Return bottom-left and top-right corners of the smallest covering rectangle over a list of points.
#[inline]
pub fn get_bounds<'a>(vertices: impl Iterator<Item = &'a Vec2>) -> (Vec2, Vec2) {
	let (mut x, mut y, mut z, mut w) = (f32::INFINITY, f32::INFINITY, f32::NEG_INFINITY, f32::NEG_INFINITY);
	vertices.for_each(|v| {
		(x, y, z, w) = (x.min(v.x), y.min(v.y), z.max(v.x), w.max(v.y));
	});
	(Vec2::new(x, y), Vec2::new(z, w))
}

/// Signed area, positive for counter-clockwise winding.
#[inline]
pub fn signed_area(triangle: &[Vec2; 3]) -> f32 {
	let [a, b, c] = *triangle;
	(b - a).perp_dot(c - a) * 0.5
}

/// Pixels of a `width`×`height` image whose centers a UV-space triangle covers.
///
/// The image spans the unit UV square with row 0 at V = 1. Parts of the triangle outside the unit
/// square are clipped away.
pub fn covered_pixels(uv_triangle: &[Vec2; 3], width: u32, height: u32) -> Vec<(u32, u32)> {
	if width == 0 || height == 0 || signed_area(uv_triangle).abs() < MIN_AREA {
		return Vec::new();
	}

	let size = Vec2::new(width as f32, height as f32);
	let to_pixel = |uv: Vec2| Vec2::new(uv.x, 1.0 - uv.y) * size;
	let triangle = uv_triangle.map(to_pixel);

	let (lo, hi) = get_bounds(triangle.iter());
	let x_begin = (lo.x - 0.5).ceil().max(0.0) as u32;
	let y_begin = (lo.y - 0.5).ceil().max(0.0) as u32;
	let x_end = (hi.x - 0.5).floor().min(size.x - 1.0);
	let y_end = (hi.y - 0.5).floor().min(size.y - 1.0);
	if x_end < 0.0 || y_end < 0.0 {
		return Vec::new();
	}

	let mut pixels = Vec::new();
	for y in y_begin..=y_end as u32 {
		for x in x_begin..=x_end as u32 {
			let center = Vec2::new(x as f32 + 0.5, y as f32 + 0.5);
			if is_point_in_triangle(center, &triangle) {
				pixels.push((x, y));
			}
		}
	}
	pixels
}
