/// Geometry utilities: perspective transforms, point ordering, polygons, masking
use crate::models::{Point, Rect};
use image::GrayImage;

/// Perspective transformation matrix (3x3, a33 normalised to 1)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PerspectiveTransform {
    m: [[f64; 3]; 3],
}

impl PerspectiveTransform {
    /// Create transform from 4 source points to 4 destination points
    pub fn from_points(src: &[Point; 4], dst: &[Point; 4]) -> Option<Self> {
        // Direct linear transform: two equations per correspondence,
        // eight unknowns, a33 fixed to 1.
        let mut a = [[0.0f64; 8]; 8];
        let mut b = [0.0f64; 8];

        for i in 0..4 {
            let (sx, sy) = (src[i].x as f64, src[i].y as f64);
            let (dx, dy) = (dst[i].x as f64, dst[i].y as f64);

            let row = i * 2;
            a[row] = [sx, sy, 1.0, 0.0, 0.0, 0.0, -dx * sx, -dx * sy];
            b[row] = dx;
            a[row + 1] = [0.0, 0.0, 0.0, sx, sy, 1.0, -dy * sx, -dy * sy];
            b[row + 1] = dy;
        }

        let h = solve_linear_system(&a, &b)?;
        Some(Self {
            m: [[h[0], h[1], h[2]], [h[3], h[4], h[5]], [h[6], h[7], 1.0]],
        })
    }

    /// Row-major 3x3 matrix
    pub fn matrix(&self) -> [[f64; 3]; 3] {
        self.m
    }

    /// Map a point through the transform in double precision
    #[inline]
    pub fn apply(&self, x: f64, y: f64) -> Option<(f64, f64)> {
        let m = &self.m;
        let w = m[2][0] * x + m[2][1] * y + m[2][2];
        if w.abs() < 1e-12 {
            return None;
        }
        Some((
            (m[0][0] * x + m[0][1] * y + m[0][2]) / w,
            (m[1][0] * x + m[1][1] * y + m[1][2]) / w,
        ))
    }

    /// Transform a point using this perspective matrix
    pub fn transform(&self, p: &Point) -> Option<Point> {
        self.apply(p.x as f64, p.y as f64)
            .map(|(x, y)| Point::new(x as f32, y as f32))
    }

    /// Inverse mapping, `None` for a singular matrix
    pub fn inverse(&self) -> Option<Self> {
        let m = &self.m;
        let c00 = m[1][1] * m[2][2] - m[1][2] * m[2][1];
        let c01 = m[1][2] * m[2][0] - m[1][0] * m[2][2];
        let c02 = m[1][0] * m[2][1] - m[1][1] * m[2][0];
        let det = m[0][0] * c00 + m[0][1] * c01 + m[0][2] * c02;
        if det.abs() < 1e-12 {
            return None;
        }
        let inv = [
            [
                c00 / det,
                (m[0][2] * m[2][1] - m[0][1] * m[2][2]) / det,
                (m[0][1] * m[1][2] - m[0][2] * m[1][1]) / det,
            ],
            [
                c01 / det,
                (m[0][0] * m[2][2] - m[0][2] * m[2][0]) / det,
                (m[0][2] * m[1][0] - m[0][0] * m[1][2]) / det,
            ],
            [
                c02 / det,
                (m[0][1] * m[2][0] - m[0][0] * m[2][1]) / det,
                (m[0][0] * m[1][1] - m[0][1] * m[1][0]) / det,
            ],
        ];
        let scale = inv[2][2];
        if scale.abs() < 1e-12 {
            return Some(Self { m: inv });
        }
        let mut m = inv;
        for row in m.iter_mut() {
            for v in row.iter_mut() {
                *v /= scale;
            }
        }
        Some(Self { m })
    }
}

/// Solve 8x8 linear system using Gaussian elimination with partial pivoting
#[allow(clippy::needless_range_loop)]
fn solve_linear_system(a: &[[f64; 8]; 8], b: &[f64; 8]) -> Option<[f64; 8]> {
    let mut a = *a;
    let mut b = *b;
    let n = 8;

    // Forward elimination
    for i in 0..n {
        // Find pivot
        let mut max_val = a[i][i].abs();
        let mut max_row = i;

        for k in (i + 1)..n {
            if a[k][i].abs() > max_val {
                max_val = a[k][i].abs();
                max_row = k;
            }
        }

        // Check for singular matrix
        if max_val < 1e-12 {
            return None;
        }

        if max_row != i {
            a.swap(i, max_row);
            b.swap(i, max_row);
        }

        for k in (i + 1)..n {
            let factor = a[k][i] / a[i][i];
            b[k] -= factor * b[i];

            for j in i..n {
                a[k][j] -= factor * a[i][j];
            }
        }
    }

    // Back substitution
    let mut x = [0.0f64; 8];
    for i in (0..n).rev() {
        let mut sum = b[i];
        for j in (i + 1)..n {
            sum -= a[i][j] * x[j];
        }
        x[i] = sum / a[i][i];
    }

    Some(x)
}

/// Indices of `pts` in TL, TR, BR, BL order.
///
/// TL has the smallest x+y, BR the largest; TR has the smallest y-x, BL the
/// largest. When two roles land on the same point the input order is kept.
pub fn order_quad_indices(pts: &[Point; 4]) -> [usize; 4] {
    let arg = |key: &dyn Fn(&Point) -> f32, want_max: bool| -> usize {
        let mut best = 0;
        for i in 1..4 {
            let (ki, kb) = (key(&pts[i]), key(&pts[best]));
            if (want_max && ki > kb) || (!want_max && ki < kb) {
                best = i;
            }
        }
        best
    };
    let sum = |p: &Point| p.x + p.y;
    let diff = |p: &Point| p.y - p.x;

    let order = [
        arg(&sum, false),
        arg(&diff, false),
        arg(&sum, true),
        arg(&diff, true),
    ];

    let mut seen = [false; 4];
    for &i in &order {
        if seen[i] {
            return [0, 1, 2, 3];
        }
        seen[i] = true;
    }
    order
}

/// Reorder four points as TL, TR, BR, BL
pub fn order_quad(pts: &[Point; 4]) -> [Point; 4] {
    let idx = order_quad_indices(pts);
    [pts[idx[0]], pts[idx[1]], pts[idx[2]], pts[idx[3]]]
}

/// Convert a layout length in points to whole pixels
pub fn pt_to_px(value: f32, px_per_pt: f32) -> i32 {
    (value * px_per_pt).round() as i32
}

/// Zero `rect` grown by `pad` in a mask, clipped to the mask bounds
pub fn mask_rect(mask: &mut GrayImage, rect: &Rect, pad: i32) {
    let Some((x0, y0, x1, y1)) = rect.padded_span(pad, mask.width(), mask.height()) else {
        return;
    };
    for y in y0..y1 {
        for x in x0..x1 {
            mask.put_pixel(x, y, image::Luma([0]));
        }
    }
}

/// Signed shoelace area of a closed polygon
pub fn polygon_signed_area(poly: &[Point]) -> f64 {
    let n = poly.len();
    if n < 3 {
        return 0.0;
    }
    let mut acc = 0.0f64;
    for i in 0..n {
        let p = poly[i];
        let q = poly[(i + 1) % n];
        acc += p.x as f64 * q.y as f64 - q.x as f64 * p.y as f64;
    }
    acc * 0.5
}

/// Centroid of a closed polygon from its first-order moments
pub fn polygon_centroid(poly: &[Point]) -> Option<Point> {
    let n = poly.len();
    let area = polygon_signed_area(poly);
    if area.abs() < 1e-9 {
        return None;
    }
    let (mut cx, mut cy) = (0.0f64, 0.0f64);
    for i in 0..n {
        let (px, py) = (poly[i].x as f64, poly[i].y as f64);
        let (qx, qy) = (poly[(i + 1) % n].x as f64, poly[(i + 1) % n].y as f64);
        let cross = px * qy - qx * py;
        cx += (px + qx) * cross;
        cy += (py + qy) * cross;
    }
    let k = 1.0 / (6.0 * area);
    Some(Point::new((cx * k) as f32, (cy * k) as f32))
}

/// Perimeter of a closed polygon
pub fn closed_arc_length(poly: &[Point]) -> f64 {
    let n = poly.len();
    if n < 2 {
        return 0.0;
    }
    (0..n)
        .map(|i| poly[i].distance(&poly[(i + 1) % n]) as f64)
        .sum()
}

/// Douglas-Peucker simplification of a closed curve.
///
/// The curve is split at two mutually distant points so the result does not
/// depend on where tracing started.
pub fn approx_closed_polygon(curve: &[Point], epsilon: f64) -> Vec<Point> {
    let n = curve.len();
    if n < 3 {
        return curve.to_vec();
    }
    let farthest_from = |from: usize| -> usize {
        (0..n)
            .max_by(|&a, &b| {
                let da = curve[a].distance_squared(&curve[from]);
                let db = curve[b].distance_squared(&curve[from]);
                da.total_cmp(&db)
            })
            .unwrap_or(from)
    };
    let a = farthest_from(0);
    let b = farthest_from(a);
    if a == b {
        return vec![curve[a]];
    }

    let chain = |start: usize, end: usize| -> Vec<Point> {
        let mut pts = Vec::new();
        let mut i = start;
        loop {
            pts.push(curve[i]);
            if i == end {
                break;
            }
            i = (i + 1) % n;
        }
        pts
    };

    let mut keep = Vec::new();
    let first = chain(a, b);
    let second = chain(b, a);
    douglas_peucker(&first, epsilon, &mut keep);
    douglas_peucker(&second, epsilon, &mut keep);
    keep
}

/// Append the simplified vertices of an open chain, excluding its last point
fn douglas_peucker(chain: &[Point], epsilon: f64, out: &mut Vec<Point>) {
    let last = chain.len() - 1;
    let (start, end) = (chain[0], chain[last]);
    let mut dmax = 0.0f64;
    let mut index = 0;
    for (i, p) in chain.iter().enumerate().take(last).skip(1) {
        let d = perpendicular_distance(p, &start, &end);
        if d > dmax {
            dmax = d;
            index = i;
        }
    }
    if dmax > epsilon {
        douglas_peucker(&chain[..=index], epsilon, out);
        douglas_peucker(&chain[index..], epsilon, out);
    } else {
        out.push(start);
    }
}

fn perpendicular_distance(p: &Point, a: &Point, b: &Point) -> f64 {
    let (ax, ay) = (a.x as f64, a.y as f64);
    let (dx, dy) = (b.x as f64 - ax, b.y as f64 - ay);
    let len = (dx * dx + dy * dy).sqrt();
    if len < 1e-12 {
        return p.distance(a) as f64;
    }
    ((p.x as f64 - ax) * dy - (p.y as f64 - ay) * dx).abs() / len
}
