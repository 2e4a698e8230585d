use nalgebra::{Matrix3, Point2, SMatrix, SVector, Vector2, Vector3};

/// Homogeneous divisors below this magnitude are treated as points at infinity.
const MIN_DIVISOR: f64 = 1e-12;

/// Planar projective transform `dst ~ H * src`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Homography {
    pub h: Matrix3<f64>,
}

impl Homography {
    pub fn new(h: Matrix3<f64>) -> Self {
        Self { h }
    }

    pub fn from_array(rows: [[f64; 3]; 3]) -> Self {
        Self::new(Matrix3::from_row_slice(&[
            rows[0][0], rows[0][1], rows[0][2], rows[1][0], rows[1][1], rows[1][2], rows[2][0],
            rows[2][1], rows[2][2],
        ]))
    }

    pub fn to_array(&self) -> [[f64; 3]; 3] {
        [
            [self.h[(0, 0)], self.h[(0, 1)], self.h[(0, 2)]],
            [self.h[(1, 0)], self.h[(1, 1)], self.h[(1, 2)]],
            [self.h[(2, 0)], self.h[(2, 1)], self.h[(2, 2)]],
        ]
    }

    /// Map a point through the transform.
    ///
    /// Returns `None` when the homogeneous divisor is numerically zero, i.e.
    /// the point maps to infinity.
    #[inline]
    pub fn apply(&self, p: Point2<f64>) -> Option<Point2<f64>> {
        let v = self.h * Vector3::new(p.x, p.y, 1.0);
        let w = v[2];
        if !w.is_finite() || w.abs() < MIN_DIVISOR {
            return None;
        }
        Some(Point2::new(v[0] / w, v[1] / w))
    }

    /// `f32` convenience used by the marker sampler; points at infinity map to NaN.
    #[inline]
    pub fn apply_f32(&self, p: Point2<f32>) -> Point2<f32> {
        match self.apply(Point2::new(p.x as f64, p.y as f64)) {
            Some(q) => Point2::new(q.x as f32, q.y as f32),
            None => Point2::new(f32::NAN, f32::NAN),
        }
    }

    pub fn inverse(&self) -> Option<Self> {
        self.h.try_inverse().map(Self::new)
    }
}

/// Similarity moving four points to their centroid with mean radius sqrt(2).
fn conditioning(pts: &[Point2<f64>; 4]) -> Matrix3<f64> {
    let c = pts.iter().fold(Vector2::zeros(), |acc, p| acc + p.coords) / 4.0;
    let spread = pts.iter().map(|p| (p.coords - c).norm()).sum::<f64>() / 4.0;
    let k = if spread > MIN_DIVISOR {
        std::f64::consts::SQRT_2 / spread
    } else {
        1.0
    };
    Matrix3::new(k, 0.0, -k * c.x, 0.0, k, -k * c.y, 0.0, 0.0, 1.0)
}

fn transform(t: &Matrix3<f64>, p: &Point2<f64>) -> Point2<f64> {
    let v = t * p.to_homogeneous();
    Point2::new(v.x, v.y)
}

/// Compute H such that `dst ~ H * src` from exactly four correspondences.
///
/// Corner order must be consistent between `src` and `dst`. Returns `None`
/// for degenerate configurations (three collinear points, repeated points).
pub fn homography_from_4pt(src: &[Point2<f64>; 4], dst: &[Point2<f64>; 4]) -> Option<Homography> {
    let t_src = conditioning(src);
    let t_dst = conditioning(dst);

    // eight unknowns with h33 fixed to 1, two rows per correspondence:
    //   [x y 1 0 0 0 -ux -uy] h = u
    //   [0 0 0 x y 1 -vx -vy] h = v
    let mut a = SMatrix::<f64, 8, 8>::zeros();
    let mut b = SVector::<f64, 8>::zeros();
    for (k, (s, d)) in src.iter().zip(dst).enumerate() {
        let p = transform(&t_src, s);
        let q = transform(&t_dst, d);
        let row_u = [p.x, p.y, 1.0, 0.0, 0.0, 0.0, -q.x * p.x, -q.x * p.y];
        let row_v = [0.0, 0.0, 0.0, p.x, p.y, 1.0, -q.y * p.x, -q.y * p.y];
        for c in 0..8 {
            a[(2 * k, c)] = row_u[c];
            a[(2 * k + 1, c)] = row_v[c];
        }
        b[2 * k] = q.x;
        b[2 * k + 1] = q.y;
    }

    let sol = a.lu().solve(&b)?;
    if !sol.iter().all(|v| v.is_finite()) {
        return None;
    }
    let conditioned = Matrix3::new(
        sol[0], sol[1], sol[2], //
        sol[3], sol[4], sol[5], //
        sol[6], sol[7], 1.0,
    );

    let h = t_dst.try_inverse()? * conditioned * t_src;
    let scale = h[(2, 2)];
    if scale.abs() < MIN_DIVISOR {
        return None;
    }
    Some(Homography::new(h / scale))
}
