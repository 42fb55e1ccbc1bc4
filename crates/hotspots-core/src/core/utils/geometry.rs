use nalgebra::{Point3, Quaternion, UnitQuaternion};
use rand::Rng;

/// Draws a uniformly distributed rotation with Marsaglia's rejection method.
///
/// Two points are sampled inside the unit disc, `(x0, x1)` and `(x2, x3)`; the quaternion
/// `(x0, x1, s·x2, s·x3)` with `s = sqrt((1 - s1) / s2)` has unit norm.
pub fn random_rotation(rng: &mut impl Rng) -> UnitQuaternion<f64> {
    let (x0, x1, s1) = point_in_unit_disc(rng);
    let (x2, x3, s2) = point_in_unit_disc(rng);
    let s = ((1.0 - s1) / s2).sqrt();
    UnitQuaternion::from_quaternion(Quaternion::new(x0, x1, s * x2, s * x3))
}

fn point_in_unit_disc(rng: &mut impl Rng) -> (f64, f64, f64) {
    loop {
        let a: f64 = rng.gen_range(-1.0..1.0);
        let b: f64 = rng.gen_range(-1.0..1.0);
        let s = a * a + b * b;
        if s < 1.0 && s > 0.0 {
            return (a, b, s);
        }
    }
}

/// `count` independent random rotations drawn in order from `rng`.
pub fn random_rotations(count: usize, rng: &mut impl Rng) -> Vec<UnitQuaternion<f64>> {
    (0..count).map(|_| random_rotation(rng)).collect()
}

/// Index of the point farthest from `center`; the first one wins ties.
pub fn farthest_from<'a>(
    center: &Point3<f64>,
    points: impl IntoIterator<Item = (usize, &'a Point3<f64>)>,
) -> Option<usize> {
    points
        .into_iter()
        .fold(None, |best: Option<(usize, f64)>, (idx, p)| {
            let d = nalgebra::distance_squared(center, p);
            match best {
                Some((_, bd)) if bd >= d => best,
                _ => Some((idx, d)),
            }
        })
        .map(|(idx, _)| idx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::Vector3;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn random_rotations_are_unit_and_reproducible() {
        let a = random_rotations(50, &mut StdRng::seed_from_u64(7));
        let b = random_rotations(50, &mut StdRng::seed_from_u64(7));
        assert_eq!(a, b);
        for q in &a {
            assert!((q.quaternion().norm() - 1.0).abs() < 1e-12);
        }
    }

    #[test]
    fn rotations_cover_both_hemispheres() {
        let rotations = random_rotations(500, &mut StdRng::seed_from_u64(11));
        let mean = rotations
            .iter()
            .map(|q| q * Vector3::z())
            .fold(Vector3::zeros(), |acc, v| acc + v)
            / rotations.len() as f64;
        assert!(mean.norm() < 0.15);
    }

    #[test]
    fn farthest_point_prefers_first_on_ties() {
        let c = Point3::origin();
        let pts = [
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(0.0, 2.0, 0.0),
            Point3::new(-2.0, 0.0, 0.0),
        ];
        assert_eq!(farthest_from(&c, pts.iter().enumerate()), Some(1));
        assert_eq!(farthest_from(&c, std::iter::empty()), None);
    }
}
