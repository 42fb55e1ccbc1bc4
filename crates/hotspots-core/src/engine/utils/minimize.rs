/// Outcome of a bounded scalar minimization.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Minimum {
    pub x: f64,
    pub value: f64,
    pub evaluations: usize,
    /// False when the evaluation budget ran out before the tolerance was met.
    pub converged: bool,
}

const GOLDEN_MEAN: f64 = 0.381_966_011_250_105_1; // (3 - sqrt(5)) / 2

/// Brent's bounded minimization of `f` on `[lower, upper]`: golden-section steps with
/// parabolic interpolation once the bracket is well behaved.
///
/// The search stops when the bracket around the current best point shrinks below roughly
/// `xtol`, or after `max_evaluations` calls to `f`. The objective need not be smooth; on a
/// step function it behaves as a golden-section search.
pub fn minimize_bounded(
    mut f: impl FnMut(f64) -> f64,
    lower: f64,
    upper: f64,
    xtol: f64,
    max_evaluations: usize,
) -> Minimum {
    let sqrt_eps = f64::EPSILON.sqrt();
    let (mut a, mut b) = (lower, upper);

    let mut fulc = a + GOLDEN_MEAN * (b - a);
    let mut nfc = fulc;
    let mut xf = fulc;
    let mut rat = 0.0f64;
    let mut e = 0.0f64;

    let mut fx = f(xf);
    let mut evaluations = 1;
    let mut ffulc = fx;
    let mut fnfc = fx;

    let mut xm = 0.5 * (a + b);
    let mut tol1 = sqrt_eps * xf.abs() + xtol / 3.0;
    let mut tol2 = 2.0 * tol1;
    let mut converged = true;

    while (xf - xm).abs() > tol2 - 0.5 * (b - a) {
        let mut golden = true;

        if e.abs() > tol1 {
            golden = false;
            let mut r = (xf - nfc) * (fx - ffulc);
            let mut q = (xf - fulc) * (fx - fnfc);
            let mut p = (xf - fulc) * q - (xf - nfc) * r;
            q = 2.0 * (q - r);
            if q > 0.0 {
                p = -p;
            }
            q = q.abs();
            r = e;
            e = rat;

            let acceptable = p.abs() < (0.5 * q * r).abs() && p > q * (a - xf) && p < q * (b - xf);
            if acceptable {
                rat = p / q;
                let x = xf + rat;
                if (x - a) < tol2 || (b - x) < tol2 {
                    rat = tol1 * sign_or_one(xm - xf);
                }
            } else {
                golden = true;
            }
        }

        if golden {
            e = if xf >= xm { a - xf } else { b - xf };
            rat = GOLDEN_MEAN * e;
        }

        let x = xf + sign_or_one(rat) * rat.abs().max(tol1);
        let fu = f(x);
        evaluations += 1;

        if fu <= fx {
            if x >= xf {
                a = xf;
            } else {
                b = xf;
            }
            fulc = nfc;
            ffulc = fnfc;
            nfc = xf;
            fnfc = fx;
            xf = x;
            fx = fu;
        } else {
            if x < xf {
                a = x;
            } else {
                b = x;
            }
            if fu <= fnfc || nfc == xf {
                fulc = nfc;
                ffulc = fnfc;
                nfc = x;
                fnfc = fu;
            } else if fu <= ffulc || fulc == xf || fulc == nfc {
                fulc = x;
                ffulc = fu;
            }
        }

        xm = 0.5 * (a + b);
        tol1 = sqrt_eps * xf.abs() + xtol / 3.0;
        tol2 = 2.0 * tol1;

        if evaluations >= max_evaluations {
            converged = false;
            break;
        }
    }

    Minimum {
        x: xf,
        value: fx,
        evaluations,
        converged,
    }
}

/// `signum` that maps zero to one.
fn sign_or_one(v: f64) -> f64 {
    if v < 0.0 { -1.0 } else { 1.0 }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_parabola_minimum() {
        let m = minimize_bounded(|x| (x - 2.0).powi(2) + 1.0, 0.0, 5.0, 1e-5, 500);
        assert!(m.converged);
        assert!((m.x - 2.0).abs() < 1e-4);
        assert!((m.value - 1.0).abs() < 1e-8);
    }

    #[test]
    fn minimum_at_bound_is_approached() {
        let m = minimize_bounded(|x| x, 1.0, 3.0, 1e-3, 500);
        assert!(m.x < 1.01);
        assert!(m.x >= 1.0);
    }

    #[test]
    fn step_objective_lands_in_the_flat_minimum() {
        // Piecewise constant, zero on [11, 13).
        let f = |x: f64| {
            if x < 11.0 {
                (11.0 - x).ceil()
            } else if x < 13.0 {
                0.0
            } else {
                (x - 12.0).ceil()
            }
        };
        let m = minimize_bounded(f, 0.0, 30.0, 0.025, 500);
        assert_eq!(m.value, 0.0);
        assert!((11.0..13.0).contains(&m.x));
    }

    #[test]
    fn evaluation_budget_is_respected() {
        let mut calls = 0;
        let m = minimize_bounded(
            |x| {
                calls += 1;
                (x - 0.3).abs()
            },
            0.0,
            1.0,
            1e-12,
            5,
        );
        assert_eq!(m.evaluations, 5);
        assert_eq!(calls, 5);
        assert!(!m.converged);
    }
}
