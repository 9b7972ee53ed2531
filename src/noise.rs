//! 3D simplex noise.
//!
//! This is a component-wise port of the vectorised `dissolve_simplex` WGSL
//! function in `shaders/dissolve/fragment.wgsl` (the classic mod-289
//! permutation polynomial variant), so the CPU and GPU agree on which points
//! are revealed for the same inputs.

use glam::Vec3;

fn mod289(x: f32) -> f32 {
    x - (x * (1.0 / 289.0)).floor() * 289.0
}

fn permute(x: f32) -> f32 {
    mod289(((x * 34.0) + 10.0) * x)
}

fn taylor_inv_sqrt(r: f32) -> f32 {
    1.792_842_9 - 0.853_734_7 * r
}

/// GLSL/WGSL `step(edge, x)`.
fn step(edge: f32, x: f32) -> f32 {
    if x < edge { 0.0 } else { 1.0 }
}

/// Simplex noise at `v`, roughly in `[-1, 1]`.
pub fn simplex3(v: Vec3) -> f32 {
    const C: [f32; 2] = [1.0 / 6.0, 1.0 / 3.0];

    // First corner
    let i = (v + Vec3::splat(v.dot(Vec3::splat(C[1])))).floor();
    let x0 = v - i + Vec3::splat(i.dot(Vec3::splat(C[0])));

    // Other corners
    let g = Vec3::new(step(x0.y, x0.x), step(x0.z, x0.y), step(x0.x, x0.z));
    let l = Vec3::ONE - g;
    let l_zxy = Vec3::new(l.z, l.x, l.y);
    let i1 = g.min(l_zxy);
    let i2 = g.max(l_zxy);

    let x1 = x0 - i1 + Vec3::splat(C[0]);
    let x2 = x0 - i2 + Vec3::splat(C[1]);
    let x3 = x0 - Vec3::splat(0.5);
    let corners = [x0, x1, x2, x3];

    // Permutations
    let i = Vec3::new(mod289(i.x), mod289(i.y), mod289(i.z));
    let ox = [0.0, i1.x, i2.x, 1.0];
    let oy = [0.0, i1.y, i2.y, 1.0];
    let oz = [0.0, i1.z, i2.z, 1.0];

    // Gradients: 7x7 points over a square, mapped onto an octahedron.
    let n = 0.142_857_15; // 1/7
    let ns = Vec3::new(n * 2.0, n * 0.5 - 1.0, n);

    let mut total = 0.0;
    for k in 0..4 {
        let p = permute(permute(permute(i.z + oz[k]) + i.y + oy[k]) + i.x + ox[k]);

        let j = p - 49.0 * (p * ns.z * ns.z).floor();
        let xs = (j * ns.z).floor();
        let ys = (j - 7.0 * xs).floor();

        let x = xs * ns.x + ns.y;
        let y = ys * ns.x + ns.y;
        let h = 1.0 - x.abs() - y.abs();

        let sx = x.floor() * 2.0 + 1.0;
        let sy = y.floor() * 2.0 + 1.0;
        let sh = -step(h, 0.0);

        let gradient = Vec3::new(x + sx * sh, y + sy * sh, h);
        let gradient = gradient * taylor_inv_sqrt(gradient.dot(gradient));

        let corner = corners[k];
        let m = (0.5 - corner.dot(corner)).max(0.0);
        let m = m * m;
        total += m * m * gradient.dot(corner);
    }

    105.0 * total
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lattice() -> impl Iterator<Item = Vec3> {
        (0..12).flat_map(|x| {
            (0..12).flat_map(move |y| {
                (0..12).map(move |z| Vec3::new(x as f32, y as f32, z as f32) * 0.173 - 1.0)
            })
        })
    }

    #[test]
    fn deterministic() {
        for p in lattice() {
            assert_eq!(simplex3(p), simplex3(p));
        }
    }

    #[test]
    fn stays_in_range_and_varies() {
        let values: Vec<f32> = lattice().map(simplex3).collect();
        assert!(values.iter().all(|v| v.is_finite() && v.abs() <= 1.05));

        let min = values.iter().copied().fold(f32::MAX, f32::min);
        let max = values.iter().copied().fold(f32::MIN, f32::max);
        assert!(min < -0.3, "min {min}");
        assert!(max > 0.3, "max {max}");
    }

    #[test]
    fn matches_reference_values() {
        // The origin is not a zero: its second corner sits inside the kernel radius.
        let cases = [
            (Vec3::ZERO, -0.435_872_97),
            (Vec3::new(0.31, -0.77, 1.23), 0.161_109_43),
            (Vec3::new(1.7, 2.9, -0.4), 0.543_986_1),
            (Vec3::new(-3.25, 0.5, 7.75), -0.045_316_92),
        ];
        for (p, expected) in cases {
            let value = simplex3(p);
            assert!((value - expected).abs() < 1e-4, "{p}: {value} != {expected}");
        }
    }

    #[test]
    fn continuous() {
        let p = Vec3::new(0.31, -0.77, 1.23);
        let q = p + Vec3::splat(1e-4);
        assert!((simplex3(p) - simplex3(q)).abs() < 1e-2);
    }
}
