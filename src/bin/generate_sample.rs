//! Writes a synthetic asteroid light curve in the archive's FITS layout,
//! for demos and manual testing of the viewer.

use rusty_ceres::data::fits;
use rusty_ceres::data::model::{LightCurve, MetaValue};

/// Minimal deterministic PRNG (xoshiro256**)
struct SimpleRng {
    state: [u64; 4],
}

impl SimpleRng {
    fn new(seed: u64) -> Self {
        let mut s = [0u64; 4];
        let mut x = seed;
        for slot in &mut s {
            x = x.wrapping_mul(6364136223846793005).wrapping_add(1);
            *slot = x;
        }
        SimpleRng { state: s }
    }

    fn next_u64(&mut self) -> u64 {
        let result = (self.state[1].wrapping_mul(5))
            .rotate_left(7)
            .wrapping_mul(9);
        let t = self.state[1] << 17;
        self.state[2] ^= self.state[0];
        self.state[3] ^= self.state[1];
        self.state[1] ^= self.state[2];
        self.state[0] ^= self.state[3];
        self.state[2] ^= t;
        self.state[3] = self.state[3].rotate_left(45);
        result
    }

    fn next_f64(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 / (1u64 << 53) as f64
    }

    /// Box-Muller transform for normal distribution
    fn gauss(&mut self, mean: f64, std_dev: f64) -> f64 {
        let u1 = self.next_f64().max(1e-15);
        let u2 = self.next_f64();
        let z = (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos();
        mean + std_dev * z
    }
}

fn main() {
    let mut rng = SimpleRng::new(42);

    // One point per observation pass over ~60 days, starting at MJD 59000.
    let n_points = 240;
    let start_mjd = 59000.0;
    let span_days = 60.0;

    // Rotational modulation: asteroids show a double-peaked curve per
    // rotation, so use twice the rotational frequency.
    let rotation_period_days = 0.38;
    let mean_flux_mjy = 12.0;
    let amplitude_mjy = 1.8;

    let mut curve = LightCurve {
        time_unit: Some("MJD".to_string()),
        flux_unit: Some("mJy".to_string()),
        metadata: [
            ("asteroid".to_string(), MetaValue::String("sample".into())),
            ("array".to_string(), MetaValue::String("pa5".into())),
            ("frequency".to_string(), MetaValue::String("f150".into())),
        ]
        .into_iter()
        .collect(),
        ..Default::default()
    };

    for i in 0..n_points {
        let t = start_mjd + span_days * i as f64 / n_points as f64 + rng.gauss(0.0, 0.02);
        let phase = 2.0 * std::f64::consts::PI * t / rotation_period_days;
        let sigma = 0.4 + rng.next_f64() * 0.3;
        let flux = mean_flux_mjy + amplitude_mjy * (2.0 * phase).sin() + rng.gauss(0.0, sigma);

        curve.time.push(t);
        curve.flux.push(flux);
        curve.flux_uncertainty.push(sigma);
        // Inverse-variance weights, with the occasional dropped point.
        let weight = if rng.next_f64() < 0.05 {
            0.0
        } else {
            1.0 / (sigma * sigma)
        };
        curve.weight.push(weight);
    }

    let output_path = "sample_lc_pa5_f150.fits";
    let bytes = fits::write_lightcurve(&curve);
    std::fs::write(output_path, bytes).expect("Failed to write output file");

    println!("Wrote {} points to {output_path}", curve.len());
}
