//! Writes a directory of synthetic spectrum-monitor captures:
//! `<stamp>.ave.<pol>` and `<stamp>.maxh.<pol>` two-column text files with a
//! handful of narrow-band interferers on a noisy floor.
//!
//! Usage: `generate_sample [DIR] [CAPTURES]` (defaults: `captures`, 5)

use std::fmt::Write as _;
use std::path::PathBuf;

use anyhow::{Context, Result};

fn gaussian(x: f64, mu: f64, sigma: f64, amplitude: f64) -> f64 {
    amplitude * (-(x - mu).powi(2) / (2.0 * sigma.powi(2))).exp()
}

/// Power in dBm: noise floor plus interferers `(centre MHz, width MHz, height dB)`.
fn generate_spectrum(
    freqs: &[f64],
    floor_dbm: f64,
    interferers: &[(f64, f64, f64)],
    noise_db: f64,
    rng: &mut SimpleRng,
) -> Vec<f64> {
    freqs
        .iter()
        .map(|&f| {
            let signal: f64 = interferers
                .iter()
                .map(|&(mu, sigma, amp)| gaussian(f, mu, sigma, amp))
                .sum();
            floor_dbm + signal + rng.gauss(0.0, noise_db)
        })
        .collect()
}

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
        let result = (self.state[1].wrapping_mul(5)).rotate_left(7).wrapping_mul(9);
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

fn to_columns(freqs: &[f64], vals: &[f64]) -> String {
    let mut out = String::from("# freq_MHz power_dBm\n");
    for (f, v) in freqs.iter().zip(vals) {
        let _ = writeln!(out, "{f:.3} {v:.3}");
    }
    out
}

fn main() -> Result<()> {
    let mut args = std::env::args().skip(1);
    let dir = PathBuf::from(args.next().unwrap_or_else(|| "captures".to_string()));
    let captures: usize = match args.next() {
        Some(n) => n.parse().context("CAPTURES must be a number")?,
        None => 5,
    };
    std::fs::create_dir_all(&dir).with_context(|| format!("creating {}", dir.display()))?;

    let mut rng = SimpleRng::new(42);

    // 50 – 250 MHz in 0.25 MHz steps
    let freqs: Vec<f64> = (0..800).map(|i| 50.0 + i as f64 * 0.25).collect();

    let interferers: [(&str, Vec<(f64, f64, f64)>); 2] = [
        ("E", vec![(88.5, 0.3, 35.0), (137.9, 0.25, 20.0), (174.0, 0.5, 28.0)]),
        ("N", vec![(96.1, 0.3, 30.0), (137.9, 0.25, 24.0), (221.0, 0.4, 18.0)]),
    ];

    let mut written = 0;
    for k in 0..captures {
        let stamp = format!("20171018-12{:02}00", k);
        for (pol, lines) in &interferers {
            // Interferers drift in strength from capture to capture.
            let scaled: Vec<(f64, f64, f64)> = lines
                .iter()
                .map(|&(mu, sigma, amp)| (mu, sigma, amp * (0.6 + 0.4 * rng.next_f64())))
                .collect();
            let ave = generate_spectrum(&freqs, -95.0, &scaled, 0.5, &mut rng);
            let maxhold: Vec<f64> = generate_spectrum(&freqs, -92.0, &scaled, 1.0, &mut rng)
                .into_iter()
                .zip(&ave)
                .map(|(m, a)| m.max(*a))
                .collect();

            let ave_path = dir.join(format!("{stamp}.ave.{pol}"));
            let maxh_path = dir.join(format!("{stamp}.maxh.{pol}"));
            std::fs::write(&ave_path, to_columns(&freqs, &ave))
                .with_context(|| format!("writing {}", ave_path.display()))?;
            std::fs::write(&maxh_path, to_columns(&freqs, &maxhold))
                .with_context(|| format!("writing {}", maxh_path.display()))?;
            written += 2;
        }
    }

    println!(
        "Wrote {written} capture files ({} samples each) to {}",
        freqs.len(),
        dir.display()
    );
    Ok(())
}
