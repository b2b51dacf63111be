//! Synthetic mono signals.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

fn sample_count(sample_rate: u32, seconds: f32) -> usize {
    (sample_rate as f32 * seconds.max(0.0)).round() as usize
}

/// All-zero buffer
pub fn silence(sample_rate: u32, seconds: f32) -> Vec<f32> {
    vec![0.0; sample_count(sample_rate, seconds)]
}

/// Pure sine wave
pub fn sine(sample_rate: u32, frequency: f32, amplitude: f32, seconds: f32) -> Vec<f32> {
    (0..sample_count(sample_rate, seconds))
        .map(|i| {
            let t = i as f32 / sample_rate as f32;
            amplitude * (2.0 * std::f32::consts::PI * frequency * t).sin()
        })
        .collect()
}

/// Seeded uniform white noise
pub fn noise(sample_rate: u32, seconds: f32, amplitude: f32, seed: u64) -> Vec<f32> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..sample_count(sample_rate, seconds))
        .map(|_| rng.gen_range(-amplitude..=amplitude))
        .collect()
}

/// Silence with short decaying noise bursts at the given times (seconds)
pub fn impulses(sample_rate: u32, seconds: f32, times: &[f32], amplitude: f32) -> Vec<f32> {
    let mut signal = silence(sample_rate, seconds);
    let burst_len = (sample_rate / 50) as usize;
    let mut rng = StdRng::seed_from_u64(0xB1A5);

    for &time in times {
        let start = sample_count(sample_rate, time);
        for offset in 0..burst_len {
            let Some(slot) = signal.get_mut(start + offset) else {
                break;
            };
            let decay = (-(offset as f32) / (burst_len as f32 / 5.0)).exp();
            *slot = amplitude * decay * rng.gen_range(-1.0f32..=1.0);
        }
    }

    signal
}

/// Regular click track: bursts every `interval` seconds starting at `interval`
pub fn click_track(sample_rate: u32, seconds: f32, interval: f32, amplitude: f32) -> Vec<f32> {
    let mut times = Vec::new();
    let mut t = interval;
    while t < seconds {
        times.push(t);
        t += interval;
    }
    impulses(sample_rate, seconds, &times, amplitude)
}
