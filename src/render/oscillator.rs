//! Color oscillator
//!
//! Maps time to a color between two endpoints. The blend follows a sine wave
//! so the text fades smoothly from one color to the other and back once per
//! `speed` seconds.

use std::f64::consts::TAU;

use image::Rgb;

/// Blend fraction in [0, 1] at time `t`, with period `speed` (seconds).
///
/// `speed` must be positive; callers validate it beforehand.
pub fn mix_fraction(t: f64, speed: f64) -> f64 {
    // Reduce to one period first so large wall-clock times keep their precision.
    let phase = (t / speed).rem_euclid(1.0);
    ((phase * TAU).sin() + 1.0) / 2.0
}

/// Interpolated color at time `t`. Channels are truncated toward zero.
pub fn oscillate(t: f64, speed: f64, color1: Rgb<u8>, color2: Rgb<u8>) -> Rgb<u8> {
    lerp(color1, color2, mix_fraction(t, speed))
}

/// Linear blend of two colors, `mix = 0` gives `a`, `mix = 1` gives `b`.
pub fn lerp(a: Rgb<u8>, b: Rgb<u8>, mix: f64) -> Rgb<u8> {
    let mix = mix.clamp(0.0, 1.0);
    // Offset form keeps equal endpoints exact at every mix.
    let channel = |i: usize| (a[i] as f64 + (b[i] as f64 - a[i] as f64) * mix) as u8;
    Rgb([channel(0), channel(1), channel(2)])
}

#[cfg(test)]
mod tests {
    use super::*;

    const RED: Rgb<u8> = Rgb([255, 0, 0]);
    const BLUE: Rgb<u8> = Rgb([0, 0, 255]);

    #[test]
    fn test_mix_stays_in_unit_range() {
        for speed in [0.1, 0.7, 1.0, 2.5, 5.0] {
            for i in 0..1000 {
                let t = i as f64 * 0.0137;
                let mix = mix_fraction(t, speed);
                assert!((0.0..=1.0).contains(&mix), "mix {mix} at t={t} speed={speed}");
            }
        }
    }

    #[test]
    fn test_extremes_hit_endpoints() {
        // sin = 1 a quarter period in, sin = -1 three quarters in
        assert_eq!(mix_fraction(0.25, 1.0), 1.0);
        assert_eq!(oscillate(0.25, 1.0, RED, BLUE), BLUE);
        assert_eq!(oscillate(0.75, 1.0, RED, BLUE), RED);

        assert_eq!(oscillate(0.5, 2.0, RED, BLUE), BLUE);
        assert_eq!(oscillate(1.5, 2.0, RED, BLUE), RED);
    }

    #[test]
    fn test_midpoint_at_zero() {
        assert!((mix_fraction(0.0, 1.0) - 0.5).abs() < 1e-12);
        assert_eq!(oscillate(0.0, 1.0, RED, BLUE), Rgb([127, 0, 127]));
    }

    #[test]
    fn test_periodic_in_speed() {
        for speed in [0.3, 1.0, 2.0] {
            for t in [0.1, 0.37, 0.9, 3.3] {
                let a = mix_fraction(t, speed);
                let b = mix_fraction(t + speed, speed);
                assert!((a - b).abs() < 1e-9, "t={t} speed={speed}: {a} vs {b}");
            }
        }
        assert_eq!(oscillate(0.1, 1.0, RED, BLUE), oscillate(1.1, 1.0, RED, BLUE));
        assert_eq!(oscillate(0.6, 2.0, RED, BLUE), oscillate(2.6, 2.0, RED, BLUE));
    }

    #[test]
    fn test_lerp_truncates() {
        let c = lerp(Rgb([0, 0, 0]), Rgb([10, 100, 255]), 0.55);
        // 5.5, 55.0, 140.25
        assert_eq!(c, Rgb([5, 55, 140]));

        let c = lerp(Rgb([255, 200, 0]), Rgb([0, 0, 0]), 0.5);
        // 127.5, 100.0, 0.0
        assert_eq!(c, Rgb([127, 100, 0]));
    }

    #[test]
    fn test_equal_colors_never_flicker() {
        let white = Rgb([255, 255, 255]);
        let grey = Rgb([77, 77, 77]);
        for i in 0..300 {
            let t = i as f64 / 30.0;
            assert_eq!(oscillate(t, 1.0, white, white), white, "t={t}");
            assert_eq!(oscillate(t, 0.7, grey, grey), grey, "t={t}");
        }
    }
}
