//! Celebration burst shown after a task is completed.
//!
//! Particles live in a virtual pixel space of `cols * 8` by `rows * 16` and
//! step once per 16 ms frame. The burst is purely cosmetic; it is advanced by
//! ticks and dropped when its time is up.

use rand::Rng;
use ratatui::style::Color;

pub const BURST_DURATION_MS: u64 = 900;
pub const PARTICLE_COUNT: usize = 140;
pub const FRAME_MS: u64 = 16;
pub const GRAVITY: f64 = 0.05;

const CELL_W: f64 = 8.0;
const CELL_H: f64 = 16.0;

pub const PALETTE: [Color; 5] = [
    Color::Rgb(0x38, 0xbd, 0xf8),
    Color::Rgb(0x60, 0xa5, 0xfa),
    Color::Rgb(0xa8, 0x55, 0xf7),
    Color::Rgb(0xf9, 0x73, 0x16),
    Color::Rgb(0x4a, 0xde, 0x80),
];

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Particle {
    pub x: f64,
    pub y: f64,
    pub vx: f64,
    pub vy: f64,
    pub color: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Burst {
    pub started_ms: u64,
    pub elapsed_ms: u64,
    pub width: f64,
    pub height: f64,
    pub particles: Vec<Particle>,
}

impl Burst {
    pub fn launch<R: Rng + ?Sized>(rng: &mut R, now_ms: u64, cols: u16, rows: u16) -> Self {
        let width = f64::from(cols.max(1)) * CELL_W;
        let height = f64::from(rows.max(1)) * CELL_H;
        let particles = (0..PARTICLE_COUNT)
            .map(|_| Particle {
                x: rng.random_range(0.0..width),
                y: rng.random_range(-20.0..20.0),
                vx: rng.random_range(-2.0..2.0),
                vy: rng.random_range(2.0..6.0),
                color: rng.random_range(0..PALETTE.len()),
            })
            .collect();
        Self {
            started_ms: now_ms,
            elapsed_ms: 0,
            width,
            height,
            particles,
        }
    }

    /// Moves the clock forward; false once the burst has expired.
    pub fn advance(&mut self, now_ms: u64) -> bool {
        self.elapsed_ms = now_ms.saturating_sub(self.started_ms);
        self.is_alive()
    }

    pub fn is_alive(&self) -> bool {
        self.elapsed_ms <= BURST_DURATION_MS
    }

    pub fn frame(&self) -> u64 {
        self.elapsed_ms / FRAME_MS
    }

    /// Particle positions at the current frame, in screen-down coordinates.
    pub fn positions(&self) -> impl Iterator<Item = (f64, f64, Color)> + '_ {
        let n = self.frame() as f64;
        let drop = GRAVITY * n * (n - 1.0).max(0.0) / 2.0;
        self.particles.iter().map(move |p| {
            let x = p.x + p.vx * n;
            let y = p.y + p.vy * n + drop;
            (x, y, PALETTE[p.color % PALETTE.len()])
        })
    }

    /// Positions inside the visible area, flipped for a y-up canvas.
    pub fn visible_points(&self) -> Vec<(f64, f64, Color)> {
        self.positions()
            .filter(|(x, y, _)| *x >= 0.0 && *x <= self.width && *y >= 0.0 && *y <= self.height)
            .map(|(x, y, c)| (x, self.height - y, c))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn launch_spawns_particles_along_the_top_edge() {
        let mut rng = StdRng::seed_from_u64(7);
        let burst = Burst::launch(&mut rng, 1_000, 80, 24);
        assert_eq!(burst.particles.len(), PARTICLE_COUNT);
        for p in &burst.particles {
            assert!((0.0..640.0).contains(&p.x));
            assert!((-20.0..20.0).contains(&p.y));
            assert!((2.0..6.0).contains(&p.vy));
            assert!(p.color < PALETTE.len());
        }
    }

    #[test]
    fn expires_after_duration() {
        let mut rng = StdRng::seed_from_u64(1);
        let mut burst = Burst::launch(&mut rng, 1_000, 10, 10);
        assert!(burst.advance(1_000 + BURST_DURATION_MS));
        assert!(!burst.advance(1_001 + BURST_DURATION_MS));
    }

    #[test]
    fn gravity_accelerates_the_fall() {
        let mut burst = Burst {
            started_ms: 0,
            elapsed_ms: 0,
            width: 100.0,
            height: 1_000.0,
            particles: vec![Particle {
                x: 10.0,
                y: 0.0,
                vx: 1.0,
                vy: 2.0,
                color: 0,
            }],
        };
        burst.advance(FRAME_MS * 10);
        let (x, y, _) = burst.positions().next().unwrap();
        assert_eq!(x, 20.0);
        // 10 steps of vy=2 plus 0.05 * (0 + 1 + ... + 9)
        assert!((y - (20.0 + 0.05 * 45.0)).abs() < 1e-9);
    }
}
