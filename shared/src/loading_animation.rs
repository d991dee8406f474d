//! Particle field drawn while an identification is processing.
//!
//! The core only simulates; the shell draws circles at the particle positions and a line for
//! every link, one `step` per animation frame.

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::config::AnimationConfig;

/// Stroke colour of link lines (emerald-500 at 15%).
pub const LINK_COLOR: &str = "rgb(16 185 129 / 0.15)";

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Hsla {
    pub hue: f32,
    pub saturation: f32,
    pub lightness: f32,
    pub alpha: f32,
}

impl Hsla {
    fn random<R: Rng + ?Sized>(rng: &mut R) -> Self {
        Self {
            hue: rng.gen_range(160.0..180.0),
            saturation: rng.gen_range(80.0..100.0),
            lightness: rng.gen_range(40.0..60.0),
            alpha: rng.gen_range(0.5..1.0),
        }
    }

    pub fn css(&self) -> String {
        format!(
            "hsla({:.1}, {:.1}%, {:.1}%, {:.2})",
            self.hue, self.saturation, self.lightness, self.alpha
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Particle {
    pub x: f32,
    pub y: f32,
    pub size: f32,
    pub vx: f32,
    pub vy: f32,
    pub color: Hsla,
}

impl Particle {
    fn advance(&mut self, width: f32, height: f32) {
        if (self.x < 0.0 && self.vx < 0.0) || (self.x > width && self.vx > 0.0) {
            self.vx = -self.vx;
        }
        if (self.y < 0.0 && self.vy < 0.0) || (self.y > height && self.vy > 0.0) {
            self.vy = -self.vy;
        }
        self.x += self.vx;
        self.y += self.vy;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Link {
    pub from: usize,
    pub to: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParticleField {
    width: u32,
    height: u32,
    link_distance: f32,
    particles: Vec<Particle>,
}

impl ParticleField {
    /// Seed a fresh field. A zero-sized canvas is treated as 1x1.
    pub fn new<R: Rng + ?Sized>(
        width: u32,
        height: u32,
        config: &AnimationConfig,
        rng: &mut R,
    ) -> Self {
        let config = config.clone().validated();
        let (w, h) = (width.max(1) as f32, height.max(1) as f32);

        let particles = (0..config.particle_count)
            .map(|_| Particle {
                x: rng.gen_range(0.0..w),
                y: rng.gen_range(0.0..h),
                size: rng.gen_range(config.min_size..config.max_size),
                vx: rng.gen_range(-config.max_speed..config.max_speed),
                vy: rng.gen_range(-config.max_speed..config.max_speed),
                color: Hsla::random(rng),
            })
            .collect();

        Self {
            width,
            height,
            link_distance: config.link_distance,
            particles,
        }
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn particles(&self) -> &[Particle] {
        &self.particles
    }

    pub fn step(&mut self) {
        let (w, h) = (self.width as f32, self.height as f32);
        for particle in &mut self.particles {
            particle.advance(w, h);
        }
    }

    /// Every pair of particles strictly closer than the link distance.
    pub fn links(&self) -> Vec<Link> {
        let max_sq = self.link_distance * self.link_distance;
        let mut links = Vec::new();
        for (i, a) in self.particles.iter().enumerate() {
            for (j, b) in self.particles.iter().enumerate().skip(i + 1) {
                let (dx, dy) = (a.x - b.x, a.y - b.y);
                if dx * dx + dy * dy < max_sq {
                    links.push(Link { from: i, to: j });
                }
            }
        }
        links
    }
}
