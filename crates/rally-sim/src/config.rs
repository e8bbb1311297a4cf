//! Tunable physical constants for the simulation.

use std::f64::consts::PI;

use serde::{Deserialize, Serialize};
use tracing::warn;

/// Steepest serve or bounce allowed. At a right angle the ball would
/// shuttle between the walls and never reach a goal.
pub const MAX_LAUNCH_ANGLE: f64 = 5.0 * PI / 12.0;

/// Playfield geometry, speeds, and the win condition.
///
/// Lengths are playfield units, speeds are units per second, angles are
/// radians. Every field has a default, so a config file only needs to name
/// what it changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    pub width: f64,
    pub height: f64,

    pub paddle_height: f64,
    pub paddle_width: f64,
    /// Gap between a goal line and the back of its paddle.
    pub paddle_inset: f64,
    pub paddle_speed: f64,

    pub ball_radius: f64,
    /// Ball speed right after a serve.
    pub serve_speed: f64,
    /// Serve direction measured from the horizontal.
    pub serve_angle: f64,
    /// Speed multiplier applied on every paddle hit.
    pub speed_gain: f64,
    pub max_ball_speed: f64,
    /// Outgoing angle when the ball meets the very tip of a paddle.
    /// A center hit goes out flat.
    pub max_bounce_angle: f64,

    /// First score to reach this ends the match.
    pub win_score: u32,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            width: 800.0,
            height: 600.0,
            paddle_height: 100.0,
            paddle_width: 12.0,
            paddle_inset: 24.0,
            paddle_speed: 360.0,
            ball_radius: 8.0,
            serve_speed: 300.0,
            serve_angle: 0.3,
            speed_gain: 1.05,
            max_ball_speed: 720.0,
            max_bounce_angle: std::f64::consts::FRAC_PI_3,
            win_score: 5,
        }
    }
}

impl SimConfig {
    /// Repairs values that would make the physics meaningless.
    ///
    /// - non-positive or non-finite lengths fall back to the defaults
    /// - paddles never taller than the field
    /// - the ball fits in the field with room to move
    /// - the paddle faces stay clear of a ball at the center spot
    /// - serve and bounce angles within [`MAX_LAUNCH_ANGLE`]
    /// - `win_score` at least 1, so a fresh match is never already over
    /// - `max_ball_speed` at least `serve_speed`
    pub fn validated(mut self) -> Self {
        let defaults = Self::default();
        let fix = |value: &mut f64, fallback: f64, name: &str| {
            if !value.is_finite() || *value <= 0.0 {
                warn!(field = name, value = *value, "invalid sim constant, using default");
                *value = fallback;
            }
        };
        fix(&mut self.width, defaults.width, "width");
        fix(&mut self.height, defaults.height, "height");
        fix(&mut self.paddle_height, defaults.paddle_height, "paddle_height");
        fix(&mut self.paddle_width, defaults.paddle_width, "paddle_width");
        fix(&mut self.paddle_speed, defaults.paddle_speed, "paddle_speed");
        fix(&mut self.ball_radius, defaults.ball_radius, "ball_radius");
        fix(&mut self.serve_speed, defaults.serve_speed, "serve_speed");
        fix(&mut self.speed_gain, defaults.speed_gain, "speed_gain");
        fix(&mut self.max_ball_speed, defaults.max_ball_speed, "max_ball_speed");

        if !self.paddle_inset.is_finite() || self.paddle_inset < 0.0 {
            self.paddle_inset = defaults.paddle_inset;
        }
        if !self.serve_angle.is_finite() {
            self.serve_angle = defaults.serve_angle;
        }
        if !self.max_bounce_angle.is_finite() {
            self.max_bounce_angle = defaults.max_bounce_angle;
        }
        self.paddle_height = self.paddle_height.min(self.height);

        let max_radius = self.width.min(self.height) / 4.0;
        if self.ball_radius > max_radius {
            warn!(ball_radius = self.ball_radius, max_radius, "ball too large for the field");
            self.ball_radius = max_radius;
        }

        // A ball at the center spot must be in front of both faces.
        let room = self.width / 2.0 - self.ball_radius;
        let depth = self.paddle_inset + self.paddle_width;
        if depth >= room {
            let scale = room / 2.0 / depth;
            warn!(
                paddle_inset = self.paddle_inset,
                paddle_width = self.paddle_width,
                "paddles reach past the center, shrinking"
            );
            self.paddle_inset *= scale;
            self.paddle_width *= scale;
        }

        for (angle, name) in [
            (&mut self.serve_angle, "serve_angle"),
            (&mut self.max_bounce_angle, "max_bounce_angle"),
        ] {
            if angle.abs() > MAX_LAUNCH_ANGLE {
                warn!(field = name, value = *angle, "angle too steep to ever score, clamping");
                *angle = angle.clamp(-MAX_LAUNCH_ANGLE, MAX_LAUNCH_ANGLE);
            }
        }

        self.max_ball_speed = self.max_ball_speed.max(self.serve_speed);
        if self.win_score == 0 {
            warn!("win_score 0 would finish every match at kickoff, using 1");
            self.win_score = 1;
        }
        self
    }

    /// x of the left paddle's front face.
    pub(crate) fn left_face(&self) -> f64 {
        self.paddle_inset + self.paddle_width
    }

    /// x of the right paddle's front face.
    pub(crate) fn right_face(&self) -> f64 {
        self.width - self.paddle_inset - self.paddle_width
    }

    /// Lowest and highest legal paddle center.
    pub(crate) fn paddle_range(&self) -> (f64, f64) {
        let half = self.paddle_height / 2.0;
        (half, self.height - half)
    }
}
