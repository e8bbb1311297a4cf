//! The simulation step.

use std::time::Duration;

use rally_protocol::{Ball, Direction, PaddleIntent, Pair, Side};

use crate::state::serve;
use crate::{MatchState, SimConfig};

/// Latest intent for each paddle, as read at the start of a tick.
pub type Inputs = Pair<PaddleIntent>;

/// Advances `state` by one tick of length `dt`.
///
/// Returns the new state and whether the match is finished. A finished
/// state comes back unchanged, tick index included.
///
/// Order within a tick:
///
/// 1. paddles move toward their intent, clamped to the field
/// 2. the ball moves, bounces off a paddle it swept into, then off walls
/// 3. a ball fully past a goal line scores and is re-served
pub fn step(
    state: &MatchState,
    inputs: &Inputs,
    config: &SimConfig,
    dt: Duration,
) -> (MatchState, bool) {
    if state.finished {
        return (state.clone(), true);
    }

    let secs = dt.as_secs_f64();
    let mut next = state.clone();

    next.paddles = Pair::new(
        move_paddle(state.paddles.left, inputs.left, config, secs),
        move_paddle(state.paddles.right, inputs.right, config, secs),
    );

    let prev = state.ball;
    let mut ball = Ball {
        x: prev.x + prev.vx * secs,
        y: prev.y + prev.vy * secs,
        ..prev
    };
    bounce_off_paddles(&prev, &mut ball, &next.paddles, config);
    bounce_off_walls(&mut ball, config);
    next.ball = ball;

    if let Some(scorer) = goal_scored(&next.ball, config) {
        award_point(&mut next, scorer, config);
    }

    next.tick += 1;
    let finished = next.finished;
    (next, finished)
}

// ---------------------------------------------------------------------------
// Paddles
// ---------------------------------------------------------------------------

fn move_paddle(y: f64, intent: PaddleIntent, config: &SimConfig, secs: f64) -> f64 {
    let reach = config.paddle_speed * secs;
    let moved = match intent {
        PaddleIntent::Direction(Direction::Up) => y - reach,
        PaddleIntent::Direction(Direction::Down) => y + reach,
        PaddleIntent::Direction(Direction::Stay) => y,
        PaddleIntent::Target(target) => y + (target - y).clamp(-reach, reach),
    };
    let (lo, hi) = config.paddle_range();
    moved.clamp(lo, hi)
}

// ---------------------------------------------------------------------------
// Ball
// ---------------------------------------------------------------------------

/// Swept test against each paddle face. Only a ball that started the tick
/// in front of a face and ended it past that face can hit it, so a fast
/// ball never tunnels through and a ball already behind a paddle keeps
/// going toward the goal.
fn bounce_off_paddles(prev: &Ball, ball: &mut Ball, paddles: &Pair<f64>, config: &SimConfig) {
    let r = config.ball_radius;

    if prev.vx < 0.0 {
        let face = config.left_face();
        if prev.x - r >= face && ball.x - r < face {
            let t = (prev.x - r - face) / (prev.x - ball.x);
            let y_cross = prev.y + (ball.y - prev.y) * t;
            if (y_cross - paddles.left).abs() <= config.paddle_height / 2.0 + r {
                relaunch(ball, Side::Left, face + r, y_cross, paddles.left, config);
            }
        }
    } else if prev.vx > 0.0 {
        let face = config.right_face();
        if prev.x + r <= face && ball.x + r > face {
            let t = (face - prev.x - r) / (ball.x - prev.x);
            let y_cross = prev.y + (ball.y - prev.y) * t;
            if (y_cross - paddles.right).abs() <= config.paddle_height / 2.0 + r {
                relaunch(ball, Side::Right, face - r, y_cross, paddles.right, config);
            }
        }
    }
}

/// Sends the ball back out from the paddle of `side`. The further from the
/// paddle center the contact, the steeper the outgoing angle.
fn relaunch(ball: &mut Ball, side: Side, x: f64, y: f64, paddle: f64, config: &SimConfig) {
    let reach = config.paddle_height / 2.0 + config.ball_radius;
    let offset = ((y - paddle) / reach).clamp(-1.0, 1.0);
    let angle = offset * config.max_bounce_angle;

    let speed = (ball.vx.hypot(ball.vy) * config.speed_gain).min(config.max_ball_speed);
    let away = match side {
        Side::Left => 1.0,
        Side::Right => -1.0,
    };

    ball.x = x;
    ball.y = y;
    ball.vx = away * speed * angle.cos();
    ball.vy = speed * angle.sin();
}

fn bounce_off_walls(ball: &mut Ball, config: &SimConfig) {
    let r = config.ball_radius;
    let (top, bottom) = (r, config.height - r);

    if ball.y < top {
        ball.y = 2.0 * top - ball.y;
        ball.vy = ball.vy.abs();
    } else if ball.y > bottom {
        ball.y = 2.0 * bottom - ball.y;
        ball.vy = -ball.vy.abs();
    }
    // A very fast ball can overshoot the mirror point.
    ball.y = ball.y.clamp(top, bottom);
}

// ---------------------------------------------------------------------------
// Scoring
// ---------------------------------------------------------------------------

/// The side that scores when the ball is entirely past a goal line.
fn goal_scored(ball: &Ball, config: &SimConfig) -> Option<Side> {
    let r = config.ball_radius;
    if ball.x + r < 0.0 {
        Some(Side::Right)
    } else if ball.x - r > config.width {
        Some(Side::Left)
    } else {
        None
    }
}

fn award_point(state: &mut MatchState, scorer: Side, config: &SimConfig) {
    *state.scores.get_mut(scorer) += 1;

    if *state.scores.get(scorer) >= config.win_score {
        state.finished = true;
        state.ball = Ball {
            x: config.width / 2.0,
            y: config.height / 2.0,
            vx: 0.0,
            vy: 0.0,
        };
        return;
    }

    let total = state.scores.left + state.scores.right;
    let vertical = if total % 2 == 0 { 1.0 } else { -1.0 };
    state.ball = serve(config, scorer.opponent(), vertical);
}
