use rally_protocol::{Ball, MatchId, Pair, Side, Snapshot};

use crate::SimConfig;

/// Full mutable state of one match. Owned by exactly one room and only
/// ever touched from that room's tick loop.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchState {
    pub ball: Ball,
    /// Paddle centers along `y`.
    pub paddles: Pair<f64>,
    pub scores: Pair<u32>,
    /// Ticks applied so far. The kickoff state is tick 0.
    pub tick: u64,
    pub finished: bool,
}

impl MatchState {
    /// The state a match starts in: paddles centered, scores 0-0, ball
    /// served from the center toward the right side.
    pub fn kickoff(config: &SimConfig) -> Self {
        let mid = config.height / 2.0;
        Self {
            ball: serve(config, Side::Right, 1.0),
            paddles: Pair::new(mid, mid),
            scores: Pair::default(),
            tick: 0,
            finished: false,
        }
    }

    /// Captures the state as a wire snapshot.
    pub fn snapshot(&self, match_id: MatchId) -> Snapshot {
        Snapshot {
            match_id,
            ball: self.ball,
            paddles: self.paddles,
            scores: self.scores,
            tick: self.tick,
            finished: self.finished,
        }
    }

    /// Which side has reached the win score, if any.
    pub fn winner(&self) -> Option<Side> {
        if !self.finished {
            return None;
        }
        match self.scores.left.cmp(&self.scores.right) {
            std::cmp::Ordering::Greater => Some(Side::Left),
            std::cmp::Ordering::Less => Some(Side::Right),
            std::cmp::Ordering::Equal => None,
        }
    }
}

/// A ball at the center heading toward `toward` at serve speed.
/// `vertical` is `1.0` (down) or `-1.0` (up).
pub(crate) fn serve(config: &SimConfig, toward: Side, vertical: f64) -> Ball {
    let horizontal = match toward {
        Side::Left => -1.0,
        Side::Right => 1.0,
    };
    Ball {
        x: config.width / 2.0,
        y: config.height / 2.0,
        vx: horizontal * config.serve_speed * config.serve_angle.cos(),
        vy: vertical * config.serve_speed * config.serve_angle.sin(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kickoff_is_centered_and_scoreless() {
        let cfg = SimConfig::default();
        let s = MatchState::kickoff(&cfg);

        assert_eq!(s.tick, 0);
        assert!(!s.finished);
        assert_eq!(s.scores, Pair::new(0, 0));
        assert_eq!(s.paddles, Pair::new(300.0, 300.0));
        assert_eq!((s.ball.x, s.ball.y), (400.0, 300.0));
        assert!(s.ball.vx > 0.0, "first serve goes right");
        assert_eq!(s.winner(), None);
    }

    #[test]
    fn test_snapshot_copies_every_field() {
        let cfg = SimConfig::default();
        let mut s = MatchState::kickoff(&cfg);
        s.tick = 9;
        s.scores = Pair::new(1, 2);

        let id = MatchId::random();
        let snap = s.snapshot(id);
        assert_eq!(snap.match_id, id);
        assert_eq!(snap.tick, 9);
        assert_eq!(snap.scores, Pair::new(1, 2));
        assert_eq!(snap.ball, s.ball);
        assert_eq!(snap.paddles, s.paddles);
        assert!(!snap.finished);
    }

    #[test]
    fn test_serve_speed_matches_config() {
        let cfg = SimConfig::default();
        let ball = serve(&cfg, Side::Left, -1.0);
        let speed = (ball.vx * ball.vx + ball.vy * ball.vy).sqrt();
        assert!((speed - cfg.serve_speed).abs() < 1e-9);
        assert!(ball.vx < 0.0);
        assert!(ball.vy < 0.0);
    }
}
