//! Play-field geometry and the per-tick physics steps
//!
//! All speeds are in field units per tick. Coordinates grow rightwards and
//! downwards; a paddle's `y` is its top edge.

use rand::Rng;

use crate::ws::protocol::Side;

/// Play-field width
pub const FIELD_WIDTH: f32 = 800.0;
/// Play-field height
pub const FIELD_HEIGHT: f32 = 500.0;

pub const PADDLE_WIDTH: f32 = 12.0;
pub const PADDLE_HEIGHT: f32 = 90.0;
/// Gap between a goal edge and the outer face of its paddle
pub const PADDLE_MARGIN: f32 = 20.0;
/// Flag-control speed
pub const PADDLE_SPEED: f32 = 7.0;
/// Largest step a target-controlled paddle takes toward its target
pub const PADDLE_MAX_TARGET_STEP: f32 = 10.0;

pub const BALL_RADIUS: f32 = 8.0;
pub const BALL_SERVE_SPEED: f32 = 6.0;
/// Speed multiplier applied on every paddle hit
pub const BALL_SPEED_GAIN: f32 = 1.05;
pub const BALL_SPEED_CAP: f32 = 14.0;
/// Largest deflection off a paddle, measured from the horizontal
pub const MAX_BOUNCE_ANGLE: f32 = std::f32::consts::FRAC_PI_4;
/// Half-width of the cone a serve is drawn from
pub const SERVE_MAX_ANGLE: f32 = std::f32::consts::FRAC_PI_6;
/// How far past a goal edge the ball must travel before a point is scored
pub const GOAL_MARGIN: f32 = 2.0 * BALL_RADIUS;
/// Clearance left between ball and paddle face after a hit
const CONTACT_SKIN: f32 = 0.01;

/// Highest valid paddle offset
pub const PADDLE_MAX_Y: f32 = FIELD_HEIGHT - PADDLE_HEIGHT;

/// Paddle offset that centers a paddle vertically
pub fn centered_paddle_y() -> f32 {
    PADDLE_MAX_Y / 2.0
}

/// Axis-aligned rectangle
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub left: f32,
    pub top: f32,
    pub right: f32,
    pub bottom: f32,
}

impl Rect {
    /// Strict overlap; touching edges do not count
    pub fn overlaps(&self, other: &Rect) -> bool {
        self.left < other.right
            && other.left < self.right
            && self.top < other.bottom
            && other.top < self.bottom
    }

    pub fn center_y(&self) -> f32 {
        (self.top + self.bottom) / 2.0
    }
}

/// Ball pose and velocity
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ball {
    pub x: f32,
    pub y: f32,
    pub vx: f32,
    pub vy: f32,
}

impl Ball {
    /// A centered ball served toward `toward` at a random angle inside the serve cone
    pub fn serve<R: Rng>(rng: &mut R, toward: Side) -> Self {
        let angle = rng.gen_range(-SERVE_MAX_ANGLE..=SERVE_MAX_ANGLE);
        let dir = direction_sign(toward);
        Self {
            x: FIELD_WIDTH / 2.0,
            y: FIELD_HEIGHT / 2.0,
            vx: dir * BALL_SERVE_SPEED * angle.cos(),
            vy: BALL_SERVE_SPEED * angle.sin(),
        }
    }

    /// A centered ball served toward a random side
    pub fn serve_random<R: Rng>(rng: &mut R) -> Self {
        let toward = if rng.gen_bool(0.5) {
            Side::Left
        } else {
            Side::Right
        };
        Self::serve(rng, toward)
    }

    pub fn speed(&self) -> f32 {
        self.vx.hypot(self.vy)
    }

    /// Bounding box of the ball, a square of side `2 * BALL_RADIUS`
    pub fn bounds(&self) -> Rect {
        Rect {
            left: self.x - BALL_RADIUS,
            top: self.y - BALL_RADIUS,
            right: self.x + BALL_RADIUS,
            bottom: self.y + BALL_RADIUS,
        }
    }
}

/// Horizontal direction that points at `side`'s goal
pub fn direction_sign(side: Side) -> f32 {
    match side {
        Side::Left => -1.0,
        Side::Right => 1.0,
    }
}

/// Rectangle occupied by the paddle of `side` at offset `y`
pub fn paddle_rect(side: Side, y: f32) -> Rect {
    let left = match side {
        Side::Left => PADDLE_MARGIN,
        Side::Right => FIELD_WIDTH - PADDLE_MARGIN - PADDLE_WIDTH,
    };
    Rect {
        left,
        top: y,
        right: left + PADDLE_WIDTH,
        bottom: y + PADDLE_HEIGHT,
    }
}

pub fn clamp_paddle_y(y: f32) -> f32 {
    y.clamp(0.0, PADDLE_MAX_Y)
}

/// Paddle motion under flag control
pub fn step_paddle_flags(y: f32, up: bool, down: bool) -> f32 {
    let mut dy = 0.0;
    if up {
        dy -= PADDLE_SPEED;
    }
    if down {
        dy += PADDLE_SPEED;
    }
    clamp_paddle_y(y + dy)
}

/// Paddle motion under target control: home the paddle center toward `target`
/// by at most `PADDLE_MAX_TARGET_STEP`
pub fn step_paddle_target(y: f32, target: f32) -> f32 {
    let center = y + PADDLE_HEIGHT / 2.0;
    let delta = (target - center).clamp(-PADDLE_MAX_TARGET_STEP, PADDLE_MAX_TARGET_STEP);
    clamp_paddle_y(y + delta)
}

/// Explicit Euler step, one tick
pub fn integrate(ball: &mut Ball) {
    ball.x += ball.vx;
    ball.y += ball.vy;
}

/// Reflect off the top and bottom walls. Returns true if a bounce happened.
pub fn reflect_walls(ball: &mut Ball) -> bool {
    if ball.y - BALL_RADIUS < 0.0 && ball.vy < 0.0 {
        ball.y = BALL_RADIUS;
        ball.vy = -ball.vy;
        true
    } else if ball.y + BALL_RADIUS > FIELD_HEIGHT && ball.vy > 0.0 {
        ball.y = FIELD_HEIGHT - BALL_RADIUS;
        ball.vy = -ball.vy;
        true
    } else {
        false
    }
}

/// Bounce the ball off the paddle of `side` at offset `paddle_y`.
///
/// Only tested while the ball travels toward that paddle. Returns true on a hit.
pub fn collide_paddle(ball: &mut Ball, side: Side, paddle_y: f32) -> bool {
    let toward = direction_sign(side);
    if ball.vx * toward <= 0.0 {
        return false;
    }

    let paddle = paddle_rect(side, paddle_y);
    if !ball.bounds().overlaps(&paddle) {
        return false;
    }

    // Push the ball out through the face that looks into the field
    ball.x = match side {
        Side::Left => paddle.right + BALL_RADIUS + CONTACT_SKIN,
        Side::Right => paddle.left - BALL_RADIUS - CONTACT_SKIN,
    };

    let offset = ((ball.y - paddle.center_y()) / (PADDLE_HEIGHT / 2.0)).clamp(-1.0, 1.0);
    let angle = offset * MAX_BOUNCE_ANGLE;
    let speed = (ball.speed() * BALL_SPEED_GAIN).min(BALL_SPEED_CAP);

    ball.vx = -toward * speed * angle.cos();
    ball.vy = speed * angle.sin();
    true
}

/// The side that earns a point if the ball has left the field through a goal
pub fn goal_scored(ball: &Ball) -> Option<Side> {
    if ball.x < -GOAL_MARGIN {
        Some(Side::Right)
    } else if ball.x > FIELD_WIDTH + GOAL_MARGIN {
        Some(Side::Left)
    } else {
        None
    }
}
