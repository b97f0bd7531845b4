use rkyv::{Archive, Deserialize, Serialize};

pub const PERMISSION_RATIO_DEFAULT: f32 = 1.0 / 6.0;
pub const PERMISSION_RATIO_MIN: f32 = 0.02;
pub const PERMISSION_RATIO_MAX: f32 = 0.5;

pub const HOLD_TIMEOUT_MS_DEFAULT: u64 = 10 * 1000;
pub const HOLD_TIMEOUT_MS_MIN: u64 = 1000;
pub const HOLD_TIMEOUT_MS_MAX: u64 = 120 * 1000;

pub const SCATTER_SPACING_DEFAULT: (f32, f32) = (1.4, 1.45);
pub const SCATTER_SPACING_MIN: f32 = 1.0;
pub const SCATTER_SPACING_MAX: f32 = 4.0;

/// `(active participants below, broadcast every Nth move sample)`.
pub const MOVE_SAMPLE_TIERS: [(usize, u32); 4] = [(3, 2), (10, 5), (30, 10), (50, 20)];
pub const MOVE_SAMPLE_MAX: u32 = 30;

pub const SCATTER_SHUFFLE_SALT: u32 = 0xC0DE;

#[derive(Debug, Clone, Copy, PartialEq, Archive, Serialize, Deserialize)]
pub struct GameRules {
    pub permission_ratio: f32,
    pub hold_timeout_ms: u64,
    pub scatter_spacing: (f32, f32),
}

impl Default for GameRules {
    fn default() -> Self {
        Self {
            permission_ratio: PERMISSION_RATIO_DEFAULT,
            hold_timeout_ms: HOLD_TIMEOUT_MS_DEFAULT,
            scatter_spacing: SCATTER_SPACING_DEFAULT,
        }
    }
}

impl GameRules {
    pub fn sanitized(self) -> Self {
        let permission_ratio = if self.permission_ratio.is_finite() {
            self.permission_ratio
                .clamp(PERMISSION_RATIO_MIN, PERMISSION_RATIO_MAX)
        } else {
            PERMISSION_RATIO_DEFAULT
        };
        let spacing_axis = |value: f32, fallback: f32| {
            if value.is_finite() {
                value.clamp(SCATTER_SPACING_MIN, SCATTER_SPACING_MAX)
            } else {
                fallback
            }
        };
        Self {
            permission_ratio,
            hold_timeout_ms: self
                .hold_timeout_ms
                .clamp(HOLD_TIMEOUT_MS_MIN, HOLD_TIMEOUT_MS_MAX),
            scatter_spacing: (
                spacing_axis(self.scatter_spacing.0, SCATTER_SPACING_DEFAULT.0),
                spacing_axis(self.scatter_spacing.1, SCATTER_SPACING_DEFAULT.1),
            ),
        }
    }

    pub fn permission_for(&self, piece_width: f32) -> f32 {
        piece_width * self.permission_ratio
    }
}

pub fn move_sample_interval(active: usize) -> u32 {
    MOVE_SAMPLE_TIERS
        .iter()
        .find(|(below, _)| active < *below)
        .map(|(_, every)| *every)
        .unwrap_or(MOVE_SAMPLE_MAX)
}

pub fn splitmix32(mut value: u32) -> u32 {
    value = value.wrapping_add(0x9E37_79B9);
    let mut z = value;
    z = (z ^ (z >> 16)).wrapping_mul(0x85EB_CA6B);
    z = (z ^ (z >> 13)).wrapping_mul(0xC2B2_AE35);
    z ^ (z >> 16)
}

pub fn rand_unit(seed: u32, salt: u32) -> f32 {
    let top = splitmix32(seed ^ salt) >> 8;
    top as f32 / ((1u32 << 24) as f32)
}

/// Clamps one axis into `[0, max]`. NaN lands on the low edge.
pub fn clamp_axis(value: f32, max: f32) -> f32 {
    if value.is_nan() {
        return 0.0;
    }
    value.clamp(0.0, max.max(0.0))
}

pub fn within_tolerance(delta: (f32, f32), tolerance: f32) -> bool {
    delta.0.abs() <= tolerance && delta.1.abs() <= tolerance
}

pub fn sub(a: (f32, f32), b: (f32, f32)) -> (f32, f32) {
    (a.0 - b.0, a.1 - b.1)
}

pub fn add(a: (f32, f32), b: (f32, f32)) -> (f32, f32) {
    (a.0 + b.0, a.1 + b.1)
}

pub fn shuffled_order(seed: u32, count: usize) -> Vec<usize> {
    let mut order: Vec<usize> = (0..count).collect();
    for i in (1..order.len()).rev() {
        let salt = SCATTER_SHUFFLE_SALT.wrapping_add(i as u32);
        let j = ((rand_unit(seed, salt) * (i as f32 + 1.0)) as usize).min(i);
        order.swap(i, j);
    }
    order
}

/// Lays pieces out on rings around the board, walking right, down, left
/// and up, widening the ring by one slot on every side per lap.
pub fn scatter_layout(
    seed: u32,
    count: usize,
    piece_size: (f32, f32),
    image_size: (f32, f32),
    board_margin: (f32, f32),
    spacing: (f32, f32),
) -> Vec<(f32, f32)> {
    let mut positions = vec![(0.0, 0.0); count];
    if count == 0 {
        return positions;
    }
    let slot_w = (piece_size.0 * spacing.0).max(1.0);
    let slot_h = (piece_size.1 * spacing.1).max(1.0);
    let mut lap_x = (image_size.0 / slot_w).ceil() as usize + 1;
    let mut lap_y = (image_size.1 / slot_h).ceil() as usize + 3;
    let mut x = board_margin.0 - slot_w * 0.5;
    let mut y = board_margin.1 - slot_h * 1.5;

    let mut remaining = shuffled_order(seed, count).into_iter();
    'rings: loop {
        for _ in 0..lap_x {
            let Some(id) = remaining.next() else {
                break 'rings;
            };
            positions[id] = (x, y);
            x += slot_w;
        }
        for _ in 0..lap_y.saturating_sub(1) {
            let Some(id) = remaining.next() else {
                break 'rings;
            };
            positions[id] = (x, y);
            y += slot_h;
        }
        for _ in 0..lap_x + 1 {
            let Some(id) = remaining.next() else {
                break 'rings;
            };
            positions[id] = (x, y);
            x -= slot_w;
        }
        for _ in 0..lap_y {
            let Some(id) = remaining.next() else {
                break 'rings;
            };
            positions[id] = (x, y);
            y -= slot_h;
        }
        lap_x += 2;
        lap_y += 2;
    }
    positions
}
