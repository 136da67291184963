//! Rectangles, offset margins and legacy offset resolution

use serde::{Deserialize, Serialize};

/// Axis-aligned rectangle in CSS pixels
#[derive(Copy, Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub const fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self { x, y, width, height }
    }

    pub fn top(&self) -> f64 {
        self.y
    }

    pub fn bottom(&self) -> f64 {
        self.y + self.height
    }

    pub fn left(&self) -> f64 {
        self.x
    }

    pub fn right(&self) -> f64 {
        self.x + self.width
    }

    /// Move the rectangle by `(dx, dy)`
    pub fn translate(&self, dx: f64, dy: f64) -> Rect {
        Rect::new(self.x + dx, self.y + dy, self.width, self.height)
    }

    /// Grow the rectangle outward by the given margins
    pub fn expand(&self, offsets: &Offsets) -> Rect {
        Rect::new(
            self.x - offsets.left,
            self.y - offsets.top,
            self.width + offsets.left + offsets.right,
            self.height + offsets.top + offsets.bottom,
        )
    }

    /// Edge-inclusive overlap test
    ///
    /// Rectangles that only touch along an edge count as overlapping, so an
    /// element sitting exactly on the fold is considered visible.
    pub fn overlaps(&self, other: &Rect) -> bool {
        self.top() <= other.bottom()
            && self.bottom() >= other.top()
            && self.left() <= other.right()
            && self.right() >= other.left()
    }
}

/// Four-sided margins applied outward to a viewport rectangle
#[derive(Copy, Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Offsets {
    pub top: f64,
    pub bottom: f64,
    pub left: f64,
    pub right: f64,
}

impl Offsets {
    pub const ZERO: Offsets = Offsets::uniform(0.0);

    pub const fn uniform(value: f64) -> Self {
        Self {
            top: value,
            bottom: value,
            left: value,
            right: value,
        }
    }
}

/// Legacy offset props, each defaulting to 0
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct OffsetProps {
    pub offset: f64,
    pub offset_vertical: f64,
    pub offset_horizontal: f64,
    pub offset_top: f64,
    pub offset_bottom: f64,
    pub offset_left: f64,
    pub offset_right: f64,
    pub threshold: f64,
}

/// First value that is set, where zero and NaN count as unset
fn first_set(values: &[f64]) -> f64 {
    values
        .iter()
        .copied()
        .find(|v| *v != 0.0 && !v.is_nan())
        .unwrap_or(0.0)
}

/// Resolve legacy props into four-sided offsets
///
/// Priority per side: explicit side, then the symmetric axis value, then the
/// uniform value (`threshold` before `offset`), then 0.
pub fn resolve_offsets(props: &OffsetProps) -> Offsets {
    let all = first_set(&[props.threshold, props.offset]);

    Offsets {
        top: first_set(&[props.offset_top, props.offset_vertical, all]),
        bottom: first_set(&[props.offset_bottom, props.offset_vertical, all]),
        left: first_set(&[props.offset_left, props.offset_horizontal, all]),
        right: first_set(&[props.offset_right, props.offset_horizontal, all]),
    }
}
