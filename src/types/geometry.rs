use serde::{Deserialize, Serialize};

/// An axis-aligned rectangle in viewport coordinates (CSS pixels).
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rect {
    pub top: f64,
    pub left: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn new(top: f64, left: f64, width: f64, height: f64) -> Self {
        Self {
            top,
            left,
            width,
            height,
        }
    }

    pub fn bottom(&self) -> f64 {
        self.top + self.height
    }

    pub fn right(&self) -> f64 {
        self.left + self.width
    }

    /// Vertical midpoint of the rectangle.
    pub fn center_y(&self) -> f64 {
        self.top + self.height / 2.0
    }

    /// Smallest rectangle covering both `self` and `other`.
    pub fn union(&self, other: &Rect) -> Rect {
        let top = self.top.min(other.top);
        let left = self.left.min(other.left);
        let bottom = self.bottom().max(other.bottom());
        let right = self.right().max(other.right());
        Rect::new(top, left, right - left, bottom - top)
    }

    /// True when the rectangle has no vertical extent.
    pub fn is_flat(&self) -> bool {
        self.height <= 0.0
    }
}

/// Scroll state of an element, mirroring `scrollTop` / `scrollHeight` / `clientHeight`.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ScrollMetrics {
    pub scroll_top: f64,
    pub scroll_height: f64,
    pub client_height: f64,
}

impl ScrollMetrics {
    pub fn new(scroll_top: f64, scroll_height: f64, client_height: f64) -> Self {
        Self {
            scroll_top,
            scroll_height,
            client_height,
        }
    }

    /// True when the content is taller than the visible box.
    pub fn overflows(&self) -> bool {
        self.scroll_height > self.client_height
    }

    /// Scrollable distance, never below 1 so it can be used as a divisor.
    pub fn scroll_range(&self) -> f64 {
        (self.scroll_height - self.client_height).max(1.0)
    }
}

/// Computed `overflow-y` value of an element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Overflow {
    #[default]
    Visible,
    Hidden,
    Clip,
    Auto,
    Scroll,
}

impl Overflow {
    /// Whether this overflow value lets the user scroll the element.
    pub fn allows_scrolling(self) -> bool {
        matches!(self, Overflow::Auto | Overflow::Scroll)
    }
}
