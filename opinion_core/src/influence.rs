//! Local post influence.
//!
//! A post nudges the poster's direct neighbors. Extreme posts polarize them
//! toward the post's pole; moderate posts pull them back toward the center.

/// Neutral opinion value.
pub const CENTER: f64 = 0.5;

/// Lower edge of the moderate band.
pub const EXTREME_LOW: f64 = 0.4;

/// Upper edge of the moderate band.
pub const EXTREME_HIGH: f64 = 0.6;

/// True when `value` lies outside the moderate band [0.4, 0.6].
pub fn is_extreme_opinion(value: f64) -> bool {
    !(EXTREME_LOW..=EXTREME_HIGH).contains(&value)
}

/// True when both values sit on the same side of the center (the center itself
/// counts as either side).
pub fn same_side_of_center(a: f64, b: f64) -> bool {
    (a - CENTER) * (b - CENTER) >= 0.0
}

/// New value of one opinion axis after reading a post.
///
/// `strength` is expected in (0, 1]; the result always lies in [0, 1].
pub fn post_influenced_value(current: f64, post: f64, strength: f64) -> f64 {
    let updated = if is_extreme_opinion(post) {
        let step = strength * (current - post).abs();
        if post < CENTER {
            current - step
        } else {
            current + step
        }
    } else {
        let step = strength * CENTER;
        if current > CENTER {
            (current - step).max(CENTER)
        } else {
            (current + step).min(CENTER)
        }
    };
    updated.clamp(0.0, 1.0)
}
