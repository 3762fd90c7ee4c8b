use std::fmt;
use std::ops::{Add, Mul, Sub};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Rect<T> {
    pub x: T,
    pub y: T,
    pub width: T,
    pub height: T,
}

impl<T> Rect<T> {
    pub const fn new(x: T, y: T, width: T, height: T) -> Self {
        Rect {
            x,
            y,
            width,
            height,
        }
    }
}

impl<T: Copy> Rect<T> {
    pub fn pos(&self) -> Pos<T> {
        Pos {
            x: self.x,
            y: self.y,
        }
    }

    pub fn size(&self) -> Size<T> {
        Size {
            width: self.width,
            height: self.height,
        }
    }
}

impl<T: Copy + Add<Output = T>> Rect<T> {
    /// Exclusive right edge.
    pub fn right(&self) -> T {
        self.x + self.width
    }

    /// Exclusive bottom edge.
    pub fn bottom(&self) -> T {
        self.y + self.height
    }
}

impl<T: Copy + Add<Output = T> + PartialOrd> Rect<T> {
    /// Returns `true` if `other` lies completely inside this rectangle.
    pub fn contains_rect(&self, other: &Rect<T>) -> bool {
        other.x >= self.x
            && other.y >= self.y
            && other.right() <= self.right()
            && other.bottom() <= self.bottom()
    }

    /// Returns `true` if both rectangles share at least one pixel.
    pub fn intersects(&self, other: &Rect<T>) -> bool {
        self.x < other.right()
            && other.x < self.right()
            && self.y < other.bottom()
            && other.y < self.bottom()
    }
}

impl Rect<u32> {
    /// Shrink every side by `margin`.
    ///
    /// Returns `None` when the rectangle is too small to lose `margin` on both sides.
    pub fn shrink(&self, margin: u32) -> Option<Rect<u32>> {
        let width = self.width.checked_sub(margin * 2)?;
        let height = self.height.checked_sub(margin * 2)?;
        Some(Rect {
            x: self.x + margin,
            y: self.y + margin,
            width,
            height,
        })
    }

    pub fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }
}

impl<T: fmt::Display> fmt::Display for Rect<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {} {}x{}]", self.x, self.y, self.width, self.height)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Size<T> {
    pub width: T,
    pub height: T,
}

impl<T> Size<T> {
    pub fn new(width: T, height: T) -> Self {
        Size { width, height }
    }

    pub fn cast<U: From<T>>(self) -> Size<U> {
        Size {
            width: U::from(self.width),
            height: U::from(self.height),
        }
    }
}

impl<T: Copy> Size<T> {
    pub fn splat(value: T) -> Self {
        Size {
            width: value,
            height: value,
        }
    }
}

impl<T: Mul + Copy> Mul<T> for Size<T> {
    type Output = Size<<T as Mul>::Output>;

    fn mul(self, rhs: T) -> Self::Output {
        Size {
            width: self.width * rhs,
            height: self.height * rhs,
        }
    }
}

impl<T: Add<Output = T> + Copy> Add<T> for Size<T> {
    type Output = Size<T>;

    fn add(self, rhs: T) -> Self::Output {
        Size {
            width: self.width + rhs,
            height: self.height + rhs,
        }
    }
}

impl<T: Sub<Output = T> + Copy> Sub<T> for Size<T> {
    type Output = Size<T>;

    fn sub(self, rhs: T) -> Self::Output {
        Size {
            width: self.width - rhs,
            height: self.height - rhs,
        }
    }
}

impl<T: fmt::Display> fmt::Display for Size<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Pos<T> {
    pub x: T,
    pub y: T,
}
