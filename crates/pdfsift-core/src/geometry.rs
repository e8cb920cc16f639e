//! Affine transforms, homogeneous points and bounding boxes in PDF space.
//!
//! PDF uses a row-vector convention: a point `[x y 1]` is transformed by
//! post-multiplying it with the matrix. Composition therefore reads left to
//! right: `a.multiply(&b)` applies `a` first, then `b`.

/// A 2D affine transform `[a b c d e f]`.
///
/// Represents the 3x3 matrix
///
/// ```text
/// | a b 0 |
/// | c d 0 |
/// | e f 1 |
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Matrix {
    pub a: f64,
    pub b: f64,
    pub c: f64,
    pub d: f64,
    pub e: f64,
    pub f: f64,
}

impl Default for Matrix {
    fn default() -> Self {
        Self::identity()
    }
}

impl Matrix {
    pub fn new(a: f64, b: f64, c: f64, d: f64, e: f64, f: f64) -> Self {
        Self { a, b, c, d, e, f }
    }

    pub fn identity() -> Self {
        Self::new(1.0, 0.0, 0.0, 1.0, 0.0, 0.0)
    }

    /// A pure translation by `(tx, ty)`.
    ///
    /// Used to compose glyph advances and `Td` moves onto the text matrix.
    pub fn identity_like(tx: f64, ty: f64) -> Self {
        Self::new(1.0, 0.0, 0.0, 1.0, tx, ty)
    }

    /// Compose `self × other`.
    ///
    /// For a glyph advance the translation is the left operand and the
    /// existing text matrix the right one: `Tm' = T(tx, 0) × Tm`.
    pub fn multiply(&self, other: &Matrix) -> Matrix {
        Matrix {
            a: self.a * other.a + self.b * other.c,
            b: self.a * other.b + self.b * other.d,
            c: self.c * other.a + self.d * other.c,
            d: self.c * other.b + self.d * other.d,
            e: self.e * other.a + self.f * other.c + other.e,
            f: self.e * other.b + self.f * other.d + other.f,
        }
    }

    /// Transform the point `(x, y)`.
    pub fn transform_point(&self, x: f64, y: f64) -> (f64, f64) {
        let v = Vector::new(x, y, 1.0).cross(self);
        (v.x, v.y)
    }
}

/// A homogeneous point or direction `(x, y, w)`.
///
/// Points carry `w = 1`; differences of points carry `w = 0` and so are
/// unaffected by translation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Vector {
    pub x: f64,
    pub y: f64,
    pub w: f64,
}

impl Vector {
    pub fn new(x: f64, y: f64, w: f64) -> Self {
        Self { x, y, w }
    }

    pub fn point(x: f64, y: f64) -> Self {
        Self::new(x, y, 1.0)
    }

    /// Apply `matrix` to this vector.
    pub fn cross(&self, matrix: &Matrix) -> Vector {
        Vector {
            x: self.x * matrix.a + self.y * matrix.c + self.w * matrix.e,
            y: self.x * matrix.b + self.y * matrix.d + self.w * matrix.f,
            w: self.w,
        }
    }

    /// Three-dimensional cross product `self × other`.
    pub fn cross_product(&self, other: &Vector) -> Vector {
        Vector {
            x: self.y * other.w - self.w * other.y,
            y: self.w * other.x - self.x * other.w,
            w: self.x * other.y - self.y * other.x,
        }
    }

    pub fn subtract(&self, other: &Vector) -> Vector {
        Vector {
            x: self.x - other.x,
            y: self.y - other.y,
            w: self.w - other.w,
        }
    }

    pub fn length_squared(&self) -> f64 {
        self.x * self.x + self.y * self.y + self.w * self.w
    }

    pub fn length(&self) -> f64 {
        self.length_squared().sqrt()
    }
}

/// Bounding box in PDF user space, origin at the bottom-left of the page.
///
/// - `llx`, `lly`: lower-left corner
/// - `urx`, `ury`: upper-right corner
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BBox {
    pub llx: f64,
    pub lly: f64,
    pub urx: f64,
    pub ury: f64,
}

impl BBox {
    pub fn new(llx: f64, lly: f64, urx: f64, ury: f64) -> Self {
        Self { llx, lly, urx, ury }
    }

    pub fn width(&self) -> f64 {
        self.urx - self.llx
    }

    pub fn height(&self) -> f64 {
        self.ury - self.lly
    }

    /// Smallest box enclosing both.
    pub fn union(&self, other: &BBox) -> BBox {
        BBox {
            llx: self.llx.min(other.llx),
            lly: self.lly.min(other.lly),
            urx: self.urx.max(other.urx),
            ury: self.ury.max(other.ury),
        }
    }
}
