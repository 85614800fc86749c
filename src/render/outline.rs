//! Outline recording: turn path commands into the quadratic segment list a glyph is
//! registered with.
//!
//! This only records. There is no flattening and no triangulation; straight edges become
//! quads whose control point is the edge midpoint, which the accumulation stage treats as a
//! zero-area correction.

use crate::render::frame::Curve;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutlineError {
    /// A drawing command arrived before any `move_to`.
    NoCurrentPoint,
    /// A coordinate was NaN or infinite.
    NonFinite,
}

impl std::fmt::Display for OutlineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutlineError::NoCurrentPoint => write!(f, "drawing command without a current point"),
            OutlineError::NonFinite => write!(f, "non-finite coordinate"),
        }
    }
}

impl std::error::Error for OutlineError {}

/// Records closed contours as [`Curve`]s.
///
/// Open contours are closed with a straight edge when the next `move_to` or `build` arrives.
#[derive(Debug, Default, Clone)]
pub struct OutlineBuilder {
    curves: Vec<Curve>,
    start: Option<[f32; 2]>,
    pen: Option<[f32; 2]>,
}

fn finite(p: [f32; 2]) -> Result<[f32; 2], OutlineError> {
    if p[0].is_finite() && p[1].is_finite() {
        Ok(p)
    } else {
        Err(OutlineError::NonFinite)
    }
}

fn midpoint(a: [f32; 2], b: [f32; 2]) -> [f32; 2] {
    [(a[0] + b[0]) * 0.5, (a[1] + b[1]) * 0.5]
}

impl OutlineBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a new contour at `p`, closing the current one.
    pub fn move_to(&mut self, p: [f32; 2]) -> Result<(), OutlineError> {
        let p = finite(p)?;
        self.close();
        self.start = Some(p);
        self.pen = Some(p);
        Ok(())
    }

    pub fn line_to(&mut self, p: [f32; 2]) -> Result<(), OutlineError> {
        let p = finite(p)?;
        let from = self.pen.ok_or(OutlineError::NoCurrentPoint)?;
        if from != p {
            self.curves.push([from, midpoint(from, p), p]);
        }
        self.pen = Some(p);
        Ok(())
    }

    pub fn quad_to(&mut self, control: [f32; 2], p: [f32; 2]) -> Result<(), OutlineError> {
        let control = finite(control)?;
        let p = finite(p)?;
        let from = self.pen.ok_or(OutlineError::NoCurrentPoint)?;
        self.curves.push([from, control, p]);
        self.pen = Some(p);
        Ok(())
    }

    /// Close the current contour back to its start point.
    pub fn close(&mut self) {
        if let (Some(start), Some(pen)) = (self.start, self.pen) {
            if start != pen {
                self.curves.push([pen, midpoint(pen, start), start]);
            }
        }
        self.pen = self.start;
    }

    pub fn len(&self) -> usize {
        self.curves.len()
    }

    pub fn is_empty(&self) -> bool {
        self.curves.is_empty()
    }

    /// Close any open contour and return the recorded segments.
    pub fn build(mut self) -> Vec<Curve> {
        self.close();
        self.curves
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn triangle_closes_itself() {
        let mut b = OutlineBuilder::new();
        b.move_to([0.0, 0.0]).unwrap();
        b.line_to([2.0, 0.0]).unwrap();
        b.line_to([0.0, 2.0]).unwrap();
        let curves = b.build();
        assert_eq!(
            curves,
            vec![
                [[0.0, 0.0], [1.0, 0.0], [2.0, 0.0]],
                [[2.0, 0.0], [1.0, 1.0], [0.0, 2.0]],
                [[0.0, 2.0], [0.0, 1.0], [0.0, 0.0]],
            ]
        );
    }

    #[test]
    fn explicit_close_is_not_doubled() {
        let mut b = OutlineBuilder::new();
        b.move_to([0.0, 0.0]).unwrap();
        b.quad_to([1.0, 2.0], [2.0, 0.0]).unwrap();
        b.line_to([0.0, 0.0]).unwrap();
        b.close();
        b.move_to([5.0, 5.0]).unwrap();
        assert_eq!(b.len(), 2);
        assert_eq!(b.build().len(), 2);
    }

    #[test]
    fn rejects_bad_input() {
        let mut b = OutlineBuilder::new();
        assert_eq!(b.line_to([1.0, 1.0]), Err(OutlineError::NoCurrentPoint));
        assert_eq!(b.move_to([f32::NAN, 0.0]), Err(OutlineError::NonFinite));
        assert!(b.is_empty());
    }
}
