use glam::DVec2;

/// A set of selected point indices.
///
/// Grows through lasso strokes and is emptied as a whole when labels are
/// applied.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SelectionMask {
    bits: Vec<bool>,
    count: usize,
}

impl SelectionMask {
    /// Create an empty mask over `len` points.
    pub fn new(len: usize) -> Self {
        Self {
            bits: vec![false; len],
            count: 0,
        }
    }

    /// Number of points the mask covers.
    #[inline]
    pub fn len(&self) -> usize {
        self.bits.len()
    }

    /// Check if the mask covers no points.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.bits.is_empty()
    }

    /// Number of selected points.
    #[inline]
    pub fn count(&self) -> usize {
        self.count
    }

    /// Check if a point is selected.
    #[inline]
    pub fn contains(&self, index: usize) -> bool {
        self.bits.get(index).copied().unwrap_or(false)
    }

    /// Select a point. Returns `true` if it was not selected before.
    pub fn insert(&mut self, index: usize) -> bool {
        match self.bits.get_mut(index) {
            Some(bit) if !*bit => {
                *bit = true;
                self.count += 1;
                true
            }
            _ => false,
        }
    }

    /// Deselect every point.
    pub fn clear(&mut self) {
        self.bits.iter_mut().for_each(|b| *b = false);
        self.count = 0;
    }

    /// Iterate over the selected indices in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = usize> + '_ {
        self.bits
            .iter()
            .enumerate()
            .filter_map(|(i, &selected)| selected.then_some(i))
    }
}

/// Even-odd point-in-polygon test.
///
/// The polygon is closed implicitly from the last vertex back to the first.
/// Polygons with fewer than three vertices contain nothing.
pub fn point_in_polygon(point: DVec2, polygon: &[DVec2]) -> bool {
    if polygon.len() < 3 {
        return false;
    }

    let mut inside = false;
    let mut j = polygon.len() - 1;
    for i in 0..polygon.len() {
        let (pi, pj) = (polygon[i], polygon[j]);
        if (pi.y > point.y) != (pj.y > point.y)
            && point.x < (pj.x - pi.x) * (point.y - pi.y) / (pj.y - pi.y) + pi.x
        {
            inside = !inside;
        }
        j = i;
    }
    inside
}

/// A freehand screen-space stroke being drawn.
#[derive(Debug, Clone, Default)]
pub struct Lasso {
    points: Vec<DVec2>,
    drawing: bool,
}

impl Lasso {
    /// Create an idle lasso.
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a new stroke at `screen`, discarding any previous one.
    pub fn begin(&mut self, screen: DVec2) {
        self.points.clear();
        self.points.push(screen);
        self.drawing = true;
    }

    /// Append a pointer position to the current stroke.
    pub fn extend(&mut self, screen: DVec2) {
        if self.drawing {
            self.points.push(screen);
        }
    }

    /// End the stroke and return its polygon.
    pub fn finish(&mut self) -> Option<Vec<DVec2>> {
        if !self.drawing {
            return None;
        }
        self.drawing = false;
        Some(std::mem::take(&mut self.points))
    }

    /// Check if a stroke is in progress.
    pub fn is_drawing(&self) -> bool {
        self.drawing
    }

    /// The stroke drawn so far.
    pub fn points(&self) -> &[DVec2] {
        &self.points
    }
}
