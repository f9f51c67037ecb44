use super::chunk::ChunkCoord;

/// Yields chunk coordinates around a center, ring by ring, nearest first.
///
/// Ring `r` holds every coordinate at Chebyshev distance `r`. The iterator
/// stops after `radius` rings have been emitted.
pub struct Spiral {
    center: ChunkCoord,
    radius: i32,
    ring: i32,
    step: i32,
}

impl Spiral {
    pub fn new(center: ChunkCoord, radius: u32) -> Self {
        Self {
            center,
            radius: radius as i32,
            ring: 0,
            step: 0,
        }
    }
}

impl Iterator for Spiral {
    type Item = ChunkCoord;

    fn next(&mut self) -> Option<ChunkCoord> {
        if self.ring > self.radius {
            return None;
        }
        if self.ring == 0 {
            self.ring = 1;
            return Some(self.center);
        }

        let r = self.ring;
        let side = 2 * r;
        let s = self.step;
        // Walk the ring perimeter counter-clockwise starting at the corner (r, -r).
        let (dx, dz) = match s / side {
            0 => (r, -r + s),
            1 => (r - (s - side), r),
            2 => (-r, r - (s - 2 * side)),
            _ => (-r + (s - 3 * side), -r),
        };

        self.step += 1;
        if self.step == 4 * side {
            self.step = 0;
            self.ring += 1;
        }
        Some(self.center.offset(dx, dz))
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn covers_square_without_repeats() {
        let center = ChunkCoord::new(3, -2);
        let coords: Vec<_> = Spiral::new(center, 3).collect();
        assert_eq!(coords.len(), 7 * 7);
        let unique: HashSet<_> = coords.iter().copied().collect();
        assert_eq!(unique.len(), coords.len());
        assert!(coords.iter().all(|c| c.chebyshev(center) <= 3));
    }

    #[test]
    fn rings_are_emitted_nearest_first() {
        let center = ChunkCoord::new(0, 0);
        let distances: Vec<_> = Spiral::new(center, 4).map(|c| c.chebyshev(center)).collect();
        assert!(distances.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(distances[0], 0);
        assert_eq!(distances[1..9], [1; 8]);
    }

    #[test]
    fn zero_radius_is_just_the_center() {
        let coords: Vec<_> = Spiral::new(ChunkCoord::new(5, 5), 0).collect();
        assert_eq!(coords, vec![ChunkCoord::new(5, 5)]);
    }
}
