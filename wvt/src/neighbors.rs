//! 4-connected pixel adjacency over an arbitrary pixel mask.

use glam::IVec2;
use hashbrown::HashMap;

use crate::error::Error;

/// Sentinel for a missing neighbor (outside the mask or the image).
pub const NO_NEIGHBOR: u32 = u32::MAX;

/// Grid offsets in slot order: left, right, up, down.
const OFFSETS: [IVec2; 4] = [
    IVec2::new(-1, 0),
    IVec2::new(1, 0),
    IVec2::new(0, -1),
    IVec2::new(0, 1),
];

/// For every pixel index, the indices of its (up to 4) grid-adjacent pixels.
///
/// Built once from the pixel coordinates and read-only afterwards.
#[derive(Debug, Clone)]
pub struct NeighborGraph {
    slots: Vec<[u32; 4]>,
}

impl NeighborGraph {
    /// Build the adjacency for `coords`. Fails on duplicate coordinates.
    pub fn build(coords: &[IVec2]) -> Result<Self, Error> {
        assert!(
            coords.len() < NO_NEIGHBOR as usize,
            "too many pixels for u32 indices: {}",
            coords.len()
        );

        let mut lookup: HashMap<IVec2, u32> = HashMap::with_capacity(coords.len());
        for (i, &c) in coords.iter().enumerate() {
            if lookup.insert(c, i as u32).is_some() {
                return Err(Error::DuplicatePixel { x: c.x, y: c.y });
            }
        }

        let slots = coords
            .iter()
            .map(|&c| {
                OFFSETS.map(|offset| lookup.get(&(c + offset)).copied().unwrap_or(NO_NEIGHBOR))
            })
            .collect();

        Ok(Self { slots })
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Raw neighbor slots (left, right, up, down), [`NO_NEIGHBOR`] where absent.
    #[inline]
    pub fn slots(&self, pixel: usize) -> [u32; 4] {
        self.slots[pixel]
    }

    /// Existing neighbors of `pixel`.
    #[inline]
    pub fn neighbors(&self, pixel: usize) -> impl Iterator<Item = usize> + '_ {
        self.slots[pixel]
            .iter()
            .filter(|&&n| n != NO_NEIGHBOR)
            .map(|&n| n as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid(width: i32, height: i32) -> Vec<IVec2> {
        (0..height)
            .flat_map(|y| (0..width).map(move |x| IVec2::new(x, y)))
            .collect()
    }

    #[test]
    fn test_full_grid_neighbor_counts() {
        let graph = NeighborGraph::build(&grid(3, 3)).unwrap();
        let counts: Vec<usize> = (0..9).map(|i| graph.neighbors(i).count()).collect();
        // corners 2, edges 3, center 4
        assert_eq!(counts, vec![2, 3, 2, 3, 4, 3, 2, 3, 2]);
    }

    #[test]
    fn test_slot_order() {
        let graph = NeighborGraph::build(&grid(3, 3)).unwrap();
        // center pixel (1,1) is index 4
        assert_eq!(graph.slots(4), [3, 5, 1, 7]);
        // top-left corner has only right and down
        assert_eq!(graph.slots(0), [NO_NEIGHBOR, 1, NO_NEIGHBOR, 3]);
    }

    #[test]
    fn test_irregular_mask() {
        // L shape with a gap: (0,0) (1,0) (0,1) and an isolated (3,3)
        let coords = vec![
            IVec2::new(0, 0),
            IVec2::new(1, 0),
            IVec2::new(0, 1),
            IVec2::new(3, 3),
        ];
        let graph = NeighborGraph::build(&coords).unwrap();

        let mut n0: Vec<usize> = graph.neighbors(0).collect();
        n0.sort_unstable();
        assert_eq!(n0, vec![1, 2]);
        assert_eq!(graph.neighbors(1).collect::<Vec<_>>(), vec![0]);
        assert_eq!(graph.neighbors(2).collect::<Vec<_>>(), vec![0]);
        assert_eq!(graph.neighbors(3).count(), 0);
    }

    #[test]
    fn test_gap_in_coordinates_is_not_adjacent() {
        let coords = vec![IVec2::new(0, 0), IVec2::new(5, 0)];
        let graph = NeighborGraph::build(&coords).unwrap();
        assert_eq!(graph.neighbors(0).count(), 0);
        assert_eq!(graph.neighbors(1).count(), 0);
    }

    #[test]
    fn test_negative_coordinates() {
        let coords = vec![IVec2::new(-1, -1), IVec2::new(0, -1), IVec2::new(-1, 0)];
        let graph = NeighborGraph::build(&coords).unwrap();
        assert_eq!(graph.slots(0), [NO_NEIGHBOR, 1, NO_NEIGHBOR, 2]);
    }

    #[test]
    fn test_duplicate_coordinates_rejected() {
        let coords = vec![IVec2::new(2, 3), IVec2::new(4, 4), IVec2::new(2, 3)];
        let err = NeighborGraph::build(&coords).unwrap_err();
        assert_eq!(err, Error::DuplicatePixel { x: 2, y: 3 });
    }

    #[test]
    fn test_single_pixel() {
        let graph = NeighborGraph::build(&[IVec2::new(7, 7)]).unwrap();
        assert_eq!(graph.len(), 1);
        assert_eq!(graph.neighbors(0).count(), 0);
    }
}
