/// Face direction of a block. The discriminant is the value stored in
/// face records and decoded by the chunk shader.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Side {
    PosX = 0,
    NegX = 1,
    PosY = 2,
    NegY = 3,
    PosZ = 4,
    NegZ = 5,
}

impl Side {
    pub const ALL: [Side; 6] = [
        Side::PosX,
        Side::NegX,
        Side::PosY,
        Side::NegY,
        Side::PosZ,
        Side::NegZ,
    ];

    /// Unit offset to the neighboring block this face looks at.
    pub fn normal(self) -> (i32, i32, i32) {
        match self {
            Side::PosX => (1, 0, 0),
            Side::NegX => (-1, 0, 0),
            Side::PosY => (0, 1, 0),
            Side::NegY => (0, -1, 0),
            Side::PosZ => (0, 0, 1),
            Side::NegZ => (0, 0, -1),
        }
    }
}

/// Number of layers the block texture array must provide.
pub const BLOCK_TEXTURE_LAYERS: u32 = 10;

/// Typed block stored in a chunk. Air is `None` at the storage level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlockKind {
    Stone,
    Dirt,
    Grass,
    Sand,
    Planks,
    Log,
    Leaves,
    Glass,
}

impl BlockKind {
    /// Texture array layer used for the given face.
    pub fn texture(self, side: Side) -> u16 {
        match self {
            BlockKind::Stone => 0,
            BlockKind::Dirt => 1,
            BlockKind::Grass => match side {
                Side::PosY => 2,
                Side::NegY => 1,
                _ => 3,
            },
            BlockKind::Sand => 4,
            BlockKind::Planks => 5,
            BlockKind::Log => match side {
                Side::PosY | Side::NegY => 6,
                _ => 7,
            },
            BlockKind::Leaves => 8,
            BlockKind::Glass => 9,
        }
    }

    /// Transparent blocks let neighboring faces show through.
    pub fn is_transparent(self) -> bool {
        matches!(self, BlockKind::Leaves | BlockKind::Glass)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grass_uses_distinct_top_side_and_bottom() {
        assert_eq!(BlockKind::Grass.texture(Side::PosY), 2);
        assert_eq!(BlockKind::Grass.texture(Side::NegY), BlockKind::Dirt.texture(Side::PosX));
        assert_eq!(BlockKind::Grass.texture(Side::NegZ), 3);
    }

    #[test]
    fn texture_layers_stay_in_range() {
        let kinds = [
            BlockKind::Stone,
            BlockKind::Dirt,
            BlockKind::Grass,
            BlockKind::Sand,
            BlockKind::Planks,
            BlockKind::Log,
            BlockKind::Leaves,
            BlockKind::Glass,
        ];
        for kind in kinds {
            for side in Side::ALL {
                assert!(u32::from(kind.texture(side)) < BLOCK_TEXTURE_LAYERS);
            }
        }
    }

    #[test]
    fn opposite_normals_cancel() {
        let sum = Side::ALL.iter().fold((0, 0, 0), |acc, side| {
            let (x, y, z) = side.normal();
            (acc.0 + x, acc.1 + y, acc.2 + z)
        });
        assert_eq!(sum, (0, 0, 0));
    }
}
