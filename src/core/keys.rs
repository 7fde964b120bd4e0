/// A strictly ordered pair of variable indices packed into one integer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PairKey(u64);

/// A strictly ordered triple of variable indices packed into one integer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TripletKey(u128);

impl PairKey {
    /// Packs `v1 < v2`, returns `None` if the pair is not strictly ordered
    /// or an index does not fit into 32 bits
    #[inline]
    pub fn new(v1: usize, v2: usize) -> Option<Self> {
        if v1 >= v2 {
            return None;
        }
        let v1 = u32::try_from(v1).ok()? as u64;
        let v2 = u32::try_from(v2).ok()? as u64;
        Some(PairKey((v1 << 32) | v2))
    }

    #[inline]
    pub fn variables(&self) -> (usize, usize) {
        ((self.0 >> 32) as usize, (self.0 & 0xffff_ffff) as usize)
    }
}

impl TripletKey {
    /// Packs `v1 < v2 < v3`, returns `None` if the triple is not strictly ordered
    /// or an index does not fit into 32 bits
    #[inline]
    pub fn new(v1: usize, v2: usize, v3: usize) -> Option<Self> {
        if v1 >= v2 || v2 >= v3 {
            return None;
        }
        let v1 = u32::try_from(v1).ok()? as u128;
        let v2 = u32::try_from(v2).ok()? as u128;
        let v3 = u32::try_from(v3).ok()? as u128;
        Some(TripletKey((v1 << 64) | (v2 << 32) | v3))
    }

    #[inline]
    pub fn variables(&self) -> (usize, usize, usize) {
        (
            (self.0 >> 64) as usize,
            ((self.0 >> 32) & 0xffff_ffff) as usize,
            (self.0 & 0xffff_ffff) as usize,
        )
    }
}
