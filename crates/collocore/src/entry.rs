//! The shapes the merger produces, the store writer persists, and the
//! reader and query executor read back.

#[derive(Debug, Clone, PartialEq)]
pub struct CollocateRecord {
    pub coll_lemma: String,
    pub coll_pos: String,
    pub cooccurrence: u64,
    pub coll_total_freq: u64,
    pub log_dice: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CollocationEntry {
    pub head_lemma: String,
    pub head_total_freq: u64,
    /// Strictly descending by `log_dice`, ties broken by `coll_lemma`
    /// ascending.
    pub collocates: Vec<CollocateRecord>,
}

impl CollocationEntry {
    /// Checks that `collocates` is strictly descending by `log_dice`, ties
    /// broken by `coll_lemma` strictly ascending.
    pub fn is_sorted(&self) -> bool {
        self.collocates.windows(2).all(|pair| {
            let (a, b) = (&pair[0], &pair[1]);
            a.log_dice > b.log_dice || (a.log_dice == b.log_dice && a.coll_lemma < b.coll_lemma)
        })
    }
}
