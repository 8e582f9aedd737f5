//! The modulation dock: a per-parameter routing point.
//!
//! Every modulatable parameter in ondas owns one [`ModDock`]. Sources from
//! the [`ModRack`](crate::ModRack) are attached by handle; the dock
//! aggregates their contributions into an offset around its base value,
//! clamped to the parameter's boundaries.
//!
//! # Sidechaining
//!
//! Any attached item can be made the *master* of another item in the same
//! dock: instead of contributing to the dock output directly, a master
//! drives its slaves' effective depth. Multiple mastery and multiple slavery
//! are allowed, but an item is always either a depth-controller or a direct
//! contributor, never both within one tick. Masters resolve strictly before
//! their slaves within a single `modulate` call, so a master's value change
//! is heard on the same sample.

use alloc::vec::Vec;

use ondas_core::Sample;

use crate::error::UnitError;
use crate::rack::{ModKey, ModRack};

/// Initial item capacity reserved per dock so that attaching the usual
/// handful of sources never reallocates.
const ITEM_CAPACITY: usize = 8;

/// One attached modulation source.
#[derive(Clone, Debug)]
struct ModItem {
    /// Handle of the source in the rack.
    source: ModKey,
    /// Effective depth used during aggregation. Recomputed from the masters
    /// on every tick for sidechain slaves.
    depth: f64,
    /// The dialed-in depth, preserved while masters perturb `depth`.
    base_depth: f64,
    /// Indices of items driving this item's depth.
    masters: Vec<usize>,
    /// Indices of items whose depth this item drives.
    slaves: Vec<usize>,
}

impl ModItem {
    fn new(source: ModKey) -> Self {
        Self {
            source,
            depth: 1.0,
            base_depth: 1.0,
            masters: Vec::new(),
            slaves: Vec::new(),
        }
    }
}

/// A modulation routing point for a single parameter.
///
/// # Example
///
/// ```rust
/// use ondas_synth::{MacroControl, ModDock, ModRack, ModSource};
///
/// let mut rack = ModRack::new();
/// let key = rack.insert(ModSource::Macro(MacroControl::new(0.5)));
///
/// // A dock over a parameter ranging 0..1, base value 0.5
/// let mut dock = ModDock::new(0.0, 1.0, 0.5);
/// assert_eq!(dock.tick(&rack), 0.5); // bypass: nothing attached
///
/// let index = dock.attach(key);
/// dock.set_depth(index, 1.0).unwrap();
/// assert!(dock.in_use());
/// ```
#[derive(Clone, Debug)]
pub struct ModDock {
    items: Vec<ModItem>,
    /// Items aggregated directly (everything that masters nothing).
    non_master: Vec<usize>,
    /// Items excluded from aggregation because they drive slave depths.
    masters: Vec<usize>,
    base_value: f64,
    lower: f64,
    higher: f64,
}

impl ModDock {
    /// Create a dock scaling to `[lower, higher]` around `base_value`.
    pub fn new(lower: f64, higher: f64, base_value: f64) -> Self {
        Self {
            items: Vec::with_capacity(ITEM_CAPACITY),
            non_master: Vec::with_capacity(ITEM_CAPACITY),
            masters: Vec::with_capacity(ITEM_CAPACITY),
            base_value,
            lower,
            higher,
        }
    }

    /// Set the base value the modulation happens around.
    pub fn set_base_value(&mut self, value: f64) {
        self.base_value = value;
    }

    /// The base value the modulation happens around.
    pub fn base_value(&self) -> f64 {
        self.base_value
    }

    /// Set the lower boundary results are clamped to.
    pub fn set_lower_boundary(&mut self, lower: f64) {
        self.lower = lower;
    }

    /// The lower boundary.
    pub fn lower_boundary(&self) -> f64 {
        self.lower
    }

    /// Set the higher boundary results are clamped to. Sources also receive
    /// it as their `maximum` scale.
    pub fn set_higher_boundary(&mut self, higher: f64) {
        self.higher = higher;
    }

    /// The higher boundary.
    pub fn higher_boundary(&self) -> f64 {
        self.higher
    }

    /// Whether any sources are attached. When false, `modulate` passes
    /// samples through untouched.
    pub fn in_use(&self) -> bool {
        !self.items.is_empty()
    }

    /// Number of attached items.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether the dock has no items attached.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Modulate the dock's own base value.
    pub fn tick(&mut self, rack: &ModRack) -> Sample {
        self.modulate(self.base_value, rack)
    }

    /// Modulate `sample` through all attached sources.
    ///
    /// Two fixed passes per call: first every sidechain slave's effective
    /// depth is recomputed as the average of its masters' modulation of the
    /// slave's base depth; then every non-master contribution
    /// `source.modulate(sample, depth, higher)` is averaged and the result
    /// clamped to the dock boundaries. Order among non-sidechained sources
    /// is not observable - their contributions are only ever averaged.
    pub fn modulate(&mut self, sample: Sample, rack: &ModRack) -> Sample {
        if !self.in_use() {
            return sample;
        }

        // Sidechain pass: masters resolve before their slaves, same tick.
        for ni in 0..self.non_master.len() {
            let slave_index = self.non_master[ni];
            let master_count = self.items[slave_index].masters.len();
            if master_count == 0 {
                continue;
            }

            let base_depth = self.items[slave_index].base_depth;
            let mut depth = 0.0;
            for mi in 0..master_count {
                let master_index = self.items[slave_index].masters[mi];
                let (source, master_depth) = {
                    let master = &self.items[master_index];
                    (master.source, master.depth)
                };
                depth += rack.modulate(source, base_depth, master_depth, 1.0);
            }

            self.items[slave_index].depth = depth / master_count as f64;
        }

        // Aggregation pass: masters never contribute directly. A dock whose
        // items are all masters has no contributors at all.
        if self.non_master.is_empty() {
            return sample.clamp(self.lower, self.higher);
        }

        let mut total = 0.0;
        for &index in &self.non_master {
            let item = &self.items[index];
            total += rack.modulate(item.source, sample, item.depth, self.higher);
        }

        let averaged = total / self.non_master.len() as f64;
        averaged.clamp(self.lower, self.higher)
    }

    /// Attach a source and return its item index. New items start at full
    /// depth and contribute directly.
    pub fn attach(&mut self, source: ModKey) -> usize {
        self.items.push(ModItem::new(source));
        let index = self.items.len() - 1;
        self.non_master.push(index);

        #[cfg(feature = "tracing")]
        tracing::debug!("dock attach: item {index}");

        index
    }

    /// Detach the item at `index`, removing any sidechain relationships it
    /// participates in. Later items shift down by one index; stored
    /// master/slave indices are renumbered to match.
    pub fn detach(&mut self, index: usize) -> Result<(), UnitError> {
        self.check_index(index)?;

        // Sever sidechains in both roles first.
        let slaves = self.items[index].slaves.clone();
        for slave in slaves {
            self.un_sidechain(index, slave)?;
        }
        let masters = self.items[index].masters.clone();
        for master in masters {
            self.un_sidechain(master, index)?;
        }

        // Fully un-sidechained items always sit in the non-master partition.
        self.non_master.retain(|&i| i != index);
        self.items.remove(index);

        // Close the index gap everywhere.
        for stored in self
            .non_master
            .iter_mut()
            .chain(self.masters.iter_mut())
        {
            if *stored > index {
                *stored -= 1;
            }
        }
        for item in &mut self.items {
            for stored in item.masters.iter_mut().chain(item.slaves.iter_mut()) {
                if *stored > index {
                    *stored -= 1;
                }
            }
        }

        #[cfg(feature = "tracing")]
        tracing::debug!("dock detach: item {index}");

        Ok(())
    }

    /// Set an item's depth, in [-1, 1]. Also becomes the item's base depth
    /// for sidechain perturbation.
    pub fn set_depth(&mut self, index: usize, depth: f64) -> Result<(), UnitError> {
        self.check_index(index)?;
        crate::error::check_range("depth", depth, -1.0, 1.0)?;

        let item = &mut self.items[index];
        item.depth = depth;
        item.base_depth = depth;
        Ok(())
    }

    /// An item's dialed-in (base) depth.
    pub fn depth(&self, index: usize) -> Result<f64, UnitError> {
        self.check_index(index)?;
        Ok(self.items[index].base_depth)
    }

    /// Make `master` drive `slave`'s depth. A no-op if the relationship
    /// already exists. The master stops contributing to the dock output for
    /// as long as it has at least one slave.
    pub fn set_sidechain(&mut self, master: usize, slave: usize) -> Result<(), UnitError> {
        self.check_index(master)?;
        self.check_index(slave)?;
        if master == slave {
            return Err(UnitError::SelfSidechain { index: master });
        }

        if self.is_sidechain(master, slave)? {
            return Ok(());
        }

        self.items[slave].masters.push(master);
        self.items[master].slaves.push(slave);

        if !self.masters.contains(&master) {
            self.masters.push(master);
            self.non_master.retain(|&i| i != master);
        }

        #[cfg(feature = "tracing")]
        tracing::debug!("dock sidechain: {master} -> {slave}");

        Ok(())
    }

    /// Cut the sidechain between `master` and `slave`. Fails if the
    /// relationship does not exist. A master with no remaining slaves
    /// returns to direct contribution.
    pub fn un_sidechain(&mut self, master: usize, slave: usize) -> Result<(), UnitError> {
        self.check_index(master)?;
        self.check_index(slave)?;

        if !self.is_sidechain(master, slave)? {
            return Err(UnitError::NotSidechained { master, slave });
        }

        self.items[master].slaves.retain(|&i| i != slave);
        self.items[slave].masters.retain(|&i| i != master);

        if self.items[master].slaves.is_empty() {
            self.masters.retain(|&i| i != master);
            self.non_master.push(master);
        }

        #[cfg(feature = "tracing")]
        tracing::debug!("dock un-sidechain: {master} -> {slave}");

        Ok(())
    }

    /// Whether `master` currently drives `slave`'s depth.
    pub fn is_sidechain(&self, master: usize, slave: usize) -> Result<bool, UnitError> {
        self.check_index(master)?;
        self.check_index(slave)?;
        Ok(self.items[master].slaves.contains(&slave))
    }

    /// Whether the item has at least one slave.
    pub fn is_master(&self, index: usize) -> Result<bool, UnitError> {
        self.check_index(index)?;
        Ok(!self.items[index].slaves.is_empty())
    }

    /// Whether the item has at least one master.
    pub fn is_slave(&self, index: usize) -> Result<bool, UnitError> {
        self.check_index(index)?;
        Ok(!self.items[index].masters.is_empty())
    }

    fn check_index(&self, index: usize) -> Result<(), UnitError> {
        if index >= self.items.len() {
            return Err(UnitError::ItemIndex {
                index,
                count: self.items.len(),
            });
        }
        Ok(())
    }
}
