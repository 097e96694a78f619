//! Spatial result cache with surgical invalidation
//!
//! Results are keyed by a quantized cell. Each entry remembers the block
//! cells its computation depended on, and a reverse index maps every such
//! block back to its entries so a block change invalidates exactly the
//! affected results with a direct lookup.

use crate::config::{CacheConfig, DistanceBands};
use glam::{IVec3, Vec3};
use std::collections::{HashMap, HashSet};
use tracing::{debug, trace};

/// Distance classification driving recomputation frequency
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DistanceBand {
    Near,
    Mid,
    Far,
}

impl DistanceBand {
    /// Band for a distance, or `None` beyond the far threshold
    pub fn classify(distance: f32, bands: &DistanceBands) -> Option<DistanceBand> {
        if distance <= bands.near {
            Some(DistanceBand::Near)
        } else if distance <= bands.mid {
            Some(DistanceBand::Mid)
        } else if distance <= bands.far {
            Some(DistanceBand::Far)
        } else {
            None
        }
    }
}

/// How long a result stays fresh per band, in ticks
#[derive(Debug, Clone, Copy)]
pub struct RefreshPolicy {
    pub near: u64,
    pub mid: u64,
    pub far: u64,
}

impl RefreshPolicy {
    pub fn interval(&self, band: DistanceBand) -> u64 {
        match band {
            DistanceBand::Near => self.near,
            DistanceBand::Mid => self.mid,
            DistanceBand::Far => self.far,
        }
        .max(1)
    }

    /// Same interval for every band
    pub fn uniform(ticks: u64) -> Self {
        Self {
            near: ticks,
            mid: ticks,
            far: ticks,
        }
    }
}

impl From<&CacheConfig> for RefreshPolicy {
    fn from(config: &CacheConfig) -> Self {
        Self {
            near: config.near_refresh_ticks,
            mid: config.mid_refresh_ticks,
            far: config.far_refresh_ticks,
        }
    }
}

/// Observable state of one cell
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellState {
    Empty,
    Valid,
    Invalidated,
}

#[derive(Debug, Clone)]
enum CacheEntry<R> {
    Valid {
        result: R,
        computed_at: u64,
        band: DistanceBand,
        anchor: IVec3,
        dependencies: Vec<IVec3>,
    },
    Invalidated {
        invalidated_at: u64,
    },
}

/// Cache counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub invalidations: u64,
    pub evictions: u64,
}

/// Quantized-cell cache of computed results
#[derive(Debug, Clone)]
pub struct SpatialCache<R> {
    entries: HashMap<IVec3, CacheEntry<R>>,
    dependents: HashMap<IVec3, HashSet<IVec3>>,
    cell_size: f32,
    policy: RefreshPolicy,
    max_entries: usize,
    max_entry_age: u64,
    last_tick: u64,
    stats: CacheStats,
}

impl<R: Clone> SpatialCache<R> {
    pub fn new(cell_size: f32, policy: RefreshPolicy, max_entries: usize, max_entry_age: u64) -> Self {
        Self {
            entries: HashMap::new(),
            dependents: HashMap::new(),
            cell_size,
            policy,
            max_entries,
            max_entry_age,
            last_tick: 0,
            stats: CacheStats::default(),
        }
    }

    /// Cache key of a world position
    pub fn cell_for(&self, position: Vec3) -> IVec3 {
        (position / self.cell_size).floor().as_ivec3()
    }

    /// Cache key of the cell containing a block
    pub fn cell_for_block(&self, block: IVec3) -> IVec3 {
        self.cell_for(block.as_vec3() + Vec3::splat(0.5))
    }

    /// Fresh result for `cell`, or a miss
    ///
    /// Misses when the cell is empty or invalidated, was computed for another
    /// band or anchor, or has outlived the band's refresh interval.
    pub fn get(&mut self, cell: IVec3, band: DistanceBand, anchor: IVec3, now: u64) -> Option<R> {
        self.last_tick = self.last_tick.max(now);
        let interval = self.policy.interval(band);
        let hit = match self.entries.get(&cell) {
            Some(CacheEntry::Valid {
                result,
                computed_at,
                band: entry_band,
                anchor: entry_anchor,
                ..
            }) if *entry_band == band
                && *entry_anchor == anchor
                && now >= *computed_at
                && now - computed_at < interval =>
            {
                Some(result.clone())
            }
            _ => None,
        };

        if hit.is_some() {
            self.stats.hits += 1;
        } else {
            self.stats.misses += 1;
            trace!(cell = ?cell, band = ?band, "Cache miss");
        }
        hit
    }

    /// Store a result together with the block cells it depended on
    pub fn put(
        &mut self,
        cell: IVec3,
        band: DistanceBand,
        anchor: IVec3,
        now: u64,
        result: R,
        dependencies: Vec<IVec3>,
    ) {
        self.last_tick = self.last_tick.max(now);
        self.unlink(cell);
        for dependency in &dependencies {
            self.dependents.entry(*dependency).or_default().insert(cell);
        }
        self.entries.insert(
            cell,
            CacheEntry::Valid {
                result,
                computed_at: now,
                band,
                anchor,
                dependencies,
            },
        );
    }

    /// React to a block change at `block`; returns how many entries were invalidated
    pub fn invalidate_cell(&mut self, block: IVec3) -> usize {
        let mut affected: Vec<IVec3> = self
            .dependents
            .get(&block)
            .map(|keys| keys.iter().copied().collect())
            .unwrap_or_default();
        affected.push(self.cell_for_block(block));

        let mut count = 0;
        for cell in affected {
            if matches!(self.entries.get(&cell), Some(CacheEntry::Valid { .. })) {
                self.unlink(cell);
                self.entries.insert(
                    cell,
                    CacheEntry::Invalidated {
                        invalidated_at: self.last_tick,
                    },
                );
                count += 1;
            }
        }

        if count > 0 {
            self.stats.invalidations += count as u64;
            debug!(block = ?block, invalidated = count, "Invalidated cached results");
        }
        count
    }

    /// Drop invalidated and old entries and enforce the size cap
    pub fn evict_expired(&mut self, now: u64) -> usize {
        let max_age = self.max_entry_age;
        let expired: Vec<IVec3> = self
            .entries
            .iter()
            .filter(|(_, entry)| match entry {
                CacheEntry::Valid { computed_at, .. } => now.saturating_sub(*computed_at) > max_age,
                CacheEntry::Invalidated { invalidated_at } => {
                    now.saturating_sub(*invalidated_at) > max_age
                }
            })
            .map(|(cell, _)| *cell)
            .collect();

        let mut evicted = 0;
        for cell in expired {
            self.remove(cell);
            evicted += 1;
        }

        if self.entries.len() > self.max_entries {
            let mut by_age: Vec<(u64, IVec3)> = self
                .entries
                .iter()
                .map(|(cell, entry)| {
                    let at = match entry {
                        CacheEntry::Valid { computed_at, .. } => *computed_at,
                        CacheEntry::Invalidated { invalidated_at } => *invalidated_at,
                    };
                    (at, *cell)
                })
                .collect();
            by_age.sort_unstable_by_key(|(at, cell)| (*at, cell.to_array()));
            let excess = self.entries.len() - self.max_entries;
            for (_, cell) in by_age.into_iter().take(excess) {
                self.remove(cell);
                evicted += 1;
            }
        }

        if evicted > 0 {
            self.stats.evictions += evicted as u64;
            debug!(evicted, remaining = self.entries.len(), "Evicted cache entries");
        }
        evicted
    }

    pub fn state(&self, cell: IVec3) -> CellState {
        match self.entries.get(&cell) {
            None => CellState::Empty,
            Some(CacheEntry::Valid { .. }) => CellState::Valid,
            Some(CacheEntry::Invalidated { .. }) => CellState::Invalidated,
        }
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.dependents.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn stats(&self) -> CacheStats {
        self.stats
    }

    fn remove(&mut self, cell: IVec3) {
        self.unlink(cell);
        self.entries.remove(&cell);
    }

    /// Remove `cell` from the reverse index of each of its dependencies
    fn unlink(&mut self, cell: IVec3) {
        let Some(CacheEntry::Valid { dependencies, .. }) = self.entries.get(&cell) else {
            return;
        };
        for dependency in dependencies {
            if let Some(keys) = self.dependents.get_mut(dependency) {
                keys.remove(&cell);
                if keys.is_empty() {
                    self.dependents.remove(dependency);
                }
            }
        }
    }
}
