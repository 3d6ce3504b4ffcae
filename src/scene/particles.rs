//! Particle pool with per-class target synchronization.
//!
//! Particle ids increase monotonically, so "oldest" is "smallest id".
//! Relabelling changes a particle's class in place; position, velocity and
//! id are kept so visuals morph instead of teleporting.

use glam::Vec2;

use crate::scene::spawn::SpawnContext;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ParticleState {
    #[default]
    Free,
    /// Touched the region boundary during the latest tick.
    Contact,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Particle {
    pub id: u64,
    pub class: usize,
    pub position: Vec2,
    pub velocity: Vec2,
    pub radius: f32,
    pub state: ParticleState,
}

/// Owned particle storage for one scene.
#[derive(Debug, Clone, Default)]
pub struct ParticlePool {
    particles: Vec<Particle>,
    next_id: u64,
}

impl ParticlePool {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.particles.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.particles.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Particle> {
        self.particles.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Particle> {
        self.particles.iter_mut()
    }

    pub fn clear(&mut self) {
        self.particles.clear();
    }

    /// Count of particles in `class`.
    pub fn count(&self, class: usize) -> usize {
        self.particles.iter().filter(|p| p.class == class).count()
    }

    /// Counts for classes `0..classes`.
    pub fn counts(&self, classes: usize) -> Vec<usize> {
        let mut counts = vec![0; classes];
        for p in &self.particles {
            if let Some(c) = counts.get_mut(p.class) {
                *c += 1;
            }
        }
        counts
    }

    /// Add a particle and return its id.
    pub fn spawn(&mut self, class: usize, position: Vec2, velocity: Vec2, radius: f32) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        self.particles.push(Particle {
            id,
            class,
            position,
            velocity,
            radius,
            state: ParticleState::Free,
        });
        id
    }

    /// Remove particles whose ids are listed.
    pub fn remove_ids(&mut self, ids: &[u64]) {
        if !ids.is_empty() {
            self.particles.retain(|p| !ids.contains(&p.id));
        }
    }

    /// Bring every class to its target count.
    ///
    /// Missing particles are created through `make(class)`, which returns
    /// `(position, velocity, radius)`. Surplus particles are removed oldest
    /// first. Classes beyond `targets.len()` are removed entirely.
    pub fn sync<F>(&mut self, targets: &[usize], mut make: F)
    where
        F: FnMut(usize) -> (Vec2, Vec2, f32),
    {
        self.particles.retain(|p| p.class < targets.len());
        let counts = self.counts(targets.len());
        for (class, (&have, &want)) in counts.iter().zip(targets).enumerate() {
            if have > want {
                self.remove_oldest(class, have - want);
            } else {
                for _ in have..want {
                    let (position, velocity, radius) = make(class);
                    self.spawn(class, position, velocity, radius);
                }
            }
        }
    }

    /// Reassign class labels toward `targets` without moving anyone.
    ///
    /// Surplus flows down the declared class order (S → I → R): a class
    /// above target hands its excess to the next class, picking members at
    /// random so relabelled particles are spread across the region. What
    /// cannot be balanced by relabelling is left for [`sync`](Self::sync).
    pub fn relabel(&mut self, targets: &[usize], rng: &mut SpawnContext) {
        let classes = targets.len();
        if classes < 2 {
            return;
        }
        for class in 0..classes - 1 {
            let members: Vec<usize> = self
                .particles
                .iter()
                .enumerate()
                .filter(|(_, p)| p.class == class)
                .map(|(i, _)| i)
                .collect();
            let surplus = members.len().saturating_sub(targets[class]);
            if surplus == 0 {
                continue;
            }
            for pick in rng.sample_indices(members.len(), surplus) {
                self.particles[members[pick]].class = class + 1;
            }
        }
    }

    fn remove_oldest(&mut self, class: usize, n: usize) {
        let mut ids: Vec<u64> = self
            .particles
            .iter()
            .filter(|p| p.class == class)
            .map(|p| p.id)
            .collect();
        ids.sort_unstable();
        ids.truncate(n);
        self.remove_ids(&ids);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make(_class: usize) -> (Vec2, Vec2, f32) {
        (Vec2::ZERO, Vec2::ZERO, 1.0)
    }

    #[test]
    fn test_sync_grows_and_shrinks() {
        let mut pool = ParticlePool::new();
        pool.sync(&[5, 3], make);
        assert_eq!(pool.counts(2), vec![5, 3]);

        pool.sync(&[2, 3], make);
        assert_eq!(pool.counts(2), vec![2, 3]);
        // Oldest of class 0 (ids 0..3) went first
        let ids: Vec<u64> = pool.iter().filter(|p| p.class == 0).map(|p| p.id).collect();
        assert_eq!(ids, vec![3, 4]);
    }

    #[test]
    fn test_sync_drops_undeclared_classes() {
        let mut pool = ParticlePool::new();
        pool.sync(&[1, 1, 1], make);
        pool.sync(&[1], make);
        assert_eq!(pool.len(), 1);
    }

    #[test]
    fn test_relabel_preserves_identity() {
        let mut pool = ParticlePool::new();
        pool.sync(&[10, 0, 0], make);
        let ids_before: Vec<u64> = pool.iter().map(|p| p.id).collect();

        let mut rng = SpawnContext::new(9);
        pool.relabel(&[6, 3, 1], &mut rng);
        assert_eq!(pool.counts(3), vec![6, 3, 1]);

        let ids_after: Vec<u64> = pool.iter().map(|p| p.id).collect();
        assert_eq!(ids_before, ids_after);
    }
}
