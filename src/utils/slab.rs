/// Indexed storage with slot reuse.
///
/// `insert` hands out a small integer token that stays valid until the
/// value is removed; freed tokens are recycled by later insertions. The
/// reactor uses the token as the poller's user data.
pub(crate) struct Slab<T> {
    /// Occupied slots hold `Some`.
    entries: Vec<Option<T>>,
    /// Indices of vacant slots, most recently freed last.
    vacant: Vec<usize>,
}

impl<T> Slab<T> {
    /// Creates a slab with room for `capacity` entries before growing.
    pub(crate) fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: Vec::with_capacity(capacity),
            vacant: Vec::new(),
        }
    }

    /// Stores `value` and returns its token.
    pub(crate) fn insert(&mut self, value: T) -> usize {
        match self.vacant.pop() {
            Some(index) => {
                self.entries[index] = Some(value);
                index
            }
            None => {
                self.entries.push(Some(value));
                self.entries.len() - 1
            }
        }
    }

    /// Removes and returns the value behind `token`, if it is occupied.
    pub(crate) fn try_remove(&mut self, token: usize) -> Option<T> {
        let value = self.entries.get_mut(token)?.take()?;
        self.vacant.push(token);
        Some(value)
    }

    /// Returns a reference to the value behind `token`.
    pub(crate) fn get(&self, token: usize) -> Option<&T> {
        self.entries.get(token)?.as_ref()
    }

    /// Number of occupied slots.
    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.entries.len() - self.vacant.len()
    }

    /// Removes every value, leaving the slab empty.
    pub(crate) fn drain(&mut self) -> impl Iterator<Item = T> + '_ {
        self.vacant.clear();
        self.entries.drain(..).flatten()
    }
}

#[cfg(test)]
mod tests {
    use super::Slab;

    #[test]
    fn tokens_are_reused_after_removal() {
        let mut slab = Slab::with_capacity(2);
        let a = slab.insert("a");
        let b = slab.insert("b");
        assert_ne!(a, b);
        assert_eq!(slab.len(), 2);

        assert_eq!(slab.try_remove(a), Some("a"));
        assert_eq!(slab.try_remove(a), None);
        assert_eq!(slab.get(b), Some(&"b"));

        let c = slab.insert("c");
        assert_eq!(c, a);
        assert_eq!(slab.len(), 2);
    }

    #[test]
    fn drain_empties_the_slab() {
        let mut slab = Slab::with_capacity(0);
        slab.insert(1);
        slab.insert(2);
        let mut all: Vec<_> = slab.drain().collect();
        all.sort();
        assert_eq!(all, vec![1, 2]);
        assert_eq!(slab.len(), 0);
        assert_eq!(slab.insert(3), 0);
    }
}
