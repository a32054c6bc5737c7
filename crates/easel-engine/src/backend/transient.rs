/// A resource with an explicit release step.
pub trait Release {
    fn release(self);
}

/// Tracks per-frame resources until the frame ends.
///
/// Whatever is still held when the pool drops is released then.
#[derive(Debug)]
pub struct TransientPool<T: Release> {
    items: Vec<T>,
}

impl<T: Release> Default for TransientPool<T> {
    fn default() -> Self {
        Self { items: Vec::new() }
    }
}

impl<T: Release> TransientPool<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, item: T) {
        self.items.push(item);
    }

    /// Resources acquired since the last release.
    pub fn outstanding(&self) -> usize {
        self.items.len()
    }

    /// Releases everything; returns how many resources were released.
    pub fn release_all(&mut self) -> usize {
        let n = self.items.len();
        for item in self.items.drain(..) {
            item.release();
        }
        n
    }
}

impl<T: Release> Drop for TransientPool<T> {
    fn drop(&mut self) {
        self.release_all();
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;
    use std::rc::Rc;

    use super::*;

    struct Counted(Rc<Cell<u32>>);

    impl Release for Counted {
        fn release(self) {
            self.0.set(self.0.get() + 1);
        }
    }

    #[test]
    fn release_all_empties_the_pool() {
        let released = Rc::new(Cell::new(0));
        let mut pool = TransientPool::new();
        pool.push(Counted(released.clone()));
        pool.push(Counted(released.clone()));
        assert_eq!(pool.outstanding(), 2);

        assert_eq!(pool.release_all(), 2);
        assert_eq!(pool.outstanding(), 0);
        assert_eq!(released.get(), 2);
    }

    #[test]
    fn drop_releases_leftovers() {
        let released = Rc::new(Cell::new(0));
        {
            let mut pool = TransientPool::new();
            pool.push(Counted(released.clone()));
        }
        assert_eq!(released.get(), 1);
    }
}
