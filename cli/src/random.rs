use gol_engine::{GolError, Grid, ImageStore};
use rand::rngs::StdRng;
use rand::SeedableRng;

/// Serves a seeded random board as the initial image and hands every write
/// to `inner`.
pub struct RandomStart<S> {
    seed: u64,
    inner: S,
}

impl<S> RandomStart<S> {
    pub fn new(seed: u64, inner: S) -> Self {
        RandomStart { seed, inner }
    }
}

impl<S: ImageStore> ImageStore for RandomStart<S> {
    fn load(&mut self, _filename: &str, width: usize, height: usize) -> Result<Vec<u8>, GolError> {
        let mut grid = Grid::new(width, height);
        grid.randomize(&mut StdRng::seed_from_u64(self.seed));
        Ok(grid.to_bytes())
    }

    fn save(&mut self, filename: &str, width: usize, height: usize, pixels: &[u8]) -> Result<(), GolError> {
        self.inner.save(filename, width, height, pixels)
    }
}
