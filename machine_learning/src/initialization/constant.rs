use super::Initializer;
use crate::{NdArray, Result};

/// Fills every weight with the same value.
#[derive(Debug, Clone, Copy)]
pub struct Constant {
    value: f32,
}

impl Constant {
    pub fn new(value: f32) -> Self {
        Self { value }
    }
}

impl Initializer for Constant {
    fn init_weight(&mut self, _name: &str, arr: &mut NdArray) -> Result<()> {
        arr.fill(self.value);
        Ok(())
    }
}
