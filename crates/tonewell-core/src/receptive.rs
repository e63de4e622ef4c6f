//! Dilation schedules and closed-form receptive fields.
//!
//! A stack of unpadded dilated convolutions with kernel size `k` consumes
//! `(k - 1) * d` samples of left context per layer, so the number of input
//! samples feeding one output sample is `1 + Σ (k - 1) * d_i`.

use serde::{Deserialize, Serialize};

/// Dilation factor as a function of the block index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum DilationSchedule {
    /// `growth^(i mod stack_size)`: dilation resets every `stack_size` blocks.
    Stacked { growth: usize, stack_size: usize },
    /// `growth^i`: dilation keeps growing across the whole stack.
    Monotonic { growth: usize },
}

impl DilationSchedule {
    /// Stack size used by the TCN presets; ten blocks before the dilation resets.
    pub const DEFAULT_STACK_SIZE: usize = 10;

    pub fn stacked(growth: usize) -> Self {
        Self::Stacked {
            growth,
            stack_size: Self::DEFAULT_STACK_SIZE,
        }
    }

    /// Dilation of block `index`.
    pub fn dilation(&self, index: usize) -> usize {
        match *self {
            Self::Stacked { growth, stack_size } => pow(growth, index % stack_size.max(1)),
            Self::Monotonic { growth } => pow(growth, index),
        }
    }

    /// Dilations of the first `n_blocks` blocks.
    pub fn dilations(&self, n_blocks: usize) -> Vec<usize> {
        (0..n_blocks).map(|i| self.dilation(i)).collect()
    }

    /// Like [`DilationSchedule::dilation`], but `None` when it overflows `usize`.
    pub fn checked_dilation(&self, index: usize) -> Option<usize> {
        let (growth, exp) = match *self {
            Self::Stacked { growth, stack_size } => (growth, index % stack_size.max(1)),
            Self::Monotonic { growth } => (growth, index),
        };
        growth.checked_pow(u32::try_from(exp).ok()?)
    }

    pub fn checked_dilations(&self, n_blocks: usize) -> Option<Vec<usize>> {
        (0..n_blocks).map(|i| self.checked_dilation(i)).collect()
    }

    pub fn validate(&self) -> crate::Result<()> {
        let growth = match *self {
            Self::Stacked { growth, stack_size } => {
                if stack_size == 0 {
                    return Err(crate::Error::InvalidConfig(
                        "dilation stack_size must be at least 1".into(),
                    ));
                }
                growth
            }
            Self::Monotonic { growth } => growth,
        };
        if growth == 0 {
            return Err(crate::Error::InvalidConfig(
                "dilation growth must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

impl Default for DilationSchedule {
    fn default() -> Self {
        Self::stacked(2)
    }
}

fn pow(base: usize, exp: usize) -> usize {
    base.saturating_pow(exp as u32)
}

/// Receptive field of a chain of dilated convolutions sharing one kernel size.
pub fn receptive_field(kernel_size: usize, dilations: &[usize]) -> usize {
    let k = kernel_size.saturating_sub(1);
    dilations
        .iter()
        .fold(1usize, |rf, d| rf.saturating_add(k.saturating_mul(*d)))
}

/// Like [`receptive_field`], but `None` when it overflows `usize`.
pub fn checked_receptive_field(kernel_size: usize, dilations: &[usize]) -> Option<usize> {
    let k = kernel_size.checked_sub(1)?;
    dilations
        .iter()
        .try_fold(1usize, |rf, d| rf.checked_add(k.checked_mul(*d)?))
}

/// Number of output samples produced by an unpadded pass over `input_len` samples.
pub fn output_length(input_len: usize, receptive_field: usize) -> Option<usize> {
    input_len
        .checked_sub(receptive_field.saturating_sub(1))
        .filter(|len| *len > 0)
}

/// Left padding needed for an output aligned sample-for-sample with the input.
pub fn causal_padding(receptive_field: usize) -> usize {
    receptive_field.saturating_sub(1)
}
