//! Batches handed over by the data loader.
//!
//! Audio crosses the loader boundary as flat `f32` data plus a
//! `[batch, channel, time]` shape; no framework tensor types appear here.

use crate::{Error, Result};

/// Conditioning values for one batch, `[batch, cond_dim]` flattened.
///
/// A batch dimension of 1 is broadcast over the audio batch.
#[derive(Debug, Clone, PartialEq)]
pub struct Conditioning {
    pub values: Vec<f32>,
    pub batch: usize,
    pub dim: usize,
}

impl Conditioning {
    /// One set of knob values shared by every item in the batch.
    pub fn shared(values: Vec<f32>) -> Self {
        let dim = values.len();
        Self {
            values,
            batch: 1,
            dim,
        }
    }

    pub fn zeros(dim: usize) -> Self {
        Self::shared(vec![0.0; dim])
    }
}

/// A pair of aligned input/target crops.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioBatch {
    pub input: Vec<f32>,
    pub target: Vec<f32>,
    /// `[batch, channel, time]`, shared by input and target.
    pub shape: [usize; 3],
    pub cond: Option<Conditioning>,
}

impl AudioBatch {
    pub fn new(input: Vec<f32>, target: Vec<f32>, shape: [usize; 3]) -> Result<Self> {
        let batch = Self {
            input,
            target,
            shape,
            cond: None,
        };
        batch.validate()?;
        Ok(batch)
    }

    /// Stack equal-length mono crops into one `[n, 1, len]` batch.
    pub fn from_crops(crops: &[(Vec<f32>, Vec<f32>)]) -> Result<Self> {
        let len = crops.first().map(|(x, _)| x.len()).unwrap_or(0);
        let mut input = Vec::with_capacity(crops.len() * len);
        let mut target = Vec::with_capacity(crops.len() * len);
        for (x, y) in crops {
            if x.len() != len || y.len() != len {
                return Err(Error::ShapeMismatch {
                    what: "crop",
                    expected: vec![len],
                    actual: vec![x.len(), y.len()],
                });
            }
            input.extend_from_slice(x);
            target.extend_from_slice(y);
        }
        Self::new(input, target, [crops.len(), 1, len])
    }

    pub fn with_cond(mut self, cond: Conditioning) -> Result<Self> {
        if cond.batch != 1 && cond.batch != self.shape[0] {
            return Err(Error::ShapeMismatch {
                what: "conditioning batch",
                expected: vec![self.shape[0]],
                actual: vec![cond.batch],
            });
        }
        if cond.values.len() != cond.batch * cond.dim {
            return Err(Error::ShapeMismatch {
                what: "conditioning values",
                expected: vec![cond.batch * cond.dim],
                actual: vec![cond.values.len()],
            });
        }
        self.cond = Some(cond);
        Ok(self)
    }

    pub fn batch_size(&self) -> usize {
        self.shape[0]
    }

    pub fn len(&self) -> usize {
        self.shape[2]
    }

    pub fn is_empty(&self) -> bool {
        self.shape.iter().any(|d| *d == 0)
    }

    fn validate(&self) -> Result<()> {
        let expected = self.shape.iter().product::<usize>();
        if self.is_empty() {
            return Err(Error::InvalidConfig(format!(
                "empty batch shape {:?}",
                self.shape
            )));
        }
        for (what, data) in [("input", &self.input), ("target", &self.target)] {
            if data.len() != expected {
                return Err(Error::ShapeMismatch {
                    what,
                    expected: self.shape.to_vec(),
                    actual: vec![data.len()],
                });
            }
        }
        Ok(())
    }
}

/// An ordered, finite, restartable sequence of batches.
///
/// `batches()` is called once per epoch and must yield the same sequence each time
/// unless the source deliberately reshuffles.
pub trait BatchSource {
    fn batches(&self) -> Box<dyn Iterator<Item = AudioBatch> + '_>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Batches held in memory.
#[derive(Debug, Clone, Default)]
pub struct VecBatches {
    batches: Vec<AudioBatch>,
}

impl VecBatches {
    pub fn new(batches: Vec<AudioBatch>) -> Self {
        Self { batches }
    }

    pub fn push(&mut self, batch: AudioBatch) {
        self.batches.push(batch);
    }
}

impl BatchSource for VecBatches {
    fn batches(&self) -> Box<dyn Iterator<Item = AudioBatch> + '_> {
        Box::new(self.batches.iter().cloned())
    }

    fn len(&self) -> usize {
        self.batches.len()
    }
}
