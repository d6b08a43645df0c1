#![forbid(unsafe_code)]

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tt_types::{DType, Scalar, TypeError, cast_scalar_owned, infer_dtype};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidityMask {
    bits: Vec<bool>,
}

impl ValidityMask {
    #[must_use]
    pub fn from_values(values: &[Scalar]) -> Self {
        let bits = values.iter().map(|value| !value.is_missing()).collect();
        Self { bits }
    }

    #[must_use]
    pub fn bits(&self) -> &[bool] {
        &self.bits
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Column {
    dtype: DType,
    values: Vec<Scalar>,
    validity: ValidityMask,
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ColumnError {
    #[error("position {position} is out of bounds for column of length {len}")]
    PositionOutOfBounds { position: usize, len: usize },
    #[error("mask length ({mask_len}) does not match column length ({len})")]
    MaskLengthMismatch { mask_len: usize, len: usize },
    #[error(transparent)]
    Type(#[from] TypeError),
}

impl Column {
    /// Construct a column, coercing values to the target dtype.
    /// Takes ownership of the values so already-matching values move
    /// through without a clone.
    pub fn new(dtype: DType, values: Vec<Scalar>) -> Result<Self, ColumnError> {
        let coerced = values
            .into_iter()
            .map(|value| match value {
                Scalar::Null(_) => Ok(Scalar::missing_for_dtype(dtype)),
                other if other.dtype() == dtype => Ok(other),
                other => cast_scalar_owned(other, dtype),
            })
            .collect::<Result<Vec<_>, _>>()?;

        let validity = ValidityMask::from_values(&coerced);

        Ok(Self {
            dtype,
            values: coerced,
            validity,
        })
    }

    pub fn from_values(values: Vec<Scalar>) -> Result<Self, ColumnError> {
        let dtype = infer_dtype(&values)?;
        Self::new(dtype, values)
    }

    #[must_use]
    pub fn dtype(&self) -> DType {
        self.dtype
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    #[must_use]
    pub fn values(&self) -> &[Scalar] {
        &self.values
    }

    #[must_use]
    pub fn value(&self, idx: usize) -> Option<&Scalar> {
        self.values.get(idx)
    }

    #[must_use]
    pub fn validity(&self) -> &ValidityMask {
        &self.validity
    }

    /// Gather rows by position, in the order given.
    pub fn take_positions(&self, positions: &[usize]) -> Result<Self, ColumnError> {
        let values = positions
            .iter()
            .map(|&position| {
                self.values
                    .get(position)
                    .cloned()
                    .ok_or(ColumnError::PositionOutOfBounds {
                        position,
                        len: self.len(),
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Self::new(self.dtype, values)
    }

    /// Keep the rows whose mask bit is set, preserving order.
    pub fn filter_mask(&self, mask: &[bool]) -> Result<Self, ColumnError> {
        if mask.len() != self.len() {
            return Err(ColumnError::MaskLengthMismatch {
                mask_len: mask.len(),
                len: self.len(),
            });
        }

        let values = self
            .values
            .iter()
            .zip(mask)
            .filter(|(_, keep)| **keep)
            .map(|(value, _)| value.clone())
            .collect();

        Self::new(self.dtype, values)
    }

}
