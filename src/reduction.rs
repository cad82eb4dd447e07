// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2024 Hyperpolymath

//! Feature reduction applied between splitting and training
//!
//! Reducers are fitted on the training split only and then applied to every
//! split. The identity reducer is the default; eigenface or fisherface
//! projections plug in through [`DimensionalityReducer`].

use anyhow::{ensure, Result};
use ndarray::Array2;

pub trait DimensionalityReducer {
    /// Learn the projection from training features
    fn fit(&mut self, x: &Array2<f64>) -> Result<()>;

    /// Project features into the reduced space
    fn transform(&self, x: &Array2<f64>) -> Result<Array2<f64>>;

    fn name(&self) -> &str;

    fn fit_transform(&mut self, x: &Array2<f64>) -> Result<Array2<f64>> {
        self.fit(x)?;
        self.transform(x)
    }
}

/// Passes features through unchanged
#[derive(Debug, Clone, Default)]
pub struct IdentityReducer {
    n_features: Option<usize>,
}

impl IdentityReducer {
    pub fn new() -> Self {
        Self::default()
    }
}

impl DimensionalityReducer for IdentityReducer {
    fn fit(&mut self, x: &Array2<f64>) -> Result<()> {
        self.n_features = Some(x.ncols());
        Ok(())
    }

    fn transform(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        if let Some(expected) = self.n_features {
            ensure!(
                x.ncols() == expected,
                "reducer was fitted on {} features but input has {}",
                expected,
                x.ncols()
            );
        }
        Ok(x.clone())
    }

    fn name(&self) -> &str {
        "identity"
    }
}
