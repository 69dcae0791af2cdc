use fxhash::FxHashSet;
use pyo3::exceptions::PyRuntimeError;
use pyo3::prelude::*;
use pyo3::types::*;

use crate::config::KnnConfig;
use crate::mapping::{ItemId, UserId};
use crate::source::{check_len, interactions_from_columns};
use crate::user_cf::UserKnn;

#[pyclass(module = "userknn", name = "UserKNN")]
pub struct PyUserKnn {
    config: KnnConfig,
    model: Option<UserKnn>,
}

impl PyUserKnn {
    fn model(&self) -> PyResult<&UserKnn> {
        self.model
            .as_ref()
            .ok_or_else(|| PyRuntimeError::new_err("call `fit` method before using the model"))
    }
}

#[pymethods]
impl PyUserKnn {
    #[allow(clippy::too_many_arguments)]
    #[new]
    #[pyo3(signature = (
        k=60,
        rec_length=5,
        user_bias=true,
        item_bias=true,
        normalize=true,
        num_workers=4,
        prune_zero_neighbors=false,
        fallback_pool=Vec::new()
    ))]
    fn new(
        k: usize,
        rec_length: usize,
        user_bias: bool,
        item_bias: bool,
        normalize: bool,
        num_workers: usize,
        prune_zero_neighbors: bool,
        fallback_pool: Vec<ItemId>,
    ) -> PyResult<Self> {
        let config = KnnConfig {
            k,
            rec_length,
            user_bias,
            item_bias,
            normalize,
            num_workers,
            prune_zero_neighbors,
            fallback_pool,
            ..KnnConfig::default()
        };
        config.validate()?;
        Ok(Self {
            config,
            model: None,
        })
    }

    #[staticmethod]
    fn from_toml(config: &str) -> PyResult<Self> {
        let config = KnnConfig::from_toml_str(config)?;
        Ok(Self {
            config,
            model: None,
        })
    }

    #[pyo3(signature = (users, items, ratings, target_users=None))]
    fn fit(
        &mut self,
        users: Vec<UserId>,
        items: Vec<ItemId>,
        ratings: Vec<f32>,
        target_users: Option<Vec<UserId>>,
    ) -> PyResult<()> {
        let interactions = interactions_from_columns(&users, &items, &ratings)?;
        let model = UserKnn::fit(
            self.config.clone(),
            &interactions,
            target_users.as_deref(),
        )?;
        self.model = Some(model);
        Ok(())
    }

    /// Returns the recommendation dict and the list of non-profiled users.
    #[pyo3(signature = (ineligible_items=None))]
    fn recommend<'py>(
        &self,
        py: Python<'py>,
        ineligible_items: Option<Vec<ItemId>>,
    ) -> PyResult<(Bound<'py, PyDict>, Bound<'py, PyList>)> {
        let ineligible: FxHashSet<ItemId> = ineligible_items
            .unwrap_or_default()
            .into_iter()
            .collect();
        let recs = self.model()?.recommend(&ineligible)?;
        let lists = recs.lists.into_py_dict(py)?;
        let non_profiled = PyList::new(py, recs.non_profiled)?;
        Ok((lists, non_profiled))
    }

    fn predict(&self, users: Vec<UserId>, items: Vec<ItemId>) -> PyResult<Vec<f32>> {
        let model = self.model()?;
        check_len("items", users.len(), items.len())?;
        let mut preds = Vec::with_capacity(users.len());
        for (&u, &i) in users.iter().zip(items.iter()) {
            preds.push(model.predict(u, i)?);
        }
        Ok(preds)
    }

    fn num_sim_elements(&self) -> PyResult<usize> {
        Ok(self.model()?.num_sim_elements())
    }
}
