//! User-based collaborative filtering.
//!
//! Builds a bias-corrected user rating matrix from raw interactions, keeps the
//! top-k most similar users of every target user and ranks the items rated by
//! those neighbors, padding with a popularity fallback.

pub mod config;
pub mod consumed;
pub mod error;
pub mod fallback;
pub mod inference;
pub mod mapping;
pub mod matrix;
#[cfg(feature = "python")]
mod python;
pub mod serialization;
pub mod similarities;
pub mod source;
pub mod sparse;
pub mod user_cf;
mod utils;

pub use config::{KnnConfig, OutputFormat};
pub use error::{RecError, Result};
pub use fallback::PopularityFallback;
pub use inference::Recommendations;
pub use mapping::{ItemId, Mappings, UserId};
pub use source::Interaction;
pub use user_cf::UserKnn;

#[cfg(feature = "python")]
const VERSION: &str = env!("CARGO_PKG_VERSION");

/// A Python module implemented in Rust. The name of this function must match
/// the `lib.name` setting in the `Cargo.toml`, else Python will not be able to
/// import the module.
#[cfg(feature = "python")]
#[pyo3::pymodule]
#[pyo3(name = "userknn")]
fn userknn(m: &pyo3::Bound<'_, pyo3::types::PyModule>) -> pyo3::PyResult<()> {
    use pyo3::types::PyModuleMethods;

    m.add_class::<python::PyUserKnn>()?;
    m.add("__version__", VERSION)?;
    Ok(())
}
