//! Feature decomposition
//!
//! Turns one opaque snapshot into the closed set of named features:
//!
//! - **Grid** features: screen and minimap layers, unpacked to dense grids
//! - **Scalar** features: everything else, flattened to one row of integers
//!
//! ```rust,ignore
//! use rx_core::features::{FeatureDecomposer, LayerDecomposer};
//!
//! let decomposer = LayerDecomposer::new(config.resolutions());
//! let bundle = decomposer.decompose(&snapshot);
//! for (id, grid) in &bundle.grids { /* encode + append */ }
//! ```

mod decompose;
mod names;
mod unpack;

pub use decompose::{FeatureBundle, FeatureDecomposer, FeatureIssue, LayerDecomposer, CONTROL_GROUP_COUNT};
pub use names::{
    FeatureCatalog, FeatureClass, FeatureId, MinimapLayer, OtherFeature, ScreenLayer, ACTION_CHANNEL,
};
pub use unpack::{unpack_plane, UnpackError};
