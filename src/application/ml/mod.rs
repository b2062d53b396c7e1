pub mod labels;
pub mod model_inference;
pub mod trainer;
pub mod tree_ensemble;
