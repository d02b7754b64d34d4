pub mod images;
pub mod model_discovery;
pub mod tokens;
