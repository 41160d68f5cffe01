pub mod classes;
pub mod model;
pub mod predictor;
pub mod preprocess;
