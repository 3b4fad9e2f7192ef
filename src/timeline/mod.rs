pub mod builder;
pub mod caption;
pub mod model;
pub mod preprocess;
