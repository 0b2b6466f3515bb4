pub mod generator;

pub use generator::DataGenerator;
