pub mod engine;
pub mod http;
pub mod preprocess;
pub mod setup;

pub use engine::{Detection, Recognizer, TesseractRecognizer};
pub use http::HttpRecognizer;
pub use preprocess::preprocess_image;
