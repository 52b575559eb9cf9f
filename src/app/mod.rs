pub mod ports;
pub mod predict_use_case;
pub mod preprocess_use_case;
pub mod training_use_case;
