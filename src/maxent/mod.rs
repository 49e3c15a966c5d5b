//! Maximum entropy tagging: features, events, the model, its trainers and
//! the beam decoder.

pub mod beam;
pub mod context;
pub mod event;
pub mod gis;
pub mod model;
pub mod perceptron;
pub mod trainer;
pub mod validator;
