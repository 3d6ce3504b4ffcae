//! Sample library.
//!
//! Each module pairs a [`SampleSchema`](crate::shell::SampleSchema) with its
//! evaluator and exposes `sample()`. Canvas and container ids are public
//! constants so hosts can create matching targets.

pub mod binomial;
pub mod blackbody;
pub mod geometric;
pub mod orbit;
pub mod pipe_flow;
pub mod rc;
pub mod sir;

use crate::shell::Sample;

/// Sample ids in gallery order.
pub const IDS: &[&str] = &[
    "rc_lowpass",
    "sir",
    "binomial",
    "orbit",
    "blackbody",
    "geometric",
    "pipe_flow",
];

/// Build a sample by id.
pub fn by_id(id: &str) -> Option<Sample> {
    let sample = match id {
        "rc_lowpass" => rc::sample(),
        "sir" => sir::sample(),
        "binomial" => binomial::sample(),
        "orbit" => orbit::sample(),
        "blackbody" => blackbody::sample(),
        "geometric" => geometric::sample(),
        "pipe_flow" => pipe_flow::sample(),
        _ => return None,
    };
    Some(sample)
}

/// Every sample, in gallery order.
pub fn all() -> Vec<Sample> {
    IDS.iter().filter_map(|id| by_id(id)).collect()
}
