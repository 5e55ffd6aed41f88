//! Signal-side pipeline stages: audio loading, MFCC features, augmentation.

pub mod audio;
pub mod augment;
pub mod features;
pub(crate) mod frequency_domain;
pub(crate) mod time_stretch;

pub use frequency_domain::stats::Statistic;
