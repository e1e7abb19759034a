pub mod classification;
pub mod clustering;
pub mod features;
pub mod linalg;
pub mod output;
pub mod pipeline;
pub mod regression;
pub mod risk;
pub mod stats;
pub mod summary;
#[cfg(test)]
mod testdata;
pub mod ttest;
