// Pipeline processing: normalization, matching, conflict detection, and reporting

pub mod batch;
pub mod conflict;
pub mod matching;
pub mod normalize;
pub mod report;
