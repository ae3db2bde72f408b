pub mod assign_stats;
pub mod common;
pub mod fdr;
pub mod nb_glm;
pub mod simulate;
pub mod topic_assignment;
pub mod topic_fit;
