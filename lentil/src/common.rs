#![allow(unused)]

pub use log::info;

pub type Mat = nalgebra::DMatrix<f64>;
pub type DVec = nalgebra::DVector<f64>;

pub use matrix_util::common_io::MatWithNames;
pub use matrix_util::traits::{IoOps, MatOps};

pub const DEFAULT_NUM_TOPICS: usize = 3;
pub const DEFAULT_NUM_RESTARTS: usize = 5;
pub const DEFAULT_MAX_GLM_ITER: usize = 100;

/// report progress this often within a regression pass
pub const REPORT_INTERVAL: usize = 100;
