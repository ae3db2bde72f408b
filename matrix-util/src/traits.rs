use crate::common_io::MatWithNames;

/// Normalize rows or columns into probability vectors
pub trait MatOps {
    type Mat;
    type Scalar;

    fn sum_to_one_rows(&self) -> Self::Mat;
    fn sum_to_one_rows_inplace(&mut self);
    fn sum_to_one_columns(&self) -> Self::Mat;
    fn sum_to_one_columns_inplace(&mut self);
}

/// Operations to sample random matrices
pub trait SampleOps {
    type Mat;
    type Scalar;

    /// Sample a matrix from a uniform distribution `U(0,1)`
    fn runif(dd: usize, nn: usize) -> Self::Mat;

    /// Sample a matrix from a normal distribution `N(0,1)`
    fn rnorm(dd: usize, nn: usize) -> Self::Mat;

    /// Sample a matrix from a gamma distribution with `param` is
    /// `(shape α, scale θ)`
    fn rgamma(dd: usize, nn: usize, param: (f64, f64)) -> Self::Mat;
}

/// Read and write matrices from and to delimited text files,
/// with or without row and column names
pub trait IoOps {
    type Scalar;
    type Mat;

    fn read_file_delim(
        file: &str,
        delim: &[char],
        skip: Option<usize>,
    ) -> anyhow::Result<Self::Mat>;

    fn from_tsv(tsv_file: &str, skip: Option<usize>) -> anyhow::Result<Self::Mat> {
        Self::read_file_delim(tsv_file, &['\t'], skip)
    }

    /// Read a matrix whose first line is a header (corner label plus
    /// column names) and whose first column holds row names
    fn read_data_with_names(file: &str, delim: &[char]) -> anyhow::Result<MatWithNames<Self::Mat>>;

    fn write_file_delim(&self, file: &str, delim: &str) -> anyhow::Result<()>;

    fn to_tsv(&self, tsv_file: &str) -> anyhow::Result<()> {
        self.write_file_delim(tsv_file, "\t")
    }

    /// Write a matrix with a header line and row names
    /// * `rows` - row names and the corner label for the name column
    /// * `cols` - column names
    fn to_tsv_with_names(
        &self,
        file: &str,
        rows: (Option<&[Box<str>]>, Option<&str>),
        cols: Option<&[Box<str>]>,
    ) -> anyhow::Result<()>;
}
