#![allow(dead_code)]

use crate::common_io::*;
use crate::traits::*;

use nalgebra::DMatrix;
use std::io::Write;

use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Gamma, Normal, Uniform};

/// Cosine similarity between two vectors; `NaN` when either vector
/// has zero norm
pub fn cosine_similarity(aa: &[f64], bb: &[f64]) -> f64 {
    debug_assert_eq!(aa.len(), bb.len());

    let mut dot = 0_f64;
    let mut norm_a = 0_f64;
    let mut norm_b = 0_f64;
    for (&a, &b) in aa.iter().zip(bb.iter()) {
        dot += a * b;
        norm_a += a * a;
        norm_b += b * b;
    }
    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom > 0_f64 {
        dot / denom
    } else {
        f64::NAN
    }
}

/// Format a scalar the way we write matrices: short fixed-point for
/// ordinary magnitudes, scientific for tiny values, `NA` for missing
pub fn format_scalar(v: f64) -> String {
    if v.is_nan() {
        return "NA".to_string();
    }
    let a = v.abs();
    if a == 0_f64 {
        "0".to_string()
    } else if a >= 1e-4 {
        format!("{:.4}", v)
            .trim_end_matches('0')
            .trim_end_matches('.')
            .to_string()
    } else {
        format!("{:.4e}", v)
    }
}

impl MatOps for DMatrix<f64> {
    type Mat = DMatrix<f64>;
    type Scalar = f64;

    fn sum_to_one_rows(&self) -> Self::Mat {
        let mut ret = self.clone();
        ret.sum_to_one_rows_inplace();
        ret
    }

    fn sum_to_one_rows_inplace(&mut self) {
        for r in 0..self.nrows() {
            let tot: f64 = self.row(r).iter().sum();
            if tot > 0_f64 {
                for c in 0..self.ncols() {
                    self[(r, c)] /= tot;
                }
            }
        }
    }

    fn sum_to_one_columns(&self) -> Self::Mat {
        let mut ret = self.clone();
        ret.sum_to_one_columns_inplace();
        ret
    }

    fn sum_to_one_columns_inplace(&mut self) {
        for c in 0..self.ncols() {
            let tot: f64 = self.column(c).iter().sum();
            if tot > 0_f64 {
                for r in 0..self.nrows() {
                    self[(r, c)] /= tot;
                }
            }
        }
    }
}

impl SampleOps for DMatrix<f64> {
    type Mat = DMatrix<f64>;
    type Scalar = f64;

    fn runif(dd: usize, nn: usize) -> Self::Mat {
        let mut rng = rand::rng();
        let unif = Uniform::new(0_f64, 1_f64).expect("unif [0, 1)");
        DMatrix::from_fn(dd, nn, |_, _| unif.sample(&mut rng))
    }

    fn rnorm(dd: usize, nn: usize) -> Self::Mat {
        let mut rng = rand::rng();
        let norm = Normal::new(0_f64, 1_f64).expect("N(0, 1)");
        DMatrix::from_fn(dd, nn, |_, _| norm.sample(&mut rng))
    }

    fn rgamma(dd: usize, nn: usize, param: (f64, f64)) -> Self::Mat {
        let mut rng = rand::rng();
        let (shape, scale) = param;
        let gamma = Gamma::new(shape, scale).expect("gamma(shape, scale)");
        DMatrix::from_fn(dd, nn, |_, _| gamma.sample(&mut rng))
    }
}

/// Seeded gamma matrix for reproducible simulations
pub fn rgamma_seeded(dd: usize, nn: usize, param: (f64, f64), rng: &mut StdRng) -> DMatrix<f64> {
    let (shape, scale) = param;
    let gamma = Gamma::new(shape, scale).expect("gamma(shape, scale)");
    DMatrix::from_fn(dd, nn, |_, _| gamma.sample(rng))
}

impl IoOps for DMatrix<f64> {
    type Scalar = f64;
    type Mat = DMatrix<f64>;

    fn read_file_delim(
        file: &str,
        delim: &[char],
        skip: Option<usize>,
    ) -> anyhow::Result<Self::Mat> {
        let lines = read_lines(file)?;
        let mut rows: Vec<Vec<f64>> = vec![];

        for line in lines.iter().skip(skip.unwrap_or(0)) {
            if line.starts_with('#') || line.is_empty() {
                continue;
            }
            let row = split_words(line, delim)
                .iter()
                .map(|w| parse_value(w))
                .collect::<anyhow::Result<Vec<f64>>>()?;
            rows.push(row);
        }

        matrix_from_rows(rows)
    }

    fn read_data_with_names(file: &str, delim: &[char]) -> anyhow::Result<MatWithNames<Self::Mat>> {
        let lines = read_lines(file)?;
        let mut lines = lines.iter().filter(|l| !l.is_empty());

        let header = lines
            .next()
            .ok_or(anyhow::anyhow!("empty file: {}", file))?;

        // first token is the corner label for the row-name column
        let cols: Vec<Box<str>> = split_words(header, delim).into_iter().skip(1).collect();

        let mut row_names = vec![];
        let mut rows: Vec<Vec<f64>> = vec![];

        for line in lines {
            let words = split_words(line, delim);
            let (name, values) = words
                .split_first()
                .ok_or(anyhow::anyhow!("empty line in {}", file))?;

            if values.len() != cols.len() {
                anyhow::bail!(
                    "row {} has {} values, expected {}",
                    name,
                    values.len(),
                    cols.len()
                );
            }

            row_names.push(name.clone());
            rows.push(
                values
                    .iter()
                    .map(|w| parse_value(w))
                    .collect::<anyhow::Result<Vec<f64>>>()?,
            );
        }

        Ok(MatWithNames {
            rows: row_names,
            cols,
            mat: matrix_from_rows(rows)?,
        })
    }

    fn write_file_delim(&self, file: &str, delim: &str) -> anyhow::Result<()> {
        let mut writer = open_buf_writer(file)?;
        for r in 0..self.nrows() {
            let line = self
                .row(r)
                .iter()
                .map(|&v| format_scalar(v))
                .collect::<Vec<_>>()
                .join(delim);
            writeln!(writer, "{}", line)?;
        }
        writer.flush()?;
        Ok(())
    }

    fn to_tsv_with_names(
        &self,
        file: &str,
        rows: (Option<&[Box<str>]>, Option<&str>),
        cols: Option<&[Box<str>]>,
    ) -> anyhow::Result<()> {
        let (row_names, corner) = rows;

        if let Some(names) = row_names {
            if names.len() != self.nrows() {
                anyhow::bail!("{} row names for {} rows", names.len(), self.nrows());
            }
        }
        if let Some(names) = cols {
            if names.len() != self.ncols() {
                anyhow::bail!("{} column names for {} columns", names.len(), self.ncols());
            }
        }

        let mut writer = open_buf_writer(file)?;

        let col_names: Vec<Box<str>> = match cols {
            Some(names) => names.to_vec(),
            None => (1..=self.ncols())
                .map(|c| c.to_string().into_boxed_str())
                .collect(),
        };
        writeln!(
            writer,
            "{}\t{}",
            corner.unwrap_or("row"),
            col_names.join("\t")
        )?;

        for r in 0..self.nrows() {
            let name: Box<str> = match row_names {
                Some(names) => names[r].clone(),
                None => (r + 1).to_string().into_boxed_str(),
            };
            let line = self
                .row(r)
                .iter()
                .map(|&v| format_scalar(v))
                .collect::<Vec<_>>()
                .join("\t");
            writeln!(writer, "{}\t{}", name, line)?;
        }
        writer.flush()?;
        Ok(())
    }
}

fn parse_value(word: &str) -> anyhow::Result<f64> {
    if word == "NA" || word == "NaN" {
        return Ok(f64::NAN);
    }
    word.parse::<f64>()
        .map_err(|_| anyhow::anyhow!("failed to parse value: {}", word))
}

fn matrix_from_rows(rows: Vec<Vec<f64>>) -> anyhow::Result<DMatrix<f64>> {
    let nrows = rows.len();
    let ncols = rows.first().map(|r| r.len()).unwrap_or(0);

    if rows.iter().any(|r| r.len() != ncols) {
        anyhow::bail!("ragged rows in the input matrix");
    }

    let data: Vec<f64> = rows.into_iter().flatten().collect();
    Ok(DMatrix::from_row_slice(nrows, ncols, &data))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn sum_to_one_rows_and_columns() {
        let mut mat = DMatrix::from_row_slice(2, 3, &[1., 2., 1., 0., 0., 0.]);
        let rowwise = mat.sum_to_one_rows();
        assert_relative_eq!(rowwise.row(0).iter().sum::<f64>(), 1.0, epsilon = 1e-12);
        // all-zero rows are left alone
        assert_relative_eq!(rowwise.row(1).iter().sum::<f64>(), 0.0, epsilon = 1e-12);

        mat.sum_to_one_columns_inplace();
        for c in 0..mat.ncols() {
            assert_relative_eq!(mat.column(c).iter().sum::<f64>(), 1.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn cosine_similarity_basics() {
        let aa = [1., 0., 0.];
        let bb = [0., 1., 0.];
        assert_relative_eq!(cosine_similarity(&aa, &aa), 1.0, epsilon = 1e-12);
        assert_relative_eq!(cosine_similarity(&aa, &bb), 0.0, epsilon = 1e-12);
        assert!(cosine_similarity(&aa, &[0., 0., 0.]).is_nan());
    }

    #[test]
    fn rgamma_is_positive() {
        let mat = DMatrix::<f64>::rgamma(5, 4, (1.0, 1.0));
        assert!(mat.iter().all(|&x| x > 0.0));
    }

    #[test]
    fn runif_and_rnorm_have_the_right_shape() {
        let unif = DMatrix::<f64>::runif(3, 5);
        assert_eq!((unif.nrows(), unif.ncols()), (3, 5));
        assert!(unif.iter().all(|&x| (0.0..1.0).contains(&x)));

        let norm = DMatrix::<f64>::rnorm(4, 2);
        assert!(norm.iter().all(|x| x.is_finite()));
    }

    #[test]
    fn plain_tsv_roundtrip() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let file = dir.path().join("plain.tsv");
        let file = file.to_str().unwrap();

        let mat = DMatrix::from_row_slice(2, 2, &[0.5, 1.5, 2.5, 3.5]);
        mat.to_tsv(file)?;
        let back = DMatrix::<f64>::from_tsv(file, None)?;
        assert_relative_eq!((&back - &mat).abs().max(), 0.0, epsilon = 1e-8);
        Ok(())
    }

    #[test]
    fn tsv_roundtrip_with_names() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let file = dir.path().join("mat.tsv");
        let file = file.to_str().unwrap();

        let mat = DMatrix::from_row_slice(2, 3, &[1., 2., 3., 4., 5., 6.]);
        let row_names: Vec<Box<str>> = vec!["g1".into(), "g2".into()];
        let col_names: Vec<Box<str>> = vec!["c1".into(), "c2".into(), "c3".into()];

        mat.to_tsv_with_names(
            file,
            (Some(row_names.as_slice()), Some("gene")),
            Some(col_names.as_slice()),
        )?;

        let back = DMatrix::<f64>::read_data_with_names(file, &['\t'])?;
        assert_eq!(back.rows, row_names);
        assert_eq!(back.cols, col_names);
        assert_relative_eq!((&back.mat - &mat).abs().max(), 0.0, epsilon = 1e-8);
        Ok(())
    }
}
