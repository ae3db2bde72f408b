pub type Mat = nalgebra::DMatrix<f64>;

/// A fitted LDA posterior: per-document topic weights and per-topic
/// term weights, both row-stochastic
pub struct LdaModel {
    doc_topic_nk: Mat,
    topic_term_kd: Mat,
    alpha: f64,
    log_evidence: f64,
}

impl LdaModel {
    pub fn new(doc_topic_nk: Mat, topic_term_kd: Mat, alpha: f64, log_evidence: f64) -> Self {
        debug_assert_eq!(doc_topic_nk.ncols(), topic_term_kd.nrows());
        Self {
            doc_topic_nk,
            topic_term_kd,
            alpha,
            log_evidence,
        }
    }

    /// `document x topic` posterior weights; each row sums to one
    pub fn doc_topic(&self) -> &Mat {
        &self.doc_topic_nk
    }

    /// `topic x term` posterior weights; each row sums to one
    pub fn topic_term(&self) -> &Mat {
        &self.topic_term_kd
    }

    /// estimated symmetric Dirichlet concentration
    pub fn alpha(&self) -> f64 {
        self.alpha
    }

    /// variational bound of the selected fit
    pub fn log_evidence(&self) -> f64 {
        self.log_evidence
    }

    pub fn num_documents(&self) -> usize {
        self.doc_topic_nk.nrows()
    }

    pub fn num_topics(&self) -> usize {
        self.topic_term_kd.nrows()
    }

    pub fn num_terms(&self) -> usize {
        self.topic_term_kd.ncols()
    }
}
