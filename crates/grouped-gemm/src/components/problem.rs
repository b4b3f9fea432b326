use serde::{Deserialize, Serialize};

/// Identifies one of the three matrices taking part in a grouped GEMM.
#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq, Serialize, Deserialize)]
pub enum GemmIdent {
    /// The input, `[M, K]`.
    Lhs,
    /// The weights, `[G * N, K]`.
    Rhs,
    /// The output, `[M, N]`.
    Out,
}

impl GemmIdent {
    pub(crate) fn index(&self) -> usize {
        match self {
            GemmIdent::Lhs => 0,
            GemmIdent::Rhs => 1,
            GemmIdent::Out => 2,
        }
    }
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, Serialize, Deserialize)]
/// Description of a grouped GEMM problem to solve, regardless of actual data
pub struct GroupedGemmProblem {
    /// Total number of rows over all groups.
    pub m: usize,
    /// Number of output columns, shared by every group.
    pub n: usize,
    /// Reduction depth, shared by every group.
    pub k: usize,
    /// Number of groups.
    pub num_groups: usize,
}

impl GroupedGemmProblem {
    /// Returns the shape of the identified matrix, inferred by the problem definition
    pub fn shape(&self, ident: GemmIdent) -> [usize; 2] {
        match ident {
            GemmIdent::Lhs => [self.m, self.k],
            GemmIdent::Rhs => [self.num_groups * self.n, self.k],
            GemmIdent::Out => [self.m, self.n],
        }
    }

    /// Number of row-wise scales expected for the identified input.
    pub fn scale_len(&self, ident: GemmIdent) -> usize {
        match ident {
            GemmIdent::Lhs => self.m,
            GemmIdent::Rhs => self.num_groups * self.n,
            GemmIdent::Out => 0,
        }
    }
}
