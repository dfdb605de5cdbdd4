use nalgebra::{SMatrix, SVector};
use rayon::prelude::*;
use sprs::{CsMat, TriMat};

/// Global matrix and vector assembler
///
/// Element kernels run in parallel with Rayon; each returns its local dofs
/// together with the local matrix or vector, and the contributions are
/// merged serially into triplets (duplicates are summed by `to_csr`).
pub struct Assembler;

impl Assembler {
    /// Assemble a global matrix from `n_items` element contributions
    ///
    /// # Arguments
    /// * `n_dofs` - Global system size
    /// * `n_items` - Number of elements (or faces)
    /// * `kernel` - Maps an item index to its dofs and local matrix
    pub fn assemble_matrix<const N: usize, K>(n_dofs: usize, n_items: usize, kernel: K) -> CsMat<f64>
    where
        K: Fn(usize) -> ([usize; N], SMatrix<f64, N, N>) + Sync + Send,
    {
        let local: Vec<_> = (0..n_items).into_par_iter().map(&kernel).collect();

        let mut triplets = TriMat::with_capacity((n_dofs, n_dofs), n_items * N * N);
        for (dofs, k_elem) in &local {
            for i in 0..N {
                for j in 0..N {
                    triplets.add_triplet(dofs[i], dofs[j], k_elem[(i, j)]);
                }
            }
        }

        triplets.to_csr()
    }

    /// Assemble a global vector from `n_items` element contributions
    pub fn assemble_vector<const N: usize, K>(n_dofs: usize, n_items: usize, kernel: K) -> Vec<f64>
    where
        K: Fn(usize) -> ([usize; N], SVector<f64, N>) + Sync + Send,
    {
        let local: Vec<_> = (0..n_items).into_par_iter().map(&kernel).collect();

        let mut global = vec![0.0; n_dofs];
        for (dofs, f_elem) in &local {
            for i in 0..N {
                global[dofs[i]] += f_elem[i];
            }
        }
        global
    }

    /// Assemble a vector from a kernel that may skip items
    ///
    /// Used for boundary faces, where only faces with selected attributes
    /// contribute.
    pub fn assemble_vector_filtered<const N: usize, K>(n_dofs: usize, n_items: usize, kernel: K) -> Vec<f64>
    where
        K: Fn(usize) -> Option<([usize; N], SVector<f64, N>)> + Sync + Send,
    {
        let local: Vec<_> = (0..n_items).into_par_iter().filter_map(&kernel).collect();

        let mut global = vec![0.0; n_dofs];
        for (dofs, f_elem) in &local {
            for i in 0..N {
                global[dofs[i]] += f_elem[i];
            }
        }
        global
    }
}
