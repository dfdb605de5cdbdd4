use crate::mesh::{BoundaryFace, Mesh, TetElement};

/// Structured tetrahedral mesh generator
pub struct MeshGenerator;

impl MeshGenerator {
    /// Generate a box `[0,lx] × [0,ly] × [0,lz]` of linear tetrahedra
    ///
    /// Each hexahedral cell is split into six tetrahedra along its main
    /// diagonal, which keeps neighbouring cells conforming.
    ///
    /// Boundary attributes:
    /// - 1: z = 0
    /// - 2: y = 0
    /// - 3: x = lx
    /// - 4: y = ly
    /// - 5: x = 0
    /// - 6: z = lz
    ///
    /// # Arguments
    /// * `nx`, `ny`, `nz` - Number of cells in each direction (each ≥ 1)
    /// * `lx`, `ly`, `lz` - Domain dimensions
    pub fn generate_box(nx: usize, ny: usize, nz: usize, lx: f64, ly: f64, lz: f64) -> Mesh {
        assert!(nx > 0 && ny > 0 && nz > 0, "Box mesh needs at least one cell per direction");
        assert!(lx > 0.0 && ly > 0.0 && lz > 0.0, "Box dimensions must be positive");

        let mut mesh = Mesh::new();

        let dx = lx / nx as f64;
        let dy = ly / ny as f64;
        let dz = lz / nz as f64;

        for iz in 0..=nz {
            for iy in 0..=ny {
                for ix in 0..=nx {
                    mesh.geometry.add_node(ix as f64 * dx, iy as f64 * dy, iz as f64 * dz);
                }
            }
        }

        let node_id = |ix: usize, iy: usize, iz: usize| ix + (nx + 1) * (iy + (ny + 1) * iz);

        // Kuhn subdivision: one tet per ordering of the three axes
        const AXIS_ORDERS: [[usize; 3]; 6] = [
            [0, 1, 2],
            [0, 2, 1],
            [1, 0, 2],
            [1, 2, 0],
            [2, 0, 1],
            [2, 1, 0],
        ];

        for iz in 0..nz {
            for iy in 0..ny {
                for ix in 0..nx {
                    for order in AXIS_ORDERS {
                        let mut offset = [0usize; 3];
                        let mut nodes = [node_id(ix, iy, iz); 4];
                        for (k, &axis) in order.iter().enumerate() {
                            offset[axis] = 1;
                            nodes[k + 1] = node_id(ix + offset[0], iy + offset[1], iz + offset[2]);
                        }
                        Self::orient_positive(&mesh, &mut nodes);
                        mesh.connectivity.add_element(TetElement::new(nodes, 1));
                    }
                }
            }
        }

        Self::tag_box_boundary(&mut mesh, lx, ly, lz);

        mesh
    }

    /// Swap two vertices if the tetrahedron is negatively oriented
    fn orient_positive(mesh: &Mesh, nodes: &mut [usize; 4]) {
        let p = nodes.map(|n| mesh.geometry.nodes[n]);
        let signed = (p[1] - p[0]).cross(&(p[2] - p[0])).dot(&(p[3] - p[0]));
        if signed < 0.0 {
            nodes.swap(2, 3);
        }
    }

    fn tag_box_boundary(mesh: &mut Mesh, lx: f64, ly: f64, lz: f64) {
        let tol = 1e-9 * lx.max(ly).max(lz);

        let faces = mesh.connectivity.exterior_faces();
        for face in faces {
            let pts = face.map(|n| mesh.geometry.nodes[n]);
            let all = |pred: &dyn Fn(&nalgebra::Point3<f64>) -> bool| pts.iter().all(pred);

            let attribute = if all(&|p| p.z.abs() < tol) {
                1
            } else if all(&|p| p.y.abs() < tol) {
                2
            } else if all(&|p| (p.x - lx).abs() < tol) {
                3
            } else if all(&|p| (p.y - ly).abs() < tol) {
                4
            } else if all(&|p| p.x.abs() < tol) {
                5
            } else if all(&|p| (p.z - lz).abs() < tol) {
                6
            } else {
                // Exterior faces of a box always lie on one of its sides
                continue;
            };

            mesh.connectivity.add_boundary_face(BoundaryFace::new(face, attribute));
        }
    }
}
