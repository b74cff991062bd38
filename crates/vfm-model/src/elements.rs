//! Solid element shape functions and Gauss quadrature.
//!
//! All quantities here live in the reference configuration. For an element
//! with nodal coordinates x_i the reference Jacobian at a quadrature point is
//!
//! J = [dx/dξ  dy/dξ  dz/dξ]
//!     [dx/dη  dy/dη  dz/dη]
//!     [dx/dζ  dy/dζ  dz/dζ]
//!
//! with J_rc = Σ_i (dN_i/dξ_r) x_i,c, and the reference shape gradient of
//! node i is ∇ₓN_i = J⁻¹ ∇ξN_i.

use nalgebra::{Matrix3, Vector3};

/// Element kinds understood by the model layer.
///
/// Hex8/Hex20 and Tet4/Tet10 are solid continuum elements; Quad4 and Tri3
/// are surface facets and may appear in element blocks only in ill-formed
/// models (the solver rejects non-solid domains).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ElementKind {
    /// 8-node trilinear hexahedron, 2×2×2 Gauss quadrature
    Hex8,
    /// 20-node serendipity hexahedron, 3×3×3 Gauss quadrature
    Hex20,
    /// 4-node linear tetrahedron, 1-point quadrature
    Tet4,
    /// 10-node quadratic tetrahedron, 4-point quadrature
    Tet10,
    /// 4-node quadrilateral facet
    Quad4,
    /// 3-node triangular facet
    Tri3,
}

impl ElementKind {
    /// Number of nodes for this kind
    pub fn num_nodes(&self) -> usize {
        match self {
            ElementKind::Hex8 => 8,
            ElementKind::Hex20 => 20,
            ElementKind::Tet4 => 4,
            ElementKind::Tet10 => 10,
            ElementKind::Quad4 => 4,
            ElementKind::Tri3 => 3,
        }
    }

    /// Whether this kind is a 3D solid continuum element
    pub fn is_solid(&self) -> bool {
        matches!(
            self,
            ElementKind::Hex8 | ElementKind::Hex20 | ElementKind::Tet4 | ElementKind::Tet10
        )
    }

    /// Parse an element kind from its document keyword
    pub fn from_keyword(kind: &str) -> Option<Self> {
        match kind.to_ascii_lowercase().as_str() {
            "hex8" => Some(ElementKind::Hex8),
            "hex20" => Some(ElementKind::Hex20),
            "tet4" => Some(ElementKind::Tet4),
            "tet10" => Some(ElementKind::Tet10),
            "quad4" => Some(ElementKind::Quad4),
            "tri3" => Some(ElementKind::Tri3),
            _ => None,
        }
    }

    /// Quadrature rule for a solid kind; facets have none.
    pub fn integration_rule(&self) -> Result<IntegrationRule, String> {
        match self {
            ElementKind::Hex8 => Ok(hex8_rule()),
            ElementKind::Hex20 => Ok(hex20_rule()),
            ElementKind::Tet4 => Ok(tet4_rule()),
            ElementKind::Tet10 => Ok(tet10_rule()),
            other => Err(format!(
                "element kind {other:?} has no volume quadrature rule"
            )),
        }
    }

    /// Natural-coordinate shape-function derivatives at a point, one
    /// `Vector3` (dN/dξ, dN/dη, dN/dζ) per node in connectivity order.
    pub fn natural_derivatives(&self, p: &[f64; 3]) -> Result<Vec<Vector3<f64>>, String> {
        match self {
            ElementKind::Hex8 => Ok(hex8_natural_derivatives(p[0], p[1], p[2])),
            ElementKind::Hex20 => Ok(hex20_natural_derivatives(p[0], p[1], p[2])),
            ElementKind::Tet4 => Ok(tet4_natural_derivatives()),
            ElementKind::Tet10 => Ok(tet10_natural_derivatives(p[0], p[1], p[2])),
            other => Err(format!(
                "element kind {other:?} has no volume shape functions"
            )),
        }
    }

    /// Shape-function values at a natural point, one per node.
    pub fn shape_functions(&self, p: &[f64; 3]) -> Result<Vec<f64>, String> {
        match self {
            ElementKind::Hex8 => Ok(hex8_shape_functions(p[0], p[1], p[2]).to_vec()),
            ElementKind::Hex20 => Ok(hex20_shape_functions(p[0], p[1], p[2])),
            ElementKind::Tet4 => {
                let [xi, eta, zeta] = *p;
                Ok(vec![1.0 - xi - eta - zeta, xi, eta, zeta])
            }
            ElementKind::Tet10 => Ok(tet10_shape_functions(p[0], p[1], p[2])),
            other => Err(format!(
                "element kind {other:?} has no volume shape functions"
            )),
        }
    }
}

/// One quadrature point: natural coordinates plus Gauss weight.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NaturalPoint {
    pub coords: [f64; 3],
    pub weight: f64,
}

/// A full quadrature rule for one element kind.
#[derive(Debug, Clone, PartialEq)]
pub struct IntegrationRule {
    pub points: Vec<NaturalPoint>,
}

impl IntegrationRule {
    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

fn hex8_rule() -> IntegrationRule {
    let g = 1.0 / f64::sqrt(3.0);
    let signs = [
        [-1.0, -1.0, -1.0],
        [1.0, -1.0, -1.0],
        [1.0, 1.0, -1.0],
        [-1.0, 1.0, -1.0],
        [-1.0, -1.0, 1.0],
        [1.0, -1.0, 1.0],
        [1.0, 1.0, 1.0],
        [-1.0, 1.0, 1.0],
    ];
    IntegrationRule {
        points: signs
            .iter()
            .map(|s| NaturalPoint {
                coords: [s[0] * g, s[1] * g, s[2] * g],
                weight: 1.0,
            })
            .collect(),
    }
}

fn tet4_rule() -> IntegrationRule {
    // Single point at the centroid; the reference tetrahedron has volume 1/6.
    IntegrationRule {
        points: vec![NaturalPoint {
            coords: [0.25, 0.25, 0.25],
            weight: 1.0 / 6.0,
        }],
    }
}

/// Trilinear hex shape functions, standard corner-node ordering:
/// bottom face 1,2,3,4 counter-clockwise (ζ = −1), top face 5,6,7,8 (ζ = +1).
fn hex8_shape_functions(xi: f64, eta: f64, zeta: f64) -> [f64; 8] {
    [
        (1.0 - xi) * (1.0 - eta) * (1.0 - zeta) / 8.0,
        (1.0 + xi) * (1.0 - eta) * (1.0 - zeta) / 8.0,
        (1.0 + xi) * (1.0 + eta) * (1.0 - zeta) / 8.0,
        (1.0 - xi) * (1.0 + eta) * (1.0 - zeta) / 8.0,
        (1.0 - xi) * (1.0 - eta) * (1.0 + zeta) / 8.0,
        (1.0 + xi) * (1.0 - eta) * (1.0 + zeta) / 8.0,
        (1.0 + xi) * (1.0 + eta) * (1.0 + zeta) / 8.0,
        (1.0 - xi) * (1.0 + eta) * (1.0 + zeta) / 8.0,
    ]
}

fn hex8_natural_derivatives(xi: f64, eta: f64, zeta: f64) -> Vec<Vector3<f64>> {
    let xi_n = [-1.0, 1.0, 1.0, -1.0, -1.0, 1.0, 1.0, -1.0];
    let eta_n = [-1.0, -1.0, 1.0, 1.0, -1.0, -1.0, 1.0, 1.0];
    let zeta_n = [-1.0, -1.0, -1.0, -1.0, 1.0, 1.0, 1.0, 1.0];

    (0..8)
        .map(|i| {
            Vector3::new(
                xi_n[i] * (1.0 + eta * eta_n[i]) * (1.0 + zeta * zeta_n[i]) / 8.0,
                (1.0 + xi * xi_n[i]) * eta_n[i] * (1.0 + zeta * zeta_n[i]) / 8.0,
                (1.0 + xi * xi_n[i]) * (1.0 + eta * eta_n[i]) * zeta_n[i] / 8.0,
            )
        })
        .collect()
}

fn tet4_natural_derivatives() -> Vec<Vector3<f64>> {
    vec![
        Vector3::new(-1.0, -1.0, -1.0),
        Vector3::new(1.0, 0.0, 0.0),
        Vector3::new(0.0, 1.0, 0.0),
        Vector3::new(0.0, 0.0, 1.0),
    ]
}

/// Natural coordinates of the 20 serendipity hex nodes: corners 1-8 as in
/// the trilinear hex, then bottom edge midsides 9-12, top edge midsides
/// 13-16, vertical edge midsides 17-20. A zero entry marks the midside
/// direction.
const HEX20_NODES: [[f64; 3]; 20] = [
    [-1.0, -1.0, -1.0],
    [1.0, -1.0, -1.0],
    [1.0, 1.0, -1.0],
    [-1.0, 1.0, -1.0],
    [-1.0, -1.0, 1.0],
    [1.0, -1.0, 1.0],
    [1.0, 1.0, 1.0],
    [-1.0, 1.0, 1.0],
    [0.0, -1.0, -1.0],
    [1.0, 0.0, -1.0],
    [0.0, 1.0, -1.0],
    [-1.0, 0.0, -1.0],
    [0.0, -1.0, 1.0],
    [1.0, 0.0, 1.0],
    [0.0, 1.0, 1.0],
    [-1.0, 0.0, 1.0],
    [-1.0, -1.0, 0.0],
    [1.0, -1.0, 0.0],
    [1.0, 1.0, 0.0],
    [-1.0, 1.0, 0.0],
];

fn hex20_rule() -> IntegrationRule {
    let a = (3.0f64 / 5.0).sqrt();
    let coords = [-a, 0.0, a];
    let weights = [5.0 / 9.0, 8.0 / 9.0, 5.0 / 9.0];

    let mut points = Vec::with_capacity(27);
    for (k, &zeta) in coords.iter().enumerate() {
        for (j, &eta) in coords.iter().enumerate() {
            for (i, &xi) in coords.iter().enumerate() {
                points.push(NaturalPoint {
                    coords: [xi, eta, zeta],
                    weight: weights[i] * weights[j] * weights[k],
                });
            }
        }
    }
    IntegrationRule { points }
}

fn hex20_shape_functions(xi: f64, eta: f64, zeta: f64) -> Vec<f64> {
    HEX20_NODES
        .iter()
        .map(|&[xn, yn, zn]| {
            if xn == 0.0 {
                (1.0 - xi * xi) * (1.0 + eta * yn) * (1.0 + zeta * zn) / 4.0
            } else if yn == 0.0 {
                (1.0 + xi * xn) * (1.0 - eta * eta) * (1.0 + zeta * zn) / 4.0
            } else if zn == 0.0 {
                (1.0 + xi * xn) * (1.0 + eta * yn) * (1.0 - zeta * zeta) / 4.0
            } else {
                (1.0 + xi * xn)
                    * (1.0 + eta * yn)
                    * (1.0 + zeta * zn)
                    * (xi * xn + eta * yn + zeta * zn - 2.0)
                    / 8.0
            }
        })
        .collect()
}

fn hex20_natural_derivatives(xi: f64, eta: f64, zeta: f64) -> Vec<Vector3<f64>> {
    HEX20_NODES
        .iter()
        .map(|&[xn, yn, zn]| {
            if xn == 0.0 {
                Vector3::new(
                    -2.0 * xi * (1.0 + eta * yn) * (1.0 + zeta * zn) / 4.0,
                    (1.0 - xi * xi) * yn * (1.0 + zeta * zn) / 4.0,
                    (1.0 - xi * xi) * (1.0 + eta * yn) * zn / 4.0,
                )
            } else if yn == 0.0 {
                Vector3::new(
                    xn * (1.0 - eta * eta) * (1.0 + zeta * zn) / 4.0,
                    (1.0 + xi * xn) * -2.0 * eta * (1.0 + zeta * zn) / 4.0,
                    (1.0 + xi * xn) * (1.0 - eta * eta) * zn / 4.0,
                )
            } else if zn == 0.0 {
                Vector3::new(
                    xn * (1.0 + eta * yn) * (1.0 - zeta * zeta) / 4.0,
                    (1.0 + xi * xn) * yn * (1.0 - zeta * zeta) / 4.0,
                    (1.0 + xi * xn) * (1.0 + eta * yn) * -2.0 * zeta / 4.0,
                )
            } else {
                Vector3::new(
                    xn * (1.0 + eta * yn)
                        * (1.0 + zeta * zn)
                        * (2.0 * xi * xn + eta * yn + zeta * zn - 1.0)
                        / 8.0,
                    yn * (1.0 + xi * xn)
                        * (1.0 + zeta * zn)
                        * (xi * xn + 2.0 * eta * yn + zeta * zn - 1.0)
                        / 8.0,
                    zn * (1.0 + xi * xn)
                        * (1.0 + eta * yn)
                        * (xi * xn + eta * yn + 2.0 * zeta * zn - 1.0)
                        / 8.0,
                )
            }
        })
        .collect()
}

/// Midside edges of the quadratic tetrahedron, as index pairs into the
/// barycentric coordinates: node 5 sits on edge 1-2, node 6 on 2-3, node 7
/// on 3-1, nodes 8-10 on the edges to the apex.
const TET10_EDGES: [(usize, usize); 6] = [(0, 1), (1, 2), (2, 0), (0, 3), (1, 3), (2, 3)];

fn tet10_rule() -> IntegrationRule {
    let a = (5.0 + 3.0 * 5.0f64.sqrt()) / 20.0;
    let b = (5.0 - 5.0f64.sqrt()) / 20.0;
    // Barycentric (α, β, β, β) permutations mapped to (ξ, η, ζ).
    let points = [[b, b, b], [a, b, b], [b, a, b], [b, b, a]];
    IntegrationRule {
        points: points
            .iter()
            .map(|&coords| NaturalPoint {
                coords,
                weight: 1.0 / 24.0,
            })
            .collect(),
    }
}

fn tet10_barycentric(xi: f64, eta: f64, zeta: f64) -> ([f64; 4], [Vector3<f64>; 4]) {
    let l = [1.0 - xi - eta - zeta, xi, eta, zeta];
    let dl = [
        Vector3::new(-1.0, -1.0, -1.0),
        Vector3::new(1.0, 0.0, 0.0),
        Vector3::new(0.0, 1.0, 0.0),
        Vector3::new(0.0, 0.0, 1.0),
    ];
    (l, dl)
}

fn tet10_shape_functions(xi: f64, eta: f64, zeta: f64) -> Vec<f64> {
    let (l, _) = tet10_barycentric(xi, eta, zeta);
    let mut n = Vec::with_capacity(10);
    for &li in &l {
        n.push(li * (2.0 * li - 1.0));
    }
    for &(a, b) in &TET10_EDGES {
        n.push(4.0 * l[a] * l[b]);
    }
    n
}

fn tet10_natural_derivatives(xi: f64, eta: f64, zeta: f64) -> Vec<Vector3<f64>> {
    let (l, dl) = tet10_barycentric(xi, eta, zeta);
    let mut grads = Vec::with_capacity(10);
    for i in 0..4 {
        grads.push(dl[i] * (4.0 * l[i] - 1.0));
    }
    for &(a, b) in &TET10_EDGES {
        grads.push(dl[b] * (4.0 * l[a]) + dl[a] * (4.0 * l[b]));
    }
    grads
}

/// Reference Jacobian determinant and reference shape gradients at one
/// quadrature point.
///
/// `coords` are the element's nodal coordinates in connectivity order and
/// `dnat` the natural derivatives at the point. Fails when the Jacobian is
/// singular or inverted (det J ≤ 0).
pub fn reference_gradients(
    coords: &[Vector3<f64>],
    dnat: &[Vector3<f64>],
) -> Result<(f64, Vec<Vector3<f64>>), String> {
    debug_assert_eq!(coords.len(), dnat.len());

    let mut jac = Matrix3::zeros();
    for (x, d) in coords.iter().zip(dnat.iter()) {
        for r in 0..3 {
            for c in 0..3 {
                jac[(r, c)] += d[r] * x[c];
            }
        }
    }

    let det = jac.determinant();
    if det <= 0.0 {
        return Err(format!(
            "non-positive reference Jacobian determinant: {det:e}"
        ));
    }
    let inv = jac
        .try_inverse()
        .ok_or_else(|| "singular reference Jacobian".to_string())?;

    let grads = dnat.iter().map(|d| inv * d).collect();
    Ok((det, grads))
}
