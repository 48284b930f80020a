use auto_ops::impl_op_ex;
use serde::{Deserialize, Serialize};

/// A three-momentum (or any Cartesian three-vector) in GeV.
#[derive(Copy, Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Vec3(pub [f64; 3]);

impl Vec3 {
    /// Create a new three-vector from its Cartesian components.
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self([x, y, z])
    }
    pub fn x(&self) -> f64 {
        self.0[0]
    }
    pub fn y(&self) -> f64 {
        self.0[1]
    }
    pub fn z(&self) -> f64 {
        self.0[2]
    }

    /// Promote to a four-momentum with the given invariant mass.
    pub fn with_mass(&self, mass: f64) -> Vec4 {
        let e = f64::sqrt(mass.powi(2) + self.mag2());
        Vec4([self.x(), self.y(), self.z(), e])
    }

    pub fn dot(&self, other: &Self) -> f64 {
        self.x() * other.x() + self.y() * other.y() + self.z() * other.z()
    }
    pub fn mag2(&self) -> f64 {
        self.dot(self)
    }
    /// The magnitude of the component transverse to the beam ($`z`$) axis.
    pub fn pt(&self) -> f64 {
        self.x().hypot(self.y())
    }
}

/// A four-momentum stored as $`(p_x, p_y, p_z, E)`$ in GeV.
#[derive(Copy, Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Vec4(pub [f64; 4]);

impl Vec4 {
    /// Create a new four-momentum from its components.
    pub fn new(px: f64, py: f64, pz: f64, e: f64) -> Self {
        Self([px, py, pz, e])
    }

    /// Sum a collection of four-momenta (the zero vector if empty).
    pub fn sum<'a, I>(constituents: I) -> Vec4
    where
        I: IntoIterator<Item = &'a Vec4>,
    {
        constituents
            .into_iter()
            .fold(Vec4::default(), |acc, p4| acc + p4)
    }

    pub fn px(&self) -> f64 {
        self.0[0]
    }
    pub fn py(&self) -> f64 {
        self.0[1]
    }
    pub fn pz(&self) -> f64 {
        self.0[2]
    }
    pub fn e(&self) -> f64 {
        self.0[3]
    }

    /// The spatial part of the four-momentum.
    pub fn vec3(&self) -> Vec3 {
        Vec3([self.px(), self.py(), self.pz()])
    }
    pub fn pt(&self) -> f64 {
        self.vec3().pt()
    }
    /// The Minkowski norm squared with signature $`(+, -, -, -)`$.
    pub fn mag2(&self) -> f64 {
        self.e().powi(2) - self.vec3().mag2()
    }
    /// The invariant mass. Slightly spacelike vectors (from rounding) are reported as massless.
    pub fn mag(&self) -> f64 {
        self.mag2().max(0.0).sqrt()
    }
    pub fn m(&self) -> f64 {
        self.mag()
    }
    pub fn add(&self, other: &Self) -> Self {
        Self([
            self.px() + other.px(),
            self.py() + other.py(),
            self.pz() + other.pz(),
            self.e() + other.e(),
        ])
    }
}

impl_op_ex!(+ |a: &Vec4, b: &Vec4| -> Vec4 { a.add(b) });
