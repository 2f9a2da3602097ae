use super::domain::Domain;

/// Extension of the [`nalgebra::RealField`] trait with constants useful for
/// numerical methods.
pub trait RealField: nalgebra::RealField + Copy {
    /// Square root of the machine epsilon. This value is a standard constant
    /// for epsilons in approximating first-order derivate-based concepts.
    const EPSILON_SQRT: Self;

    /// Cubic root of the machine epsilon. This value is a standard constant
    /// for epsilons in approximating second-order derivate-based concepts.
    const EPSILON_CBRT: Self;
}

impl RealField for f32 {
    const EPSILON_SQRT: Self = 0.00034526698;
    const EPSILON_CBRT: Self = 0.0049215667;
}

impl RealField for f64 {
    const EPSILON_SQRT: Self = 0.000000014901161193847656;
    const EPSILON_CBRT: Self = 0.0000060554544523933395;
}

/// The base trait for [`Function`](super::function::Function).
pub trait Problem {
    /// Type of the field, usually f64 or f32.
    type Field: RealField;

    /// Gets the domain of the problem.
    ///
    /// The domain carries the dimensionality of the problem and the bound
    /// constraints of its variables.
    fn domain(&self) -> Domain<Self::Field>;
}
