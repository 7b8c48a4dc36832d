use crate::HyperelasticStrainEnergy;
use fenris_physics::error::ConfigurationError;
use fenris_physics::input::Input;
use fenris_physics::nalgebra::convert;
use fenris_physics::Real;
use numeric_literals::replace_float_literals;
use serde::{Deserialize, Serialize};

/// The Mooney-Rivlin strain energy
/// <div>$$
/// W = C_1 (I_1 - 3) + C_2 (I_2 - 3).
/// $$</div>
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MooneyRivlin<T> {
    pub c1: T,
    pub c2: T,
}

impl<T: Real> MooneyRivlin<T> {
    pub fn new(c1: T, c2: T) -> Self {
        Self { c1, c2 }
    }

    /// Reads `Physics/MooneyRivlin/C1` and `Physics/MooneyRivlin/C2`, both of which are required.
    pub fn from_input(input: &Input) -> Result<Self, ConfigurationError> {
        let module = "MooneyRivlin";
        input.ensure_recognized("Physics/MooneyRivlin", &["C1", "C2"])?;
        let c1 = input.require_number(module, "Physics/MooneyRivlin/C1")?;
        let c2 = input.require_number(module, "Physics/MooneyRivlin/C2")?;
        Ok(Self::new(convert(c1), convert(c2)))
    }
}

#[replace_float_literals(T::from_f64(literal).expect("literal must fit in T"))]
impl<T: Real> HyperelasticStrainEnergy<T> for MooneyRivlin<T> {
    fn energy_density(&self, i1: T, i2: T, _i3: T) -> T {
        self.c1 * (i1 - 3.0) + self.c2 * (i2 - 3.0)
    }

    fn dw_di1(&self, _i1: T, _i2: T, _i3: T) -> T {
        self.c1
    }

    fn dw_di2(&self, _i1: T, _i2: T, _i3: T) -> T {
        self.c2
    }
}
